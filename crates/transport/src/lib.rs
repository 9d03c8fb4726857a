//! HTTP transport abstraction for the userdb API
//!
//! Defines the `Transport` trait that decouples request authentication from
//! the wire. `HttpTransport` sends requests with reqwest against a base URL
//! and keeps a cookie store, so the refresh cookie the server sets at login
//! rides along on later refresh calls. Tests substitute scripted transports.

pub mod http;
pub mod message;

pub use http::HttpTransport;
pub use message::{ApiRequest, ApiResponse};

pub use reqwest::header;
pub use reqwest::{Method, StatusCode};

use std::future::Future;
use std::pin::Pin;

/// Errors from sending a request. A non-success HTTP status is not an error
/// at this layer; it comes back as an `ApiResponse`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("request failed: {0}")]
    Request(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("body error: {0}")]
    Body(String),
}

/// Result alias for transport operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed future returned by `Transport::send`.
pub type SendFuture<'a> = Pin<Box<dyn Future<Output = Result<ApiResponse>> + Send + 'a>>;

/// Sends one request and returns the raw response.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility (`Arc<dyn Transport>`).
pub trait Transport: Send + Sync {
    fn send<'a>(&'a self, request: &'a ApiRequest) -> SendFuture<'a>;
}
