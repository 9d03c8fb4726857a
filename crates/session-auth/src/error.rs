//! Error types for login and token refresh

/// Errors from the auth endpoints.
///
/// `Clone` so a single refresh outcome can be handed to every request
/// waiting on it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("login rejected: {0}")]
    LoginRejected(String),

    #[error("token refresh rejected: {0}")]
    RefreshRejected(String),

    #[error("malformed token response: {0}")]
    MalformedResponse(String),

    #[error("token refresh abandoned before completing")]
    Abandoned,
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
