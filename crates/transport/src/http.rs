//! reqwest-backed transport

use std::time::Duration;

use tracing::debug;

use crate::message::{ApiRequest, ApiResponse};
use crate::{Error, Result, SendFuture, Transport};

/// Sends requests to `base_url` + request path with a shared reqwest client.
///
/// The client keeps a cookie store. The server sets the refresh token as an
/// http-only cookie at login, and the refresh call relies on it being sent
/// back automatically.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Build a transport with a cookie-enabled client and a per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Request(format!("building HTTP client: {e}")))?;
        Ok(Self::with_client(client, base_url))
    }

    /// Use an existing client. It must have a cookie store for refresh to work.
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> Result<String> {
        if !path.starts_with('/') {
            return Err(Error::InvalidUrl(format!(
                "request path must start with '/', got: {path}"
            )));
        }
        Ok(format!("{}{}", self.base_url.trim_end_matches('/'), path))
    }
}

impl Transport for HttpTransport {
    fn send<'a>(&'a self, request: &'a ApiRequest) -> SendFuture<'a> {
        Box::pin(async move {
            let url = self.url_for(request.path())?;
            debug!(method = %request.method(), %url, "sending request");

            let mut builder = self
                .client
                .request(request.method().clone(), &url)
                .headers(request.headers().clone());
            if let Some(body) = request.body_bytes() {
                builder = builder.body(body.clone());
            }

            let response = builder.send().await.map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(format!("{url}: {e}"))
                } else {
                    Error::Request(format!("{url}: {e}"))
                }
            })?;

            let status = response.status();
            let headers = response.headers().clone();
            let body = response
                .bytes()
                .await
                .map_err(|e| Error::Body(format!("reading response from {url}: {e}")))?;

            debug!(%status, %url, "received response");
            Ok(ApiResponse::new(status, body).with_headers(headers))
        })
    }
}
