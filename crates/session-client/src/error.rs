//! Error types for authenticated requests

/// Errors from sending a request through the authenticator.
///
/// A non-success status, including a 401 that could not be recovered, is
/// returned as a response rather than an error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Transport(#[from] transport::Error),

    #[error("session refresh failed: {0}")]
    Auth(#[from] session_auth::Error),
}

/// Result alias for session operations.
pub type Result<T> = std::result::Result<T, Error>;
