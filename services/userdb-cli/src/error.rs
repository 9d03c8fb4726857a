//! CLI error types

use thiserror::Error;

/// Failures the binary reports before or after talking to the API.
///
/// Request-level outcomes (non-2xx statuses, unrecoverable 401s) are printed
/// as results, not raised as errors.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Usage(String),

    #[error("no password configured: set USERDB_PASSWORD or credentials.password_file")]
    MissingPassword,

    #[error("Session expired. Please log in again.")]
    SessionExpired,
}

/// Result alias using CLI Error
pub type Result<T> = std::result::Result<T, Error>;
