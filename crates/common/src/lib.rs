//! Types shared by the userdb session crates and the CLI

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
