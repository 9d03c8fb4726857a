//! Access-token primitives for the userdb session client
//!
//! Holds the pieces of the session lifecycle that do not coordinate anything:
//! claim extraction from bearer tokens, the credential holder that notifies
//! subscribers on every replacement, and the two calls against the auth
//! endpoints. The refresh scheduling and single-flight logic that builds on
//! these lives in `session-client`.
//!
//! Credential flow:
//! 1. `api::login()` exchanges username/password for an access token
//! 2. The resulting `Credential` is written with `TokenStore::set()`
//! 3. Subscribers (refresh scheduler, status tracker) react to the write
//! 4. `api::refresh()` trades the server-held refresh cookie for a new token
//! 5. Logout or an unrecoverable refresh writes `None`

pub mod api;
pub mod claims;
pub mod constants;
pub mod credential;
pub mod endpoints;
pub mod error;
pub mod store;

pub use api::{TokenResponse, login, refresh};
pub use claims::{Claims, decode};
pub use constants::*;
pub use credential::Credential;
pub use endpoints::AuthEndpoints;
pub use error::{Error, Result};
pub use store::{Subscription, TokenStore};
