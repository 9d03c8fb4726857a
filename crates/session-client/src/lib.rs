//! Request authentication and token lifecycle for the userdb API client
//!
//! Wraps a `Transport` so every request carries the current access token, and
//! keeps that token alive. The pieces:
//!
//! - `RefreshScheduler` arms one timer per credential, firing `REFRESH_BUFFER`
//!   before expiry (proactive refresh)
//! - `RefreshCoordinator` collapses concurrent refresh demands into a single
//!   call to the refresh endpoint and hands its outcome to every waiter
//! - `RequestAuthenticator` attaches the bearer header and, on a 401, waits on
//!   the coordinator and re-issues the request once (reactive refresh)
//! - `SessionGuard` clears the credential and publishes `SessionStatus::Expired`
//!   when a reactive refresh fails
//!
//! `Session` builds all of them around one `TokenStore`.
//!
//! Credential lifecycle:
//! 1. `Session::login()` stores a credential → scheduler arms, status `SignedIn`
//! 2. Timer fires → coordinator refreshes → new credential stored → scheduler re-arms
//! 3. Request gets 401 → coordinator refresh (shared) → request retried once
//! 4. Reactive refresh fails → guard clears credential → status `Expired`
//! 5. `Session::logout()` clears the credential → scheduler disarms, status `SignedOut`

pub mod authenticator;
pub mod clock;
pub mod coordinator;
pub mod error;
pub mod guard;
pub mod scheduler;
pub mod session;
pub mod status;

#[cfg(test)]
mod test_support;

pub use authenticator::RequestAuthenticator;
pub use clock::{Clock, SystemClock};
pub use coordinator::{RefreshCoordinator, RefreshReason};
pub use error::{Error, Result};
pub use guard::SessionGuard;
pub use scheduler::{RefreshPlan, RefreshScheduler};
pub use session::{Session, SessionConfig};
pub use status::SessionStatus;
