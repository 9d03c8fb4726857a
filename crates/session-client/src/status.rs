//! Signed-in state as seen by the user

use std::sync::Arc;

use session_auth::{Credential, Subscription, TokenStore};
use tokio::sync::watch;

/// What the user-facing layer should show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    /// No credential; show the login entry point
    SignedOut,
    /// Holding a credential. `username` is the token subject when present
    SignedIn { username: Option<String> },
    /// Refresh failed and the credential was cleared; ask the user to sign in again
    Expired,
}

impl SessionStatus {
    pub fn from_credential(credential: Option<&Credential>) -> Self {
        match credential {
            Some(credential) => SessionStatus::SignedIn {
                username: credential.username().map(str::to_owned),
            },
            None => SessionStatus::SignedOut,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionStatus::SignedOut => "signed_out",
            SessionStatus::SignedIn { .. } => "signed_in",
            SessionStatus::Expired => "expired",
        }
    }
}

/// Publish a status for every credential write on `store`.
pub fn track(store: &TokenStore, status: Arc<watch::Sender<SessionStatus>>) -> Subscription {
    store.subscribe(move |credential| {
        status.send_replace(SessionStatus::from_credential(credential));
    })
}
