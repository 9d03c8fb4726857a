//! Terminal handling of an unrecoverable refresh failure

use std::sync::Arc;

use session_auth::TokenStore;
use tokio::sync::watch;
use tracing::warn;

use crate::status::SessionStatus;

/// Ends the session when a reactive refresh fails.
///
/// Clearing the store also disarms the proactive timer through the
/// scheduler's subscription. Nothing here retries; the user has to sign in
/// again.
#[derive(Clone)]
pub struct SessionGuard {
    store: TokenStore,
    status: Arc<watch::Sender<SessionStatus>>,
}

impl SessionGuard {
    pub fn new(store: TokenStore, status: Arc<watch::Sender<SessionStatus>>) -> Self {
        Self { store, status }
    }

    /// Clear the credential and publish `SessionStatus::Expired`.
    pub fn expire(&self, reason: &session_auth::Error) {
        warn!(error = %reason, "session expired, please log in again");
        self.store.set(None);
        // After the clear, so the store subscriber's SignedOut is overwritten
        self.status.send_replace(SessionStatus::Expired);
        metrics::counter!("session_expired_total").increment(1);
    }
}
