//! Wiring of the token lifecycle around one credential store

use std::sync::Arc;
use std::time::Duration;

use common::Secret;
use session_auth::{AuthEndpoints, REFRESH_BUFFER, Subscription, TokenStore};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use transport::{ApiRequest, ApiResponse, Transport};

use crate::authenticator::RequestAuthenticator;
use crate::clock::{Clock, SystemClock};
use crate::coordinator::{RefreshCoordinator, RefreshReason};
use crate::error::Result;
use crate::guard::SessionGuard;
use crate::scheduler::{RefreshFn, RefreshScheduler};
use crate::status::{self, SessionStatus};

/// Tunables for a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub endpoints: AuthEndpoints,
    /// How long before expiry the proactive refresh fires
    pub refresh_buffer: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoints: AuthEndpoints::default(),
            refresh_buffer: REFRESH_BUFFER,
        }
    }
}

/// An authenticated API client session.
///
/// Owns the token store and everything subscribed to it. Requests go through
/// `send`; the credential is kept fresh in the background.
pub struct Session {
    transport: Arc<dyn Transport>,
    endpoints: AuthEndpoints,
    store: TokenStore,
    scheduler: RefreshScheduler,
    coordinator: RefreshCoordinator,
    authenticator: RequestAuthenticator,
    status: Arc<watch::Sender<SessionStatus>>,
    subscriptions: Vec<Subscription>,
}

impl Session {
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(transport: Arc<dyn Transport>, config: SessionConfig) -> Self {
        Self::with_clock(transport, config, Arc::new(SystemClock))
    }

    /// Like `new`, reading wall-clock time from `clock`.
    pub fn with_clock(
        transport: Arc<dyn Transport>,
        config: SessionConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let store = TokenStore::new();
        let (status, _) = watch::channel(SessionStatus::SignedOut);
        let status = Arc::new(status);

        let guard = SessionGuard::new(store.clone(), status.clone());
        let coordinator = RefreshCoordinator::new(
            transport.clone(),
            config.endpoints.clone(),
            store.clone(),
            guard,
        );
        let authenticator = RequestAuthenticator::new(
            transport.clone(),
            config.endpoints.clone(),
            store.clone(),
            coordinator.clone(),
        );

        let scheduler = RefreshScheduler::new(
            config.refresh_buffer,
            clock,
            proactive_trigger(&coordinator, Handle::current()),
        );
        let subscriptions = vec![
            scheduler.attach(&store),
            status::track(&store, status.clone()),
        ];

        Self {
            transport,
            endpoints: config.endpoints,
            store,
            scheduler,
            coordinator,
            authenticator,
            status,
            subscriptions,
        }
    }

    /// Log in with username and password and store the resulting credential.
    ///
    /// On failure nothing is stored and the current credential is untouched.
    pub async fn login(
        &self,
        username: &str,
        password: &Secret<String>,
    ) -> session_auth::Result<()> {
        let credential =
            session_auth::login(self.transport.as_ref(), &self.endpoints, username, password)
                .await
                .inspect_err(|e| warn!(username, error = %e, "login failed"))?;
        info!(username, "logged in");
        self.store.set(Some(credential));
        Ok(())
    }

    /// Drop the credential. The proactive timer disarms with it.
    pub fn logout(&self) {
        info!("logging out");
        self.store.set(None);
    }

    /// Send a request with the current credential, recovering from one 401.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        self.authenticator.send(request).await
    }

    /// Display name of the signed-in user, from the token subject.
    pub fn username(&self) -> Option<String> {
        self.store.get()?.username().map(str::to_owned)
    }

    pub fn is_authenticated(&self) -> bool {
        self.store.get().is_some()
    }

    /// Watch the user-facing session state.
    pub fn status(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    pub fn scheduler(&self) -> &RefreshScheduler {
        &self.scheduler
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    pub fn authenticator(&self) -> &RequestAuthenticator {
        &self.authenticator
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        for subscription in self.subscriptions.drain(..) {
            subscription.unsubscribe();
        }
        self.scheduler.disarm();
    }
}

/// Start a best-effort proactive refresh on `runtime` without waiting for it.
///
/// Holds the coordinator weakly; the store's subscriber list must not keep
/// the coordinator (which owns the store) alive.
fn proactive_trigger(coordinator: &RefreshCoordinator, runtime: Handle) -> RefreshFn {
    let coordinator = coordinator.downgrade();
    Arc::new(move || {
        let Some(coordinator) = coordinator.upgrade() else {
            return;
        };
        runtime.spawn(async move {
            if let Err(e) = coordinator.refresh(RefreshReason::Proactive).await {
                debug!(error = %e, "proactive refresh did not complete");
            }
        });
    })
}
