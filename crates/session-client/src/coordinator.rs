//! Single-flight token refresh
//!
//! However many requests discover an expired credential at once, exactly one
//! refresh call is made. The first demand moves the coordinator from `Idle`
//! to `Refreshing` and spawns the call; later demands queue as waiters. When
//! the call settles, the new credential (if any) is written to the store,
//! the whole queue is drained with the same outcome, and the state returns
//! to `Idle` in one step.
//!
//! The call runs in its own task so a caller that gives up cannot strand the
//! queue. Every demander, including the first, receives the outcome through
//! a oneshot channel.
//!
//! State transitions:
//! - Idle → Refreshing (first demand, refresh call spawned)
//! - Refreshing → Refreshing (further demands, waiter queued)
//! - Refreshing → Idle (call settled, all waiters resolved or rejected)

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use session_auth::{AuthEndpoints, Credential, Error, Result, TokenStore};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use transport::Transport;

use crate::guard::SessionGuard;

/// Why a refresh was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshReason {
    /// Timer or immediate schedule; failure is not fatal
    Proactive,
    /// A request came back 401; failure ends the session
    Reactive,
}

type Waiter = oneshot::Sender<Result<Credential>>;

enum FlightState {
    Idle,
    Refreshing {
        waiters: Vec<Waiter>,
        /// Whether any reactive demand joined this flight
        reactive: bool,
    },
}

struct CoordinatorState {
    transport: Arc<dyn Transport>,
    endpoints: AuthEndpoints,
    store: TokenStore,
    guard: SessionGuard,
    flight: Mutex<FlightState>,
}

/// Shared handle; clones coordinate through the same state.
#[derive(Clone)]
pub struct RefreshCoordinator {
    state: Arc<CoordinatorState>,
}

/// Non-owning handle, for callbacks registered on the token store.
#[derive(Clone)]
pub struct WeakCoordinator {
    state: Weak<CoordinatorState>,
}

impl WeakCoordinator {
    pub fn upgrade(&self) -> Option<RefreshCoordinator> {
        self.state
            .upgrade()
            .map(|state| RefreshCoordinator { state })
    }
}

impl RefreshCoordinator {
    pub fn new(
        transport: Arc<dyn Transport>,
        endpoints: AuthEndpoints,
        store: TokenStore,
        guard: SessionGuard,
    ) -> Self {
        Self {
            state: Arc::new(CoordinatorState {
                transport,
                endpoints,
                store,
                guard,
                flight: Mutex::new(FlightState::Idle),
            }),
        }
    }

    pub fn downgrade(&self) -> WeakCoordinator {
        WeakCoordinator {
            state: Arc::downgrade(&self.state),
        }
    }

    /// Obtain a refreshed credential, sharing any refresh already in flight.
    ///
    /// All demands that join the same flight get the same outcome. If the
    /// flight fails and any of its demands was reactive, the session guard
    /// runs before the waiters are woken.
    pub async fn refresh(&self, reason: RefreshReason) -> Result<Credential> {
        let (tx, rx) = oneshot::channel();
        let start = {
            let mut flight = lock(&self.state.flight);
            match &mut *flight {
                FlightState::Refreshing { waiters, reactive } => {
                    waiters.push(tx);
                    *reactive |= reason == RefreshReason::Reactive;
                    debug!(?reason, waiters = waiters.len(), "waiting for ongoing token refresh");
                    metrics::counter!("session_refresh_waiters_total").increment(1);
                    false
                }
                FlightState::Idle => {
                    *flight = FlightState::Refreshing {
                        waiters: vec![tx],
                        reactive: reason == RefreshReason::Reactive,
                    };
                    true
                }
            }
        };

        if start {
            debug!(?reason, "refreshing access token");
            let state = self.state.clone();
            tokio::spawn(async move { state.run_flight().await });
        }

        rx.await.unwrap_or(Err(Error::Abandoned))
    }

    /// Whether a refresh call is in flight.
    pub fn is_refreshing(&self) -> bool {
        matches!(*lock(&self.state.flight), FlightState::Refreshing { .. })
    }

    /// Demands queued on the in-flight refresh; zero when idle.
    pub fn waiting(&self) -> usize {
        match &*lock(&self.state.flight) {
            FlightState::Refreshing { waiters, .. } => waiters.len(),
            FlightState::Idle => 0,
        }
    }
}

impl CoordinatorState {
    async fn run_flight(self: Arc<Self>) {
        let outcome = session_auth::refresh(self.transport.as_ref(), &self.endpoints).await;

        if let Ok(credential) = &outcome {
            self.store.set(Some(credential.clone()));
        }

        let (waiters, reactive) =
            match std::mem::replace(&mut *lock(&self.flight), FlightState::Idle) {
                FlightState::Refreshing { waiters, reactive } => (waiters, reactive),
                FlightState::Idle => (Vec::new(), false),
            };
        let trigger = if reactive { "reactive" } else { "proactive" };

        match &outcome {
            Ok(_) => {
                info!(trigger, waiters = waiters.len(), "access token refreshed");
                metrics::counter!("session_refresh_total", "trigger" => trigger, "outcome" => "success")
                    .increment(1);
            }
            Err(e) => {
                metrics::counter!("session_refresh_total", "trigger" => trigger, "outcome" => "failure")
                    .increment(1);
                if reactive {
                    warn!(error = %e, waiters = waiters.len(), "token refresh failed, ending session");
                    self.guard.expire(e);
                } else {
                    warn!(error = %e, "proactive token refresh failed, next unauthorized response will retry");
                }
            }
        }

        for waiter in waiters {
            // A dropped receiver means that caller stopped waiting
            let _ = waiter.send(outcome.clone());
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
