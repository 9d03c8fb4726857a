//! Process-wide holder of the current access credential
//!
//! The store keeps at most one `Credential`. Every `set` is a total
//! replacement followed by a synchronous fan-out to subscribers in
//! registration order. A write gate serializes `set` calls so each write's
//! notifications finish before the next write begins, and a panicking
//! subscriber is isolated so the rest still run.
//!
//! Subscribers must not call `set` from inside their callback; the write gate
//! is held during fan-out. Such a nested write is logged and ignored.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use std::thread::{self, ThreadId};

use tracing::{debug, info, warn};

use crate::credential::Credential;

type Callback = Arc<dyn Fn(Option<&Credential>) + Send + Sync>;

#[derive(Default)]
struct StoreState {
    current: RwLock<Option<Credential>>,
    subscribers: Mutex<Vec<(u64, Callback)>>,
    next_id: AtomicU64,
    write_gate: Mutex<()>,
    /// Thread currently running a `set` fan-out
    writer: Mutex<Option<ThreadId>>,
}

/// Shared handle to the credential slot. Clones refer to the same store.
#[derive(Clone, Default)]
pub struct TokenStore {
    state: Arc<StoreState>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current credential, if any. Never blocks on subscriber fan-out.
    pub fn get(&self) -> Option<Credential> {
        self.state
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the current credential and notify every subscriber.
    ///
    /// A call made from inside a subscriber callback is dropped with a
    /// warning instead of deadlocking on the write gate.
    pub fn set(&self, value: Option<Credential>) {
        let this_thread = thread::current().id();
        if *lock(&self.state.writer) == Some(this_thread) {
            warn!("credential write from inside a token subscriber ignored");
            return;
        }

        let _gate = lock(&self.state.write_gate);
        *lock(&self.state.writer) = Some(this_thread);

        *self
            .state
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = value.clone();

        match &value {
            Some(credential) => info!(subject = credential.subject(), "credential replaced"),
            None => info!("credential cleared"),
        }

        // Snapshot so callbacks can subscribe/unsubscribe without deadlocking
        let subscribers: Vec<(u64, Callback)> = lock(&self.state.subscribers).clone();
        for (id, callback) in subscribers {
            let outcome = catch_unwind(AssertUnwindSafe(|| callback(value.as_ref())));
            if outcome.is_err() {
                warn!(subscriber = id, "token subscriber panicked, continuing fan-out");
            }
        }
        *lock(&self.state.writer) = None;
    }

    /// Register `callback` to run after every `set`.
    ///
    /// The callback stays registered until the returned handle's
    /// `unsubscribe` is called; dropping the handle does not unsubscribe.
    ///
    /// The callback runs while the write gate is held and must not call
    /// `set` on this store. Hand the write off to a task instead; a nested
    /// `set` is ignored.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Option<&Credential>) + Send + Sync + 'static,
    {
        let id = self.state.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.state.subscribers).push((id, Arc::new(callback)));
        debug!(subscriber = id, "token subscriber registered");
        Subscription {
            id,
            store: Arc::downgrade(&self.state),
        }
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        lock(&self.state.subscribers).len()
    }
}

/// Handle returned by `TokenStore::subscribe`.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    store: Weak<StoreState>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Remove the callback. A no-op if the store is gone.
    pub fn unsubscribe(self) {
        if let Some(state) = self.store.upgrade() {
            lock(&state.subscribers).retain(|(id, _)| *id != self.id);
            debug!(subscriber = self.id, "token subscriber removed");
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
