//! Proactive token refresh
//!
//! Arms a one-shot timer that fires `buffer` before the current credential's
//! `exp` claim. Wired as a `TokenStore` subscriber, so every login, refresh,
//! or logout re-evaluates the timer. At most one timer is armed: scheduling
//! always cancels the previous one first.
//!
//! The scheduler does not refresh anything itself. It calls the trigger it was
//! built with, which starts a best-effort refresh and returns immediately.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use session_auth::{Credential, Subscription, TokenStore};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::clock::Clock;

/// Fire-and-forget refresh start. Must not block.
pub type RefreshFn = Arc<dyn Fn() + Send + Sync>;

/// What to do for a given credential at a given time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPlan {
    /// No credential, or no expiry claim
    Skip,
    /// Already inside the refresh window
    Immediate,
    /// Arm a timer for this long
    After(Duration),
}

/// Decide when to refresh. Pure function: no I/O.
///
/// `refresh_at = expiry - buffer`; a refresh point at or before `now` means
/// refresh right away.
pub fn plan(credential: Option<&Credential>, now_millis: u64, buffer: Duration) -> RefreshPlan {
    let Some(expires_at) = credential.and_then(Credential::expires_at_millis) else {
        return RefreshPlan::Skip;
    };
    let refresh_at = expires_at.saturating_sub(buffer.as_millis() as u64);
    if refresh_at <= now_millis {
        RefreshPlan::Immediate
    } else {
        RefreshPlan::After(Duration::from_millis(refresh_at - now_millis))
    }
}

struct ArmedTimer {
    generation: u64,
    due_at_millis: u64,
    handle: JoinHandle<()>,
}

struct SchedulerState {
    buffer: Duration,
    clock: Arc<dyn Clock>,
    trigger: RefreshFn,
    runtime: Handle,
    armed: Mutex<Option<ArmedTimer>>,
    generation: AtomicU64,
}

impl Drop for SchedulerState {
    fn drop(&mut self) {
        let armed = self.armed.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(timer) = armed.take() {
            timer.handle.abort();
        }
    }
}

/// Owner of the single proactive-refresh timer.
#[derive(Clone)]
pub struct RefreshScheduler {
    state: Arc<SchedulerState>,
}

impl RefreshScheduler {
    /// Create a scheduler that calls `trigger` when a refresh is due.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime; timers are spawned on it.
    pub fn new(buffer: Duration, clock: Arc<dyn Clock>, trigger: RefreshFn) -> Self {
        Self {
            state: Arc::new(SchedulerState {
                buffer,
                clock,
                trigger,
                runtime: Handle::current(),
                armed: Mutex::new(None),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Subscribe to `store` so every credential write reschedules.
    pub fn attach(&self, store: &TokenStore) -> Subscription {
        let scheduler = self.clone();
        store.subscribe(move |credential| scheduler.schedule(credential))
    }

    /// Cancel any armed timer, then arm one for `credential` if it has an
    /// expiry. Triggers a refresh immediately when already inside the window.
    pub fn schedule(&self, credential: Option<&Credential>) {
        let mut armed = lock(&self.state.armed);
        if let Some(previous) = armed.take() {
            previous.handle.abort();
            debug!(
                due_at_millis = previous.due_at_millis,
                "cancelled armed refresh timer"
            );
        }

        let now = self.state.clock.now_millis();
        match plan(credential, now, self.state.buffer) {
            RefreshPlan::Skip => {
                debug!("no expiry to schedule against, proactive refresh disarmed");
            }
            RefreshPlan::Immediate => {
                drop(armed);
                info!("credential inside refresh window, refreshing now");
                (self.state.trigger)();
            }
            RefreshPlan::After(delay) => {
                let generation = self.state.generation.fetch_add(1, Ordering::Relaxed) + 1;
                let due_at_millis = now + delay.as_millis() as u64;
                let state = Arc::downgrade(&self.state);
                let handle = self
                    .state
                    .runtime
                    .spawn(fire_after(delay, generation, state));
                debug!(
                    delay_secs = delay.as_secs(),
                    due_at_millis, "armed proactive refresh timer"
                );
                *armed = Some(ArmedTimer {
                    generation,
                    due_at_millis,
                    handle,
                });
            }
        }
    }

    /// Cancel the armed timer, if any.
    pub fn disarm(&self) {
        self.schedule(None);
    }

    /// Unix millisecond time the armed timer fires at.
    pub fn armed_at_millis(&self) -> Option<u64> {
        lock(&self.state.armed).as_ref().map(|t| t.due_at_millis)
    }

    pub fn is_armed(&self) -> bool {
        self.armed_at_millis().is_some()
    }
}

async fn fire_after(delay: Duration, generation: u64, state: Weak<SchedulerState>) {
    tokio::time::sleep(delay).await;

    let Some(state) = state.upgrade() else {
        return;
    };
    {
        let mut armed = lock(&state.armed);
        // A newer schedule() may have replaced us after the sleep finished
        if !armed.as_ref().is_some_and(|t| t.generation == generation) {
            return;
        }
        armed.take();
    }

    info!("proactively refreshing access token");
    (state.trigger)();
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ManualClock, NOW_MILLIS, token};
    use std::sync::atomic::AtomicUsize;

    const BUFFER: Duration = Duration::from_secs(60);

    fn counting_scheduler() -> (RefreshScheduler, Arc<AtomicUsize>) {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let scheduler = RefreshScheduler::new(
            BUFFER,
            Arc::new(ManualClock::new(NOW_MILLIS)),
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        (scheduler, fired)
    }

    fn expiring_in(secs: i64) -> Credential {
        Credential::new(token(Some("alice"), Some(NOW_MILLIS as i64 / 1000 + secs)))
    }

    #[test]
    fn plan_skips_without_credential_or_expiry() {
        assert_eq!(plan(None, NOW_MILLIS, BUFFER), RefreshPlan::Skip);
        let no_exp = Credential::new(token(Some("alice"), None));
        assert_eq!(plan(Some(&no_exp), NOW_MILLIS, BUFFER), RefreshPlan::Skip);
        let opaque = Credential::new("opaque");
        assert_eq!(plan(Some(&opaque), NOW_MILLIS, BUFFER), RefreshPlan::Skip);
    }

    #[test]
    fn plan_refreshes_buffer_before_expiry() {
        let credential = expiring_in(3600);
        assert_eq!(
            plan(Some(&credential), NOW_MILLIS, BUFFER),
            RefreshPlan::After(Duration::from_secs(3540))
        );
    }

    #[test]
    fn plan_is_immediate_at_or_inside_window() {
        assert_eq!(
            plan(Some(&expiring_in(30)), NOW_MILLIS, BUFFER),
            RefreshPlan::Immediate
        );
        assert_eq!(
            plan(Some(&expiring_in(60)), NOW_MILLIS, BUFFER),
            RefreshPlan::Immediate
        );
        assert_eq!(
            plan(Some(&expiring_in(-600)), NOW_MILLIS, BUFFER),
            RefreshPlan::Immediate
        );
    }

    #[test]
    fn plan_is_immediate_for_negative_expiry() {
        let credential = Credential::new(token(Some("alice"), Some(-5)));
        assert_eq!(credential.expires_at_millis(), Some(0));
        assert_eq!(
            plan(Some(&credential), NOW_MILLIS, BUFFER),
            RefreshPlan::Immediate
        );
    }

    #[tokio::test(start_paused = true)]
    async fn arms_timer_at_expiry_minus_buffer() {
        let (scheduler, fired) = counting_scheduler();
        scheduler.schedule(Some(&expiring_in(3600)));

        assert_eq!(scheduler.armed_at_millis(), Some(NOW_MILLIS + 3_540_000));
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(3539)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!scheduler.is_armed(), "fired timer must disarm itself");
    }

    #[tokio::test(start_paused = true)]
    async fn inside_window_triggers_immediately_without_timer() {
        let (scheduler, fired) = counting_scheduler();
        scheduler.schedule(Some(&expiring_in(30)));

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!scheduler.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduling_cancels_previous_timer() {
        let (scheduler, fired) = counting_scheduler();
        scheduler.schedule(Some(&expiring_in(3600)));
        scheduler.schedule(Some(&expiring_in(7200)));

        assert_eq!(scheduler.armed_at_millis(), Some(NOW_MILLIS + 7_140_000));

        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0, "first timer must be cancelled");

        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn credential_without_expiry_disarms() {
        let (scheduler, fired) = counting_scheduler();
        scheduler.schedule(Some(&expiring_in(3600)));
        scheduler.schedule(Some(&Credential::new(token(Some("alice"), None))));

        assert!(!scheduler.is_armed());
        tokio::time::sleep(Duration::from_secs(7200)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn disarm_is_idempotent() {
        let (scheduler, fired) = counting_scheduler();
        scheduler.disarm();
        scheduler.schedule(Some(&expiring_in(3600)));
        scheduler.disarm();
        scheduler.disarm();

        assert!(!scheduler.is_armed());
        tokio::time::sleep(Duration::from_secs(7200)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn attached_scheduler_follows_store_writes() {
        let (scheduler, fired) = counting_scheduler();
        let store = TokenStore::new();
        let _subscription = scheduler.attach(&store);

        store.set(Some(expiring_in(3600)));
        assert_eq!(scheduler.armed_at_millis(), Some(NOW_MILLIS + 3_540_000));

        store.set(None);
        assert!(!scheduler.is_armed(), "logout must disarm the timer");

        store.set(Some(expiring_in(10)));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!scheduler.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_scheduler_aborts_timer() {
        let (scheduler, fired) = counting_scheduler();
        scheduler.schedule(Some(&expiring_in(3600)));
        drop(scheduler);

        tokio::time::sleep(Duration::from_secs(7200)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
