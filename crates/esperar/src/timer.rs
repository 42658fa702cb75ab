//! Cancellable single-shot timers over a swappable backend.
//!
//! Deadline re-checks, change coalescing and deferred listener teardown all
//! run off the same primitive: a [`Timer`] armed for a fixed delay, invoking
//! its callback at most once per arming. The part that actually waits is
//! injectable: [`TokioBackend`] spawns one sleeping task per armed timer,
//! [`ManualBackend`] lets tests fire timers by hand and inspect what is
//! armed.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::sync::lock;

/// Identifier of one armed backend timer. Ids are never reused within a
/// backend instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

/// Callback invoked by a backend when an armed timer fires. It receives the
/// id that fired so wrappers can detect stale fires.
pub type BackendCallback = Arc<dyn Fn(TimerId) + Send + Sync>;

/// Scheduling primitive behind [`Timer`].
pub trait TimerBackend: Send + Sync + fmt::Debug {
    /// Arm a one-shot timer for `delay`.
    fn schedule(&self, delay: Duration, callback: BackendCallback) -> TimerId;

    /// Cancel an armed timer. A callback that has not yet begun running will
    /// not run; one already racing past the cancel is suppressed at the
    /// [`Timer`] layer by its id check.
    fn cancel(&self, id: TimerId);
}

// ============================================================================
// Timer
// ============================================================================

/// A cancellable single-shot timer with a fixed delay.
///
/// `schedule` is a no-op while already armed; `cancel` is a no-op while
/// idle; `reschedule` is cancel-then-schedule, restarting the delay. The
/// callback runs at most once per arming and never after a cancel: a fire
/// that lost the race against `cancel` or `reschedule` carries a stale id
/// and is dropped. Dropping the timer cancels it.
pub struct Timer {
    delay: Duration,
    backend: Arc<dyn TimerBackend>,
    callback: Arc<dyn Fn() + Send + Sync>,
    armed: Arc<Mutex<Option<TimerId>>>,
}

impl Timer {
    /// A new, unarmed timer.
    pub fn new(
        delay: Duration,
        backend: Arc<dyn TimerBackend>,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        Self {
            delay,
            backend,
            callback: Arc::new(callback),
            armed: Arc::new(Mutex::new(None)),
        }
    }

    /// The fixed delay this timer is armed for.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Whether the timer is currently armed.
    #[must_use]
    pub fn is_scheduled(&self) -> bool {
        lock(&self.armed).is_some()
    }

    /// Arm the timer unless it already is.
    pub fn schedule(&self) {
        let mut armed = lock(&self.armed);
        if armed.is_some() {
            return;
        }
        *armed = Some(self.backend.schedule(self.delay, self.fire_guard()));
    }

    /// Disarm the timer if armed.
    pub fn cancel(&self) {
        if let Some(id) = lock(&self.armed).take() {
            self.backend.cancel(id);
        }
    }

    /// Restart the delay: cancel if armed, then arm.
    pub fn reschedule(&self) {
        let mut armed = lock(&self.armed);
        if let Some(id) = armed.take() {
            self.backend.cancel(id);
        }
        *armed = Some(self.backend.schedule(self.delay, self.fire_guard()));
    }

    /// The backend-facing callback: clears the armed slot before running the
    /// user callback, and drops fires whose id no longer matches the slot.
    fn fire_guard(&self) -> BackendCallback {
        let slot = Arc::clone(&self.armed);
        let callback = Arc::clone(&self.callback);
        Arc::new(move |fired| {
            {
                let mut armed = lock(&slot);
                if *armed != Some(fired) {
                    return;
                }
                *armed = None;
            }
            callback();
        })
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("delay", &self.delay)
            .field("scheduled", &self.is_scheduled())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tokio backend
// ============================================================================

/// Backend that spawns one sleeping tokio task per armed timer.
///
/// [`TimerBackend::schedule`] must be called from within a tokio runtime;
/// cancellation aborts the sleeping task.
#[derive(Debug, Clone, Default)]
pub struct TokioBackend {
    inner: Arc<TokioTasks>,
}

#[derive(Debug, Default)]
struct TokioTasks {
    next_id: AtomicU64,
    tasks: Mutex<HashMap<TimerId, Option<tokio::task::JoinHandle<()>>>>,
}

impl TokioBackend {
    /// A backend with no armed timers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of currently armed timers.
    #[must_use]
    pub fn armed_len(&self) -> usize {
        lock(&self.inner.tasks).len()
    }
}

impl TimerBackend for TokioBackend {
    fn schedule(&self, delay: Duration, callback: BackendCallback) -> TimerId {
        let id = TimerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        // Reserve the slot before spawning so the task can always tell
        // whether it was cancelled, even if it outruns the insert below.
        lock(&self.inner.tasks).insert(id, None);
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let live = lock(&inner.tasks).remove(&id).is_some();
            if live {
                callback(id);
            }
        });
        let mut tasks = lock(&self.inner.tasks);
        if let Some(slot) = tasks.get_mut(&id) {
            *slot = Some(handle);
        }
        id
    }

    fn cancel(&self, id: TimerId) {
        let removed = lock(&self.inner.tasks).remove(&id);
        if let Some(Some(handle)) = removed {
            handle.abort();
        }
    }
}

// ============================================================================
// Manual backend
// ============================================================================

/// Backend that never waits: tests fire armed timers explicitly and can
/// inspect the armed delays.
#[derive(Default)]
pub struct ManualBackend {
    next_id: AtomicU64,
    armed: Mutex<Vec<ArmedTimer>>,
}

struct ArmedTimer {
    id: TimerId,
    delay: Duration,
    callback: BackendCallback,
}

impl ManualBackend {
    /// A backend with no armed timers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays of all armed timers, in arming order.
    #[must_use]
    pub fn armed_delays(&self) -> Vec<Duration> {
        lock(&self.armed).iter().map(|timer| timer.delay).collect()
    }

    /// Number of currently armed timers.
    #[must_use]
    pub fn armed_len(&self) -> usize {
        lock(&self.armed).len()
    }

    /// Fire every timer armed for exactly `delay`, in arming order. Returns
    /// how many fired. Timers armed by the fired callbacks are left armed.
    pub fn fire(&self, delay: Duration) -> usize {
        let fired = {
            let mut armed = lock(&self.armed);
            let mut fired = Vec::new();
            let mut index = 0;
            while index < armed.len() {
                if armed[index].delay == delay {
                    fired.push(armed.remove(index));
                } else {
                    index += 1;
                }
            }
            fired
        };
        let count = fired.len();
        for timer in fired {
            (timer.callback)(timer.id);
        }
        count
    }

    /// Fire the earliest-delay armed timer (first armed wins ties). Returns
    /// its delay, or `None` when nothing is armed.
    pub fn fire_next(&self) -> Option<Duration> {
        let next = {
            let mut armed = lock(&self.armed);
            let position = armed
                .iter()
                .enumerate()
                .min_by_key(|(index, timer)| (timer.delay, *index))
                .map(|(index, _)| index)?;
            armed.remove(position)
        };
        let delay = next.delay;
        (next.callback)(next.id);
        Some(delay)
    }

    /// Fire everything currently armed, in ascending delay order. Returns
    /// how many fired. Timers armed by the fired callbacks are left armed.
    pub fn fire_all(&self) -> usize {
        let mut fired = {
            let mut armed = lock(&self.armed);
            std::mem::take(&mut *armed)
        };
        fired.sort_by_key(|timer| timer.delay);
        let count = fired.len();
        for timer in fired {
            (timer.callback)(timer.id);
        }
        count
    }
}

impl TimerBackend for ManualBackend {
    fn schedule(&self, delay: Duration, callback: BackendCallback) -> TimerId {
        let id = TimerId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        lock(&self.armed).push(ArmedTimer {
            id,
            delay,
            callback,
        });
        id
    }

    fn cancel(&self, id: TimerId) {
        lock(&self.armed).retain(|timer| timer.id != id);
    }
}

impl fmt::Debug for ManualBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualBackend")
            .field("armed", &self.armed_delays())
            .finish()
    }
}
