//! Busy flag and completion callback shared by the runner and cleaner.
//!
//! An [`Activity`] is `Idle` until [`Activity::try_begin`] flips its flag,
//! and goes back to `Idle` when the returned [`ActiveGuard`] drops, at which
//! point the update callback fires. The flag is an atomic so callers can poll
//! it without locking; the update callback sits behind a mutex and is swapped
//! as a single slot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Callback fired once when a run or clean finishes.
pub type UpdateFn = Arc<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

pub struct Activity {
    name: &'static str,
    busy: AtomicBool,
    update: Mutex<Option<UpdateFn>>,
}

impl Activity {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            busy: AtomicBool::new(false),
            update: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_active(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Replaces the update callback.
    pub fn register_update(&self, update: UpdateFn) {
        *self.lock_update() = Some(update);
    }

    /// Marks the activity busy, or returns `None` if it already is.
    ///
    /// The update callback fires once when the returned guard is finished or
    /// dropped, including when the owning thread unwinds.
    pub fn try_begin(self: &Arc<Self>) -> Option<ActiveGuard> {
        self.acquire(true)
    }

    /// Like [`Activity::try_begin`], but releasing the guard does not fire
    /// the update callback. Used when another activity borrows this one's
    /// flag for a phase of its own work.
    pub fn try_hold(self: &Arc<Self>) -> Option<ActiveGuard> {
        self.acquire(false)
    }

    fn acquire(self: &Arc<Self>, notify: bool) -> Option<ActiveGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ActiveGuard {
                activity: Arc::clone(self),
                notify,
            })
    }

    /// Invokes the update callback, logging any error it returns.
    pub fn notify(&self) {
        let update = self.lock_update().clone();
        if let Some(update) = update
            && let Err(e) = update()
        {
            error!(activity = self.name, error = %e, "Update callback failed");
        }
    }

    fn lock_update(&self) -> MutexGuard<'_, Option<UpdateFn>> {
        self.update
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Keeps an [`Activity`] busy until dropped.
pub struct ActiveGuard {
    activity: Arc<Activity>,
    notify: bool,
}

impl ActiveGuard {
    /// Returns the activity to idle, then fires its update callback.
    pub fn finish(self) {
        drop(self);
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.activity.busy.store(false, Ordering::Release);
        if self.notify {
            self.activity.notify();
        }
    }
}

/// Runs `work`, logging a start line and a done line with the elapsed time.
pub fn timed<T>(label: &str, work: impl FnOnce() -> T) -> (T, Duration) {
    info!(task = label, "start");
    let started = Instant::now();
    let result = work();
    let elapsed = started.elapsed();
    info!(task = label, took = ?elapsed, "done");
    (result, elapsed)
}
