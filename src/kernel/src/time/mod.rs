//! Virtual tick clock.
//!
//! Time only moves when the executor advances it, which makes every run of
//! the system reproducible. One tick is one millisecond of simulated time.

mod sleep;

pub use sleep::Sleep;

use alloc::{collections::BTreeMap, sync::Arc, vec::Vec};
use core::{
    sync::atomic::{AtomicU64, Ordering},
    task::Waker,
};
use ledsem_hal::Timer;
use spin::Mutex;

/// Position of a pending timer: ordered by deadline, then by registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct TimerKey {
    deadline: u64,
    seq: u64,
}

/// A shared handle to the system tick counter and its timer queue.
///
/// Cloning is cheap; all clones observe the same time.
#[derive(Clone, Default)]
pub struct Clock {
    inner: Arc<ClockInner>,
}

#[derive(Default)]
struct ClockInner {
    now: AtomicU64,
    next_seq: AtomicU64,
    timers: Mutex<BTreeMap<TimerKey, Waker>>,
}

impl Clock {
    /// Create a clock starting at tick 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current tick.
    pub fn now(&self) -> u64 {
        self.inner.now.load(Ordering::Acquire)
    }

    /// A future that completes `ticks` ticks from now.
    pub fn sleep(&self, ticks: u64) -> Sleep {
        self.sleep_until(self.now().saturating_add(ticks))
    }

    /// A future that completes once the clock reaches `deadline`.
    pub fn sleep_until(&self, deadline: u64) -> Sleep {
        Sleep::new(self.clone(), deadline)
    }

    /// Earliest pending timer deadline, if any.
    pub fn next_deadline(&self) -> Option<u64> {
        self.inner
            .timers
            .lock()
            .keys()
            .next()
            .map(|key| key.deadline)
    }

    /// Number of timers waiting to fire.
    pub fn pending_timers(&self) -> usize {
        self.inner.timers.lock().len()
    }

    /// Move the clock forward to `tick` and wake every timer that is due.
    ///
    /// The clock never goes backwards; an earlier `tick` only fires timers
    /// that are already due. Returns the number of timers fired.
    pub fn advance_to(&self, tick: u64) -> usize {
        let now = self.inner.now.fetch_max(tick, Ordering::AcqRel).max(tick);

        let due: Vec<Waker> = {
            let mut timers = self.inner.timers.lock();
            let pending = match now.checked_add(1) {
                Some(bound) => timers.split_off(&TimerKey { deadline: bound, seq: 0 }),
                None => BTreeMap::new(),
            };
            core::mem::replace(&mut *timers, pending).into_values().collect()
        };

        // Wake outside the lock: a woken task may re-arm a timer.
        let fired = due.len();
        for waker in due {
            waker.wake();
        }
        fired
    }

    /// Move the clock forward by `ticks`.
    pub fn advance(&self, ticks: u64) -> usize {
        self.advance_to(self.now().saturating_add(ticks))
    }

    /// Arm (or re-arm under the same key) a timer for `deadline`.
    pub(crate) fn register(&self, key: Option<TimerKey>, deadline: u64, waker: &Waker) -> TimerKey {
        let key = key.unwrap_or_else(|| TimerKey {
            deadline,
            seq: self.inner.next_seq.fetch_add(1, Ordering::Relaxed),
        });
        let mut timers = self.inner.timers.lock();
        match timers.get_mut(&key) {
            Some(existing) if existing.will_wake(waker) => {}
            Some(existing) => *existing = waker.clone(),
            None => {
                timers.insert(key, waker.clone());
            }
        }
        key
    }

    /// Disarm a timer. Unknown keys (already fired) are ignored.
    pub(crate) fn cancel(&self, key: TimerKey) {
        self.inner.timers.lock().remove(&key);
    }
}

impl Timer for Clock {
    fn current_ticks(&self) -> u64 {
        self.now()
    }
}
