//! Binary semaphore with holder tracking.
//!
//! The token is either available or held by exactly one task. Unlike the
//! classic RTOS binary semaphore it remembers who holds it, so releasing a
//! token you do not hold, or taking one you already hold, is reported as
//! misuse instead of silently corrupting the count.

use alloc::collections::BTreeMap;
use core::{
    future::Future,
    pin::Pin,
    sync::atomic::{AtomicU64, AtomicUsize, Ordering},
    task::{Context, Poll, Waker},
};
use ledsem_common::{MisuseKind, SyncError, TaskId};
use spin::Mutex;

use crate::time::{Clock, Sleep};

/// Lock word value meaning "available". Task ids start at 1.
const NO_HOLDER: u64 = 0;

/// How long [`BinarySemaphore::acquire`] may wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Wait until the token is released, however long that takes.
    Forever,
    /// Give up after this many ticks. `Ticks(0)` tries exactly once.
    Ticks(u64),
}

/// Snapshot of the instrumentation counters of a [`BinarySemaphore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SemaphoreStats {
    /// Successful acquisitions.
    pub acquisitions: u64,
    /// Successful releases.
    pub releases: u64,
    /// Acquisitions abandoned because their wait bound expired.
    pub timeouts: u64,
    /// Tasks holding the token right now.
    pub holders: usize,
    /// Highest number of simultaneous holders ever observed.
    pub peak_holders: usize,
}

#[derive(Default)]
struct Counters {
    acquisitions: AtomicU64,
    releases: AtomicU64,
    timeouts: AtomicU64,
    holders: AtomicUsize,
    peak_holders: AtomicUsize,
}

/// The misuse a release finds when the lock word reads `current`.
fn misuse(current: u64) -> SyncError {
    match TaskId::from_raw(current) {
        None => SyncError::Misuse(MisuseKind::NotHeld),
        Some(holder) => SyncError::Misuse(MisuseKind::NotOwner { holder }),
    }
}

/// A two-state token granting exclusive access to one holder at a time.
///
/// Created available. Waiting tasks are woken in the order they first
/// blocked, but a task arriving while the token is free takes it at once;
/// only exclusivity is guaranteed, not fairness.
pub struct BinarySemaphore {
    /// Raw id of the holder, or `NO_HOLDER`.
    holder: AtomicU64,
    /// Blocked acquirers keyed by ticket, oldest first.
    waiters: Mutex<BTreeMap<u64, Waker>>,
    next_ticket: AtomicU64,
    clock: Clock,
    counters: Counters,
}

impl BinarySemaphore {
    /// Create an available token whose timeouts run on `clock`.
    pub fn new(clock: Clock) -> Self {
        Self {
            holder: AtomicU64::new(NO_HOLDER),
            waiters: Mutex::new(BTreeMap::new()),
            next_ticket: AtomicU64::new(0),
            clock,
            counters: Counters::default(),
        }
    }

    /// Whether some task holds the token.
    pub fn is_held(&self) -> bool {
        self.holder.load(Ordering::Acquire) != NO_HOLDER
    }

    /// The task holding the token, if any.
    pub fn holder(&self) -> Option<TaskId> {
        TaskId::from_raw(self.holder.load(Ordering::Acquire))
    }

    /// Number of tasks blocked in [`BinarySemaphore::acquire`].
    pub fn waiting(&self) -> usize {
        self.waiters.lock().len()
    }

    /// Current instrumentation counters.
    pub fn stats(&self) -> SemaphoreStats {
        SemaphoreStats {
            acquisitions: self.counters.acquisitions.load(Ordering::Relaxed),
            releases: self.counters.releases.load(Ordering::Relaxed),
            timeouts: self.counters.timeouts.load(Ordering::Relaxed),
            holders: self.counters.holders.load(Ordering::Relaxed),
            peak_holders: self.counters.peak_holders.load(Ordering::Relaxed),
        }
    }

    /// Attempt to take the token without waiting.
    ///
    /// A busy token is reported as `AcquisitionTimeout { waited: 0 }`, the
    /// same outcome as `acquire(owner, Timeout::Ticks(0))`.
    pub fn try_acquire(&self, owner: TaskId) -> Result<SemaphoreGuard<'_>, SyncError> {
        if self.holder.load(Ordering::Acquire) == owner.as_u64() {
            return Err(SyncError::Misuse(MisuseKind::Reentrant));
        }
        if self.take(owner) {
            Ok(SemaphoreGuard::new(self, owner))
        } else {
            Err(SyncError::AcquisitionTimeout { waited: 0 })
        }
    }

    /// Wait for the token on behalf of `owner`.
    ///
    /// Resolves to a guard once the token is taken, or to
    /// `AcquisitionTimeout` when `timeout` expires first. Fails with
    /// `Misuse(Reentrant)` if `owner` already holds the token.
    pub fn acquire(&self, owner: TaskId, timeout: Timeout) -> Acquire<'_> {
        Acquire {
            semaphore: self,
            owner,
            timeout,
            started: None,
            deadline: None,
            ticket: None,
        }
    }

    /// Return the token held by `owner`.
    ///
    /// Fails with `Misuse(NotHeld)` when the token is available and with
    /// `Misuse(NotOwner)` when another task holds it; the token is left
    /// untouched in both cases.
    pub fn release(&self, owner: TaskId) -> Result<(), SyncError> {
        let current = self.holder.load(Ordering::Acquire);
        if current != owner.as_u64() {
            return Err(misuse(current));
        }

        // The holder count drops before the word reads available, so the
        // next taker never sees two holders.
        self.counters.holders.fetch_sub(1, Ordering::AcqRel);
        match self.holder.compare_exchange(
            owner.as_u64(),
            NO_HOLDER,
            Ordering::Release,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                self.counters.releases.fetch_add(1, Ordering::Relaxed);
                self.wake_next();
                Ok(())
            }
            Err(current) => {
                self.counters.holders.fetch_add(1, Ordering::AcqRel);
                Err(misuse(current))
            }
        }
    }

    /// Transition available -> held by `owner`.
    fn take(&self, owner: TaskId) -> bool {
        let taken = self
            .holder
            .compare_exchange(NO_HOLDER, owner.as_u64(), Ordering::Acquire, Ordering::Relaxed)
            .is_ok();
        if taken {
            let holders = self.counters.holders.fetch_add(1, Ordering::AcqRel).wrapping_add(1);
            self.counters.peak_holders.fetch_max(holders, Ordering::AcqRel);
            self.counters.acquisitions.fetch_add(1, Ordering::Relaxed);
        }
        taken
    }

    /// Wake the oldest waiter, if any. It re-queues under the same ticket
    /// if someone else wins the token first.
    fn wake_next(&self) {
        let next = self.waiters.lock().pop_first();
        if let Some((_, waker)) = next {
            waker.wake();
        }
    }

    fn register(&self, ticket: u64, waker: &Waker) {
        let mut waiters = self.waiters.lock();
        match waiters.get_mut(&ticket) {
            Some(existing) if existing.will_wake(waker) => {}
            Some(existing) => *existing = waker.clone(),
            None => {
                waiters.insert(ticket, waker.clone());
            }
        }
    }

    fn withdraw(&self, ticket: u64) {
        self.waiters.lock().remove(&ticket);
    }

    /// A waiter gave up. If it was woken by a release it will not use, hand
    /// the wakeup on so the next waiter is not stranded.
    fn abandon(&self, ticket: u64) {
        self.withdraw(ticket);
        if !self.is_held() {
            self.wake_next();
        }
    }
}

/// Future returned by [`BinarySemaphore::acquire`].
pub struct Acquire<'a> {
    semaphore: &'a BinarySemaphore,
    owner: TaskId,
    timeout: Timeout,
    started: Option<u64>,
    deadline: Option<Sleep>,
    ticket: Option<u64>,
}

impl<'a> Acquire<'a> {
    fn succeed(&mut self) -> SemaphoreGuard<'a> {
        if let Some(ticket) = self.ticket.take() {
            self.semaphore.withdraw(ticket);
        }
        self.deadline = None;
        SemaphoreGuard::new(self.semaphore, self.owner)
    }

    fn fail(&mut self, error: SyncError) -> SyncError {
        if let Some(ticket) = self.ticket.take() {
            self.semaphore.abandon(ticket);
        }
        self.deadline = None;
        error
    }
}

impl<'a> Future for Acquire<'a> {
    type Output = Result<SemaphoreGuard<'a>, SyncError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let semaphore = this.semaphore;

        if semaphore.holder.load(Ordering::Acquire) == this.owner.as_u64() {
            return Poll::Ready(Err(this.fail(SyncError::Misuse(MisuseKind::Reentrant))));
        }

        let started = *this.started.get_or_insert_with(|| semaphore.clock.now());
        if this.deadline.is_none() {
            if let Timeout::Ticks(ticks) = this.timeout {
                this.deadline = Some(semaphore.clock.sleep_until(started.saturating_add(ticks)));
            }
        }

        // Fast path: the token is free
        if semaphore.take(this.owner) {
            return Poll::Ready(Ok(this.succeed()));
        }

        if let Some(deadline) = this.deadline.as_mut() {
            if Pin::new(deadline).poll(cx).is_ready() {
                semaphore.counters.timeouts.fetch_add(1, Ordering::Relaxed);
                let waited = semaphore.clock.now().saturating_sub(started);
                return Poll::Ready(Err(this.fail(SyncError::AcquisitionTimeout { waited })));
            }
        }

        // Slow path: queue up, keeping the original ticket across re-polls
        let ticket = *this
            .ticket
            .get_or_insert_with(|| semaphore.next_ticket.fetch_add(1, Ordering::Relaxed));
        semaphore.register(ticket, cx.waker());

        // Double-check after registration to avoid lost wakeup
        if semaphore.take(this.owner) {
            return Poll::Ready(Ok(this.succeed()));
        }

        Poll::Pending
    }
}

impl Drop for Acquire<'_> {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            self.semaphore.abandon(ticket);
        }
    }
}

/// Proof of holding a [`BinarySemaphore`].
///
/// Call [`SemaphoreGuard::release`] to observe the release result; dropping
/// an unreleased guard releases the token too, so no exit path can leak it.
#[must_use = "dropping the guard releases the token immediately"]
pub struct SemaphoreGuard<'a> {
    semaphore: &'a BinarySemaphore,
    owner: TaskId,
    released: bool,
}

impl<'a> SemaphoreGuard<'a> {
    fn new(semaphore: &'a BinarySemaphore, owner: TaskId) -> Self {
        Self {
            semaphore,
            owner,
            released: false,
        }
    }

    /// The task this guard was issued to.
    pub fn owner(&self) -> TaskId {
        self.owner
    }

    /// Release the token now.
    pub fn release(mut self) -> Result<(), SyncError> {
        self.released = true;
        self.semaphore.release(self.owner)
    }
}

impl Drop for SemaphoreGuard<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        match self.semaphore.release(self.owner) {
            Ok(()) => log::info!("{}: token released on drop", self.owner),
            Err(err) => log::error!("{}: release on drop failed: {}", self.owner, err),
        }
    }
}
