//! Test infrastructure for the LedSem kernel.
//!
//! Host-side doubles for the HAL traits plus small helpers for polling
//! futures by hand.
//!
//! # Usage
//!
//! ```rust,ignore
//! use ledsem_kernel::testutil::{RecordingOutput, MemoryConsole, poll_once};
//! ```

use alloc::{string::String, sync::Arc, vec::Vec};
use core::{
    future::Future,
    pin::Pin,
    sync::atomic::{AtomicBool, Ordering},
    task::{Context, Poll, Waker},
};
use futures_util::task::{noop_waker_ref, ArcWake};
use ledsem_hal::{Console, DigitalOutput, Level};
use spin::Mutex;

use crate::time::Clock;

/// Poll a future once with a waker that does nothing.
pub fn poll_once<F: Future + Unpin>(future: &mut F) -> Poll<F::Output> {
    let mut cx = Context::from_waker(noop_waker_ref());
    Pin::new(future).poll(&mut cx)
}

/// A waker that records whether it has been woken.
#[derive(Default)]
pub struct FlagWaker {
    woken: AtomicBool,
}

impl FlagWaker {
    /// Create a flag and a waker bound to it.
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (Waker, Arc<FlagWaker>) {
        let flag = Arc::new(FlagWaker::default());
        (futures_util::task::waker(flag.clone()), flag)
    }

    /// Whether the waker fired since the last [`FlagWaker::reset`].
    pub fn is_woken(&self) -> bool {
        self.woken.load(Ordering::Acquire)
    }

    /// Clear the woken flag.
    pub fn reset(&self) {
        self.woken.store(false, Ordering::Release);
    }
}

impl ArcWake for FlagWaker {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.woken.store(true, Ordering::Release);
    }
}

/// A write accepted by a [`RecordingOutput`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelWrite {
    /// Tick of the write, or 0 when the output has no clock.
    pub at: u64,
    /// Level written.
    pub level: Level,
}

/// Shared view of the writes an output accepted.
#[derive(Clone, Default)]
pub struct WriteLog {
    writes: Arc<Mutex<Vec<LevelWrite>>>,
}

impl WriteLog {
    /// All accepted writes, oldest first.
    pub fn writes(&self) -> Vec<LevelWrite> {
        self.writes.lock().clone()
    }

    /// Levels of all accepted writes, oldest first.
    pub fn levels(&self) -> Vec<Level> {
        self.writes.lock().iter().map(|w| w.level).collect()
    }

    /// Number of accepted writes of `level`.
    pub fn count(&self, level: Level) -> usize {
        self.writes.lock().iter().filter(|w| w.level == level).count()
    }

    fn push(&self, write: LevelWrite) {
        self.writes.lock().push(write);
    }
}

/// An output line that remembers every level written to it.
pub struct RecordingOutput {
    log: WriteLog,
    clock: Option<Clock>,
    fail_on: Option<Level>,
}

/// Fault reported by a [`RecordingOutput`] configured to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InjectedFault(pub Level);

impl RecordingOutput {
    /// An output without timestamps.
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (RecordingOutput, WriteLog) {
        Self::build(None, None)
    }

    /// An output stamping each write with the clock's tick.
    pub fn with_clock(clock: Clock) -> (RecordingOutput, WriteLog) {
        Self::build(Some(clock), None)
    }

    /// An output that rejects every write of `level`.
    pub fn failing_on(level: Level, clock: Clock) -> (RecordingOutput, WriteLog) {
        Self::build(Some(clock), Some(level))
    }

    fn build(clock: Option<Clock>, fail_on: Option<Level>) -> (RecordingOutput, WriteLog) {
        let log = WriteLog::default();
        let output = RecordingOutput {
            log: log.clone(),
            clock,
            fail_on,
        };
        (output, log)
    }
}

impl DigitalOutput for RecordingOutput {
    type Error = InjectedFault;

    fn set(&mut self, level: Level) -> Result<(), Self::Error> {
        if self.fail_on == Some(level) {
            return Err(InjectedFault(level));
        }
        let at = self.clock.as_ref().map_or(0, Clock::now);
        self.log.push(LevelWrite { at, level });
        Ok(())
    }
}

/// A console that buffers everything written to it.
#[derive(Clone, Default)]
pub struct MemoryConsole {
    buffer: Arc<Mutex<String>>,
}

impl MemoryConsole {
    /// Create an empty console.
    pub fn new() -> Self {
        Self::default()
    }

    /// Completed lines written so far.
    pub fn lines(&self) -> Vec<String> {
        self.buffer.lock().lines().map(String::from).collect()
    }
}

impl Console for MemoryConsole {
    fn write_str(&mut self, s: &str) {
        self.buffer.lock().push_str(s);
    }
}
