//! The shared actuator.
//!
//! The output line and its token live in one object, and the only write path
//! goes through a guard issued by the token. A task that does not hold the
//! token has no way to touch the line.

use alloc::sync::Arc;
use core::{
    cell::UnsafeCell,
    sync::atomic::{AtomicU8, Ordering},
};
use ledsem_common::{SyncError, TaskId};
use ledsem_hal::{DigitalOutput, Level};

use crate::sync::{BinarySemaphore, SemaphoreGuard, SemaphoreStats, Timeout};
use crate::time::Clock;

const SHADOW_UNKNOWN: u8 = 0;
const SHADOW_ON: u8 = 1;
const SHADOW_OFF: u8 = 2;

/// A digital output shared between tasks, guarded by a [`BinarySemaphore`].
pub struct SharedActuator<P> {
    token: BinarySemaphore,
    output: UnsafeCell<P>,
    /// Last level successfully written; the hardware has no read-back.
    shadow: AtomicU8,
}

// Safety: `output` is only reached through an `ActuatorGuard`, and a guard
// exists only while its owner holds `token`, which admits one holder at a
// time.
unsafe impl<P: Send> Send for SharedActuator<P> {}
unsafe impl<P: Send> Sync for SharedActuator<P> {}

impl<P: DigitalOutput> SharedActuator<P> {
    /// Wrap `output`; its token starts available.
    pub fn new(output: P, clock: Clock) -> Self {
        Self {
            token: BinarySemaphore::new(clock),
            output: UnsafeCell::new(output),
            shadow: AtomicU8::new(SHADOW_UNKNOWN),
        }
    }

    /// Create a new actuator wrapped in an Arc for shared ownership.
    pub fn new_shared(output: P, clock: Clock) -> Arc<Self> {
        Arc::new(Self::new(output, clock))
    }

    /// Wait for exclusive access on behalf of `owner`.
    pub async fn acquire(
        &self,
        owner: TaskId,
        timeout: Timeout,
    ) -> Result<ActuatorGuard<'_, P>, SyncError> {
        let permit = self.token.acquire(owner, timeout).await?;
        Ok(ActuatorGuard {
            permit,
            actuator: self,
        })
    }

    /// Take exclusive access if nobody holds it.
    pub fn try_acquire(&self, owner: TaskId) -> Result<ActuatorGuard<'_, P>, SyncError> {
        let permit = self.token.try_acquire(owner)?;
        Ok(ActuatorGuard {
            permit,
            actuator: self,
        })
    }

    /// Last level written, or `None` before the first write.
    pub fn state(&self) -> Option<Level> {
        match self.shadow.load(Ordering::Acquire) {
            SHADOW_ON => Some(Level::On),
            SHADOW_OFF => Some(Level::Off),
            _ => None,
        }
    }

    /// The task currently holding access, if any.
    pub fn holder(&self) -> Option<TaskId> {
        self.token.holder()
    }

    /// Number of tasks blocked waiting for access.
    pub fn waiting(&self) -> usize {
        self.token.waiting()
    }

    /// Instrumentation counters of the token.
    pub fn stats(&self) -> SemaphoreStats {
        self.token.stats()
    }
}

/// Exclusive access to a [`SharedActuator`]. Dropping it releases access.
#[must_use = "dropping the guard releases the actuator immediately"]
pub struct ActuatorGuard<'a, P: DigitalOutput> {
    permit: SemaphoreGuard<'a>,
    actuator: &'a SharedActuator<P>,
}

impl<P: DigitalOutput> ActuatorGuard<'_, P> {
    /// The task this guard was issued to.
    pub fn owner(&self) -> TaskId {
        self.permit.owner()
    }

    /// Drive the line to `level`.
    ///
    /// A driver error becomes `SyncError::ResourceFault`; the shadow state
    /// keeps the previous level.
    pub fn set(&mut self, level: Level) -> Result<(), SyncError> {
        // Safety: holding `permit` makes this the only live reference to
        // the output (see the Sync impl above), and `&mut self` keeps it
        // unique within the guard.
        let output = unsafe { &mut *self.actuator.output.get() };
        if let Err(err) = output.set(level) {
            log::error!("{}: driving LED {} failed: {:?}", self.owner(), level, err);
            return Err(SyncError::ResourceFault);
        }

        let shadow = match level {
            Level::On => SHADOW_ON,
            Level::Off => SHADOW_OFF,
        };
        self.actuator.shadow.store(shadow, Ordering::Release);
        Ok(())
    }

    /// Give up access now.
    pub fn release(self) -> Result<(), SyncError> {
        self.permit.release()
    }
}
