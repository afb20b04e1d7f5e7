//! Periodic resource owners.
//!
//! Each owner loops forever: acquire the LED, drive it to its target level,
//! hold it, release it, cool down. The token is released on every way out of
//! the held phase, including cancellation and actuator faults.

use alloc::sync::Arc;
use ledsem_common::{SyncError, TaskId};
use ledsem_hal::DigitalOutput;

use super::{yield_now, TaskResult};
use crate::config::OwnerConfig;
use crate::resource::SharedActuator;
use crate::sync::CancellationToken;
use crate::time::Clock;

/// How one acquire-write-hold-release cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cycle {
    Completed,
    Cancelled,
}

/// A task that periodically takes the LED and drives it to one level.
pub struct ResourceOwner<P> {
    id: TaskId,
    config: OwnerConfig,
    actuator: Arc<SharedActuator<P>>,
    clock: Clock,
    cancel: CancellationToken,
}

impl<P: DigitalOutput> ResourceOwner<P> {
    /// Create an owner running as task `id`.
    pub fn new(
        id: TaskId,
        config: OwnerConfig,
        actuator: Arc<SharedActuator<P>>,
        clock: Clock,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id,
            config,
            actuator,
            clock,
            cancel,
        }
    }

    /// Run until cancelled.
    ///
    /// Acquire timeouts are logged and retried after the cooldown. Misuse
    /// and actuator faults stop this task with the error; the other owner is
    /// unaffected.
    pub async fn run(self) -> TaskResult {
        let name = self.config.task.name;
        log::info!("{} ({}) started, target {}", name, self.id, self.config.target);

        while !self.cancel.is_cancelled() {
            match self.cycle().await {
                Ok(Cycle::Completed) => {}
                Ok(Cycle::Cancelled) => break,
                Err(err) if err.is_recoverable() => {
                    log::warn!("{}: {}, retrying", name, err);
                }
                Err(err) => return Err(err),
            }

            let cooldown = self.clock.sleep(self.config.cooldown);
            if self.cancel.run_until_cancelled(cooldown).await.is_none() {
                break;
            }
            // A zero cooldown completes without suspending. Let a woken
            // waiter run before the next acquire.
            yield_now().await;
        }

        log::info!("{}: stopped", name);
        Ok(())
    }

    async fn cycle(&self) -> Result<Cycle, SyncError> {
        let name = self.config.task.name;

        let acquire = self.actuator.acquire(self.id, self.config.acquire_timeout);
        let mut guard = match self.cancel.run_until_cancelled(acquire).await {
            Some(acquired) => acquired?,
            None => return Ok(Cycle::Cancelled),
        };
        log::info!("{}: token acquired", name);

        if let Err(err) = guard.set(self.config.target) {
            guard.release()?;
            log::info!("{}: token released after fault", name);
            return Err(err);
        }
        log::info!("{}: LED set to {}", name, self.config.target);

        let hold = self.clock.sleep(self.config.hold);
        let held = self.cancel.run_until_cancelled(hold).await;

        guard.release()?;
        log::info!("{}: token released", name);

        Ok(match held {
            Some(()) => Cycle::Completed,
            None => Cycle::Cancelled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::executor::Executor;
    use crate::task::Task;
    use crate::testutil::RecordingOutput;
    use ledsem_hal::Level;

    fn spawn_owner<P: DigitalOutput + 'static>(
        executor: &mut Executor,
        config: OwnerConfig,
        actuator: &Arc<SharedActuator<P>>,
        cancel: &CancellationToken,
    ) -> TaskId {
        let actuator = actuator.clone();
        let clock = executor.clock().clone();
        let cancel = cancel.clone();
        executor
            .spawn(Task::with_config(config.task, move |id| {
                ResourceOwner::new(id, config, actuator, clock, cancel).run()
            }))
            .expect("spawn")
    }

    #[test]
    fn test_single_owner_cycles_on_period() {
        let clock = Clock::new();
        let mut executor = Executor::new(clock.clone());
        let (output, log) = RecordingOutput::with_clock(clock.clone());
        let actuator = SharedActuator::new_shared(output, clock.clone());
        let cancel = CancellationToken::new();

        let config = OwnerConfig::turn_on().with_hold(10).with_cooldown(5);
        spawn_owner(&mut executor, config, &actuator, &cancel);

        executor.run_for(30);
        let at: Vec<u64> = log.writes().iter().map(|w| w.at).collect();
        assert_eq!(at, [0, 15, 30]);
        assert!(actuator.holder().is_some());
    }

    #[test]
    fn test_cancelled_before_start_never_acquires() {
        let clock = Clock::new();
        let mut executor = Executor::new(clock.clone());
        let (output, log) = RecordingOutput::new();
        let actuator = SharedActuator::new_shared(output, clock);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let id = spawn_owner(&mut executor, OwnerConfig::turn_off(), &actuator, &cancel);
        executor.run_until_idle();

        assert_eq!(executor.exit_status(id), Some(&Ok(())));
        assert!(log.levels().is_empty());
        assert_eq!(actuator.stats().acquisitions, 0);
    }

    #[test]
    fn test_cancel_during_hold_releases_token() {
        let clock = Clock::new();
        let mut executor = Executor::new(clock.clone());
        let (output, log) = RecordingOutput::new();
        let actuator = SharedActuator::new_shared(output, clock.clone());
        let cancel = CancellationToken::new();

        let id = spawn_owner(&mut executor, OwnerConfig::turn_on(), &actuator, &cancel);
        executor.run_for(500);
        assert!(actuator.holder().is_some());

        cancel.cancel();
        executor.run_until_idle();

        assert_eq!(executor.exit_status(id), Some(&Ok(())));
        assert_eq!(actuator.holder(), None);
        assert_eq!(log.levels(), [Level::On]);
        let stats = actuator.stats();
        assert_eq!(stats.acquisitions, stats.releases);
        assert_eq!(clock.pending_timers(), 0);
    }

    #[test]
    fn test_fault_halts_owner_and_frees_token() {
        let clock = Clock::new();
        let mut executor = Executor::new(clock.clone());
        let (output, _log) = RecordingOutput::failing_on(Level::Off, clock.clone());
        let actuator = SharedActuator::new_shared(output, clock);
        let cancel = CancellationToken::new();

        let id = spawn_owner(&mut executor, OwnerConfig::turn_off(), &actuator, &cancel);
        executor.run_until_idle();

        assert_eq!(executor.exit_status(id), Some(&Err(SyncError::ResourceFault)));
        assert_eq!(actuator.holder(), None);
        assert_eq!(actuator.state(), None);
    }
}
