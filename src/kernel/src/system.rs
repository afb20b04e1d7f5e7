//! The two-task system.
//!
//! One LED, one token, two equal-priority owners: "turn on" registered
//! first, "turn off" second. Everything is created here and injected; there
//! are no globals.

use alloc::sync::Arc;
use core::fmt;
use ledsem_common::{SpawnError, TaskId};
use ledsem_hal::DigitalOutput;

use crate::config::{ConfigError, OwnerConfig, SystemConfig};
use crate::resource::SharedActuator;
use crate::sync::{CancellationToken, SemaphoreStats};
use crate::task::{executor::Executor, owner::ResourceOwner, Task, TaskResult};
use crate::time::Clock;

/// Why a [`System`] could not be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildError {
    /// The configuration was rejected.
    Config(ConfigError),
    /// An owner could not be registered.
    Spawn(SpawnError),
}

impl From<ConfigError> for BuildError {
    fn from(err: ConfigError) -> Self {
        BuildError::Config(err)
    }
}

impl From<SpawnError> for BuildError {
    fn from(err: SpawnError) -> Self {
        BuildError::Spawn(err)
    }
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::Config(err) => write!(f, "invalid configuration: {}", err),
            BuildError::Spawn(err) => write!(f, "spawn failed: {}", err),
        }
    }
}

/// The assembled system, ready to run.
pub struct System<P> {
    config: SystemConfig,
    executor: Executor,
    actuator: Arc<SharedActuator<P>>,
    cancel: CancellationToken,
    activate: TaskId,
    deactivate: TaskId,
}

impl<P: DigitalOutput + 'static> System<P> {
    /// Build the system on a fresh clock.
    pub fn new(output: P, config: SystemConfig) -> Result<Self, BuildError> {
        Self::with_clock(output, config, Clock::new())
    }

    /// Build the system on `clock`, so callers can share it with the
    /// output driver or a logger.
    pub fn with_clock(output: P, config: SystemConfig, clock: Clock) -> Result<Self, BuildError> {
        config.validate()?;
        let actuator = SharedActuator::new_shared(output, clock.clone());
        let cancel = CancellationToken::new();
        let mut executor = Executor::new(clock.clone());
        log::info!("LED on pin {}, token created available", config.led_pin);

        let activate = executor.spawn(owner_task(config.activate, &actuator, &clock, &cancel))?;
        let deactivate =
            executor.spawn(owner_task(config.deactivate, &actuator, &clock, &cancel))?;

        Ok(Self {
            config,
            executor,
            actuator,
            cancel,
            activate,
            deactivate,
        })
    }

    /// Run for `ticks` of virtual time.
    pub fn run_for(&mut self, ticks: u64) {
        self.executor.run_for(ticks);
    }

    /// Cancel both owners and let them wind down. A held token is released
    /// on the way out.
    pub fn shutdown(&mut self) {
        log::info!("shutting down");
        self.cancel.cancel();
        self.executor.run_until_idle();
    }

    /// The configuration the system was built with.
    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    /// The system clock.
    pub fn clock(&self) -> &Clock {
        self.executor.clock()
    }

    /// The shared LED.
    pub fn actuator(&self) -> &SharedActuator<P> {
        &self.actuator
    }

    /// The executor running both owners.
    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Id of the "turn on" owner.
    pub fn activate_id(&self) -> TaskId {
        self.activate
    }

    /// Id of the "turn off" owner.
    pub fn deactivate_id(&self) -> TaskId {
        self.deactivate
    }

    /// How an owner ended, or `None` while it runs.
    pub fn exit_status(&self, task_id: TaskId) -> Option<&TaskResult> {
        self.executor.exit_status(task_id)
    }

    /// Token instrumentation counters.
    pub fn stats(&self) -> SemaphoreStats {
        self.actuator.stats()
    }
}

fn owner_task<P: DigitalOutput + 'static>(
    config: OwnerConfig,
    actuator: &Arc<SharedActuator<P>>,
    clock: &Clock,
    cancel: &CancellationToken,
) -> Task {
    let actuator = actuator.clone();
    let clock = clock.clone();
    let cancel = cancel.clone();
    Task::with_config(config.task, move |id| {
        ResourceOwner::new(id, config, actuator, clock, cancel).run()
    })
}
