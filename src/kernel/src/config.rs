//! System configuration.
//!
//! Defaults reproduce the reference firmware: the LED on pin 2, two
//! equal-priority tasks holding it for one second and backing off for 100 ms
//! between attempts, waiting for the token without bound.

use core::fmt;

use ledsem_hal::Level;

use crate::sync::Timeout;
use crate::task::TaskConfig;

/// Board pin driving the LED.
pub const LED_PIN: u8 = 2;

/// Ticks a task keeps the LED after setting it.
pub const DEFAULT_HOLD_TICKS: u64 = 1000;

/// Ticks a task idles between releasing and its next acquire.
pub const DEFAULT_COOLDOWN_TICKS: u64 = 100;

/// Parameters of one periodic resource owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnerConfig {
    /// Scheduler registration parameters.
    pub task: TaskConfig,
    /// Level this owner drives the LED to.
    pub target: Level,
    /// Ticks spent holding the token after the write.
    pub hold: u64,
    /// Ticks between release and the next acquire attempt.
    pub cooldown: u64,
    /// Bound on each acquire attempt.
    pub acquire_timeout: Timeout,
}

impl OwnerConfig {
    /// An owner driving the LED to `target` with the default timings.
    pub const fn new(name: &'static str, target: Level) -> Self {
        Self {
            task: TaskConfig::new(name),
            target,
            hold: DEFAULT_HOLD_TICKS,
            cooldown: DEFAULT_COOLDOWN_TICKS,
            acquire_timeout: Timeout::Forever,
        }
    }

    /// The "activate" owner.
    pub const fn turn_on() -> Self {
        Self::new("turn on LED", Level::On)
    }

    /// The "deactivate" owner.
    pub const fn turn_off() -> Self {
        Self::new("turn off LED", Level::Off)
    }

    /// Set the hold duration.
    pub const fn with_hold(mut self, ticks: u64) -> Self {
        self.hold = ticks;
        self
    }

    /// Set the cooldown duration.
    pub const fn with_cooldown(mut self, ticks: u64) -> Self {
        self.cooldown = ticks;
        self
    }

    /// Set the acquire bound.
    pub const fn with_acquire_timeout(mut self, timeout: Timeout) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Check that a cycle lets virtual time pass.
    ///
    /// With both hold and cooldown at 0 the owner never waits on the clock,
    /// so the executor never goes idle and time stands still.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hold == 0 && self.cooldown == 0 {
            return Err(ConfigError::ZeroPeriod {
                task: self.task.name,
            });
        }
        Ok(())
    }
}

/// A configuration the system refuses to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The owner's hold and cooldown are both 0 ticks.
    ZeroPeriod {
        /// Name of the offending owner.
        task: &'static str,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroPeriod { task } => {
                write!(f, "{}: hold and cooldown are both 0 ticks", task)
            }
        }
    }
}

/// Configuration of the whole two-task system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemConfig {
    /// Board pin of the LED; reported in logs.
    pub led_pin: u8,
    /// The owner driving the LED on.
    pub activate: OwnerConfig,
    /// The owner driving the LED off.
    pub deactivate: OwnerConfig,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            led_pin: LED_PIN,
            activate: OwnerConfig::turn_on(),
            deactivate: OwnerConfig::turn_off(),
        }
    }
}

impl SystemConfig {
    /// Set the hold duration of both owners.
    pub fn with_hold(mut self, ticks: u64) -> Self {
        self.activate = self.activate.with_hold(ticks);
        self.deactivate = self.deactivate.with_hold(ticks);
        self
    }

    /// Set the cooldown of both owners.
    pub fn with_cooldown(mut self, ticks: u64) -> Self {
        self.activate = self.activate.with_cooldown(ticks);
        self.deactivate = self.deactivate.with_cooldown(ticks);
        self
    }

    /// Set the acquire bound of both owners.
    pub fn with_acquire_timeout(mut self, timeout: Timeout) -> Self {
        self.activate = self.activate.with_acquire_timeout(timeout);
        self.deactivate = self.deactivate.with_acquire_timeout(timeout);
        self
    }

    /// Validate both owners.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.activate.validate()?;
        self.deactivate.validate()
    }
}
