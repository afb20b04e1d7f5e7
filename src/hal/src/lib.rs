//! LedSem Hardware Abstraction Layer (HAL) traits.
//!
//! This crate defines the traits the kernel needs from a board: one digital
//! output line, a tick source and a line-oriented text sink.

#![no_std]

use core::fmt;

/// Logic level of a digital output line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    /// Driven high (LED lit).
    On,
    /// Driven low (LED dark).
    Off,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::On => write!(f, "ON"),
            Level::Off => write!(f, "OFF"),
        }
    }
}

/// Trait for a binary digital output such as an LED pin.
///
/// There is no read-back: callers that need the current level must track
/// what they last wrote.
pub trait DigitalOutput {
    /// Error reported by the driver when a write fails.
    type Error: fmt::Debug;

    /// Drives the line to `level`.
    fn set(&mut self, level: Level) -> Result<(), Self::Error>;
}

/// Trait for a text-based console output.
pub trait Console {
    /// Writes a string to the console.
    fn write_str(&mut self, s: &str);
}

/// Trait for a system timer.
pub trait Timer {
    /// Returns the number of ticks since the system started.
    fn current_ticks(&self) -> u64;
}
