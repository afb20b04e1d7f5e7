//! System-wide error types for LedSem.

use core::fmt;

use crate::task::TaskId;

/// Errors raised while coordinating access to the shared actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SyncError {
    /// The token could not be obtained before the wait bound expired.
    /// Recoverable: the caller may retry on its next cycle.
    AcquisitionTimeout {
        /// Ticks spent waiting before giving up.
        waited: u64,
    },
    /// The token was used against its contract. Fatal to the offending task.
    Misuse(MisuseKind),
    /// The actuator rejected a write. Fatal to the owning task.
    ResourceFault,
}

impl SyncError {
    /// Whether the task that hit this error may keep running.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SyncError::AcquisitionTimeout { .. })
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::AcquisitionTimeout { waited } => {
                write!(f, "token not acquired after {} ticks", waited)
            }
            SyncError::Misuse(kind) => write!(f, "token misuse: {}", kind),
            SyncError::ResourceFault => write!(f, "actuator write failed"),
        }
    }
}

/// The ways the token contract can be broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MisuseKind {
    /// Release called while the token was available.
    NotHeld,
    /// Release called by a task other than the holder.
    NotOwner {
        /// The task actually holding the token.
        holder: TaskId,
    },
    /// Acquire called by the task that already holds the token.
    Reentrant,
}

impl fmt::Display for MisuseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MisuseKind::NotHeld => write!(f, "release without a matching acquire"),
            MisuseKind::NotOwner { holder } => write!(f, "release by non-holder (held by {})", holder),
            MisuseKind::Reentrant => write!(f, "acquire while already holding the token"),
        }
    }
}

/// Task registration error types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SpawnError {
    /// The scheduler has no room for another task.
    QueueFull,
}

impl fmt::Display for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpawnError::QueueFull => write!(f, "task queue full"),
        }
    }
}
