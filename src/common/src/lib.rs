//! Types shared between the LedSem kernel, its HAL and host tools.

#![no_std]
#![warn(missing_docs)]

pub mod error;
pub mod task;

pub use error::{MisuseKind, SpawnError, SyncError};
pub use task::TaskId;
