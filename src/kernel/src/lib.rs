//! LedSem Kernel
//!
//! A small cooperative real-time kernel in which two periodic tasks share one
//! LED through a binary semaphore.
//!
//! # Architecture
//!
//! The kernel is structured into the following modules:
//! - `time`: virtual tick clock and timer queue
//! - `task`: tasks, the priority executor and the periodic resource owners
//! - `sync`: the binary semaphore and cancellation token
//! - `resource`: the shared actuator, writable only while holding its token
//! - `system`: wiring of the two-task topology
//! - `console`: `log` backend writing to a HAL console
//!
//! # Safety
//!
//! This is a `#![no_std]` kernel. All unsafe code is documented with safety
//! invariants explaining why the usage is correct.

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

extern crate alloc;

pub mod config;
pub mod console;
pub mod resource;
pub mod sync;
pub mod system;
pub mod task;
pub mod testutil;
pub mod time;

pub use ledsem_common::{MisuseKind, SpawnError, SyncError, TaskId};
pub use ledsem_hal::Level;
