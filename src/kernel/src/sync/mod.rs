//! Synchronization primitives for async kernel tasks.
//!
//! These primitives integrate with the kernel's cooperative executor. Unlike
//! traditional blocking primitives, they yield control to the scheduler when
//! contended.
//!
//! # Primitives
//!
//! - [`BinarySemaphore`]: ownership-checked token granting exclusive access
//! - [`CancellationToken`]: cooperative stop signal for supervised tasks
//!
//! # Example
//!
//! ```ignore
//! use ledsem_kernel::sync::{BinarySemaphore, Timeout};
//!
//! let token = BinarySemaphore::new(clock.clone());
//! let guard = token.acquire(me, Timeout::Ticks(500)).await?;
//! // ... exclusive section ...
//! guard.release()?;
//! ```

mod cancel;
mod semaphore;

pub use cancel::{CancellationToken, Cancelled};
pub use semaphore::{Acquire, BinarySemaphore, SemaphoreGuard, SemaphoreStats, Timeout};
