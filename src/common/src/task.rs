//! Task identity.

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

/// A unique identifier for a task.
///
/// Identifiers start at 1; the raw value 0 never names a task, which lets
/// lock words use it as an "unowned" marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TaskId(u64);

impl TaskId {
    /// Generate the next unique TaskId.
    pub fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        TaskId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Rebuild an id from its raw value. Returns `None` for the reserved 0.
    pub const fn from_raw(raw: u64) -> Option<Self> {
        if raw == 0 {
            None
        } else {
            Some(TaskId(raw))
        }
    }

    /// The raw value of this id.
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique_and_nonzero() {
        let a = TaskId::next();
        let b = TaskId::next();
        assert_ne!(a, b);
        assert_ne!(a.as_u64(), 0);
        assert_eq!(TaskId::from_raw(a.as_u64()), Some(a));
        assert_eq!(TaskId::from_raw(0), None);
    }
}
