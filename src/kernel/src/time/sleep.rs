use core::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use super::{Clock, TimerKey};

/// Future returned by [`Clock::sleep`] and [`Clock::sleep_until`].
///
/// Dropping it before it completes disarms its timer.
pub struct Sleep {
    clock: Clock,
    deadline: u64,
    key: Option<TimerKey>,
}

impl Sleep {
    pub(super) fn new(clock: Clock, deadline: u64) -> Self {
        Self {
            clock,
            deadline,
            key: None,
        }
    }

    /// Whether the deadline has been reached.
    pub fn is_elapsed(&self) -> bool {
        self.clock.now() >= self.deadline
    }
}

impl Future for Sleep {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if this.is_elapsed() {
            if let Some(key) = this.key.take() {
                this.clock.cancel(key);
            }
            return Poll::Ready(());
        }

        this.key = Some(this.clock.register(this.key, this.deadline, cx.waker()));
        Poll::Pending
    }
}

impl Drop for Sleep {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.clock.cancel(key);
        }
    }
}
