use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};

/// A one-shot callback scheduled on the tokio timer, cancellable until it fires.
///
/// Dropping the timer cancels it.
#[derive(Debug)]
pub struct GraceTimer {
    deadline: Instant,
    handle: JoinHandle<()>,
}

impl GraceTimer {
    /// Must be called from within a tokio runtime.
    pub fn schedule<F>(after: Duration, on_expire: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let deadline = Instant::now() + after;
        let handle = tokio::spawn(async move {
            sleep_until(deadline).await;
            on_expire();
        });
        Self { deadline, handle }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn cancel(self) {
        self.handle.abort();
    }
}

impl Drop for GraceTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
