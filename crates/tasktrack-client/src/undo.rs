use std::time::Duration;

use tasktrack_shared::Task;
use tokio::time::Instant;
use tracing::debug;

use crate::timer::GraceTimer;

/// How long a deleted task stays restorable. Fixed; not extended by activity.
pub const GRACE_PERIOD: Duration = Duration::from_millis(5_000);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDeletion {
    pub task: Task,
    /// Position the task held in the active list when it was removed.
    pub index: usize,
    pub expires_at: Instant,
    pub token: u64,
}

impl PendingDeletion {
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        self.expires_at.saturating_duration_since(now)
    }
}

/// The single pending-deletion slot and the timer guarding it.
///
/// Staging a new deletion finalizes whatever was in the slot before. Each
/// staged deletion gets a fresh token so a stale timer can never clear a
/// newer deletion.
#[derive(Debug, Default)]
pub struct UndoSlot {
    pending: Option<PendingDeletion>,
    timer: Option<GraceTimer>,
    next_token: u64,
}

impl UndoSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages `task`, arming the timer built by `schedule` for the new token.
    /// Returns the deletion that was superseded, if any.
    pub fn stage<S>(&mut self, task: Task, index: usize, schedule: S) -> Option<PendingDeletion>
    where
        S: FnOnce(u64) -> GraceTimer,
    {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
        let superseded = self.pending.take();
        if let Some(old) = superseded.as_ref() {
            debug!(id = %old.task.id, token = old.token, "pending deletion finalized by newer delete");
        }

        self.next_token = self.next_token.wrapping_add(1);
        let token = self.next_token;
        let timer = schedule(token);

        debug!(id = %task.id, token, index, "staged pending deletion");
        self.pending = Some(PendingDeletion {
            task,
            index,
            expires_at: timer.deadline(),
            token,
        });
        self.timer = Some(timer);

        superseded
    }

    /// Empties the slot for an undo. Yields nothing once the deadline has
    /// passed, even if the timer has not run yet.
    pub fn take_for_undo(&mut self, now: Instant) -> Option<PendingDeletion> {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
        let pending = self.pending.take()?;
        if pending.is_expired(now) {
            debug!(id = %pending.task.id, token = pending.token, "undo after deadline ignored");
            return None;
        }
        Some(pending)
    }

    /// Timer callback. Clears the slot only if it still holds `token`.
    pub fn expire(&mut self, token: u64) -> Option<PendingDeletion> {
        if self.pending.as_ref().map(|p| p.token) != Some(token) {
            debug!(token, "stale grace timer ignored");
            return None;
        }
        self.timer = None;
        let expired = self.pending.take();
        if let Some(p) = expired.as_ref() {
            debug!(id = %p.task.id, token, "pending deletion expired");
        }
        expired
    }

    /// Drops a deletion whose deadline has passed but whose timer has not fired.
    pub fn sweep(&mut self, now: Instant) {
        if self.pending.as_ref().is_some_and(|p| p.is_expired(now)) {
            self.timer = None;
            self.pending = None;
        }
    }

    pub fn current(&self, now: Instant) -> Option<&PendingDeletion> {
        self.pending.as_ref().filter(|p| !p.is_expired(now))
    }

    pub fn holds(&self, id: &str) -> bool {
        self.pending.as_ref().is_some_and(|p| p.task.id == id)
    }
}
