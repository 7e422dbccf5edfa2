use std::collections::HashSet;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tasktrack_shared::{Task, TaskCreate, TaskIdArg, TaskUpdate};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::command::Command;
use crate::error::{ErrorNotice, RemoteError, SessionError, ValidationError};
use crate::repository::TaskRepository;
use crate::task_list::TaskList;
use crate::timer::GraceTimer;
use crate::undo::{GRACE_PERIOD, PendingDeletion, UndoSlot};

/// What a successfully executed [`Command`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Listed(usize),
    Created(Task),
    Updated(String),
    Deleted(String),
}

#[derive(Debug, Default)]
struct SessionState {
    tasks: TaskList,
    undo: UndoSlot,
    notice: Option<ErrorNotice>,
    creating: HashSet<(String, String)>,
}

/// A title/description pair whose create is in flight. Released when the
/// call settles, or on drop if the create future is cancelled.
struct CreateClaim {
    state: Weak<Mutex<SessionState>>,
    key: Option<(String, String)>,
}

impl CreateClaim {
    fn release(mut self, state: &mut SessionState) {
        if let Some(key) = self.key.take() {
            state.creating.remove(&key);
        }
    }
}

impl Drop for CreateClaim {
    fn drop(&mut self) {
        if let Some(key) = self.key.take()
            && let Some(state) = self.state.upgrade()
        {
            state.lock().creating.remove(&key);
        }
    }
}

/// Owns the active task list, the pending-deletion slot and the surfaced
/// error. Its methods are the only way to mutate any of them.
///
/// The lock is never held across a repository call, so the grace timer can
/// always get in.
pub struct Session<R> {
    repo: R,
    state: Arc<Mutex<SessionState>>,
}

impl<R: TaskRepository> Session<R> {
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            state: Arc::new(Mutex::new(SessionState::default())),
        }
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.state.lock().tasks.as_slice().to_vec()
    }

    pub fn task(&self, id: &str) -> Option<Task> {
        self.state.lock().tasks.get(id).cloned()
    }

    pub fn pending_deletion(&self) -> Option<PendingDeletion> {
        let mut state = self.state.lock();
        state.undo.sweep(Instant::now());
        state.undo.current(Instant::now()).cloned()
    }

    pub fn error_notice(&self) -> Option<ErrorNotice> {
        self.state.lock().notice.clone()
    }

    /// Closes the surfaced error without retrying it.
    pub fn dismiss_error(&self) -> Option<ErrorNotice> {
        let dismissed = self.state.lock().notice.take();
        if let Some(notice) = dismissed.as_ref() {
            debug!(command = %notice.retry, "error notice dismissed");
        }
        dismissed
    }

    /// Loads the store's tasks, replacing the active list.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<usize, SessionError> {
        let result = self
            .repo
            .list()
            .await
            .map(|tasks| self.apply_listing(tasks));
        self.surface(Command::List, result)
    }

    /// Rejects empty fields and an identical title/description pair that is
    /// already in the active list or still being created, before anything
    /// is sent.
    #[instrument(skip(self, title, description))]
    pub async fn create(&self, title: &str, description: &str) -> Result<Task, SessionError> {
        let (title, description) = validate_fields(title, description)?;
        let claim = {
            let mut state = self.state.lock();
            let key = (title.clone(), description.clone());
            if state.tasks.contains_content(&title, &description)
                || state.creating.contains(&key)
            {
                debug!(title = %title, "duplicate create rejected");
                return Err(ValidationError::Duplicate { title }.into());
            }
            state.creating.insert(key.clone());
            CreateClaim {
                state: Arc::downgrade(&self.state),
                key: Some(key),
            }
        };

        let create = TaskCreate {
            title: title.clone(),
            description: description.clone(),
            completed: None,
        };
        let result = self.repo.create(&create).await;
        let result = {
            let mut state = self.state.lock();
            claim.release(&mut state);
            result.map(|task| {
                state.tasks.push(task.clone());
                task
            })
        };
        self.surface(Command::Create { title, description }, result)
    }

    #[instrument(skip(self, title, description))]
    pub async fn edit(&self, id: &str, title: &str, description: &str) -> Result<Task, SessionError> {
        let (title, description) = validate_fields(title, description)?;
        let edited = {
            let mut state = self.state.lock();
            state
                .tasks
                .edit(id, &title, &description)
                .cloned()
                .ok_or_else(|| ValidationError::UnknownTask(id.to_string()))?
        };
        debug!(completed = edited.completed, "task edited locally");

        self.push_update(TaskUpdate::from(&edited)).await?;
        Ok(edited)
    }

    #[instrument(skip(self))]
    pub async fn toggle_complete(&self, id: &str) -> Result<Task, SessionError> {
        let toggled = {
            let mut state = self.state.lock();
            state
                .tasks
                .toggle(id)
                .cloned()
                .ok_or_else(|| ValidationError::UnknownTask(id.to_string()))?
        };
        debug!(completed = toggled.completed, "task toggled locally");

        self.push_update(TaskUpdate::from(&toggled)).await?;
        Ok(toggled)
    }

    /// Removes the task from the active list, stages it for undo and issues
    /// the remote delete right away. A failed remote delete leaves the task
    /// removed and surfaces a retry.
    #[instrument(skip(self))]
    pub async fn request_delete(&self, id: &str) -> Result<Task, SessionError> {
        let task = {
            let mut state = self.state.lock();
            let (index, task) = state
                .tasks
                .remove(id)
                .ok_or_else(|| ValidationError::UnknownTask(id.to_string()))?;

            let weak = Arc::downgrade(&self.state);
            let superseded = state.undo.stage(task.clone(), index, move |token| {
                GraceTimer::schedule(GRACE_PERIOD, move || expire_pending(&weak, token))
            });
            if let Some(old) = superseded {
                info!(id = %old.task.id, "previous pending deletion is now final");
            }
            task
        };
        info!(grace_ms = GRACE_PERIOD.as_millis() as u64, "task removed; undo available");

        self.push_delete(task.id.clone()).await?;
        Ok(task)
    }

    /// Restores the pending deletion, if its grace period is still running.
    /// A surfaced failure of that task's delete is dropped with it.
    pub fn undo(&self) -> Option<Task> {
        let mut state = self.state.lock();
        let pending = state.undo.take_for_undo(Instant::now())?;
        if state.tasks.contains(&pending.task.id) {
            warn!(id = %pending.task.id, "undo skipped; task already in active list");
            return None;
        }
        state.tasks.insert(pending.index, pending.task.clone());
        info!(id = %pending.task.id, index = pending.index, "pending deletion restored");

        // a failed delete of the restored task must not be retried
        let stale_retry = state.notice.as_ref().is_some_and(|notice| {
            matches!(&notice.retry, Command::Delete { id } if *id == pending.task.id)
        });
        if stale_retry {
            state.notice = None;
            debug!(id = %pending.task.id, "cleared delete retry for restored task");
        }
        Some(pending.task)
    }

    /// Re-submits the command bound to the surfaced error. `Ok(None)` when
    /// there is nothing to retry.
    pub async fn retry(&self) -> Result<Option<CommandOutcome>, SessionError> {
        let Some(notice) = self.state.lock().notice.take() else {
            return Ok(None);
        };
        info!(command = %notice.retry, "retrying failed command");
        self.execute(notice.retry).await.map(Some)
    }

    /// Re-runs `command` with the arguments it carries. Remote failures
    /// become the current [`ErrorNotice`].
    pub async fn execute(&self, command: Command) -> Result<CommandOutcome, SessionError> {
        match command {
            Command::List => self.refresh().await.map(CommandOutcome::Listed),
            Command::Create { title, description } => self
                .create(&title, &description)
                .await
                .map(CommandOutcome::Created),
            Command::Update(update) => {
                let id = update.id.clone();
                self.push_update(update)
                    .await
                    .map(|()| CommandOutcome::Updated(id))
            }
            Command::Delete { id } => self
                .push_delete(id.clone())
                .await
                .map(|()| CommandOutcome::Deleted(id)),
        }
    }

    async fn push_update(&self, update: TaskUpdate) -> Result<(), SessionError> {
        let result = self.repo.update(&update).await;
        self.surface(Command::Update(update), result)
    }

    async fn push_delete(&self, id: String) -> Result<(), SessionError> {
        let result = self.repo.delete(&TaskIdArg { id: id.clone() }).await;
        self.surface(Command::Delete { id }, result)
    }

    fn surface<T>(&self, command: Command, result: Result<T, RemoteError>) -> Result<T, SessionError> {
        match result {
            Ok(value) => {
                debug!(command = %command, "command succeeded");
                Ok(value)
            }
            Err(err) => {
                warn!(command = %command, error = %err, "command failed; retry available");
                self.state.lock().notice = Some(ErrorNotice::new(command, &err));
                Err(err.into())
            }
        }
    }

    fn apply_listing(&self, mut tasks: Vec<Task>) -> usize {
        let mut state = self.state.lock();
        let before = tasks.len();
        tasks.retain(|task| !state.undo.holds(&task.id));
        if tasks.len() != before {
            debug!("listing still contains the pending deletion; kept it hidden");
        }
        state.tasks.replace(tasks);
        state.tasks.len()
    }
}

fn validate_fields(title: &str, description: &str) -> Result<(String, String), ValidationError> {
    let title = title.trim();
    let description = description.trim();
    if title.is_empty() {
        return Err(ValidationError::EmptyField("title"));
    }
    if description.is_empty() {
        return Err(ValidationError::EmptyField("description"));
    }
    Ok((title.to_string(), description.to_string()))
}

fn expire_pending(state: &Weak<Mutex<SessionState>>, token: u64) {
    let Some(state) = state.upgrade() else {
        return;
    };
    if let Some(expired) = state.lock().undo.expire(token) {
        info!(id = %expired.task.id, "grace period over; deletion is final");
    }
}
