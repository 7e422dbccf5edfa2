use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tasktrack_client::{RemoteError, TaskRepository};
use tasktrack_shared::{Task, TaskCreate, TaskIdArg, TaskUpdate};

/// In-memory task store with scripted failures and call counters.
#[derive(Clone, Default)]
pub struct FakeRepository {
    inner: Arc<Mutex<FakeInner>>,
}

#[derive(Default)]
struct FakeInner {
    tasks: Vec<Task>,
    next_id: u64,
    calls: HashMap<&'static str, usize>,
    failures: HashMap<&'static str, usize>,
    updates: Vec<TaskUpdate>,
    deletes: Vec<String>,
    create_latency: Option<Duration>,
}

#[allow(dead_code)]
impl FakeRepository {
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        let repo = Self::default();
        repo.inner.lock().tasks = tasks;
        repo
    }

    /// The next `times` calls of `op` fail with a 500.
    pub fn fail(&self, op: &'static str, times: usize) {
        self.inner.lock().failures.insert(op, times);
    }

    /// Every create waits `latency` before reaching the store.
    pub fn slow_create(&self, latency: Duration) {
        self.inner.lock().create_latency = Some(latency);
    }

    pub fn calls(&self, op: &'static str) -> usize {
        self.inner.lock().calls.get(op).copied().unwrap_or(0)
    }

    pub fn stored(&self) -> Vec<Task> {
        self.inner.lock().tasks.clone()
    }

    pub fn updates(&self) -> Vec<TaskUpdate> {
        self.inner.lock().updates.clone()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.inner.lock().deletes.clone()
    }

    fn enter(&self, op: &'static str) -> Result<(), RemoteError> {
        let mut inner = self.inner.lock();
        *inner.calls.entry(op).or_default() += 1;
        if let Some(left) = inner.failures.get_mut(op)
            && *left > 0
        {
            *left -= 1;
            return Err(RemoteError::Status {
                status: 500,
                message: format!("{op} failed"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl TaskRepository for FakeRepository {
    async fn list(&self) -> Result<Vec<Task>, RemoteError> {
        self.enter("list")?;
        Ok(self.inner.lock().tasks.clone())
    }

    async fn create(&self, create: &TaskCreate) -> Result<Task, RemoteError> {
        self.enter("create")?;
        let latency = self.inner.lock().create_latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let task = Task {
            id: format!("doc-{}", inner.next_id),
            title: create.title.clone(),
            description: create.description.clone(),
            completed: create.completed.unwrap_or(false),
        };
        inner.tasks.push(task.clone());
        Ok(task)
    }

    async fn update(&self, update: &TaskUpdate) -> Result<(), RemoteError> {
        self.enter("update")?;
        let mut inner = self.inner.lock();
        inner.updates.push(update.clone());
        let task = inner
            .tasks
            .iter_mut()
            .find(|task| task.id == update.id)
            .ok_or_else(|| RemoteError::Status {
                status: 500,
                message: "no such document".to_string(),
            })?;
        task.title = update.title.clone();
        task.description = update.description.clone();
        task.completed = update.completed;
        Ok(())
    }

    async fn delete(&self, arg: &TaskIdArg) -> Result<(), RemoteError> {
        self.enter("delete")?;
        let mut inner = self.inner.lock();
        inner.deletes.push(arg.id.clone());
        inner.tasks.retain(|task| task.id != arg.id);
        Ok(())
    }
}

pub fn task(id: &str, title: &str, description: &str) -> Task {
    Task {
        id: id.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        completed: false,
    }
}
