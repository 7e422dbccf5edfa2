use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tasktrack_shared::{ApiMessage, TASKS_PATH, Task, TaskCreate, TaskIdArg, TaskUpdate};
use tracing::{debug, error, instrument, warn};

use crate::error::RemoteError;

/// CRUD bridge to the task store. Failures are returned, never swallowed.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn list(&self) -> Result<Vec<Task>, RemoteError>;

    async fn create(&self, create: &TaskCreate) -> Result<Task, RemoteError>;

    async fn update(&self, update: &TaskUpdate) -> Result<(), RemoteError>;

    async fn delete(&self, arg: &TaskIdArg) -> Result<(), RemoteError>;
}

#[derive(Debug, Clone)]
pub struct HttpTaskRepository {
    client: reqwest::Client,
    tasks_url: String,
}

impl HttpTaskRepository {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        let tasks_url = format!("{}{TASKS_PATH}", base_url.trim_end_matches('/'));
        Self { client, tasks_url }
    }

    pub fn tasks_url(&self) -> &str {
        &self.tasks_url
    }

    async fn send<B>(&self, method: Method, body: Option<&B>) -> Result<Response, RemoteError>
    where
        B: Serialize + ?Sized + Sync,
    {
        let mut request = self.client.request(method.clone(), &self.tasks_url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|err| {
            error!(%method, url = %self.tasks_url, error = %err, "task store request failed");
            RemoteError::from(err)
        })?;

        let status = response.status();
        debug!(%method, status = status.as_u16(), "task store responded");
        if status.is_success() {
            return Ok(response);
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(err) => {
                warn!(%method, status = status.as_u16(), error = %err, "failed to read error body");
                String::new()
            }
        };
        let message = serde_json::from_str::<ApiMessage>(&body)
            .map(|msg| match msg.error {
                Some(detail) => format!("{} ({detail})", msg.message),
                None => msg.message,
            })
            .unwrap_or(body);
        error!(%method, status = status.as_u16(), message = %message, "task store returned error");
        Err(RemoteError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

async fn decode<R>(response: Response) -> Result<R, RemoteError>
where
    R: DeserializeOwned,
{
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| RemoteError::Decode(e.to_string()))
}

#[async_trait]
impl TaskRepository for HttpTaskRepository {
    #[instrument(skip(self))]
    async fn list(&self) -> Result<Vec<Task>, RemoteError> {
        let response = self.send::<()>(Method::GET, None).await?;
        let tasks: Vec<Task> = decode(response).await?;
        debug!(count = tasks.len(), "listed tasks");
        Ok(tasks)
    }

    #[instrument(skip(self, create), fields(title_len = create.title.len()))]
    async fn create(&self, create: &TaskCreate) -> Result<Task, RemoteError> {
        let response = self.send(Method::POST, Some(create)).await?;
        let task: Task = decode(response).await?;
        debug!(id = %task.id, "created task");
        Ok(task)
    }

    #[instrument(skip(self, update), fields(id = %update.id))]
    async fn update(&self, update: &TaskUpdate) -> Result<(), RemoteError> {
        let response = self.send(Method::PUT, Some(update)).await?;
        let ack: ApiMessage = decode(response).await?;
        debug!(message = %ack.message, "updated task");
        Ok(())
    }

    #[instrument(skip(self, arg), fields(id = %arg.id))]
    async fn delete(&self, arg: &TaskIdArg) -> Result<(), RemoteError> {
        let response = self.send(Method::DELETE, Some(arg)).await?;
        let ack: ApiMessage = decode(response).await?;
        debug!(message = %ack.message, "deleted task");
        Ok(())
    }
}
