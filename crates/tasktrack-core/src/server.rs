//! HTTP front of the task collection.
//!
//! A single resource, `/api/tasks`, dispatched on method:
//!
//! - `GET` lists every task (200)
//! - `POST` creates one and answers it with its new id (201)
//! - `PUT` replaces title, description and completion of an existing task (200)
//! - `DELETE` removes a task by id (200, also when it was already gone)
//!
//! Store failures and unparseable bodies answer 500 with the operation's
//! failure message, any other method 405.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use chrono::Utc;
use parking_lot::Mutex;
use tasktrack_shared::{
    ApiMessage, MSG_ADD_FAILED, MSG_DELETE_FAILED, MSG_FETCH_FAILED, MSG_METHOD_NOT_ALLOWED,
    MSG_TASK_DELETED, MSG_TASK_UPDATED, MSG_UPDATE_FAILED, TASKS_PATH,
    Task, TaskCreate, TaskIdArg, TaskUpdate,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::datastore::DataStore;
use crate::task::TaskDocument;

#[derive(Clone)]
struct AppState {
    store: Arc<Mutex<DataStore>>,
}

pub fn router(store: DataStore) -> Router {
    let state = AppState {
        store: Arc::new(Mutex::new(store)),
    };

    Router::new()
        .route(
            TASKS_PATH,
            get(handle_list)
                .post(handle_create)
                .put(handle_update)
                .delete(handle_delete)
                .fallback(handle_method_not_allowed),
        )
        .with_state(state)
}

/// The service running on a background tokio task.
pub struct TaskServer {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl TaskServer {
    /// Binds `listen` (port `0` picks a free one) and starts serving.
    pub async fn start(store: DataStore, listen: &str) -> anyhow::Result<Self> {
        let listener = bind(listen).await?;
        let addr = listener.local_addr()?;
        let app = router(store);

        info!("task server listening on http://{addr}{TASKS_PATH}");

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("task server error: {e}");
            }
        });

        Ok(Self { addr, handle })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for TaskServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Serves in the foreground until SIGINT/SIGTERM.
pub async fn serve_until_shutdown(store: DataStore, listen: &str) -> anyhow::Result<()> {
    let listener = bind(listen).await?;
    let addr = listener.local_addr()?;
    info!("task server listening on http://{addr}{TASKS_PATH}");

    axum::serve(listener, router(store))
        .with_graceful_shutdown(wait_for_shutdown_signal())
        .await?;

    info!("task server stopped");
    Ok(())
}

async fn bind(listen: &str) -> anyhow::Result<TcpListener> {
    TcpListener::bind(listen)
        .await
        .map_err(|e| anyhow::anyhow!("task server bind to {listen} failed: {e}"))
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(error) => {
            error!(%error, "failed to register SIGTERM handler; falling back to ctrl_c");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
    warn!("received shutdown signal");
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        error!(%error, "failed waiting for ctrl_c signal");
    }
    warn!("received shutdown signal");
}

fn failure(message: &str, err: &anyhow::Error) -> Response {
    let detail = format!("{err:#}");
    error!(error = %detail, "{message}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiMessage::failure(message, detail)),
    )
        .into_response()
}

fn rejected(message: &str, rejection: JsonRejection) -> Response {
    let detail = rejection.body_text();
    warn!(error = %detail, "rejected request body");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiMessage::failure(message, detail)),
    )
        .into_response()
}

async fn handle_list(State(state): State<AppState>) -> Response {
    let result = state.store.lock().load_tasks();
    match result {
        Ok(docs) => {
            let tasks: Vec<Task> = docs.iter().map(TaskDocument::to_task).collect();
            info!(count = tasks.len(), "listed tasks");
            (StatusCode::OK, Json(tasks)).into_response()
        }
        Err(err) => failure(MSG_FETCH_FAILED, &err),
    }
}

async fn handle_create(
    State(state): State<AppState>,
    payload: Result<Json<TaskCreate>, JsonRejection>,
) -> Response {
    let Json(create) = match payload {
        Ok(body) => body,
        Err(rejection) => return rejected(MSG_ADD_FAILED, rejection),
    };

    let result = state.store.lock().insert(create, Utc::now());
    match result {
        Ok(doc) => {
            info!(id = %doc.id, "created task");
            (StatusCode::CREATED, Json(doc.to_task())).into_response()
        }
        Err(err) => failure(MSG_ADD_FAILED, &err),
    }
}

async fn handle_update(
    State(state): State<AppState>,
    payload: Result<Json<TaskUpdate>, JsonRejection>,
) -> Response {
    let Json(update) = match payload {
        Ok(body) => body,
        Err(rejection) => return rejected(MSG_UPDATE_FAILED, rejection),
    };

    let id = update.id.clone();
    let result = state.store.lock().update(update, Utc::now());
    match result {
        Ok(doc) => {
            info!(id = %id, completed = doc.completed, "updated task");
            (StatusCode::OK, Json(ApiMessage::ok(MSG_TASK_UPDATED))).into_response()
        }
        Err(err) => failure(MSG_UPDATE_FAILED, &err),
    }
}

async fn handle_delete(
    State(state): State<AppState>,
    payload: Result<Json<TaskIdArg>, JsonRejection>,
) -> Response {
    let Json(arg) = match payload {
        Ok(body) => body,
        Err(rejection) => return rejected(MSG_DELETE_FAILED, rejection),
    };

    let result = state.store.lock().delete(&arg.id);
    match result {
        Ok(removed) => {
            info!(id = %arg.id, removed, "deleted task");
            (StatusCode::OK, Json(ApiMessage::ok(MSG_TASK_DELETED))).into_response()
        }
        Err(err) => failure(MSG_DELETE_FAILED, &err),
    }
}

async fn handle_method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(ApiMessage::ok(MSG_METHOD_NOT_ALLOWED)),
    )
        .into_response()
}
