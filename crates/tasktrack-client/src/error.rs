use thiserror::Error;

use crate::command::Command;

/// Rejected locally, before any remote call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    EmptyField(&'static str),

    #[error("a task titled {title:?} with the same description already exists")]
    Duplicate { title: String },

    #[error("no task with id={0}")]
    UnknownTask(String),
}

/// Any failure talking to the task store.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("store answered {status}: {message}")]
    Status { status: u16, message: String },

    #[error("could not decode store response: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl SessionError {
    pub fn is_validation(&self) -> bool {
        matches!(self, SessionError::Validation(_))
    }
}

/// A failure surfaced to the user, bound to the command that produced it.
///
/// Retrying re-submits `retry` verbatim; dismissing drops the notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorNotice {
    pub message: String,
    pub retry: Command,
}

impl ErrorNotice {
    pub fn new(retry: Command, err: &RemoteError) -> Self {
        Self {
            message: format!("{}: {err}", retry.failure_label()),
            retry,
        }
    }
}
