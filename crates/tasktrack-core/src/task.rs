use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tasktrack_shared::{Task, TaskCreate, TaskUpdate};
use uuid::Uuid;

/// A task as it sits in the collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskDocument {
    pub id: String,

    pub title: String,

    pub description: String,

    #[serde(default)]
    pub completed: bool,

    pub created: DateTime<Utc>,

    pub modified: DateTime<Utc>,
}

impl TaskDocument {
    pub fn new(create: TaskCreate, now: DateTime<Utc>) -> Self {
        Self {
            id: new_document_id(),
            title: create.title,
            description: create.description,
            completed: create.completed.unwrap_or(false),
            created: now,
            modified: now,
        }
    }

    pub fn apply(&mut self, update: TaskUpdate, now: DateTime<Utc>) {
        self.title = update.title;
        self.description = update.description;
        self.completed = update.completed;
        self.modified = now;
    }

    pub fn to_task(&self) -> Task {
        Task {
            id: self.id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            completed: self.completed,
        }
    }
}

pub fn new_document_id() -> String {
    Uuid::new_v4().simple().to_string()
}
