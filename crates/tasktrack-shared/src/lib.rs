use serde::{
  Deserialize,
  Serialize
};

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct Task {
  pub id:          String,
  pub title:       String,
  pub description: String,
  #[serde(default)]
  pub completed:   bool
}

impl Task {
  pub fn same_content(
    &self,
    title: &str,
    description: &str
  ) -> bool {
    self.title == title
      && self.description
        == description
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct TaskCreate {
  pub title:       String,
  pub description: String,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub completed:   Option<bool>
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct TaskUpdate {
  pub id:          String,
  pub title:       String,
  pub description: String,
  pub completed:   bool
}

impl From<&Task> for TaskUpdate {
  fn from(task: &Task) -> Self {
    Self {
      id:          task.id.clone(),
      title:       task.title.clone(),
      description: task
        .description
        .clone(),
      completed:   task.completed
    }
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct TaskIdArg {
  pub id: String
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct ApiMessage {
  pub message: String,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub error:   Option<String>
}

impl ApiMessage {
  pub fn ok(
    message: impl Into<String>
  ) -> Self {
    Self {
      message: message.into(),
      error:   None
    }
  }

  pub fn failure(
    message: impl Into<String>,
    error: impl Into<String>
  ) -> Self {
    Self {
      message: message.into(),
      error:   Some(error.into())
    }
  }
}

pub const TASKS_PATH: &str =
  "/api/tasks";

pub const MSG_TASK_UPDATED: &str =
  "Task updated successfully";
pub const MSG_TASK_DELETED: &str =
  "Task deleted successfully";
pub const MSG_FETCH_FAILED: &str =
  "Failed to fetch tasks";
pub const MSG_ADD_FAILED: &str =
  "Failed to add task";
pub const MSG_UPDATE_FAILED: &str =
  "Failed to update task";
pub const MSG_DELETE_FAILED: &str =
  "Failed to delete task";
pub const MSG_METHOD_NOT_ALLOWED:
  &str = "Method Not Allowed";
