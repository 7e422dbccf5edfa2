use std::fmt;

use tasktrack_shared::TaskUpdate;

/// A remote operation together with the exact arguments it was issued with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    Create { title: String, description: String },
    Update(TaskUpdate),
    Delete { id: String },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::List => "list",
            Command::Create { .. } => "create",
            Command::Update(_) => "update",
            Command::Delete { .. } => "delete",
        }
    }

    pub fn failure_label(&self) -> &'static str {
        match self {
            Command::List => tasktrack_shared::MSG_FETCH_FAILED,
            Command::Create { .. } => tasktrack_shared::MSG_ADD_FAILED,
            Command::Update(_) => tasktrack_shared::MSG_UPDATE_FAILED,
            Command::Delete { .. } => tasktrack_shared::MSG_DELETE_FAILED,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::List => write!(f, "list"),
            Command::Create { title, .. } => write!(f, "create {title:?}"),
            Command::Update(update) => write!(f, "update id={}", update.id),
            Command::Delete { id } => write!(f, "delete id={id}"),
        }
    }
}
