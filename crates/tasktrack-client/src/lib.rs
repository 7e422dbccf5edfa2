//! Client side of tasktrack: the task repository, the optimistic task list,
//! and the undo-delete grace window, tied together by [`Session`].

pub mod command;
pub mod error;
pub mod repository;
pub mod session;
pub mod task_list;
pub mod timer;
pub mod undo;

pub use command::Command;
pub use error::{ErrorNotice, RemoteError, SessionError, ValidationError};
pub use repository::{HttpTaskRepository, TaskRepository};
pub use session::{CommandOutcome, Session};
pub use task_list::TaskList;
pub use undo::{GRACE_PERIOD, PendingDeletion};
