//! Task coordination
//!
//! Every configuration change runs as a [`Task`]. The [`TaskCoordinator`]
//! admits a task only when no running task on the same server touches one
//! of its backends, unless the two kinds are allowed to overlap.
//!
//! # Invariants
//!
//! - Admission is checked and recorded atomically
//! - A running task cannot be cancelled and always reaches a terminal state
//! - Tasks are never restarted

mod coordinator;
mod kind;
mod state;
mod unit;

pub use coordinator::{TaskCoordinator, TaskHandle};
pub use kind::TaskKind;
pub use state::TaskState;
pub use unit::{can_launch, check_launch, format_command_line, Task, TaskBody, TaskSummary};
