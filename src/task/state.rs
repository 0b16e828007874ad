//! Task state machine
//!
//! `CREATED -> RUNNING -> FINISHED_SUCCESSFULLY | FINISHED_WITH_ERROR`.
//! Terminal states are final and a task never goes back to RUNNING.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ConsoleError, ConsoleResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    /// Built but not admitted
    Created,
    /// Admitted, executing on a worker
    Running,
    FinishedSuccessfully,
    FinishedWithError,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Created => "CREATED",
            TaskState::Running => "RUNNING",
            TaskState::FinishedSuccessfully => "FINISHED_SUCCESSFULLY",
            TaskState::FinishedWithError => "FINISHED_WITH_ERROR",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::FinishedSuccessfully | TaskState::FinishedWithError
        )
    }

    pub fn can_transition_to(&self, next: TaskState) -> bool {
        matches!(
            (self, next),
            (TaskState::Created, TaskState::Running)
                | (TaskState::Running, TaskState::FinishedSuccessfully)
                | (TaskState::Running, TaskState::FinishedWithError)
        )
    }

    /// Checked transition
    pub fn transition(self, next: TaskState) -> ConsoleResult<TaskState> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(ConsoleError::internal(format!(
                "illegal task transition {} -> {}",
                self, next
            )))
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
