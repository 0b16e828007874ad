//! Task admission and execution
//!
//! The admission check and the RUNNING registration happen under one mutex,
//! so two conflicting tasks can never both be admitted. Admitted work runs
//! on `spawn_blocking`; a drop guard removes the registration on every exit
//! path, panics included.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::state::TaskState;
use super::unit::{check_launch, Task, TaskSummary};
use crate::error::{ConsoleError, ConsoleResult};
use crate::observability::Event;

#[derive(Default)]
struct Registry {
    running: Mutex<HashMap<Uuid, TaskSummary>>,
    history: Mutex<Vec<TaskSummary>>,
}

fn lock<T>(mutex: &Mutex<T>) -> ConsoleResult<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| ConsoleError::internal("Lock poisoned"))
}

impl Registry {
    fn complete(&self, id: Uuid, summary: TaskSummary) {
        // Drop cannot report errors; a poisoned registry is still cleaned up
        self.running
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&id);
        self.history
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(summary);
    }
}

/// Releases the RUNNING registration when the worker exits
struct Registration {
    registry: Arc<Registry>,
    id: Uuid,
    finished: Option<TaskSummary>,
}

impl Drop for Registration {
    fn drop(&mut self) {
        let summary = match self.finished.take() {
            Some(summary) => summary,
            None => {
                let running = self
                    .registry
                    .running
                    .lock()
                    .unwrap_or_else(|p| p.into_inner())
                    .get(&self.id)
                    .cloned();
                let Some(mut summary) = running else {
                    return;
                };
                error!(task_id = %self.id, "task worker exited without finishing");
                summary.state = TaskState::FinishedWithError;
                summary.error_code = Some("DSC_INTERNAL".to_string());
                summary.last_error = Some("internal error: task worker panicked".to_string());
                summary.finished_at = Some(Utc::now());
                summary
            }
        };
        self.registry.complete(self.id, summary);
    }
}

/// Handle on an admitted task
#[derive(Debug)]
pub struct TaskHandle {
    id: Uuid,
    join: JoinHandle<Task>,
}

impl TaskHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Wait for the task to reach a terminal state
    pub async fn wait(self) -> ConsoleResult<Task> {
        self.join
            .await
            .map_err(|e| ConsoleError::internal(format!("task worker failed: {}", e)))
    }
}

/// Admits tasks and runs them on background workers
#[derive(Clone, Default)]
pub struct TaskCoordinator {
    registry: Arc<Registry>,
}

impl TaskCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit `task` and start it. Must be called from a tokio runtime.
    ///
    /// A refusal is returned as `ConsoleError::Incompatible` and the task is
    /// discarded without running.
    pub fn submit(&self, mut task: Task) -> ConsoleResult<TaskHandle> {
        let id = task.id();
        {
            let mut running = lock(&self.registry.running)?;
            if let Err(refusal) = check_launch(&task.summary(), running.values()) {
                warn!(
                    event = %Event::TaskRejected,
                    task_id = %id,
                    kind = %task.kind(),
                    reason = %refusal,
                    "task rejected"
                );
                return Err(refusal.into());
            }
            task.start()?;
            running.insert(id, task.summary());
        }

        info!(
            event = %Event::TaskAdmitted,
            task_id = %id,
            kind = %task.kind(),
            server = task.server(),
            description = %task.description(),
            "task admitted"
        );

        let mut registration = Registration {
            registry: self.registry.clone(),
            id,
            finished: None,
        };
        let join = tokio::task::spawn_blocking(move || {
            let body = task.body().clone();
            let result = body.execute();
            if let Err(e) = task.finish(result) {
                error!(task_id = %id, error = %e, "task state error");
            }
            match task.last_error() {
                None => info!(event = %Event::TaskFinished, task_id = %id, "task finished"),
                Some(e) => warn!(
                    event = %Event::TaskFailed,
                    task_id = %id,
                    code = e.code(),
                    error = %e,
                    "task failed"
                ),
            }
            registration.finished = Some(task.summary());
            drop(registration);
            task
        });

        Ok(TaskHandle { id, join })
    }

    /// Tasks currently RUNNING
    pub fn running(&self) -> ConsoleResult<Vec<TaskSummary>> {
        let running = lock(&self.registry.running)?;
        let mut tasks: Vec<TaskSummary> = running.values().cloned().collect();
        tasks.sort_by_key(|t| t.started_at);
        Ok(tasks)
    }

    /// Finished tasks in completion order
    pub fn history(&self) -> ConsoleResult<Vec<TaskSummary>> {
        Ok(lock(&self.registry.history)?.clone())
    }

    pub fn is_running(&self, id: Uuid) -> ConsoleResult<bool> {
        Ok(lock(&self.registry.running)?.contains_key(&id))
    }
}

impl std::fmt::Debug for TaskCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskCoordinator").finish_non_exhaustive()
    }
}
