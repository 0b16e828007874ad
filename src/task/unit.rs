//! Tasks and their admission predicate

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::kind::TaskKind;
use super::state::TaskState;
use crate::error::{ConsoleError, ConsoleResult, IncompatibilityError};

/// The work a task performs.
///
/// `execute` runs on a blocking worker and is the only place a task
/// touches a configuration store.
pub trait TaskBody: Send + Sync {
    fn kind(&self) -> TaskKind;

    fn description(&self) -> String;

    /// Backends the work touches
    fn backends(&self) -> BTreeSet<String>;

    /// Tool that performs the same change from the command line
    fn command_line_path(&self) -> Option<&str> {
        None
    }

    /// Arguments for [`TaskBody::command_line_path`]. Pure, no side effects.
    fn command_line_arguments(&self) -> Vec<String> {
        Vec::new()
    }

    /// Equivalent LDIF, for work expressed as LDAP modifications
    fn equivalent_ldif(&self) -> Option<String> {
        None
    }

    fn execute(&self) -> ConsoleResult<()>;
}

/// Render a command line, quoting arguments that need it
pub fn format_command_line(path: &str, arguments: &[String]) -> String {
    let mut line = path.to_string();
    for arg in arguments {
        line.push(' ');
        if arg.is_empty() || arg.chars().any(|c| c.is_whitespace() || "\"'()*&|!$".contains(c)) {
            line.push('"');
            line.push_str(&arg.replace('\\', "\\\\").replace('"', "\\\""));
            line.push('"');
        } else {
            line.push_str(arg);
        }
    }
    line
}

/// One unit of server-mutating work, used once
#[derive(Clone)]
pub struct Task {
    id: Uuid,
    server: String,
    body: Arc<dyn TaskBody>,
    state: TaskState,
    last_error: Option<ConsoleError>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl Task {
    /// New task against the server instance `server`
    pub fn new(server: impl Into<String>, body: impl TaskBody + 'static) -> Self {
        Self::from_body(server, Arc::new(body))
    }

    pub fn from_body(server: impl Into<String>, body: Arc<dyn TaskBody>) -> Self {
        Self {
            id: Uuid::new_v4(),
            server: server.into(),
            body,
            state: TaskState::Created,
            last_error: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn kind(&self) -> TaskKind {
        self.body.kind()
    }

    pub fn description(&self) -> String {
        self.body.description()
    }

    pub fn backends(&self) -> BTreeSet<String> {
        self.body.backends()
    }

    pub fn body(&self) -> &Arc<dyn TaskBody> {
        &self.body
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Error recorded when the task finished with error
    pub fn last_error(&self) -> Option<&ConsoleError> {
        self.last_error.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Equivalent command line, when the work has one
    pub fn command_line(&self) -> Option<String> {
        self.body
            .command_line_path()
            .map(|path| format_command_line(path, &self.body.command_line_arguments()))
    }

    /// CREATED -> RUNNING
    pub(crate) fn start(&mut self) -> ConsoleResult<()> {
        self.state = self.state.transition(TaskState::Running)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// RUNNING -> terminal, recording the error if any
    pub(crate) fn finish(&mut self, result: ConsoleResult<()>) -> ConsoleResult<()> {
        let next = match &result {
            Ok(()) => TaskState::FinishedSuccessfully,
            Err(_) => TaskState::FinishedWithError,
        };
        self.state = self.state.transition(next)?;
        self.last_error = result.err();
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    pub fn summary(&self) -> TaskSummary {
        TaskSummary {
            id: self.id,
            kind: self.kind(),
            description: self.description(),
            server: self.server.clone(),
            backends: self.backends(),
            state: self.state,
            error_code: self.last_error.as_ref().map(|e| e.code().to_string()),
            last_error: self.last_error.as_ref().map(ToString::to_string),
            created_at: self.created_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .field("description", &self.description())
            .field("server", &self.server)
            .field("state", &self.state)
            .field("last_error", &self.last_error)
            .finish()
    }
}

/// Snapshot of a task, detached from its body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSummary {
    pub id: Uuid,
    pub kind: TaskKind,
    pub description: String,
    pub server: String,
    pub backends: BTreeSet<String>,
    pub state: TaskState,
    pub error_code: Option<String>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Admission check of `candidate` against the tasks currently running.
///
/// A running task on the same server that shares a backend with the
/// candidate blocks it, unless the kind pair is allowed to overlap.
pub fn check_launch<'a>(
    candidate: &TaskSummary,
    running: impl IntoIterator<Item = &'a TaskSummary>,
) -> Result<(), IncompatibilityError> {
    for task in running {
        if task.state != TaskState::Running || !task.server.eq_ignore_ascii_case(&candidate.server) {
            continue;
        }
        let shared: Vec<String> = task
            .backends
            .intersection(&candidate.backends)
            .cloned()
            .collect();
        if !shared.is_empty() && !TaskKind::may_overlap(task.kind, candidate.kind) {
            return Err(IncompatibilityError {
                running: task.description.clone(),
                candidate: candidate.description.clone(),
                backends: shared,
            });
        }
    }
    Ok(())
}

pub fn can_launch<'a>(
    candidate: &TaskSummary,
    running: impl IntoIterator<Item = &'a TaskSummary>,
) -> bool {
    check_launch(candidate, running).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop {
        kind: TaskKind,
        backends: &'static [&'static str],
    }

    impl TaskBody for Noop {
        fn kind(&self) -> TaskKind {
            self.kind
        }
        fn description(&self) -> String {
            format!("{} on {}", self.kind, self.backends.join(","))
        }
        fn backends(&self) -> BTreeSet<String> {
            self.backends.iter().map(|b| b.to_string()).collect()
        }
        fn execute(&self) -> ConsoleResult<()> {
            Ok(())
        }
    }

    fn running(kind: TaskKind, backends: &'static [&'static str]) -> TaskSummary {
        let mut task = Task::new("localhost", Noop { kind, backends });
        task.start().unwrap();
        task.summary()
    }

    fn candidate(kind: TaskKind, backends: &'static [&'static str]) -> TaskSummary {
        Task::new("localhost", Noop { kind, backends }).summary()
    }

    #[test]
    fn test_shared_backend_blocks() {
        let r = running(TaskKind::ModifyIndex, &["userRoot"]);
        let err = check_launch(&candidate(TaskKind::DeleteIndex, &["userRoot"]), [&r]).unwrap_err();
        assert_eq!(err.running, "modify-index on userRoot");
        assert_eq!(err.backends, vec!["userRoot".to_string()]);
    }

    #[test]
    fn test_disjoint_backends_pass() {
        let r = running(TaskKind::ModifyIndex, &["userRoot"]);
        assert!(can_launch(&candidate(TaskKind::ModifyIndex, &["other"]), [&r]));
    }

    #[test]
    fn test_other_server_ignored() {
        let mut r = running(TaskKind::ModifyIndex, &["userRoot"]);
        r.server = "ds2.example.com".into();
        assert!(can_launch(&candidate(TaskKind::ModifyIndex, &["userRoot"]), [&r]));
    }

    #[test]
    fn test_allow_listed_pair_overlaps() {
        let r = running(TaskKind::VerifyIndex, &["userRoot"]);
        assert!(can_launch(&candidate(TaskKind::Backup, &["userRoot"]), [&r]));
        assert!(!can_launch(&candidate(TaskKind::RebuildIndex, &["userRoot"]), [&r]));
    }

    #[test]
    fn test_finish_records_error() {
        let mut task = Task::new("localhost", Noop {
            kind: TaskKind::NewIndex,
            backends: &["userRoot"],
        });
        assert!(task.finish(Ok(())).is_err());
        task.start().unwrap();
        task.finish(Err(ConsoleError::local("disk full"))).unwrap();
        assert_eq!(task.state(), TaskState::FinishedWithError);
        assert_eq!(task.last_error().unwrap().code(), "DSC_CONFIG_LOCAL");
        assert!(task.start().is_err());
        assert_eq!(task.summary().error_code.as_deref(), Some("DSC_CONFIG_LOCAL"));
    }

    #[test]
    fn test_format_command_line_quotes() {
        let line = format_command_line(
            "dsconfig",
            &["--set".to_string(), "filter:(objectClass=*)".to_string()],
        );
        assert_eq!(line, "dsconfig --set \"filter:(objectClass=*)\"");
    }
}
