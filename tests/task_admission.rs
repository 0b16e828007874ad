//! Task Admission Tests
//!
//! Tests for coordinator invariants:
//! - Two conflicting tasks on one backend never run together
//! - Disjoint backends and allow-listed kinds run concurrently
//! - A refused task names the running task

use std::collections::BTreeSet;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Mutex;

use dsconsole::error::{ConsoleError, ConsoleResult};
use dsconsole::task::{Task, TaskBody, TaskCoordinator, TaskKind, TaskState};

// =============================================================================
// Helper Functions
// =============================================================================

/// Body that blocks until its gate is opened
struct GatedBody {
    kind: TaskKind,
    description: String,
    backends: Vec<&'static str>,
    gate: Option<Mutex<Receiver<()>>>,
}

impl TaskBody for GatedBody {
    fn kind(&self) -> TaskKind {
        self.kind
    }

    fn description(&self) -> String {
        self.description.clone()
    }

    fn backends(&self) -> BTreeSet<String> {
        self.backends.iter().map(|b| b.to_string()).collect()
    }

    fn execute(&self) -> ConsoleResult<()> {
        if let Some(gate) = &self.gate {
            let gate = gate
                .lock()
                .map_err(|_| ConsoleError::internal("gate poisoned"))?;
            gate.recv()
                .map_err(|_| ConsoleError::internal("gate dropped"))?;
        }
        Ok(())
    }
}

fn gated(kind: TaskKind, description: &str, backends: Vec<&'static str>) -> (Task, Sender<()>) {
    let (tx, rx) = channel();
    let body = GatedBody {
        kind,
        description: description.to_string(),
        backends,
        gate: Some(Mutex::new(rx)),
    };
    (Task::new("localhost", body), tx)
}

fn quick(server: &str, kind: TaskKind, description: &str, backends: Vec<&'static str>) -> Task {
    let body = GatedBody {
        kind,
        description: description.to_string(),
        backends,
        gate: None,
    };
    Task::new(server, body)
}

// =============================================================================
// Mutual Exclusion Tests
// =============================================================================

/// A second modify-index on a busy backend is refused, naming the first.
#[tokio::test]
async fn test_conflicting_task_rejected_while_running() {
    let coordinator = TaskCoordinator::new();
    let (first, release) = gated(
        TaskKind::ModifyIndex,
        "Modify index cn in backend userRoot",
        vec!["userRoot"],
    );
    let handle = coordinator.submit(first).unwrap();
    assert!(coordinator.is_running(handle.id()).unwrap());

    let second = quick(
        "localhost",
        TaskKind::ModifyIndex,
        "Modify index sn in backend userRoot",
        vec!["userRoot"],
    );
    let second_id = second.id();
    let err = coordinator.submit(second).unwrap_err();
    match &err {
        ConsoleError::Incompatible(refusal) => {
            assert_eq!(refusal.running, "Modify index cn in backend userRoot");
            assert_eq!(refusal.candidate, "Modify index sn in backend userRoot");
            assert_eq!(refusal.backends, vec!["userRoot".to_string()]);
        }
        other => panic!("expected incompatibility, got {:?}", other),
    }
    assert!(!coordinator.is_running(second_id).unwrap());

    release.send(()).unwrap();
    let finished = handle.wait().await.unwrap();
    assert_eq!(finished.state(), TaskState::FinishedSuccessfully);
}

/// Once the running task finishes, the same backend admits again.
#[tokio::test]
async fn test_backend_free_after_completion() {
    let coordinator = TaskCoordinator::new();
    let (first, release) = gated(TaskKind::DeleteIndex, "Delete index cn", vec!["userRoot"]);
    let handle = coordinator.submit(first).unwrap();
    release.send(()).unwrap();
    handle.wait().await.unwrap();

    let next = quick("localhost", TaskKind::NewIndex, "New index cn", vec!["userRoot"]);
    let finished = coordinator.submit(next).unwrap().wait().await.unwrap();
    assert_eq!(finished.state(), TaskState::FinishedSuccessfully);
    assert_eq!(coordinator.history().unwrap().len(), 2);
    assert!(coordinator.running().unwrap().is_empty());
}

/// A task on a disjoint backend is admitted while another runs.
#[tokio::test]
async fn test_disjoint_backend_admitted() {
    let coordinator = TaskCoordinator::new();
    let (first, release) = gated(TaskKind::ModifyIndex, "Modify index cn", vec!["b1"]);
    let handle = coordinator.submit(first).unwrap();

    let other = quick("localhost", TaskKind::ModifyIndex, "Modify index cn", vec!["b2"]);
    let finished = coordinator.submit(other).unwrap().wait().await.unwrap();
    assert_eq!(finished.state(), TaskState::FinishedSuccessfully);

    release.send(()).unwrap();
    handle.wait().await.unwrap();
}

/// Tasks on another server instance never conflict.
#[tokio::test]
async fn test_other_server_admitted() {
    let coordinator = TaskCoordinator::new();
    let (first, release) = gated(TaskKind::RebuildIndex, "Rebuild index cn", vec!["userRoot"]);
    let handle = coordinator.submit(first).unwrap();

    let remote = quick(
        "replica.example.com",
        TaskKind::RebuildIndex,
        "Rebuild index cn",
        vec!["userRoot"],
    );
    assert!(coordinator.submit(remote).is_ok());

    release.send(()).unwrap();
    handle.wait().await.unwrap();
}

// =============================================================================
// Allow-List Tests
// =============================================================================

/// Backup may overlap a running verify-index on the same backend.
#[tokio::test]
async fn test_backup_overlaps_verify() {
    let coordinator = TaskCoordinator::new();
    let (verify, release) = gated(TaskKind::VerifyIndex, "Verify index cn", vec!["userRoot"]);
    let handle = coordinator.submit(verify).unwrap();

    let backup = quick("localhost", TaskKind::Backup, "Backup userRoot", vec!["userRoot"]);
    let finished = coordinator.submit(backup).unwrap().wait().await.unwrap();
    assert_eq!(finished.state(), TaskState::FinishedSuccessfully);

    let rebuild = quick("localhost", TaskKind::RebuildIndex, "Rebuild cn", vec!["userRoot"]);
    assert!(coordinator.submit(rebuild).unwrap_err().is_incompatible());

    release.send(()).unwrap();
    handle.wait().await.unwrap();
}

/// The allow-list works in both directions.
#[tokio::test]
async fn test_verify_overlaps_running_export() {
    let coordinator = TaskCoordinator::new();
    let (export, release) = gated(TaskKind::ExportLdif, "Export userRoot", vec!["userRoot"]);
    let handle = coordinator.submit(export).unwrap();

    let verify = quick("localhost", TaskKind::VerifyIndex, "Verify index cn", vec!["userRoot"]);
    assert!(coordinator.submit(verify).is_ok());

    release.send(()).unwrap();
    handle.wait().await.unwrap();
}
