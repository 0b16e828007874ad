//! Observable console events
//!
//! Each event name is attached to log records as the `event` field.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Task lifecycle
    /// Task passed the admission check and is running
    TaskAdmitted,
    /// Task refused because a conflicting task is running
    TaskRejected,
    /// Task reached FINISHED_SUCCESSFULLY
    TaskFinished,
    /// Task reached FINISHED_WITH_ERROR
    TaskFailed,

    // Configuration stores
    /// Mutation committed to a store
    ConfigCommit,
    /// Modification had no effective change, nothing sent
    ConfigCommitSkipped,
    /// Exclusive lock on the offline configuration taken
    ConfigLockAcquired,
    /// Exclusive lock on the offline configuration released
    ConfigLockReleased,

    // Schema
    /// Schema element removed from the server
    SchemaElementDeleted,

    // Analysis
    /// Filter needs an index the backend lacks
    IndexWarning,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::TaskAdmitted => "TASK_ADMITTED",
            Event::TaskRejected => "TASK_REJECTED",
            Event::TaskFinished => "TASK_FINISHED",
            Event::TaskFailed => "TASK_FAILED",

            Event::ConfigCommit => "CONFIG_COMMIT",
            Event::ConfigCommitSkipped => "CONFIG_COMMIT_SKIPPED",
            Event::ConfigLockAcquired => "CONFIG_LOCK_ACQUIRED",
            Event::ConfigLockReleased => "CONFIG_LOCK_RELEASED",

            Event::SchemaElementDeleted => "SCHEMA_ELEMENT_DELETED",

            Event::IndexWarning => "INDEX_WARNING",
        }
    }

    /// Failure or refusal events, logged at warn level
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Event::TaskRejected | Event::TaskFailed | Event::IndexWarning
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_events_have_string_representation() {
        let events = [
            Event::TaskAdmitted,
            Event::TaskRejected,
            Event::TaskFinished,
            Event::TaskFailed,
            Event::ConfigCommit,
            Event::ConfigCommitSkipped,
            Event::ConfigLockAcquired,
            Event::ConfigLockReleased,
            Event::SchemaElementDeleted,
            Event::IndexWarning,
        ];

        for event in events {
            let s = event.as_str();
            assert!(!s.is_empty());
            assert!(s.chars().all(|c| c.is_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_warning_events() {
        assert!(Event::TaskRejected.is_warning());
        assert!(Event::IndexWarning.is_warning());
        assert!(!Event::TaskAdmitted.is_warning());
        assert!(!Event::ConfigCommit.is_warning());
    }

    #[test]
    fn test_event_display() {
        assert_eq!(format!("{}", Event::TaskAdmitted), "TASK_ADMITTED");
        assert_eq!(format!("{}", Event::ConfigLockReleased), "CONFIG_LOCK_RELEASED");
    }
}
