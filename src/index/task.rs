//! Index changes as coordinator tasks

use std::collections::BTreeSet;
use std::sync::Arc;

use super::manager::IndexLifecycleManager;
use crate::error::ConsoleResult;
use crate::store::{ConfigMutation, CONFIG_TOOL};
use crate::task::{TaskBody, TaskKind};

/// Commits one planned index mutation when run
pub struct IndexTask {
    manager: Arc<IndexLifecycleManager>,
    mutation: ConfigMutation,
}

impl IndexTask {
    pub fn new(manager: Arc<IndexLifecycleManager>, mutation: ConfigMutation) -> Self {
        Self { manager, mutation }
    }

    pub fn mutation(&self) -> &ConfigMutation {
        &self.mutation
    }
}

impl TaskBody for IndexTask {
    fn kind(&self) -> TaskKind {
        match self.mutation {
            ConfigMutation::CreateIndex { .. } | ConfigMutation::CreateVlvIndex { .. } => {
                TaskKind::NewIndex
            }
            ConfigMutation::ModifyIndex { .. } | ConfigMutation::ModifyVlvIndex { .. } => {
                TaskKind::ModifyIndex
            }
            ConfigMutation::DeleteIndex { .. } | ConfigMutation::DeleteVlvIndex { .. } => {
                TaskKind::DeleteIndex
            }
        }
    }

    fn description(&self) -> String {
        self.mutation.description()
    }

    fn backends(&self) -> BTreeSet<String> {
        [self.mutation.backend().to_string()].into_iter().collect()
    }

    fn command_line_path(&self) -> Option<&str> {
        Some(CONFIG_TOOL)
    }

    fn command_line_arguments(&self) -> Vec<String> {
        self.mutation.command_line_arguments()
    }

    fn execute(&self) -> ConsoleResult<()> {
        self.manager.commit(&self.mutation)
    }
}
