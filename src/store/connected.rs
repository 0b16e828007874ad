//! Store backed by a running server's management session

use std::sync::Arc;

use tracing::{debug, info};

use super::{BackendConfig, ConfigMutation, ConfigStore, StoreMode};
use crate::error::{ConsoleError, ConsoleResult};
use crate::index::{IndexDescriptor, PropertyChange, VlvIndexDescriptor};
use crate::observability::Event;

/// Result of a management client call. Failures are opaque to the console.
pub type ClientResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Management protocol client of a running server.
///
/// Every mutating call is one single-object commit on the server side.
pub trait ManagementClient: Send + Sync {
    fn get_backend(&self, backend_id: &str) -> ClientResult<BackendConfig>;

    fn create_index(&self, index: &IndexDescriptor) -> ClientResult<()>;

    fn modify_index(
        &self,
        backend_id: &str,
        attribute: &str,
        changes: &[PropertyChange],
    ) -> ClientResult<()>;

    fn delete_index(&self, backend_id: &str, attribute: &str) -> ClientResult<()>;

    fn create_vlv_index(&self, index: &VlvIndexDescriptor) -> ClientResult<()>;

    fn modify_vlv_index(
        &self,
        backend_id: &str,
        name: &str,
        changes: &[PropertyChange],
    ) -> ClientResult<()>;

    fn delete_vlv_index(&self, backend_id: &str, name: &str) -> ClientResult<()>;
}

pub struct ConnectedStore {
    client: Arc<dyn ManagementClient>,
}

impl ConnectedStore {
    pub fn new(client: Arc<dyn ManagementClient>) -> Self {
        Self { client }
    }
}

fn remote(context: String) -> impl FnOnce(Box<dyn std::error::Error + Send + Sync>) -> ConsoleError {
    move |e| ConsoleError::remote(format!("{}: {}", context, e))
}

impl ConfigStore for ConnectedStore {
    fn mode(&self) -> StoreMode {
        StoreMode::Connected
    }

    fn read(&self, backend_id: &str) -> ConsoleResult<BackendConfig> {
        self.client
            .get_backend(backend_id)
            .map_err(remote(format!("failed to read backend {}", backend_id)))
    }

    fn commit(&self, mutation: &ConfigMutation) -> ConsoleResult<()> {
        if mutation.is_noop() {
            debug!(
                event = %Event::ConfigCommitSkipped,
                backend = mutation.backend(),
                target = mutation.target(),
                "nothing to commit"
            );
            return Ok(());
        }

        let context = format!("failed to commit '{}'", mutation.description());
        let changes = mutation.property_changes();
        let result = match mutation {
            ConfigMutation::CreateIndex { index } => self.client.create_index(index),
            ConfigMutation::ModifyIndex {
                backend, attribute, ..
            } => self.client.modify_index(backend, attribute, &changes),
            ConfigMutation::DeleteIndex { backend, attribute } => {
                self.client.delete_index(backend, attribute)
            }
            ConfigMutation::CreateVlvIndex { index } => self.client.create_vlv_index(index),
            ConfigMutation::ModifyVlvIndex { backend, name, .. } => {
                self.client.modify_vlv_index(backend, name, &changes)
            }
            ConfigMutation::DeleteVlvIndex { backend, name } => {
                self.client.delete_vlv_index(backend, name)
            }
        };
        result.map_err(remote(context))?;

        info!(
            event = %Event::ConfigCommit,
            mode = "connected",
            backend = mutation.backend(),
            target = mutation.target(),
            "configuration committed"
        );
        Ok(())
    }
}
