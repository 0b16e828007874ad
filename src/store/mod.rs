//! Configuration stores
//!
//! A [`ConfigStore`] reads a backend's index configuration and commits one
//! [`ConfigMutation`] at a time. [`ConnectedStore`] talks to a running
//! server; [`DisconnectedStore`] edits the configuration file of a stopped
//! one. The caller picks between them with an explicit run-state flag via
//! [`StoreSelector`]; stores never query the server run state themselves.

mod connected;
mod disconnected;
mod mutation;

pub use connected::{ClientResult, ConnectedStore, ManagementClient};
pub use disconnected::{ConfigFile, DisconnectedStore};
pub use mutation::{ConfigMutation, CONFIG_TOOL};

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::dn::Dn;
use crate::error::{ConsoleError, ConsoleResult};
use crate::index::{IndexDescriptor, VlvIndexDescriptor};

/// Which side of the server a store writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreMode {
    Connected,
    Disconnected,
}

/// Index configuration of one backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    pub id: String,
    #[serde(default)]
    pub base_dns: Vec<Dn>,
    #[serde(default)]
    pub indexes: Vec<IndexDescriptor>,
    #[serde(default)]
    pub vlv_indexes: Vec<VlvIndexDescriptor>,
}

impl BackendConfig {
    pub fn new(id: impl Into<String>, base_dns: Vec<Dn>) -> Self {
        Self {
            id: id.into(),
            base_dns,
            indexes: Vec::new(),
            vlv_indexes: Vec::new(),
        }
    }

    pub fn index(&self, attribute: &str) -> Option<&IndexDescriptor> {
        self.indexes.iter().find(|i| i.same_attribute(attribute))
    }

    pub fn vlv_index(&self, name: &str) -> Option<&VlvIndexDescriptor> {
        self.vlv_indexes.iter().find(|v| v.same_name(name))
    }

    /// True when `dn` is one of the base DNs or below one
    pub fn holds(&self, dn: &Dn) -> bool {
        self.base_dns.iter().any(|base| dn.is_under(base))
    }
}

/// Read and commit access to index configuration
pub trait ConfigStore: Send + Sync {
    fn mode(&self) -> StoreMode;

    fn read(&self, backend_id: &str) -> ConsoleResult<BackendConfig>;

    /// Commit one mutation, all-or-nothing for the object it addresses
    fn commit(&self, mutation: &ConfigMutation) -> ConsoleResult<()>;
}

/// Chooses a store from the caller's knowledge of the server run state
#[derive(Clone, Default)]
pub struct StoreSelector {
    connected: Option<Arc<dyn ConfigStore>>,
    disconnected: Option<Arc<dyn ConfigStore>>,
}

impl StoreSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connected(mut self, store: Arc<dyn ConfigStore>) -> Self {
        self.connected = Some(store);
        self
    }

    pub fn with_disconnected(mut self, store: Arc<dyn ConfigStore>) -> Self {
        self.disconnected = Some(store);
        self
    }

    /// `server_running == false` must be a positive confirmation that the
    /// server is stopped; when in doubt pass `true`.
    pub fn select(&self, server_running: bool) -> ConsoleResult<Arc<dyn ConfigStore>> {
        if server_running {
            self.connected
                .clone()
                .ok_or_else(|| ConsoleError::remote("no management session to the running server"))
        } else {
            self.disconnected
                .clone()
                .ok_or_else(|| ConsoleError::local("no offline configuration file configured"))
        }
    }
}

impl std::fmt::Debug for StoreSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreSelector")
            .field("connected", &self.connected.is_some())
            .field("disconnected", &self.disconnected.is_some())
            .finish()
    }
}
