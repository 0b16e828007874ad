//! Index lifecycle management
//!
//! Validation always happens before a store is touched, so a
//! `ValidationError` or `PermissionError` never leaves a partial change.
//! Each commit addresses a single descriptor.

use std::collections::BTreeSet;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::diff::{IndexDiff, VlvIndexDiff};
use super::types::{
    IndexDescriptor, IndexType, VlvIndexDescriptor, MAX_ENTRY_LIMIT, MIN_ENTRY_LIMIT,
};
use crate::dn::is_valid_attribute_type;
use crate::error::{ConsoleError, ConsoleResult};
use crate::filter::{analyze, index_map, is_valid_attribute_description, FilterExpr, IndexWarning};
use crate::observability::Event;
use crate::store::{BackendConfig, ConfigMutation, ConfigStore, StoreSelector};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Notifications sent after a successful commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexEvent {
    Created(IndexDescriptor),
    Modified {
        descriptor: IndexDescriptor,
        /// Whether the user should be offered a rebuild
        prompt_rebuild: bool,
    },
    Deleted {
        backend: String,
        attribute: String,
    },
    VlvCreated(VlvIndexDescriptor),
    VlvModified(VlvIndexDescriptor),
    VlvDeleted {
        backend: String,
        name: String,
    },
}

/// Outcome of a standard index modification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexModification {
    /// Descriptor after the change
    pub descriptor: IndexDescriptor,
    /// `None` when nothing differs and no commit is needed
    pub mutation: Option<ConfigMutation>,
    /// A type was removed, so existing index data no longer matches
    pub rebuild_required: bool,
    /// Any change of the type set offers a rebuild, additions included
    pub prompt_rebuild: bool,
}

/// Validated VLV change awaiting commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VlvIndexPlan {
    pub descriptor: VlvIndexDescriptor,
    /// `None` when a modification changes nothing
    pub mutation: Option<ConfigMutation>,
    /// Advisory; committing the plan acknowledges them
    pub warnings: Vec<IndexWarning>,
}

fn check_entry_limit(entry_limit: i64) -> ConsoleResult<()> {
    if !(MIN_ENTRY_LIMIT..=MAX_ENTRY_LIMIT).contains(&entry_limit) {
        return Err(ConsoleError::validation(format!(
            "entry limit {} is outside [{}, {}]",
            entry_limit, MIN_ENTRY_LIMIT, MAX_ENTRY_LIMIT
        )));
    }
    Ok(())
}

fn check_types(types: &BTreeSet<IndexType>) -> ConsoleResult<()> {
    if types.is_empty() {
        return Err(ConsoleError::validation(
            "at least one index type must be selected",
        ));
    }
    Ok(())
}

fn is_keystring(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Creates, modifies and deletes standard and VLV indexes
pub struct IndexLifecycleManager {
    stores: StoreSelector,
    server_running: bool,
    events: broadcast::Sender<IndexEvent>,
}

impl IndexLifecycleManager {
    /// `server_running` is the caller's knowledge of the run state; pass
    /// `false` only when the server is positively known to be stopped.
    pub fn new(stores: StoreSelector, server_running: bool) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            stores,
            server_running,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<IndexEvent> {
        self.events.subscribe()
    }

    pub fn server_running(&self) -> bool {
        self.server_running
    }

    fn store(&self) -> ConsoleResult<std::sync::Arc<dyn ConfigStore>> {
        self.stores.select(self.server_running())
    }

    fn notify(&self, event: IndexEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    pub fn read_backend(&self, backend_id: &str) -> ConsoleResult<BackendConfig> {
        self.store()?.read(backend_id)
    }

    // ===================================================================
    // Standard indexes
    // ===================================================================

    /// Validate a new index against the backend's current configuration
    pub fn plan_create_index(
        backend: &BackendConfig,
        attribute: &str,
        types: &BTreeSet<IndexType>,
        entry_limit: i64,
    ) -> ConsoleResult<ConfigMutation> {
        let attribute = attribute.trim();
        check_entry_limit(entry_limit)?;
        check_types(types)?;
        Self::check_new_attribute(backend, attribute)?;
        Ok(ConfigMutation::CreateIndex {
            index: IndexDescriptor::new(&backend.id, attribute, types.iter().copied(), entry_limit),
        })
    }

    fn check_new_attribute(backend: &BackendConfig, attribute: &str) -> ConsoleResult<()> {
        if !is_valid_attribute_type(attribute) {
            return Err(ConsoleError::validation(format!(
                "'{}' is not a valid attribute name",
                attribute
            )));
        }
        if backend.index(attribute).is_some() {
            return Err(ConsoleError::validation(format!(
                "an index for attribute {} already exists in backend {}",
                attribute, backend.id
            )));
        }
        Ok(())
    }

    pub fn create_index(
        &self,
        backend_id: &str,
        attribute: &str,
        types: &BTreeSet<IndexType>,
        entry_limit: i64,
    ) -> ConsoleResult<IndexDescriptor> {
        check_entry_limit(entry_limit)?;
        check_types(types)?;
        let store = self.store()?;
        let backend = store.read(backend_id)?;
        let mutation = Self::plan_create_index(&backend, attribute, types, entry_limit)?;
        store.commit(&mutation)?;

        let ConfigMutation::CreateIndex { index } = mutation else {
            return Err(ConsoleError::internal("unexpected mutation for index creation"));
        };
        info!(backend = backend_id, attribute = %index.attribute, "index created");
        self.notify(IndexEvent::Created(index.clone()));
        Ok(index)
    }

    /// Diff `existing` against the requested values
    pub fn plan_modify_index(
        existing: &IndexDescriptor,
        types: &BTreeSet<IndexType>,
        entry_limit: i64,
    ) -> ConsoleResult<IndexModification> {
        check_entry_limit(entry_limit)?;
        if !existing.is_system_index {
            check_types(types)?;
        }

        let diff = IndexDiff::between(existing, types, entry_limit);
        if existing.is_system_index && !diff.is_empty() {
            return Err(ConsoleError::permission(format!(
                "index {} is a system index and cannot be modified",
                existing.attribute
            )));
        }

        let descriptor = diff.apply_to(existing);
        let rebuild_required = !descriptor.types.is_superset(&existing.types);
        let prompt_rebuild = diff.types_changed();
        let mutation = (!diff.is_empty()).then(|| ConfigMutation::ModifyIndex {
            backend: existing.backend.clone(),
            attribute: existing.attribute.clone(),
            diff,
        });
        Ok(IndexModification {
            descriptor,
            mutation,
            rebuild_required,
            prompt_rebuild,
        })
    }

    pub fn modify_index(
        &self,
        existing: &IndexDescriptor,
        types: &BTreeSet<IndexType>,
        entry_limit: i64,
    ) -> ConsoleResult<IndexModification> {
        let modification = Self::plan_modify_index(existing, types, entry_limit)?;
        match &modification.mutation {
            None => {
                debug!(
                    event = %Event::ConfigCommitSkipped,
                    backend = %existing.backend,
                    attribute = %existing.attribute,
                    "index unchanged"
                );
            }
            Some(mutation) => {
                self.store()?.commit(mutation)?;
                info!(
                    backend = %existing.backend,
                    attribute = %existing.attribute,
                    rebuild_required = modification.rebuild_required,
                    "index modified"
                );
                self.notify(IndexEvent::Modified {
                    descriptor: modification.descriptor.clone(),
                    prompt_rebuild: modification.prompt_rebuild,
                });
            }
        }
        Ok(modification)
    }

    pub fn plan_delete_index(existing: &IndexDescriptor) -> ConsoleResult<ConfigMutation> {
        if existing.is_system_index {
            return Err(ConsoleError::permission(format!(
                "index {} is a system index and cannot be deleted",
                existing.attribute
            )));
        }
        Ok(ConfigMutation::DeleteIndex {
            backend: existing.backend.clone(),
            attribute: existing.attribute.clone(),
        })
    }

    pub fn delete_index(&self, existing: &IndexDescriptor) -> ConsoleResult<()> {
        let mutation = Self::plan_delete_index(existing)?;
        self.store()?.commit(&mutation)?;
        info!(backend = %existing.backend, attribute = %existing.attribute, "index deleted");
        self.notify(IndexEvent::Deleted {
            backend: existing.backend.clone(),
            attribute: existing.attribute.clone(),
        });
        Ok(())
    }

    // ===================================================================
    // VLV indexes
    // ===================================================================

    fn check_vlv(backend: &BackendConfig, requested: &VlvIndexDescriptor) -> ConsoleResult<FilterExpr> {
        if !is_keystring(&requested.name) {
            return Err(ConsoleError::validation(format!(
                "'{}' is not a valid VLV index name",
                requested.name
            )));
        }
        if !requested.backend.eq_ignore_ascii_case(&backend.id) {
            return Err(ConsoleError::validation(format!(
                "VLV index {} belongs to backend {}, not {}",
                requested.name, requested.backend, backend.id
            )));
        }
        if !backend.holds(&requested.base_dn) {
            return Err(ConsoleError::validation(format!(
                "base DN {} is not under any base DN of backend {}",
                requested.base_dn, backend.id
            )));
        }
        let filter = FilterExpr::parse(&requested.filter)?;
        if requested.sort_order.is_empty() {
            return Err(ConsoleError::validation("sort order must not be empty"));
        }
        if let Some(key) = requested
            .sort_order
            .iter()
            .find(|k| !is_valid_attribute_description(&k.attribute))
        {
            return Err(ConsoleError::validation(format!(
                "'{}' is not a valid sort attribute",
                key.attribute
            )));
        }
        Ok(filter)
    }

    fn filter_warnings(backend: &BackendConfig, filter: &FilterExpr, name: &str) -> Vec<IndexWarning> {
        let warnings = analyze(filter, &index_map(&backend.indexes));
        for warning in &warnings {
            warn!(
                event = %Event::IndexWarning,
                backend = %backend.id,
                vlv_index = name,
                "{}",
                warning
            );
        }
        warnings
    }

    pub fn plan_create_vlv_index(
        backend: &BackendConfig,
        requested: VlvIndexDescriptor,
    ) -> ConsoleResult<VlvIndexPlan> {
        let filter = Self::check_vlv(backend, &requested)?;
        if backend.vlv_index(&requested.name).is_some() {
            return Err(ConsoleError::validation(format!(
                "a VLV index named {} already exists in backend {}",
                requested.name, backend.id
            )));
        }
        let warnings = Self::filter_warnings(backend, &filter, &requested.name);
        Ok(VlvIndexPlan {
            mutation: Some(ConfigMutation::CreateVlvIndex {
                index: requested.clone(),
            }),
            descriptor: requested,
            warnings,
        })
    }

    pub fn plan_modify_vlv_index(
        backend: &BackendConfig,
        existing: &VlvIndexDescriptor,
        requested: VlvIndexDescriptor,
    ) -> ConsoleResult<VlvIndexPlan> {
        if !existing.same_name(&requested.name) {
            return Err(ConsoleError::validation(format!(
                "VLV index {} cannot be renamed to {}",
                existing.name, requested.name
            )));
        }
        let filter = Self::check_vlv(backend, &requested)?;
        let diff = VlvIndexDiff::between(existing, &requested);
        let warnings = Self::filter_warnings(backend, &filter, &requested.name);
        let descriptor = diff.apply_to(existing);
        let mutation = (!diff.is_empty()).then(|| ConfigMutation::ModifyVlvIndex {
            backend: existing.backend.clone(),
            name: existing.name.clone(),
            diff,
        });
        Ok(VlvIndexPlan {
            descriptor,
            mutation,
            warnings,
        })
    }

    /// Commit a reviewed plan, warnings included
    pub fn commit_plan(&self, plan: &VlvIndexPlan) -> ConsoleResult<()> {
        let Some(mutation) = &plan.mutation else {
            debug!(
                event = %Event::ConfigCommitSkipped,
                backend = %plan.descriptor.backend,
                vlv_index = %plan.descriptor.name,
                "VLV index unchanged"
            );
            return Ok(());
        };
        self.store()?.commit(mutation)?;
        info!(
            backend = %plan.descriptor.backend,
            vlv_index = %plan.descriptor.name,
            warnings = plan.warnings.len(),
            "{}",
            mutation.description()
        );
        let event = match mutation {
            ConfigMutation::CreateVlvIndex { .. } => IndexEvent::VlvCreated(plan.descriptor.clone()),
            _ => IndexEvent::VlvModified(plan.descriptor.clone()),
        };
        self.notify(event);
        Ok(())
    }

    /// Commit a planned mutation and notify observers
    pub fn commit(&self, mutation: &ConfigMutation) -> ConsoleResult<()> {
        self.store()?.commit(mutation)?;
        let event = match mutation {
            ConfigMutation::CreateIndex { index } => IndexEvent::Created(index.clone()),
            ConfigMutation::ModifyIndex { diff, .. } => {
                let backend = self.read_backend(mutation.backend())?;
                let descriptor = backend
                    .index(mutation.target())
                    .cloned()
                    .ok_or_else(|| ConsoleError::internal("modified index vanished"))?;
                IndexEvent::Modified {
                    descriptor,
                    prompt_rebuild: diff.types_changed(),
                }
            }
            ConfigMutation::DeleteIndex { backend, attribute } => IndexEvent::Deleted {
                backend: backend.clone(),
                attribute: attribute.clone(),
            },
            ConfigMutation::CreateVlvIndex { index } => IndexEvent::VlvCreated(index.clone()),
            ConfigMutation::ModifyVlvIndex { .. } => {
                let backend = self.read_backend(mutation.backend())?;
                let descriptor = backend
                    .vlv_index(mutation.target())
                    .cloned()
                    .ok_or_else(|| ConsoleError::internal("modified VLV index vanished"))?;
                IndexEvent::VlvModified(descriptor)
            }
            ConfigMutation::DeleteVlvIndex { backend, name } => IndexEvent::VlvDeleted {
                backend: backend.clone(),
                name: name.clone(),
            },
        };
        info!(backend = mutation.backend(), target = mutation.target(), "{}", mutation.description());
        self.notify(event);
        Ok(())
    }

    pub fn create_vlv_index(
        &self,
        requested: VlvIndexDescriptor,
    ) -> ConsoleResult<(VlvIndexDescriptor, Vec<IndexWarning>)> {
        let backend = self.read_backend(&requested.backend)?;
        let plan = Self::plan_create_vlv_index(&backend, requested)?;
        self.commit_plan(&plan)?;
        Ok((plan.descriptor, plan.warnings))
    }

    pub fn modify_vlv_index(
        &self,
        existing: &VlvIndexDescriptor,
        requested: VlvIndexDescriptor,
    ) -> ConsoleResult<(VlvIndexDescriptor, Vec<IndexWarning>)> {
        let backend = self.read_backend(&existing.backend)?;
        let plan = Self::plan_modify_vlv_index(&backend, existing, requested)?;
        self.commit_plan(&plan)?;
        Ok((plan.descriptor, plan.warnings))
    }

    pub fn plan_delete_vlv_index(existing: &VlvIndexDescriptor) -> ConfigMutation {
        ConfigMutation::DeleteVlvIndex {
            backend: existing.backend.clone(),
            name: existing.name.clone(),
        }
    }

    pub fn delete_vlv_index(&self, existing: &VlvIndexDescriptor) -> ConsoleResult<()> {
        self.commit(&Self::plan_delete_vlv_index(existing))
    }
}

impl std::fmt::Debug for IndexLifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexLifecycleManager")
            .field("stores", &self.stores)
            .field("server_running", &self.server_running())
            .finish()
    }
}
