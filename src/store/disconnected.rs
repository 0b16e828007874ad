//! Store editing the configuration file of a stopped server
//!
//! Every operation holds an exclusive advisory lock on `<file>.lock` for
//! its whole duration. Writes go to `<file>.tmp`, are fsynced, then renamed
//! over the original, so a reader sees either the old or the new file.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{BackendConfig, ConfigMutation, ConfigStore, StoreMode};
use crate::error::{ConsoleError, ConsoleResult};
use crate::observability::Event;

/// On-disk layout of the offline configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub backends: Vec<BackendConfig>,
}

impl ConfigFile {
    pub fn backend(&self, id: &str) -> Option<&BackendConfig> {
        self.backends.iter().find(|b| b.id.eq_ignore_ascii_case(id))
    }

    fn backend_mut(&mut self, id: &str) -> Result<&mut BackendConfig, String> {
        self.backends
            .iter_mut()
            .find(|b| b.id.eq_ignore_ascii_case(id))
            .ok_or_else(|| format!("backend {} not found", id))
    }

    /// Apply a mutation in memory
    fn apply(&mut self, mutation: &ConfigMutation) -> Result<(), String> {
        let backend = self.backend_mut(mutation.backend())?;
        match mutation {
            ConfigMutation::CreateIndex { index } => {
                if backend.index(&index.attribute).is_some() {
                    return Err(format!(
                        "index {} already exists in backend {}",
                        index.attribute, backend.id
                    ));
                }
                backend.indexes.push(index.clone());
            }
            ConfigMutation::ModifyIndex {
                attribute, diff, ..
            } => {
                let existing = backend
                    .indexes
                    .iter_mut()
                    .find(|i| i.same_attribute(attribute))
                    .ok_or_else(|| format!("index {} not found", attribute))?;
                *existing = diff.apply_to(existing);
            }
            ConfigMutation::DeleteIndex { attribute, .. } => {
                let before = backend.indexes.len();
                backend.indexes.retain(|i| !i.same_attribute(attribute));
                if backend.indexes.len() == before {
                    return Err(format!("index {} not found", attribute));
                }
            }
            ConfigMutation::CreateVlvIndex { index } => {
                if backend.vlv_index(&index.name).is_some() {
                    return Err(format!(
                        "VLV index {} already exists in backend {}",
                        index.name, backend.id
                    ));
                }
                backend.vlv_indexes.push(index.clone());
            }
            ConfigMutation::ModifyVlvIndex { name, diff, .. } => {
                let existing = backend
                    .vlv_indexes
                    .iter_mut()
                    .find(|v| v.same_name(name))
                    .ok_or_else(|| format!("VLV index {} not found", name))?;
                *existing = diff.apply_to(existing);
            }
            ConfigMutation::DeleteVlvIndex { name, .. } => {
                let before = backend.vlv_indexes.len();
                backend.vlv_indexes.retain(|v| !v.same_name(name));
                if backend.vlv_indexes.len() == before {
                    return Err(format!("VLV index {} not found", name));
                }
            }
        }
        Ok(())
    }
}

/// Exclusive lock on the configuration, released on drop
struct ConfigLock {
    file: File,
    path: PathBuf,
}

impl ConfigLock {
    fn acquire(path: PathBuf) -> ConsoleResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| {
                ConsoleError::local(format!("failed to open lock file {}: {}", path.display(), e))
            })?;

        file.try_lock_exclusive().map_err(|e| {
            ConsoleError::local(format!(
                "configuration is locked by another process ({}): {}",
                path.display(),
                e
            ))
        })?;

        debug!(event = %Event::ConfigLockAcquired, lock = %path.display(), "lock acquired");
        Ok(Self { file, path })
    }
}

impl Drop for ConfigLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            warn!(lock = %self.path.display(), error = %e, "failed to release configuration lock");
        } else {
            debug!(event = %Event::ConfigLockReleased, lock = %self.path.display(), "lock released");
        }
    }
}

pub struct DisconnectedStore {
    path: PathBuf,
}

impl DisconnectedStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(suffix);
        PathBuf::from(name)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.sibling(".lock")
    }

    fn lock(&self) -> ConsoleResult<ConfigLock> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                ConsoleError::local(format!("failed to create {}: {}", parent.display(), e))
            })?;
        }
        ConfigLock::acquire(self.lock_path())
    }

    /// Read the whole file under the lock
    pub fn load(&self) -> ConsoleResult<ConfigFile> {
        let _lock = self.lock()?;
        self.read_file()
    }

    /// Replace the whole file under the lock
    pub fn save(&self, config: &ConfigFile) -> ConsoleResult<()> {
        let _lock = self.lock()?;
        self.write_file(config)
    }

    fn read_file(&self) -> ConsoleResult<ConfigFile> {
        let content = fs::read_to_string(&self.path).map_err(|e| {
            ConsoleError::local(format!("failed to read {}: {}", self.path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            ConsoleError::local(format!("invalid configuration {}: {}", self.path.display(), e))
        })
    }

    fn write_file(&self, config: &ConfigFile) -> ConsoleResult<()> {
        let content = serde_json::to_string_pretty(config)
            .map_err(|e| ConsoleError::local(format!("failed to serialize configuration: {}", e)))?;

        let temp_path = self.sibling(".tmp");
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(|e| {
                ConsoleError::local(format!("failed to create {}: {}", temp_path.display(), e))
            })?;
        file.write_all(content.as_bytes())
            .map_err(|e| ConsoleError::local(format!("failed to write configuration: {}", e)))?;
        file.sync_all()
            .map_err(|e| ConsoleError::local(format!("failed to fsync configuration: {}", e)))?;

        fs::rename(&temp_path, &self.path).map_err(|e| {
            ConsoleError::local(format!("failed to replace {}: {}", self.path.display(), e))
        })?;

        if let Some(parent) = self.path.parent() {
            if let Ok(dir) = File::open(parent) {
                let _ = dir.sync_all();
            }
        }
        Ok(())
    }
}

impl ConfigStore for DisconnectedStore {
    fn mode(&self) -> StoreMode {
        StoreMode::Disconnected
    }

    fn read(&self, backend_id: &str) -> ConsoleResult<BackendConfig> {
        self.load()?
            .backend(backend_id)
            .cloned()
            .ok_or_else(|| ConsoleError::local(format!("backend {} not found", backend_id)))
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

        let _lock = self.lock()?;
        let mut config = self.read_file()?;
        config.apply(mutation).map_err(|cause| {
            ConsoleError::local(format!("failed to commit '{}': {}", mutation.description(), cause))
        })?;
        self.write_file(&config)?;

        info!(
            event = %Event::ConfigCommit,
            mode = "disconnected",
            backend = mutation.backend(),
            target = mutation.target(),
            file = %self.path.display(),
            "configuration committed"
        );
        Ok(())
    }
}
