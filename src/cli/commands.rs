//! CLI command implementations
//!
//! The CLI has no management session with a running server. Changes are
//! only committed to the configuration file, and only once the caller
//! confirms the server is stopped.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::config::ConsoleConfig;
use crate::dn::Dn;
use crate::error::ConsoleError;
use crate::filter::{analyze, index_map, FilterExpr};
use crate::index::{
    parse_sort_order, IndexLifecycleManager, IndexTask, IndexType, SearchScope,
    VlvIndexDescriptor,
};
use crate::observability::init_logging;
use crate::schema::{deletion_ldif, impact_report, order_for_deletion, SchemaLoader};
use crate::store::{BackendConfig, ConfigMutation, ConfigStore, DisconnectedStore, StoreSelector};
use crate::task::{Task, TaskCoordinator};

use super::args::{Cli, Command, MutationFlags};
use super::errors::{CliError, CliResult};
use super::io::{write_error, write_response};

/// Main CLI entry point
///
/// Parses arguments, runs the command and writes one JSON response.
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    match run_command(cli) {
        Ok(data) => write_response(data),
        Err(e) => {
            write_error(e.code_str(), e.message())?;
            Err(e)
        }
    }
}

/// Load the console configuration, start logging and run the command
pub fn run_command(cli: Cli) -> CliResult<Value> {
    let config = ConsoleConfig::load_or_default(cli.console_config.as_deref())?;
    init_logging(&config.logging)?;
    execute(&config, cli.command)
}

/// Run one command against `config`, returning the response data
pub fn execute(config: &ConsoleConfig, command: Command) -> CliResult<Value> {
    let offline = Arc::new(DisconnectedStore::new(&config.server_config_file));
    match command {
        Command::ListIndexes { backend } => list_indexes(offline.as_ref(), &backend),
        Command::CreateIndex {
            backend,
            attribute,
            types,
            entry_limit,
            flags,
        } => {
            let types = parse_types(&types)?;
            let manager = manager(&offline, flags);
            let backend = manager.read_backend(&backend)?;
            let mutation =
                IndexLifecycleManager::plan_create_index(&backend, &attribute, &types, entry_limit)?;
            run_mutation(config, manager, mutation, flags)
        }
        Command::ModifyIndex {
            backend,
            attribute,
            types,
            entry_limit,
            flags,
        } => {
            let manager = manager(&offline, flags);
            let backend = manager.read_backend(&backend)?;
            let existing = backend
                .index(&attribute)
                .ok_or_else(|| missing("index", &attribute, &backend))?;
            let types = if types.is_empty() {
                existing.types.clone()
            } else {
                parse_types(&types)?
            };
            let entry_limit = entry_limit.unwrap_or(existing.entry_limit);
            let modification =
                IndexLifecycleManager::plan_modify_index(existing, &types, entry_limit)?;
            let Some(mutation) = modification.mutation else {
                return Ok(json!({
                    "changed": false,
                    "index": modification.descriptor,
                }));
            };
            let mut out = run_mutation(config, manager, mutation, flags)?;
            out["index"] = json!(modification.descriptor);
            out["rebuild_required"] = json!(modification.rebuild_required);
            out["prompt_rebuild"] = json!(modification.prompt_rebuild);
            Ok(out)
        }
        Command::DeleteIndex {
            backend,
            attribute,
            flags,
        } => {
            let manager = manager(&offline, flags);
            let backend = manager.read_backend(&backend)?;
            let existing = backend
                .index(&attribute)
                .ok_or_else(|| missing("index", &attribute, &backend))?;
            let mutation = IndexLifecycleManager::plan_delete_index(existing)?;
            run_mutation(config, manager, mutation, flags)
        }
        Command::CreateVlvIndex {
            backend,
            name,
            base_dn,
            scope,
            filter,
            sort_order,
            flags,
        } => {
            let manager = manager(&offline, flags);
            let backend = manager.read_backend(&backend)?;
            let requested = VlvIndexDescriptor {
                name,
                backend: backend.id.clone(),
                base_dn: Dn::parse(&base_dn)?,
                scope: SearchScope::parse(&scope)?,
                filter,
                sort_order: parse_sort_order(&sort_order)?,
            };
            let plan = IndexLifecycleManager::plan_create_vlv_index(&backend, requested)?;
            let warnings: Vec<String> = plan.warnings.iter().map(ToString::to_string).collect();
            let Some(mutation) = plan.mutation else {
                return Err(ConsoleError::internal("VLV index creation planned no change").into());
            };
            let mut out = run_mutation(config, manager, mutation, flags)?;
            out["warnings"] = json!(warnings);
            Ok(out)
        }
        Command::DeleteVlvIndex {
            backend,
            name,
            flags,
        } => {
            let manager = manager(&offline, flags);
            let backend = manager.read_backend(&backend)?;
            let existing = backend
                .vlv_index(&name)
                .ok_or_else(|| missing("VLV index", &name, &backend))?;
            let mutation = IndexLifecycleManager::plan_delete_vlv_index(existing);
            run_mutation(config, manager, mutation, flags)
        }
        Command::AnalyzeFilter { backend, filter } => {
            let backend = offline.read(&backend)?;
            let filter = FilterExpr::parse(&filter)?;
            let warnings = analyze(&filter, &index_map(&backend.indexes));
            let messages: Vec<String> = warnings.iter().map(ToString::to_string).collect();
            Ok(json!({
                "filter": filter.to_string(),
                "warnings": messages,
                "details": warnings,
            }))
        }
        Command::SchemaDeletePlan {
            object_classes,
            attribute_types,
            schema_file,
        } => {
            let path = schema_file
                .or_else(|| config.schema_file.clone())
                .ok_or_else(|| ConsoleError::validation("no schema snapshot file configured"))?;
            if object_classes.is_empty() && attribute_types.is_empty() {
                return Err(ConsoleError::validation("no schema elements to delete").into());
            }
            let schema = SchemaLoader::load(&path)?;
            let classes: Vec<&str> = object_classes.iter().map(String::as_str).collect();
            let attributes: Vec<&str> = attribute_types.iter().map(String::as_str).collect();
            let order = order_for_deletion(&schema, &classes, &attributes)?;
            let report = impact_report(&schema, &classes, &attributes)?;
            Ok(json!({
                "order": order.names(),
                "message": report.to_string(),
                "impact": report,
                "ldif": deletion_ldif(&order),
            }))
        }
    }
}

fn manager(offline: &Arc<DisconnectedStore>, flags: MutationFlags) -> Arc<IndexLifecycleManager> {
    let stores = StoreSelector::new().with_disconnected(offline.clone());
    Arc::new(IndexLifecycleManager::new(stores, !flags.server_stopped))
}

fn parse_types(names: &[String]) -> CliResult<BTreeSet<IndexType>> {
    let types = names
        .iter()
        .map(|n| IndexType::parse(n))
        .collect::<Result<BTreeSet<_>, _>>()?;
    Ok(types)
}

fn missing(what: &str, name: &str, backend: &BackendConfig) -> ConsoleError {
    ConsoleError::validation(format!(
        "no {} {} in backend {}",
        what, name, backend.id
    ))
}

fn list_indexes(store: &dyn ConfigStore, backend_id: &str) -> CliResult<Value> {
    let backend = store.read(backend_id)?;
    Ok(json!({
        "backend": backend.id,
        "base_dns": backend.base_dns,
        "indexes": backend.indexes,
        "vlv_indexes": backend.vlv_indexes,
    }))
}

/// Run a planned mutation as a task, or only describe it on a dry run
fn run_mutation(
    config: &ConsoleConfig,
    manager: Arc<IndexLifecycleManager>,
    mutation: ConfigMutation,
    flags: MutationFlags,
) -> CliResult<Value> {
    let task = Task::new(config.instance.clone(), IndexTask::new(manager, mutation.clone()));
    let command_line = task.command_line();
    if flags.dry_run {
        return Ok(json!({
            "dry_run": true,
            "description": mutation.description(),
            "command_line": command_line,
        }));
    }

    let finished = run_task(task)?;
    Ok(json!({
        "dry_run": false,
        "description": mutation.description(),
        "command_line": command_line,
        "task": finished.summary(),
    }))
}

fn run_task(task: Task) -> CliResult<Task> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::io_error(format!("failed to create tokio runtime: {}", e)))?;
    let coordinator = TaskCoordinator::new();
    let finished = runtime.block_on(async move {
        let handle = coordinator.submit(task)?;
        handle.wait().await
    })?;
    if let Some(e) = finished.last_error() {
        return Err(e.clone().into());
    }
    Ok(finished)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexDescriptor;
    use crate::store::ConfigFile;
    use tempfile::TempDir;

    fn setup() -> (TempDir, ConsoleConfig) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut backend =
            BackendConfig::new("userRoot", vec![Dn::parse("dc=example,dc=com").unwrap()]);
        backend.indexes.push(IndexDescriptor::new(
            "userRoot",
            "cn",
            [IndexType::Equality],
            4000,
        ));
        backend.indexes.push(IndexDescriptor::system("userRoot", "id2children"));
        DisconnectedStore::new(&path)
            .save(&ConfigFile {
                backends: vec![backend],
            })
            .unwrap();
        let config = ConsoleConfig {
            server_config_file: path,
            ..Default::default()
        };
        (dir, config)
    }

    fn stopped() -> MutationFlags {
        MutationFlags {
            server_stopped: true,
            dry_run: false,
        }
    }

    #[test]
    fn test_list_indexes() {
        let (_dir, config) = setup();
        let out = execute(
            &config,
            Command::ListIndexes {
                backend: "userRoot".into(),
            },
        )
        .unwrap();
        assert_eq!(out["indexes"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_create_index_commits_to_file() {
        let (_dir, config) = setup();
        let out = execute(
            &config,
            Command::CreateIndex {
                backend: "userRoot".into(),
                attribute: "mail".into(),
                types: vec!["equality".into()],
                entry_limit: 4000,
                flags: stopped(),
            },
        )
        .unwrap();
        assert_eq!(out["task"]["state"], "FINISHED_SUCCESSFULLY");

        let file = DisconnectedStore::new(&config.server_config_file).load().unwrap();
        assert!(file.backend("userRoot").unwrap().index("mail").is_some());
    }

    #[test]
    fn test_dry_run_leaves_file_alone() {
        let (_dir, config) = setup();
        let out = execute(
            &config,
            Command::DeleteIndex {
                backend: "userRoot".into(),
                attribute: "cn".into(),
                flags: MutationFlags {
                    server_stopped: true,
                    dry_run: true,
                },
            },
        )
        .unwrap();
        assert_eq!(out["dry_run"], true);
        assert!(out["command_line"]
            .as_str()
            .unwrap()
            .starts_with("dsconfig delete-backend-index"));

        let file = DisconnectedStore::new(&config.server_config_file).load().unwrap();
        assert!(file.backend("userRoot").unwrap().index("cn").is_some());
    }

    #[test]
    fn test_running_server_needs_session() {
        let (_dir, config) = setup();
        let err = execute(
            &config,
            Command::DeleteIndex {
                backend: "userRoot".into(),
                attribute: "cn".into(),
                flags: MutationFlags::default(),
            },
        )
        .unwrap_err();
        assert_eq!(err.code_str(), "DSC_CONFIG_REMOTE");
    }

    #[test]
    fn test_system_index_delete_refused() {
        let (_dir, config) = setup();
        let err = execute(
            &config,
            Command::DeleteIndex {
                backend: "userRoot".into(),
                attribute: "id2children".into(),
                flags: stopped(),
            },
        )
        .unwrap_err();
        assert_eq!(err.code_str(), "DSC_PERMISSION");
    }

    #[test]
    fn test_analyze_filter_reports_missing_indexes() {
        let (_dir, config) = setup();
        let out = execute(
            &config,
            Command::AnalyzeFilter {
                backend: "userRoot".into(),
                filter: "(&(cn=John)(mail=*@example.com))".into(),
            },
        )
        .unwrap();
        assert_eq!(out["warnings"], json!(["define SUBSTRING index on mail"]));
    }
}
