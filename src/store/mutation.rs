//! Configuration mutations and their command-line projection

use serde::{Deserialize, Serialize};

use crate::index::{
    format_sort_order, IndexDescriptor, IndexDiff, PropertyChange, VlvIndexDescriptor,
    VlvIndexDiff,
};
use crate::index::property;

/// Offline configuration tool the mutations project onto
pub const CONFIG_TOOL: &str = "dsconfig";

/// One single-object change to a backend's index configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mutation", rename_all = "snake_case")]
pub enum ConfigMutation {
    CreateIndex {
        index: IndexDescriptor,
    },
    ModifyIndex {
        backend: String,
        attribute: String,
        diff: IndexDiff,
    },
    DeleteIndex {
        backend: String,
        attribute: String,
    },
    CreateVlvIndex {
        index: VlvIndexDescriptor,
    },
    ModifyVlvIndex {
        backend: String,
        name: String,
        diff: VlvIndexDiff,
    },
    DeleteVlvIndex {
        backend: String,
        name: String,
    },
}

impl ConfigMutation {
    pub fn backend(&self) -> &str {
        match self {
            Self::CreateIndex { index } => &index.backend,
            Self::CreateVlvIndex { index } => &index.backend,
            Self::ModifyIndex { backend, .. }
            | Self::DeleteIndex { backend, .. }
            | Self::ModifyVlvIndex { backend, .. }
            | Self::DeleteVlvIndex { backend, .. } => backend,
        }
    }

    /// Attribute or VLV index name the mutation addresses
    pub fn target(&self) -> &str {
        match self {
            Self::CreateIndex { index } => &index.attribute,
            Self::CreateVlvIndex { index } => &index.name,
            Self::ModifyIndex { attribute, .. } | Self::DeleteIndex { attribute, .. } => attribute,
            Self::ModifyVlvIndex { name, .. } | Self::DeleteVlvIndex { name, .. } => name,
        }
    }

    pub fn is_vlv(&self) -> bool {
        matches!(
            self,
            Self::CreateVlvIndex { .. } | Self::ModifyVlvIndex { .. } | Self::DeleteVlvIndex { .. }
        )
    }

    /// Human-readable description
    pub fn description(&self) -> String {
        let backend = self.backend();
        match self {
            Self::CreateIndex { index } => {
                format!("New index {} in backend {}", index.attribute, backend)
            }
            Self::ModifyIndex { attribute, .. } => {
                format!("Modify index {} in backend {}", attribute, backend)
            }
            Self::DeleteIndex { attribute, .. } => {
                format!("Delete index {} in backend {}", attribute, backend)
            }
            Self::CreateVlvIndex { index } => {
                format!("New VLV index {} in backend {}", index.name, backend)
            }
            Self::ModifyVlvIndex { name, .. } => {
                format!("Modify VLV index {} in backend {}", name, backend)
            }
            Self::DeleteVlvIndex { name, .. } => {
                format!("Delete VLV index {} in backend {}", name, backend)
            }
        }
    }

    /// Property changes carried by the mutation
    pub fn property_changes(&self) -> Vec<PropertyChange> {
        match self {
            Self::CreateIndex { index } => {
                let mut changes: Vec<PropertyChange> = index
                    .types
                    .iter()
                    .map(|t| PropertyChange::set(property::INDEX_TYPE, t.backend_name()))
                    .collect();
                changes.push(PropertyChange::set(
                    property::INDEX_ENTRY_LIMIT,
                    index.entry_limit.to_string(),
                ));
                changes
            }
            Self::CreateVlvIndex { index } => vec![
                PropertyChange::set(property::BASE_DN, index.base_dn.to_string()),
                PropertyChange::set(property::SCOPE, index.scope.backend_name()),
                PropertyChange::set(property::FILTER, index.filter.clone()),
                PropertyChange::set(property::SORT_ORDER, format_sort_order(&index.sort_order)),
            ],
            Self::ModifyIndex { diff, .. } => diff.property_changes(),
            Self::ModifyVlvIndex { diff, .. } => diff.property_changes(),
            Self::DeleteIndex { .. } | Self::DeleteVlvIndex { .. } => Vec::new(),
        }
    }

    /// True when committing would change nothing
    pub fn is_noop(&self) -> bool {
        match self {
            Self::ModifyIndex { diff, .. } => diff.is_empty(),
            Self::ModifyVlvIndex { diff, .. } => diff.is_empty(),
            _ => false,
        }
    }

    /// Arguments for [`CONFIG_TOOL`] performing the same change offline
    pub fn command_line_arguments(&self) -> Vec<String> {
        let subcommand = match self {
            Self::CreateIndex { .. } => "create-backend-index",
            Self::ModifyIndex { .. } => "set-backend-index-prop",
            Self::DeleteIndex { .. } => "delete-backend-index",
            Self::CreateVlvIndex { .. } => "create-backend-vlv-index",
            Self::ModifyVlvIndex { .. } => "set-backend-vlv-index-prop",
            Self::DeleteVlvIndex { .. } => "delete-backend-vlv-index",
        };

        let mut args = vec![
            subcommand.to_string(),
            "--backend-name".to_string(),
            self.backend().to_string(),
        ];
        if matches!(self, Self::CreateIndex { .. }) {
            args.push("--type".to_string());
            args.push("generic".to_string());
        }
        args.push("--index-name".to_string());
        args.push(self.target().to_string());
        for change in self.property_changes() {
            args.extend(change.command_line_arguments());
        }
        args.push("--no-prompt".to_string());
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dn::Dn;
    use crate::index::{IndexType, SearchScope, SortKey};

    #[test]
    fn test_create_index_arguments() {
        let mutation = ConfigMutation::CreateIndex {
            index: IndexDescriptor::new(
                "userRoot",
                "mail",
                [IndexType::Equality, IndexType::Substring],
                4000,
            ),
        };
        assert_eq!(
            mutation.command_line_arguments(),
            vec![
                "create-backend-index",
                "--backend-name",
                "userRoot",
                "--type",
                "generic",
                "--index-name",
                "mail",
                "--set",
                "index-type:equality",
                "--set",
                "index-type:substring",
                "--set",
                "index-entry-limit:4000",
                "--no-prompt",
            ]
        );
    }

    #[test]
    fn test_delete_vlv_arguments() {
        let mutation = ConfigMutation::DeleteVlvIndex {
            backend: "userRoot".into(),
            name: "byName".into(),
        };
        assert_eq!(
            mutation.command_line_arguments(),
            vec![
                "delete-backend-vlv-index",
                "--backend-name",
                "userRoot",
                "--index-name",
                "byName",
                "--no-prompt",
            ]
        );
        assert!(mutation.is_vlv());
    }

    #[test]
    fn test_create_vlv_properties() {
        let mutation = ConfigMutation::CreateVlvIndex {
            index: VlvIndexDescriptor {
                name: "byName".into(),
                backend: "userRoot".into(),
                base_dn: Dn::parse("dc=example,dc=com").unwrap(),
                scope: SearchScope::WholeSubtree,
                filter: "(objectClass=person)".into(),
                sort_order: vec![SortKey::asc("sn"), SortKey::desc("cn")],
            },
        };
        let args = mutation.command_line_arguments();
        assert!(args.contains(&"base-dn:dc=example,dc=com".to_string()));
        assert!(args.contains(&"scope:whole-subtree".to_string()));
        assert!(args.contains(&"sort-order:+sn -cn".to_string()));
    }

    #[test]
    fn test_empty_modify_is_noop() {
        let mutation = ConfigMutation::ModifyIndex {
            backend: "userRoot".into(),
            attribute: "cn".into(),
            diff: IndexDiff::default(),
        };
        assert!(mutation.is_noop());
        assert!(mutation.property_changes().is_empty());
        assert_eq!(mutation.description(), "Modify index cn in backend userRoot");
    }
}
