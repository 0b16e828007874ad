//! Property diffs between index descriptors
//!
//! Only properties whose value differs are carried, so a commit never
//! resets a property the user did not touch.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::types::{
    format_sort_order, IndexDescriptor, IndexType, SearchScope, SortKey, VlvIndexDescriptor,
};
use crate::dn::Dn;

/// One configuration property change, in management-protocol terms
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PropertyChange {
    /// Replace all values of the property
    Set { property: String, value: String },
    /// Add one value to a multi-valued property
    Add { property: String, value: String },
    /// Remove one value from a multi-valued property
    Remove { property: String, value: String },
}

impl PropertyChange {
    pub fn set(property: &str, value: impl Into<String>) -> Self {
        Self::Set {
            property: property.to_string(),
            value: value.into(),
        }
    }

    pub fn add(property: &str, value: impl Into<String>) -> Self {
        Self::Add {
            property: property.to_string(),
            value: value.into(),
        }
    }

    pub fn remove(property: &str, value: impl Into<String>) -> Self {
        Self::Remove {
            property: property.to_string(),
            value: value.into(),
        }
    }

    pub fn property(&self) -> &str {
        match self {
            Self::Set { property, .. } | Self::Add { property, .. } | Self::Remove { property, .. } => {
                property
            }
        }
    }

    /// `--set`, `--add` or `--remove` followed by `property:value`
    pub fn command_line_arguments(&self) -> [String; 2] {
        let (flag, property, value) = match self {
            Self::Set { property, value } => ("--set", property, value),
            Self::Add { property, value } => ("--add", property, value),
            Self::Remove { property, value } => ("--remove", property, value),
        };
        [flag.to_string(), format!("{}:{}", property, value)]
    }
}

impl fmt::Display for PropertyChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [flag, arg] = self.command_line_arguments();
        write!(f, "{} {}", flag, arg)
    }
}

/// Configuration property names
pub mod property {
    pub const INDEX_TYPE: &str = "index-type";
    pub const INDEX_ENTRY_LIMIT: &str = "index-entry-limit";
    pub const BASE_DN: &str = "base-dn";
    pub const SCOPE: &str = "scope";
    pub const FILTER: &str = "filter";
    pub const SORT_ORDER: &str = "sort-order";
}

/// Diff of a standard index
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDiff {
    pub added_types: BTreeSet<IndexType>,
    pub removed_types: BTreeSet<IndexType>,
    pub entry_limit: Option<i64>,
}

impl IndexDiff {
    /// Diff from `existing` to the requested values
    pub fn between(existing: &IndexDescriptor, types: &BTreeSet<IndexType>, entry_limit: i64) -> Self {
        Self {
            added_types: types.difference(&existing.types).copied().collect(),
            removed_types: existing.types.difference(types).copied().collect(),
            entry_limit: (entry_limit != existing.entry_limit).then_some(entry_limit),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added_types.is_empty() && self.removed_types.is_empty() && self.entry_limit.is_none()
    }

    pub fn types_changed(&self) -> bool {
        !self.added_types.is_empty() || !self.removed_types.is_empty()
    }

    /// Apply to a descriptor, producing the new value
    pub fn apply_to(&self, existing: &IndexDescriptor) -> IndexDescriptor {
        let mut updated = existing.clone();
        for t in &self.removed_types {
            updated.types.remove(t);
        }
        updated.types.extend(self.added_types.iter().copied());
        if let Some(limit) = self.entry_limit {
            updated.entry_limit = limit;
        }
        updated
    }

    pub fn property_changes(&self) -> Vec<PropertyChange> {
        let mut changes = Vec::new();
        for t in &self.added_types {
            changes.push(PropertyChange::add(property::INDEX_TYPE, t.backend_name()));
        }
        for t in &self.removed_types {
            changes.push(PropertyChange::remove(property::INDEX_TYPE, t.backend_name()));
        }
        if let Some(limit) = self.entry_limit {
            changes.push(PropertyChange::set(property::INDEX_ENTRY_LIMIT, limit.to_string()));
        }
        changes
    }
}

/// Diff of a VLV index
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VlvIndexDiff {
    pub base_dn: Option<Dn>,
    pub scope: Option<SearchScope>,
    pub filter: Option<String>,
    pub sort_order: Option<Vec<SortKey>>,
}

impl VlvIndexDiff {
    pub fn between(existing: &VlvIndexDescriptor, requested: &VlvIndexDescriptor) -> Self {
        Self {
            base_dn: (existing.base_dn != requested.base_dn).then(|| requested.base_dn.clone()),
            scope: (existing.scope != requested.scope).then_some(requested.scope),
            filter: (existing.filter != requested.filter).then(|| requested.filter.clone()),
            sort_order: (existing.sort_order != requested.sort_order)
                .then(|| requested.sort_order.clone()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.base_dn.is_none()
            && self.scope.is_none()
            && self.filter.is_none()
            && self.sort_order.is_none()
    }

    pub fn apply_to(&self, existing: &VlvIndexDescriptor) -> VlvIndexDescriptor {
        let mut updated = existing.clone();
        if let Some(dn) = &self.base_dn {
            updated.base_dn = dn.clone();
        }
        if let Some(scope) = self.scope {
            updated.scope = scope;
        }
        if let Some(filter) = &self.filter {
            updated.filter = filter.clone();
        }
        if let Some(keys) = &self.sort_order {
            updated.sort_order = keys.clone();
        }
        updated
    }

    pub fn property_changes(&self) -> Vec<PropertyChange> {
        let mut changes = Vec::new();
        if let Some(dn) = &self.base_dn {
            changes.push(PropertyChange::set(property::BASE_DN, dn.to_string()));
        }
        if let Some(scope) = self.scope {
            changes.push(PropertyChange::set(property::SCOPE, scope.backend_name()));
        }
        if let Some(filter) = &self.filter {
            changes.push(PropertyChange::set(property::FILTER, filter.clone()));
        }
        if let Some(keys) = &self.sort_order {
            changes.push(PropertyChange::set(property::SORT_ORDER, format_sort_order(keys)));
        }
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(types: &[IndexType], limit: i64) -> IndexDescriptor {
        IndexDescriptor::new("userRoot", "cn", types.iter().copied(), limit)
    }

    #[test]
    fn test_identical_values_give_empty_diff() {
        let existing = index(&[IndexType::Equality, IndexType::Substring], 4000);
        let diff = IndexDiff::between(&existing, &existing.types, 4000);
        assert!(diff.is_empty());
        assert!(diff.property_changes().is_empty());
    }

    #[test]
    fn test_only_changed_properties_are_listed() {
        let existing = index(&[IndexType::Equality], 4000);
        let requested: BTreeSet<_> = [IndexType::Presence].into_iter().collect();
        let diff = IndexDiff::between(&existing, &requested, 4000);

        assert!(diff.types_changed());
        assert_eq!(diff.entry_limit, None);
        assert_eq!(
            diff.property_changes(),
            vec![
                PropertyChange::add("index-type", "presence"),
                PropertyChange::remove("index-type", "equality"),
            ]
        );
    }

    #[test]
    fn test_apply_produces_requested_descriptor() {
        let existing = index(&[IndexType::Equality], 4000);
        let requested: BTreeSet<_> = [IndexType::Equality, IndexType::Ordering].into_iter().collect();
        let diff = IndexDiff::between(&existing, &requested, 100);
        let updated = diff.apply_to(&existing);
        assert_eq!(updated.types, requested);
        assert_eq!(updated.entry_limit, 100);
    }

    #[test]
    fn test_vlv_diff() {
        let existing = VlvIndexDescriptor {
            name: "byName".into(),
            backend: "userRoot".into(),
            base_dn: Dn::parse("dc=example,dc=com").unwrap(),
            scope: SearchScope::WholeSubtree,
            filter: "(objectClass=person)".into(),
            sort_order: vec![SortKey::asc("sn")],
        };
        let mut requested = existing.clone();
        requested.sort_order = vec![SortKey::asc("sn"), SortKey::desc("givenName")];

        let diff = VlvIndexDiff::between(&existing, &requested);
        assert_eq!(
            diff.property_changes(),
            vec![PropertyChange::set("sort-order", "+sn -givenName")]
        );
        assert_eq!(diff.apply_to(&existing), requested);
        assert!(VlvIndexDiff::between(&existing, &existing).is_empty());
    }

    #[test]
    fn test_property_change_arguments() {
        let change = PropertyChange::set("index-entry-limit", "10");
        assert_eq!(change.to_string(), "--set index-entry-limit:10");
    }
}
