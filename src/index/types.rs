//! Index descriptor definitions
//!
//! Descriptors are immutable values. A modification produces a new
//! descriptor plus a diff; nothing is edited in place by callers.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dn::Dn;
use crate::error::{ConsoleError, ConsoleResult};

/// Smallest accepted index entry limit
pub const MIN_ENTRY_LIMIT: i64 = 0;
/// Largest accepted index entry limit
pub const MAX_ENTRY_LIMIT: i64 = 2_147_483_647;
/// Entry limit used when none is given
pub const DEFAULT_ENTRY_LIMIT: i64 = 4000;

/// Kinds of standard attribute index
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexType {
    Approximate,
    Equality,
    Ordering,
    Presence,
    Substring,
}

impl IndexType {
    pub const ALL: [IndexType; 5] = [
        IndexType::Approximate,
        IndexType::Equality,
        IndexType::Ordering,
        IndexType::Presence,
        IndexType::Substring,
    ];

    /// Name used by the backend configuration (`index-type` property)
    pub fn backend_name(&self) -> &'static str {
        match self {
            IndexType::Approximate => "approximate",
            IndexType::Equality => "equality",
            IndexType::Ordering => "ordering",
            IndexType::Presence => "presence",
            IndexType::Substring => "substring",
        }
    }

    /// Upper-case label used in warnings
    pub fn label(&self) -> &'static str {
        match self {
            IndexType::Approximate => "APPROXIMATE",
            IndexType::Equality => "EQUALITY",
            IndexType::Ordering => "ORDERING",
            IndexType::Presence => "PRESENCE",
            IndexType::Substring => "SUBSTRING",
        }
    }

    pub fn parse(name: &str) -> ConsoleResult<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.backend_name().eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| ConsoleError::validation(format!("unknown index type '{}'", name)))
    }
}

impl fmt::Display for IndexType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A standard attribute index of one backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    /// Indexed attribute, identity is case-insensitive
    pub attribute: String,
    /// Owning backend
    pub backend: String,
    /// Index types maintained
    pub types: BTreeSet<IndexType>,
    /// Maximum entries per key before the key is treated as unindexed
    #[serde(default = "default_entry_limit")]
    pub entry_limit: i64,
    /// Internal database index, not user-configurable
    #[serde(default)]
    pub is_system_index: bool,
}

fn default_entry_limit() -> i64 {
    DEFAULT_ENTRY_LIMIT
}

impl IndexDescriptor {
    pub fn new(
        backend: impl Into<String>,
        attribute: impl Into<String>,
        types: impl IntoIterator<Item = IndexType>,
        entry_limit: i64,
    ) -> Self {
        Self {
            attribute: attribute.into(),
            backend: backend.into(),
            types: types.into_iter().collect(),
            entry_limit,
            is_system_index: false,
        }
    }

    /// Internal index such as `dn2id` or `entryUUID`
    pub fn system(backend: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            backend: backend.into(),
            types: BTreeSet::new(),
            entry_limit: DEFAULT_ENTRY_LIMIT,
            is_system_index: true,
        }
    }

    /// Lower-case identity key
    pub fn key(&self) -> String {
        self.attribute.to_ascii_lowercase()
    }

    pub fn has_type(&self, index_type: IndexType) -> bool {
        self.types.contains(&index_type)
    }

    pub fn same_attribute(&self, attribute: &str) -> bool {
        self.attribute.eq_ignore_ascii_case(attribute.trim())
    }
}

/// VLV index search scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchScope {
    BaseObject,
    SingleLevel,
    #[serde(rename = "subordinate-subtree", alias = "subordinates")]
    Subordinates,
    WholeSubtree,
}

impl SearchScope {
    pub const ALL: [SearchScope; 4] = [
        SearchScope::BaseObject,
        SearchScope::SingleLevel,
        SearchScope::Subordinates,
        SearchScope::WholeSubtree,
    ];

    /// Name used by the backend configuration (`scope` property)
    pub fn backend_name(&self) -> &'static str {
        match self {
            SearchScope::BaseObject => "base-object",
            SearchScope::SingleLevel => "single-level",
            SearchScope::Subordinates => "subordinate-subtree",
            SearchScope::WholeSubtree => "whole-subtree",
        }
    }

    pub fn parse(name: &str) -> ConsoleResult<Self> {
        let name = name.trim().to_ascii_lowercase();
        let scope = match name.as_str() {
            "base" | "base-object" => SearchScope::BaseObject,
            "one" | "single-level" => SearchScope::SingleLevel,
            "subordinates" | "subordinate-subtree" => SearchScope::Subordinates,
            "sub" | "whole-subtree" => SearchScope::WholeSubtree,
            _ => {
                return Err(ConsoleError::validation(format!(
                    "unknown search scope '{}'",
                    name
                )))
            }
        };
        Ok(scope)
    }
}

impl fmt::Display for SearchScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.backend_name())
    }
}

/// One key of a VLV sort order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub attribute: String,
    pub ascending: bool,
}

impl SortKey {
    pub fn asc(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            ascending: true,
        }
    }

    pub fn desc(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            ascending: false,
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.ascending { '+' } else { '-' };
        write!(f, "{}{}", sign, self.attribute)
    }
}

/// Render a sort order in the backend's `sort-order` syntax (`+cn -sn`)
pub fn format_sort_order(keys: &[SortKey]) -> String {
    keys.iter()
        .map(SortKey::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse the backend's `sort-order` syntax. A key without sign is ascending.
pub fn parse_sort_order(input: &str) -> ConsoleResult<Vec<SortKey>> {
    input
        .split_whitespace()
        .map(|token| {
            let (ascending, attribute) = match token.as_bytes()[0] {
                b'+' => (true, &token[1..]),
                b'-' => (false, &token[1..]),
                _ => (true, token),
            };
            if attribute.is_empty() {
                return Err(ConsoleError::validation(format!(
                    "sort key '{}' has no attribute",
                    token
                )));
            }
            Ok(SortKey {
                attribute: attribute.to_string(),
                ascending,
            })
        })
        .collect()
}

/// A VLV (virtual list view) index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VlvIndexDescriptor {
    /// Unique per backend, case-insensitive
    pub name: String,
    pub backend: String,
    pub base_dn: Dn,
    pub scope: SearchScope,
    /// Search filter string, kept as written
    pub filter: String,
    /// Multi-key sort order, significant order
    pub sort_order: Vec<SortKey>,
}

impl VlvIndexDescriptor {
    pub fn key(&self) -> String {
        self.name.to_ascii_lowercase()
    }

    pub fn same_name(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Name as addressed on the command line
    pub fn command_line_name(&self) -> String {
        format!("vlv.{}", self.name)
    }
}
