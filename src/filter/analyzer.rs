//! Index requirement analysis for search filters

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::ast::FilterExpr;
use super::parser::base_attribute;
use crate::index::{IndexDescriptor, IndexType};

/// What is missing for a leaf to be evaluated from an index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// The attribute has no index at all
    MissingIndex,
    /// The attribute is indexed but not with the needed type
    MissingIndexType,
}

/// Advisory warning produced by [`analyze`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexWarning {
    /// Attribute as written in the filter, options stripped
    pub attribute: String,
    /// `None` for extensible matches, where any index will do
    pub index_type: Option<IndexType>,
    pub kind: WarningKind,
}

impl fmt::Display for IndexWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.kind, self.index_type) {
            (WarningKind::MissingIndex, Some(t)) => {
                write!(f, "define {} index on {}", t, self.attribute)
            }
            (WarningKind::MissingIndex, None) => write!(f, "define an index on {}", self.attribute),
            (WarningKind::MissingIndexType, Some(t)) => {
                write!(f, "add {} index type to existing index on {}", t, self.attribute)
            }
            (WarningKind::MissingIndexType, None) => {
                write!(f, "existing index on {} cannot serve this filter", self.attribute)
            }
        }
    }
}

/// Build the attribute lookup map expected by [`analyze`]
pub fn index_map<'a>(
    indexes: impl IntoIterator<Item = &'a IndexDescriptor>,
) -> HashMap<String, IndexDescriptor> {
    indexes
        .into_iter()
        .map(|index| (index.key(), index.clone()))
        .collect()
}

/// Walk `filter` pre-order, left to right, and report missing indexes.
///
/// Duplicates are kept; see [`dedup_warnings`].
pub fn analyze(
    filter: &FilterExpr,
    indexes_by_attribute: &HashMap<String, IndexDescriptor>,
) -> Vec<IndexWarning> {
    let mut warnings = Vec::new();
    walk(filter, indexes_by_attribute, &mut warnings);
    warnings
}

fn walk(
    filter: &FilterExpr,
    indexes: &HashMap<String, IndexDescriptor>,
    warnings: &mut Vec<IndexWarning>,
) {
    match filter {
        FilterExpr::And(children) | FilterExpr::Or(children) => {
            for child in children {
                walk(child, indexes, warnings);
            }
        }
        FilterExpr::Not(child) => walk(child, indexes, warnings),
        leaf => {
            if let Some(warning) = check_leaf(leaf, indexes) {
                warnings.push(warning);
            }
        }
    }
}

fn check_leaf(leaf: &FilterExpr, indexes: &HashMap<String, IndexDescriptor>) -> Option<IndexWarning> {
    let kind = leaf.comparison()?;
    let attribute = base_attribute(leaf.attribute()?);
    let required = kind.required_index_type();

    match (lookup(indexes, attribute), required) {
        (None, _) => Some(IndexWarning {
            attribute: attribute.to_string(),
            index_type: required,
            kind: WarningKind::MissingIndex,
        }),
        (Some(index), Some(t)) if !index.has_type(t) => Some(IndexWarning {
            attribute: attribute.to_string(),
            index_type: Some(t),
            kind: WarningKind::MissingIndexType,
        }),
        _ => None,
    }
}

fn lookup<'a>(
    indexes: &'a HashMap<String, IndexDescriptor>,
    attribute: &str,
) -> Option<&'a IndexDescriptor> {
    indexes
        .get(&attribute.to_ascii_lowercase())
        .or_else(|| indexes.get(attribute))
        .or_else(|| indexes.values().find(|index| index.same_attribute(attribute)))
}

/// Drop repeated warnings, keeping the first occurrence of each
pub fn dedup_warnings(warnings: &[IndexWarning]) -> Vec<IndexWarning> {
    let mut seen = HashSet::new();
    warnings
        .iter()
        .filter(|w| seen.insert((w.attribute.to_ascii_lowercase(), w.index_type, w.kind)))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indexes(list: &[IndexDescriptor]) -> HashMap<String, IndexDescriptor> {
        index_map(list)
    }

    #[test]
    fn test_no_indexes_gives_define_warnings() {
        let filter = FilterExpr::parse("(&(cn=foo)(sn~=bar))").unwrap();
        let warnings = analyze(&filter, &HashMap::new());
        let rendered: Vec<String> = warnings.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec!["define EQUALITY index on cn", "define APPROXIMATE index on sn"]
        );
    }

    #[test]
    fn test_missing_type_on_existing_index() {
        let map = indexes(&[IndexDescriptor::new("userRoot", "cn", [IndexType::Equality], 4000)]);
        let filter = FilterExpr::parse("(cn=ab*)").unwrap();
        let warnings = analyze(&filter, &map);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::MissingIndexType);
        assert_eq!(
            warnings[0].to_string(),
            "add SUBSTRING index type to existing index on cn"
        );
    }

    #[test]
    fn test_satisfied_filter_has_no_warnings() {
        let map = indexes(&[IndexDescriptor::new(
            "userRoot",
            "uid",
            [IndexType::Equality, IndexType::Presence],
            4000,
        )]);
        let filter = FilterExpr::parse("(|(uid=jdoe)(uid=*))").unwrap();
        assert!(analyze(&filter, &map).is_empty());
    }

    #[test]
    fn test_not_decomposes_child() {
        let filter = FilterExpr::parse("(!(mail=*))").unwrap();
        let warnings = analyze(&filter, &HashMap::new());
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].index_type, Some(IndexType::Presence));
    }

    #[test]
    fn test_options_and_case_are_ignored() {
        let map = indexes(&[IndexDescriptor::new("userRoot", "CN", [IndexType::Equality], 4000)]);
        let filter = FilterExpr::parse("(cn;lang-fr=Jean)").unwrap();
        assert!(analyze(&filter, &map).is_empty());
    }

    #[test]
    fn test_extensible_match() {
        let filter = FilterExpr::parse("(cn:caseExactMatch:=Foo)").unwrap();
        let warnings = analyze(&filter, &HashMap::new());
        assert_eq!(warnings[0].to_string(), "define an index on cn");

        let map = indexes(&[IndexDescriptor::new("userRoot", "cn", [IndexType::Presence], 4000)]);
        assert!(analyze(&filter, &map).is_empty());

        let no_attribute = FilterExpr::parse("(:caseExactMatch:=Foo)").unwrap();
        assert!(analyze(&no_attribute, &HashMap::new()).is_empty());
    }

    #[test]
    fn test_duplicates_kept_until_dedup() {
        let filter = FilterExpr::parse("(|(cn=a)(cn=b)(sn=c))").unwrap();
        let warnings = analyze(&filter, &HashMap::new());
        assert_eq!(warnings.len(), 3);
        let unique = dedup_warnings(&warnings);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].attribute, "cn");
        assert_eq!(unique[1].attribute, "sn");
    }
}
