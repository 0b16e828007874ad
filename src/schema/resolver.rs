//! Deletion ordering and impact analysis for schema elements
//!
//! A server refuses to delete an element that another element still uses
//! as superior, so within each collection descendants must come first.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use super::types::{AttributeType, ObjectClass, Schema};
use crate::error::{ConsoleError, ConsoleResult};

/// Elements to delete, each collection in a safe deletion order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletionOrder {
    pub object_classes: Vec<ObjectClass>,
    pub attribute_types: Vec<AttributeType>,
}

impl DeletionOrder {
    pub fn is_empty(&self) -> bool {
        self.object_classes.is_empty() && self.attribute_types.is_empty()
    }

    /// Names in execution order, object classes first
    pub fn names(&self) -> Vec<String> {
        self.object_classes
            .iter()
            .map(|c| c.name_or_oid().to_string())
            .chain(self.attribute_types.iter().map(|a| a.name_or_oid().to_string()))
            .collect()
    }
}

fn resolve_classes<'s>(schema: &'s Schema, names: &[&str]) -> ConsoleResult<Vec<&'s ObjectClass>> {
    let mut resolved: Vec<&ObjectClass> = Vec::new();
    for name in names {
        let class = schema
            .object_class(name)
            .ok_or_else(|| ConsoleError::validation(format!("unknown object class '{}'", name)))?;
        if !resolved.iter().any(|c| c.oid == class.oid) {
            resolved.push(class);
        }
    }
    Ok(resolved)
}

fn resolve_attributes<'s>(
    schema: &'s Schema,
    names: &[&str],
) -> ConsoleResult<Vec<&'s AttributeType>> {
    let mut resolved: Vec<&AttributeType> = Vec::new();
    for name in names {
        let attr = schema
            .attribute_type(name)
            .ok_or_else(|| ConsoleError::validation(format!("unknown attribute type '{}'", name)))?;
        if !resolved.iter().any(|a| a.oid == attr.oid) {
            resolved.push(attr);
        }
    }
    Ok(resolved)
}

/// Place each element of `input`, in input order, into the output list.
///
/// An element goes right after the last already-placed descendant. With no
/// placed descendant it goes before the first already-placed ancestor, and
/// with neither it is appended.
fn order<T: Clone>(input: &[&T], descends: impl Fn(&T, &T) -> bool) -> Vec<T> {
    let mut ordered: Vec<&T> = Vec::with_capacity(input.len());
    for &element in input {
        let last_descendant = ordered.iter().rposition(|placed| descends(placed, element));
        let first_ancestor = ordered.iter().position(|placed| descends(element, placed));
        match (last_descendant, first_ancestor) {
            (Some(i), _) => ordered.insert(i + 1, element),
            (None, Some(i)) => ordered.insert(i, element),
            (None, None) => ordered.push(element),
        }
    }
    ordered.into_iter().cloned().collect()
}

/// Safe deletion order for the named elements. Unknown names are a
/// `ValidationError`; repeated names are kept once.
pub fn order_for_deletion(
    schema: &Schema,
    object_classes: &[&str],
    attribute_types: &[&str],
) -> ConsoleResult<DeletionOrder> {
    let classes = resolve_classes(schema, object_classes)?;
    let attributes = resolve_attributes(schema, attribute_types)?;
    Ok(DeletionOrder {
        object_classes: order(&classes, |a, b| schema.is_descendant_of(a, b)),
        attribute_types: order(&attributes, |a, b| schema.attribute_is_descendant_of(a, b)),
    })
}

/// Advisory summary of what a deletion affects
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImpactReport {
    /// Classes to delete, as given
    pub deleted_classes: Vec<String>,
    /// Attribute types to delete, as given
    pub deleted_attributes: Vec<String>,
    /// Kept classes with a deleted class as direct superior
    pub child_classes: BTreeSet<String>,
    /// Kept attribute types with a deleted type as direct superior
    pub child_attributes: BTreeSet<String>,
    /// Kept classes requiring or allowing a deleted attribute type
    pub dependent_classes: BTreeSet<String>,
}

impl ImpactReport {
    /// True when nothing outside the deletion set is affected
    pub fn is_clean(&self) -> bool {
        self.child_classes.is_empty()
            && self.child_attributes.is_empty()
            && self.dependent_classes.is_empty()
    }
}

fn join(names: &BTreeSet<String>) -> String {
    names.iter().cloned().collect::<Vec<_>>().join(", ")
}

impl fmt::Display for ImpactReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.child_classes.is_empty() {
            match self.deleted_classes.as_slice() {
                [only] => writeln!(
                    f,
                    "Object class {} is superior of the following object classes: {}",
                    only,
                    join(&self.child_classes)
                )?,
                _ => writeln!(
                    f,
                    "The object classes to delete are superior of the following object classes: {}",
                    join(&self.child_classes)
                )?,
            }
        }
        if !self.child_attributes.is_empty() {
            match self.deleted_attributes.as_slice() {
                [only] => writeln!(
                    f,
                    "Attribute {} is superior of the following attributes: {}",
                    only,
                    join(&self.child_attributes)
                )?,
                _ => writeln!(
                    f,
                    "The attributes to delete are superior of the following attributes: {}",
                    join(&self.child_attributes)
                )?,
            }
        }
        if !self.dependent_classes.is_empty() {
            match self.deleted_attributes.as_slice() {
                [only] => writeln!(
                    f,
                    "Attribute {} is used by the following object classes: {}",
                    only,
                    join(&self.dependent_classes)
                )?,
                _ => writeln!(
                    f,
                    "The attributes to delete are used by the following object classes: {}",
                    join(&self.dependent_classes)
                )?,
            }
        }
        let all: Vec<&str> = self
            .deleted_classes
            .iter()
            .chain(self.deleted_attributes.iter())
            .map(String::as_str)
            .collect();
        write!(f, "The following schema elements will be deleted: {}", all.join(", "))
    }
}

/// Impact of deleting the named elements from `schema`
pub fn impact_report(
    schema: &Schema,
    object_classes: &[&str],
    attribute_types: &[&str],
) -> ConsoleResult<ImpactReport> {
    let classes = resolve_classes(schema, object_classes)?;
    let attributes = resolve_attributes(schema, attribute_types)?;
    let deleted_class = |c: &ObjectClass| classes.iter().any(|d| d.oid == c.oid);
    let deleted_attribute = |a: &AttributeType| attributes.iter().any(|d| d.oid == a.oid);

    let mut report = ImpactReport {
        deleted_classes: classes.iter().map(|c| c.name_or_oid().to_string()).collect(),
        deleted_attributes: attributes.iter().map(|a| a.name_or_oid().to_string()).collect(),
        ..Default::default()
    };

    for class in schema.object_classes() {
        if deleted_class(class) {
            continue;
        }
        let superiors = schema.superior_classes(class);
        if superiors.iter().any(|s| deleted_class(*s)) {
            report.child_classes.insert(class.name_or_oid().to_string());
        }
        let uses_deleted = schema
            .required_attribute_chain(class)
            .into_iter()
            .chain(schema.optional_attribute_chain(class))
            .any(deleted_attribute);
        if uses_deleted {
            report.dependent_classes.insert(class.name_or_oid().to_string());
        }
    }

    for attr in schema.attribute_types() {
        if deleted_attribute(attr) {
            continue;
        }
        let direct_superior = attr.superior.as_deref().and_then(|s| schema.attribute_type(s));
        if direct_superior.is_some_and(deleted_attribute) {
            report.child_attributes.insert(attr.name_or_oid().to_string());
        }
    }

    Ok(report)
}
