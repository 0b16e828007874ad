//! Schema element deletion as a coordinator task

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::info;

use super::resolver::DeletionOrder;
use super::types::{AttributeType, ObjectClass};
use crate::error::{ConsoleError, ConsoleResult};
use crate::observability::Event;
use crate::store::ClientResult;
use crate::task::{TaskBody, TaskKind};

/// Pseudo-backend locked by schema tasks
pub const SCHEMA_BACKEND: &str = "schema";

/// DN of the server's schema entry
pub const SCHEMA_DN: &str = "cn=schema";

const SCHEMA_TOOL: &str = "ldapmodify";

/// Removes schema definitions from a running server
pub trait SchemaWriter: Send + Sync {
    fn delete_object_class(&self, class: &ObjectClass) -> ClientResult<()>;

    fn delete_attribute_type(&self, attribute: &AttributeType) -> ClientResult<()>;
}

/// Deletes schema elements one at a time in a precomputed safe order.
///
/// Object classes go first, then attribute types. The first failure stops
/// the task; elements already deleted stay deleted.
pub struct DeleteSchemaElementsTask {
    writer: Arc<dyn SchemaWriter>,
    order: DeletionOrder,
}

impl DeleteSchemaElementsTask {
    pub fn new(writer: Arc<dyn SchemaWriter>, order: DeletionOrder) -> Self {
        Self { writer, order }
    }

    pub fn order(&self) -> &DeletionOrder {
        &self.order
    }
}

fn ldif_record(attribute: &str, definition: &str) -> String {
    format!(
        "dn: {}\nchangetype: modify\ndelete: {}\n{}: {}\n-\n",
        SCHEMA_DN, attribute, attribute, definition
    )
}

/// LDIF that performs the deletion, one modify record per element in order.
/// `None` when there is nothing to delete.
pub fn deletion_ldif(order: &DeletionOrder) -> Option<String> {
    if order.is_empty() {
        return None;
    }
    let records: Vec<String> = order
        .object_classes
        .iter()
        .map(|c| ldif_record("objectClasses", &c.definition()))
        .chain(
            order
                .attribute_types
                .iter()
                .map(|a| ldif_record("attributeTypes", &a.definition())),
        )
        .collect();
    Some(records.join("\n"))
}

impl TaskBody for DeleteSchemaElementsTask {
    fn kind(&self) -> TaskKind {
        TaskKind::DeleteSchemaElements
    }

    fn description(&self) -> String {
        format!("Delete schema elements {}", self.order.names().join(", "))
    }

    fn backends(&self) -> BTreeSet<String> {
        [SCHEMA_BACKEND.to_string()].into_iter().collect()
    }

    fn command_line_path(&self) -> Option<&str> {
        Some(SCHEMA_TOOL)
    }

    fn equivalent_ldif(&self) -> Option<String> {
        deletion_ldif(&self.order)
    }

    fn execute(&self) -> ConsoleResult<()> {
        for class in &self.order.object_classes {
            self.writer.delete_object_class(class).map_err(|e| {
                ConsoleError::remote(format!(
                    "failed to delete object class {}: {}",
                    class.name_or_oid(),
                    e
                ))
            })?;
            info!(
                event = %Event::SchemaElementDeleted,
                object_class = class.name_or_oid(),
                "object class deleted"
            );
        }
        for attribute in &self.order.attribute_types {
            self.writer.delete_attribute_type(attribute).map_err(|e| {
                ConsoleError::remote(format!(
                    "failed to delete attribute type {}: {}",
                    attribute.name_or_oid(),
                    e
                ))
            })?;
            info!(
                event = %Event::SchemaElementDeleted,
                attribute_type = attribute.name_or_oid(),
                "attribute type deleted"
            );
        }
        Ok(())
    }
}
