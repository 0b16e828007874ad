//! Schema elements and their safe deletion
//!
//! A [`Schema`] is a validated snapshot of the server's attribute types and
//! object classes. Deleting elements needs an order in which no element is
//! removed while another still inherits from it, and an advisory report of
//! the kept elements that depend on the deleted ones.
//!
//! # Invariants
//!
//! - Within each collection, descendants are deleted before their ancestors
//! - Object classes are deleted before attribute types
//! - The impact report never names an element that is itself being deleted

mod loader;
mod resolver;
mod task;
mod types;

pub use loader::SchemaLoader;
pub use resolver::{impact_report, order_for_deletion, DeletionOrder, ImpactReport};
pub use task::{
    deletion_ldif, DeleteSchemaElementsTask, SchemaWriter, SCHEMA_BACKEND, SCHEMA_DN,
};
pub use types::{AttributeType, ObjectClass, ObjectClassKind, Schema};
