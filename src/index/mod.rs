//! Index configuration for dsconsole
//!
//! Standard attribute indexes and VLV indexes of a backend, described as
//! immutable values. Changes are computed as pure diffs and committed one
//! descriptor at a time through a configuration store.
//!
//! # Invariants
//!
//! - Validation completes before any store is touched
//! - Only differing properties are sent on modification
//! - System indexes are never deleted or changed

mod diff;
mod manager;
mod task;
mod types;

pub use diff::{property, IndexDiff, PropertyChange, VlvIndexDiff};
pub use manager::{IndexEvent, IndexLifecycleManager, IndexModification, VlvIndexPlan};
pub use task::IndexTask;
pub use types::{
    format_sort_order, parse_sort_order, IndexDescriptor, IndexType, SearchScope, SortKey,
    VlvIndexDescriptor, DEFAULT_ENTRY_LIMIT, MAX_ENTRY_LIMIT, MIN_ENTRY_LIMIT,
};
