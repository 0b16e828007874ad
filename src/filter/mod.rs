//! Search filters and index requirement analysis
//!
//! A filter is parsed into a [`FilterExpr`] tree, then [`analyze`] walks it
//! and reports which attribute indexes a backend lacks for the filter to be
//! evaluated from indexes. Warnings are advisory only.

mod analyzer;
mod ast;
mod parser;

pub use analyzer::{analyze, dedup_warnings, index_map, IndexWarning, WarningKind};
pub use ast::{ComparisonKind, FilterExpr};
pub use parser::{base_attribute, is_valid_attribute_description, MAX_FILTER_DEPTH};
