//! Schema snapshot loading
//!
//! A snapshot is a JSON document with `attribute_types` and
//! `object_classes` arrays. Missing or malformed files are local errors;
//! a snapshot whose references do not resolve is a validation error.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use super::types::{AttributeType, ObjectClass, Schema};
use crate::error::{ConsoleError, ConsoleResult};

#[derive(Debug, Deserialize)]
struct Snapshot {
    #[serde(default)]
    attribute_types: Vec<AttributeType>,
    #[serde(default)]
    object_classes: Vec<ObjectClass>,
}

/// Reads schema snapshots from disk
pub struct SchemaLoader;

impl SchemaLoader {
    /// Loads and validates the snapshot at `path`.
    pub fn load(path: &Path) -> ConsoleResult<Schema> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConsoleError::local(format!(
                "failed to read schema file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&content).map_err(|e| match e {
            ConsoleError::Config(_) => ConsoleError::local(format!(
                "invalid schema file {}: {}",
                path.display(),
                e
            )),
            other => other,
        })
    }

    /// Parses a snapshot held in memory.
    pub fn from_json(content: &str) -> ConsoleResult<Schema> {
        let snapshot: Snapshot = serde_json::from_str(content)?;
        Schema::new(snapshot.attribute_types, snapshot.object_classes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SNAPSHOT: &str = r#"{
        "attribute_types": [
            {"oid": "2.5.4.41", "names": ["name"]},
            {"oid": "2.5.4.3", "names": ["cn", "commonName"], "superior": "name"}
        ],
        "object_classes": [
            {"oid": "2.5.6.0", "names": ["top"], "kind": "abstract"},
            {"oid": "2.5.6.6", "names": ["person"], "superiors": ["top"], "required": ["cn"]}
        ]
    }"#;

    #[test]
    fn test_load_snapshot_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SNAPSHOT.as_bytes()).unwrap();

        let schema = SchemaLoader::load(file.path()).unwrap();
        assert!(schema.attribute_type("commonName").is_some());
        assert!(schema.object_class("PERSON").is_some());
    }

    #[test]
    fn test_missing_file_is_local_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SchemaLoader::load(&dir.path().join("absent.json")).unwrap_err();
        assert_eq!(err.code(), "DSC_CONFIG_LOCAL");
    }

    #[test]
    fn test_malformed_json_is_local_error() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();
        let err = SchemaLoader::load(file.path()).unwrap_err();
        assert_eq!(err.code(), "DSC_CONFIG_LOCAL");
    }

    #[test]
    fn test_dangling_reference_is_validation_error() {
        let content = r#"{"attribute_types": [{"oid": "1.1", "names": ["a"], "superior": "ghost"}]}"#;
        assert!(SchemaLoader::from_json(content).unwrap_err().is_validation());
    }
}
