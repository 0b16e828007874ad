//! CLI argument definitions using clap
//!
//! Commands:
//! - dsconsole list-indexes --backend <id>
//! - dsconsole create-index | modify-index | delete-index ...
//! - dsconsole create-vlv-index | delete-vlv-index ...
//! - dsconsole analyze-filter --backend <id> --filter <filter>
//! - dsconsole schema-delete-plan --object-class <name>... --attribute-type <name>...

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::index::DEFAULT_ENTRY_LIMIT;

/// dsconsole - configuration tool for a directory server
#[derive(Parser, Debug)]
#[command(name = "dsconsole")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the console configuration file
    #[arg(long, global = true)]
    pub console_config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Flags shared by every command that changes the configuration
#[derive(Args, Debug, Clone, Copy, Default)]
pub struct MutationFlags {
    /// Confirm the server is stopped so the configuration file is edited
    #[arg(long)]
    pub server_stopped: bool,

    /// Print the equivalent command line without committing
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the standard and VLV indexes of a backend
    ListIndexes {
        #[arg(long)]
        backend: String,
    },

    /// Create a standard index
    CreateIndex {
        #[arg(long)]
        backend: String,
        #[arg(long)]
        attribute: String,
        /// Index type, repeatable
        #[arg(long = "type", required = true)]
        types: Vec<String>,
        #[arg(long, default_value_t = DEFAULT_ENTRY_LIMIT)]
        entry_limit: i64,
        #[command(flatten)]
        flags: MutationFlags,
    },

    /// Replace the types and entry limit of a standard index
    ModifyIndex {
        #[arg(long)]
        backend: String,
        #[arg(long)]
        attribute: String,
        /// Index type, repeatable; omit to keep the current types
        #[arg(long = "type")]
        types: Vec<String>,
        /// Omit to keep the current limit
        #[arg(long)]
        entry_limit: Option<i64>,
        #[command(flatten)]
        flags: MutationFlags,
    },

    /// Delete a standard index
    DeleteIndex {
        #[arg(long)]
        backend: String,
        #[arg(long)]
        attribute: String,
        #[command(flatten)]
        flags: MutationFlags,
    },

    /// Create a VLV index
    CreateVlvIndex {
        #[arg(long)]
        backend: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        base_dn: String,
        #[arg(long, default_value = "whole-subtree")]
        scope: String,
        #[arg(long)]
        filter: String,
        /// Sort keys such as "+cn -sn"
        #[arg(long)]
        sort_order: String,
        #[command(flatten)]
        flags: MutationFlags,
    },

    /// Delete a VLV index
    DeleteVlvIndex {
        #[arg(long)]
        backend: String,
        #[arg(long)]
        name: String,
        #[command(flatten)]
        flags: MutationFlags,
    },

    /// Report the indexes a search filter needs
    AnalyzeFilter {
        #[arg(long)]
        backend: String,
        #[arg(long)]
        filter: String,
    },

    /// Show how schema elements would be deleted
    SchemaDeletePlan {
        #[arg(long = "object-class")]
        object_classes: Vec<String>,
        #[arg(long = "attribute-type")]
        attribute_types: Vec<String>,
        /// Schema snapshot; defaults to the console configuration's
        #[arg(long)]
        schema_file: Option<PathBuf>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_index_arguments() {
        let cli = Cli::try_parse_from([
            "dsconsole",
            "--console-config",
            "console.json",
            "create-index",
            "--backend",
            "userRoot",
            "--attribute",
            "mail",
            "--type",
            "equality",
            "--type",
            "substring",
            "--server-stopped",
        ])
        .unwrap();
        assert_eq!(cli.console_config, Some(PathBuf::from("console.json")));
        match cli.command {
            Command::CreateIndex {
                types,
                entry_limit,
                flags,
                ..
            } => {
                assert_eq!(types, vec!["equality", "substring"]);
                assert_eq!(entry_limit, DEFAULT_ENTRY_LIMIT);
                assert!(flags.server_stopped);
                assert!(!flags.dry_run);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_create_index_requires_type() {
        assert!(Cli::try_parse_from([
            "dsconsole",
            "create-index",
            "--backend",
            "userRoot",
            "--attribute",
            "mail",
        ])
        .is_err());
    }
}
