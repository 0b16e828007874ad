//! CLI module for dsconsole
//!
//! Offline front end over the index, filter and schema operations:
//! - list-indexes, create-index, modify-index, delete-index
//! - create-vlv-index, delete-vlv-index
//! - analyze-filter
//! - schema-delete-plan

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command, MutationFlags};
pub use commands::{execute, run, run_command};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_error, write_response};
