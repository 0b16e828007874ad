//! dsconsole - configuration core of a directory server console
//!
//! Index lifecycle, search filter analysis, schema deletion planning and
//! the task coordinator that serializes conflicting operations.

pub mod cli;
pub mod config;
pub mod dn;
pub mod error;
pub mod filter;
pub mod index;
pub mod observability;
pub mod schema;
pub mod store;
pub mod task;

pub use config::ConsoleConfig;
pub use error::{ConsoleError, ConsoleResult};
