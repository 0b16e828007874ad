//! Observability for dsconsole
//!
//! Logging goes through `tracing`. Lifecycle points are named by [`Event`]
//! and recorded in the `event` field so they can be filtered in JSON output:
//!
//! ```ignore
//! use dsconsole::observability::Event;
//!
//! tracing::info!(event = %Event::TaskAdmitted, task_id = %id, "task admitted");
//! ```

mod events;
mod logging;

pub use events::Event;
pub use logging::{init_logging, parse_log_level, LOG_ENV_VAR};
