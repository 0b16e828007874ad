//! JSON output for the CLI
//!
//! Every command writes exactly one JSON object to stdout.

use std::io::{self, Write};

use serde_json::Value;

use super::errors::CliResult;

fn write_value(out: &mut impl Write, value: &Value) -> CliResult<()> {
    serde_json::to_writer(&mut *out, value)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

/// Success envelope
pub fn response(data: Value) -> Value {
    serde_json::json!({
        "status": "ok",
        "data": data
    })
}

/// Error envelope
pub fn error_response(code: &str, message: &str) -> Value {
    serde_json::json!({
        "status": "error",
        "code": code,
        "message": message
    })
}

/// Write a success response to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    write_value(&mut io::stdout(), &response(data))
}

/// Write an error response to stdout
pub fn write_error(code: &str, message: &str) -> CliResult<()> {
    write_value(&mut io::stdout(), &error_response(code, message))
}
