//! dsconsole CLI entry point
//!
//! Parses arguments, dispatches to the CLI module and exits non-zero on
//! failure. The JSON error response is already on stdout by then.

use dsconsole::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
