//! Command-line front end.
//!
//! Results go to stdout as JSON or plain lines; logs go to stderr.

pub mod args;
pub mod build;
pub mod query;

pub use args::{BuildArgs, Cli, Commands};

use anyhow::Result;
use serde::Serialize;

/// Print `value` as JSON on stdout.
fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let formatted = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{formatted}");
    Ok(())
}
