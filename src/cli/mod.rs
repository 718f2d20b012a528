//! Command line interface for pdf_table_release.
//!
//! Argument parsing, command dispatch and user feedback. Library modules
//! log through `log`; this layer is the only one printing to the terminal.

mod args;
pub mod commands;
mod output;

pub use args::{Args, Command, RuntimeConfig, TriggerArgs};
pub use commands::execute_command;
pub use output::OutputManager;

use crate::error::Result;

/// Main CLI entry point
pub async fn run() -> Result<i32> {
    let args = Args::parse_args();
    execute_command(args).await
}
