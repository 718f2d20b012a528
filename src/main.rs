//! pdf_table_release - build and release pipeline for the PDF to table converter.
//!
//! `RUST_LOG` controls log verbosity, e.g. `RUST_LOG=pdf_table_release=debug`
//! shows every command line and its output.

use pdf_table_release::cli;
use pdf_table_release::cli::OutputManager;
use std::process;

#[tokio::main]
async fn main() {
    env_logger::init();

    match cli::run().await {
        Ok(exit_code) => {
            process::exit(exit_code);
        }
        Err(e) => {
            let output = OutputManager::new(false, false);
            output.error(&format!("Fatal error: {e}"));

            let suggestions = e.recovery_suggestions();
            if !suggestions.is_empty() {
                let _ = output.println("\n💡 Recovery suggestions:");
                for suggestion in suggestions {
                    let _ = output.indent(&suggestion);
                }
            }

            process::exit(1);
        }
    }
}
