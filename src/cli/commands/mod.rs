//! Command execution functions coordinating the pipeline stages.
//!
//! Every command loads the project workspace, runs one or more stages and
//! reports through the runtime output. Errors end in exit code 1 with
//! recovery suggestions.

mod build;
mod helpers;
mod plan;
mod prune;
mod release;
mod run;

use crate::cli::{Args, Command, RuntimeConfig};
use crate::error::Result;

use build::execute_build;
use plan::execute_plan;
use prune::execute_prune;
use release::execute_release;
use run::execute_run;

/// Execute the main command based on parsed arguments
pub async fn execute_command(args: Args) -> Result<i32> {
    if let Err(validation_error) = args.validate() {
        let output = super::OutputManager::new(false, false);
        output.error(&format!("Invalid arguments: {}", validation_error));
        return Ok(1);
    }

    let config = RuntimeConfig::from(&args);

    let result = match &args.command {
        Command::Plan => execute_plan(&args, &config).await,
        Command::Build { platforms } => execute_build(&args, &config, platforms).await,
        Command::Release => execute_release(&args, &config).await,
        Command::Run { platforms } => execute_run(&args, &config, platforms).await,
        Command::Prune => execute_prune(&args, &config).await,
    };

    match result {
        Ok(()) => {
            config.success_println(&format!(
                "Command '{}' completed successfully",
                args.command.name()
            ));
            Ok(0)
        }
        Err(e) => {
            log::debug!("{} failed: {:?}", args.command.name(), e);
            helpers::print_error(&config, args.command.name(), &e);
            Ok(1)
        }
    }
}
