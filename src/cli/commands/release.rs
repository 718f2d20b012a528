//! Create the release for a run from its uploaded artifacts.

use super::helpers::{github_publisher, load_workspace, print_release_outcome, run_context};
use crate::cli::{Args, RuntimeConfig};
use crate::config::RetryConfig;
use crate::error::Result;
use crate::release::{ReleaseCreator, ReleaseOutcome};

/// Execute release command
pub(super) async fn execute_release(args: &Args, config: &RuntimeConfig) -> Result<()> {
    let ws = load_workspace(args)?;
    let context = run_context(&ws.env)?;

    if !context.event.creates_release(&ws.config.main_branch) {
        let outcome = ReleaseOutcome::Skipped {
            reason: format!(
                "{} does not publish releases, only a push to {} does",
                context.event, ws.config.main_branch
            ),
        };
        print_release_outcome(config, &outcome);
        return Ok(());
    }

    let publisher = github_publisher(&context, &ws.project_dir, &ws.env).await?;
    config.progress_println(&format!(
        "Releasing run {} to {}",
        context.run_number,
        publisher.repository()
    ));

    let outcome = ReleaseCreator::new(&publisher, &ws.config, &ws.project_dir, &ws.store)
        .with_retry(RetryConfig::from_env(&ws.env))
        .run(&context)
        .await?;
    print_release_outcome(config, &outcome);
    Ok(())
}
