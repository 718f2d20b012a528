//! Trigger, matrix and release in one invocation.

use super::helpers::{
    github_publisher, host_matrix, load_workspace, print_job_reports, print_release_outcome,
    run_context,
};
use crate::build::SystemRunner;
use crate::cli::{Args, RuntimeConfig};
use crate::config::RetryConfig;
use crate::error::Result;
use crate::matrix::Platform;
use crate::pipeline::Pipeline;
use std::sync::Arc;

/// Execute run command
pub(super) async fn execute_run(
    args: &Args,
    config: &RuntimeConfig,
    platforms: &[Platform],
) -> Result<()> {
    let ws = load_workspace(args)?;
    let context = run_context(&ws.env)?;
    let main_branch = ws.config.main_branch.clone();

    if !context.event.activates(&main_branch) {
        config.info_println(&format!("{} does not run the pipeline", context.event));
        return Ok(());
    }

    let matrix = host_matrix(&ws.config, platforms)?;
    for platform in ws.config.matrix.platforms() {
        if matrix.job(platform).is_none() {
            config.warning_println(&format!(
                "{} is not built here; its artifact must come from another runner",
                platform.display_name()
            ));
        }
    }

    let retry = RetryConfig::from_env(&ws.env);
    let runner = Arc::new(SystemRunner);

    if context.event.creates_release(&main_branch) {
        // Resolve credentials before spending time on builds
        let publisher = github_publisher(&context, &ws.project_dir, &ws.env).await?;
        let pipeline = Pipeline::new(ws.config, ws.project_dir, ws.store)
            .with_matrix(matrix)
            .with_retry(retry);
        let report = pipeline.run(runner, &publisher, &context).await?;
        print_job_reports(config, &report.jobs);
        print_release_outcome(config, &report.release);
    } else {
        let pipeline = Pipeline::new(ws.config, ws.project_dir, ws.store).with_matrix(matrix);
        let reports = pipeline.run_matrix(runner, context.run_number).await?;
        print_job_reports(config, &reports);
        config.info_println(&format!("No release: {} does not publish releases", context.event));
    }
    Ok(())
}
