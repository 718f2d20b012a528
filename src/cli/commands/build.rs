//! Run matrix jobs on this host.

use super::helpers::{host_matrix, load_workspace, print_job_reports, run_context};
use crate::build::SystemRunner;
use crate::cli::{Args, RuntimeConfig};
use crate::error::Result;
use crate::matrix::Platform;
use crate::pipeline::Pipeline;
use std::sync::Arc;

/// Execute build command
pub(super) async fn execute_build(
    args: &Args,
    config: &RuntimeConfig,
    platforms: &[Platform],
) -> Result<()> {
    let ws = load_workspace(args)?;
    let context = run_context(&ws.env)?;

    if !context.event.activates(&ws.config.main_branch) {
        config.info_println(&format!("{} does not run the pipeline, nothing to build", context.event));
        return Ok(());
    }

    let matrix = host_matrix(&ws.config, platforms)?;
    for job in matrix.jobs() {
        config.progress_println(&format!(
            "Building {} for run {}",
            job.executable_name, context.run_number
        ));
    }

    let pipeline = Pipeline::new(ws.config, ws.project_dir, ws.store).with_matrix(matrix);
    let reports = pipeline
        .run_matrix(Arc::new(SystemRunner), context.run_number)
        .await?;
    print_job_reports(config, &reports);
    Ok(())
}
