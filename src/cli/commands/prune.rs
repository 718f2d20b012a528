//! Remove artifacts past their retention.

use super::helpers::load_workspace;
use crate::cli::{Args, RuntimeConfig};
use crate::error::Result;
use crate::utils::blocking;
use chrono::Utc;

/// Execute prune command
pub(super) async fn execute_prune(args: &Args, config: &RuntimeConfig) -> Result<()> {
    let ws = load_workspace(args)?;
    let store = ws.store.clone();
    let retention_days = ws.config.retention_days;
    let removed = blocking(move || store.prune(Utc::now(), retention_days)).await?;

    if removed.is_empty() {
        config.info_println(&format!("No expired artifacts in {}", ws.store.root().display()));
        return Ok(());
    }

    config.info_println(&format!(
        "Removed {} expired artifact(s) and {} run(s):",
        removed.artifacts.len(),
        removed.runs.len()
    ));
    for manifest in &removed.artifacts {
        config.indent(&format!(
            "run {}: {} (expired {})",
            manifest.run_number,
            manifest.name,
            manifest.expires_at().format("%Y-%m-%d")
        ));
    }
    for run_number in &removed.runs {
        config.verbose_println(&format!("run {} removed", run_number));
    }
    Ok(())
}
