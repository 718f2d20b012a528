//! Show what a run would do without executing anything.

use super::helpers::{load_workspace, trigger_event};
use crate::build::{BuildPlan, SystemRunner, locate_python};
use crate::cli::{Args, RuntimeConfig};
use crate::error::Result;
use crate::release::ReleaseSpec;
use crate::trigger::parse_run_number;

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

/// Execute plan command
pub(super) async fn execute_plan(args: &Args, config: &RuntimeConfig) -> Result<()> {
    let ws = load_workspace(args)?;
    let event = trigger_event(&ws.env)?;
    let run_number = ws
        .env
        .get("GITHUB_RUN_NUMBER")
        .map(|value| parse_run_number(Some(value.as_str())))
        .transpose()?;

    config.section("Trigger");
    config.println(&format!("Event:           {}", event));
    config.println(&format!(
        "Builds matrix:   {}",
        yes_no(event.activates(&ws.config.main_branch))
    ));
    config.println(&format!(
        "Creates release: {}",
        yes_no(event.creates_release(&ws.config.main_branch))
    ));

    config.section("Matrix");
    let python = match locate_python(&SystemRunner, &ws.config) {
        Ok(python) => python,
        Err(e) => {
            config.warning_println(&e.to_string());
            ws.config.python.clone().unwrap_or_else(|| "python3".to_string())
        }
    };
    config.println(&format!("Interpreter: {}", python));
    for job in ws.config.matrix.jobs() {
        config.println(&format!(
            "{} ({}): {} -> artifact {}",
            job.platform.display_name(),
            job.platform.runner_label(),
            job.executable_name,
            job.artifact_name
        ));

        let plan = BuildPlan::new(job, &ws.config, &ws.project_dir, &python);
        for command in &plan.setup {
            config.indent(&command.display());
        }
        config.indent(&plan.package.display());
        config.verbose_println(&format!("Expects {}", plan.expected_output.display()));
    }

    config.section("Release");
    match run_number {
        Some(run_number) => {
            let spec = ReleaseSpec::for_run(run_number, &ws.config, &ws.project_dir)?;
            config.println(&format!("Tag:   {}", spec.tag));
            config.println(&format!("Title: {}", spec.title));
            if config.is_verbose() {
                config.println("Body:");
                config.indent(&spec.body);
            }
        }
        None => config.println("Tag:   v<run number> (pass --run-number to preview)"),
    }
    config.println("Attachments:");
    for pattern in &ws.config.attachments {
        config.indent(pattern);
    }
    if ws.config.strict_attachments {
        config.indent("(unmatched patterns fail the release)");
    }
    config.println(&format!("Artifact store: {}", ws.store.root().display()));

    Ok(())
}
