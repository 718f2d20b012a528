//! Shared helper functions for command execution.

use crate::artifacts::ArtifactStore;
use crate::cli::{Args, RuntimeConfig};
use crate::config::{EnvConfig, PipelineConfig};
use crate::error::{BuildError, ReleaseError, Result};
use crate::matrix::{BuildMatrix, Platform};
use crate::pipeline::JobReport;
use crate::release::{
    GitHubReleaseConfig, GitHubReleaseManager, ReleaseOutcome, parse_github_repo,
    resolve_repository,
};
use crate::trigger::{RunContext, TriggerEvent, parse_run_number};
use std::path::{Path, PathBuf};

/// Everything a command needs about the project it runs on
pub(super) struct Workspace {
    pub project_dir: PathBuf,
    pub config: PipelineConfig,
    pub store: ArtifactStore,
    /// Process environment with trigger flags applied
    pub env: EnvConfig,
}

pub(super) fn load_workspace(args: &Args) -> Result<Workspace> {
    let project_dir = args.project_dir.canonicalize()?;
    let config = PipelineConfig::load(args.config.as_deref(), &project_dir)?;
    Ok(Workspace {
        store: ArtifactStore::new(args.artifact_store()),
        env: args.trigger.overlay(&EnvConfig::from_process()),
        config,
        project_dir,
    })
}

/// Trigger from the environment; a local invocation counts as a manual dispatch
pub(super) fn trigger_event(env: &EnvConfig) -> Result<TriggerEvent> {
    Ok(TriggerEvent::from_env(env)?.unwrap_or_else(|| TriggerEvent::WorkflowDispatch {
        branch: env.get("GITHUB_REF_NAME"),
    }))
}

pub(super) fn run_context(env: &EnvConfig) -> Result<RunContext> {
    let event = trigger_event(env)?;
    let run_number = parse_run_number(env.get("GITHUB_RUN_NUMBER").as_deref())?;
    let context = RunContext::new(event, run_number);
    Ok(match env.get("GITHUB_REPOSITORY") {
        Some(repo) => context.with_repository(repo),
        None => context,
    })
}

/// Matrix jobs to build on this host.
///
/// Without an explicit selection the host's own platform is built. Every
/// selected platform must be native to the host.
pub(super) fn host_matrix(config: &PipelineConfig, requested: &[Platform]) -> Result<BuildMatrix> {
    let requested: Vec<Platform> = if requested.is_empty() {
        let host = Platform::host().ok_or_else(|| BuildError::UnsupportedHost {
            platform: config
                .matrix
                .platforms()
                .iter()
                .map(|p| p.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            host: std::env::consts::OS.to_string(),
        })?;
        vec![host]
    } else {
        requested.to_vec()
    };

    for platform in &requested {
        if !platform.is_host() {
            return Err(BuildError::UnsupportedHost {
                platform: platform.to_string(),
                host: std::env::consts::OS.to_string(),
            }
            .into());
        }
    }

    config.matrix.select(&requested)
}

pub(super) async fn github_publisher(
    context: &RunContext,
    project_dir: &Path,
    env: &EnvConfig,
) -> Result<GitHubReleaseManager> {
    let (owner, repo) = match &context.repository {
        Some(repo) => parse_github_repo(repo)?,
        None => resolve_repository(None, project_dir).await?,
    };
    GitHubReleaseManager::new(GitHubReleaseConfig::from_env(owner, repo, env)?)
}

pub(super) fn print_job_reports(config: &RuntimeConfig, reports: &[JobReport]) {
    for report in reports {
        config.success_println(&format!(
            "{}: {} packaged as {}",
            report.platform.display_name(),
            report.package.executable.display(),
            report.manifest.name
        ));
        config.indent(&format!("sha256 {}", report.package.checksum));
        config.verbose_println(&format!(
            "Artifact {} bytes, {} file(s), kept until {}",
            report.manifest.size,
            report.manifest.files.len(),
            report.manifest.expires_at().format("%Y-%m-%d")
        ));
    }
}

pub(super) fn print_release_outcome(config: &RuntimeConfig, outcome: &ReleaseOutcome) {
    match outcome {
        ReleaseOutcome::Skipped { reason } => {
            config.info_println(&format!("No release: {}", reason));
        }
        ReleaseOutcome::Created(report) => {
            config.success_println(&format!("Published {} ({})", report.title, report.html_url));
            for asset in &report.attached {
                config.indent(&format!("{} ({} bytes)", asset.name, asset.size));
            }
            for pattern in &report.unmatched_patterns {
                config.warning_println(&format!(
                    "Attachment pattern '{}' matched none of the downloaded files",
                    pattern
                ));
            }
        }
    }
}

pub(super) fn print_error(config: &RuntimeConfig, command: &str, e: &ReleaseError) {
    config.error_println(&format!("Command '{}' failed: {}", command, e));

    let suggestions = e.recovery_suggestions();
    if !suggestions.is_empty() {
        config.println("\n💡 Recovery suggestions:");
        for suggestion in suggestions {
            config.println(&format!("  • {}", suggestion));
        }
    }
}
