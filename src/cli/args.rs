//! Command line argument parsing and validation.
//!
//! Trigger flags mirror the CI environment variables and override them, so
//! a run can be reproduced locally with the same inputs CI saw.

use crate::config::EnvConfig;
use crate::matrix::Platform;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Build, package and release the PDF to table converter
#[derive(Parser, Debug)]
#[command(
    name = "pdf_table_release",
    version,
    about = "Build, package and release the PDF to table converter",
    long_about = "Packages the PDF to table converter into standalone executables per platform,
publishes them as run artifacts and creates a GitHub release on pushes to main.

Usage:
  pdf_table_release plan
  pdf_table_release build --platform linux --run-number 42
  pdf_table_release release --event push --branch main --run-number 42
  pdf_table_release run"
)]
pub struct Args {
    /// Command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Project containing the entry script
    #[arg(long, global = true, value_name = "DIR", default_value = ".")]
    pub project_dir: PathBuf,

    /// Configuration file (default: <project>/pipeline.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Artifact store shared by matrix jobs and the release job
    #[arg(long, global = true, value_name = "DIR", env = "PIPELINE_ARTIFACT_STORE")]
    pub artifact_store: Option<PathBuf>,

    /// Show detailed output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only show errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Trigger overrides
    #[command(flatten)]
    pub trigger: TriggerArgs,
}

/// Overrides for the CI trigger environment
#[derive(clap::Args, Debug, Clone, Default)]
pub struct TriggerArgs {
    /// Triggering event: push, pull_request, workflow_dispatch (default: GITHUB_EVENT_NAME)
    #[arg(long, global = true, value_name = "EVENT")]
    pub event: Option<String>,

    /// Pushed branch, or the base branch of a pull request
    #[arg(long, global = true, value_name = "BRANCH")]
    pub branch: Option<String>,

    /// Run number the release tag derives from (default: GITHUB_RUN_NUMBER)
    #[arg(long, global = true, value_name = "N")]
    pub run_number: Option<String>,

    /// GitHub repository as owner/repo (default: GITHUB_REPOSITORY, then origin)
    #[arg(long, global = true, value_name = "OWNER/REPO")]
    pub repo: Option<String>,
}

impl TriggerArgs {
    /// Environment with the flags applied on top
    pub fn overlay(&self, env: &EnvConfig) -> EnvConfig {
        let mut env = env.clone();
        if let Some(event) = &self.event {
            env.set("GITHUB_EVENT_NAME", event);
        }
        if let Some(branch) = &self.branch {
            env.set("GITHUB_REF_NAME", branch);
            env.set("GITHUB_BASE_REF", branch);
        }
        if let Some(run_number) = &self.run_number {
            env.set("GITHUB_RUN_NUMBER", run_number);
        }
        if let Some(repo) = &self.repo {
            env.set("GITHUB_REPOSITORY", repo);
        }
        env
    }
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Show the matrix, every command and the release without running anything
    Plan,

    /// Build, package and upload matrix jobs on this host
    Build {
        /// Platforms to build (default: this host's platform)
        #[arg(long = "platform", value_name = "PLATFORM")]
        platforms: Vec<Platform>,
    },

    /// Create the release for a run from its uploaded artifacts
    Release,

    /// Run the matrix jobs this host can build, then the release job
    Run {
        /// Platforms to build (default: this host's platform)
        #[arg(long = "platform", value_name = "PLATFORM")]
        platforms: Vec<Platform>,
    },

    /// Remove artifacts past their retention
    Prune,
}

impl Command {
    /// Command name for messages
    pub fn name(&self) -> &'static str {
        match self {
            Command::Plan => "plan",
            Command::Build { .. } => "build",
            Command::Release => "release",
            Command::Run { .. } => "run",
            Command::Prune => "prune",
        }
    }
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> Result<(), String> {
        if !self.project_dir.is_dir() {
            return Err(format!(
                "Project directory {} does not exist",
                self.project_dir.display()
            ));
        }
        if let Some(repo) = &self.trigger.repo
            && repo.split('/').filter(|p| !p.is_empty()).count() != 2
        {
            return Err(format!("--repo must be owner/repo, got '{}'", repo));
        }
        Ok(())
    }

    /// Artifact store location
    pub fn artifact_store(&self) -> PathBuf {
        self.artifact_store
            .clone()
            .unwrap_or_else(|| self.project_dir.join(".pipeline").join("artifacts"))
    }
}

/// Configuration derived from command line arguments
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Output manager for colored terminal output
    output: super::OutputManager,
}

impl RuntimeConfig {
    /// Create runtime configuration
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self {
            output: super::OutputManager::new(verbose, quiet),
        }
    }

    /// Get a reference to the output manager
    pub fn output(&self) -> &super::OutputManager {
        &self.output
    }

    /// Print message
    pub fn println(&self, message: &str) {
        let _ = self.output.println(message);
    }

    /// Print info message
    pub fn info_println(&self, message: &str) {
        let _ = self.output.info(message);
    }

    /// Print progress message for a starting step
    pub fn progress_println(&self, message: &str) {
        let _ = self.output.progress(message);
    }

    /// Print message only in verbose mode
    pub fn verbose_println(&self, message: &str) {
        let _ = self.output.verbose(message);
    }

    /// Print error message (always shown)
    pub fn error_println(&self, message: &str) {
        self.output.error(message);
    }

    /// Print warning message
    pub fn warning_println(&self, message: &str) {
        let _ = self.output.warn(message);
    }

    /// Print success message
    pub fn success_println(&self, message: &str) {
        let _ = self.output.success(message);
    }

    /// Print section header
    pub fn section(&self, title: &str) {
        let _ = self.output.section(title);
    }

    /// Print indented text
    pub fn indent(&self, message: &str) {
        let _ = self.output.indent(message);
    }

    /// Check if verbose output is enabled
    pub fn is_verbose(&self) -> bool {
        self.output.is_verbose()
    }

    /// Check if quiet mode is enabled
    pub fn is_quiet(&self) -> bool {
        self.output.is_quiet()
    }
}

impl From<&Args> for RuntimeConfig {
    fn from(args: &Args) -> Self {
        Self::new(args.verbose, args.quiet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_platforms_and_trigger_flags() {
        let args = Args::try_parse_from([
            "pdf_table_release",
            "build",
            "--platform",
            "linux",
            "--event",
            "push",
            "--branch",
            "main",
            "--run-number",
            "42",
        ])
        .unwrap();

        match &args.command {
            Command::Build { platforms } => assert_eq!(platforms, &vec![Platform::Linux]),
            other => panic!("unexpected command {:?}", other),
        }
        let env = args.trigger.overlay(&EnvConfig::default());
        assert_eq!(env.get("GITHUB_EVENT_NAME").as_deref(), Some("push"));
        assert_eq!(env.get("GITHUB_RUN_NUMBER").as_deref(), Some("42"));
    }

    #[test]
    fn flags_override_ci_environment() {
        let ci = EnvConfig::from_pairs([("GITHUB_EVENT_NAME", "pull_request"), ("GITHUB_BASE_REF", "main")]);
        let trigger = TriggerArgs {
            event: Some("push".to_string()),
            ..Default::default()
        };
        let env = trigger.overlay(&ci);
        assert_eq!(env.get("GITHUB_EVENT_NAME").as_deref(), Some("push"));
        assert_eq!(env.get("GITHUB_BASE_REF").as_deref(), Some("main"));
    }

    #[test]
    fn rejects_unknown_platform() {
        assert!(Args::try_parse_from(["pdf_table_release", "build", "--platform", "macos"]).is_err());
    }

    #[test]
    fn verbose_and_quiet_conflict() {
        assert!(Args::try_parse_from(["pdf_table_release", "plan", "-v", "-q"]).is_err());
    }
}
