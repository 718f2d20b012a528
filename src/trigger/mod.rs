//! Trigger detection: which events run the pipeline and which release.

use crate::config::EnvConfig;
use crate::error::{CliError, ReleaseError, Result};
use std::fmt;

/// Event that started a pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerEvent {
    /// Commit pushed to a branch
    Push {
        /// Branch that was pushed
        branch: String,
    },
    /// Pull request opened or updated
    PullRequest {
        /// Branch the pull request targets
        base_branch: String,
    },
    /// Manual invocation
    WorkflowDispatch {
        /// Branch the run was dispatched on
        branch: Option<String>,
    },
    /// Any event the pipeline does not react to
    Other {
        /// Raw event name
        name: String,
    },
}

impl TriggerEvent {
    /// Build an event from a name and branch, as given on the command line
    pub fn from_parts(event: &str, branch: Option<&str>) -> Result<Self> {
        let branch = branch.map(strip_ref);
        match event {
            "push" => Ok(TriggerEvent::Push {
                branch: branch.ok_or_else(|| missing_branch(event))?,
            }),
            "pull_request" | "pull_request_target" => Ok(TriggerEvent::PullRequest {
                base_branch: branch.ok_or_else(|| missing_branch(event))?,
            }),
            "workflow_dispatch" | "manual" => Ok(TriggerEvent::WorkflowDispatch { branch }),
            other => Ok(TriggerEvent::Other {
                name: other.to_string(),
            }),
        }
    }

    /// Build an event from the CI environment.
    ///
    /// Returns `None` outside CI (`GITHUB_EVENT_NAME` unset).
    pub fn from_env(env: &EnvConfig) -> Result<Option<Self>> {
        let Some(event) = env.get("GITHUB_EVENT_NAME") else {
            return Ok(None);
        };

        let branch = match event.as_str() {
            "pull_request" | "pull_request_target" => env.get("GITHUB_BASE_REF"),
            _ => env.get("GITHUB_REF_NAME").or_else(|| env.get("GITHUB_REF")),
        };

        Self::from_parts(&event, branch.as_deref()).map(Some)
    }

    /// Whether this event runs the build matrix at all
    pub fn activates(&self, main_branch: &str) -> bool {
        match self {
            TriggerEvent::Push { branch } => branch == main_branch,
            TriggerEvent::PullRequest { base_branch } => base_branch == main_branch,
            TriggerEvent::WorkflowDispatch { .. } => true,
            TriggerEvent::Other { .. } => false,
        }
    }

    /// Whether this event publishes a release: a push to the main branch only
    pub fn creates_release(&self, main_branch: &str) -> bool {
        matches!(self, TriggerEvent::Push { branch } if branch == main_branch)
    }

    /// Event name as CI reports it
    pub fn name(&self) -> &str {
        match self {
            TriggerEvent::Push { .. } => "push",
            TriggerEvent::PullRequest { .. } => "pull_request",
            TriggerEvent::WorkflowDispatch { .. } => "workflow_dispatch",
            TriggerEvent::Other { name } => name,
        }
    }
}

impl fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerEvent::Push { branch } => write!(f, "push to {}", branch),
            TriggerEvent::PullRequest { base_branch } => {
                write!(f, "pull request targeting {}", base_branch)
            }
            TriggerEvent::WorkflowDispatch { branch: Some(b) } => {
                write!(f, "manual dispatch on {}", b)
            }
            TriggerEvent::WorkflowDispatch { branch: None } => f.write_str("manual dispatch"),
            TriggerEvent::Other { name } => write!(f, "{} event", name),
        }
    }
}

/// Everything that identifies one pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    /// Triggering event
    pub event: TriggerEvent,
    /// Monotonic run number; the release tag derives from it
    pub run_number: u64,
    /// `owner/repo`, when known
    pub repository: Option<String>,
}

impl RunContext {
    /// Create a run context
    pub fn new(event: TriggerEvent, run_number: u64) -> Self {
        Self {
            event,
            run_number,
            repository: None,
        }
    }

    /// Attach a repository
    pub fn with_repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = Some(repository.into());
        self
    }

    /// Build a run context from the CI environment
    pub fn from_env(env: &EnvConfig) -> Result<Option<Self>> {
        let Some(event) = TriggerEvent::from_env(env)? else {
            return Ok(None);
        };
        let run_number = parse_run_number(env.get("GITHUB_RUN_NUMBER").as_deref())?;
        Ok(Some(Self {
            event,
            run_number,
            repository: env.get("GITHUB_REPOSITORY"),
        }))
    }
}

/// Parse a run number, which must be a positive integer
pub fn parse_run_number(value: Option<&str>) -> Result<u64> {
    let value = value.ok_or_else(|| {
        ReleaseError::Cli(CliError::MissingArgument {
            argument: "--run-number (or GITHUB_RUN_NUMBER)".to_string(),
        })
    })?;
    match value.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ReleaseError::Cli(CliError::InvalidArguments {
            reason: format!("Run number must be a positive integer, got '{}'", value),
        })),
    }
}

fn strip_ref(reference: &str) -> String {
    reference
        .strip_prefix("refs/heads/")
        .unwrap_or(reference)
        .to_string()
}

fn missing_branch(event: &str) -> ReleaseError {
    ReleaseError::Cli(CliError::MissingArgument {
        argument: format!("--branch (required for {} events)", event),
    })
}
