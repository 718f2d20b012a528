//! Comprehensive error types for pipeline operations.
//!
//! This module defines all error types with actionable error messages and recovery suggestions.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, ReleaseError>;

/// Main error type for all pipeline operations
#[derive(Error, Debug)]
pub enum ReleaseError {
    /// Environment provisioning and packaging errors
    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    /// Distribution package errors
    #[error("Package error: {0}")]
    Package(#[from] PackageError),

    /// Artifact store errors
    #[error("Artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    /// Release creation errors
    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    /// Job record errors
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// CLI argument errors
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Template rendering errors
    #[error("Template error: {0}")]
    Template(#[from] handlebars::RenderError),

    /// Archive errors
    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL construction errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Generic errors from anyhow
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Environment provisioning and packaging errors
#[derive(Error, Debug)]
pub enum BuildError {
    /// Python interpreter could not be located
    #[error("Python interpreter '{program}' not found in PATH")]
    InterpreterNotFound {
        /// Program that was searched for
        program: String,
    },

    /// A setup or install command exited non-zero
    #[error("Setup step '{step}' failed with exit code {code:?}: {stderr}")]
    SetupFailed {
        /// Step label
        step: String,
        /// Exit code, if the process exited normally
        code: Option<i32>,
        /// Captured stderr
        stderr: String,
    },

    /// The packaging tool exited non-zero
    #[error("Packaging failed for {platform} with exit code {code:?}: {stderr}")]
    PackagingFailed {
        /// Platform being packaged
        platform: String,
        /// Exit code, if the process exited normally
        code: Option<i32>,
        /// Captured stderr
        stderr: String,
    },

    /// The packaging tool succeeded but the expected output is absent
    #[error("Executable {name} not found at {path}")]
    ExecutableNotFound {
        /// Declared executable name
        name: String,
        /// Path that was checked
        path: PathBuf,
    },

    /// The entry script is missing from the project
    #[error("Entry script not found at {path}")]
    EntryScriptMissing {
        /// Path that was checked
        path: PathBuf,
    },

    /// A command could not be spawned at all
    #[error("Failed to run '{command}': {reason}")]
    SpawnFailed {
        /// Command label
        command: String,
        /// Reason for the error
        reason: String,
    },

    /// The host cannot build the requested platform
    #[error("Platform '{platform}' cannot be built on a {host} host")]
    UnsupportedHost {
        /// Requested platform
        platform: String,
        /// Host operating system
        host: String,
    },

    /// Build job was aborted after another job failed
    #[error("Job for {platform} cancelled after another matrix job failed")]
    Cancelled {
        /// Platform of the cancelled job
        platform: String,
    },
}

/// Distribution package errors
#[derive(Error, Debug)]
pub enum PackageError {
    /// Executable to package does not exist
    #[error("Executable {path} does not exist")]
    MissingExecutable {
        /// Path to the executable
        path: PathBuf,
    },

    /// Package directory holds an unexpected set of executables
    #[error("Package {dir} must contain exactly one executable named {expected}, found {found:?}")]
    InvalidContents {
        /// Package directory
        dir: PathBuf,
        /// Expected executable name
        expected: String,
        /// Executables found
        found: Vec<String>,
    },
}

/// Artifact store errors
#[derive(Error, Debug)]
pub enum ArtifactError {
    /// Artifact was already uploaded for this run
    #[error("Artifact '{name}' already exists for run {run_number}")]
    AlreadyExists {
        /// Artifact name
        name: String,
        /// Run number
        run_number: u64,
    },

    /// Artifact source directory is missing or empty
    #[error("Artifact source {path} is missing or empty")]
    EmptySource {
        /// Source directory
        path: PathBuf,
    },

    /// Artifact not present in the store
    #[error("Artifact '{name}' not found for run {run_number}")]
    NotFound {
        /// Artifact name
        name: String,
        /// Run number
        run_number: u64,
    },

    /// Manifest could not be read
    #[error("Artifact manifest {path} is corrupted: {reason}")]
    CorruptManifest {
        /// Manifest path
        path: PathBuf,
        /// Reason for the error
        reason: String,
    },
}

/// Release creation errors
#[derive(Error, Debug)]
pub enum PublishError {
    /// Not every matrix job succeeded for the run
    #[error("Release blocked: matrix jobs not successful for run {run_number}: {pending:?}")]
    JobsIncomplete {
        /// Run number
        run_number: u64,
        /// Platforms without a successful record
        pending: Vec<String>,
    },

    /// Release already exists for the tag
    #[error("Release '{tag}' already exists. Releases are immutable.")]
    TagExists {
        /// Tag name
        tag: String,
    },

    /// Attachment patterns matched nothing in strict mode
    #[error("Attachment patterns matched no files: {patterns:?}")]
    UnmatchedAttachments {
        /// Patterns without matches
        patterns: Vec<String>,
    },

    /// Invalid attachment pattern
    #[error("Invalid attachment pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// Pattern text
        pattern: String,
        /// Reason for the error
        reason: String,
    },

    /// No token available for the release host
    #[error("GitHub token not provided. Set GH_TOKEN or GITHUB_TOKEN environment variable")]
    MissingToken,

    /// Repository could not be determined
    #[error("GitHub repository not configured: {reason}")]
    MissingRepository {
        /// Reason for the error
        reason: String,
    },

    /// GitHub answered with an error status
    #[error("GitHub API {operation} failed with status {status}: {message}")]
    Api {
        /// Operation name
        operation: String,
        /// HTTP status code
        status: u16,
        /// Response body or message
        message: String,
    },

    /// Network error talking to GitHub
    #[error("Network error during {operation}: {reason}")]
    Network {
        /// Operation name
        operation: String,
        /// Reason for the error
        reason: String,
    },
}

/// Job record errors
#[derive(Error, Debug)]
pub enum StateError {
    /// Record file corrupted
    #[error("Job record {path} corrupted: {reason}")]
    Corrupted {
        /// Path to the record
        path: PathBuf,
        /// Reason for the error
        reason: String,
    },

    /// Failed to save record
    #[error("Failed to save job record: {reason}")]
    SaveFailed {
        /// Reason for the error
        reason: String,
    },
}

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid command line arguments
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },

    /// Missing required argument
    #[error("Missing required argument: {argument}")]
    MissingArgument {
        /// Argument name
        argument: String,
    },

    /// Invalid configuration file
    #[error("Invalid configuration {path}: {reason}")]
    InvalidConfig {
        /// Config path
        path: PathBuf,
        /// Reason for the error
        reason: String,
    },
}

impl ReleaseError {
    /// Get actionable recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            ReleaseError::Build(BuildError::InterpreterNotFound { program }) => vec![
                format!("Install Python 3.9 and make sure '{}' is on PATH", program),
                "Point to the interpreter explicitly with 'python' in pipeline.toml".to_string(),
            ],
            ReleaseError::Build(BuildError::ExecutableNotFound { name, .. }) => vec![
                format!("Check the PyInstaller log above for why {} was not produced", name),
                "Verify the entry script runs: python extract.py".to_string(),
                "Add missing modules to 'hidden_imports' in pipeline.toml".to_string(),
            ],
            ReleaseError::Build(BuildError::SetupFailed { .. }) => vec![
                "Check network access to the package index".to_string(),
                "Verify requirements.txt lists installable versions".to_string(),
            ],
            ReleaseError::Build(BuildError::UnsupportedHost { platform, .. }) => vec![
                format!("Run the {} build on a {} runner", platform, platform),
                "Upload artifacts to a shared --artifact-store, then run 'release'".to_string(),
            ],
            ReleaseError::Publish(PublishError::MissingToken) => vec![
                "Export GITHUB_TOKEN with 'contents: write' permission".to_string(),
                "Or export GH_TOKEN from 'gh auth token'".to_string(),
            ],
            ReleaseError::Publish(PublishError::JobsIncomplete { pending, .. }) => vec![
                format!("Build the missing platforms first: {}", pending.join(", ")),
                "Use the same --run-number for every build and the release".to_string(),
            ],
            ReleaseError::Publish(PublishError::TagExists { tag }) => vec![
                format!("Delete release {} on GitHub or use a new run number", tag),
            ],
            ReleaseError::Publish(PublishError::UnmatchedAttachments { .. }) => vec![
                "Check 'attachments' globs in pipeline.toml against downloaded files".to_string(),
                "Disable 'strict_attachments' to attach matching files only".to_string(),
            ],
            _ => vec!["Check the error message above for specific details".to_string()],
        }
    }

    /// Check if this error is recoverable by retrying the operation
    pub fn is_recoverable(&self) -> bool {
        match self {
            ReleaseError::Publish(PublishError::Network { .. }) => true,
            ReleaseError::Publish(PublishError::Api { status, .. }) => {
                *status == 429 || *status >= 500
            }
            ReleaseError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}
