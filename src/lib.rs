//! # pdf_table_release
//!
//! Build and release pipeline for the PDF to table converter, a Python
//! desktop application shipped as standalone executables.
//!
//! A run goes through these stages:
//!
//! - **Trigger**: pushes and pull requests targeting `main` run the matrix;
//!   only a push to `main` publishes a release
//! - **Matrix**: one job per platform (Windows, Linux), run in parallel
//! - **Build**: provision Python, install dependencies, package with
//!   PyInstaller into a single-file executable
//! - **Package**: executable, README and generated usage instructions
//! - **Artifacts**: per-run archive store with retention, the only hand-off
//!   between matrix jobs and the release job
//! - **Release**: once every job succeeded, publish `v<run_number>` on
//!   GitHub with the executables attached
//!
//! ## Usage
//!
//! ```bash
//! pdf_table_release plan                      # show every command and the release
//! pdf_table_release build --platform linux    # one matrix job on this host
//! pdf_table_release release                   # release job for GITHUB_RUN_NUMBER
//! pdf_table_release run                       # everything this host can do
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod artifacts;
pub mod build;
pub mod cli;
pub mod config;
pub mod error;
pub mod matrix;
pub mod package;
pub mod pipeline;
pub mod release;
pub mod state;
pub mod trigger;
pub mod utils;

pub use artifacts::{ArtifactManifest, ArtifactStore, PruneReport};
pub use build::{CommandRunner, CommandSpec, SystemRunner};
pub use config::{EnvConfig, PipelineConfig, RetryConfig};
pub use error::{ReleaseError, Result};
pub use matrix::{BuildJob, BuildMatrix, Platform};
pub use package::{DistributionPackage, Packager};
pub use pipeline::{JobReport, Pipeline, PipelineReport};
pub use release::{GitHubReleaseManager, ReleaseCreator, ReleaseOutcome, ReleasePublisher};
pub use state::{JobRecord, JobRecords, JobStatus};
pub use trigger::{RunContext, TriggerEvent};
