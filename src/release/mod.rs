//! Release creation: gate on the run, gather artifacts, publish.
//!
//! The GitHub specifics live behind [`ReleasePublisher`] so the gating and
//! attachment logic can be exercised without network access.

mod assets;
mod creator;
mod github;
mod notes;
mod retry;

pub use assets::{AttachmentSet, resolve_attachments};
pub use creator::{ReleaseCreator, ReleaseOutcome, ReleaseReport};
pub use github::{
    GitHubReleaseConfig, GitHubReleaseManager, detect_origin_url, parse_github_repo,
    parse_github_url, resolve_repository,
};
pub use notes::{release_tag, release_title, render_release_body};
pub use retry::retry_with_backoff;

use crate::config::PipelineConfig;
use crate::error::Result;
use std::future::Future;
use std::path::{Path, PathBuf};

/// A release that exists on the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedRelease {
    /// Host release id
    pub id: u64,
    /// Tag name
    pub tag: String,
    /// Human-facing URL
    pub html_url: String,
    /// Asset upload URL template
    pub upload_url: String,
}

/// An asset attached to a release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedAsset {
    /// File name on the release
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// Public download URL
    pub download_url: String,
}

/// Everything needed to publish one release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseSpec {
    /// Tag, `v<run_number>`
    pub tag: String,
    /// Title, `PDF Processor v<run_number>`
    pub title: String,
    /// Markdown body
    pub body: String,
    /// Files to upload
    pub attachments: Vec<PathBuf>,
    /// Ask the host to append generated notes
    pub generate_notes: bool,
}

impl ReleaseSpec {
    /// Tag, title and body for a run; attachments are filled in later
    pub fn for_run(run_number: u64, config: &PipelineConfig, project_dir: &Path) -> Result<Self> {
        let template = match &config.release_template {
            Some(path) => Some(std::fs::read_to_string(config.resolve(project_dir, path))?),
            None => None,
        };

        Ok(Self {
            tag: release_tag(run_number),
            title: release_title(run_number),
            body: render_release_body(run_number, &config.matrix, template.as_deref())?,
            attachments: Vec::new(),
            generate_notes: config.generate_release_notes,
        })
    }
}

/// Release host operations
pub trait ReleasePublisher: Send + Sync {
    /// Look up the release for a tag
    fn find_release(
        &self,
        tag: &str,
    ) -> impl Future<Output = Result<Option<PublishedRelease>>> + Send;

    /// Create a published, non-draft, non-prerelease release
    fn create_release(
        &self,
        spec: &ReleaseSpec,
    ) -> impl Future<Output = Result<PublishedRelease>> + Send;

    /// Upload one file as a release asset named after the file
    fn upload_asset(
        &self,
        release: &PublishedRelease,
        path: &Path,
    ) -> impl Future<Output = Result<UploadedAsset>> + Send;
}
