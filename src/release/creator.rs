//! Release job: join gate, artifact download, publication.

use super::{
    PublishedRelease, ReleasePublisher, ReleaseSpec, UploadedAsset, resolve_attachments,
    retry_with_backoff,
};
use crate::artifacts::ArtifactStore;
use crate::config::{PipelineConfig, RetryConfig};
use crate::error::{PublishError, Result};
use crate::state::JobRecords;
use crate::trigger::RunContext;
use crate::utils::{blocking, fs};
use std::path::{Path, PathBuf};

/// Result of a release job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The trigger does not publish releases
    Skipped {
        /// Why nothing was published
        reason: String,
    },
    /// A release was published
    Created(ReleaseReport),
}

/// What a published release contains
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseReport {
    /// Release tag
    pub tag: String,
    /// Release title
    pub title: String,
    /// Release page
    pub html_url: String,
    /// Uploaded assets, in upload order
    pub attached: Vec<UploadedAsset>,
    /// Attachment patterns that matched nothing
    pub unmatched_patterns: Vec<String>,
    /// Every downloaded file, relative to the release workspace
    pub downloaded_files: Vec<PathBuf>,
}

/// Publishes the release for a run once every matrix job succeeded
pub struct ReleaseCreator<'a, P> {
    publisher: &'a P,
    config: &'a PipelineConfig,
    project_dir: &'a Path,
    store: &'a ArtifactStore,
    retry: RetryConfig,
}

impl<'a, P: ReleasePublisher> ReleaseCreator<'a, P> {
    /// Create a release creator
    pub fn new(
        publisher: &'a P,
        config: &'a PipelineConfig,
        project_dir: &'a Path,
        store: &'a ArtifactStore,
    ) -> Self {
        Self {
            publisher,
            config,
            project_dir,
            store,
            retry: RetryConfig::default(),
        }
    }

    /// Override retry limits for host calls
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Release workspace; artifacts land in its `dist` directory
    pub fn workspace(&self) -> Result<PathBuf> {
        self.config.scratch_dir(self.project_dir, &self.config.release_dir)
    }

    /// Run the release job for a run
    pub async fn run(&self, context: &RunContext) -> Result<ReleaseOutcome> {
        if !context.event.creates_release(&self.config.main_branch) {
            let reason = format!(
                "{} does not publish releases, only a push to {} does",
                context.event, self.config.main_branch
            );
            log::info!("Release skipped: {}", reason);
            return Ok(ReleaseOutcome::Skipped { reason });
        }

        let run_number = context.run_number;
        let records = JobRecords::new(self.store.jobs_dir(run_number));
        let pending = records.unsuccessful(&self.config.matrix).await?;
        if !pending.is_empty() {
            return Err(PublishError::JobsIncomplete {
                run_number,
                pending: pending.iter().map(|p| p.to_string()).collect(),
            }
            .into());
        }

        let workspace = self.workspace()?;
        let downloaded_files = self.download(run_number, &workspace).await?;

        let attachments = resolve_attachments(&workspace, &self.config.attachments)?;
        for pattern in &attachments.unmatched {
            log::warn!("Attachment pattern '{}' matched no files", pattern);
        }
        if self.config.strict_attachments && !attachments.unmatched.is_empty() {
            return Err(PublishError::UnmatchedAttachments {
                patterns: attachments.unmatched,
            }
            .into());
        }

        let mut spec = ReleaseSpec::for_run(run_number, self.config, self.project_dir)?;
        spec.attachments = attachments.files;

        let existing = retry_with_backoff(
            || self.publisher.find_release(&spec.tag),
            self.retry.github_api,
            "find_release",
        )
        .await?;
        if existing.is_some() {
            return Err(PublishError::TagExists { tag: spec.tag }.into());
        }

        let release = retry_with_backoff(
            || self.publisher.create_release(&spec),
            self.retry.github_api,
            "create_release",
        )
        .await?;
        let attached = self.upload_all(&release, &spec.attachments).await?;

        log::info!(
            "Published {} with {} asset(s): {}",
            release.tag,
            attached.len(),
            release.html_url
        );
        Ok(ReleaseOutcome::Created(ReleaseReport {
            tag: spec.tag,
            title: spec.title,
            html_url: release.html_url,
            attached,
            unmatched_patterns: attachments.unmatched,
            downloaded_files,
        }))
    }

    /// Fresh workspace holding every artifact of the run under `dist/`
    async fn download(&self, run_number: u64, workspace: &Path) -> Result<Vec<PathBuf>> {
        for job in self.config.matrix.jobs() {
            self.store.get(run_number, &job.artifact_name)?;
        }

        fs::create_dir_all(workspace, true).await?;
        let dist = workspace.join("dist");
        fs::create_dir_all(&dist, false).await?;

        let store = self.store.clone();
        let target = dist.clone();
        blocking(move || store.download_all(run_number, &target)).await?;

        let root = workspace.to_path_buf();
        let files = blocking(move || fs::list_files(&dist)).await?;
        let relative: Vec<PathBuf> = files
            .iter()
            .map(|f| f.strip_prefix(&root).unwrap_or(f.as_path()).to_path_buf())
            .collect();

        log::info!("Downloaded {} file(s) for run {}:", relative.len(), run_number);
        for file in &relative {
            log::info!("  {}", file.display());
        }
        Ok(relative)
    }

    async fn upload_all(
        &self,
        release: &PublishedRelease,
        files: &[PathBuf],
    ) -> Result<Vec<UploadedAsset>> {
        let mut attached = Vec::with_capacity(files.len());
        for path in files {
            let asset = retry_with_backoff(
                || self.publisher.upload_asset(release, path),
                self.retry.file_uploads,
                "upload_asset",
            )
            .await?;
            log::info!("Attached {} ({} bytes)", asset.name, asset.size);
            attached.push(asset);
        }
        Ok(attached)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReleaseError;
    use crate::state::JobRecord;
    use crate::trigger::TriggerEvent;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingPublisher {
        created: Mutex<Vec<ReleaseSpec>>,
        existing: bool,
    }

    impl ReleasePublisher for RecordingPublisher {
        async fn find_release(&self, tag: &str) -> Result<Option<PublishedRelease>> {
            Ok(self.existing.then(|| PublishedRelease {
                id: 1,
                tag: tag.to_string(),
                html_url: String::new(),
                upload_url: String::new(),
            }))
        }

        async fn create_release(&self, spec: &ReleaseSpec) -> Result<PublishedRelease> {
            self.created.lock().unwrap().push(spec.clone());
            Ok(PublishedRelease {
                id: 2,
                tag: spec.tag.clone(),
                html_url: format!("https://example.test/releases/{}", spec.tag),
                upload_url: String::new(),
            })
        }

        async fn upload_asset(&self, _: &PublishedRelease, path: &Path) -> Result<UploadedAsset> {
            Ok(UploadedAsset {
                name: path.file_name().unwrap().to_string_lossy().into_owned(),
                size: std::fs::metadata(path)?.len(),
                download_url: String::new(),
            })
        }
    }

    fn push(run_number: u64) -> RunContext {
        RunContext::new(
            TriggerEvent::Push {
                branch: "main".to_string(),
            },
            run_number,
        )
    }

    /// Store with a succeeded record and uploaded package for every job
    async fn populated(dir: &Path, run_number: u64) -> ArtifactStore {
        let store = ArtifactStore::new(dir.join("store"));
        let records = JobRecords::new(store.jobs_dir(run_number));
        for job in PipelineConfig::default().matrix.jobs() {
            let package = dir.join("pkg").join(&job.artifact_name);
            std::fs::create_dir_all(&package).unwrap();
            std::fs::write(package.join(&job.executable_name), b"bin").unwrap();
            store
                .upload(run_number, &job.artifact_name, &package, 30, chrono::Utc::now())
                .unwrap();

            let mut record = JobRecord::start(run_number, job);
            record.succeed("00".to_string());
            records.save(&record).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn pull_requests_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("store"));
        let config = PipelineConfig::default();
        let publisher = RecordingPublisher::default();
        let creator = ReleaseCreator::new(&publisher, &config, dir.path(), &store);

        let context = RunContext::new(
            TriggerEvent::PullRequest {
                base_branch: "main".to_string(),
            },
            3,
        );
        let outcome = creator.run(&context).await.unwrap();
        assert!(matches!(outcome, ReleaseOutcome::Skipped { .. }));
        assert!(publisher.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_records_block_the_release() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("store"));
        let config = PipelineConfig::default();
        let publisher = RecordingPublisher::default();
        let creator = ReleaseCreator::new(&publisher, &config, dir.path(), &store);

        let err = creator.run(&push(5)).await.unwrap_err();
        match err {
            ReleaseError::Publish(PublishError::JobsIncomplete { pending, .. }) => {
                assert_eq!(pending, vec!["windows", "linux"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn publishes_both_executables() {
        let dir = tempfile::tempdir().unwrap();
        let store = populated(dir.path(), 42).await;
        let config = PipelineConfig::default();
        let publisher = RecordingPublisher::default();
        let creator = ReleaseCreator::new(&publisher, &config, dir.path(), &store)
            .with_retry(RetryConfig::none());

        let ReleaseOutcome::Created(report) = creator.run(&push(42)).await.unwrap() else {
            panic!("release was skipped");
        };
        assert_eq!(report.tag, "v42");
        assert_eq!(report.title, "PDF Processor v42");
        let names: Vec<_> = report.attached.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["extract_windows.exe", "extract_linux"]);
        assert!(report.unmatched_patterns.is_empty());
        assert!(
            report
                .downloaded_files
                .contains(&PathBuf::from("dist/pdf_to_table_linux/extract_linux"))
        );

        let created = publisher.created.lock().unwrap();
        assert!(created[0].generate_notes);
    }

    #[tokio::test]
    async fn existing_tag_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let store = populated(dir.path(), 8).await;
        let config = PipelineConfig::default();
        let publisher = RecordingPublisher {
            existing: true,
            ..Default::default()
        };
        let creator = ReleaseCreator::new(&publisher, &config, dir.path(), &store);

        let err = creator.run(&push(8)).await.unwrap_err();
        assert!(matches!(err, ReleaseError::Publish(PublishError::TagExists { .. })));
        assert!(publisher.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn strict_mode_rejects_unmatched_patterns() {
        let dir = tempfile::tempdir().unwrap();
        let store = populated(dir.path(), 9).await;
        let config = PipelineConfig {
            attachments: vec![
                "dist/**/extract_windows.exe".to_string(),
                "dist/**/extract_linu".to_string(),
            ],
            strict_attachments: true,
            ..Default::default()
        };
        let publisher = RecordingPublisher::default();
        let creator = ReleaseCreator::new(&publisher, &config, dir.path(), &store);

        let err = creator.run(&push(9)).await.unwrap_err();
        assert!(matches!(
            err,
            ReleaseError::Publish(PublishError::UnmatchedAttachments { .. })
        ));
        assert!(publisher.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn workspace_at_project_root_is_never_erased() {
        let dir = tempfile::tempdir().unwrap();
        let store = populated(dir.path(), 11).await;
        std::fs::write(dir.path().join("extract.py"), "print('hi')").unwrap();
        let config = PipelineConfig {
            release_dir: PathBuf::from("."),
            ..Default::default()
        };
        let publisher = RecordingPublisher::default();
        let creator = ReleaseCreator::new(&publisher, &config, dir.path(), &store);

        let err = creator.run(&push(11)).await.unwrap_err();
        assert!(matches!(err, ReleaseError::Cli(_)), "{err}");
        assert!(dir.path().join("extract.py").is_file());
        assert!(publisher.created.lock().unwrap().is_empty());
    }
}
