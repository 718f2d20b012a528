//! Pipeline orchestration.
//!
//! Trigger, then one task per matrix job (build, package, upload, record),
//! then the release job once every task has joined. Jobs share nothing but
//! the artifact store. The first failing job aborts the rest and the release
//! job does not run.

use crate::artifacts::{ArtifactManifest, ArtifactStore};
use crate::build::{CommandRunner, run_build_job};
use crate::config::{PipelineConfig, RetryConfig};
use crate::error::{BuildError, ReleaseError, Result};
use crate::matrix::{BuildJob, BuildMatrix, Platform};
use crate::package::{DistributionPackage, Packager};
use crate::release::{ReleaseCreator, ReleaseOutcome, ReleasePublisher};
use crate::state::{JobRecord, JobRecords, JobStatus};
use crate::trigger::RunContext;
use crate::utils::blocking;
use chrono::{Local, Utc};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;

/// Everything one successful matrix job produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    /// Platform built
    pub platform: Platform,
    /// Assembled package
    pub package: DistributionPackage,
    /// Uploaded artifact
    pub manifest: ArtifactManifest,
}

/// Outcome of a completed pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    /// Run number
    pub run_number: u64,
    /// Reports of the matrix jobs, in matrix order
    pub jobs: Vec<JobReport>,
    /// Release job outcome
    pub release: ReleaseOutcome,
}

/// Runs matrix jobs and the release job for a project
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: Arc<PipelineConfig>,
    project_dir: PathBuf,
    store: ArtifactStore,
    matrix: BuildMatrix,
    retry: RetryConfig,
}

impl Pipeline {
    /// Pipeline building the configured matrix
    pub fn new(config: PipelineConfig, project_dir: impl Into<PathBuf>, store: ArtifactStore) -> Self {
        let matrix = config.matrix.clone();
        Self {
            config: Arc::new(config),
            project_dir: project_dir.into(),
            store,
            matrix,
            retry: RetryConfig::default(),
        }
    }

    /// Build only part of the matrix here; the release gate still covers all
    /// of it, so the remaining jobs must have run elsewhere against the same store
    pub fn with_matrix(mut self, matrix: BuildMatrix) -> Self {
        self.matrix = matrix;
        self
    }

    /// Override retry limits for release host calls
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Configuration in use
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Project directory
    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// Artifact store
    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Jobs this pipeline builds
    pub fn matrix(&self) -> &BuildMatrix {
        &self.matrix
    }

    /// Run the whole pipeline for a trigger
    pub async fn run<R, P>(
        &self,
        runner: Arc<R>,
        publisher: &P,
        context: &RunContext,
    ) -> Result<PipelineReport>
    where
        R: CommandRunner + 'static,
        P: ReleasePublisher,
    {
        if !context.event.activates(&self.config.main_branch) {
            let reason = format!("{} does not run the pipeline", context.event);
            log::info!("Pipeline skipped: {}", reason);
            return Ok(PipelineReport {
                run_number: context.run_number,
                jobs: Vec::new(),
                release: ReleaseOutcome::Skipped { reason },
            });
        }

        log::info!(
            "Run {} triggered by {}: building {}",
            context.run_number,
            context.event,
            self.matrix
                .platforms()
                .iter()
                .map(|p| p.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let jobs = self.run_matrix(runner, context.run_number).await?;
        let release = ReleaseCreator::new(publisher, &self.config, &self.project_dir, &self.store)
            .with_retry(self.retry.clone())
            .run(context)
            .await?;

        Ok(PipelineReport {
            run_number: context.run_number,
            jobs,
            release,
        })
    }

    /// Run every selected job in parallel, failing fast
    pub async fn run_matrix<R>(&self, runner: Arc<R>, run_number: u64) -> Result<Vec<JobReport>>
    where
        R: CommandRunner + 'static,
    {
        let mut join_set = JoinSet::new();
        for job in self.matrix.jobs() {
            let this = self.clone();
            let runner = Arc::clone(&runner);
            let job = job.clone();
            join_set.spawn(async move {
                let result = this.run_job(runner.as_ref(), &job, run_number).await;
                (job.platform, result)
            });
        }

        let mut finished = HashSet::new();
        let mut reports = Vec::new();
        let mut first_error: Option<ReleaseError> = None;

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((platform, Ok(report))) => {
                    finished.insert(platform);
                    reports.push(report);
                }
                Ok((platform, Err(e))) => {
                    finished.insert(platform);
                    if first_error.is_none() {
                        log::error!("Job {} failed, cancelling remaining jobs: {}", platform, e);
                        join_set.abort_all();
                        first_error = Some(e);
                    }
                }
                Err(e) if e.is_cancelled() => {}
                Err(e) => {
                    log::error!("Build task panicked: {}", e);
                    if first_error.is_none() {
                        join_set.abort_all();
                        first_error = Some(anyhow::anyhow!("build task panicked: {}", e).into());
                    }
                }
            }
        }

        if let Some(e) = first_error {
            for job in self.matrix.jobs() {
                if !finished.contains(&job.platform) {
                    self.mark_cancelled(job, run_number).await;
                }
            }
            return Err(e);
        }

        reports.sort_by_key(|r| {
            self.matrix
                .jobs()
                .iter()
                .position(|j| j.platform == r.platform)
        });
        Ok(reports)
    }

    /// Run one matrix job and record its outcome
    pub async fn run_job<R: CommandRunner>(
        &self,
        runner: &R,
        job: &BuildJob,
        run_number: u64,
    ) -> Result<JobReport> {
        let records = JobRecords::new(self.store.jobs_dir(run_number));
        let mut record = JobRecord::start(run_number, job);
        records.save(&record).await?;
        log::info!(
            "Job {} started for run {} (runs on {})",
            job.platform,
            run_number,
            job.platform.runner_label()
        );

        match self.build_and_upload(runner, job, run_number).await {
            Ok(report) => {
                record.succeed(report.package.checksum.clone());
                records.save(&record).await?;
                log::info!("Job {} succeeded", job.platform);
                Ok(report)
            }
            Err(e) => {
                record.fail(&e);
                if let Err(save_err) = records.save(&record).await {
                    log::error!("Could not record failure of {}: {}", job.platform, save_err);
                }
                Err(e)
            }
        }
    }

    async fn build_and_upload<R: CommandRunner>(
        &self,
        runner: &R,
        job: &BuildJob,
        run_number: u64,
    ) -> Result<JobReport> {
        let output = run_build_job(runner, job, &self.config, &self.project_dir).await?;

        let packager = Packager::new(
            self.config.scratch_dir(&self.project_dir, &self.config.package_dir)?,
            Some(self.config.resolve(&self.project_dir, &self.config.readme)),
        );
        let package = packager
            .package(job, &output.executable, Local::now().date_naive())
            .await?;

        let store = self.store.clone();
        let name = job.artifact_name.clone();
        let source = package.dir.clone();
        let retention_days = self.config.retention_days;
        let manifest =
            blocking(move || store.upload(run_number, &name, &source, retention_days, Utc::now()))
                .await?;

        Ok(JobReport {
            platform: job.platform,
            package,
            manifest,
        })
    }

    async fn mark_cancelled(&self, job: &BuildJob, run_number: u64) {
        let records = JobRecords::new(self.store.jobs_dir(run_number));
        let mut record = match records.load(job.platform).await {
            Ok(Some(record)) if record.status != JobStatus::Running => return,
            Ok(Some(record)) => record,
            _ => JobRecord::start(run_number, job),
        };
        record.cancel();
        record.error = Some(
            BuildError::Cancelled {
                platform: job.platform.to_string(),
            }
            .to_string(),
        );

        if let Err(e) = records.save(&record).await {
            log::error!("Could not record cancellation of {}: {}", job.platform, e);
        } else {
            log::warn!("Job {} cancelled", job.platform);
        }
    }
}
