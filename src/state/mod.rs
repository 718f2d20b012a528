//! Job records for pipeline runs.
//!
//! Every matrix job writes a record of its outcome next to the run's
//! artifacts. The release job reads them back as its join gate: it only
//! proceeds when every matrix platform recorded success.

use crate::error::{Result, StateError};
use crate::matrix::{BuildJob, BuildMatrix, Platform};
use crate::utils::fs::write_atomic;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Current version of the record format
pub const RECORD_FORMAT_VERSION: u32 = 1;

/// Lifecycle of a matrix job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Build, package and upload in progress
    Running,
    /// Artifact uploaded
    Succeeded,
    /// A step failed
    Failed,
    /// Aborted because another job failed
    Cancelled,
}

/// Persisted outcome of one matrix job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Version of the record format
    pub format_version: u32,
    /// Run the job belongs to
    pub run_number: u64,
    /// Platform built
    pub platform: Platform,
    /// Artifact the job uploads
    pub artifact_name: String,
    /// Current status
    pub status: JobStatus,
    /// When the job started
    pub started_at: DateTime<Utc>,
    /// When the job reached a final status
    pub finished_at: Option<DateTime<Utc>>,
    /// SHA-256 of the packaged executable
    pub executable_sha256: Option<String>,
    /// Failure message
    pub error: Option<String>,
}

impl JobRecord {
    /// Record for a job that just started
    pub fn start(run_number: u64, job: &BuildJob) -> Self {
        Self {
            format_version: RECORD_FORMAT_VERSION,
            run_number,
            platform: job.platform,
            artifact_name: job.artifact_name.clone(),
            status: JobStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            executable_sha256: None,
            error: None,
        }
    }

    /// Mark the job successful
    pub fn succeed(&mut self, executable_sha256: String) {
        self.status = JobStatus::Succeeded;
        self.executable_sha256 = Some(executable_sha256);
        self.finished_at = Some(Utc::now());
    }

    /// Mark the job failed
    pub fn fail(&mut self, error: impl ToString) {
        self.status = JobStatus::Failed;
        self.error = Some(error.to_string());
        self.finished_at = Some(Utc::now());
    }

    /// Mark the job cancelled
    pub fn cancel(&mut self) {
        self.status = JobStatus::Cancelled;
        self.finished_at = Some(Utc::now());
    }
}

/// Directory of job records for one run
#[derive(Debug, Clone)]
pub struct JobRecords {
    dir: PathBuf,
}

impl JobRecords {
    /// Records stored in `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, platform: Platform) -> PathBuf {
        self.dir.join(format!("{}.json", platform))
    }

    /// Save a record, replacing any previous one for its platform
    pub async fn save(&self, record: &JobRecord) -> Result<()> {
        let serialized =
            serde_json::to_vec_pretty(record).map_err(|e| StateError::SaveFailed {
                reason: format!("Failed to serialize job record: {}", e),
            })?;
        write_atomic(&self.path(record.platform), &serialized).await
    }

    /// Load the record of a platform, if any
    pub async fn load(&self, platform: Platform) -> Result<Option<JobRecord>> {
        let path = self.path(platform);
        if !tokio::fs::try_exists(&path).await? {
            return Ok(None);
        }
        let content = tokio::fs::read_to_string(&path).await?;
        let record: JobRecord = serde_json::from_str(&content).map_err(|e| corrupted(&path, e))?;
        if record.format_version != RECORD_FORMAT_VERSION {
            return Err(corrupted(
                &path,
                format!(
                    "format version {} (expected {})",
                    record.format_version, RECORD_FORMAT_VERSION
                ),
            ));
        }
        Ok(Some(record))
    }

    /// Matrix platforms without a successful record
    pub async fn unsuccessful(&self, matrix: &BuildMatrix) -> Result<Vec<Platform>> {
        let mut pending = Vec::new();
        for platform in matrix.platforms() {
            let succeeded = matches!(
                self.load(platform).await?,
                Some(JobRecord { status: JobStatus::Succeeded, .. })
            );
            if !succeeded {
                pending.push(platform);
            }
        }
        Ok(pending)
    }
}

fn corrupted(path: &Path, reason: impl ToString) -> crate::error::ReleaseError {
    StateError::Corrupted {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unsuccessful_lists_missing_and_failed_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let records = JobRecords::new(dir.path());
        let matrix = BuildMatrix::default();

        assert_eq!(
            records.unsuccessful(&matrix).await.unwrap(),
            vec![Platform::Windows, Platform::Linux]
        );

        let mut linux = JobRecord::start(3, matrix.job(Platform::Linux).unwrap());
        linux.succeed("abc".to_string());
        records.save(&linux).await.unwrap();

        let mut windows = JobRecord::start(3, matrix.job(Platform::Windows).unwrap());
        windows.fail("Executable extract_windows.exe not found");
        records.save(&windows).await.unwrap();

        assert_eq!(
            records.unsuccessful(&matrix).await.unwrap(),
            vec![Platform::Windows]
        );

        let loaded = records.load(Platform::Windows).await.unwrap().unwrap();
        assert_eq!(loaded.status, JobStatus::Failed);
        assert!(loaded.error.unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn corrupted_record_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("linux.json"), "{not json").unwrap();
        let records = JobRecords::new(dir.path());
        assert!(records.load(Platform::Linux).await.is_err());
    }
}
