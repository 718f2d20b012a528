//! Artifact store.
//!
//! Artifacts are the only hand-off between matrix jobs and the release job.
//! Each is a zip archive plus a JSON manifest, grouped by run number:
//!
//! ```text
//! <store>/run-42/pdf_to_table_linux.zip
//! <store>/run-42/pdf_to_table_linux.json
//! ```
//!
//! The store is a plain directory so it can live on a shared volume or be
//! synced between runners.

use crate::error::{ArtifactError, Result};
use crate::state::JobRecord;
use crate::utils::fs::list_files;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;

/// Metadata recorded next to every archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    /// Artifact name
    pub name: String,
    /// Run that uploaded it
    pub run_number: u64,
    /// Upload time
    pub created_at: DateTime<Utc>,
    /// Days the artifact is kept
    pub retention_days: u32,
    /// Relative paths of archived files
    pub files: Vec<String>,
    /// Archive size in bytes
    pub size: u64,
    /// SHA-256 of the archive
    pub sha256: String,
}

impl ArtifactManifest {
    /// Time after which `prune` removes the artifact
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.created_at + Duration::days(i64::from(self.retention_days))
    }

    /// Whether the artifact is past its retention at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }
}

/// Directory-backed artifact storage
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Store rooted at a directory, created lazily
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn run_dir(&self, run_number: u64) -> PathBuf {
        self.root.join(format!("run-{}", run_number))
    }

    /// Directory holding the job records of a run
    pub fn jobs_dir(&self, run_number: u64) -> PathBuf {
        self.run_dir(run_number).join("jobs")
    }

    fn archive_path(&self, run_number: u64, name: &str) -> PathBuf {
        self.run_dir(run_number).join(format!("{}.zip", name))
    }

    fn manifest_path(&self, run_number: u64, name: &str) -> PathBuf {
        self.run_dir(run_number).join(format!("{}.json", name))
    }

    /// Archive a directory under `name` for a run
    pub fn upload(
        &self,
        run_number: u64,
        name: &str,
        source: &Path,
        retention_days: u32,
        now: DateTime<Utc>,
    ) -> Result<ArtifactManifest> {
        let archive = self.archive_path(run_number, name);
        if archive.exists() {
            return Err(ArtifactError::AlreadyExists {
                name: name.to_string(),
                run_number,
            }
            .into());
        }

        let files = if source.is_dir() { list_files(source)? } else { Vec::new() };
        if files.is_empty() {
            return Err(ArtifactError::EmptySource {
                path: source.to_path_buf(),
            }
            .into());
        }

        fs::create_dir_all(self.run_dir(run_number))?;
        let temp = archive.with_extension("zip.tmp");
        let entries = write_archive(&temp, source, &files)?;
        fs::rename(&temp, &archive)?;

        let manifest = ArtifactManifest {
            name: name.to_string(),
            run_number,
            created_at: now,
            retention_days,
            files: entries,
            size: fs::metadata(&archive)?.len(),
            sha256: sha256_file(&archive)?,
        };
        let manifest_path = self.manifest_path(run_number, name);
        let temp = manifest_path.with_extension("json.tmp");
        fs::write(&temp, serde_json::to_vec_pretty(&manifest)?)?;
        fs::rename(&temp, &manifest_path)?;

        log::info!(
            "Uploaded artifact {} for run {} ({} files, {} bytes, retained {} days)",
            name,
            run_number,
            manifest.files.len(),
            manifest.size,
            retention_days
        );
        Ok(manifest)
    }

    /// Manifest of one artifact
    pub fn get(&self, run_number: u64, name: &str) -> Result<ArtifactManifest> {
        let path = self.manifest_path(run_number, name);
        if !path.is_file() {
            return Err(ArtifactError::NotFound {
                name: name.to_string(),
                run_number,
            }
            .into());
        }
        read_manifest(&path)
    }

    /// Manifests of every artifact of a run, sorted by name
    pub fn list(&self, run_number: u64) -> Result<Vec<ArtifactManifest>> {
        let dir = self.run_dir(run_number);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut manifests = manifests_in(&dir)?;
        manifests.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(manifests)
    }

    /// Extract every artifact of a run into `dest/<name>/`
    pub fn download_all(&self, run_number: u64, dest: &Path) -> Result<Vec<PathBuf>> {
        let mut extracted = Vec::new();
        for manifest in self.list(run_number)? {
            let target = dest.join(&manifest.name);
            fs::create_dir_all(&target)?;

            let archive_path = self.archive_path(run_number, &manifest.name);
            let mut archive = zip::ZipArchive::new(File::open(&archive_path)?)?;
            archive.extract(&target)?;

            log::info!("Downloaded artifact {} to {}", manifest.name, target.display());
            extracted.push(target);
        }
        Ok(extracted)
    }

    /// Remove artifacts past their retention.
    ///
    /// A run directory goes once nothing in it is retained. Runs that never
    /// uploaded an artifact, such as runs whose jobs all failed, are kept
    /// for `retention_days` after their last job finished.
    pub fn prune(&self, now: DateTime<Utc>, retention_days: u32) -> Result<PruneReport> {
        let mut report = PruneReport::default();
        if !self.root.is_dir() {
            return Ok(report);
        }

        for entry in fs::read_dir(&self.root)? {
            let run_dir = entry?.path();
            if !run_dir.is_dir() {
                continue;
            }

            let manifests = manifests_in(&run_dir)?;
            let total = manifests.len();
            let mut expired = 0;

            for manifest in manifests {
                if !manifest.is_expired(now) {
                    continue;
                }
                expired += 1;
                remove_if_exists(&run_dir.join(format!("{}.zip", manifest.name)))?;
                remove_if_exists(&run_dir.join(format!("{}.json", manifest.name)))?;
                log::info!(
                    "Pruned artifact {} of run {} (expired {})",
                    manifest.name,
                    manifest.run_number,
                    manifest.expires_at()
                );
                report.artifacts.push(manifest);
            }

            let remove_run = if total > 0 {
                // Job records go with the last artifact of their run
                expired == total
            } else {
                records_expired(&run_dir.join("jobs"), now, retention_days)
            };
            if remove_run {
                fs::remove_dir_all(&run_dir)?;
                if let Some(run_number) = run_number_of(&run_dir) {
                    log::info!("Pruned run {}", run_number);
                    report.runs.push(run_number);
                }
            }
        }

        report.runs.sort_unstable();
        Ok(report)
    }
}

/// What `prune` removed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    /// Expired artifacts
    pub artifacts: Vec<ArtifactManifest>,
    /// Runs whose directory was removed entirely
    pub runs: Vec<u64>,
}

impl PruneReport {
    /// Whether nothing was removed
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty() && self.runs.is_empty()
    }
}

/// Whether every job record of an artifact-less run is past retention.
///
/// An unreadable record keeps the run; a job still running counts from its start.
fn records_expired(jobs_dir: &Path, now: DateTime<Utc>, retention_days: u32) -> bool {
    let Ok(entries) = fs::read_dir(jobs_dir) else {
        return false;
    };
    let retention = Duration::days(i64::from(retention_days));
    let mut seen = 0;

    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let record = fs::read_to_string(&path)
            .ok()
            .and_then(|content| serde_json::from_str::<JobRecord>(&content).ok());
        let Some(record) = record else {
            log::warn!("Keeping run with unreadable job record {}", path.display());
            return false;
        };
        let last_activity = record.finished_at.unwrap_or(record.started_at);
        if now < last_activity + retention {
            return false;
        }
        seen += 1;
    }
    seen > 0
}

fn run_number_of(run_dir: &Path) -> Option<u64> {
    run_dir
        .file_name()?
        .to_str()?
        .strip_prefix("run-")?
        .parse()
        .ok()
}

fn write_archive(path: &Path, source: &Path, files: &[PathBuf]) -> Result<Vec<String>> {
    let mut zip = zip::ZipWriter::new(File::create(path)?);
    let mut entries = Vec::with_capacity(files.len());

    for file in files {
        let relative = file.strip_prefix(source).unwrap_or(file.as_path());
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let options = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .unix_permissions(file_mode(file)?);
        zip.start_file(name.clone(), options)?;
        io::copy(&mut File::open(file)?, &mut zip)?;
        entries.push(name);
    }

    zip.finish()?;
    Ok(entries)
}

#[cfg(unix)]
fn file_mode(path: &Path) -> Result<u32> {
    use std::os::unix::fs::PermissionsExt;
    Ok(fs::metadata(path)?.permissions().mode() & 0o777)
}

#[cfg(not(unix))]
fn file_mode(_path: &Path) -> Result<u32> {
    Ok(0o644)
}

fn sha256_file(path: &Path) -> Result<String> {
    let mut hasher = Sha256::new();
    io::copy(&mut File::open(path)?, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

fn read_manifest(path: &Path) -> Result<ArtifactManifest> {
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| {
        ArtifactError::CorruptManifest {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }
        .into()
    })
}

fn manifests_in(dir: &Path) -> Result<Vec<ArtifactManifest>> {
    let mut manifests = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            manifests.push(read_manifest(&path)?);
        }
    }
    Ok(manifests)
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReleaseError;

    fn package(dir: &Path) -> PathBuf {
        let pkg = dir.join("pkg");
        fs::create_dir_all(&pkg).unwrap();
        fs::write(pkg.join("extract_linux"), b"elf").unwrap();
        fs::write(pkg.join("README.txt"), b"instructions").unwrap();
        pkg
    }

    #[test]
    fn upload_then_download_restores_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("store"));
        let pkg = package(dir.path());

        let manifest = store
            .upload(42, "pdf_to_table_linux", &pkg, 30, Utc::now())
            .unwrap();
        assert_eq!(manifest.files, vec!["README.txt", "extract_linux"]);
        assert_eq!(manifest.retention_days, 30);

        let dest = dir.path().join("dist");
        let extracted = store.download_all(42, &dest).unwrap();
        assert_eq!(extracted, vec![dest.join("pdf_to_table_linux")]);
        assert_eq!(
            fs::read(dest.join("pdf_to_table_linux").join("extract_linux")).unwrap(),
            b"elf"
        );
    }

    #[cfg(unix)]
    #[test]
    fn executable_bit_survives_the_round_trip() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("store"));
        let pkg = package(dir.path());
        let exe = pkg.join("extract_linux");
        fs::set_permissions(&exe, fs::Permissions::from_mode(0o755)).unwrap();

        store.upload(1, "linux", &pkg, 30, Utc::now()).unwrap();
        let dest = dir.path().join("out");
        store.download_all(1, &dest).unwrap();

        let mode = fs::metadata(dest.join("linux").join("extract_linux"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o111, 0o111);
    }

    #[test]
    fn duplicate_upload_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("store"));
        let pkg = package(dir.path());

        store.upload(7, "a", &pkg, 30, Utc::now()).unwrap();
        let err = store.upload(7, "a", &pkg, 30, Utc::now()).unwrap_err();
        assert!(matches!(err, ReleaseError::Artifact(ArtifactError::AlreadyExists { .. })));

        // Other runs are independent
        assert!(store.upload(8, "a", &pkg, 30, Utc::now()).is_ok());
    }

    #[test]
    fn empty_source_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("store"));
        let empty = dir.path().join("empty");
        fs::create_dir_all(&empty).unwrap();

        assert!(store.upload(1, "x", &empty, 30, Utc::now()).is_err());
        assert!(store.upload(1, "x", &dir.path().join("missing"), 30, Utc::now()).is_err());
    }

    #[test]
    fn prune_removes_only_expired_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("store"));
        let pkg = package(dir.path());
        let now = Utc::now();

        store.upload(1, "old", &pkg, 30, now - Duration::days(31)).unwrap();
        store.upload(2, "fresh", &pkg, 30, now - Duration::days(29)).unwrap();

        let removed = store.prune(now, 30).unwrap();
        assert_eq!(removed.artifacts.len(), 1);
        assert_eq!(removed.artifacts[0].name, "old");
        assert_eq!(removed.runs, vec![1]);
        assert!(store.list(1).unwrap().is_empty());
        assert!(!dir.path().join("store").join("run-1").exists());
        assert_eq!(store.list(2).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn prune_removes_failed_runs_after_retention() {
        use crate::matrix::{BuildJob, Platform};
        use crate::state::JobRecords;

        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("store"));
        let records = JobRecords::new(store.jobs_dir(5));
        let mut record = JobRecord::start(5, &BuildJob::default_for(Platform::Linux));
        record.fail("PyInstaller exited with 1");
        records.save(&record).await.unwrap();
        let now = Utc::now();

        let kept = store.prune(now + Duration::days(29), 30).unwrap();
        assert!(kept.is_empty());
        assert!(store.jobs_dir(5).is_dir());

        let removed = store.prune(now + Duration::days(31), 30).unwrap();
        assert!(removed.artifacts.is_empty());
        assert_eq!(removed.runs, vec![5]);
        assert!(!dir.path().join("store").join("run-5").exists());
    }

    #[test]
    fn missing_artifact_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        assert!(store.get(1, "nope").is_err());
        assert!(store.list(1).unwrap().is_empty());
    }
}
