//! End-to-end pipeline runs against a scripted build host and an in-memory
//! release host.

use pdf_table_release::build::{CommandOutput, CommandRunner, CommandSpec};
use pdf_table_release::error::{BuildError, ReleaseError, Result};
use pdf_table_release::package::version_stamp;
use pdf_table_release::release::{PublishedRelease, ReleaseSpec, UploadedAsset};
use pdf_table_release::{
    ArtifactStore, JobRecords, JobStatus, Pipeline, PipelineConfig, Platform, ReleaseOutcome,
    ReleasePublisher, RetryConfig, RunContext, TriggerEvent,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Pretends to be a build host with Python 3.9 and PyInstaller
#[derive(Default)]
struct FakeHost {
    /// Output name whose PyInstaller run exits non-zero
    fail_packaging: Option<&'static str>,
    /// Output name whose PyInstaller run never finishes
    hang_packaging: Option<&'static str>,
}

impl CommandRunner for FakeHost {
    async fn run(&self, command: &CommandSpec) -> Result<CommandOutput> {
        if command.args.iter().any(|a| a == "--version") {
            return Ok(CommandOutput::success_with("Python 3.9.18\n"));
        }
        if command.label != "pyinstaller" {
            return Ok(CommandOutput::success_with(""));
        }

        let name = command.flag_value("--name").unwrap_or_default().to_string();
        if self.hang_packaging == Some(name.as_str()) {
            std::future::pending::<()>().await;
        }
        if self.fail_packaging == Some(name.as_str()) {
            return Ok(CommandOutput::failure(1, "ModuleNotFoundError: No module named 'pdfplumber'"));
        }

        let dist = PathBuf::from(command.flag_value("--distpath").unwrap_or("dist"));
        std::fs::create_dir_all(&dist)?;
        let file = if name.ends_with("windows") {
            format!("{}.exe", name)
        } else {
            name
        };
        std::fs::write(dist.join(file), b"\x7fELF fake executable")?;
        Ok(CommandOutput::success_with(""))
    }

    fn resolve_program(&self, program: &str) -> Option<String> {
        Some(program.to_string())
    }
}

/// Release host keeping everything in memory
#[derive(Default)]
struct MemoryHost {
    releases: Mutex<Vec<ReleaseSpec>>,
    uploads: Mutex<Vec<String>>,
}

impl ReleasePublisher for MemoryHost {
    async fn find_release(&self, tag: &str) -> Result<Option<PublishedRelease>> {
        Ok(self
            .releases
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.tag == tag)
            .map(|r| PublishedRelease {
                id: 1,
                tag: r.tag.clone(),
                html_url: format!("https://github.test/acme/pdf/releases/tag/{}", r.tag),
                upload_url: String::new(),
            }))
    }

    async fn create_release(&self, spec: &ReleaseSpec) -> Result<PublishedRelease> {
        self.releases.lock().unwrap().push(spec.clone());
        Ok(PublishedRelease {
            id: 1,
            tag: spec.tag.clone(),
            html_url: format!("https://github.test/acme/pdf/releases/tag/{}", spec.tag),
            upload_url: String::new(),
        })
    }

    async fn upload_asset(&self, _release: &PublishedRelease, path: &Path) -> Result<UploadedAsset> {
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        self.uploads.lock().unwrap().push(name.clone());
        Ok(UploadedAsset {
            size: std::fs::metadata(path)?.len(),
            download_url: format!("https://github.test/download/{}", name),
            name,
        })
    }
}

fn project() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("extract.py"), "import pdfplumber\n").unwrap();
    std::fs::write(dir.path().join("requirements.txt"), "pdfplumber\npandas\n").unwrap();
    std::fs::write(dir.path().join("README.md"), "# PDF to table\n").unwrap();
    dir
}

fn pipeline(project: &Path, config: PipelineConfig) -> Pipeline {
    Pipeline::new(config, project, ArtifactStore::new(project.join("store")))
        .with_retry(RetryConfig::none())
}

fn push_to_main(run_number: u64) -> RunContext {
    RunContext::new(
        TriggerEvent::Push {
            branch: "main".to_string(),
        },
        run_number,
    )
}

#[tokio::test]
async fn push_to_main_publishes_both_executables() {
    let dir = project();
    let host = MemoryHost::default();
    let report = pipeline(dir.path(), PipelineConfig::default())
        .run(Arc::new(FakeHost::default()), &host, &push_to_main(42))
        .await
        .unwrap();

    assert_eq!(report.jobs.len(), 2);
    assert_eq!(report.jobs[0].platform, Platform::Windows);
    assert_eq!(report.jobs[1].platform, Platform::Linux);

    let ReleaseOutcome::Created(release) = &report.release else {
        panic!("expected a release, got {:?}", report.release);
    };
    assert_eq!(release.tag, "v42");
    assert_eq!(release.title, "PDF Processor v42");
    assert!(release.unmatched_patterns.is_empty());
    assert_eq!(
        *host.uploads.lock().unwrap(),
        vec!["extract_windows.exe", "extract_linux"]
    );

    let releases = host.releases.lock().unwrap();
    assert!(releases[0].body.contains("extract_windows.exe"));
    assert!(releases[0].body.contains("extract_linux"));
    assert!(releases[0].generate_notes);

    let records = JobRecords::new(ArtifactStore::new(dir.path().join("store")).jobs_dir(42));
    for platform in Platform::ALL {
        let record = records.load(platform).await.unwrap().unwrap();
        assert_eq!(record.status, JobStatus::Succeeded);
    }
}

#[tokio::test]
async fn packages_carry_instructions_and_readme() {
    let dir = project();
    let report = pipeline(dir.path(), PipelineConfig::default())
        .run(Arc::new(FakeHost::default()), &MemoryHost::default(), &push_to_main(3))
        .await
        .unwrap();

    let linux = &report.jobs[1].package;
    let instructions = std::fs::read_to_string(&linux.instructions).unwrap();
    let stamp = version_stamp(chrono::Local::now().date_naive());
    assert!(instructions.contains(&format!("Version: {}", stamp)));
    assert!(instructions.contains("Platform: Linux"));
    assert!(linux.readme.as_ref().unwrap().ends_with("README.md"));

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&linux.executable).unwrap().permissions().mode();
        assert_ne!(mode & 0o111, 0);
    }
}

#[tokio::test]
async fn truncated_linux_glob_leaves_linux_binary_off_the_release() {
    let dir = project();
    let config = PipelineConfig {
        attachments: vec![
            "dist/**/extract_windows.exe".to_string(),
            "dist/**/extract_linu".to_string(),
        ],
        ..Default::default()
    };
    let host = MemoryHost::default();
    let report = pipeline(dir.path(), config)
        .run(Arc::new(FakeHost::default()), &host, &push_to_main(7))
        .await
        .unwrap();

    let ReleaseOutcome::Created(release) = report.release else {
        panic!("expected a release");
    };
    assert_eq!(release.unmatched_patterns, vec!["dist/**/extract_linu"]);
    assert_eq!(*host.uploads.lock().unwrap(), vec!["extract_windows.exe"]);
    assert!(
        release
            .downloaded_files
            .iter()
            .any(|f| f.ends_with("extract_linux"))
    );
}

#[tokio::test]
async fn pull_request_builds_without_releasing() {
    let dir = project();
    let host = MemoryHost::default();
    let context = RunContext::new(
        TriggerEvent::PullRequest {
            base_branch: "main".to_string(),
        },
        11,
    );
    let report = pipeline(dir.path(), PipelineConfig::default())
        .run(Arc::new(FakeHost::default()), &host, &context)
        .await
        .unwrap();

    assert_eq!(report.jobs.len(), 2);
    assert!(matches!(report.release, ReleaseOutcome::Skipped { .. }));
    assert!(host.releases.lock().unwrap().is_empty());
}

#[tokio::test]
async fn push_to_other_branch_does_nothing() {
    let dir = project();
    let context = RunContext::new(
        TriggerEvent::Push {
            branch: "feature/csv".to_string(),
        },
        12,
    );
    let report = pipeline(dir.path(), PipelineConfig::default())
        .run(Arc::new(FakeHost::default()), &MemoryHost::default(), &context)
        .await
        .unwrap();

    assert!(report.jobs.is_empty());
    assert!(matches!(report.release, ReleaseOutcome::Skipped { .. }));
    assert!(!dir.path().join("store").exists());
}

#[tokio::test]
async fn failing_job_cancels_the_other_and_blocks_the_release() {
    let dir = project();
    let runner = FakeHost {
        fail_packaging: Some("extract_windows"),
        hang_packaging: Some("extract_linux"),
    };
    let host = MemoryHost::default();
    let err = pipeline(dir.path(), PipelineConfig::default())
        .run(Arc::new(runner), &host, &push_to_main(13))
        .await
        .unwrap_err();

    assert!(matches!(err, ReleaseError::Build(BuildError::PackagingFailed { .. })));
    assert!(host.releases.lock().unwrap().is_empty());

    let records = JobRecords::new(ArtifactStore::new(dir.path().join("store")).jobs_dir(13));
    let windows = records.load(Platform::Windows).await.unwrap().unwrap();
    assert_eq!(windows.status, JobStatus::Failed);
    assert!(windows.error.unwrap().contains("Packaging failed"));
    let linux = records.load(Platform::Linux).await.unwrap().unwrap();
    assert_eq!(linux.status, JobStatus::Cancelled);
}

#[tokio::test]
async fn rerunning_a_run_never_publishes_twice() {
    let dir = project();
    let host = MemoryHost::default();
    let pipeline = pipeline(dir.path(), PipelineConfig::default());
    pipeline
        .run(Arc::new(FakeHost::default()), &host, &push_to_main(20))
        .await
        .unwrap();

    // Artifacts of run 20 already exist, so the rerun fails at upload
    let err = pipeline
        .run(Arc::new(FakeHost::default()), &host, &push_to_main(20))
        .await
        .unwrap_err();
    assert!(matches!(err, ReleaseError::Artifact(_)));
    assert_eq!(host.releases.lock().unwrap().len(), 1);
}
