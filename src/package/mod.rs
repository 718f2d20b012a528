//! Distribution packaging.
//!
//! A distribution package is a directory holding the built executable, the
//! project README when one exists, and a generated `README.txt` with a date
//! version stamp and usage instructions.

use crate::error::{PackageError, Result};
use crate::matrix::{BuildJob, Platform};
use crate::utils::fs;
use chrono::NaiveDate;
use handlebars::Handlebars;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Name of the generated instructions file
pub const INSTRUCTIONS_FILE: &str = "README.txt";

const INSTRUCTIONS_TEMPLATE: &str = "\
PDF to Table Converter
======================
Version: {{version}}
Platform: {{platform}}

Instructions:
1. Run {{executable}}{{#if unix}} (first make it executable: chmod +x {{executable}}){{/if}}
2. Click \"Browse\" next to \"Input Folder\" and choose the folder with your PDF files
3. Click \"Browse\" next to \"Output Folder\" and choose where the CSV files are saved
4. Click \"Process Files\" and wait for the completion message
";

#[derive(Serialize)]
struct InstructionsData<'a> {
    version: &'a str,
    platform: &'a str,
    executable: &'a str,
    unix: bool,
}

/// Version stamp for a build date, `YYYY.MM.DD`
pub fn version_stamp(date: NaiveDate) -> String {
    date.format("%Y.%m.%d").to_string()
}

/// Render the generated `README.txt` for a job
pub fn render_instructions(job: &BuildJob, version: &str) -> Result<String> {
    let mut handlebars = Handlebars::new();
    handlebars.set_strict_mode(true);
    handlebars.register_escape_fn(handlebars::no_escape);

    let data = InstructionsData {
        version,
        platform: job.platform.display_name(),
        executable: &job.executable_name,
        unix: job.platform != Platform::Windows,
    };
    Ok(handlebars.render_template(INSTRUCTIONS_TEMPLATE, &data)?)
}

/// An assembled distribution package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionPackage {
    /// Platform the package targets
    pub platform: Platform,
    /// Artifact name the package is uploaded under
    pub artifact_name: String,
    /// Package directory
    pub dir: PathBuf,
    /// Executable inside the package
    pub executable: PathBuf,
    /// Generated instructions inside the package
    pub instructions: PathBuf,
    /// Copied project README, when one existed
    pub readme: Option<PathBuf>,
    /// SHA-256 of the executable
    pub checksum: String,
    /// Version stamp written into the instructions
    pub version: String,
}

impl DistributionPackage {
    /// Check the package holds exactly one executable, named as declared
    pub fn verify(&self, job: &BuildJob) -> Result<()> {
        let docs: Vec<&Path> = std::iter::once(self.instructions.as_path())
            .chain(self.readme.as_deref())
            .collect();

        let found: Vec<String> = fs::list_files(&self.dir)?
            .into_iter()
            .filter(|f| !docs.contains(&f.as_path()))
            .map(|f| {
                f.strip_prefix(&self.dir)
                    .unwrap_or(f.as_path())
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();

        if found.len() != 1 || found[0] != job.executable_name {
            return Err(PackageError::InvalidContents {
                dir: self.dir.clone(),
                expected: job.executable_name.clone(),
                found,
            }
            .into());
        }
        Ok(())
    }
}

/// Assembles distribution packages under a root directory
#[derive(Debug, Clone)]
pub struct Packager {
    root: PathBuf,
    readme: Option<PathBuf>,
}

impl Packager {
    /// Packager writing to `root/<artifact_name>`, copying `readme` when it exists
    pub fn new(root: impl Into<PathBuf>, readme: Option<PathBuf>) -> Self {
        Self {
            root: root.into(),
            readme,
        }
    }

    /// Directory a job's package is assembled in
    pub fn package_dir(&self, job: &BuildJob) -> PathBuf {
        self.root.join(&job.artifact_name)
    }

    /// Assemble the package for a built executable
    pub async fn package(
        &self,
        job: &BuildJob,
        executable: &Path,
        date: NaiveDate,
    ) -> Result<DistributionPackage> {
        let dir = self.package_dir(job);
        fs::create_dir_all(&dir, true).await?;

        let target = dir.join(&job.executable_name);
        fs::copy_file(executable, &target).await?;
        if job.platform != Platform::Windows {
            fs::set_executable(&target).await?;
        }
        let checksum = fs::calculate_sha256(&target).await?;

        let readme = self.copy_readme(&dir).await?;

        let version = version_stamp(date);
        let instructions = dir.join(INSTRUCTIONS_FILE);
        let text = render_instructions(job, &version)?;
        tokio::fs::write(&instructions, text).await?;

        let package = DistributionPackage {
            platform: job.platform,
            artifact_name: job.artifact_name.clone(),
            dir,
            executable: target,
            instructions,
            readme,
            checksum,
            version,
        };
        package.verify(job)?;

        log::info!(
            "Packaged {} into {} (sha256 {})",
            job.executable_name,
            package.dir.display(),
            package.checksum
        );
        Ok(package)
    }

    async fn copy_readme(&self, dir: &Path) -> Result<Option<PathBuf>> {
        let Some(source) = self.readme.as_ref().filter(|p| p.is_file()) else {
            log::info!("No README found, packaging without it");
            return Ok(None);
        };

        let Some(name) = source.file_name() else {
            return Ok(None);
        };
        if name == INSTRUCTIONS_FILE {
            log::warn!(
                "{} would overwrite the generated instructions, skipping it",
                source.display()
            );
            return Ok(None);
        }

        let target = dir.join(name);
        fs::copy_file(source, &target).await?;
        Ok(Some(target))
    }
}
