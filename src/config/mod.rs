//! Pipeline configuration.
//!
//! Every setting has a default matching the standard PDF to table pipeline,
//! so `pipeline.toml` is optional and only needs the keys being changed:
//!
//! ```toml
//! main_branch = "main"
//! python_version = "3.9"
//! hidden_imports = ["pdfplumber", "pandas"]
//! attachments = ["dist/**/extract_windows.exe", "dist/**/extract_linux"]
//!
//! [[matrix]]
//! platform = "linux"
//! executable_name = "extract_linux"
//! artifact_name = "pdf_to_table_linux"
//! ```

mod env;
mod retry;

pub use env::EnvConfig;
pub use retry::RetryConfig;

use crate::error::{CliError, ReleaseError, Result};
use crate::matrix::BuildMatrix;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// Default configuration file name, looked up in the project directory
pub const CONFIG_FILE_NAME: &str = "pipeline.toml";

/// Settings for every pipeline stage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Branch whose pushes produce releases
    pub main_branch: String,
    /// Explicit interpreter; `python3` then `python` are searched otherwise
    pub python: Option<String>,
    /// Expected interpreter version prefix
    pub python_version: String,
    /// Application entry script, relative to the project directory
    pub entry_script: PathBuf,
    /// Dependency manifest, relative to the project directory
    pub requirements: PathBuf,
    /// Optional README copied into every package
    pub readme: PathBuf,
    /// Packaging tool output directory
    pub dist_dir: PathBuf,
    /// Packaging tool scratch directory
    pub work_dir: PathBuf,
    /// Where distribution packages are assembled
    pub package_dir: PathBuf,
    /// Release job workspace; artifacts are downloaded into `<release_dir>/dist`
    pub release_dir: PathBuf,
    /// Modules the packaging tool cannot discover statically
    pub hidden_imports: Vec<String>,
    /// Packages bundled wholesale instead of through import analysis
    pub collect_all: Vec<String>,
    /// Additional raw packaging tool arguments
    pub extra_pyinstaller_args: Vec<String>,
    /// Days an uploaded artifact is retained
    pub retention_days: u32,
    /// Release attachment globs, relative to `release_dir`
    pub attachments: Vec<String>,
    /// Fail the release when an attachment glob matches nothing
    pub strict_attachments: bool,
    /// Ask the release host to append generated notes
    pub generate_release_notes: bool,
    /// Handlebars template replacing the built-in release body
    pub release_template: Option<PathBuf>,
    /// Platform matrix
    pub matrix: BuildMatrix,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            main_branch: "main".to_string(),
            python: None,
            python_version: "3.9".to_string(),
            entry_script: PathBuf::from("extract.py"),
            requirements: PathBuf::from("requirements.txt"),
            readme: PathBuf::from("README.md"),
            dist_dir: PathBuf::from("dist"),
            work_dir: PathBuf::from("build"),
            package_dir: PathBuf::from(".pipeline/package"),
            release_dir: PathBuf::from(".pipeline/release"),
            hidden_imports: [
                "pdfplumber",
                "pandas",
                "tkinter",
                "tkinter.ttk",
                "tkinter.filedialog",
                "tkinter.messagebox",
                "csv",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            collect_all: vec!["pdfminer".to_string(), "cryptography".to_string()],
            extra_pyinstaller_args: Vec::new(),
            retention_days: 30,
            attachments: vec![
                "dist/**/extract_windows.exe".to_string(),
                "dist/**/extract_linux".to_string(),
            ],
            strict_attachments: false,
            generate_release_notes: true,
            release_template: None,
            matrix: BuildMatrix::default(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration for a project.
    ///
    /// An explicit path must exist. Without one, `<project>/pipeline.toml`
    /// is used when present and defaults otherwise.
    pub fn load(explicit: Option<&Path>, project_dir: &Path) -> Result<Self> {
        let path = match explicit {
            Some(path) => {
                if !path.is_file() {
                    return Err(ReleaseError::Cli(CliError::InvalidConfig {
                        path: path.to_path_buf(),
                        reason: "file does not exist".to_string(),
                    }));
                }
                path.to_path_buf()
            }
            None => {
                let candidate = project_dir.join(CONFIG_FILE_NAME);
                if !candidate.is_file() {
                    log::debug!("No {} in {}, using defaults", CONFIG_FILE_NAME, project_dir.display());
                    return Ok(Self::default());
                }
                candidate
            }
        };

        let content = std::fs::read_to_string(&path)?;
        let config = Self::from_toml_str(&content).map_err(|e| {
            ReleaseError::Cli(CliError::InvalidConfig {
                path: path.clone(),
                reason: e.to_string(),
            })
        })?;
        log::info!("Loaded pipeline configuration from {}", path.display());
        Ok(config)
    }

    /// Parse and validate configuration text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: PipelineConfig = toml::from_str(content)?;
        config.validate().map_err(|reason| {
            ReleaseError::Cli(CliError::InvalidArguments { reason })
        })?;
        Ok(config)
    }

    /// Check cross-field invariants
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.main_branch.trim().is_empty() {
            return Err("main_branch must not be empty".to_string());
        }
        if self.retention_days == 0 {
            return Err("retention_days must be at least 1".to_string());
        }
        if self.attachments.is_empty() {
            return Err("attachments must list at least one pattern".to_string());
        }
        // Both directories are erased before use
        for (key, dir) in [("package_dir", &self.package_dir), ("release_dir", &self.release_dir)] {
            if !dir.is_absolute() && !is_below_project(dir) {
                return Err(format!(
                    "{} must be a subdirectory of the project, got '{}'",
                    key,
                    dir.display()
                ));
            }
        }
        self.matrix.validate()
    }

    /// Resolve a configured path against the project directory
    pub fn resolve(&self, project_dir: &Path, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            project_dir.join(path)
        }
    }

    /// Resolve a directory that gets erased, refusing the project itself or any ancestor
    pub fn scratch_dir(&self, project_dir: &Path, path: &Path) -> Result<PathBuf> {
        let resolved = self.resolve(project_dir, path);
        if project_dir.starts_with(&resolved) || (!path.is_absolute() && !is_below_project(path)) {
            return Err(ReleaseError::Cli(CliError::InvalidArguments {
                reason: format!(
                    "refusing to erase {}, it contains the project {}",
                    resolved.display(),
                    project_dir.display()
                ),
            }));
        }
        Ok(resolved)
    }
}

/// Whether a relative path names a directory strictly inside the project
fn is_below_project(path: &Path) -> bool {
    let mut depth = 0i32;
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            Component::Normal(_) => depth += 1,
            Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    depth > 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::Platform;

    #[test]
    fn rejects_workspace_at_or_above_project() {
        for value in [".", "", "./", "..", "a/../..", "build/.."] {
            let toml = format!("release_dir = \"{}\"", value);
            assert!(PipelineConfig::from_toml_str(&toml).is_err(), "accepted '{}'", value);
        }
        assert!(PipelineConfig::from_toml_str("package_dir = \".\"").is_err());
        assert!(PipelineConfig::from_toml_str("release_dir = \"out/release\"").is_ok());
    }

    #[test]
    fn scratch_dir_refuses_project_ancestors() {
        let config = PipelineConfig::default();
        let project = Path::new("/work/repo");
        assert!(config.scratch_dir(project, Path::new("/work")).is_err());
        assert!(config.scratch_dir(project, Path::new("/work/repo")).is_err());
        assert_eq!(
            config.scratch_dir(project, Path::new(".pipeline/release")).unwrap(),
            project.join(".pipeline/release")
        );
    }

    #[test]
    fn defaults_match_pipeline_contract() {
        let config = PipelineConfig::default();
        assert_eq!(config.main_branch, "main");
        assert_eq!(config.python_version, "3.9");
        assert_eq!(config.retention_days, 30);
        assert_eq!(config.collect_all, vec!["pdfminer", "cryptography"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = PipelineConfig::from_toml_str(
            r#"
            retention_days = 7
            strict_attachments = true

            [[matrix]]
            platform = "linux"
            executable_name = "extract_linux"
            artifact_name = "pdf_to_table_linux"
            "#,
        )
        .unwrap();

        assert_eq!(config.retention_days, 7);
        assert!(config.strict_attachments);
        assert_eq!(config.matrix.platforms(), vec![Platform::Linux]);
        assert!(config.matrix.jobs()[0].setup.is_empty());
        assert_eq!(config.entry_script, PathBuf::from("extract.py"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(PipelineConfig::from_toml_str("retention = 3").is_err());
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(PipelineConfig::load(Some(&missing), dir.path()).is_err());
        assert!(PipelineConfig::load(None, dir.path()).is_ok());
    }
}
