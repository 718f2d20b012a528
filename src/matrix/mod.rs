//! Build matrix: the platforms the pipeline packages for.
//!
//! Each [`BuildJob`] describes one platform entry. Jobs are independent and
//! share nothing but the artifact store.

use crate::error::{CliError, ReleaseError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Target operating system of a build job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Windows, producing a `.exe`
    Windows,
    /// Linux, producing an ELF binary
    Linux,
}

impl Platform {
    /// All platforms in matrix order
    pub const ALL: [Platform; 2] = [Platform::Windows, Platform::Linux];

    /// Lowercase identifier used in file names and flags
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Windows => "windows",
            Platform::Linux => "linux",
        }
    }

    /// Human readable name used in generated documents
    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::Windows => "Windows",
            Platform::Linux => "Linux",
        }
    }

    /// Hosted runner label this job would run on in CI
    pub fn runner_label(&self) -> &'static str {
        match self {
            Platform::Windows => "windows-latest",
            Platform::Linux => "ubuntu-latest",
        }
    }

    /// Platform this binary was compiled for, if it is one the matrix knows
    ///
    /// `std::env::consts::OS` is fixed at compile time.
    pub fn host() -> Option<Platform> {
        match std::env::consts::OS {
            "windows" => Some(Platform::Windows),
            "linux" => Some(Platform::Linux),
            _ => None,
        }
    }

    /// Whether this host can build the platform natively
    pub fn is_host(&self) -> bool {
        Platform::host() == Some(*self)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "windows" | "win" => Ok(Platform::Windows),
            "linux" => Ok(Platform::Linux),
            other => Err(format!(
                "Unknown platform '{}'. Expected one of: windows, linux",
                other
            )),
        }
    }
}

/// A named command run while provisioning a job's environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupStep {
    /// Label shown in logs
    pub name: String,
    /// Program to run. `{python}` is replaced with the resolved interpreter
    pub program: String,
    /// Arguments. `{python}` is replaced with the resolved interpreter
    #[serde(default)]
    pub args: Vec<String>,
}

impl SetupStep {
    /// Create a setup step
    pub fn new(name: &str, program: &str, args: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// OS-specific native prerequisites for a platform
    pub fn defaults_for(platform: Platform) -> Vec<SetupStep> {
        match platform {
            Platform::Linux => vec![
                SetupStep::new("Update apt index", "sudo", &["apt-get", "update"]),
                SetupStep::new(
                    "Install Tk build prerequisites",
                    "sudo",
                    &["apt-get", "install", "-y", "python3-tk", "tk-dev"],
                ),
            ],
            Platform::Windows => vec![SetupStep::new(
                "Install wheel and setuptools",
                "{python}",
                &["-m", "pip", "install", "--upgrade", "wheel", "setuptools"],
            )],
        }
    }
}

/// One matrix entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildJob {
    /// Target platform
    pub platform: Platform,
    /// File name of the produced executable
    pub executable_name: String,
    /// Name the distribution package is uploaded under
    pub artifact_name: String,
    /// Native prerequisites installed before the Python dependencies
    #[serde(default)]
    pub setup: Vec<SetupStep>,
}

impl BuildJob {
    /// Default job for a platform
    pub fn default_for(platform: Platform) -> Self {
        let executable_name = match platform {
            Platform::Windows => "extract_windows.exe",
            Platform::Linux => "extract_linux",
        };
        Self {
            platform,
            executable_name: executable_name.to_string(),
            artifact_name: format!("pdf_to_table_{}", platform.as_str()),
            setup: SetupStep::defaults_for(platform),
        }
    }

    /// Name passed to the packaging tool (`--name`)
    ///
    /// PyInstaller appends `.exe` itself on Windows.
    pub fn output_name(&self) -> &str {
        self.executable_name
            .strip_suffix(".exe")
            .unwrap_or(&self.executable_name)
    }
}

/// Ordered set of build jobs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildMatrix {
    jobs: Vec<BuildJob>,
}

impl Default for BuildMatrix {
    fn default() -> Self {
        Self {
            jobs: Platform::ALL.into_iter().map(BuildJob::default_for).collect(),
        }
    }
}

impl BuildMatrix {
    /// Create a matrix from explicit jobs
    pub fn new(jobs: Vec<BuildJob>) -> Self {
        Self { jobs }
    }

    /// Jobs in matrix order
    pub fn jobs(&self) -> &[BuildJob] {
        &self.jobs
    }

    /// Platforms in matrix order
    pub fn platforms(&self) -> Vec<Platform> {
        self.jobs.iter().map(|j| j.platform).collect()
    }

    /// Job for a platform
    pub fn job(&self, platform: Platform) -> Option<&BuildJob> {
        self.jobs.iter().find(|j| j.platform == platform)
    }

    /// Sub-matrix restricted to the given platforms, in matrix order
    pub fn select(&self, platforms: &[Platform]) -> Result<BuildMatrix> {
        for platform in platforms {
            if self.job(*platform).is_none() {
                return Err(ReleaseError::Cli(CliError::InvalidArguments {
                    reason: format!("Platform '{}' is not part of the build matrix", platform),
                }));
            }
        }
        Ok(BuildMatrix {
            jobs: self
                .jobs
                .iter()
                .filter(|j| platforms.contains(&j.platform))
                .cloned()
                .collect(),
        })
    }

    /// Check matrix invariants
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.jobs.is_empty() {
            return Err("Build matrix is empty".to_string());
        }

        let mut platforms = HashSet::new();
        let mut executables = HashSet::new();
        let mut artifacts = HashSet::new();

        for job in &self.jobs {
            if !platforms.insert(job.platform) {
                return Err(format!("Platform '{}' appears twice in the matrix", job.platform));
            }
            if job.executable_name.trim().is_empty() {
                return Err(format!("Empty executable_name for '{}'", job.platform));
            }
            if job.artifact_name.trim().is_empty() {
                return Err(format!("Empty artifact_name for '{}'", job.platform));
            }
            if job.executable_name.contains(['/', '\\']) {
                return Err(format!(
                    "executable_name '{}' must be a file name",
                    job.executable_name
                ));
            }
            if !executables.insert(job.executable_name.as_str()) {
                return Err(format!("Duplicate executable_name '{}'", job.executable_name));
            }
            if !artifacts.insert(job.artifact_name.as_str()) {
                return Err(format!("Duplicate artifact_name '{}'", job.artifact_name));
            }
        }

        Ok(())
    }
}
