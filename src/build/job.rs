//! One matrix job: provision the environment, then package the entry script.

use super::pyinstaller::PyInstallerInvocation;
use super::runner::{CommandRunner, CommandSpec};
use crate::config::PipelineConfig;
use crate::error::{BuildError, Result};
use crate::matrix::{BuildJob, Platform};
use crate::utils::fs;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static PYTHON_VERSION: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"Python\s+(\d+\.\d+(?:\.\d+)?)").ok());

/// Interpreter selected for a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    /// Program used to invoke Python
    pub python: String,
    /// Reported version, e.g. `3.9.18`
    pub version: Option<String>,
}

/// Every command a job runs, in order
#[derive(Debug, Clone)]
pub struct BuildPlan {
    /// Environment provisioning commands
    pub setup: Vec<CommandSpec>,
    /// Packaging command
    pub package: CommandSpec,
    /// Where the packaging tool must leave the executable
    pub expected_output: PathBuf,
}

impl BuildPlan {
    /// Plan the commands of a job for a resolved interpreter
    pub fn new(job: &BuildJob, config: &PipelineConfig, project_dir: &Path, python: &str) -> Self {
        let label = format!("{}:setup", job.platform);
        let mut setup = vec![
            CommandSpec::new(label.clone(), python)
                .args(["-m", "pip", "install", "--upgrade", "pip"])
                .current_dir(project_dir),
        ];

        for step in &job.setup {
            setup.push(
                CommandSpec::new(format!("{}:{}", job.platform, step.name), substitute(&step.program, python))
                    .args(step.args.iter().map(|a| substitute(a, python)))
                    .current_dir(project_dir),
            );
        }

        let mut install = CommandSpec::new(label, python).args(["-m", "pip", "install"]);
        let requirements = config.resolve(project_dir, &config.requirements);
        if requirements.is_file() {
            install = install.arg("-r").arg(requirements.display().to_string());
        } else {
            log::warn!(
                "{} not found; installing the packaging tool only",
                requirements.display()
            );
        }
        setup.push(install.arg("pyinstaller").current_dir(project_dir));

        let invocation = PyInstallerInvocation::for_job(job, config, project_dir);
        let expected_output = invocation.dist_path.join(&job.executable_name);

        Self {
            setup,
            package: invocation.command(python, project_dir),
            expected_output,
        }
    }
}

fn substitute(value: &str, python: &str) -> String {
    value.replace("{python}", python)
}

/// Result of a successful build job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutput {
    /// Platform that was built
    pub platform: Platform,
    /// Path of the produced executable
    pub executable: PathBuf,
}

fn python_candidates(config: &PipelineConfig) -> Vec<&str> {
    match &config.python {
        Some(python) => vec![python.as_str()],
        None => vec!["python3", "python"],
    }
}

/// First interpreter candidate the runner can locate
pub fn locate_python<R: CommandRunner>(runner: &R, config: &PipelineConfig) -> Result<String> {
    let candidates = python_candidates(config);
    candidates
        .iter()
        .find_map(|c| runner.resolve_program(c))
        .ok_or_else(|| {
            BuildError::InterpreterNotFound {
                program: candidates.join(" or "),
            }
            .into()
        })
}

/// Locate the interpreter and check its version
pub async fn resolve_toolchain<R: CommandRunner>(
    runner: &R,
    config: &PipelineConfig,
) -> Result<Toolchain> {
    let python = locate_python(runner, config)?;

    let output = runner
        .run(&CommandSpec::new("python:version", python.clone()).arg("--version"))
        .await?;

    // Python 2 and early 3.x print the version on stderr
    let text = format!("{}{}", output.stdout, output.stderr);
    let version = PYTHON_VERSION
        .as_ref()
        .and_then(|re| re.captures(&text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string());

    match &version {
        Some(v) if version_matches(v, &config.python_version) => {
            log::info!("Using Python {} at {}", v, python);
        }
        Some(v) => {
            log::warn!(
                "Python {} at {} does not match the expected runtime {}",
                v,
                python,
                config.python_version
            );
        }
        None => {
            log::warn!("Could not determine the version of {}", python);
        }
    }

    Ok(Toolchain { python, version })
}

fn version_matches(actual: &str, expected: &str) -> bool {
    actual == expected || actual.starts_with(&format!("{}.", expected))
}

/// Install the language tooling, native prerequisites and dependencies
pub async fn provision<R: CommandRunner>(runner: &R, plan: &BuildPlan) -> Result<()> {
    for command in &plan.setup {
        let output = runner.run(command).await?;
        if !output.success() {
            log::error!("Setup step '{}' failed: {}", command.display(), output.stderr_tail(5));
            return Err(BuildError::SetupFailed {
                step: command.display(),
                code: output.code,
                stderr: output.stderr_tail(20),
            }
            .into());
        }
    }
    Ok(())
}

/// Run the packaging tool and verify the declared executable exists
pub async fn package_executable<R: CommandRunner>(
    runner: &R,
    job: &BuildJob,
    plan: &BuildPlan,
) -> Result<PathBuf> {
    // A leftover from an earlier run must not pass the output check
    fs::remove_file(&plan.expected_output).await?;

    let output = runner.run(&plan.package).await?;
    if !output.success() {
        log::error!("PyInstaller failed for {}: {}", job.platform, output.stderr_tail(5));
        return Err(BuildError::PackagingFailed {
            platform: job.platform.to_string(),
            code: output.code,
            stderr: output.stderr_tail(20),
        }
        .into());
    }

    if !plan.expected_output.is_file() {
        log::error!(
            "Executable {} not found at {}",
            job.executable_name,
            plan.expected_output.display()
        );
        return Err(BuildError::ExecutableNotFound {
            name: job.executable_name.clone(),
            path: plan.expected_output.clone(),
        }
        .into());
    }

    log::info!("Built {}", plan.expected_output.display());
    Ok(plan.expected_output.clone())
}

/// Provision and package one matrix job
pub async fn run_build_job<R: CommandRunner>(
    runner: &R,
    job: &BuildJob,
    config: &PipelineConfig,
    project_dir: &Path,
) -> Result<BuildOutput> {
    let script = config.resolve(project_dir, &config.entry_script);
    if !script.is_file() {
        return Err(BuildError::EntryScriptMissing { path: script }.into());
    }

    let toolchain = resolve_toolchain(runner, config).await?;
    let plan = BuildPlan::new(job, config, project_dir, &toolchain.python);

    provision(runner, &plan).await?;
    let executable = package_executable(runner, job, &plan).await?;

    Ok(BuildOutput {
        platform: job.platform,
        executable,
    })
}
