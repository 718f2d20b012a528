//! PyInstaller command line construction.

use super::runner::CommandSpec;
use crate::config::PipelineConfig;
use crate::matrix::BuildJob;
use std::path::{Path, PathBuf};

/// Arguments for one single-file PyInstaller run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PyInstallerInvocation {
    /// Entry script
    pub script: PathBuf,
    /// Output name, without `.exe`
    pub name: String,
    /// `--hidden-import` hints
    pub hidden_imports: Vec<String>,
    /// Packages collected wholesale with `--collect-all`
    pub collect_all: Vec<String>,
    /// Output directory
    pub dist_path: PathBuf,
    /// Scratch directory, also used for the generated `.spec`
    pub work_path: PathBuf,
    /// Raw arguments appended before the script
    pub extra_args: Vec<String>,
}

impl PyInstallerInvocation {
    /// Invocation for a matrix job
    pub fn for_job(job: &BuildJob, config: &PipelineConfig, project_dir: &Path) -> Self {
        Self {
            script: config.resolve(project_dir, &config.entry_script),
            name: job.output_name().to_string(),
            hidden_imports: config.hidden_imports.clone(),
            collect_all: config.collect_all.clone(),
            dist_path: config.resolve(project_dir, &config.dist_dir),
            work_path: config
                .resolve(project_dir, &config.work_dir)
                .join(job.platform.as_str()),
            extra_args: config.extra_pyinstaller_args.clone(),
        }
    }

    /// PyInstaller arguments, in a stable order
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "--onefile".to_string(),
            "--noconfirm".to_string(),
            "--clean".to_string(),
            "--name".to_string(),
            self.name.clone(),
            "--distpath".to_string(),
            self.dist_path.display().to_string(),
            "--workpath".to_string(),
            self.work_path.display().to_string(),
            "--specpath".to_string(),
            self.work_path.display().to_string(),
        ];

        for module in &self.hidden_imports {
            args.push("--hidden-import".to_string());
            args.push(module.clone());
        }
        for package in &self.collect_all {
            args.push("--collect-all".to_string());
            args.push(package.clone());
        }

        args.extend(self.extra_args.iter().cloned());
        args.push(self.script.display().to_string());
        args
    }

    /// Command running PyInstaller through the given interpreter
    pub fn command(&self, python: &str, project_dir: &Path) -> CommandSpec {
        CommandSpec::new("pyinstaller", python)
            .args(["-m", "PyInstaller"])
            .args(self.args())
            .current_dir(project_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::Platform;

    #[test]
    fn windows_invocation_uses_stem_and_collects_packages() {
        let config = PipelineConfig::default();
        let job = BuildJob::default_for(Platform::Windows);
        let project = Path::new("/work/project");
        let inv = PyInstallerInvocation::for_job(&job, &config, project);
        let cmd = inv.command("python", project);

        assert_eq!(cmd.program, "python");
        assert_eq!(&cmd.args[..2], ["-m", "PyInstaller"]);
        assert!(cmd.args.contains(&"--onefile".to_string()));
        assert_eq!(cmd.flag_value("--name"), Some("extract_windows"));
        assert_eq!(
            cmd.args.last().map(String::as_str),
            Some(Path::new("/work/project/extract.py").to_str().unwrap())
        );

        let collected: Vec<&str> = cmd
            .args
            .windows(2)
            .filter(|w| w[0] == "--collect-all")
            .map(|w| w[1].as_str())
            .collect();
        assert_eq!(collected, vec!["pdfminer", "cryptography"]);

        let hidden = cmd.args.iter().filter(|a| *a == "--hidden-import").count();
        assert_eq!(hidden, config.hidden_imports.len());
    }

    #[test]
    fn work_path_is_per_platform() {
        let config = PipelineConfig::default();
        let project = Path::new("/p");
        let linux = PyInstallerInvocation::for_job(
            &BuildJob::default_for(Platform::Linux),
            &config,
            project,
        );
        let windows = PyInstallerInvocation::for_job(
            &BuildJob::default_for(Platform::Windows),
            &config,
            project,
        );
        assert_ne!(linux.work_path, windows.work_path);
        assert_eq!(linux.dist_path, windows.dist_path);
    }
}
