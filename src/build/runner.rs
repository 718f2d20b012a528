//! Process execution for build steps.

use crate::error::{BuildError, Result};
use std::future::Future;
use std::path::{Path, PathBuf};

/// A command line to execute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Label shown in logs and errors
    pub label: String,
    /// Program to run
    pub program: String,
    /// Arguments
    pub args: Vec<String>,
    /// Working directory
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    /// Create a command with no arguments
    pub fn new(label: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory
    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.cwd = Some(dir.to_path_buf());
        self
    }

    /// Value following `flag` in the argument list
    pub fn flag_value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    /// Shell-like rendering for logs
    pub fn display(&self) -> String {
        let mut line = quote(&self.program);
        for arg in &self.args {
            line.push(' ');
            line.push_str(&quote(arg));
        }
        line
    }
}

fn quote(s: &str) -> String {
    if s.is_empty() || s.contains(char::is_whitespace) {
        format!("\"{}\"", s)
    } else {
        s.to_string()
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when killed by a signal
    pub code: Option<i32>,
    /// Captured stdout
    pub stdout: String,
    /// Captured stderr
    pub stderr: String,
}

impl CommandOutput {
    /// Successful output with the given stdout
    pub fn success_with(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed output with the given exit code and stderr
    pub fn failure(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Whether the command exited with status 0
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Last lines of stderr, for error messages
    pub fn stderr_tail(&self, lines: usize) -> String {
        let all: Vec<&str> = self.stderr.lines().collect();
        let start = all.len().saturating_sub(lines);
        all[start..].join("\n")
    }
}

/// Executes build commands.
///
/// Spawning a job onto the runtime requires the returned futures to be `Send`.
pub trait CommandRunner: Send + Sync {
    /// Run a command to completion and capture its output
    fn run(&self, command: &CommandSpec) -> impl Future<Output = Result<CommandOutput>> + Send;

    /// Locate a program, returning the path or name to invoke it with
    fn resolve_program(&self, program: &str) -> Option<String> {
        which::which(program)
            .ok()
            .map(|path| path.to_string_lossy().into_owned())
    }
}

/// Runs commands as child processes of this one
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    async fn run(&self, command: &CommandSpec) -> Result<CommandOutput> {
        log::info!("[{}] $ {}", command.label, command.display());

        let mut cmd = tokio::process::Command::new(&command.program);
        cmd.args(&command.args).kill_on_drop(true);
        if let Some(dir) = &command.cwd {
            cmd.current_dir(dir);
        }

        let output = cmd.output().await.map_err(|e| BuildError::SpawnFailed {
            command: command.display(),
            reason: e.to_string(),
        })?;

        let result = CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        for line in result.stdout.lines() {
            log::debug!("[{}] {}", command.label, line);
        }
        for line in result.stderr.lines() {
            log::debug!("[{}] stderr: {}", command.label, line);
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_quotes_arguments_with_spaces() {
        let cmd = CommandSpec::new("test", "python")
            .args(["-m", "pip"])
            .arg("a b");
        assert_eq!(cmd.display(), "python -m pip \"a b\"");
        assert_eq!(cmd.flag_value("-m"), Some("pip"));
        assert_eq!(cmd.flag_value("--name"), None);
    }

    #[test]
    fn stderr_tail_keeps_last_lines() {
        let out = CommandOutput::failure(1, "one\ntwo\nthree");
        assert_eq!(out.stderr_tail(2), "two\nthree");
        assert!(!out.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn system_runner_captures_exit_code() {
        let ok = SystemRunner
            .run(&CommandSpec::new("echo", "sh").args(["-c", "echo hi"]))
            .await
            .unwrap();
        assert!(ok.success());
        assert_eq!(ok.stdout.trim(), "hi");

        let failed = SystemRunner
            .run(&CommandSpec::new("fail", "sh").args(["-c", "exit 3"]))
            .await
            .unwrap();
        assert_eq!(failed.code, Some(3));
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let err = SystemRunner
            .run(&CommandSpec::new("missing", "definitely-not-a-real-program-xyz"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to run"));
    }
}
