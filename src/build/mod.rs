//! Matrix build runner.
//!
//! Turns the Python entry script into a single-file executable for one
//! platform: locate the interpreter, install the installer, native
//! prerequisites and declared dependencies, run PyInstaller, and check the
//! declared executable was actually produced.

mod job;
mod pyinstaller;
mod runner;

pub use job::{
    BuildOutput, BuildPlan, Toolchain, locate_python, package_executable, provision,
    resolve_toolchain, run_build_job,
};
pub use pyinstaller::PyInstallerInvocation;
pub use runner::{CommandOutput, CommandRunner, CommandSpec, SystemRunner};
