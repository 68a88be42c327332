//! Subprocess execution seam
//!
//! Fingerprinting runs the compiler and the tool's `--dump-config`; the runner
//! executes the real tool on a miss. Both go through [`CommandRunner`] so tests
//! can substitute a scripted implementation.

use crate::{Error, Result};
use std::process::{Command, Stdio};

/// Captured result of a finished subprocess.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when the process was terminated by a signal
    pub code: Option<i32>,
    /// Captured standard output
    pub stdout: Vec<u8>,
    /// Captured standard error
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    /// Whether the process exited with status zero.
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.code, Some(0))
    }
}

/// Runs a command line to completion and captures its output.
pub trait CommandRunner: Send + Sync {
    /// Run `argv[0]` with the remaining elements as arguments.
    ///
    /// # Errors
    ///
    /// Returns an error if the process could not be spawned.
    fn run(&self, argv: &[String]) -> Result<CommandOutput>;
}

/// [`CommandRunner`] backed by [`std::process::Command`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, argv: &[String]) -> Result<CommandOutput> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| Error::invocation("empty command line"))?;

        tracing::debug!(command = %argv.join(" "), "Running command");

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::inherit())
            .output()
            .map_err(|e| Error::io(e, program, "spawn"))?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}
