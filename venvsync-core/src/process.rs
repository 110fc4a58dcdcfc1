//! Running external programs (the interpreter, pip).
//!
//! Everything that needs a child process receives a [`CommandRunner`] instead
//! of calling `std::process::Command` directly, so tests can substitute a fake.

use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use std::process::{Command, Stdio};

use crate::error::ProcessError;

/// A program plus arguments, ready to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Shell-like rendering for log lines.
    pub fn display(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().map(|a| a.to_string_lossy().into_owned()));
        parts.join(" ")
    }
}

/// Captured output of a successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Runs an [`Invocation`] to completion.
///
/// Implementations return `Err(ProcessError::Failed)` for a non-zero exit, so
/// callers only ever see output from runs that succeeded.
pub trait CommandRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput, ProcessError>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput, ProcessError> {
        (**self).run(invocation)
    }
}

/// [`CommandRunner`] backed by `std::process::Command`.
///
/// Blocks until the child exits; no timeout is applied.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput, ProcessError> {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        tracing::debug!("running: {}", invocation.display());
        let output = cmd.output().map_err(|source| ProcessError::Spawn {
            program: invocation.program.clone(),
            source,
        })?;

        let code = output.status.code();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::debug!("{} failed with {:?}", invocation.display(), code);
            return Err(ProcessError::Failed {
                program: invocation.program.clone(),
                code,
                stderr,
            });
        }

        Ok(CommandOutput {
            code,
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}
