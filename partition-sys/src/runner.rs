//! Command execution boundary
//!
//! Every external tool invocation in this crate goes through the
//! [`CommandRunner`] trait so that parsing and planning logic can be tested
//! against scripted output instead of real devices.

use std::io::Write;
use std::process::{Command, Output, Stdio};

use tracing::debug;

use crate::error::{Result, SysError};

/// Captured output of a successfully exited command
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs external commands and captures their output.
///
/// A non-zero exit status is reported as [`SysError::CommandFailed`]; a
/// command that could not be started at all as [`SysError::SpawnFailed`].
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput>;

    fn run_with_stdin(&self, program: &str, args: &[&str], stdin: &str) -> Result<CommandOutput>;
}

/// Human-readable command line used in logs and error context
pub fn render(program: &str, args: &[&str]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

/// [`CommandRunner`] backed by `std::process::Command`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        let rendered = render(program, args);
        debug!(command = rendered.as_str(), "running");

        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|source| SysError::SpawnFailed {
                command: rendered.clone(),
                source,
            })?;

        finish(rendered, output)
    }

    fn run_with_stdin(&self, program: &str, args: &[&str], stdin: &str) -> Result<CommandOutput> {
        let rendered = render(program, args);
        debug!(command = rendered.as_str(), "running with piped stdin");

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| SysError::SpawnFailed {
                command: rendered.clone(),
                source,
            })?;

        if let Some(mut handle) = child.stdin.take() {
            handle.write_all(stdin.as_bytes())?;
        }

        let output = child.wait_with_output()?;
        finish(rendered, output)
    }
}

fn finish(command: String, output: Output) -> Result<CommandOutput> {
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    if !output.status.success() {
        return Err(SysError::CommandFailed {
            command,
            status: output.status.code().unwrap_or(-1),
            stderr,
        });
    }

    Ok(CommandOutput { stdout, stderr })
}
