//! Scripted command runner

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use partition_sys::{CommandOutput, CommandRunner, SysError, render};

/// Canned outcome for one command invocation
#[derive(Clone, Debug, Default)]
pub struct ScriptedResult {
    pub stdout: String,
    pub stderr: String,
    pub status: i32,
}

/// One recorded call
#[derive(Clone, Debug)]
pub struct Invocation {
    /// Rendered command line, program and arguments space-joined
    pub command: String,

    /// Piped input, when the call used stdin
    pub stdin: Option<String>,
}

/// Command runner driven by per-command queues of scripted results.
///
/// Queued results are consumed in FIFO order, and the last one repeats for
/// any further calls to the same command line. A command nothing was queued
/// for succeeds with empty output.
#[derive(Default)]
pub struct ScriptedRunner {
    scripts: Mutex<HashMap<String, VecDeque<ScriptedResult>>>,
    invocations: Mutex<Vec<Invocation>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, command: &str, result: ScriptedResult) {
        self.scripts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(command.to_string())
            .or_default()
            .push_back(result);
    }

    pub fn enqueue_success(&self, command: &str, stdout: &str) {
        self.enqueue(
            command,
            ScriptedResult {
                stdout: stdout.to_string(),
                ..ScriptedResult::default()
            },
        );
    }

    pub fn enqueue_failure(&self, command: &str, status: i32, stderr: &str) {
        self.enqueue(
            command,
            ScriptedResult {
                stderr: stderr.to_string(),
                status,
                ..ScriptedResult::default()
            },
        );
    }

    /// Every call made so far, in order
    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Rendered command lines, in call order
    pub fn commands(&self) -> Vec<String> {
        self.invocations()
            .into_iter()
            .map(|invocation| invocation.command)
            .collect()
    }

    fn record(&self, command: String, stdin: Option<String>) -> ScriptedResult {
        let result = self.next_result(&command);
        self.invocations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(Invocation { command, stdin });
        result
    }

    fn next_result(&self, command: &str) -> ScriptedResult {
        let mut scripts = self
            .scripts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match scripts.get_mut(command) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_default(),
            Some(queue) => queue.front().cloned().unwrap_or_default(),
            None => ScriptedResult::default(),
        }
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, SysError> {
        let command = render(program, args);
        let result = self.record(command.clone(), None);
        finish(command, result)
    }

    fn run_with_stdin(
        &self,
        program: &str,
        args: &[&str],
        stdin: &str,
    ) -> Result<CommandOutput, SysError> {
        let command = render(program, args);
        let result = self.record(command.clone(), Some(stdin.to_string()));
        finish(command, result)
    }
}

fn finish(command: String, result: ScriptedResult) -> Result<CommandOutput, SysError> {
    if result.status != 0 {
        return Err(SysError::CommandFailed {
            command,
            status: result.status,
            stderr: result.stderr,
        });
    }
    Ok(CommandOutput {
        stdout: result.stdout,
        stderr: result.stderr,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_commands_succeed_with_empty_output() {
        let runner = ScriptedRunner::new();
        let output = runner.run("true", &[]).unwrap();
        assert_eq!(output.stdout, "");
        assert_eq!(runner.commands(), vec!["true"]);
    }

    #[test]
    fn queued_results_pop_in_order_and_the_last_sticks() {
        let runner = ScriptedRunner::new();
        runner.enqueue_success("probe", "first");
        runner.enqueue_success("probe", "second");

        assert_eq!(runner.run("probe", &[]).unwrap().stdout, "first");
        assert_eq!(runner.run("probe", &[]).unwrap().stdout, "second");
        assert_eq!(runner.run("probe", &[]).unwrap().stdout, "second");
    }

    #[test]
    fn nonzero_status_maps_to_a_command_failure() {
        let runner = ScriptedRunner::new();
        runner.enqueue_failure("mkfs -t ext4", 2, "boom");

        let error = runner.run("mkfs", &["-t", "ext4"]).unwrap_err();
        match error {
            SysError::CommandFailed {
                command,
                status,
                stderr,
            } => {
                assert_eq!(command, "mkfs -t ext4");
                assert_eq!(status, 2);
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn stdin_is_recorded_alongside_the_command() {
        let runner = ScriptedRunner::new();
        runner
            .run_with_stdin("sfdisk", &["-uM", "/dev/sda"], ",,L\n")
            .unwrap();

        let invocations = runner.invocations();
        assert_eq!(invocations.len(), 1);
        assert_eq!(invocations[0].command, "sfdisk -uM /dev/sda");
        assert_eq!(invocations[0].stdin.as_deref(), Some(",,L\n"));
    }
}
