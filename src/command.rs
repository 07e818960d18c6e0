//! External Command Runner
//!
//! Trait-based abstraction over vendor tool invocations for testability.
//! The real implementation spawns processes, the mock returns scripted output
//! and records every invocation so callers can assert on ordering.
//!
//! ## Failure model
//!
//! A program that cannot be launched is never an error here: it degrades to
//! `CommandOutcome::Unavailable`. A non-zero exit code is data, returned inside
//! `CommandOutcome::Completed` for the caller to interpret.

use std::ffi::OsString;
use std::process::Command;
use std::sync::{Arc, Mutex};
use tracing::{error, info};

/// A single program invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// When set, the child environment is replaced by exactly these variables.
    /// Kept as `OsString` so non-UTF-8 values pass through untouched.
    pub env: Option<Vec<(OsString, OsString)>>,
}

impl Invocation {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            env: None,
        }
    }

    /// Build from an argv vector (`argv[0]` is the program)
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self::new(program.clone(), args.iter().cloned()))
    }

    pub fn with_env<I, K, V>(mut self, env: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<OsString>,
        V: Into<OsString>,
    {
        self.env = Some(env.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        self
    }

    /// The full command line, space-joined, for logs and diagnostics
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of a process that ran to completion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Process exit code, `-1` when terminated by a signal
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Completed(CommandOutput),
    /// The program could not be located or launched
    Unavailable,
}

impl CommandOutcome {
    /// The captured output, only if the process exited with code 0
    pub fn success_output(&self) -> Option<&CommandOutput> {
        match self {
            CommandOutcome::Completed(output) if output.success() => Some(output),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.success_output().is_some()
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, CommandOutcome::Unavailable)
    }
}

/// Command runner trait
pub trait CommandRunner: Send + Sync {
    /// Execute an invocation synchronously. Must never panic on launch failure.
    fn execute(&self, invocation: &Invocation) -> CommandOutcome;

    /// Convenience wrapper for argument slices
    fn run(&self, program: &str, args: &[&str]) -> CommandOutcome {
        self.execute(&Invocation::new(program, args.iter().copied()))
    }
}

/// Real runner executing processes with `std::process::Command`
pub struct ShellCommandRunner;

impl ShellCommandRunner {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ShellCommandRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner for ShellCommandRunner {
    fn execute(&self, invocation: &Invocation) -> CommandOutcome {
        let command_line = invocation.command_line();
        info!("Executing command: {}", command_line);

        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args);
        if let Some(env) = &invocation.env {
            cmd.env_clear().envs(env.iter().cloned());
        }

        match cmd.output() {
            Ok(output) => {
                let result = CommandOutput {
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    exit_code: output.status.code().unwrap_or(-1),
                };
                if !result.success() {
                    error!("Command failed with exit code {}", result.exit_code);
                    error!("Stderr: {}", result.stderr.trim());
                    error!("Stdout: {}", result.stdout.trim());
                }
                CommandOutcome::Completed(result)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                error!(
                    "Command not found: {}. Please ensure it is installed and in your PATH.",
                    invocation.program
                );
                CommandOutcome::Unavailable
            }
            Err(e) => {
                error!(
                    "An unexpected error occurred while running command: {}. Error: {}",
                    command_line, e
                );
                CommandOutcome::Unavailable
            }
        }
    }
}

/// Scripted response for the mock runner
#[derive(Debug, Clone)]
pub enum MockResponse {
    Output(CommandOutput),
    Unavailable,
    /// Panic inside `execute`, simulating an unexpected fault mid-operation
    Panic,
}

/// Mock command runner for testing
///
/// Rules are matched in registration order against the full command line
/// (substring match). Programs not removed with `without` and not matched by
/// any rule succeed with empty output.
#[derive(Debug, Default)]
pub struct MockCommandRunner {
    missing: Vec<String>,
    rules: Vec<(String, MockResponse)>,
    calls: Mutex<Vec<Invocation>>,
}

impl MockCommandRunner {
    /// Every program is present and exits 0 with empty output
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat `program` as not installed
    pub fn without(mut self, program: &str) -> Self {
        self.missing.push(program.to_string());
        self
    }

    /// Return `stdout` with exit code 0 for command lines containing `pattern`
    pub fn with_output(self, pattern: &str, stdout: &str) -> Self {
        self.with_response(
            pattern,
            MockResponse::Output(CommandOutput {
                stdout: stdout.to_string(),
                stderr: String::new(),
                exit_code: 0,
            }),
        )
    }

    /// Exit with `exit_code` and `stderr` for command lines containing `pattern`
    pub fn with_failure(self, pattern: &str, exit_code: i32, stderr: &str) -> Self {
        self.with_response(
            pattern,
            MockResponse::Output(CommandOutput {
                stdout: String::new(),
                stderr: stderr.to_string(),
                exit_code,
            }),
        )
    }

    pub fn with_response(mut self, pattern: &str, response: MockResponse) -> Self {
        self.rules.push((pattern.to_string(), response));
        self
    }

    /// All invocations seen so far, in order
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Command lines seen so far, in order
    pub fn command_lines(&self) -> Vec<String> {
        self.calls().iter().map(Invocation::command_line).collect()
    }

    /// Number of invocations whose command line contains `pattern`
    pub fn count_matching(&self, pattern: &str) -> usize {
        self.command_lines()
            .iter()
            .filter(|line| line.contains(pattern))
            .count()
    }

    fn record(&self, invocation: &Invocation) {
        let mut calls = match self.calls.lock() {
            Ok(calls) => calls,
            Err(poisoned) => poisoned.into_inner(),
        };
        calls.push(invocation.clone());
    }
}

impl CommandRunner for MockCommandRunner {
    fn execute(&self, invocation: &Invocation) -> CommandOutcome {
        // Recorded before any scripted panic so the lock is never held while unwinding
        self.record(invocation);

        if self.missing.contains(&invocation.program) {
            return CommandOutcome::Unavailable;
        }

        let command_line = invocation.command_line();
        let response = self
            .rules
            .iter()
            .find(|(pattern, _)| command_line.contains(pattern.as_str()))
            .map(|(_, response)| response.clone());

        match response {
            Some(MockResponse::Output(output)) => CommandOutcome::Completed(output),
            Some(MockResponse::Unavailable) => CommandOutcome::Unavailable,
            Some(MockResponse::Panic) => panic!("mock fault while running: {}", command_line),
            None => CommandOutcome::Completed(CommandOutput::default()),
        }
    }
}

/// Shared runner type for use across modules
pub type SharedCommandRunner = Arc<dyn CommandRunner>;

/// Create a shared real command runner
pub fn create_real_runner() -> SharedCommandRunner {
    Arc::new(ShellCommandRunner::new())
}
