//! Privileged command execution
//!
//! Runs a mutating command as root through `pkexec` and the wrapper script,
//! bracketed by an X server access grant:
//!
//! ```text
//! Resolving -> Granting -> Executing -> Revoking -> Done
//! ```
//!
//! Resolution failures return before anything is granted. Once the grant has
//! been issued, revocation is tied to the `AccessGrant` guard and runs on every
//! exit path out of `Executing`.

use crate::command::{CommandOutcome, CommandOutput, CommandRunner, Invocation, SharedCommandRunner};
use crate::config::Config;
use crate::session::{EnvSession, SessionProvider};
use crate::xhost::AccessBracket;
use crate::{NvOcError, NvResult};
use std::cell::Cell;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecState {
    Resolving,
    Granting,
    Executing,
    Revoking,
    Done,
}

pub struct PrivilegedExecutor {
    runner: SharedCommandRunner,
    session: Arc<dyn SessionProvider>,
    bracket: AccessBracket,
    escalation_program: String,
    wrapper_path: PathBuf,
    state: Cell<ExecState>,
}

impl PrivilegedExecutor {
    pub fn new(
        runner: SharedCommandRunner,
        session: Arc<dyn SessionProvider>,
        escalation_program: impl Into<String>,
        wrapper_path: PathBuf,
        privileged_account: &str,
    ) -> Self {
        Self {
            bracket: AccessBracket::new(runner.clone(), privileged_account),
            runner,
            session,
            escalation_program: escalation_program.into(),
            wrapper_path,
            state: Cell::new(ExecState::Done),
        }
    }

    /// Executor reading the live session from the environment
    pub fn from_config(runner: SharedCommandRunner, config: &Config) -> Self {
        Self::new(
            runner,
            Arc::new(EnvSession),
            config.escalation_program.clone(),
            config.wrapper_path(),
            &config.privileged_account,
        )
    }

    /// State reached by the most recent `execute`; `Done` when idle
    pub fn state(&self) -> ExecState {
        self.state.get()
    }

    fn transition(&self, state: ExecState) {
        debug!("Privileged execution state: {:?}", state);
        self.state.set(state);
    }

    /// Run `command` (argv form) as the privileged account.
    ///
    /// Succeeds only when the wrapped command exits 0; the captured output is
    /// returned either way, inside `CommandFailed` on failure.
    pub fn execute(&self, command: &[String]) -> NvResult<CommandOutput> {
        self.transition(ExecState::Resolving);
        let command_line = command.join(" ");
        if command.is_empty() {
            self.transition(ExecState::Done);
            return Err(NvOcError::ToolUnavailable("empty privileged command".into()));
        }

        let credentials = self.session.credentials().inspect_err(|e| {
            error!("Cannot execute privileged command without a display session: {}", e);
            self.transition(ExecState::Done);
        })?;

        if !self.wrapper_path.exists() {
            error!("pkexec wrapper not found at {}", self.wrapper_path.display());
            self.transition(ExecState::Done);
            return Err(NvOcError::WrapperMissing(self.wrapper_path.clone()));
        }

        let mut argv = vec![
            self.wrapper_path.display().to_string(),
            credentials.display_id.clone(),
            credentials.auth_file_path.display().to_string(),
        ];
        argv.extend(command.iter().cloned());
        let invocation = Invocation::new(self.escalation_program.clone(), argv);

        self.transition(ExecState::Granting);
        let grant = self.bracket.grant();

        self.transition(ExecState::Executing);
        let result = match self.runner.execute(&invocation) {
            CommandOutcome::Completed(output) if output.success() => {
                info!("Privileged command successful: {}", command_line);
                Ok(output)
            }
            CommandOutcome::Completed(output) => {
                error!("Privileged command failed: {}", command_line);
                Err(NvOcError::CommandFailed {
                    command: invocation.command_line(),
                    exit_code: output.exit_code,
                    stderr: output.stderr.trim().to_string(),
                    stdout: output.stdout.trim().to_string(),
                })
            }
            CommandOutcome::Unavailable => {
                error!("Privileged command failed: {}", command_line);
                Err(NvOcError::ToolUnavailable(self.escalation_program.clone()))
            }
        };

        self.transition(ExecState::Revoking);
        drop(grant);

        self.transition(ExecState::Done);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::MockCommandRunner;
    use crate::session::SessionLocator;

    struct Fixture {
        _dir: tempfile::TempDir,
        runner: Arc<MockCommandRunner>,
        executor: PrivilegedExecutor,
    }

    fn fixture(runner: MockCommandRunner, display: Option<&str>) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let auth = dir.path().join(".Xauthority");
        let wrapper = dir.path().join("pkexec_wrapper.sh");
        std::fs::write(&auth, b"").unwrap();
        std::fs::write(&wrapper, b"#!/bin/sh\n").unwrap();

        let runner = Arc::new(runner);
        let session = SessionLocator::new(auth.to_str(), display, None);
        let executor = PrivilegedExecutor::new(runner.clone(), Arc::new(session), "pkexec", wrapper, "root");
        Fixture {
            _dir: dir,
            runner,
            executor,
        }
    }

    fn cmd(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_brackets_successful_command() {
        let f = fixture(MockCommandRunner::new(), Some(":0"));
        let output = f.executor.execute(&cmd(&["nvidia-settings", "-a", "[gpu:0]/GPUFanControlState=1"]));
        assert!(output.is_ok());

        let lines = f.runner.command_lines();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "xhost +SI:localuser:root");
        assert!(lines[1].starts_with("pkexec "));
        assert!(lines[1].contains(" :0 "));
        assert!(lines[1].ends_with("nvidia-settings -a [gpu:0]/GPUFanControlState=1"));
        assert_eq!(lines[2], "xhost -SI:localuser:root");
    }

    #[test]
    fn test_revokes_after_failure() {
        let f = fixture(
            MockCommandRunner::new().with_failure("pkexec", 126, "Not authorized"),
            Some(":0"),
        );
        let err = f.executor.execute(&cmd(&["nvidia-settings", "-a", "x=1"])).unwrap_err();
        match err {
            NvOcError::CommandFailed { exit_code, stderr, .. } => {
                assert_eq!(exit_code, 126);
                assert_eq!(stderr, "Not authorized");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(f.runner.count_matching("xhost +SI"), 1);
        assert_eq!(f.runner.count_matching("xhost -SI"), 1);
    }

    #[test]
    fn test_unavailable_escalation_program() {
        let f = fixture(MockCommandRunner::new().without("pkexec"), Some(":0"));
        let err = f.executor.execute(&cmd(&["nvidia-settings"])).unwrap_err();
        assert!(matches!(err, NvOcError::ToolUnavailable(_)));
        assert_eq!(f.runner.count_matching("xhost -SI"), 1);
    }

    #[test]
    fn test_aborts_before_grant_without_display() {
        let f = fixture(MockCommandRunner::new(), None);
        let err = f.executor.execute(&cmd(&["nvidia-settings"])).unwrap_err();
        assert!(matches!(err, NvOcError::SessionUnavailable(_)));
        assert!(f.runner.calls().is_empty());
        assert_eq!(f.executor.state(), ExecState::Done);
    }

    #[test]
    fn test_every_exit_path_ends_done() {
        let f = fixture(MockCommandRunner::new().with_failure("pkexec", 1, "boom"), Some(":0"));
        assert!(f.executor.execute(&[]).is_err());
        assert_eq!(f.executor.state(), ExecState::Done);
        assert!(f.executor.execute(&cmd(&["nvidia-settings"])).is_err());
        assert_eq!(f.executor.state(), ExecState::Done);
    }

    #[test]
    fn test_missing_wrapper_aborts_before_grant() {
        let runner = Arc::new(MockCommandRunner::new());
        let dir = tempfile::tempdir().unwrap();
        let auth = dir.path().join(".Xauthority");
        std::fs::write(&auth, b"").unwrap();
        let executor = PrivilegedExecutor::new(
            runner.clone(),
            Arc::new(SessionLocator::new(auth.to_str(), Some(":0"), None)),
            "pkexec",
            dir.path().join("missing.sh"),
            "root",
        );

        let err = executor.execute(&cmd(&["nvidia-settings"])).unwrap_err();
        assert!(matches!(err, NvOcError::WrapperMissing(_)));
        assert!(runner.calls().is_empty());
        assert_eq!(executor.state(), ExecState::Done);
    }
}
