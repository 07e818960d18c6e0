//! X server access bracket
//!
//! Grants the privileged account permission to connect to the user's X server
//! for the duration of one operation. `AccessBracket::grant` returns a guard
//! that revokes on drop, so revocation runs on every exit path, unwinding
//! included.

use crate::command::{CommandOutcome, CommandRunner, Invocation, SharedCommandRunner};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Grant,
    Revoke,
}

impl Permission {
    fn sign(self) -> char {
        match self {
            Permission::Grant => '+',
            Permission::Revoke => '-',
        }
    }
}

pub struct AccessBracket {
    runner: SharedCommandRunner,
    account: String,
}

impl AccessBracket {
    pub fn new(runner: SharedCommandRunner, account: impl Into<String>) -> Self {
        Self {
            runner,
            account: account.into(),
        }
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    /// Run `xhost ±SI:localuser:<account>` with the invoking user's environment.
    ///
    /// Returns whether xhost reported success. Failure is only a warning: the
    /// server may already be in the requested state.
    pub fn set_permission(&self, permission: Permission) -> bool {
        let entry = format!("{}SI:localuser:{}", permission.sign(), self.account);
        let invocation = Invocation::new("xhost", [entry]).with_env(std::env::vars_os());

        info!("Running xhost command: {}", invocation.command_line());
        let outcome = self.runner.execute(&invocation);
        if outcome.is_success() {
            return true;
        }

        warn!("xhost command failed. This might be okay if permissions were already set/unset.");
        if let CommandOutcome::Completed(output) = &outcome {
            warn!("xhost stderr: {}", output.stderr.trim());
        }
        false
    }

    /// Grant access and return a guard that revokes it when dropped
    pub fn grant(&self) -> AccessGrant<'_> {
        let granted = self.set_permission(Permission::Grant);
        AccessGrant {
            bracket: self,
            granted,
        }
    }
}

/// Live display access for the privileged account
pub struct AccessGrant<'a> {
    bracket: &'a AccessBracket,
    granted: bool,
}

impl AccessGrant<'_> {
    /// Whether xhost confirmed the grant
    pub fn confirmed(&self) -> bool {
        self.granted
    }
}

impl Drop for AccessGrant<'_> {
    fn drop(&mut self) {
        self.bracket.set_permission(Permission::Revoke);
    }
}
