use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NvOcError {
    #[error("Display session unavailable: {0}")]
    SessionUnavailable(String),
    #[error("Privilege-escalation wrapper not found at {}", .0.display())]
    WrapperMissing(PathBuf),
    #[error("Command not available: {0}")]
    ToolUnavailable(String),
    #[error("Command `{command}` failed with exit code {exit_code}: {stderr}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
        stdout: String,
    },
    #[error("The '{0}' profile is protected and cannot be modified")]
    ProtectedProfile(String),
    #[error("Invalid profile name: {0}")]
    InvalidProfileName(String),
    #[error("Profile '{0}' not found")]
    ProfileNotFound(String),
    #[error("Missing system dependency: {0}")]
    MissingDependency(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type NvResult<T> = Result<T, NvOcError>;

pub mod cli;
pub mod command;
pub mod config;
pub mod error_messages;
pub mod logging;
pub mod overclock;
pub mod panel;
pub mod privileged;
pub mod profiles;
pub mod session;
pub mod system;
pub mod telemetry;
pub mod xhost;

#[cfg(feature = "gui")]
pub mod gui;

// Re-export commonly used types
pub use command::{CommandOutcome, CommandOutput, CommandRunner, SharedCommandRunner};
pub use config::Config;
pub use overclock::{OverclockSettings, SettingsMutator};
pub use profiles::{Profile, ProfileManager, ProfileStore};
pub use telemetry::{GpuStats, Reading, TelemetryReader};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_types() {
        let error = NvOcError::ProtectedProfile("Default".to_string());
        assert_eq!(
            error.to_string(),
            "The 'Default' profile is protected and cannot be modified"
        );

        let error = NvOcError::WrapperMissing(PathBuf::from("/opt/nvoc/pkexec_wrapper.sh"));
        assert!(error.to_string().contains("/opt/nvoc/pkexec_wrapper.sh"));
    }
}
