//! System dependency detection
//!
//! Only `xhost` is a hard requirement: without it the access bracket cannot be
//! opened and every privileged action would fail. The vendor tools and
//! `pkexec` degrade to "N/A" or a failed action instead.

use crate::{NvOcError, NvResult};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dependency {
    pub program: &'static str,
    pub required: bool,
    pub purpose: &'static str,
}

pub const DEPENDENCIES: [Dependency; 4] = [
    Dependency {
        program: "xhost",
        required: true,
        purpose: "grant root temporary access to the X server",
    },
    Dependency {
        program: "pkexec",
        required: false,
        purpose: "authorize privileged nvidia-settings calls",
    },
    Dependency {
        program: "nvidia-settings",
        required: false,
        purpose: "read the target fan speed and apply settings",
    },
    Dependency {
        program: "nvidia-smi",
        required: false,
        purpose: "read GPU telemetry",
    },
];

/// Locate a program on `PATH`
pub fn find_program(program: &str) -> Option<PathBuf> {
    which::which(program).ok()
}

/// Each known dependency with its resolved location
pub fn dependency_report() -> Vec<(Dependency, Option<PathBuf>)> {
    DEPENDENCIES
        .iter()
        .map(|dep| (*dep, find_program(dep.program)))
        .collect()
}

/// Fail if a required dependency is missing
pub fn check_system_dependencies() -> NvResult<()> {
    check_dependencies_with(find_program)
}

/// Same check with a caller-supplied program lookup
pub fn check_dependencies_with(locate: impl Fn(&str) -> Option<PathBuf>) -> NvResult<()> {
    for dep in DEPENDENCIES.iter().filter(|d| d.required) {
        match locate(dep.program) {
            Some(path) => info!("System dependency '{}' found at {}.", dep.program, path.display()),
            None => {
                error!(
                    "'{}' command not found. This is required to {}.",
                    dep.program, dep.purpose
                );
                return Err(NvOcError::MissingDependency(dep.program.to_string()));
            }
        }
    }
    Ok(())
}

/// The `ID=` value of an os-release file, lowercased and unquoted
pub fn parse_os_release_id(content: &str) -> Option<String> {
    content
        .lines()
        .find_map(|line| line.strip_prefix("ID="))
        .map(|id| id.trim().trim_matches('"').to_lowercase())
        .filter(|id| !id.is_empty())
}

pub fn linux_distribution() -> Option<String> {
    std::fs::read_to_string("/etc/os-release")
        .ok()
        .and_then(|content| parse_os_release_id(&content))
}
