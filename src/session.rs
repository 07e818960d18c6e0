//! Display session discovery
//!
//! Privileged commands run as a different user and must be told how to reach
//! the invoking user's X server: the `DISPLAY` identifier and the X
//! authority file.

use crate::{NvOcError, NvResult};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCredentials {
    pub display_id: String,
    pub auth_file_path: PathBuf,
}

/// Source of session credentials, consulted once per privileged operation
pub trait SessionProvider: Send + Sync {
    fn credentials(&self) -> NvResult<SessionCredentials>;
}

/// Snapshot of the inputs needed to locate the session
#[derive(Debug, Clone, Default)]
pub struct SessionLocator {
    xauthority: Option<String>,
    display: Option<String>,
    runtime_dir: Option<PathBuf>,
}

impl SessionLocator {
    pub fn new(xauthority: Option<&str>, display: Option<&str>, runtime_dir: Option<PathBuf>) -> Self {
        Self {
            xauthority: xauthority.map(str::to_string),
            display: display.map(str::to_string),
            runtime_dir,
        }
    }

    /// Capture `XAUTHORITY`, `DISPLAY` and `/run/user/<uid>` from the current process
    pub fn from_env() -> Self {
        let uid = nix::unistd::getuid();
        Self {
            xauthority: std::env::var("XAUTHORITY").ok(),
            display: std::env::var("DISPLAY").ok(),
            runtime_dir: Some(PathBuf::from(format!("/run/user/{uid}"))),
        }
    }

    /// Locate the X authority file.
    ///
    /// `XAUTHORITY` wins if it points at an existing file. Otherwise the
    /// per-user runtime directory is searched for an `xauth`-like entry, which
    /// covers display managers that don't export the variable (GDM on Wayland).
    pub fn auth_file(&self) -> Option<PathBuf> {
        if let Some(path) = self.xauthority.as_deref().filter(|p| !p.is_empty()) {
            if Path::new(path).exists() {
                info!("Found XAUTHORITY path in environment variable: {}", path);
                return Some(PathBuf::from(path));
            }
        }

        if let Some(found) = self.runtime_dir.as_deref().and_then(find_xauth_entry) {
            info!("Found potential XAUTHORITY file at: {}", found.display());
            return Some(found);
        }

        warn!("Could not automatically determine XAUTHORITY path. Privileged commands may fail.");
        None
    }

    pub fn display(&self) -> Option<&str> {
        self.display.as_deref().filter(|d| !d.is_empty())
    }

    pub fn resolve(&self) -> NvResult<SessionCredentials> {
        let auth = self.auth_file();
        match (auth, self.display()) {
            (Some(auth_file_path), Some(display)) => Ok(SessionCredentials {
                display_id: display.to_string(),
                auth_file_path,
            }),
            (auth, display) => Err(NvOcError::SessionUnavailable(format!(
                "XAUTHORITY ({}) or DISPLAY ({}) missing",
                auth.map(|p| p.display().to_string())
                    .unwrap_or_else(|| "None".into()),
                display.unwrap_or("None")
            ))),
        }
    }
}

fn find_xauth_entry(dir: &Path) -> Option<PathBuf> {
    if !dir.is_dir() {
        return None;
    }
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .file_name()
                .to_string_lossy()
                .to_lowercase()
                .contains("xauth")
        })
        .map(|entry| entry.path())
        .collect();
    entries.sort();
    entries.into_iter().next()
}

impl SessionProvider for SessionLocator {
    fn credentials(&self) -> NvResult<SessionCredentials> {
        self.resolve()
    }
}

/// Reads the live process environment on every call; session info can change
/// between operations so nothing is cached.
pub struct EnvSession;

impl SessionProvider for EnvSession {
    fn credentials(&self) -> NvResult<SessionCredentials> {
        SessionLocator::from_env().resolve()
    }
}
