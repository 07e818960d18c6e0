use crate::overclock::SettingsTarget;
use crate::{NvOcError, NvResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const WRAPPER_SCRIPT: &str = "pkexec_wrapper.sh";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub profiles_path: PathBuf,
    pub log_path: PathBuf,
    /// Explicit wrapper script location; searched for when unset
    pub wrapper_path: Option<PathBuf>,
    pub escalation_program: String,
    pub privileged_account: String,
    pub gpu_index: u32,
    pub fan_index: u32,
    /// Performance level addressed by the clock offset attributes
    pub perf_level: u32,
    pub poll_interval_ms: u64,
    pub verify_delay_ms: u64,
    pub action_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            profiles_path: PathBuf::from("profiles.json"),
            log_path: PathBuf::from("nvidiaoc.log"),
            wrapper_path: None,
            escalation_program: "pkexec".to_string(),
            privileged_account: "root".to_string(),
            gpu_index: 0,
            fan_index: 0,
            perf_level: 3,
            poll_interval_ms: 2000,
            verify_delay_ms: 2000,
            action_delay_ms: 100,
        }
    }
}

impl Config {
    /// Load from the default location, falling back to defaults
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load from `path`. A missing file yields defaults; an unreadable or
    /// unparsable one yields defaults with a warning.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::try_load_from(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("{e}. Using default configuration.");
                Self::default()
            }
        }
    }

    pub fn try_load_from(path: &Path) -> NvResult<Self> {
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| {
            NvOcError::Config(format!("Failed to parse config {}: {e}", path.display()))
        })
    }

    pub fn save_to(&self, path: &Path) -> NvResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| NvOcError::Config(format!("Failed to serialize config: {e}")))?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        if let Some(config_dir) = directories::ProjectDirs::from("com", "nvoc", "nvoc") {
            config_dir.config_dir().join("config.toml")
        } else {
            PathBuf::from("nvoc_config.toml")
        }
    }

    /// Wrapper script location: explicit setting, then next to the
    /// executable, then the in-tree `scripts/` copy.
    pub fn wrapper_path(&self) -> PathBuf {
        if let Some(path) = &self.wrapper_path {
            return path.clone();
        }

        let beside_exe = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join(WRAPPER_SCRIPT)));
        match beside_exe {
            Some(path) if path.exists() => path,
            _ => PathBuf::from("scripts").join(WRAPPER_SCRIPT),
        }
    }

    pub fn settings_target(&self) -> SettingsTarget {
        SettingsTarget {
            gpu_index: self.gpu_index,
            fan_index: self.fan_index,
            perf_level: self.perf_level,
        }
    }
}
