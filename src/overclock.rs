//! nvidia-settings assignments for fan control, clock offsets and reset
//!
//! Each logical action is a single `nvidia-settings` invocation carrying all
//! of its `-a` assignments, so the user sees one authorization prompt.

use crate::command::CommandOutput;
use crate::privileged::PrivilegedExecutor;
use crate::profiles::Profile;
use crate::NvResult;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Addressing for the assignments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingsTarget {
    pub gpu_index: u32,
    pub fan_index: u32,
    pub perf_level: u32,
}

impl Default for SettingsTarget {
    fn default() -> Self {
        Self {
            gpu_index: 0,
            fan_index: 0,
            perf_level: 3,
        }
    }
}

impl SettingsTarget {
    fn fan_control(&self, enable: bool) -> String {
        format!("[gpu:{}]/GPUFanControlState={}", self.gpu_index, u8::from(enable))
    }

    fn target_fan_speed(&self, percent: u32) -> String {
        format!("[fan:{}]/GPUTargetFanSpeed={}", self.fan_index, percent)
    }

    fn core_offset(&self, mhz: i32) -> String {
        format!(
            "[gpu:{}]/GPUGraphicsClockOffset[{}]={}",
            self.gpu_index, self.perf_level, mhz
        )
    }

    fn mem_offset(&self, mhz: i32) -> String {
        format!(
            "[gpu:{}]/GPUMemoryTransferRateOffset[{}]={}",
            self.gpu_index, self.perf_level, mhz
        )
    }
}

/// Fan speed and clock offsets to apply together
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverclockSettings {
    pub fan_speed: u32,
    pub core_offset: i32,
    pub mem_offset: i32,
}

impl OverclockSettings {
    /// Values used for CLI flags that were not given
    pub const CLI_DEFAULTS: OverclockSettings = OverclockSettings {
        fan_speed: 30,
        core_offset: 0,
        mem_offset: 0,
    };
}

impl From<&Profile> for OverclockSettings {
    fn from(profile: &Profile) -> Self {
        Self {
            fan_speed: profile.fan_speed,
            core_offset: profile.core_clock,
            mem_offset: profile.mem_clock,
        }
    }
}

impl From<OverclockSettings> for Profile {
    fn from(settings: OverclockSettings) -> Self {
        Profile {
            fan_speed: settings.fan_speed,
            core_clock: settings.core_offset,
            mem_clock: settings.mem_offset,
        }
    }
}

fn nvidia_settings(assignments: Vec<String>) -> Vec<String> {
    let mut command = vec!["nvidia-settings".to_string()];
    for assignment in assignments {
        command.push("-a".to_string());
        command.push(assignment);
    }
    command
}

pub fn fan_control_command(target: &SettingsTarget, enable: bool) -> Vec<String> {
    nvidia_settings(vec![target.fan_control(enable)])
}

pub fn apply_command(target: &SettingsTarget, settings: &OverclockSettings) -> Vec<String> {
    nvidia_settings(vec![
        target.fan_control(true),
        target.target_fan_speed(settings.fan_speed),
        target.core_offset(settings.core_offset),
        target.mem_offset(settings.mem_offset),
    ])
}

/// Zero both offsets and hand the fan back to the driver
pub fn reset_command(target: &SettingsTarget) -> Vec<String> {
    nvidia_settings(vec![
        target.core_offset(0),
        target.mem_offset(0),
        target.fan_control(false),
    ])
}

pub struct SettingsMutator {
    executor: PrivilegedExecutor,
    target: SettingsTarget,
}

impl SettingsMutator {
    pub fn new(executor: PrivilegedExecutor, target: SettingsTarget) -> Self {
        Self { executor, target }
    }

    pub fn set_fan_control_state(&self, enable: bool) -> NvResult<CommandOutput> {
        info!("Setting GPUFanControlState to {}", u8::from(enable));
        self.executor.execute(&fan_control_command(&self.target, enable))
    }

    pub fn apply_all_settings(&self, settings: &OverclockSettings) -> NvResult<CommandOutput> {
        info!(
            "Applying fan {}%, core {:+} MHz, memory {:+} MHz in a single command",
            settings.fan_speed, settings.core_offset, settings.mem_offset
        );
        self.executor.execute(&apply_command(&self.target, settings))
    }

    pub fn reset_all_settings(&self) -> NvResult<CommandOutput> {
        info!("Resetting clock offsets and fan control in a single command");
        self.executor.execute(&reset_command(&self.target))
    }
}
