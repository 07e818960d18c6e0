//! Read-only GPU telemetry via nvidia-smi and nvidia-settings
//!
//! Every query degrades to `Reading::Unavailable` instead of failing.

use crate::command::{CommandRunner, SharedCommandRunner};
use serde::Serialize;
use std::fmt;

const UNIT_SUFFIXES: [&str; 3] = [" %", " MHz", " W"];

/// A single telemetry value, or the distinguished "value unavailable" marker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Reading {
    Value(String),
    Unavailable,
}

impl Reading {
    pub fn value(&self) -> Option<&str> {
        match self {
            Reading::Value(v) => Some(v),
            Reading::Unavailable => None,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Reading::Unavailable)
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reading::Value(v) => f.write_str(v),
            Reading::Unavailable => f.write_str("N/A"),
        }
    }
}

/// GPU statistics snapshot, created fresh on every poll
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GpuStats {
    pub name: Reading,
    pub temperature: Reading,
    pub utilization: Reading,
    pub core_clock: Reading,
    pub memory_clock: Reading,
    pub power_usage: Reading,
    /// Configured target fan speed, not the measured speed
    pub fan_speed: Reading,
}

impl fmt::Display for GpuStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<18}: {}", "GPU Name", self.name)?;
        writeln!(f, "{:<18}: {} °C", "Temperature", self.temperature)?;
        writeln!(f, "{:<18}: {} %", "GPU Usage", self.utilization)?;
        writeln!(f, "{:<18}: {} MHz", "Core Clock", self.core_clock)?;
        writeln!(f, "{:<18}: {} MHz", "Memory Clock", self.memory_clock)?;
        writeln!(f, "{:<18}: {} W", "Power Usage", self.power_usage)?;
        write!(f, "{:<18}: {} %", "Target Fan Speed", self.fan_speed)
    }
}

/// Normalize one line of tool output.
///
/// Trims, maps `[N/A]` and empty output to `Unavailable` and strips the
/// known unit suffixes.
pub fn parse_reading(raw: &str) -> Reading {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.contains("[N/A]") {
        return Reading::Unavailable;
    }

    let value = UNIT_SUFFIXES
        .iter()
        .find_map(|suffix| trimmed.strip_suffix(suffix))
        .unwrap_or(trimmed);
    Reading::Value(value.trim_end().to_string())
}

pub struct TelemetryReader {
    runner: SharedCommandRunner,
    gpu_index: u32,
    fan_index: u32,
}

impl TelemetryReader {
    pub fn new(runner: SharedCommandRunner, gpu_index: u32, fan_index: u32) -> Self {
        Self {
            runner,
            gpu_index,
            fan_index,
        }
    }

    fn query_smi(&self, field: &str) -> Reading {
        let id = format!("--id={}", self.gpu_index);
        let query = format!("--query-gpu={field}");
        let outcome = self
            .runner
            .run("nvidia-smi", &[&id, &query, "--format=csv,noheader"]);
        match outcome.success_output() {
            Some(output) => parse_reading(&output.stdout),
            None => Reading::Unavailable,
        }
    }

    pub fn gpu_name(&self) -> Reading {
        self.query_smi("name")
    }

    pub fn temperature(&self) -> Reading {
        self.query_smi("temperature.gpu")
    }

    pub fn utilization(&self) -> Reading {
        self.query_smi("utilization.gpu")
    }

    pub fn core_clock(&self) -> Reading {
        self.query_smi("clocks.gr")
    }

    pub fn memory_clock(&self) -> Reading {
        self.query_smi("clocks.mem")
    }

    pub fn power_usage(&self) -> Reading {
        self.query_smi("power.draw")
    }

    /// Target fan speed as configured in nvidia-settings. Does not need root.
    pub fn target_fan_speed(&self) -> Reading {
        let attribute = format!("[fan:{}]/GPUTargetFanSpeed", self.fan_index);
        let outcome = self.runner.run("nvidia-settings", &["-q", &attribute, "-t"]);
        match outcome.success_output() {
            Some(output) => parse_reading(&output.stdout),
            None => Reading::Unavailable,
        }
    }

    pub fn all_stats(&self) -> GpuStats {
        GpuStats {
            name: self.gpu_name(),
            temperature: self.temperature(),
            utilization: self.utilization(),
            core_clock: self.core_clock(),
            memory_clock: self.memory_clock(),
            power_usage: self.power_usage(),
            fan_speed: self.target_fan_speed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::MockCommandRunner;
    use std::sync::Arc;

    #[test]
    fn test_parse_power() {
        assert_eq!(parse_reading("150.00 W\n"), Reading::Value("150.00".into()));
        assert_eq!(parse_reading("[N/A]"), Reading::Unavailable);
    }

    #[test]
    fn test_parse_fan_and_clocks() {
        assert_eq!(parse_reading("75 %"), Reading::Value("75".into()));
        assert_eq!(parse_reading(" 1695 MHz \n"), Reading::Value("1695".into()));
        assert_eq!(parse_reading("NVIDIA GeForce RTX 3080"), Reading::Value("NVIDIA GeForce RTX 3080".into()));
        assert_eq!(parse_reading("   \n"), Reading::Unavailable);
    }

    #[test]
    fn test_reading_display() {
        assert_eq!(Reading::Unavailable.to_string(), "N/A");
        assert_eq!(Reading::Value("61".into()).to_string(), "61");
    }

    #[test]
    fn test_fan_query_targets_configured_fan() {
        let runner = Arc::new(MockCommandRunner::new().with_output("GPUTargetFanSpeed", "55\n"));
        let reader = TelemetryReader::new(runner.clone(), 0, 1);

        assert_eq!(reader.target_fan_speed(), Reading::Value("55".into()));
        assert_eq!(
            runner.command_lines(),
            vec!["nvidia-settings -q [fan:1]/GPUTargetFanSpeed -t"]
        );
    }

    #[test]
    fn test_nonzero_exit_is_unavailable() {
        let runner = Arc::new(MockCommandRunner::new().with_failure("nvidia-smi", 9, "NVIDIA-SMI has failed"));
        let reader = TelemetryReader::new(runner, 0, 0);
        assert_eq!(reader.temperature(), Reading::Unavailable);
    }
}
