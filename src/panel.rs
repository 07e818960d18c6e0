//! Control panel state
//!
//! Everything the graphical front-end does that is not drawing: slider values,
//! the busy flag, deferred apply/reset, post-change verification, monitoring
//! cadence and user notices. Time is passed in so the schedule can be driven
//! deterministically.
//!
//! Actions are deferred: `request_*` marks the panel busy and schedules the
//! action `action_delay` later, giving the front-end a frame to show the busy
//! state before the blocking authorization prompt. `tick` runs due work and
//! always clears the busy flag once an action has finished.

use crate::command::SharedCommandRunner;
use crate::config::Config;
use crate::overclock::{OverclockSettings, SettingsMutator};
use crate::privileged::PrivilegedExecutor;
use crate::profiles::{DEFAULT_PROFILE, ProfileManager};
use crate::telemetry::{GpuStats, TelemetryReader};
use crate::{NvOcError, NvResult};
use std::collections::VecDeque;
use std::ops::RangeInclusive;
use std::time::{Duration, Instant};
use tracing::{error, info};

pub const FAN_RANGE: RangeInclusive<u32> = 30..=100;
pub const CORE_RANGE: RangeInclusive<i32> = 0..=250;
pub const MEM_RANGE: RangeInclusive<i32> = 0..=1000;

const MAX_NOTICES: usize = 8;
/// Upper bound for any configured delay
const MAX_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

/// `now + delay`, with the delay capped at `MAX_DELAY`
fn deadline(now: Instant, delay: Duration) -> Instant {
    now.checked_add(delay.min(MAX_DELAY)).unwrap_or(now)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelAction {
    /// Apply the slider values; `profile` names where they came from
    Apply { profile: Option<String> },
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelTimings {
    pub action_delay: Duration,
    pub verify_delay: Duration,
    pub poll_interval: Duration,
}

impl Default for PanelTimings {
    fn default() -> Self {
        Self {
            action_delay: Duration::from_millis(100),
            verify_delay: Duration::from_millis(2000),
            poll_interval: Duration::from_millis(2000),
        }
    }
}

impl From<&Config> for PanelTimings {
    fn from(config: &Config) -> Self {
        Self {
            action_delay: Duration::from_millis(config.action_delay_ms).min(MAX_DELAY),
            verify_delay: Duration::from_millis(config.verify_delay_ms).min(MAX_DELAY),
            poll_interval: Duration::from_millis(config.poll_interval_ms).min(MAX_DELAY),
        }
    }
}

pub struct ControlPanel {
    mutator: SettingsMutator,
    telemetry: TelemetryReader,
    profiles: ProfileManager,
    timings: PanelTimings,

    pub settings: OverclockSettings,
    pub selected_profile: String,

    busy: bool,
    pending: Option<(PanelAction, Instant)>,
    verify_at: Option<Instant>,
    monitoring_paused: bool,
    next_poll: Option<Instant>,
    stats: Option<GpuStats>,
    notices: VecDeque<Notice>,
}

impl ControlPanel {
    pub fn new(
        mutator: SettingsMutator,
        telemetry: TelemetryReader,
        profiles: ProfileManager,
        timings: PanelTimings,
    ) -> Self {
        let settings = profiles
            .get(DEFAULT_PROFILE)
            .map(|p| OverclockSettings::from(&p))
            .unwrap_or(OverclockSettings::CLI_DEFAULTS);

        Self {
            mutator,
            telemetry,
            profiles,
            timings,
            settings,
            selected_profile: DEFAULT_PROFILE.to_string(),
            busy: false,
            pending: None,
            verify_at: None,
            monitoring_paused: false,
            next_poll: None,
            stats: None,
            notices: VecDeque::new(),
        }
    }

    pub fn from_config(config: &Config, runner: SharedCommandRunner) -> Self {
        let executor = PrivilegedExecutor::from_config(runner.clone(), config);
        Self::new(
            SettingsMutator::new(executor, config.settings_target()),
            TelemetryReader::new(runner, config.gpu_index, config.fan_index),
            ProfileManager::load(&config.profiles_path),
            PanelTimings::from(config),
        )
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn is_monitoring_paused(&self) -> bool {
        self.monitoring_paused
    }

    pub fn stats(&self) -> Option<&GpuStats> {
        self.stats.as_ref()
    }

    pub fn profile_names(&self) -> Vec<String> {
        self.profiles.names()
    }

    pub fn notices(&self) -> impl Iterator<Item = &Notice> {
        self.notices.iter()
    }

    pub fn dismiss_notice(&mut self, index: usize) {
        self.notices.remove(index);
    }

    fn notify(&mut self, kind: NoticeKind, message: impl Into<String>) {
        if self.notices.len() == MAX_NOTICES {
            self.notices.pop_front();
        }
        self.notices.push_back(Notice {
            kind,
            message: message.into(),
        });
    }

    fn schedule(&mut self, action: PanelAction, now: Instant) {
        self.busy = true;
        self.pending = Some((action, deadline(now, self.timings.action_delay)));
    }

    /// Apply the current slider values
    pub fn request_apply(&mut self, now: Instant) {
        if self.busy {
            return;
        }
        info!("Applying settings from sliders...");
        self.schedule(PanelAction::Apply { profile: None }, now);
    }

    pub fn request_reset(&mut self, now: Instant) {
        if self.busy {
            return;
        }
        info!("Resetting to default settings...");
        self.schedule(PanelAction::Reset, now);
    }

    /// Load a stored profile into the sliders and apply it
    pub fn select_profile(&mut self, name: &str, now: Instant) {
        if self.busy {
            return;
        }
        let Ok(profile) = self.profiles.get(name) else {
            self.notify(NoticeKind::Warning, format!("Profile '{name}' not found."));
            return;
        };

        info!("Loading and applying profile '{}'...", name);
        self.selected_profile = name.to_string();
        self.settings = OverclockSettings::from(&profile);
        self.schedule(
            PanelAction::Apply {
                profile: Some(name.to_string()),
            },
            now,
        );
    }

    /// Store the slider values under `name`
    pub fn save_current_as(&mut self, name: &str) -> NvResult<()> {
        match self.profiles.save_profile(name, self.settings.into()) {
            Ok(saved) => {
                self.notify(NoticeKind::Success, format!("Profile '{saved}' saved."));
                self.selected_profile = saved;
                Ok(())
            }
            Err(e) => {
                self.report_profile_error(&e);
                Err(e)
            }
        }
    }

    pub fn delete_profile(&mut self, name: &str) -> NvResult<()> {
        match self.profiles.delete_profile(name) {
            Ok(()) => {
                self.notify(NoticeKind::Success, format!("Profile '{name}' deleted."));
                self.selected_profile = DEFAULT_PROFILE.to_string();
                self.load_sliders(DEFAULT_PROFILE);
                Ok(())
            }
            Err(e) => {
                self.report_profile_error(&e);
                Err(e)
            }
        }
    }

    fn report_profile_error(&mut self, e: &NvOcError) {
        match e {
            NvOcError::ProtectedProfile(_) | NvOcError::InvalidProfileName(_) => {
                self.notify(NoticeKind::Warning, e.to_string())
            }
            _ => {
                error!("Profile store update failed: {}", e);
                self.notify(NoticeKind::Error, "Failed to save profiles to file.")
            }
        }
    }

    fn load_sliders(&mut self, name: &str) {
        if let Ok(profile) = self.profiles.get(name) {
            self.settings = OverclockSettings::from(&profile);
        }
    }

    pub fn toggle_monitoring(&mut self, now: Instant) {
        self.monitoring_paused = !self.monitoring_paused;
        info!(
            "Monitoring {}.",
            if self.monitoring_paused { "paused" } else { "resumed" }
        );
        if !self.monitoring_paused {
            self.next_poll = Some(now);
        }
    }

    /// Run whatever is due at `now`. Returns true if state changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let mut changed = false;

        if self.pending.as_ref().is_some_and(|(_, due)| *due <= now) {
            if let Some((action, _)) = self.pending.take() {
                self.run_action(action, now);
            }
            self.busy = false;
            changed = true;
        }

        if self.verify_at.is_some_and(|at| at <= now) {
            self.verify_at = None;
            self.verify_settings();
            changed = true;
        }

        if !self.monitoring_paused && self.next_poll.is_none_or(|at| at <= now) {
            self.refresh_stats();
            self.next_poll = Some(deadline(now, self.timings.poll_interval));
            changed = true;
        }

        changed
    }

    /// Earliest instant at which `tick` has work to do
    pub fn next_deadline(&self) -> Option<Instant> {
        let poll = if self.monitoring_paused {
            None
        } else {
            self.next_poll
        };
        [self.pending.as_ref().map(|(_, at)| *at), self.verify_at, poll]
            .into_iter()
            .flatten()
            .min()
    }

    pub fn refresh_stats(&mut self) {
        self.stats = Some(self.telemetry.all_stats());
    }

    fn run_action(&mut self, action: PanelAction, now: Instant) {
        let result = match &action {
            PanelAction::Apply { profile } => {
                if let Some(name) = profile {
                    info!("Applying settings from profile: {}", name);
                }
                self.mutator.apply_all_settings(&self.settings)
            }
            PanelAction::Reset => self.mutator.reset_all_settings(),
        };

        match result {
            Ok(_) => {
                if action == PanelAction::Reset {
                    self.selected_profile = DEFAULT_PROFILE.to_string();
                    self.load_sliders(DEFAULT_PROFILE);
                    self.notify(NoticeKind::Success, "Defaults restored.");
                } else {
                    self.notify(NoticeKind::Success, "Settings applied.");
                }
                info!("Verifying values in {:?}...", self.timings.verify_delay);
                self.verify_at = Some(deadline(now, self.timings.verify_delay));
            }
            Err(e) => {
                error!("An error occurred while running {:?}: {}", action, e);
                self.notify(NoticeKind::Error, e.to_string());
            }
        }
    }

    fn verify_settings(&mut self) {
        info!("--- Verification Check ---");
        let fan = self.telemetry.target_fan_speed();
        info!("Post-change Target Fan Speed: {}%", fan);
        info!("--- End Verification ---");
        if self.monitoring_paused {
            self.refresh_stats();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::MockCommandRunner;
    use crate::overclock::SettingsTarget;
    use crate::session::SessionLocator;
    use std::sync::Arc;

    struct Fixture {
        _dir: tempfile::TempDir,
        runner: Arc<MockCommandRunner>,
        panel: ControlPanel,
    }

    fn fixture(runner: MockCommandRunner) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let auth = dir.path().join(".Xauthority");
        let wrapper = dir.path().join("pkexec_wrapper.sh");
        std::fs::write(&auth, b"").unwrap();
        std::fs::write(&wrapper, b"#!/bin/sh\n").unwrap();

        let runner = Arc::new(runner);
        let executor = PrivilegedExecutor::new(
            runner.clone(),
            Arc::new(SessionLocator::new(auth.to_str(), Some(":0"), None)),
            "pkexec",
            wrapper,
            "root",
        );
        let panel = ControlPanel::new(
            SettingsMutator::new(executor, SettingsTarget::default()),
            TelemetryReader::new(runner.clone(), 0, 0),
            ProfileManager::load(dir.path().join("profiles.json")),
            PanelTimings::default(),
        );
        Fixture {
            _dir: dir,
            runner,
            panel,
        }
    }

    #[test]
    fn test_huge_configured_delays_are_capped() {
        let config = Config {
            action_delay_ms: u64::MAX,
            verify_delay_ms: u64::MAX,
            poll_interval_ms: u64::MAX,
            ..Config::default()
        };
        let timings = PanelTimings::from(&config);
        assert_eq!(timings.poll_interval, MAX_DELAY);

        let mut f = fixture(MockCommandRunner::new());
        f.panel.timings = PanelTimings {
            action_delay: Duration::MAX,
            verify_delay: Duration::MAX,
            poll_interval: Duration::MAX,
        };
        let t0 = Instant::now();
        f.panel.tick(t0);
        f.panel.request_apply(t0);
        assert_eq!(f.panel.next_deadline(), Some(t0 + MAX_DELAY));

        f.panel.tick(t0 + MAX_DELAY);
        assert!(!f.panel.is_busy());
        assert_eq!(f.runner.count_matching("pkexec"), 1);
    }

    #[test]
    fn test_starts_with_default_profile_values() {
        let f = fixture(MockCommandRunner::new());
        assert_eq!(f.panel.selected_profile, "Default");
        assert_eq!(f.panel.settings.fan_speed, 60);
        assert_eq!(f.panel.settings.core_offset, 150);
        assert_eq!(f.panel.settings.mem_offset, 750);
    }

    #[test]
    fn test_apply_is_deferred_and_clears_busy() {
        let mut f = fixture(MockCommandRunner::new());
        let t0 = Instant::now();
        f.panel.toggle_monitoring(t0);

        f.panel.request_apply(t0);
        assert!(f.panel.is_busy());
        f.panel.tick(t0);
        assert!(f.runner.calls().is_empty());

        f.panel.tick(t0 + Duration::from_millis(100));
        assert!(!f.panel.is_busy());
        assert_eq!(f.runner.count_matching("pkexec"), 1);
        assert_eq!(f.panel.next_deadline(), Some(t0 + Duration::from_millis(2100)));
    }

    #[test]
    fn test_failed_apply_still_clears_busy() {
        let mut f = fixture(MockCommandRunner::new().with_failure("pkexec", 126, "dismissed"));
        let t0 = Instant::now();
        f.panel.toggle_monitoring(t0);

        f.panel.request_reset(t0);
        f.panel.tick(t0 + Duration::from_secs(1));

        assert!(!f.panel.is_busy());
        assert!(f.panel.notices().any(|n| n.kind == NoticeKind::Error));
        assert_eq!(f.panel.next_deadline(), None);
    }

    #[test]
    fn test_verification_reads_target_fan_speed() {
        let mut f = fixture(MockCommandRunner::new().with_output("GPUTargetFanSpeed", "60\n"));
        let t0 = Instant::now();
        f.panel.toggle_monitoring(t0);

        f.panel.request_apply(t0);
        f.panel.tick(t0 + Duration::from_millis(100));
        let before = f.runner.count_matching("-q [fan:0]/GPUTargetFanSpeed");
        f.panel.tick(t0 + Duration::from_millis(2100));
        assert!(f.runner.count_matching("-q [fan:0]/GPUTargetFanSpeed") > before);
    }

    #[test]
    fn test_select_profile_updates_sliders() {
        let mut f = fixture(MockCommandRunner::new());
        f.panel.settings = OverclockSettings {
            fan_speed: 70,
            core_offset: 100,
            mem_offset: 500,
        };
        f.panel.save_current_as("Foo").unwrap();
        f.panel.settings = OverclockSettings::CLI_DEFAULTS;

        let t0 = Instant::now();
        f.panel.select_profile("Foo", t0);
        assert_eq!(f.panel.settings.fan_speed, 70);
        assert!(f.panel.is_busy());
        assert_eq!(f.panel.profile_names(), vec!["Default", "Foo"]);
    }

    #[test]
    fn test_protected_profile_warns() {
        let mut f = fixture(MockCommandRunner::new());
        assert!(f.panel.save_current_as("Default").is_err());
        assert!(f.panel.delete_profile("Default").is_err());
        assert!(f.panel.notices().all(|n| n.kind == NoticeKind::Warning));
        assert_eq!(f.panel.profile_names(), vec!["Default"]);
    }

    #[test]
    fn test_monitoring_polls_on_interval() {
        let mut f = fixture(MockCommandRunner::new().with_output("temperature.gpu", "64\n"));
        let t0 = Instant::now();

        assert!(f.panel.tick(t0));
        assert_eq!(f.panel.stats().unwrap().temperature.to_string(), "64");
        assert!(!f.panel.tick(t0 + Duration::from_millis(500)));
        assert_eq!(f.panel.next_deadline(), Some(t0 + Duration::from_millis(2000)));

        f.panel.toggle_monitoring(t0);
        assert!(f.panel.is_monitoring_paused());
        assert_eq!(f.panel.next_deadline(), None);
    }
}
