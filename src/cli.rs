//! Command-line mode
//!
//! `nvoc --fan 75 --core 150` applies settings without opening a window.
//! Flags that only read state (`--stats`, `--list-profiles`, `--check`) work
//! without `xhost`; anything that changes the GPU needs it.

use crate::command::SharedCommandRunner;
use crate::config::Config;
use crate::error_messages::{ErrorWithSolution, run_diagnostics};
use crate::overclock::{OverclockSettings, SettingsMutator};
use crate::privileged::PrivilegedExecutor;
use crate::profiles::ProfileManager;
use crate::session::{EnvSession, SessionProvider};
use crate::system;
use crate::telemetry::TelemetryReader;
use clap::Parser;
use console::style;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug, Default, Clone, PartialEq, Eq)]
#[command(name = "nvoc", version, about = "Control and monitor NVIDIA GPUs.")]
pub struct Args {
    /// Set fan speed in percent (e.g., 75). Falls back to 30 when only
    /// --core/--mem are given
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=100))]
    pub fan: Option<u32>,

    /// Set core clock offset in MHz (e.g., 150). Unset means 0
    #[arg(long, allow_negative_numbers = true)]
    pub core: Option<i32>,

    /// Set memory clock offset in MHz (e.g., 750). Unset means 0
    #[arg(long, allow_negative_numbers = true)]
    pub mem: Option<i32>,

    /// Reset all settings to default
    #[arg(long)]
    pub reset: bool,

    /// Print one telemetry snapshot
    #[arg(long)]
    pub stats: bool,

    /// Apply a stored profile
    #[arg(long, value_name = "NAME")]
    pub profile: Option<String>,

    /// List stored profiles
    #[arg(long)]
    pub list_profiles: bool,

    /// Check system dependencies and the display session
    #[arg(long)]
    pub check: bool,

    /// Configuration file to use instead of the default location
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl Args {
    /// True when any action flag was given; otherwise the GUI starts
    pub fn is_cli_mode(&self) -> bool {
        self.reset
            || self.stats
            || self.list_profiles
            || self.check
            || self.profile.is_some()
            || self.resolve_settings().is_some()
    }

    /// Settings for `--fan/--core/--mem`, unset values filled with the
    /// CLI defaults. Note this sets core/mem to 0 if only `--fan` is given.
    pub fn resolve_settings(&self) -> Option<OverclockSettings> {
        if self.fan.is_none() && self.core.is_none() && self.mem.is_none() {
            return None;
        }
        let defaults = OverclockSettings::CLI_DEFAULTS;
        Some(OverclockSettings {
            fan_speed: self.fan.unwrap_or(defaults.fan_speed),
            core_offset: self.core.unwrap_or(defaults.core_offset),
            mem_offset: self.mem.unwrap_or(defaults.mem_offset),
        })
    }

    fn changes_settings(&self) -> bool {
        self.reset || self.profile.is_some() || self.resolve_settings().is_some()
    }
}

/// Where CLI mode looks up programs and the display session
pub struct CliHost {
    pub locate: fn(&str) -> Option<PathBuf>,
    pub session: Arc<dyn SessionProvider>,
}

impl Default for CliHost {
    fn default() -> Self {
        Self {
            locate: system::find_program,
            session: Arc::new(EnvSession),
        }
    }
}

/// Run command-line mode and return the process exit code
pub fn run_cli(args: &Args, config: &Config, runner: SharedCommandRunner) -> i32 {
    run_cli_on(args, config, runner, &CliHost::default())
}

pub fn run_cli_on(args: &Args, config: &Config, runner: SharedCommandRunner, host: &CliHost) -> i32 {
    info!("Running in Command-Line Interface mode.");

    if args.check {
        println!("{}", run_diagnostics());
    }

    if args.list_profiles {
        list_profiles(config);
    }

    if args.stats {
        let reader = TelemetryReader::new(runner.clone(), config.gpu_index, config.fan_index);
        println!("{}", reader.all_stats());
    }

    if !args.changes_settings() {
        return 0;
    }

    if let Err(e) = system::check_dependencies_with(host.locate) {
        eprintln!("{}", e.with_solution());
        return 1;
    }

    let executor = PrivilegedExecutor::new(
        runner,
        host.session.clone(),
        config.escalation_program.clone(),
        config.wrapper_path(),
        &config.privileged_account,
    );
    let mutator = SettingsMutator::new(executor, config.settings_target());

    if args.reset {
        info!("Resetting GPU settings to defaults.");
        report(mutator.reset_all_settings().map(|_| ()));
        info!("GPU settings have been reset.");
        return 0;
    }

    if let Some(name) = &args.profile {
        let manager = ProfileManager::load(&config.profiles_path);
        match manager.get(name) {
            Ok(profile) => {
                info!("Applying settings from profile: {}", name);
                report(mutator.apply_all_settings(&OverclockSettings::from(&profile)).map(|_| ()));
            }
            Err(e) => {
                error!("{}", e);
                eprintln!("{}", e.with_solution());
            }
        }
    }

    if let Some(settings) = args.resolve_settings() {
        report(mutator.apply_all_settings(&settings).map(|_| ()));
    }

    info!("CLI operations complete.");
    0
}

fn report(result: crate::NvResult<()>) {
    match result {
        Ok(()) => println!("{} Settings applied", style("✓").green().bold()),
        Err(e) => eprintln!("{}", e.with_solution()),
    }
}

fn list_profiles(config: &Config) {
    let manager = ProfileManager::load(&config.profiles_path);
    println!("{}", style("Profiles").cyan().bold());
    for name in manager.names() {
        if let Ok(profile) = manager.get(&name) {
            println!(
                "  {:<16} fan {:>3}%  core {:+5} MHz  mem {:+5} MHz",
                name, profile.fan_speed, profile.core_clock, profile.mem_clock
            );
        }
    }
}
