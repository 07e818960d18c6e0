use anyhow::Result;
use clap::Parser;
use nvoc::cli::{self, Args};
use nvoc::command::create_real_runner;
use nvoc::config::Config;
use nvoc::logging::init_logging;

fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };

    init_logging(&config.log_path)?;
    tracing::info!("Starting NVIDIA GPU Control & Monitor.");

    let runner = create_real_runner();

    if args.is_cli_mode() {
        let code = cli::run_cli(&args, &config, runner);
        std::process::exit(code);
    }

    run_gui(config, runner)
}

#[cfg(feature = "gui")]
fn run_gui(config: Config, runner: nvoc::SharedCommandRunner) -> Result<()> {
    use nvoc::error_messages::ErrorWithSolution;

    if let Err(e) = nvoc::system::check_system_dependencies() {
        tracing::error!("Cannot start GUI due to missing dependencies. Exiting.");
        eprintln!("{}", e.with_solution());
        std::process::exit(1);
    }

    nvoc::gui::run(config, runner).map_err(|e| anyhow::anyhow!("GUI error: {e}"))
}

#[cfg(not(feature = "gui"))]
fn run_gui(_config: Config, _runner: nvoc::SharedCommandRunner) -> Result<()> {
    eprintln!("nvoc was built without the graphical interface.");
    eprintln!("Use --fan/--core/--mem, --reset or --stats, or rebuild with `--features gui`.");
    std::process::exit(1);
}
