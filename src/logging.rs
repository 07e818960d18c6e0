use crate::NvResult;
use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use tracing::{Event, Subscriber, info};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const TIMESTAMP: &str = "%Y-%m-%d %H:%M:%S,%3f";

/// `2025-01-31 14:02:11,482` style timestamps
struct LocalTime;

impl FormatTime for LocalTime {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format(TIMESTAMP))
    }
}

/// `<timestamp> - LEVEL - message` lines for the log file
struct LogFileFormat;

impl<S, N> FormatEvent<S, N> for LogFileFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        write!(
            writer,
            "{} - {} - ",
            chrono::Local::now().format(TIMESTAMP),
            event.metadata().level()
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Install the global subscriber: the log file at `log_path` (truncated) plus
/// stderr. Call once at startup.
pub fn init_logging(log_path: &Path) -> NvResult<()> {
    let file = File::create(log_path)?;

    let filter = match EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => EnvFilter::new("info"),
    };

    let file_layer = fmt::layer()
        .event_format(LogFileFormat)
        .with_ansi(false)
        .with_writer(Mutex::new(file));

    let stderr_layer = fmt::layer()
        .with_timer(LocalTime)
        .with_target(false)
        .with_writer(std::io::stderr);

    // A subscriber may already be installed (tests, embedding); keep it.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init();

    info!("Logging to {}", log_path.display());
    Ok(())
}
