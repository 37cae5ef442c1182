//! Structured file logging. Stdout carries the host channel, so tracing
//! output only ever goes to `<data-dir>/logs/agentlink.log`.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use crate::paths;

const DEFAULT_FILTER: &str = "info,tower_http=warn,hyper=warn";
const DEBUG_FILTER: &str = "debug,hyper=info";
const LOG_FILE: &str = "agentlink.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Logging knobs, read from `AGENTLINK_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub filter: String,
    pub format: LogFormat,
    pub truncate_on_start: bool,
}

impl LogSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// `AGENTLINK_LOG_FILTER` wins over `RUST_LOG`; `AGENTLINK_DEBUG=1`
    /// only applies when neither is set. Invalid directives fall back to
    /// the default rather than failing startup.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let fallback = if is_true(lookup("AGENTLINK_DEBUG")) {
            DEBUG_FILTER
        } else {
            DEFAULT_FILTER
        };
        let filter = lookup("AGENTLINK_LOG_FILTER")
            .or_else(|| lookup("RUST_LOG"))
            .filter(|directives| EnvFilter::try_new(directives).is_ok())
            .unwrap_or_else(|| fallback.to_string());

        let format = match lookup("AGENTLINK_LOG_FORMAT") {
            Some(value) if value.eq_ignore_ascii_case("pretty") => LogFormat::Pretty,
            _ => LogFormat::Json,
        };

        Self {
            filter,
            format,
            truncate_on_start: is_true(lookup("AGENTLINK_TRUNCATE_LOG_ON_START")),
        }
    }
}

fn is_true(value: Option<String>) -> bool {
    matches!(value.as_deref(), Some("1" | "true" | "yes"))
}

/// Flushes buffered log lines when dropped. Hold it until shutdown.
pub struct LoggingGuard {
    _writer: WorkerGuard,
}

pub fn init_logging(data_dir: &Path, settings: &LogSettings) -> anyhow::Result<LoggingGuard> {
    let log_dir = paths::log_dir(data_dir);
    std::fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join(LOG_FILE);
    if settings.truncate_on_start {
        std::fs::File::create(&log_path)?;
    }

    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(&log_dir, LOG_FILE));

    let file_layer: Box<dyn Layer<Registry> + Send + Sync> = match settings.format {
        LogFormat::Json => fmt::layer()
            .with_writer(writer)
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_target(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .pretty()
            .with_file(true)
            .with_line_number(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(file_layer)
        .with(EnvFilter::try_new(&settings.filter)?)
        .try_init()?;

    tracing::info!(
        component = "logging",
        event = "logging.initialized",
        log_path = %log_path.display(),
        format = ?settings.format,
        filter = %settings.filter,
        pid = std::process::id(),
    );

    Ok(LoggingGuard { _writer: guard })
}
