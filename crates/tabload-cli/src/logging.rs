//! Logging setup for the `tabload` binary
//!
//! Human readable output goes to stderr so stdout only carries command
//! results. An optional JSON file layer rotates daily.

use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Directory receiving JSON log files; none disables the file layer
    pub log_dir: Option<PathBuf>,

    /// Whether to include file/line information in console output
    pub include_location: bool,

    /// Whether to log span open/close events
    pub enable_spans: bool,

    /// Filter used when `RUST_LOG` is unset
    pub default_filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: None,
            include_location: cfg!(debug_assertions),
            enable_spans: false,
            default_filter: "warn,tabload=info,tabload_import=info,tabload_driver_mysql=info"
                .to_string(),
        }
    }
}

impl LoggingConfig {
    /// Debug level for every tabload crate, with span events
    pub fn verbose() -> Self {
        Self {
            enable_spans: true,
            default_filter:
                "info,tabload=debug,tabload_import=debug,tabload_driver_mysql=debug,tabload_core=debug"
                    .to_string(),
            ..Self::default()
        }
    }

    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    fn env_filter(&self) -> EnvFilter {
        // RUST_LOG takes precedence over the default filter
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.default_filter))
    }
}

/// Install the global subscriber.
///
/// The returned guard flushes the JSON file layer and must be held until exit.
pub fn init(config: LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
    // NEW fires once when the span is created; ENTER would fire on every async
    // re-poll of an awaited future.
    let span_events = if config.enable_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let mut layers = Vec::new();

    let console_layer = fmt::layer()
        .with_target(true)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_span_events(span_events.clone())
        .with_writer(std::io::stderr)
        .pretty()
        .with_filter(config.env_filter())
        .boxed();
    layers.push(console_layer);

    let mut guard = None;
    if let Some(log_dir) = &config.log_dir {
        std::fs::create_dir_all(log_dir)?;
        let file_appender = tracing_appender::rolling::daily(log_dir, "tabload.log");
        let (non_blocking, worker_guard) = tracing_appender::non_blocking(file_appender);
        guard = Some(worker_guard);

        let json_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_span_events(span_events)
            .with_ansi(false)
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(non_blocking)
            .with_filter(config.env_filter())
            .boxed();
        layers.push(json_layer);
    }

    tracing_subscriber::registry().with(layers).try_init()?;

    tracing::debug!(
        log_dir = ?config.log_dir,
        spans = config.enable_spans,
        "logging initialized"
    );

    Ok(guard)
}
