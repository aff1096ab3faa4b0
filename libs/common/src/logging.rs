//! Unified logging module for tempudp services
//!
//! Console output always; an optional daily rolling file (plain or JSON) when a
//! log directory is configured. The level filter can be swapped at runtime.

use std::path::PathBuf;
use std::sync::OnceLock;

use errors::{TempUdpError, TempUdpResult};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::Writer, FmtContext, FormatEvent, FormatFields},
    layer::SubscriberExt,
    registry::LookupSpan,
    reload,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Bracketed tag and ANSI color for a level
fn level_style(level: Level) -> (&'static str, &'static str) {
    match level {
        Level::TRACE => ("[TRACE]", "\x1b[35m"),
        Level::DEBUG => ("[DEBUG]", "\x1b[34m"),
        Level::INFO => ("[INFO]", "\x1b[32m"),
        Level::WARN => ("[WARN]", "\x1b[33m"),
        Level::ERROR => ("[ERROR]", "\x1b[31m"),
    }
}

/// One line per event: `2025-12-02T00:50:44.809123Z [INFO] message fields`
struct LineFormat;

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let stamp = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ");
        let (tag, color) = level_style(*event.metadata().level());
        if writer.has_ansi_escapes() {
            write!(writer, "{} {}{}\x1b[0m ", stamp, color, tag)?;
        } else {
            write!(writer, "{} {} ", stamp, tag)?;
        }
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

// Keeps the non-blocking file writer alive for the process lifetime
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

type FilterHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;
static FILTER_HANDLE: OnceLock<FilterHandle> = OnceLock::new();

/// Logger configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Service name, used as the log file prefix
    pub service_name: String,
    /// Filter directive, e.g. "info" or "info,tempsrv=debug"
    pub level: String,
    /// Directory for the rolling log file; console only when `None`
    pub log_dir: Option<PathBuf>,
    /// JSON lines in the log file instead of the bracketed text format
    pub enable_json: bool,
    /// Colored console output
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "tempsrv".to_string(),
            level: "info".to_string(),
            log_dir: None,
            enable_json: false,
            ansi: true,
        }
    }
}

fn parse_filter(directive: &str) -> TempUdpResult<EnvFilter> {
    EnvFilter::try_new(directive).map_err(|e| {
        TempUdpError::invalid_config("logging.level", format!("'{}': {}", directive, e))
    })
}

/// `RUST_LOG` wins over the configured level
fn initial_filter(config: &LogConfig) -> TempUdpResult<EnvFilter> {
    match std::env::var("RUST_LOG") {
        Ok(env) if !env.trim().is_empty() => parse_filter(&env),
        _ => parse_filter(&config.level),
    }
}

/// Initialize logging system with configuration
pub fn init_with_config(config: LogConfig) -> TempUdpResult<()> {
    let (reload_filter, reload_handle) = reload::Layer::new(initial_filter(&config)?);
    let _ = FILTER_HANDLE.set(reload_handle);

    let registry = tracing_subscriber::registry().with(reload_filter);

    let console_layer = fmt::layer()
        .with_ansi(config.ansi)
        .event_format(LineFormat)
        .boxed();

    let file_layer = match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender =
                tracing_appender::rolling::daily(dir, format!("{}.log", config.service_name));
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);

            let layer = if config.enable_json {
                fmt::layer()
                    .json()
                    .with_writer(non_blocking)
                    .with_target(true)
                    .boxed()
            } else {
                fmt::layer()
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .event_format(LineFormat)
                    .boxed()
            };
            Some(layer)
        },
        None => None,
    };

    registry
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| TempUdpError::StartupFailed(format!("logging init: {}", e)))?;

    match &config.log_dir {
        Some(dir) => tracing::info!("Logging: {} @ {:?}", config.service_name, dir),
        None => tracing::info!("Logging: {} (console only)", config.service_name),
    }

    Ok(())
}

/// Swap the active filter, e.g. `"debug"` or `"info,tempsrv=trace"`
pub fn set_log_level(directive: &str) -> TempUdpResult<()> {
    let handle = FILTER_HANDLE
        .get()
        .ok_or_else(|| TempUdpError::Configuration("logging is not initialized".to_string()))?;
    handle
        .reload(parse_filter(directive)?)
        .map_err(|e| TempUdpError::Configuration(format!("log filter reload: {}", e)))?;

    tracing::info!("Log filter changed to {}", directive);
    Ok(())
}

/// Active filter directive, `"unknown"` before [`init_with_config`]
pub fn get_log_level() -> String {
    FILTER_HANDLE
        .get()
        .and_then(|handle| handle.with_current(|filter| filter.to_string()).ok())
        .unwrap_or_else(|| "unknown".to_string())
}
