//! Unified logging module
//!
//! Console plus daily rolling file output behind one global `EnvFilter`.

use std::path::PathBuf;
use std::sync::OnceLock;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::Writer, FmtContext, FormatEvent, FormatFields},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Environment variable overriding the log root directory
pub const LOG_DIR_ENV: &str = "ECONET_LOG_DIR";

/// Custom format for log level with brackets: `[INFO]`, `[WARN]`, etc.
fn format_level(level: &Level) -> &'static str {
    match *level {
        Level::TRACE => "[TRACE]",
        Level::DEBUG => "[DEBUG]",
        Level::INFO => "[INFO]",
        Level::WARN => "[WARN]",
        Level::ERROR => "[ERROR]",
    }
}

/// Custom event formatter that outputs: `timestamp [LEVEL] message`
///
/// Example output: `2025-12-02T00:50:44.809Z [INFO] Service started`
struct BracketedLevelFormat;

impl<S, N> FormatEvent<S, N> for BracketedLevelFormat
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
        let now = chrono::Utc::now();
        write!(writer, "{} ", now.format("%Y-%m-%dT%H:%M:%S%.3fZ"))?;

        let level = *event.metadata().level();
        if writer.has_ansi_escapes() {
            let color = match level {
                Level::TRACE => "\x1b[35m",
                Level::DEBUG => "\x1b[34m",
                Level::INFO => "\x1b[32m",
                Level::WARN => "\x1b[33m",
                Level::ERROR => "\x1b[31m",
            };
            write!(writer, "{}{}\x1b[0m ", color, format_level(&level))?;
        } else {
            write!(writer, "{} ", format_level(&level))?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

// Keeps the non-blocking file writer alive for the process lifetime
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

// ============================================================================
// Log Root Directory Configuration
// ============================================================================

/// Global log root directory
/// Priority: ECONET_LOG_DIR env > config_dir > default "logs"
static LOG_ROOT: OnceLock<PathBuf> = OnceLock::new();

/// Initialize log root directory from config or environment
///
/// Call before `init_with_config`; later calls are ignored.
pub fn init_log_root(config_dir: Option<&str>) {
    LOG_ROOT.get_or_init(|| resolve_log_root(std::env::var(LOG_DIR_ENV).ok(), config_dir));
}

/// Get log root directory
pub fn get_log_root() -> PathBuf {
    LOG_ROOT
        .get()
        .cloned()
        .unwrap_or_else(|| resolve_log_root(std::env::var(LOG_DIR_ENV).ok(), None))
}

fn resolve_log_root(env_dir: Option<String>, config_dir: Option<&str>) -> PathBuf {
    env_dir
        .filter(|d| !d.is_empty())
        .map(PathBuf::from)
        .or_else(|| config_dir.filter(|d| !d.is_empty()).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("logs"))
}

/// Logger configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Service name, also the log file prefix
    pub service_name: String,
    /// Directory for log files
    pub log_dir: PathBuf,
    /// Default level when RUST_LOG is not set
    pub console_level: Level,
    /// Write log files at all (CLI one-shots run console only)
    pub enable_file: bool,
    /// JSON format for the file layer
    pub enable_json: bool,
    /// ANSI colors on the console
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".to_string(),
            log_dir: get_log_root(),
            console_level: Level::INFO,
            enable_file: true,
            enable_json: false,
            ansi: true,
        }
    }
}

/// Filter directive used when RUST_LOG is absent
///
/// The protocol crate follows the console level so `-l debug` shows frame dumps.
pub fn default_filter(config: &LogConfig) -> String {
    let level = config.console_level.as_str().to_lowercase();
    format!(
        "{level},{}={level},econet_protocol={level}",
        config.service_name
    )
}

/// Initialize logging system with configuration
pub fn init_with_config(config: LogConfig) -> anyhow::Result<()> {
    let filter_str = match std::env::var("RUST_LOG") {
        Ok(env_str) if !env_str.trim().is_empty() => env_str,
        _ => default_filter(&config),
    };
    let env_filter = EnvFilter::try_new(&filter_str)
        .map_err(|e| anyhow::anyhow!("Invalid log filter '{}': {}", filter_str, e))?;

    // Custom format: 2025-12-02T00:50:44.809Z [INFO] message
    let console_layer = fmt::layer()
        .with_ansi(config.ansi)
        .event_format(BracketedLevelFormat)
        .boxed();

    let file_layer = if config.enable_file {
        std::fs::create_dir_all(&config.log_dir)?;
        let appender = tracing_appender::rolling::daily(
            &config.log_dir,
            format!("{}.log", config.service_name),
        );
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);

        let layer = if config.enable_json {
            fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_level(true)
                .with_target(true)
                .boxed()
        } else {
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .event_format(BracketedLevelFormat)
                .boxed()
        };
        Some(layer)
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Logging already initialized: {}", e))?;

    if config.enable_file {
        tracing::debug!("Logging: {} @ {:?}", config.service_name, config.log_dir);
    }

    Ok(())
}

/// Parse a CLI/config level string, defaulting to INFO
pub fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}
