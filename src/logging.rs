//! Logging infrastructure - structured tracing for the marshaling layer
//!
//! Design: `tracing` events at every read, write and entry call, with:
//! - Zero cost when no subscriber is installed (the usual case inside a host)
//! - Env-configurable level, format and destination
//! - Daily rolling file output through a non-blocking writer

use once_cell::sync::OnceCell;
use tracing::Level;
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::encoding::ArrayEncoding;
use crate::error::MarshalError;
use crate::types::ElementType;

/// Global logging state
static LOGGER_INITIALIZED: OnceCell<()> = OnceCell::new();

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Compact,
    Json,
}

impl LogFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "pretty" => Some(Self::Pretty),
            "compact" => Some(Self::Compact),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Log output destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    Stderr,
    /// Daily rolling files
    File { directory: String, prefix: String },
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Emit span open/close events
    pub span_events: bool,
    /// Extra filter directives, e.g. "wlbridge::transfer=trace"
    pub filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Compact,
            output: LogOutput::Stderr,
            span_events: false,
            filter: None,
        }
    }
}

pub fn parse_level(value: &str) -> Option<Level> {
    match value.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Apply `WLBRIDGE_LOG_*` environment overrides
    pub fn apply_env(mut self) -> Self {
        // WLBRIDGE_LOG_LEVEL: trace, debug, info, warn, error
        if let Some(level) = std::env::var("WLBRIDGE_LOG_LEVEL").ok().as_deref().and_then(parse_level) {
            self.level = level;
        }

        // WLBRIDGE_LOG_FORMAT: pretty, compact, json
        if let Some(format) = std::env::var("WLBRIDGE_LOG_FORMAT").ok().as_deref().and_then(LogFormat::parse) {
            self.format = format;
        }

        // WLBRIDGE_LOG_DIR: switch to rolling file output
        if let Ok(directory) = std::env::var("WLBRIDGE_LOG_DIR") {
            self.output = LogOutput::File {
                directory,
                prefix: "wlbridge".to_string(),
            };
        }

        if std::env::var("WLBRIDGE_LOG_SPANS").is_ok() {
            self.span_events = true;
        }

        self
    }

    /// Defaults overridden by the environment
    pub fn from_env() -> Self {
        Self::default().apply_env()
    }

    /// Verbose config for debugging a misbehaving call site
    pub fn debug() -> Self {
        Self {
            level: Level::TRACE,
            format: LogFormat::Pretty,
            output: LogOutput::Stderr,
            span_events: true,
            filter: None,
        }
    }
}

/// Initialize logging from the environment
pub fn init() -> Option<WorkerGuard> {
    init_with_config(LogConfig::from_env())
}

/// Initialize logging with a custom configuration
///
/// Returns a guard that flushes buffered output on drop. Later calls, or
/// calls made while the host already installed a subscriber, are no-ops.
pub fn init_with_config(config: LogConfig) -> Option<WorkerGuard> {
    let mut guard = None;
    LOGGER_INITIALIZED.get_or_init(|| {
        let (writer, worker) = match &config.output {
            LogOutput::Stdout => tracing_appender::non_blocking(std::io::stdout()),
            LogOutput::Stderr => tracing_appender::non_blocking(std::io::stderr()),
            LogOutput::File { directory, prefix } => {
                tracing_appender::non_blocking(rolling::daily(directory, prefix))
            }
        };
        let filter = build_filter(&config);
        let spans = span_events_config(config.span_events);

        let layer = match config.format {
            LogFormat::Pretty => fmt::layer()
                .with_writer(writer)
                .pretty()
                .with_span_events(spans)
                .with_filter(filter)
                .boxed(),
            LogFormat::Compact => fmt::layer()
                .with_writer(writer)
                .compact()
                .with_span_events(spans)
                .with_filter(filter)
                .boxed(),
            LogFormat::Json => fmt::layer()
                .with_writer(writer)
                .json()
                .with_span_events(spans)
                .with_filter(filter)
                .boxed(),
        };

        if tracing_subscriber::registry().with(layer).try_init().is_ok() {
            guard = Some(worker);
        }
    });
    guard
}

/// Check if logging is initialized
pub fn is_initialized() -> bool {
    LOGGER_INITIALIZED.get().is_some()
}

fn build_filter(config: &LogConfig) -> EnvFilter {
    let base = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("wlbridge={}", config.level.as_str().to_lowercase())));

    match &config.filter {
        Some(directives) => directives.split(',').fold(base, |filter, directive| {
            match directive.trim().parse() {
                Ok(d) => filter.add_directive(d),
                Err(_) => filter,
            }
        }),
        None => base,
    }
}

fn span_events_config(enabled: bool) -> FmtSpan {
    if enabled {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    }
}

// ============================================================================
// Marshaling events
// ============================================================================

/// Log a decoded array argument
#[inline]
pub fn log_read(element: ElementType, rank: usize, encoding: ArrayEncoding) {
    tracing::debug!(
        target: "wlbridge::marshal",
        event = "read",
        element = element.name(),
        rank,
        encoding = encoding.name(),
        "argument decoded"
    );
}

/// Log an encoded array result
#[inline]
pub fn log_write(element: ElementType, rank: usize, encoding: ArrayEncoding) {
    tracing::debug!(
        target: "wlbridge::marshal",
        event = "write",
        element = element.name(),
        rank,
        encoding = encoding.name(),
        "result encoded"
    );
}

/// Log a symbolic result sent over the expression link
#[inline]
pub fn log_expression(rank: usize) {
    tracing::debug!(
        target: "wlbridge::marshal",
        event = "expression",
        rank,
        "result sent over expression link"
    );
}

/// Log a marshaling failure
pub fn log_marshal_error(operation: &str, error: &MarshalError) {
    tracing::warn!(
        target: "wlbridge::marshal",
        event = "marshal_error",
        operation,
        kind = error.kind(),
        code = error.code(),
        error = %error,
        "marshaling failed"
    );
}

/// Log an entry point call
#[inline]
pub fn log_entry_call(function: &str, args: usize) {
    tracing::debug!(
        target: "wlbridge::entry",
        event = "entry_call",
        function,
        args,
        "entry point called"
    );
}

/// Log an entry point return
#[inline]
pub fn log_entry_return(function: &str, code: i32) {
    tracing::trace!(
        target: "wlbridge::entry",
        event = "entry_return",
        function,
        code,
        "entry point returned"
    );
}
