//! fastpush logging
//!
//! Installs a `tracing` subscriber configured from `FASTPUSH_*` environment
//! variables. Library crates only emit events through the `tracing` macros;
//! the binary calls [`init`] once at startup.
//!
//! # Usage
//!
//! ```rust
//! use fastpush_log::{debug, info};
//!
//! fastpush_log::init();
//!
//! info!("Using branch {} as a base for your deployment", "feature-x");
//! debug!(stack = "MyStack", "listing stack resources");
//! ```
//!
//! # Environment Variables
//!
//! - `FASTPUSH_DEBUG=1` - Enable debug logging
//! - `FASTPUSH_LOG_LEVEL=trace|debug|info|warn|error|off` - Set log level
//! - `FASTPUSH_LOG_FORMAT=compact|pretty|json` - Set output format (compact by default; json needs the `json` feature)
//! - `FASTPUSH_LOG_COLOR=1|0` - Enable/disable colors
//! - `FASTPUSH_LOG_MODULE=1|0` - Include the event target
//! - `RUST_LOG` - Overrides the level filter entirely when set

use once_cell::sync::OnceCell;
use std::env;
use tracing_subscriber::EnvFilter;

pub use tracing::{debug, error, info, trace, warn};

// ============================================================================
// Log Levels
// ============================================================================

/// Minimum level of events that get printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    /// Trace level (most verbose)
    Trace,
    /// Debug level
    Debug,
    /// Info level
    Info,
    /// Warning level
    Warn,
    /// Error level (least verbose)
    Error,
    /// Off (no logging)
    Off,
}

impl Level {
    /// Parse a level name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Some(Level::Trace),
            "debug" => Some(Level::Debug),
            "info" => Some(Level::Info),
            "warn" | "warning" => Some(Level::Warn),
            "error" => Some(Level::Error),
            "off" | "none" => Some(Level::Off),
            _ => None,
        }
    }

    /// Directive understood by [`EnvFilter`].
    pub fn as_directive(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Off => "off",
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_directive().to_uppercase())
    }
}

// ============================================================================
// Log Format
// ============================================================================

/// Output format for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Multi-line human readable output
    Pretty,
    /// Single-line output
    Compact,
    /// One JSON object per line
    Json,
}

impl Format {
    /// Parse a format name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pretty" => Some(Format::Pretty),
            "compact" => Some(Format::Compact),
            "json" => Some(Format::Json),
            _ => None,
        }
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Whether debug mode is enabled
    pub debug: bool,
    /// Minimum log level
    pub level: Level,
    /// Output format
    pub format: Format,
    /// Whether ANSI colors are enabled
    pub color: bool,
    /// Whether to include the event target (module path)
    pub module_path: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            debug: false,
            level: Level::Info,
            format: Format::Compact,
            color: false,
            module_path: false,
        }
    }
}

impl LogConfig {
    /// Build the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    ///
    /// `from_env` delegates here; tests pass a closure over a map so they never
    /// have to touch the process environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |key: &str| lookup(key).map(|v| v == "1" || v.eq_ignore_ascii_case("true"));

        let debug = flag("FASTPUSH_DEBUG").unwrap_or(false);

        let level = lookup("FASTPUSH_LOG_LEVEL")
            .and_then(|s| Level::parse(&s))
            .unwrap_or(if debug { Level::Debug } else { Level::Info });

        let format = lookup("FASTPUSH_LOG_FORMAT")
            .and_then(|s| Format::parse(&s))
            .unwrap_or(Format::Compact);

        let color = flag("FASTPUSH_LOG_COLOR")
            .unwrap_or_else(|| lookup("NO_COLOR").is_none() && lookup("TERM").is_some());

        let module_path = flag("FASTPUSH_LOG_MODULE").unwrap_or(debug);

        Self {
            debug,
            level,
            format,
            color,
            module_path,
        }
    }

    /// Raise the level to at least `Debug` (used by `--verbose`).
    pub fn verbose(mut self) -> Self {
        self.debug = true;
        if self.level > Level::Debug {
            self.level = Level::Debug;
        }
        self
    }

    /// Only print errors (used by `--quiet`).
    pub fn quiet(mut self) -> Self {
        self.level = Level::Error;
        self
    }

    /// Disable ANSI colors.
    pub fn no_color(mut self) -> Self {
        self.color = false;
        self
    }

    /// Filter used when `RUST_LOG` is not set.
    pub fn filter(&self) -> EnvFilter {
        EnvFilter::new(self.level.as_directive())
    }
}

// ============================================================================
// Public API
// ============================================================================

static INSTALLED: OnceCell<LogConfig> = OnceCell::new();

/// Initialize logging from the environment.
pub fn init() {
    init_with(LogConfig::from_env());
}

/// Initialize logging with an explicit configuration.
///
/// Only the first call installs a subscriber; later calls are no-ops.
pub fn init_with(config: LogConfig) {
    INSTALLED.get_or_init(|| {
        let filter = if env::var("RUST_LOG").is_ok() {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| config.filter())
        } else {
            config.filter()
        };

        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(config.color)
            .with_target(config.module_path)
            .with_writer(std::io::stderr);

        // An error here means another subscriber won the race (for example
        // one installed by a test harness); keep it.
        let _ = match config.format {
            Format::Pretty => builder.pretty().try_init(),
            Format::Compact => builder.compact().try_init(),
            #[cfg(feature = "json")]
            Format::Json => builder.json().try_init(),
            #[cfg(not(feature = "json"))]
            Format::Json => builder.compact().try_init(),
        };

        config
    });
}

/// Configuration of the installed subscriber, if [`init`] has run.
pub fn installed() -> Option<&'static LogConfig> {
    INSTALLED.get()
}

// ============================================================================
// Tests
// ============================================================================
