//! Logging setup for the gateway.
//!
//! Structured logs via `tracing`, filterable through `RUST_LOG` or the
//! CLI verbosity flags. Request handling, retry backoff, and upstream
//! failures all emit here.

use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

/// Log level selected at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level
    Debug,
    /// Info level (default)
    #[default]
    Info,
    /// Warning level
    Warn,
    /// Errors only
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl LogLevel {
    /// Map CLI flags to a level: quiet wins, then verbosity count
    /// (0 = info, 1+ = debug).
    pub fn from_flags(quiet: bool, verbosity: u8) -> Self {
        if quiet {
            LogLevel::Error
        } else if verbosity > 0 {
            LogLevel::Debug
        } else {
            LogLevel::Info
        }
    }

    fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Initialize the global tracing subscriber.
///
/// Call once at startup. `RUST_LOG` takes precedence over the configured
/// level when set.
pub fn init_logging(level: LogLevel) {
    let env_filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(level.as_directive())
    };

    fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}
