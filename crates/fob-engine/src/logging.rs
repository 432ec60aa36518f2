//! Logging setup for hosts embedding the engine.
//!
//! This module is only available with the `logging` feature.
//!
//! The engine only emits tracing events. Hosts that already run a subscriber
//! need nothing from here.

use std::sync::Once;

use serde::{Deserialize, Serialize};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Log level for bridge and engine output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// No logging output
    #[serde(alias = "off")]
    Silent,
    /// Only errors
    Error,
    /// Errors and warnings
    #[serde(alias = "warning")]
    Warn,
    /// Errors, warnings, and info (default)
    #[default]
    Info,
    /// All logs including debug
    Debug,
}

impl LogLevel {
    /// Convert to tracing filter string
    fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Silent => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "silent" | "off" => Ok(LogLevel::Silent),
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            other => Err(format!("Invalid log level: {other}")),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_filter())
    }
}

/// Install a global subscriber at `level`, unless `RUST_LOG` says otherwise.
///
/// Only the first call in a process has any effect. Returns `false` when a
/// subscriber was already installed, by us or by the host.
pub fn init_logging(level: LogLevel) -> bool {
    let mut installed = false;
    INIT.call_once(|| {
        let filter = EnvFilter::builder()
            .with_default_directive(level_directive(level))
            .from_env_lossy();

        installed = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_target(false).without_time())
            .try_init()
            .is_ok();
    });
    installed
}

fn level_directive(level: LogLevel) -> tracing_subscriber::filter::Directive {
    let filter = match level {
        LogLevel::Silent => tracing_subscriber::filter::LevelFilter::OFF,
        LogLevel::Error => tracing_subscriber::filter::LevelFilter::ERROR,
        LogLevel::Warn => tracing_subscriber::filter::LevelFilter::WARN,
        LogLevel::Info => tracing_subscriber::filter::LevelFilter::INFO,
        LogLevel::Debug => tracing_subscriber::filter::LevelFilter::DEBUG,
    };
    filter.into()
}
