//! Bridge configuration, layered with figment.
//!
//! Precedence (lowest to highest):
//! 1. Built-in defaults
//! 2. `FOB_BRIDGE_*` environment variables

use figment::{
    Figment,
    providers::{Env, Serialized},
};
use fob_engine::logging::LogLevel;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const ENV_PREFIX: &str = "FOB_BRIDGE_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Runtime worker threads. `None` uses one per core.
    pub worker_threads: Option<usize>,

    /// Name given to runtime threads.
    pub thread_name: String,

    /// Install a log subscriber at this level when the bridge starts.
    pub log_level: Option<LogLevel>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            worker_threads: None,
            thread_name: "fob-bridge".to_string(),
            log_level: None,
        }
    }
}

impl BridgeConfig {
    pub fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(BridgeConfig::default()))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    pub fn load() -> Result<Self> {
        Self::from_figment(Self::figment())
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: BridgeConfig = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.worker_threads == Some(0) {
            return Err(crate::BridgeError::Config(
                "worker_threads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BridgeError;
    use figment::Jail;

    #[test]
    fn test_defaults() {
        Jail::expect_with(|_jail| {
            let config = BridgeConfig::load().expect("defaults load");
            assert_eq!(config, BridgeConfig::default());
            assert_eq!(config.thread_name, "fob-bridge");
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides() {
        Jail::expect_with(|jail| {
            jail.set_env("FOB_BRIDGE_WORKER_THREADS", "3");
            jail.set_env("FOB_BRIDGE_THREAD_NAME", "host-build");
            jail.set_env("FOB_BRIDGE_LOG_LEVEL", "debug");

            let config = BridgeConfig::load().expect("env config loads");
            assert_eq!(config.worker_threads, Some(3));
            assert_eq!(config.thread_name, "host-build");
            assert_eq!(config.log_level, Some(LogLevel::Debug));
            Ok(())
        });
    }

    #[test]
    fn test_log_level_aliases() {
        Jail::expect_with(|jail| {
            jail.set_env("FOB_BRIDGE_LOG_LEVEL", "warning");
            assert_eq!(BridgeConfig::load().unwrap().log_level, Some(LogLevel::Warn));
            Ok(())
        });
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        Jail::expect_with(|jail| {
            jail.set_env("FOB_BRIDGE_WORKER_THREADS", "many");
            assert!(matches!(BridgeConfig::load(), Err(BridgeError::Config(_))));

            jail.set_env("FOB_BRIDGE_WORKER_THREADS", "0");
            assert!(matches!(BridgeConfig::load(), Err(BridgeError::Config(_))));
            Ok(())
        });
    }
}
