//! Tokio runtime owned by a [`Bridge`](crate::Bridge).
//!
//! Synchronous entry points block the calling thread on this runtime.
//! Asynchronous ones run on its blocking pool so that a completion callback
//! may call back into the synchronous API.

use tokio::runtime::{Builder, Runtime};

use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};

pub fn build_runtime(config: &BridgeConfig) -> Result<Runtime> {
    let mut builder = Builder::new_multi_thread();
    builder.enable_all().thread_name(config.thread_name.clone());
    if let Some(threads) = config.worker_threads {
        builder.worker_threads(threads);
    }
    let runtime = builder
        .build()
        .map_err(|e| BridgeError::Runtime(e.to_string()))?;
    tracing::debug!(
        worker_threads = ?config.worker_threads,
        thread_name = %config.thread_name,
        "started bridge runtime"
    );
    Ok(runtime)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_uses_configured_thread_name() {
        let config = BridgeConfig {
            worker_threads: Some(1),
            thread_name: "fob-test-worker".to_string(),
            log_level: None,
        };
        let runtime = build_runtime(&config).unwrap();
        let name = runtime
            .block_on(async {
                tokio::spawn(async { std::thread::current().name().map(str::to_string) })
                    .await
                    .unwrap()
            })
            .unwrap();
        assert_eq!(name, "fob-test-worker");
    }
}
