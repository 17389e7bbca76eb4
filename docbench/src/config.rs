//! Module-level configuration.
//!
//! Store options (hosts, credentials, pool sizes, timeouts) belong in the
//! connection string. What is configured here is the module itself: the
//! runtime that drives blocking calls and the application name reported to
//! the server.

use serde::{Deserialize, Serialize};
use tokio::runtime::{Builder, Runtime};

use crate::error::ModuleResult;

/// Default name for runtime worker threads.
pub const DEFAULT_THREAD_NAME: &str = "docbench-worker";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ModuleConfig {
    /// Runtime worker threads. `None` uses one per core.
    pub worker_threads: Option<usize>,
    pub thread_name: String,
    /// Application name sent to the server, unless the connection string sets one.
    pub app_name: Option<String>,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            worker_threads: None,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            app_name: None,
        }
    }
}

impl ModuleConfig {
    /// Reads a configuration from a host JSON value. Missing fields take their defaults.
    pub fn from_json(value: serde_json::Value) -> ModuleResult<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub(crate) fn build_runtime(&self) -> ModuleResult<Runtime> {
        let mut builder = Builder::new_multi_thread();
        builder.enable_all().thread_name(self.thread_name.clone());

        if let Some(threads) = self.worker_threads {
            builder.worker_threads(threads.max(1));
        }

        Ok(builder.build()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = ModuleConfig::from_json(json!({ "workerThreads": 2 })).unwrap();

        assert_eq!(config.worker_threads, Some(2));
        assert_eq!(config.thread_name, DEFAULT_THREAD_NAME);
        assert_eq!(config.app_name, None);
        assert_eq!(ModuleConfig::from_json(json!({})).unwrap(), ModuleConfig::default());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        assert!(ModuleConfig::from_json(json!({ "workerThreads": "many" })).is_err());
    }

    #[test]
    fn test_runtime_builds_with_zero_threads_clamped() {
        let config = ModuleConfig { worker_threads: Some(0), ..Default::default() };

        let runtime = config.build_runtime().unwrap();
        assert_eq!(runtime.block_on(async { 1 + 1 }), 2);
    }
}
