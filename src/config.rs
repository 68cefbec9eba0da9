use std::{collections::HashMap, fs, path::Path};

use serde::Deserialize;

use crate::{Result, RuleHubError};

/// Default capacity of the per-chain debug ring.
pub const DEFAULT_MAX_NODE_LOG_SIZE: usize = 40;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// number of async worker threads, range [1, 32768), defaults to 4
    pub async_worker_thread_number: u16,
    /// log every node trace event
    pub debug: bool,
    /// debug records kept per chain, 0 falls back to the default of 40
    pub max_node_log_size: usize,
    /// number of chains whose debug records are retained
    pub max_debug_chains: usize,
    /// pending events buffered per debug observer
    pub observer_queue_size: usize,
    /// tenants initialised when the hub launches
    pub tenants: Vec<String>,
    /// global properties passed to the rule engine
    pub global: HashMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            async_worker_thread_number: 4,
            debug: false,
            max_node_log_size: DEFAULT_MAX_NODE_LOG_SIZE,
            max_debug_chains: 1024,
            observer_queue_size: 1024,
            tenants: Vec::new(),
            global: HashMap::new(),
        }
    }
}

impl Config {
    pub fn create<T: AsRef<Path>>(path: T) -> Result<Self> {
        let data = fs::read_to_string(path.as_ref()).map_err(|e| RuleHubError::Config(format!("failed to load config file {:?}: {}", path.as_ref(), e)))?;

        Self::load_from_str(data.as_str())
    }

    pub fn load_from_str(toml_str: &str) -> Result<Self> {
        let config = toml::from_str::<Config>(toml_str)?;
        Ok(config)
    }

    /// Ring capacity with the zero-means-default rule applied.
    pub fn node_log_size(&self) -> usize {
        if self.max_node_log_size == 0 {
            DEFAULT_MAX_NODE_LOG_SIZE
        } else {
            self.max_node_log_size
        }
    }
}

#[cfg(test)]
mod test {
    use crate::Config;

    #[test]
    fn test_config_deserialize() {
        let toml_str = r#"
        async_worker_thread_number = 10
        debug = true
        max_node_log_size = 0
        tenants = ["alice", "bob"]

        [global]
        region = "eu"
        "#;
        let config = Config::load_from_str(toml_str).unwrap();
        assert_eq!(config.async_worker_thread_number, 10);
        assert!(config.debug);
        assert_eq!(config.node_log_size(), 40);
        assert_eq!(config.tenants, vec!["alice".to_string(), "bob".to_string()]);
        assert_eq!(config.global.get("region").map(String::as_str), Some("eu"));
        assert_eq!(config.observer_queue_size, 1024);
    }

    #[test]
    fn test_config_invalid_toml() {
        assert!(Config::load_from_str("debug = ").is_err());
    }
}
