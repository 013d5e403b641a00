use serde::{Deserialize, Serialize};

fn default_db_path() -> String {
    "data/dag_storage".to_string()
}

fn default_port() -> u16 {
    4040
}

fn default_validators_dir() -> String {
    "config/validators".to_string()
}

fn default_window_size() -> usize {
    100
}

fn default_batch_size() -> usize {
    10
}

fn default_processing_interval_ms() -> u64 {
    100
}

/// Configuration knobs recognized by Kylix (spec.md §6). Deserializable
/// from TOML; `node_id` falls back to the `NODE_ID` environment variable
/// when absent, as specified.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KylixConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default)]
    pub node_id: Option<String>,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_validators_dir")]
    pub validators_dir: String,

    #[serde(default)]
    pub variable_mappings: std::collections::HashMap<String, String>,

    #[serde(default = "default_window_size")]
    pub performance_window_size: usize,

    #[serde(default = "default_batch_size")]
    pub queue_batch_size: usize,

    #[serde(default = "default_processing_interval_ms")]
    pub queue_processing_interval_ms: u64,
}

impl Default for KylixConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            node_id: None,
            port: default_port(),
            validators_dir: default_validators_dir(),
            variable_mappings: Default::default(),
            performance_window_size: default_window_size(),
            queue_batch_size: default_batch_size(),
            queue_processing_interval_ms: default_processing_interval_ms(),
        }
    }
}

impl KylixConfig {
    /// Parse from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Resolve the effective node id: the configured value, else the
    /// `NODE_ID` environment variable, else `None`.
    pub fn resolved_node_id(&self) -> Option<String> {
        self.node_id
            .clone()
            .or_else(|| std::env::var("NODE_ID").ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = KylixConfig::default();
        assert_eq!(cfg.db_path, "data/dag_storage");
        assert_eq!(cfg.port, 4040);
        assert_eq!(cfg.validators_dir, "config/validators");
        assert_eq!(cfg.performance_window_size, 100);
        assert_eq!(cfg.queue_batch_size, 10);
        assert_eq!(cfg.queue_processing_interval_ms, 100);
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let cfg = KylixConfig::from_toml("port = 9090\n").unwrap();
        assert_eq!(cfg.port, 9090);
        assert_eq!(cfg.db_path, "data/dag_storage");
    }

    #[test]
    fn node_id_falls_back_to_env_var() {
        std::env::set_var("NODE_ID", "node-from-env");
        let cfg = KylixConfig::default();
        assert_eq!(cfg.resolved_node_id().as_deref(), Some("node-from-env"));
        std::env::remove_var("NODE_ID");
    }
}
