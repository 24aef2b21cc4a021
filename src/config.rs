//! Configuration module for the payout daemon
//!
//! Configuration lives in `<home>/config.toml` and is written by the `init`
//! subcommand. Command-line flags override individual values per run.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Chain parameters
    pub chain: ChainConfig,

    /// RPC endpoint configuration
    pub rpc: RpcConfig,

    /// Monitoring and metrics
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Chain identifier included in every sign-doc
    pub chain_id: String,

    /// Human-readable account address prefix
    #[serde(default = "default_account_prefix")]
    pub account_prefix: String,

    /// Default signing key name
    #[serde(default = "default_key_name")]
    pub key: String,

    /// Directory holding keypair files, relative to home unless absolute
    #[serde(default = "default_key_dir")]
    pub key_directory: String,

    /// Gas price in base units per gas unit
    #[serde(default = "default_gas_price")]
    pub gas_price: f64,

    /// Multiplier applied to simulated gas
    #[serde(default = "default_gas_adjustment")]
    pub gas_adjustment: f64,

    /// Upper bound on automatic resends of a non-included batch in the
    /// single-pass flow
    #[serde(default = "default_max_resends")]
    pub max_resends: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Chain gateway JSON-RPC endpoint
    pub endpoint: String,

    /// Broadcast timeout in seconds
    #[serde(default = "default_broadcast_timeout")]
    pub broadcast_timeout_secs: u64,

    /// Per-attempt block inclusion wait in seconds
    #[serde(default = "default_inclusion_timeout")]
    pub inclusion_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Enable the Prometheus metrics endpoint during `start`
    #[serde(default)]
    pub enable_metrics: bool,

    /// Metrics port
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enable_metrics: false,
            metrics_port: default_metrics_port(),
        }
    }
}

// Default value functions
fn default_account_prefix() -> String {
    "baby".to_string()
}
fn default_key_name() -> String {
    "mpay".to_string()
}
fn default_key_dir() -> String {
    "keys".to_string()
}
fn default_gas_price() -> f64 {
    0.002
}
fn default_gas_adjustment() -> f64 {
    1.1
}
fn default_max_resends() -> u32 {
    10
}
fn default_broadcast_timeout() -> u64 {
    35
}
fn default_inclusion_timeout() -> u64 {
    35
}
fn default_metrics_port() -> u16 {
    9090
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Path of the config file under a home directory
    pub fn file_path(home: &Path) -> PathBuf {
        home.join("config.toml")
    }

    /// Write this configuration to `<home>/config.toml`
    pub fn write_to_home(&self, home: &Path) -> anyhow::Result<()> {
        let rendered = toml::to_string_pretty(self)?;
        std::fs::write(Self::file_path(home), rendered)?;
        Ok(())
    }

    /// Resolved key directory (absolute, or joined onto `home`)
    pub fn key_dir(&self, home: &Path) -> PathBuf {
        let dir = PathBuf::from(&self.chain.key_directory);
        if dir.is_absolute() {
            dir
        } else {
            home.join(dir)
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chain: ChainConfig {
                chain_id: "baby-devnet-1".to_string(),
                account_prefix: default_account_prefix(),
                key: default_key_name(),
                key_directory: default_key_dir(),
                gas_price: default_gas_price(),
                gas_adjustment: default_gas_adjustment(),
                max_resends: default_max_resends(),
            },
            rpc: RpcConfig {
                endpoint: "http://localhost:26657".to_string(),
                broadcast_timeout_secs: default_broadcast_timeout(),
                inclusion_timeout_secs: default_inclusion_timeout(),
            },
            monitoring: MonitoringConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrips_through_toml() {
        let config = Config::default();
        let rendered = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.chain.chain_id, config.chain.chain_id);
        assert_eq!(parsed.rpc.endpoint, config.rpc.endpoint);
        assert_eq!(parsed.chain.max_resends, 10);
    }

    #[test]
    fn missing_optional_fields_take_defaults() {
        let minimal = r#"
            [chain]
            chain_id = "baby-test-2"

            [rpc]
            endpoint = "http://node:26657"
        "#;
        let config: Config = toml::from_str(minimal).unwrap();
        assert_eq!(config.chain.account_prefix, "baby");
        assert_eq!(config.chain.gas_adjustment, 1.1);
        assert_eq!(config.rpc.inclusion_timeout_secs, 35);
        assert!(!config.monitoring.enable_metrics);
    }
}
