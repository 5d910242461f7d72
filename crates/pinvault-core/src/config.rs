use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{PinvaultError, PinvaultResult};

/// Top-level configuration (loaded from pinvault.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PinvaultConfig {
    pub storage: StorageConfig,
    pub crypto: CryptoConfig,
    pub registry: RegistryConfig,
    pub ledger: LedgerConfig,
    pub gas: GasConfig,
    pub pinning: PinningConfig,
    pub logging: LoggingConfig,
}

impl PinvaultConfig {
    /// Reject settings that would make pricing or key derivation unsafe.
    pub fn validate(&self) -> PinvaultResult<()> {
        if self.crypto.pbkdf2_iterations == 0 {
            return Err(PinvaultError::Config(
                "crypto.pbkdf2_iterations must be greater than zero".into(),
            ));
        }
        if self.gas.price_buffer < 1.0 || self.gas.limit_buffer < 1.0 {
            return Err(PinvaultError::Config(
                "gas.price_buffer and gas.limit_buffer must be >= 1.0".into(),
            ));
        }
        if self.gas.balance_margin < 1.0 {
            return Err(PinvaultError::Config(
                "gas.balance_margin must be >= 1.0".into(),
            ));
        }
        if self.gas.default_limit > self.gas.max_limit {
            return Err(PinvaultError::Config(format!(
                "gas.default_limit ({}) exceeds gas.max_limit ({})",
                self.gas.default_limit, self.gas.max_limit
            )));
        }
        if let Some(max) = self.gas.max_price_gwei {
            if max < self.gas.min_price_gwei {
                return Err(PinvaultError::Config(format!(
                    "gas.max_price_gwei ({max}) is below gas.min_price_gwei ({})",
                    self.gas.min_price_gwei
                )));
            }
        }
        if self.pinning.min_duration_days > self.pinning.max_duration_days {
            return Err(PinvaultError::Config(format!(
                "pinning.min_duration_days ({}) exceeds pinning.max_duration_days ({})",
                self.pinning.min_duration_days, self.pinning.max_duration_days
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// IPFS node HTTP API
    Ipfs,
    /// Local directory through OpenDAL (offline use)
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// IPFS HTTP API base (default: http://127.0.0.1:5001)
    pub api_url: String,
    /// Public gateway prefix used for shareable links
    pub gateway_url: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Root directory for the local backend
    pub local_root: PathBuf,
    /// Refuse plaintext HTTP endpoints that are not loopback
    pub enforce_tls: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// PBKDF2-HMAC-SHA256 iteration count (default: 100000)
    pub pbkdf2_iterations: u32,
    /// Largest plaintext accepted for upload, in MiB
    pub max_file_size_mb: u64,
    /// Check the plaintext hash after decryption before writing
    pub verify_integrity: bool,
}

impl CryptoConfig {
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb * 1024 * 1024
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// JSON registry file
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Network name: sepolia, mainnet, polygon, arbitrum
    pub network: String,
    /// Override for the network's default RPC endpoint
    pub rpc_url: Option<String>,
    /// Override for the network's chain id (custom networks)
    pub chain_id: Option<u64>,
    /// Deployed pinning contract address (0x-prefixed)
    pub contract_address: String,
    /// Receipt wait per transaction, seconds (default: 120)
    pub receipt_timeout_secs: u64,
    /// Receipt polling interval, milliseconds
    pub receipt_poll_interval_ms: u64,
    /// JSON-RPC request timeout, seconds
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GasConfig {
    /// Multiplier applied to the node's gas price in auto mode
    pub price_buffer: f64,
    /// Multiplier applied to estimated gas
    pub limit_buffer: f64,
    /// Floor for any resolved gas price, in Gwei
    pub min_price_gwei: f64,
    /// Optional ceiling for any resolved gas price, in Gwei
    pub max_price_gwei: Option<f64>,
    /// Gas limit used when estimation fails
    pub default_limit: u64,
    /// Cap on buffered gas estimates
    pub max_limit: u64,
    /// Flat per-file gas assumption for the pre-flight quote
    pub preflight_gas_per_file: u64,
    /// Required balance as a multiple of the quoted total
    pub balance_margin: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PinningConfig {
    pub default_duration_days: u32,
    pub min_duration_days: u32,
    pub max_duration_days: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Ipfs,
            api_url: "http://127.0.0.1:5001".into(),
            gateway_url: "https://ipfs.io/ipfs/".into(),
            timeout_secs: 60,
            local_root: PathBuf::from("~/.local/share/pinvault/blobs"),
            enforce_tls: false,
        }
    }
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            pbkdf2_iterations: 100_000,
            max_file_size_mb: 100,
            verify_integrity: true,
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("~/.local/share/pinvault/file_registry.json"),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            network: "sepolia".into(),
            rpc_url: None,
            chain_id: None,
            contract_address: String::new(),
            receipt_timeout_secs: 120,
            receipt_poll_interval_ms: 2000,
            request_timeout_secs: 30,
        }
    }
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            price_buffer: 1.1,
            limit_buffer: 1.2,
            min_price_gwei: 1.0,
            max_price_gwei: None,
            default_limit: 500_000,
            max_limit: 2_000_000,
            preflight_gas_per_file: 350_000,
            balance_margin: 1.1,
        }
    }
}

impl Default for PinningConfig {
    fn default() -> Self {
        Self {
            default_duration_days: 30,
            min_duration_days: 30,
            max_duration_days: 365,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[storage]
backend = "local"
api_url = "http://10.0.0.5:5001"
local_root = "/var/lib/pinvault/blobs"

[crypto]
pbkdf2_iterations = 250000
max_file_size_mb = 512

[registry]
path = "/var/lib/pinvault/registry.json"

[ledger]
network = "polygon"
rpc_url = "https://polygon.drpc.org"
contract_address = "0x1234567890123456789012345678901234567890"
receipt_timeout_secs = 300

[gas]
price_buffer = 1.25
min_price_gwei = 30.0
max_price_gwei = 500.0
default_limit = 600000

[pinning]
default_duration_days = 90

[logging]
level = "debug"
format = "json"
"#;
        let config: PinvaultConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(config.storage.backend, StorageBackend::Local);
        assert_eq!(config.storage.api_url, "http://10.0.0.5:5001");
        assert_eq!(config.crypto.pbkdf2_iterations, 250_000);
        assert_eq!(config.crypto.max_file_size_bytes(), 512 * 1024 * 1024);
        assert_eq!(config.ledger.network, "polygon");
        assert_eq!(config.ledger.receipt_timeout_secs, 300);
        assert_eq!(config.gas.max_price_gwei, Some(500.0));
        assert_eq!(config.gas.default_limit, 600_000);
        assert_eq!(config.gas.max_limit, 2_000_000);
        assert_eq!(config.pinning.default_duration_days, 90);
        assert_eq!(config.logging.format, "json");
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_defaults() {
        let config: PinvaultConfig = toml::from_str("").unwrap();

        assert_eq!(config.storage.backend, StorageBackend::Ipfs);
        assert_eq!(config.storage.api_url, "http://127.0.0.1:5001");
        assert_eq!(config.crypto.pbkdf2_iterations, 100_000);
        assert_eq!(config.ledger.network, "sepolia");
        assert_eq!(config.ledger.receipt_timeout_secs, 120);
        assert_eq!(config.gas.price_buffer, 1.1);
        assert_eq!(config.gas.limit_buffer, 1.2);
        assert_eq!(config.gas.min_price_gwei, 1.0);
        assert_eq!(config.gas.default_limit, 500_000);
        assert_eq!(config.gas.preflight_gas_per_file, 350_000);
        assert_eq!(config.pinning.min_duration_days, 30);
        assert_eq!(config.pinning.max_duration_days, 365);
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_gas_bounds() {
        let mut config = PinvaultConfig::default();
        config.gas.default_limit = 3_000_000;
        assert!(config.validate().is_err());

        let mut config = PinvaultConfig::default();
        config.gas.price_buffer = 0.9;
        assert!(config.validate().is_err());

        let mut config = PinvaultConfig::default();
        config.pinning.min_duration_days = 400;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = PinvaultConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: PinvaultConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.storage.api_url, parsed.storage.api_url);
        assert_eq!(config.registry.path, parsed.registry.path);
        assert_eq!(config.gas.max_limit, parsed.gas.max_limit);
    }
}
