//! Built-in network table.

use pinvault_core::config::LedgerConfig;
use pinvault_core::{PinvaultError, PinvaultResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Network {
    pub name: &'static str,
    pub chain_id: u64,
    pub rpc_url: &'static str,
    pub currency: &'static str,
    pub explorer: &'static str,
}

pub const NETWORKS: &[Network] = &[
    Network {
        name: "sepolia",
        chain_id: 11_155_111,
        rpc_url: "https://ethereum-sepolia-rpc.publicnode.com",
        currency: "SepoliaETH",
        explorer: "https://sepolia.etherscan.io",
    },
    Network {
        name: "mainnet",
        chain_id: 1,
        rpc_url: "https://ethereum-rpc.publicnode.com",
        currency: "ETH",
        explorer: "https://etherscan.io",
    },
    Network {
        name: "polygon",
        chain_id: 137,
        rpc_url: "https://polygon-rpc.com",
        currency: "POL",
        explorer: "https://polygonscan.com",
    },
    Network {
        name: "arbitrum",
        chain_id: 42_161,
        rpc_url: "https://arb1.arbitrum.io/rpc",
        currency: "ETH",
        explorer: "https://arbiscan.io",
    },
];

impl Network {
    /// Case-insensitive lookup; `ethereum_mainnet` is accepted for `mainnet`.
    pub fn lookup(name: &str) -> Option<&'static Network> {
        let name = name.trim().to_ascii_lowercase();
        let name = match name.as_str() {
            "ethereum_mainnet" | "ethereum" => "mainnet",
            other => other,
        };
        NETWORKS.iter().find(|n| n.name == name)
    }
}

/// A network with config overrides applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSpec {
    pub name: String,
    /// Expected chain id; `None` means "whatever the node reports".
    pub chain_id: Option<u64>,
    pub rpc_url: String,
    pub currency: String,
    pub explorer: Option<String>,
}

impl NetworkSpec {
    /// Resolve `[ledger]` settings. Unknown network names need an explicit
    /// `rpc_url`.
    pub fn from_config(cfg: &LedgerConfig) -> PinvaultResult<Self> {
        match Network::lookup(&cfg.network) {
            Some(net) => Ok(NetworkSpec {
                name: net.name.to_string(),
                chain_id: Some(cfg.chain_id.unwrap_or(net.chain_id)),
                rpc_url: cfg.rpc_url.clone().unwrap_or_else(|| net.rpc_url.to_string()),
                currency: net.currency.to_string(),
                explorer: Some(net.explorer.to_string()),
            }),
            None => {
                let rpc_url = cfg.rpc_url.clone().ok_or_else(|| {
                    PinvaultError::Config(format!(
                        "unknown network '{}' and no ledger.rpc_url set",
                        cfg.network
                    ))
                })?;
                Ok(NetworkSpec {
                    name: cfg.network.clone(),
                    chain_id: cfg.chain_id,
                    rpc_url,
                    currency: "ETH".into(),
                    explorer: None,
                })
            }
        }
    }

    pub fn tx_url(&self, tx_hash: &str) -> Option<String> {
        self.explorer.as_ref().map(|e| format!("{e}/tx/{tx_hash}"))
    }
}
