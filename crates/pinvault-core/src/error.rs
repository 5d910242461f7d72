use std::fmt;

use thiserror::Error;

pub type PinvaultResult<T> = Result<T, PinvaultError>;

/// External collaborator an operation was talking to when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    ContentStore,
    Ledger,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Service::ContentStore => f.write_str("content store"),
            Service::Ledger => f.write_str("ledger node"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PinvaultError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("encryption error: {0}")]
    Encryption(String),

    #[error("decryption failed: wrong password, corrupted ciphertext, or tampered data")]
    DecryptionFailed,

    #[error("integrity check failed: expected {expected}, got {actual}")]
    Integrity { expected: String, actual: String },

    #[error("{service} unreachable: {message}")]
    Connectivity { service: Service, message: String },

    #[error("gas estimation failed: {0}")]
    GasEstimation(String),

    #[error("insufficient funds: need {required_wei} wei, balance is {balance_wei} wei")]
    InsufficientFunds { required_wei: u128, balance_wei: u128 },

    #[error("transaction failed ({kind}): {message}")]
    Transaction { kind: TxErrorKind, message: String },

    #[error("file id already registered: {0}")]
    DuplicateId(String),

    #[error("file id not found: {0}")]
    NotFound(String),

    #[error("no files selected")]
    NoSelection,

    #[error("config error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PinvaultError {
    pub fn content_store(message: impl Into<String>) -> Self {
        PinvaultError::Connectivity {
            service: Service::ContentStore,
            message: message.into(),
        }
    }

    pub fn ledger(message: impl Into<String>) -> Self {
        PinvaultError::Connectivity {
            service: Service::Ledger,
            message: message.into(),
        }
    }

    /// Build a transaction error, classifying the node's error text.
    pub fn transaction(message: impl Into<String>) -> Self {
        let message = message.into();
        PinvaultError::Transaction {
            kind: TxErrorKind::classify(&message),
            message,
        }
    }

    /// Category used to steer user guidance for a failed pin.
    pub fn tx_kind(&self) -> TxErrorKind {
        match self {
            PinvaultError::Transaction { kind, .. } => *kind,
            PinvaultError::InsufficientFunds { .. } => TxErrorKind::InsufficientFunds,
            PinvaultError::GasEstimation(msg) => TxErrorKind::classify(msg),
            other => TxErrorKind::classify(&other.to_string()),
        }
    }
}

/// Actionable categories for a failed pinning transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxErrorKind {
    InsufficientFunds,
    GasLimit,
    GasPrice,
    Nonce,
    Reverted,
    Timeout,
    Signing,
    Other,
}

impl TxErrorKind {
    /// Classify raw node/library error text.
    pub fn classify(text: &str) -> Self {
        let lower = text.to_ascii_lowercase();
        if lower.contains("insufficient funds") {
            TxErrorKind::InsufficientFunds
        } else if lower.contains("gas required exceeds") || lower.contains("intrinsic gas too low")
        {
            TxErrorKind::GasLimit
        } else if lower.contains("underpriced") || lower.contains("max fee per gas less than") {
            TxErrorKind::GasPrice
        } else if lower.contains("nonce too low") || lower.contains("nonce too high") {
            TxErrorKind::Nonce
        } else if lower.contains("execution reverted") || lower.contains("reverted") {
            TxErrorKind::Reverted
        } else if lower.contains("timed out") || lower.contains("timeout") {
            TxErrorKind::Timeout
        } else {
            TxErrorKind::Other
        }
    }

    pub fn guidance(&self) -> Option<&'static str> {
        match self {
            TxErrorKind::InsufficientFunds => Some("insufficient funds - check wallet balance"),
            TxErrorKind::GasLimit => Some("gas limit too low - increase gas limit"),
            TxErrorKind::GasPrice => Some("gas price too low - increase gas price"),
            TxErrorKind::Nonce => Some("nonce issue - previous transaction may be pending"),
            TxErrorKind::Timeout => {
                Some("no receipt yet - the transaction may still confirm, check the explorer")
            }
            TxErrorKind::Reverted | TxErrorKind::Signing | TxErrorKind::Other => None,
        }
    }
}

impl fmt::Display for TxErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TxErrorKind::InsufficientFunds => "insufficient funds",
            TxErrorKind::GasLimit => "gas limit",
            TxErrorKind::GasPrice => "gas price",
            TxErrorKind::Nonce => "nonce",
            TxErrorKind::Reverted => "reverted",
            TxErrorKind::Timeout => "timeout",
            TxErrorKind::Signing => "signing",
            TxErrorKind::Other => "other",
        };
        f.write_str(s)
    }
}
