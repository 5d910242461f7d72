use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{PinvaultError, PinvaultResult};

/// Number of hex characters of the content hash used as a registry key.
pub const FILE_ID_LEN: usize = 16;

/// Derive the registry key for a file from its plaintext SHA-256 (hex).
pub fn file_id_from_hash(content_hash: &str) -> String {
    content_hash
        .chars()
        .take(FILE_ID_LEN)
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Metadata document stored next to the ciphertext in the content store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredFileMetadata {
    /// KDF salt, hex encoded
    pub salt: String,
    /// SHA-256 of the plaintext, hex encoded
    #[serde(alias = "original_hash")]
    pub content_hash: String,
    pub original_name: String,
    pub original_size: u64,
    #[serde(alias = "encrypted_size")]
    pub ciphertext_size: u64,
    #[serde(
        default = "Utc::now",
        deserialize_with = "timestamp::deserialize"
    )]
    pub upload_timestamp: DateTime<Utc>,
    /// Content id of the ciphertext this document describes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_cid: Option<String>,
}

/// Registry entry for one uploaded file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Filled from the registry key when absent on disk
    #[serde(default)]
    pub file_id: String,
    #[serde(alias = "file_cid")]
    pub content_id: String,
    #[serde(alias = "metadata_cid")]
    pub metadata_id: String,
    pub original_name: String,
    pub original_size: u64,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub upload_date: DateTime<Utc>,
    pub file_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_url: Option<String>,
    #[serde(default)]
    pub blockchain_pinned: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pin_tx: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "timestamp::deserialize_opt"
    )]
    pub pin_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pin_duration_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pin_network: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pin_gas_used: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pin_gas_price_gwei: Option<f64>,
}

impl FileRecord {
    /// Merge a pin update into this record. Only fields present in `update`
    /// are touched.
    pub fn apply(&mut self, update: &PinUpdate) -> PinvaultResult<()> {
        let pinned = update.blockchain_pinned.unwrap_or(self.blockchain_pinned);
        let has_tx = update.pin_tx.is_some() || self.pin_tx.is_some();
        if pinned && !has_tx {
            return Err(PinvaultError::InvalidInput(format!(
                "{}: cannot mark pinned without a pin transaction",
                self.file_id
            )));
        }

        if let Some(v) = update.blockchain_pinned {
            self.blockchain_pinned = v;
        }
        if let Some(v) = &update.pin_tx {
            self.pin_tx = Some(v.clone());
        }
        if let Some(v) = update.pin_date {
            self.pin_date = Some(v);
        }
        if let Some(v) = update.pin_duration_days {
            self.pin_duration_days = Some(v);
        }
        if let Some(v) = &update.pin_network {
            self.pin_network = Some(v.clone());
        }
        if let Some(v) = update.pin_gas_used {
            self.pin_gas_used = Some(v);
        }
        if let Some(v) = update.pin_gas_price_gwei {
            self.pin_gas_price_gwei = Some(v);
        }
        Ok(())
    }
}

/// Partial pin-state update; `None` fields leave the record untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PinUpdate {
    pub blockchain_pinned: Option<bool>,
    pub pin_tx: Option<String>,
    pub pin_date: Option<DateTime<Utc>>,
    pub pin_duration_days: Option<u32>,
    pub pin_network: Option<String>,
    pub pin_gas_used: Option<u64>,
    pub pin_gas_price_gwei: Option<f64>,
}

impl PinUpdate {
    /// Update describing a confirmed on-chain pin.
    pub fn confirmed(
        pin_tx: impl Into<String>,
        duration_days: u32,
        network: impl Into<String>,
        gas_used: u64,
        gas_price_gwei: f64,
    ) -> Self {
        Self {
            blockchain_pinned: Some(true),
            pin_tx: Some(pin_tx.into()),
            pin_date: Some(Utc::now()),
            pin_duration_days: Some(duration_days),
            pin_network: Some(network.into()),
            pin_gas_used: Some(gas_used),
            pin_gas_price_gwei: Some(gas_price_gwei),
        }
    }
}

/// Where a gas price came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GasSource {
    Auto,
    Manual,
}

/// Gas parameters for one transaction attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasQuote {
    pub gas_price_wei: u128,
    pub gas_limit: u64,
    pub source: GasSource,
}

/// Pre-flight cost breakdown for a batch, all amounts in wei.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinCostQuote {
    pub pin_cost_wei: u128,
    pub gas_cost_wei: u128,
    pub total_wei: u128,
}

impl PinCostQuote {
    pub fn new(pin_cost_wei: u128, gas_cost_wei: u128) -> Self {
        Self {
            pin_cost_wei,
            gas_cost_wei,
            total_wei: pin_cost_wei.saturating_add(gas_cost_wei),
        }
    }
}

/// Timestamps are written as RFC 3339; naive ISO-8601 values (no offset)
/// from older registries are read as UTC.
mod timestamp {
    use super::*;

    pub fn parse(s: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {s}")))
    }

    pub fn deserialize_opt<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(None),
            Some(s) => parse(&s)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {s}"))),
        }
    }
}
