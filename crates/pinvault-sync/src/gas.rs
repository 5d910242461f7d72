//! Gas price and gas limit resolution.
//!
//! Price: auto (node price × buffer) or a manual Gwei value, floored at the
//! configured minimum and optionally capped. Unparsable manual input falls
//! back to auto once; there is no retry loop.
//!
//! Limit: estimate × buffer capped at the maximum, or the default limit when
//! estimation fails.

use std::fmt;
use std::str::FromStr;

use pinvault_core::config::GasConfig;
use pinvault_core::types::GasSource;
use pinvault_core::PinvaultResult;
use pinvault_ledger::units::{gwei_to_wei, wei_to_gwei};
use pinvault_ledger::LedgerClient;
use tracing::{debug, warn};

/// How the user asked for the gas price to be chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GasPriceSetting {
    Auto,
    /// Raw user input, interpreted as Gwei at resolution time.
    Manual(String),
}

impl FromStr for GasPriceSetting {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("auto") {
            Ok(GasPriceSetting::Auto)
        } else {
            Ok(GasPriceSetting::Manual(s.to_string()))
        }
    }
}

impl fmt::Display for GasPriceSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GasPriceSetting::Auto => f.write_str("auto"),
            GasPriceSetting::Manual(raw) => write!(f, "{raw} gwei"),
        }
    }
}

fn parse_gwei(raw: &str) -> Option<f64> {
    let v: f64 = raw.trim().trim_end_matches("gwei").trim().parse().ok()?;
    (v.is_finite() && v >= 0.0).then_some(v)
}

/// Gas rules in wei, derived from `[gas]`.
#[derive(Debug, Clone)]
pub struct GasPolicy {
    pub price_buffer: f64,
    pub limit_buffer: f64,
    pub min_price_wei: u128,
    pub max_price_wei: Option<u128>,
    pub default_limit: u64,
    pub max_limit: u64,
}

impl GasPolicy {
    pub fn from_config(cfg: &GasConfig) -> Self {
        Self {
            price_buffer: cfg.price_buffer,
            limit_buffer: cfg.limit_buffer,
            min_price_wei: gwei_to_wei(cfg.min_price_gwei),
            max_price_wei: cfg.max_price_gwei.map(gwei_to_wei),
            default_limit: cfg.default_limit,
            max_limit: cfg.max_limit,
        }
    }

    /// Normalize a setting: unparsable manual input becomes `Auto` with a
    /// warning. Resolving the returned setting never warns about parsing.
    pub fn normalize(&self, setting: &GasPriceSetting) -> GasPriceSetting {
        match setting {
            GasPriceSetting::Manual(raw) if parse_gwei(raw).is_none() => {
                warn!(input = %raw, "invalid manual gas price, falling back to auto");
                GasPriceSetting::Auto
            }
            other => other.clone(),
        }
    }

    /// Resolve a gas price in wei.
    pub async fn resolve_price(
        &self,
        ledger: &dyn LedgerClient,
        setting: &GasPriceSetting,
    ) -> PinvaultResult<(u128, GasSource)> {
        let manual = match self.normalize(setting) {
            GasPriceSetting::Manual(raw) => parse_gwei(&raw),
            GasPriceSetting::Auto => None,
        };

        let (mut price, source) = match manual {
            Some(gwei) => {
                let wei = gwei_to_wei(gwei);
                if wei < self.min_price_wei {
                    warn!(
                        requested_gwei = gwei,
                        min_gwei = wei_to_gwei(self.min_price_wei),
                        "manual gas price below minimum, using minimum"
                    );
                    (self.min_price_wei, GasSource::Manual)
                } else {
                    (wei, GasSource::Manual)
                }
            }
            None => {
                let node = ledger.gas_price().await?;
                let buffered = scale(node, self.price_buffer).max(node);
                (buffered.max(self.min_price_wei), GasSource::Auto)
            }
        };

        if let Some(max) = self.max_price_wei {
            if price > max {
                warn!(
                    price_gwei = wei_to_gwei(price),
                    max_gwei = wei_to_gwei(max),
                    "gas price above configured maximum, capping"
                );
                price = max;
            }
        }

        debug!(price_gwei = wei_to_gwei(price), ?source, "gas price resolved");
        Ok((price, source))
    }

    /// Buffered gas limit for a successful estimate.
    pub fn buffered_limit(&self, estimate: u64) -> u64 {
        let buffered = (estimate as f64 * self.limit_buffer) as u64;
        buffered.min(self.max_limit)
    }
}

/// `value × factor` with the factor applied at 1/1000 precision.
pub(crate) fn scale(value: u128, factor: f64) -> u128 {
    let milli = (factor * 1000.0).round().max(0.0) as u128;
    value.saturating_mul(milli) / 1000
}

#[cfg(test)]
mod tests {
    use super::*;
    use pinvault_ledger::mock::MockLedger;

    const GWEI: u128 = 1_000_000_000;

    fn policy() -> GasPolicy {
        GasPolicy::from_config(&GasConfig::default())
    }

    #[test]
    fn parse_setting() {
        assert_eq!("auto".parse::<GasPriceSetting>().unwrap(), GasPriceSetting::Auto);
        assert_eq!(
            " 25 ".parse::<GasPriceSetting>().unwrap(),
            GasPriceSetting::Manual("25".into())
        );
        assert_eq!(parse_gwei("2.5"), Some(2.5));
        assert_eq!(parse_gwei("3 gwei"), Some(3.0));
        assert_eq!(parse_gwei("fast"), None);
        assert_eq!(parse_gwei("-1"), None);
    }

    #[tokio::test]
    async fn auto_applies_buffer() {
        let ledger = MockLedger::new();
        ledger.set_gas_price(20 * GWEI);
        let (price, source) = policy()
            .resolve_price(&ledger, &GasPriceSetting::Auto)
            .await
            .unwrap();
        assert_eq!(price, 22 * GWEI);
        assert_eq!(source, GasSource::Auto);
    }

    #[tokio::test]
    async fn auto_below_minimum_resolves_to_minimum() {
        let ledger = MockLedger::new();
        ledger.set_gas_price(100_000_000); // 0.1 gwei
        let (price, _) = policy()
            .resolve_price(&ledger, &GasPriceSetting::Auto)
            .await
            .unwrap();
        assert_eq!(price, GWEI);
    }

    #[tokio::test]
    async fn manual_below_minimum_is_clamped() {
        let ledger = MockLedger::new();
        let (price, source) = policy()
            .resolve_price(&ledger, &GasPriceSetting::Manual("0.2".into()))
            .await
            .unwrap();
        assert_eq!(price, GWEI);
        assert_eq!(source, GasSource::Manual);
    }

    #[tokio::test]
    async fn manual_garbage_falls_back_to_auto() {
        let ledger = MockLedger::new();
        ledger.set_gas_price(10 * GWEI);
        let (price, source) = policy()
            .resolve_price(&ledger, &GasPriceSetting::Manual("lots".into()))
            .await
            .unwrap();
        assert_eq!(source, GasSource::Auto);
        assert_eq!(price, 11 * GWEI);
    }

    #[tokio::test]
    async fn max_price_caps() {
        let ledger = MockLedger::new();
        ledger.set_gas_price(500 * GWEI);
        let mut p = policy();
        p.max_price_wei = Some(100 * GWEI);
        let (price, _) = p.resolve_price(&ledger, &GasPriceSetting::Auto).await.unwrap();
        assert_eq!(price, 100 * GWEI);
    }

    #[test]
    fn limit_buffer_and_cap() {
        let p = policy();
        assert_eq!(p.buffered_limit(200_000), 240_000);
        assert_eq!(p.buffered_limit(1_900_000), 2_000_000);
    }

    #[test]
    fn scale_rounds_to_milli() {
        assert_eq!(scale(1_000, 1.1), 1_100);
        assert_eq!(scale(7, 1.0), 7);
    }
}
