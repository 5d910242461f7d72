//! Pinning orchestrator: quote a batch, then submit one `pinFile`
//! transaction per file.
//!
//! ```text
//! prepare():  selection/duration checks → gas price → calculatePinCost(total)
//!             → balance >= total × margin          (nothing broadcast yet)
//! execute():  for each file, in order:
//!               cost → nonce → gas price → estimate (or default limit)
//!               → sign → send_raw → wait_for_receipt
//! ```
//!
//! `prepare` errors abort the whole batch. During `execute` a failing file is
//! recorded and the loop moves on. Progress is reported through an optional
//! unbounded channel of [`PinEvent`]s that the caller drains.

use std::sync::Arc;
use std::time::Duration;

use pinvault_core::config::{PinningConfig, PinvaultConfig};
use pinvault_core::types::{FileRecord, GasQuote, GasSource, PinCostQuote, PinUpdate};
use pinvault_core::{PinvaultError, PinvaultResult, TxErrorKind};
use pinvault_ledger::units::wei_to_gwei;
use pinvault_ledger::{LegacyTx, LedgerClient, PinFileCall, PinningContract, Wallet};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info, warn};

use crate::gas::{scale, GasPolicy, GasPriceSetting};
use crate::registry::SharedRegistry;

const SECS_PER_DAY: u64 = 86_400;

/// One file of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinTarget {
    pub file_id: String,
    pub content_id: String,
    pub metadata_id: String,
    pub name: String,
    pub size: u64,
}

impl From<&FileRecord> for PinTarget {
    fn from(record: &FileRecord) -> Self {
        Self {
            file_id: record.file_id.clone(),
            content_id: record.content_id.clone(),
            metadata_id: record.metadata_id.clone(),
            name: record.original_name.clone(),
            size: record.original_size,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PinRequest {
    pub files: Vec<PinTarget>,
    pub duration_days: u32,
    pub gas_price: GasPriceSetting,
}

/// A quoted batch, ready for confirmation and [`PinningOrchestrator::execute`].
#[derive(Debug, Clone)]
pub struct PinPlan {
    pub targets: Vec<PinTarget>,
    pub duration_days: u32,
    pub duration_secs: u64,
    pub total_size: u64,
    pub chain_id: u64,
    /// Pre-flight gas assumption: quoted price, flat per-file limit
    pub gas: GasQuote,
    pub quote: PinCostQuote,
    pub balance: u128,
    /// Balance needed to proceed (`total × margin`)
    pub required: u128,
    /// Gas setting after normalization; reused for every file
    pub setting: GasPriceSetting,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PinReceipt {
    pub tx_hash: String,
    pub block_number: u64,
    pub gas_used: u64,
    pub gas_price_wei: u128,
    pub gas_limit: u64,
    pub gas_source: GasSource,
    pub cost_wei: u128,
}

impl PinReceipt {
    pub fn gas_price_gwei(&self) -> f64 {
        wei_to_gwei(self.gas_price_wei)
    }
}

/// Why one file of a batch was not pinned. `message` is the raw error text.
#[derive(Debug, Clone, PartialEq)]
pub struct PinFailure {
    pub kind: TxErrorKind,
    pub message: String,
    /// Set when the failure happened after broadcast
    pub tx_hash: Option<String>,
}

impl PinFailure {
    fn new(err: PinvaultError, tx_hash: Option<String>) -> Self {
        Self {
            kind: err.tx_kind(),
            message: err.to_string(),
            tx_hash,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileOutcome {
    pub file_id: String,
    pub name: String,
    pub result: Result<PinReceipt, PinFailure>,
}

/// Per-file results in selection order.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<FileOutcome>,
    pub duration_days: u32,
    pub network: String,
}

#[derive(Debug, Clone)]
pub enum PinEvent {
    Quoted {
        files: usize,
        total_size: u64,
        quote: PinCostQuote,
        balance: u128,
    },
    FileStarted {
        index: usize,
        total: usize,
        file_id: String,
        name: String,
    },
    GasResolved {
        file_id: String,
        gas: GasQuote,
    },
    EstimateFallback {
        file_id: String,
        reason: String,
        gas_limit: u64,
    },
    Submitted {
        file_id: String,
        tx_hash: String,
    },
    Confirmed {
        file_id: String,
        receipt: PinReceipt,
    },
    Failed {
        file_id: String,
        failure: PinFailure,
    },
    Finished {
        successful: usize,
        failed: usize,
    },
}

pub struct PinningOrchestrator {
    contract: PinningContract,
    wallet: Arc<Wallet>,
    policy: GasPolicy,
    pinning: PinningConfig,
    preflight_gas_per_file: u64,
    balance_margin: f64,
    receipt_timeout: Duration,
    network: String,
    events: Option<UnboundedSender<PinEvent>>,
}

impl PinningOrchestrator {
    pub fn new(
        contract: PinningContract,
        wallet: Arc<Wallet>,
        config: &PinvaultConfig,
        network: impl Into<String>,
    ) -> Self {
        Self {
            contract,
            wallet,
            policy: GasPolicy::from_config(&config.gas),
            pinning: config.pinning.clone(),
            preflight_gas_per_file: config.gas.preflight_gas_per_file,
            balance_margin: config.gas.balance_margin,
            receipt_timeout: Duration::from_secs(config.ledger.receipt_timeout_secs),
            network: network.into(),
            events: None,
        }
    }

    pub fn with_events(mut self, tx: UnboundedSender<PinEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn policy(&self) -> &GasPolicy {
        &self.policy
    }

    fn ledger(&self) -> &dyn LedgerClient {
        self.contract.ledger().as_ref()
    }

    fn emit(&self, event: PinEvent) {
        if let Some(tx) = &self.events {
            // a dropped receiver only means nobody is watching
            let _ = tx.send(event);
        }
    }

    /// Validate the selection and quote it. Fails with `InsufficientFunds`
    /// before anything is signed when the wallet cannot cover the quote
    /// plus margin.
    pub async fn prepare(&self, request: PinRequest) -> PinvaultResult<PinPlan> {
        if request.files.is_empty() {
            return Err(PinvaultError::NoSelection);
        }
        let days = request.duration_days;
        if days < self.pinning.min_duration_days || days > self.pinning.max_duration_days {
            return Err(PinvaultError::InvalidInput(format!(
                "pin duration {days} days outside {}..={} days",
                self.pinning.min_duration_days, self.pinning.max_duration_days
            )));
        }
        let duration_secs = u64::from(days) * SECS_PER_DAY;
        let total_size: u64 = request.files.iter().map(|f| f.size).sum();

        let chain_id = self.ledger().chain_id().await?;
        let setting = self.policy.normalize(&request.gas_price);
        let (gas_price, source) = self.policy.resolve_price(self.ledger(), &setting).await?;

        let pin_cost = self
            .contract
            .calculate_pin_cost(total_size, duration_secs)
            .await?;
        let file_count = request.files.len() as u128;
        let gas_cost = u128::from(self.preflight_gas_per_file)
            .saturating_mul(file_count)
            .saturating_mul(gas_price);
        let quote = PinCostQuote::new(pin_cost, gas_cost);

        let balance = self.ledger().balance(&self.wallet.address()).await?;
        let required = scale(quote.total_wei, self.balance_margin);
        if balance < required {
            return Err(PinvaultError::InsufficientFunds {
                required_wei: required,
                balance_wei: balance,
            });
        }

        info!(
            files = request.files.len(),
            total_size,
            days,
            pin_cost_wei = %pin_cost,
            gas_cost_wei = %gas_cost,
            "pin batch quoted"
        );
        self.emit(PinEvent::Quoted {
            files: request.files.len(),
            total_size,
            quote,
            balance,
        });

        Ok(PinPlan {
            targets: request.files,
            duration_days: days,
            duration_secs,
            total_size,
            chain_id,
            gas: GasQuote {
                gas_price_wei: gas_price,
                gas_limit: self.preflight_gas_per_file,
                source,
            },
            quote,
            balance,
            required,
            setting,
        })
    }

    /// Submit the plan, strictly one file after another.
    pub async fn execute(&self, plan: &PinPlan) -> BatchOutcome {
        let total = plan.targets.len();
        let mut results = Vec::with_capacity(total);

        for (index, target) in plan.targets.iter().enumerate() {
            self.emit(PinEvent::FileStarted {
                index,
                total,
                file_id: target.file_id.clone(),
                name: target.name.clone(),
            });

            let result = self.pin_one(plan, target).await;
            match &result {
                Ok(receipt) => {
                    info!(
                        file_id = %target.file_id,
                        tx = %receipt.tx_hash,
                        block = receipt.block_number,
                        gas_used = receipt.gas_used,
                        "file pinned"
                    );
                    self.emit(PinEvent::Confirmed {
                        file_id: target.file_id.clone(),
                        receipt: receipt.clone(),
                    });
                }
                Err(failure) => {
                    warn!(
                        file_id = %target.file_id,
                        kind = %failure.kind,
                        "pin failed: {}",
                        failure.message
                    );
                    self.emit(PinEvent::Failed {
                        file_id: target.file_id.clone(),
                        failure: failure.clone(),
                    });
                }
            }
            results.push(FileOutcome {
                file_id: target.file_id.clone(),
                name: target.name.clone(),
                result,
            });
        }

        let successful = results.iter().filter(|r| r.result.is_ok()).count();
        let failed = total - successful;
        info!(successful, failed, "pin batch finished");
        self.emit(PinEvent::Finished { successful, failed });

        BatchOutcome {
            successful,
            failed,
            results,
            duration_days: plan.duration_days,
            network: self.network.clone(),
        }
    }

    async fn pin_one(&self, plan: &PinPlan, target: &PinTarget) -> Result<PinReceipt, PinFailure> {
        let before = |e: PinvaultError| PinFailure::new(e, None);
        let from = self.wallet.address();

        let cost = self
            .contract
            .calculate_pin_cost(target.size, plan.duration_secs)
            .await
            .map_err(before)?;
        let nonce = self.ledger().nonce(&from).await.map_err(before)?;
        let (gas_price, source) = self
            .policy
            .resolve_price(self.ledger(), &plan.setting)
            .await
            .map_err(before)?;

        let call = PinFileCall {
            content_id: target.content_id.clone(),
            metadata_id: target.metadata_id.clone(),
            file_size: target.size,
            duration_secs: plan.duration_secs,
            name: target.name.clone(),
        };
        let request = self.contract.pin_file_request(&call, from, cost);

        let gas_limit = match self.ledger().estimate_gas(&request).await {
            Ok(estimate) => self.policy.buffered_limit(estimate),
            Err(e) => {
                let gas_limit = self.policy.default_limit;
                warn!(
                    file_id = %target.file_id,
                    gas_limit,
                    "gas estimation failed, using default limit: {e}"
                );
                self.emit(PinEvent::EstimateFallback {
                    file_id: target.file_id.clone(),
                    reason: e.to_string(),
                    gas_limit,
                });
                gas_limit
            }
        };
        self.emit(PinEvent::GasResolved {
            file_id: target.file_id.clone(),
            gas: GasQuote {
                gas_price_wei: gas_price,
                gas_limit,
                source,
            },
        });

        let tx = LegacyTx {
            nonce,
            gas_price,
            gas_limit,
            to: request.to,
            value: cost,
            data: request.data,
            chain_id: plan.chain_id,
        };
        let signed = tx.sign(&self.wallet).map_err(before)?;

        let tx_hash = self.ledger().send_raw(&signed.raw).await.map_err(before)?;
        info!(file_id = %target.file_id, nonce, tx = %tx_hash, "pin transaction submitted");
        self.emit(PinEvent::Submitted {
            file_id: target.file_id.clone(),
            tx_hash: tx_hash.clone(),
        });

        let after = |e: PinvaultError| PinFailure::new(e, Some(tx_hash.clone()));
        let receipt = self
            .ledger()
            .wait_for_receipt(&tx_hash, self.receipt_timeout)
            .await
            .map_err(after)?;
        if !receipt.status {
            return Err(after(PinvaultError::Transaction {
                kind: TxErrorKind::Reverted,
                message: format!("transaction reverted in block {}", receipt.block_number),
            }));
        }

        Ok(PinReceipt {
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
            gas_price_wei: receipt.effective_gas_price.unwrap_or(gas_price),
            gas_limit,
            gas_source: source,
            cost_wei: cost,
            tx_hash: receipt.tx_hash,
        })
    }
}

/// A confirmed transaction whose registry entry could not be written.
#[derive(Debug, Clone)]
pub struct UnrecordedPin {
    pub file_id: String,
    pub tx_hash: String,
    pub reason: String,
}

/// What [`record_successes`] managed to persist.
#[derive(Debug, Clone, Default)]
pub struct RecordSummary {
    pub recorded: usize,
    pub unrecorded: Vec<UnrecordedPin>,
}

impl RecordSummary {
    pub fn is_complete(&self) -> bool {
        self.unrecorded.is_empty()
    }
}

/// Write every successful pin of `outcome` into the registry. A failure on
/// one record does not stop the others; each miss is returned with its
/// transaction hash so the on-chain payment stays traceable.
pub async fn record_successes(registry: &SharedRegistry, outcome: &BatchOutcome) -> RecordSummary {
    let mut registry = registry.lock().await;
    let mut summary = RecordSummary::default();
    for file in &outcome.results {
        let Ok(receipt) = &file.result else {
            continue;
        };
        let update = PinUpdate::confirmed(
            receipt.tx_hash.clone(),
            outcome.duration_days,
            outcome.network.clone(),
            receipt.gas_used,
            receipt.gas_price_gwei(),
        );
        match registry.update_pin_status(&file.file_id, &update) {
            Ok(_) => summary.recorded += 1,
            Err(e) => {
                match &e {
                    PinvaultError::NotFound(_) => warn!(
                        file_id = %file.file_id,
                        tx_hash = %receipt.tx_hash,
                        "pinned file no longer in registry, not recorded"
                    ),
                    _ => error!(
                        file_id = %file.file_id,
                        tx_hash = %receipt.tx_hash,
                        error = %e,
                        "failed to record pin"
                    ),
                }
                summary.unrecorded.push(UnrecordedPin {
                    file_id: file.file_id.clone(),
                    tx_hash: receipt.tx_hash.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }
    summary
}
