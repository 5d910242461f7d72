//! Orchestrator behaviour against a scripted ledger.

use std::sync::Arc;

use chrono::Utc;
use pinvault_core::config::PinvaultConfig;
use pinvault_core::types::{FileRecord, GasSource};
use pinvault_core::{PinvaultError, TxErrorKind};
use pinvault_ledger::mock::MockLedger;
use pinvault_ledger::{Address, PinningContract, Wallet};
use pinvault_sync::{
    record_successes, FileRegistry, GasPriceSetting, PinEvent, PinRequest, PinTarget,
    PinningOrchestrator, SharedRegistry,
};
use tokio::sync::mpsc;

const GWEI: u128 = 1_000_000_000;
const PIN_COST: u128 = 1_000_000;

struct Harness {
    ledger: Arc<MockLedger>,
    orchestrator: PinningOrchestrator,
    events: mpsc::UnboundedReceiver<PinEvent>,
    registry: SharedRegistry,
    targets: Vec<PinTarget>,
    _dir: tempfile::TempDir,
}

fn record(i: usize) -> FileRecord {
    let id = format!("{i:016x}");
    FileRecord {
        file_id: id.clone(),
        content_id: format!("bafycontent{i}"),
        metadata_id: format!("bafymeta{i}"),
        original_name: format!("file-{i}.bin"),
        original_size: 1024 * (i as u64 + 1),
        upload_date: Utc::now(),
        file_hash: id.repeat(4),
        gateway_url: None,
        blockchain_pinned: false,
        pin_tx: None,
        pin_date: None,
        pin_duration_days: None,
        pin_network: None,
        pin_gas_used: None,
        pin_gas_price_gwei: None,
    }
}

fn harness(files: usize) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let mut registry = FileRegistry::open(&dir.path().join("registry.json")).unwrap();
    for i in 0..files {
        registry.create(record(i)).unwrap();
    }
    let targets = registry.list().into_iter().map(PinTarget::from).collect();

    let ledger = Arc::new(MockLedger::new());
    ledger.set_view_uint("calculatePinCost(uint256,uint256)", PIN_COST);
    let contract = PinningContract::new(ledger.clone(), Address::from_bytes([0x42; 20]));

    let (tx, rx) = mpsc::unbounded_channel();
    let orchestrator = PinningOrchestrator::new(
        contract,
        Arc::new(Wallet::generate()),
        &PinvaultConfig::default(),
        "sepolia",
    )
    .with_events(tx);

    Harness {
        ledger,
        orchestrator,
        events: rx,
        registry: registry.into_shared(),
        targets,
        _dir: dir,
    }
}

fn request(targets: &[PinTarget]) -> PinRequest {
    PinRequest {
        files: targets.to_vec(),
        duration_days: 30,
        gas_price: GasPriceSetting::Auto,
    }
}

fn drain(rx: &mut mpsc::UnboundedReceiver<PinEvent>) -> Vec<PinEvent> {
    let mut out = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        out.push(ev);
    }
    out
}

#[tokio::test]
async fn partial_failures_only_record_successes() {
    let h = harness(4);
    h.ledger
        .fail_send(2, "replacement transaction underpriced")
        .revert_receipt(4);

    let plan = h.orchestrator.prepare(request(&h.targets)).await.unwrap();
    let outcome = h.orchestrator.execute(&plan).await;

    assert_eq!(outcome.successful, 2);
    assert_eq!(outcome.failed, 2);
    let ids: Vec<_> = outcome.results.iter().map(|r| r.file_id.clone()).collect();
    let expected: Vec<_> = h.targets.iter().map(|t| t.file_id.clone()).collect();
    assert_eq!(ids, expected, "results keep selection order");

    let second = outcome.results[1].result.as_ref().unwrap_err();
    assert_eq!(second.kind, TxErrorKind::GasPrice);
    assert!(second.tx_hash.is_none());
    let fourth = outcome.results[3].result.as_ref().unwrap_err();
    assert_eq!(fourth.kind, TxErrorKind::Reverted);
    assert!(fourth.tx_hash.is_some());

    // nonces stay contiguous across the rejected broadcast
    let nonces: Vec<_> = h.ledger.sent().iter().map(|s| s.nonce).collect();
    assert_eq!(nonces, vec![0, 1, 2]);
    assert!(h.ledger.sent().iter().all(|s| s.value == PIN_COST));

    let summary = record_successes(&h.registry, &outcome).await;
    assert_eq!(summary.recorded, 2);
    assert!(summary.is_complete());
    let registry = h.registry.lock().await;
    let pinned: Vec<bool> = h
        .targets
        .iter()
        .map(|t| registry.get(&t.file_id).unwrap().blockchain_pinned)
        .collect();
    assert_eq!(pinned, vec![true, false, true, false]);

    let first = registry.get(&h.targets[0].file_id).unwrap();
    assert_eq!(first.pin_network.as_deref(), Some("sepolia"));
    assert_eq!(first.pin_duration_days, Some(30));
    assert_eq!(first.pin_gas_used, Some(150_000));
    assert!(first.pin_tx.is_some());
}

#[tokio::test]
async fn insufficient_balance_aborts_before_any_transaction() {
    let h = harness(3);
    h.ledger.set_balance(1_000_000_000_000_000);

    let err = h.orchestrator.prepare(request(&h.targets)).await.unwrap_err();
    match err {
        PinvaultError::InsufficientFunds {
            required_wei,
            balance_wei,
        } => {
            assert_eq!(balance_wei, 1_000_000_000_000_000);
            assert!(required_wei > balance_wei);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(h.ledger.estimate_calls(), 0);
    assert_eq!(h.ledger.send_attempts(), 0);
}

#[tokio::test]
async fn estimate_failure_uses_default_limit_for_that_file_only() {
    let mut h = harness(3);
    h.ledger.set_estimate(200_000).fail_estimate(2);

    let plan = h.orchestrator.prepare(request(&h.targets)).await.unwrap();
    let outcome = h.orchestrator.execute(&plan).await;
    assert_eq!(outcome.successful, 3);

    let limits: Vec<u64> = h.ledger.sent().iter().map(|s| s.gas_limit).collect();
    assert_eq!(limits, vec![240_000, 500_000, 240_000]);

    let fallbacks: Vec<String> = drain(&mut h.events)
        .into_iter()
        .filter_map(|ev| match ev {
            PinEvent::EstimateFallback { file_id, gas_limit, .. } => {
                assert_eq!(gas_limit, 500_000);
                Some(file_id)
            }
            _ => None,
        })
        .collect();
    assert_eq!(fallbacks, vec![h.targets[1].file_id.clone()]);
}

#[tokio::test]
async fn quote_uses_total_size_and_flat_gas() {
    let h = harness(2);
    h.ledger.set_gas_price(10 * GWEI);

    let plan = h.orchestrator.prepare(request(&h.targets)).await.unwrap();
    assert_eq!(plan.total_size, 1024 + 2048);
    assert_eq!(plan.duration_secs, 30 * 86_400);
    assert_eq!(plan.chain_id, 11_155_111);
    assert_eq!(plan.gas.gas_price_wei, 11 * GWEI);
    assert_eq!(plan.gas.source, GasSource::Auto);
    assert_eq!(plan.quote.pin_cost_wei, PIN_COST);
    assert_eq!(plan.quote.gas_cost_wei, 350_000 * 2 * 11 * GWEI);
    assert_eq!(plan.required, plan.quote.total_wei * 11 / 10);
    assert_eq!(h.ledger.send_attempts(), 0);
}

#[tokio::test]
async fn manual_price_below_minimum_is_clamped() {
    let h = harness(1);
    let mut req = request(&h.targets);
    req.gas_price = GasPriceSetting::Manual("0.5".into());

    let plan = h.orchestrator.prepare(req).await.unwrap();
    assert_eq!(plan.gas.gas_price_wei, GWEI);
    assert_eq!(plan.gas.source, GasSource::Manual);

    let outcome = h.orchestrator.execute(&plan).await;
    assert_eq!(outcome.successful, 1);
    assert_eq!(h.ledger.sent()[0].gas_price, GWEI);
    let receipt = outcome.results[0].result.as_ref().unwrap();
    assert_eq!(receipt.gas_source, GasSource::Manual);
    assert_eq!(receipt.gas_price_gwei(), 1.0);
}

#[tokio::test]
async fn missing_receipt_is_a_timeout_with_hash() {
    let h = harness(2);
    h.ledger.withhold_receipt(1);

    let plan = h.orchestrator.prepare(request(&h.targets)).await.unwrap();
    let outcome = h.orchestrator.execute(&plan).await;

    assert_eq!(outcome.successful, 1);
    let failure = outcome.results[0].result.as_ref().unwrap_err();
    assert_eq!(failure.kind, TxErrorKind::Timeout);
    assert!(failure.tx_hash.is_some());
    assert!(TxErrorKind::Timeout.guidance().is_some());
}

#[tokio::test]
async fn selection_and_duration_are_validated() {
    let h = harness(1);

    let err = h.orchestrator.prepare(request(&[])).await.unwrap_err();
    assert!(matches!(err, PinvaultError::NoSelection));

    let mut req = request(&h.targets);
    req.duration_days = 7;
    let err = h.orchestrator.prepare(req).await.unwrap_err();
    assert!(matches!(err, PinvaultError::InvalidInput(_)));

    let mut req = request(&h.targets);
    req.duration_days = 366;
    assert!(h.orchestrator.prepare(req).await.is_err());
}

#[tokio::test]
async fn events_follow_the_batch() {
    let mut h = harness(2);
    let plan = h.orchestrator.prepare(request(&h.targets)).await.unwrap();
    h.orchestrator.execute(&plan).await;

    let events = drain(&mut h.events);
    assert!(matches!(events.first(), Some(PinEvent::Quoted { files: 2, .. })));
    assert!(matches!(
        events.last(),
        Some(PinEvent::Finished {
            successful: 2,
            failed: 0
        })
    ));
    let submitted = events
        .iter()
        .filter(|ev| matches!(ev, PinEvent::Submitted { .. }))
        .count();
    assert_eq!(submitted, 2);
}

#[tokio::test]
async fn recording_skips_records_deleted_meanwhile() {
    let h = harness(2);
    let plan = h.orchestrator.prepare(request(&h.targets)).await.unwrap();
    let outcome = h.orchestrator.execute(&plan).await;

    h.registry
        .lock()
        .await
        .delete(&h.targets[0].file_id)
        .unwrap();
    let summary = record_successes(&h.registry, &outcome).await;
    assert_eq!(summary.recorded, 1);
    assert_eq!(summary.unrecorded.len(), 1);
    assert_eq!(summary.unrecorded[0].file_id, h.targets[0].file_id);
}

#[tokio::test]
async fn unwritable_registry_reports_every_paid_pin() {
    let h = harness(3);
    let plan = h.orchestrator.prepare(request(&h.targets)).await.unwrap();
    let outcome = h.orchestrator.execute(&plan).await;
    assert_eq!(outcome.successful, 3);

    // registry path is now a non-empty directory: every persist fails
    let path = h._dir.path().join("registry.json");
    std::fs::remove_file(&path).unwrap();
    std::fs::create_dir_all(path.join("child")).unwrap();

    let summary = record_successes(&h.registry, &outcome).await;
    assert_eq!(summary.recorded, 0);
    assert!(!summary.is_complete());

    let ids: Vec<_> = summary.unrecorded.iter().map(|u| u.file_id.clone()).collect();
    let expected: Vec<_> = h.targets.iter().map(|t| t.file_id.clone()).collect();
    assert_eq!(ids, expected, "failure on the first record does not stop the rest");
    let hashes: Vec<_> = summary.unrecorded.iter().map(|u| u.tx_hash.clone()).collect();
    let sent: Vec<_> = h.ledger.sent().iter().map(|s| s.hash.clone()).collect();
    assert_eq!(hashes, sent);

    let registry = h.registry.lock().await;
    assert!(h
        .targets
        .iter()
        .all(|t| !registry.get(&t.file_id).unwrap().blockchain_pinned));
}

#[tokio::test]
async fn node_side_insufficient_funds_fails_only_that_file() {
    let h = harness(3);
    h.ledger
        .fail_send(2, "insufficient funds for gas * price + value");

    let plan = h.orchestrator.prepare(request(&h.targets)).await.unwrap();
    let outcome = h.orchestrator.execute(&plan).await;

    assert_eq!(outcome.successful, 2);
    assert_eq!(outcome.failed, 1);
    let second = outcome.results[1].result.as_ref().unwrap_err();
    assert_eq!(second.kind, TxErrorKind::InsufficientFunds);
    assert!(second.tx_hash.is_none());
    assert!(second.message.contains("insufficient funds"));
    assert!(outcome.results[0].result.is_ok());
    assert!(outcome.results[2].result.is_ok());

    let nonces: Vec<_> = h.ledger.sent().iter().map(|s| s.nonce).collect();
    assert_eq!(nonces, vec![0, 1]);
    assert_eq!(h.ledger.send_attempts(), 3);
}
