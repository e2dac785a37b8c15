//! Orchestrator tests: flag gate, fault isolation, persistence invariants,
//! batching and the single-scan guard.

mod common;

use common::{build, now, order, sync, synced_order};
use recon_core::{
    demo_data::seed_demo_ledgers,
    detector::{Detector, DetectorRegistry, ScanContext},
    detectors::{MissingPurchases, NegativeBalances},
    engine::ScanEngine,
    error::{ReconError, ReconResult},
    finding::{Category, Finding, FindingType, Severity},
    scope::ScanScope,
    store::{ReconStore, ScanRunRow, ScanStatus, SyncTable, TradeType, WalletBalanceRow},
    trigger::{self, ScanRequest, TriggerResponse},
    types::EpochMillis,
};

struct AlwaysFails;
struct AlwaysPanics;

/// Emits `n` findings with out-of-range values to exercise normalization.
struct Flood(usize);

/// Closes the scan it is running in, so the final status update finds no
/// open row.
struct ClosesItsOwnScan;

impl Detector for AlwaysFails {
    fn name(&self) -> &'static str {
        "always_fails"
    }
    fn category(&self) -> Category {
        Category::Orders
    }
    fn detect(&self, _: &ReconStore, _: &ScanContext) -> ReconResult<Vec<Finding>> {
        Err(anyhow::anyhow!("upstream query timed out").into())
    }
}

impl Detector for AlwaysPanics {
    fn name(&self) -> &'static str {
        "always_panics"
    }
    fn category(&self) -> Category {
        Category::Fees
    }
    fn detect(&self, _: &ReconStore, _: &ScanContext) -> ReconResult<Vec<Finding>> {
        panic!("index out of bounds");
    }
}

impl Detector for Flood {
    fn name(&self) -> &'static str {
        "flood"
    }
    fn category(&self) -> Category {
        Category::Balances
    }
    fn detect(&self, _: &ReconStore, _: &ScanContext) -> ReconResult<Vec<Finding>> {
        Ok((0..self.0)
            .map(|i| {
                let mut f = Finding::builder("not-this-scan", FindingType::BalanceMismatch)
                    .asset(format!("TOKEN{i}"))
                    .build();
                f.confidence = if i % 2 == 0 { 1.7 } else { -0.2 };
                f.variance = Some(-(i as f64));
                f
            })
            .collect())
    }
}

impl Detector for ClosesItsOwnScan {
    fn name(&self) -> &'static str {
        "closes_its_own_scan"
    }
    fn category(&self) -> Category {
        Category::Orders
    }
    fn detect(&self, store: &ReconStore, ctx: &ScanContext) -> ReconResult<Vec<Finding>> {
        store.mark_scan_failed(&ctx.scan_id, "closed mid-scan", 0, 0)?;
        Ok(vec![Finding::builder(&ctx.scan_id, FindingType::MissingPurchase)
            .terminal_ref("ORD-1")
            .build()])
    }
}

fn engine_with(registry: DetectorRegistry) -> ScanEngine {
    let _ = env_logger::builder().is_test(true).try_init();
    ScanEngine::build_test_with(registry).unwrap()
}

fn run(engine: &ScanEngine) -> recon_core::summary::ScanSummary {
    engine
        .run_scan_at(&ScanScope::All, "tester", now())
        .expect("scan failed")
}

fn stored_run(engine: &ScanEngine, scan_id: &str) -> ScanRunRow {
    engine.store.get_scan(scan_id).unwrap().expect("scan row missing")
}

// ─────────────────────────────────────────────────────────────────────────────
// Lifecycle
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn clean_ledgers_complete_with_no_findings() {
    let engine = build();
    let summary = run(&engine);

    assert_eq!(summary.findings_count, 0);
    assert!(summary.failed_modules.is_empty());
    assert_eq!(
        summary.ai_summary,
        "No discrepancies found across 14 modules."
    );

    let row = stored_run(&engine, &summary.scan_id);
    assert_eq!(row.status, ScanStatus::Completed);
    assert_eq!(row.scope, vec!["all".to_string()]);
    assert_eq!(row.triggered_by, "tester");
    assert_eq!(row.summary.as_deref(), Some(summary.ai_summary.as_str()));
    assert!(row.completed_at.is_some());
    assert!(row.error.is_none());
}

#[test]
fn disabled_flag_refuses_without_creating_a_scan() {
    let engine = build();
    engine
        .store
        .set_setting(&engine.config().feature_flag_key, "false", 0)
        .unwrap();

    let err = engine
        .run_scan_at(&ScanScope::All, "tester", now())
        .unwrap_err();
    assert!(matches!(err, ReconError::FeatureDisabled { .. }), "{err}");
    assert_eq!(engine.store.scan_count().unwrap(), 0);
}

#[test]
fn missing_flag_counts_as_disabled() {
    let _ = env_logger::builder().is_test(true).try_init();
    let store = ReconStore::in_memory().unwrap();
    store.migrate().unwrap();
    let engine = ScanEngine::build(store, Default::default());

    assert!(engine
        .run_scan_at(&ScanScope::All, "tester", now())
        .is_err());
    assert_eq!(engine.store.scan_count().unwrap(), 0);
}

#[test]
fn scope_limits_which_detectors_run() {
    let engine = build();
    engine
        .store
        .insert_terminal_order(&order("123", TradeType::Buy, "5000"))
        .unwrap();

    let fees_only = ScanScope::from_tags(&["fees"]).unwrap();
    let summary = engine.run_scan_at(&fees_only, "tester", now()).unwrap();
    assert_eq!(summary.findings_count, 0);
    assert_eq!(stored_run(&engine, &summary.scan_id).scope, vec!["fees"]);

    let orders = ScanScope::from_tags(&["orders", "fees"]).unwrap();
    let summary = engine.run_scan_at(&orders, "tester", now()).unwrap();
    assert_eq!(summary.findings_count, 1);
    assert_eq!(summary.critical_count, 1);
}

#[test]
fn the_worked_example_from_the_desk() {
    let engine = build();
    engine
        .store
        .insert_terminal_order(&order("123", TradeType::Buy, "5000"))
        .unwrap();

    let summary = run(&engine);
    assert_eq!(summary.findings_count, 1);
    assert_eq!(summary.critical_count, 1);
    assert!(summary.ai_summary.contains("1 critical issue"), "{}", summary.ai_summary);
    assert!(summary.ai_summary.contains("orders (1)"), "{}", summary.ai_summary);
}

// ─────────────────────────────────────────────────────────────────────────────
// Fault isolation
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn failing_and_panicking_detectors_do_not_abort_the_scan() {
    let engine = engine_with(
        DetectorRegistry::new()
            .with(Box::new(AlwaysFails))
            .with(Box::new(MissingPurchases))
            .with(Box::new(AlwaysPanics))
            .with(Box::new(NegativeBalances)),
    );
    engine
        .store
        .insert_terminal_order(&order("123", TradeType::Buy, "5000"))
        .unwrap();
    engine
        .store
        .upsert_wallet_balance(&WalletBalanceRow {
            wallet_id: "main".into(),
            asset: "USDT".into(),
            balance: "-1".into(),
            updated_at: 0,
        })
        .unwrap();

    let summary = run(&engine);
    assert_eq!(summary.findings_count, 2);
    assert_eq!(summary.failed_modules, vec!["always_fails", "always_panics"]);
    assert!(
        summary
            .ai_summary
            .contains("2 modules failed and contributed no findings: always_fails, always_panics"),
        "{}",
        summary.ai_summary
    );
    assert_eq!(stored_run(&engine, &summary.scan_id).status, ScanStatus::Completed);
}

// ─────────────────────────────────────────────────────────────────────────────
// Persistence invariants
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn findings_beyond_one_batch_are_all_persisted_and_normalized() {
    let engine = engine_with(DetectorRegistry::new().with(Box::new(Flood(250))));
    let summary = run(&engine);

    assert_eq!(summary.findings_count, 250);
    assert_eq!(summary.warning_count, 250);
    assert_eq!(engine.store.finding_count(&summary.scan_id).unwrap(), 250);

    for f in engine.store.findings_for_scan(&summary.scan_id).unwrap() {
        assert_eq!(f.scan_id, summary.scan_id);
        assert!((0.0..=1.0).contains(&f.confidence));
        assert!(f.variance.unwrap() >= 0.0);
    }
}

#[test]
fn stored_counts_match_stored_findings() {
    let engine = build();
    seed_demo_ledgers(&engine.store, 11, 300, now()).unwrap();
    let summary = run(&engine);
    let row = stored_run(&engine, &summary.scan_id);
    let findings = engine.store.findings_for_scan(&summary.scan_id).unwrap();

    assert_eq!(
        row.findings_count,
        row.critical_count + row.warning_count + row.review_count + row.info_count
    );
    assert_eq!(row.findings_count, findings.len() as i64);
    assert_eq!(row.findings_count, summary.findings_count);

    let critical = findings.iter().filter(|f| f.severity == Severity::Critical).count();
    assert_eq!(row.critical_count, critical as i64);
}

#[test]
fn every_finding_carries_its_type_category_and_remediation() {
    let engine = build();
    seed_demo_ledgers(&engine.store, 5, 300, now()).unwrap();
    let summary = run(&engine);

    for f in engine.store.findings_for_scan(&summary.scan_id).unwrap() {
        assert_eq!(f.category, f.finding_type.category(), "{f:?}");
        assert_eq!(f.suggested_action, f.finding_type.default_action(), "{f:?}");
        assert!((0.0..=1.0).contains(&f.confidence));
        assert!(f.variance.map_or(true, |v| v >= 0.0));
        assert!(!f.reasoning.is_empty());
    }
}

#[test]
fn duplicate_finding_lists_every_row() {
    for copies in 2..=5usize {
        let engine = build();
        let o = order("DUP", TradeType::Buy, "100");
        synced_order(&engine, &o, 1);
        for _ in 1..copies {
            engine
                .store
                .insert_sync_entry(SyncTable::Purchase, &sync("DUP", "100"))
                .unwrap();
        }
        let summary = run(&engine);
        let findings = engine.store.findings_for_scan(&summary.scan_id).unwrap();
        let dups: Vec<_> = findings
            .iter()
            .filter(|f| f.finding_type == FindingType::DuplicateEntry)
            .collect();
        assert_eq!(dups.len(), 1);
        let refs = dups[0].erp_ref.as_deref().unwrap();
        assert_eq!(refs.split(", ").count(), copies, "{refs}");
    }
}

#[test]
fn amount_findings_follow_the_materiality_rule() {
    let cases: [(&str, Option<Severity>); 6] = [
        ("1000.00", None),
        ("1000.49", None),
        ("1000.50", Some(Severity::Warning)),
        ("1100.00", Some(Severity::Warning)),
        ("1100.01", Some(Severity::Critical)),
        ("0", Some(Severity::Critical)),
    ];
    for (erp, expected) in cases {
        let engine = build();
        engine
            .store
            .insert_terminal_order(&order("M-1", TradeType::Buy, "1000.00"))
            .unwrap();
        engine
            .store
            .insert_sync_entry(SyncTable::Purchase, &sync("M-1", erp))
            .unwrap();
        let scope = ScanScope::from_tags(&["financial"]).unwrap();
        let summary = engine.run_scan_at(&scope, "tester", now()).unwrap();
        let severity = engine
            .store
            .findings_for_scan(&summary.scan_id)
            .unwrap()
            .first()
            .map(|f| f.severity);
        assert_eq!(severity, expected, "erp amount {erp}");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Single-scan guard
// ─────────────────────────────────────────────────────────────────────────────

fn running_since(engine: &ScanEngine, scan_id: &str, started_at: EpochMillis) {
    let run = ScanRunRow {
        scan_id: scan_id.into(),
        scope: vec!["all".into()],
        triggered_by: "other".into(),
        status: ScanStatus::Running,
        started_at,
        completed_at: None,
        duration_ms: None,
        findings_count: 0,
        critical_count: 0,
        warning_count: 0,
        review_count: 0,
        info_count: 0,
        summary: None,
        error: None,
    };
    engine.store.open_scan(&run, None).unwrap();
}

#[test]
fn a_running_scan_blocks_a_second_one() {
    let engine = build();
    running_since(&engine, "busy", now().timestamp_millis() - 5 * 60_000);

    let err = run_err(&engine);
    assert!(
        matches!(&err, ReconError::ScanInProgress { scan_id } if scan_id == "busy"),
        "{err}"
    );
    assert_eq!(engine.store.scan_count().unwrap(), 1);
}

#[test]
fn an_abandoned_running_scan_does_not_block() {
    let engine = build();
    running_since(&engine, "crashed", now().timestamp_millis() - 3 * 60 * 60_000);
    let summary = run(&engine);
    assert_eq!(stored_run(&engine, &summary.scan_id).status, ScanStatus::Completed);
    assert_eq!(stored_run(&engine, "crashed").status, ScanStatus::Running);
}

fn run_err(engine: &ScanEngine) -> ReconError {
    engine
        .run_scan_at(&ScanScope::All, "tester", now())
        .unwrap_err()
}

// ─────────────────────────────────────────────────────────────────────────────
// Finalize failures
// ─────────────────────────────────────────────────────────────────────────────

/// File-backed engine so a second connection can alter the schema under it.
fn file_engine(tag: &str, registry: DetectorRegistry) -> (ScanEngine, std::path::PathBuf) {
    let _ = env_logger::builder().is_test(true).try_init();
    let path = std::env::temp_dir().join(format!("recon-{tag}-{}.db", std::process::id()));
    let _ = std::fs::remove_file(&path);
    let store = ReconStore::open(path.to_str().unwrap()).unwrap();
    store.migrate().unwrap();
    let engine = ScanEngine::new(store, Default::default(), registry);
    engine
        .store
        .set_setting(&engine.config().feature_flag_key, "true", 0)
        .unwrap();
    (engine, path)
}

fn remove_db(path: &std::path::Path) {
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
    }
}

#[test]
fn rejected_finding_insert_fails_the_scan_and_persists_nothing() {
    let (engine, path) = file_engine(
        "insert-rejected",
        DetectorRegistry::new().with(Box::new(Flood(250))),
    );
    let side = rusqlite::Connection::open(&path).unwrap();
    side.execute_batch(
        "CREATE TRIGGER reject_findings BEFORE INSERT ON recon_finding
         BEGIN SELECT RAISE(ABORT, 'finding store offline'); END;",
    )
    .unwrap();

    let reply = trigger::handle_at(&engine, &ScanRequest::default(), now());
    assert_eq!(reply.status, 500);
    let TriggerResponse::Failed { error } = &reply.body else {
        panic!("expected a failure body, got {:?}", reply.body);
    };
    assert!(error.contains("finding store offline"), "{error}");

    let scan_id = side
        .query_row("SELECT scan_id FROM recon_scan", [], |row| row.get::<_, String>(0))
        .unwrap();
    let stored = stored_run(&engine, &scan_id);
    assert_eq!(stored.status, ScanStatus::Failed);
    assert!(stored.error.as_deref().unwrap_or_default().contains("finding store offline"));
    assert!(stored.completed_at.is_some());
    assert_eq!(stored.findings_count, 0);
    assert_eq!(engine.store.finding_count(&scan_id).unwrap(), 0);

    drop(side);
    drop(engine);
    remove_db(&path);
}

#[test]
fn scan_closed_before_finalize_rolls_back_its_findings() {
    let engine = engine_with(DetectorRegistry::new().with(Box::new(ClosesItsOwnScan)));

    let err = run_err(&engine);
    let ReconError::Orchestrator { scan_id, message } = &err else {
        panic!("expected an orchestrator failure, got {err}");
    };
    assert!(message.contains("not open"), "{message}");

    let stored = stored_run(&engine, scan_id);
    assert_eq!(stored.status, ScanStatus::Failed);
    assert!(stored.error.is_some());
    assert_eq!(engine.store.finding_count(scan_id).unwrap(), 0);

    let reply = trigger::handle_at(&engine, &ScanRequest::default(), now());
    assert_eq!(reply.status, 500);
    assert!(matches!(reply.body, TriggerResponse::Failed { .. }));
}
