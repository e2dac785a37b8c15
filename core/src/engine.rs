//! The scan orchestrator.
//!
//! SEQUENCE (one call, one scan run):
//!   1. Feature-flag gate       (nothing is created when disabled)
//!   2. Scan window             (desk midnight, UTC+05:30)
//!   3. Open scan run           (status = running, optional single-scan guard)
//!   4. Supervised detectors    (registry order, one at a time, each isolated)
//!   5. Tally + summary
//!   6. Finalize                (batched finding inserts + completion, one transaction)
//!
//! RULES:
//!   - A detector that errors or panics contributes zero findings and never
//!     aborts the scan.
//!   - Only steps 3 and 6 write. Detectors are read-only.
//!   - Errors outside detector execution surface to the caller.

use crate::{
    classify::clamp_confidence,
    clock::ScanWindow,
    config::EngineConfig,
    detector::{Detector, DetectorRegistry, ScanContext},
    detectors::standard_registry,
    error::{ReconError, ReconResult},
    finding::Finding,
    scope::ScanScope,
    store::{ReconStore, ScanCompletion, ScanRunRow, ScanStatus},
    summary::{self, ScanSummary},
};
use chrono::{DateTime, Utc};
use std::{
    panic::{self, AssertUnwindSafe},
    time::Instant,
};
use uuid::Uuid;

/// Actor recorded when the caller names none.
pub const DEFAULT_ACTOR: &str = "system";

/// How one detector fared in one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleReport {
    pub name: &'static str,
    /// Finding count, or the failure message.
    pub result: Result<usize, String>,
}

pub struct ScanEngine {
    pub store: ReconStore,
    config: EngineConfig,
    registry: DetectorRegistry,
}

impl ScanEngine {
    pub fn new(store: ReconStore, config: EngineConfig, registry: DetectorRegistry) -> Self {
        Self {
            store,
            config,
            registry,
        }
    }

    /// Engine wired with every standard detector.
    pub fn build(store: ReconStore, config: EngineConfig) -> Self {
        Self::new(store, config, standard_registry())
    }

    /// In-memory, migrated, flag enabled. Used by tests and tooling.
    pub fn build_test() -> ReconResult<Self> {
        Self::build_test_with(standard_registry())
    }

    pub fn build_test_with(registry: DetectorRegistry) -> ReconResult<Self> {
        let store = ReconStore::in_memory()?;
        store.migrate()?;
        let config = EngineConfig::default();
        store.set_setting(&config.feature_flag_key, "true", 0)?;
        Ok(Self::new(store, config, registry))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &DetectorRegistry {
        &self.registry
    }

    pub fn run_scan(&self, scope: &ScanScope, triggered_by: &str) -> ReconResult<ScanSummary> {
        self.run_scan_at(scope, triggered_by, Utc::now())
    }

    /// Run one scan as if triggered at `now`.
    pub fn run_scan_at(
        &self,
        scope: &ScanScope,
        triggered_by: &str,
        now: DateTime<Utc>,
    ) -> ReconResult<ScanSummary> {
        let flag = &self.config.feature_flag_key;
        if !self.store.flag_enabled(flag)? {
            log::warn!("scan requested by {triggered_by} but '{flag}' is off");
            return Err(ReconError::FeatureDisabled { flag: flag.clone() });
        }

        let window = ScanWindow::for_instant(now, self.config.lookback_days)?;
        let started = Instant::now();
        let started_at = now.timestamp_millis();
        let scan_id = Uuid::new_v4().to_string();

        let run = ScanRunRow {
            scan_id: scan_id.clone(),
            scope: scope.tags(),
            triggered_by: triggered_by.to_string(),
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
        let guard_since = self
            .config
            .exclusive_scans
            .then(|| {
                let timeout_ms = self.config.running_scan_timeout_minutes.saturating_mul(60_000);
                started_at.saturating_sub(timeout_ms)
            });
        match self.store.open_scan(&run, guard_since) {
            Ok(()) => {}
            Err(e @ ReconError::ScanInProgress { .. }) => {
                log::warn!("scan refused: {e}");
                return Err(e);
            }
            Err(e) => {
                log::error!("could not open scan run: {e}");
                return Err(ReconError::ScanInit {
                    message: e.to_string(),
                });
            }
        }
        let in_scope = self
            .registry
            .iter()
            .filter(|d| scope.includes(d.category()))
            .count();
        log::info!(
            "scan {scan_id} started by {triggered_by}, scope {:?}, {in_scope} of {} modules, window {}..={}",
            run.scope,
            self.registry.len(),
            window.start,
            window.end
        );

        let ctx = ScanContext {
            scan_id: scan_id.clone(),
            window,
        };
        let (findings, reports) = self.run_detectors(&ctx, scope);
        let failed_modules: Vec<String> = reports
            .iter()
            .filter(|r| r.result.is_err())
            .map(|r| r.name.to_string())
            .collect();

        let counts = summary::tally(&findings);
        let text = summary::compose(&counts, &findings, reports.len(), &failed_modules);
        let duration_ms = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);
        let completion = ScanCompletion {
            completed_at: started_at.saturating_add(duration_ms),
            duration_ms,
            counts,
            summary: text.clone(),
        };

        if let Err(e) = self.store.finalize_scan(
            &scan_id,
            &findings,
            self.config.insert_batch_size,
            &completion,
        ) {
            log::error!("scan {scan_id} could not be finalized: {e}");
            if let Err(mark_err) = self.store.mark_scan_failed(
                &scan_id,
                &e.to_string(),
                completion.completed_at,
                duration_ms,
            ) {
                log::error!("scan {scan_id} could not be marked failed: {mark_err}");
            }
            return Err(ReconError::Orchestrator {
                scan_id,
                message: e.to_string(),
            });
        }

        log::info!(
            "scan {scan_id} completed in {duration_ms}ms: {} findings ({} critical), {} module failures",
            counts.total(),
            counts.critical,
            failed_modules.len()
        );

        Ok(ScanSummary {
            scan_id,
            findings_count: counts.total(),
            critical_count: counts.critical,
            warning_count: counts.warning,
            review_count: counts.review,
            info_count: counts.info,
            duration_ms,
            ai_summary: text,
            failed_modules,
        })
    }

    /// Try one, continue all: every in-scope detector runs regardless of
    /// how the previous one ended.
    fn run_detectors(
        &self,
        ctx: &ScanContext,
        scope: &ScanScope,
    ) -> (Vec<Finding>, Vec<ModuleReport>) {
        let mut findings = Vec::new();
        let mut reports = Vec::new();

        for detector in self.registry.iter() {
            if !scope.includes(detector.category()) {
                continue;
            }
            let result = match run_isolated(detector, &self.store, ctx) {
                Ok(found) => {
                    log::debug!("detector {}: {} findings", detector.name(), found.len());
                    let n = found.len();
                    findings.extend(found.into_iter().map(|f| normalize(f, ctx)));
                    Ok(n)
                }
                Err(message) => {
                    log::warn!(
                        "detector {} failed, contributing no findings: {message}",
                        detector.name()
                    );
                    Err(message)
                }
            };
            reports.push(ModuleReport {
                name: detector.name(),
                result,
            });
        }
        (findings, reports)
    }
}

/// Run a detector inside its own error boundary, panics included.
fn run_isolated(
    detector: &dyn Detector,
    store: &ReconStore,
    ctx: &ScanContext,
) -> Result<Vec<Finding>, String> {
    match panic::catch_unwind(AssertUnwindSafe(|| detector.detect(store, ctx))) {
        Ok(Ok(findings)) => Ok(findings),
        Ok(Err(e)) => Err(e.to_string()),
        Err(payload) => Err(panic_message(payload.as_ref())),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

/// Findings belong to this scan and respect the value invariants.
fn normalize(mut f: Finding, ctx: &ScanContext) -> Finding {
    if f.scan_id != ctx.scan_id {
        f.scan_id = ctx.scan_id.clone();
    }
    f.confidence = clamp_confidence(f.confidence);
    f.variance = f.variance.map(f64::abs);
    f
}
