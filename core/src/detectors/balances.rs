use crate::{
    amount::{parse_amount, round_to, variance, VARIANCE_SCALE},
    classify::AMOUNT_RULE,
    detector::{Detector, ScanContext},
    error::ReconResult,
    finding::{Category, Finding, FindingType},
    store::ReconStore,
};
use serde_json::json;
use std::collections::BTreeMap;

pub struct NegativeBalances;
pub struct BalanceDrift;

impl Detector for NegativeBalances {
    fn name(&self) -> &'static str {
        "negative_balances"
    }

    fn category(&self) -> Category {
        Category::Balances
    }

    /// A wallet can never hold less than zero. One finding per wallet/asset.
    fn detect(&self, store: &ReconStore, ctx: &ScanContext) -> ReconResult<Vec<Finding>> {
        let mut findings = Vec::new();
        for row in store.wallet_balances()? {
            let Some(balance) = parse_amount(&row.balance) else {
                log::debug!(
                    "wallet {} {} has unparseable balance '{}'",
                    row.wallet_id,
                    row.asset,
                    row.balance
                );
                continue;
            };
            if balance >= 0.0 {
                continue;
            }
            findings.push(
                Finding::builder(&ctx.scan_id, FindingType::NegativeBalance)
                    .erp_ref(&row.wallet_id)
                    .asset(&row.asset)
                    .erp_amount(balance)
                    .details(json!({ "updated_at": row.updated_at }))
                    .build(),
            );
        }
        Ok(findings)
    }
}

impl Detector for BalanceDrift {
    fn name(&self) -> &'static str {
        "balance_drift"
    }

    fn category(&self) -> Category {
        Category::Balances
    }

    /// Exchange free + locked per asset against the ERP wallets' sum.
    fn detect(&self, store: &ReconStore, ctx: &ScanContext) -> ReconResult<Vec<Finding>> {
        let snapshot = store.terminal_balances()?;
        if snapshot.is_empty() {
            return Ok(Vec::new());
        }

        let mut erp_totals: BTreeMap<String, (f64, Vec<String>)> = BTreeMap::new();
        for row in store.wallet_balances()? {
            if let Some(balance) = parse_amount(&row.balance) {
                let entry = erp_totals.entry(row.asset.clone()).or_default();
                entry.0 += balance;
                entry.1.push(row.wallet_id);
            }
        }

        let mut findings = Vec::new();
        for b in snapshot {
            let Some(free) = parse_amount(&b.free) else {
                log::debug!("terminal balance for {} is unparseable", b.asset);
                continue;
            };
            let locked = parse_amount(&b.locked).unwrap_or(0.0);
            let terminal = round_to(free + locked, VARIANCE_SCALE);
            let (erp, wallets) = erp_totals
                .get(&b.asset)
                .map(|(total, wallets)| (round_to(*total, VARIANCE_SCALE), wallets.clone()))
                .unwrap_or((0.0, Vec::new()));

            let Some(severity) = AMOUNT_RULE.classify(variance(terminal, erp)) else {
                continue;
            };
            let mut builder = Finding::builder(&ctx.scan_id, FindingType::BalanceMismatch)
                .asset(&b.asset)
                .compared(terminal, erp)
                .severity(severity)
                .details(json!({
                    "free": b.free,
                    "locked": b.locked,
                    "snapshot_at": b.snapshot_at,
                    "wallets": wallets,
                }));
            if !wallets.is_empty() {
                builder = builder.erp_ref(wallets.join(", "));
            }
            findings.push(builder.build());
        }
        Ok(findings)
    }
}
