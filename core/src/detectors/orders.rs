//! Order-level checks: every completed exchange trade has exactly one
//! ERP sync row, and sync rows do not sit in the workflow forever.

use crate::{
    amount::parse_amount,
    classify::STALE_AFTER_HOURS,
    detector::{Detector, ScanContext},
    error::ReconResult,
    finding::{Category, Finding, FindingType},
    store::{ReconStore, SyncTable, TradeType},
    types::MILLIS_PER_HOUR,
};
use serde_json::json;
use std::collections::HashSet;

pub struct MissingPurchases;
pub struct MissingSales;
pub struct DuplicateSyncEntries;
pub struct StaleSyncEntries;

/// Completed orders of one side with no sync row referencing them.
fn missing_in_sync(
    store: &ReconStore,
    ctx: &ScanContext,
    trade_type: TradeType,
    table: SyncTable,
    finding_type: FindingType,
) -> ReconResult<Vec<Finding>> {
    let orders = store.completed_orders(&ctx.window, Some(trade_type))?;
    if orders.is_empty() {
        return Ok(Vec::new());
    }

    let keys: Vec<String> = orders.iter().map(|o| o.order_number.clone()).collect();
    let synced: HashSet<String> = store
        .sync_entries_for_orders(table, &keys)?
        .into_iter()
        .map(|e| e.order_number)
        .collect();

    let findings = orders
        .iter()
        .filter(|o| !synced.contains(&o.order_number))
        .map(|o| {
            let mut b = Finding::builder(&ctx.scan_id, finding_type)
                .terminal_ref(&o.order_number)
                .asset(&o.asset)
                .details(json!({
                    "trade_type": trade_type.as_str(),
                    "crypto_amount": o.crypto_amount,
                    "counterparty": o.counterparty,
                    "created_at": o.created_at,
                }));
            match parse_amount(&o.fiat_amount) {
                Some(amount) => b = b.terminal_amount(amount),
                None => log::debug!(
                    "order {} has unparseable amount '{}'",
                    o.order_number,
                    o.fiat_amount
                ),
            }
            b.build()
        })
        .collect();
    Ok(findings)
}

impl Detector for MissingPurchases {
    fn name(&self) -> &'static str {
        "missing_purchases"
    }

    fn category(&self) -> Category {
        Category::Orders
    }

    fn detect(&self, store: &ReconStore, ctx: &ScanContext) -> ReconResult<Vec<Finding>> {
        missing_in_sync(
            store,
            ctx,
            TradeType::Buy,
            SyncTable::Purchase,
            FindingType::MissingPurchase,
        )
    }
}

impl Detector for MissingSales {
    fn name(&self) -> &'static str {
        "missing_sales"
    }

    fn category(&self) -> Category {
        Category::Orders
    }

    fn detect(&self, store: &ReconStore, ctx: &ScanContext) -> ReconResult<Vec<Finding>> {
        missing_in_sync(
            store,
            ctx,
            TradeType::Sell,
            SyncTable::Sale,
            FindingType::MissingSale,
        )
    }
}

impl Detector for DuplicateSyncEntries {
    fn name(&self) -> &'static str {
        "duplicate_sync_entries"
    }

    fn category(&self) -> Category {
        Category::Orders
    }

    /// One finding per duplicated order number, listing every row id.
    fn detect(&self, store: &ReconStore, ctx: &ScanContext) -> ReconResult<Vec<Finding>> {
        let mut findings = Vec::new();
        for table in SyncTable::ALL {
            for dup in store.duplicate_sync_keys(table)? {
                let refs: Vec<String> = dup.ids.iter().map(|id| table.row_ref(*id)).collect();
                findings.push(
                    Finding::builder(&ctx.scan_id, FindingType::DuplicateEntry)
                        .terminal_ref(&dup.order_number)
                        .erp_ref(refs.join(", "))
                        .details(json!({
                            "table": table.label(),
                            "row_ids": dup.ids,
                            "count": dup.ids.len(),
                        }))
                        .build(),
                );
            }
        }
        Ok(findings)
    }
}

impl Detector for StaleSyncEntries {
    fn name(&self) -> &'static str {
        "stale_sync_entries"
    }

    fn category(&self) -> Category {
        Category::Orders
    }

    fn detect(&self, store: &ReconStore, ctx: &ScanContext) -> ReconResult<Vec<Finding>> {
        let cutoff = ctx.window.end - STALE_AFTER_HOURS * MILLIS_PER_HOUR;
        let mut findings = Vec::new();
        for table in SyncTable::ALL {
            for row in store.stale_sync_entries(table, cutoff)? {
                let age_hours = (ctx.window.end - row.updated_at) / MILLIS_PER_HOUR;
                let mut b = Finding::builder(&ctx.scan_id, FindingType::StalePendingSync)
                    .terminal_ref(&row.order_number)
                    .erp_ref(table.row_ref(row.id))
                    .details(json!({
                        "table": table.label(),
                        "sync_status": row.sync_status,
                        "updated_at": row.updated_at,
                        "age_hours": age_hours,
                    }));
                if let Some(asset) = &row.asset {
                    b = b.asset(asset);
                }
                if let Some(amount) = row.amount.as_deref().and_then(parse_amount) {
                    b = b.erp_amount(amount);
                }
                findings.push(b.build());
            }
        }
        Ok(findings)
    }
}
