use crate::{
    amount::{parse_amount, parse_opt, variance},
    classify::AMOUNT_RULE,
    detector::{Detector, ScanContext},
    error::ReconResult,
    finding::{Category, Finding, FindingType},
    store::{ReconStore, SyncTable, TerminalOrderRow, TradeType},
};
use serde_json::json;
use std::collections::HashMap;

pub struct AmountMismatches;
pub struct OrphanSyncEntries;

/// The sync table that mirrors one side of the book.
pub(super) fn sync_table_for(trade_type: TradeType) -> SyncTable {
    match trade_type {
        TradeType::Buy => SyncTable::Purchase,
        TradeType::Sell => SyncTable::Sale,
    }
}

/// Completed orders in the window keyed by order number, one side only.
pub(super) fn orders_by_number(
    store: &ReconStore,
    ctx: &ScanContext,
    trade_type: TradeType,
) -> ReconResult<HashMap<String, TerminalOrderRow>> {
    Ok(store
        .completed_orders(&ctx.window, Some(trade_type))?
        .into_iter()
        .map(|o| (o.order_number.clone(), o))
        .collect())
}

impl Detector for AmountMismatches {
    fn name(&self) -> &'static str {
        "amount_mismatches"
    }

    fn category(&self) -> Category {
        Category::Financial
    }

    fn detect(&self, store: &ReconStore, ctx: &ScanContext) -> ReconResult<Vec<Finding>> {
        let mut findings = Vec::new();

        for trade_type in [TradeType::Buy, TradeType::Sell] {
            let table = sync_table_for(trade_type);
            let orders = orders_by_number(store, ctx, trade_type)?;
            if orders.is_empty() {
                continue;
            }
            let mut keys: Vec<String> = orders.keys().cloned().collect();
            keys.sort();

            for row in store.sync_entries_for_orders(table, &keys)? {
                let Some(order) = orders.get(&row.order_number) else {
                    continue;
                };
                let (Some(terminal), Some(erp)) =
                    (parse_amount(&order.fiat_amount), parse_opt(row.amount.as_deref()))
                else {
                    log::debug!(
                        "skipping amount check for {} ({}): unparseable amount",
                        row.order_number,
                        table.row_ref(row.id)
                    );
                    continue;
                };
                let Some(severity) = AMOUNT_RULE.classify(variance(terminal, erp)) else {
                    continue;
                };
                findings.push(
                    Finding::builder(&ctx.scan_id, FindingType::AmountMismatch)
                        .terminal_ref(&order.order_number)
                        .erp_ref(table.row_ref(row.id))
                        .asset(&order.asset)
                        .compared(terminal, erp)
                        .severity(severity)
                        .details(json!({
                            "table": table.label(),
                            "trade_type": trade_type.as_str(),
                        }))
                        .build(),
                );
            }
        }
        Ok(findings)
    }
}

impl Detector for OrphanSyncEntries {
    fn name(&self) -> &'static str {
        "orphan_sync_entries"
    }

    fn category(&self) -> Category {
        Category::Financial
    }

    fn detect(&self, store: &ReconStore, ctx: &ScanContext) -> ReconResult<Vec<Finding>> {
        let mut findings = Vec::new();
        for table in SyncTable::ALL {
            for row in store.orphan_sync_entries(table)? {
                let mut b = Finding::builder(&ctx.scan_id, FindingType::OrphanEntry)
                    .terminal_ref(&row.order_number)
                    .erp_ref(table.row_ref(row.id))
                    .details(json!({
                        "table": table.label(),
                        "missing_entry_id": row.entry_id,
                    }));
                if let Some(asset) = &row.asset {
                    b = b.asset(asset);
                }
                findings.push(b.build());
            }
        }
        Ok(findings)
    }
}
