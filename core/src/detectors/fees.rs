use super::financial::{orders_by_number, sync_table_for};
use crate::{
    amount::{parse_amount, parse_opt, variance},
    classify::FEE_RULE,
    detector::{Detector, ScanContext},
    error::ReconResult,
    finding::{Category, Finding, FindingType},
    store::{ReconStore, TradeType},
};
use serde_json::json;

/// Exchange commission against the fee the ERP recorded for the same order.
pub struct FeeDiscrepancies;

impl Detector for FeeDiscrepancies {
    fn name(&self) -> &'static str {
        "fee_discrepancies"
    }

    fn category(&self) -> Category {
        Category::Fees
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
                // No commission reported by the exchange: nothing to reconcile.
                let Some(commission) = parse_opt(order.commission.as_deref()) else {
                    continue;
                };

                let base = |t: FindingType| {
                    Finding::builder(&ctx.scan_id, t)
                        .terminal_ref(&order.order_number)
                        .erp_ref(table.row_ref(row.id))
                        .asset(&order.asset)
                        .details(json!({
                            "table": table.label(),
                            "trade_type": trade_type.as_str(),
                        }))
                };

                let recorded = row.fee.as_deref().map(str::trim).filter(|f| !f.is_empty());
                match recorded {
                    None if commission > 0.0 => findings.push(
                        base(FindingType::FeeNotRecorded)
                            .terminal_amount(commission)
                            .build(),
                    ),
                    None => {}
                    Some(raw) => {
                        let Some(fee) = parse_amount(raw) else {
                            log::debug!(
                                "skipping fee check for {} ({}): unparseable fee '{raw}'",
                                row.order_number,
                                table.row_ref(row.id)
                            );
                            continue;
                        };
                        if let Some(severity) = FEE_RULE.classify(variance(commission, fee)) {
                            findings.push(
                                base(FindingType::FeeMismatch)
                                    .compared(commission, fee)
                                    .severity(severity)
                                    .build(),
                            );
                        }
                    }
                }
            }
        }
        Ok(findings)
    }
}
