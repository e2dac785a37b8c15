use crate::{
    amount::{parse_amount, variance},
    classify::AMOUNT_RULE,
    detector::{Detector, ScanContext},
    error::ReconResult,
    finding::{Category, Finding, FindingType},
    store::{ErpConversionRow, ReconStore},
};
use serde_json::json;
use std::collections::HashMap;

/// Spot conversions: every completed conversion has an ERP record, and the
/// received amount agrees.
pub struct ConversionReconciliation;

impl Detector for ConversionReconciliation {
    fn name(&self) -> &'static str {
        "conversion_reconciliation"
    }

    fn category(&self) -> Category {
        Category::Conversions
    }

    fn detect(&self, store: &ReconStore, ctx: &ScanContext) -> ReconResult<Vec<Finding>> {
        let conversions = store.completed_conversions(&ctx.window)?;
        if conversions.is_empty() {
            return Ok(Vec::new());
        }
        let refs: Vec<String> = conversions.iter().map(|c| c.conversion_id.clone()).collect();

        // Lowest id wins when the ERP holds more than one row for a conversion.
        let mut recorded: HashMap<String, ErpConversionRow> = HashMap::new();
        for row in store.erp_conversions_for(&refs)? {
            recorded.entry(row.terminal_ref.clone()).or_insert(row);
        }

        let mut findings = Vec::new();
        for c in &conversions {
            let terminal = parse_amount(&c.to_amount);
            let details = json!({
                "from_asset": c.from_asset,
                "from_amount": c.from_amount,
                "created_at": c.created_at,
            });

            let Some(erp_row) = recorded.get(&c.conversion_id) else {
                let mut b = Finding::builder(&ctx.scan_id, FindingType::MissingConversion)
                    .terminal_ref(&c.conversion_id)
                    .asset(&c.to_asset)
                    .details(details);
                if let Some(amount) = terminal {
                    b = b.terminal_amount(amount);
                }
                findings.push(b.build());
                continue;
            };

            let (Some(terminal), Some(erp)) = (terminal, parse_amount(&erp_row.to_amount)) else {
                log::debug!("conversion {} has an unparseable amount", c.conversion_id);
                continue;
            };
            if let Some(severity) = AMOUNT_RULE.classify(variance(terminal, erp)) {
                findings.push(
                    Finding::builder(&ctx.scan_id, FindingType::ConversionMismatch)
                        .terminal_ref(&c.conversion_id)
                        .erp_ref(format!("conversion#{}", erp_row.id))
                        .asset(&c.to_asset)
                        .compared(terminal, erp)
                        .severity(severity)
                        .details(details)
                        .build(),
                );
            }
        }
        Ok(findings)
    }
}
