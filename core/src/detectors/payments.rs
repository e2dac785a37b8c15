use crate::{
    detector::{Detector, ScanContext},
    error::ReconResult,
    finding::{Category, Finding, FindingType},
    store::ReconStore,
};
use serde_json::json;
use std::collections::{BTreeMap, HashSet};

/// Payment-method labels seen on the exchange against the ERP mapping table.
pub struct PaymentMethodMapping;

impl Detector for PaymentMethodMapping {
    fn name(&self) -> &'static str {
        "payment_method_mapping"
    }

    fn category(&self) -> Category {
        Category::Payments
    }

    fn detect(&self, store: &ReconStore, ctx: &ScanContext) -> ReconResult<Vec<Finding>> {
        let mappings = store.payment_mappings()?;
        let mapped: HashSet<String> = mappings
            .iter()
            .map(|m| m.terminal_label.trim().to_lowercase())
            .collect();

        let mut label_counts: BTreeMap<String, usize> = BTreeMap::new();
        for order in store.completed_orders(&ctx.window, None)? {
            if let Some(label) = order.pay_method.as_deref().map(str::trim) {
                if !label.is_empty() {
                    *label_counts.entry(label.to_string()).or_default() += 1;
                }
            }
        }

        let mut findings = Vec::new();

        // Drift: labels the exchange uses that nobody mapped.
        for (label, order_count) in label_counts {
            if mapped.contains(&label.to_lowercase()) {
                continue;
            }
            findings.push(
                Finding::builder(&ctx.scan_id, FindingType::UnmappedPaymentMethod)
                    .terminal_ref(label)
                    .details(json!({ "order_count": order_count }))
                    .build(),
            );
        }

        // Orphans: mappings into a missing or inactive payment method.
        for m in mappings {
            let reason = match m.method_active {
                None => "missing",
                Some(false) => "inactive",
                Some(true) => continue,
            };
            findings.push(
                Finding::builder(&ctx.scan_id, FindingType::OrphanPaymentMapping)
                    .terminal_ref(&m.terminal_label)
                    .erp_ref(format!("payment_method#{}", m.payment_method_id))
                    .details(json!({ "reason": reason }))
                    .build(),
            );
        }
        Ok(findings)
    }
}
