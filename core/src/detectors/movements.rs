use crate::{
    amount::parse_amount,
    detector::{Detector, ScanContext},
    error::ReconResult,
    finding::{Category, Finding, FindingType},
    store::{MovementType, ReconStore},
};
use serde_json::json;

/// Completed deposits and withdrawals with no ERP wallet movement.
pub struct MissingMovements;

impl Detector for MissingMovements {
    fn name(&self) -> &'static str {
        "missing_movements"
    }

    fn category(&self) -> Category {
        Category::Movements
    }

    fn detect(&self, store: &ReconStore, ctx: &ScanContext) -> ReconResult<Vec<Finding>> {
        let movements = store.completed_movements(&ctx.window)?;
        if movements.is_empty() {
            return Ok(Vec::new());
        }
        let refs: Vec<String> = movements.iter().map(|m| m.movement_id.clone()).collect();
        let recorded = store.wallet_movement_refs(&refs)?;

        let findings = movements
            .iter()
            .filter(|m| !recorded.contains(&m.movement_id))
            .map(|m| {
                let finding_type = match m.movement_type {
                    MovementType::Deposit => FindingType::MissingDeposit,
                    MovementType::Withdrawal => FindingType::MissingWithdrawal,
                };
                let mut b = Finding::builder(&ctx.scan_id, finding_type)
                    .terminal_ref(&m.movement_id)
                    .asset(&m.asset)
                    .details(json!({
                        "movement_type": m.movement_type.as_str(),
                        "tx_id": m.tx_id,
                        "network_fee": m.network_fee,
                        "created_at": m.created_at,
                    }));
                if let Some(amount) = parse_amount(&m.amount) {
                    b = b.terminal_amount(amount);
                }
                b.build()
            })
            .collect();
        Ok(findings)
    }
}
