//! The fourteen detector modules.
//!
//! EXECUTION ORDER (fixed, deterministic):
//!   1. missing_purchases          orders       missing counterpart
//!   2. missing_sales              orders       missing counterpart
//!   3. duplicate_sync_entries     orders       duplicate
//!   4. stale_sync_entries         orders       staleness
//!   5. amount_mismatches          financial    value mismatch
//!   6. orphan_sync_entries        financial    orphan
//!   7. fee_discrepancies          fees         value mismatch + missing
//!   8. negative_balances          balances     invalid state
//!   9. balance_drift              balances     value mismatch
//!  10. missing_movements          movements    missing counterpart
//!  11. conversion_reconciliation  conversions  missing + value mismatch
//!  12. missing_clients            clients      missing counterpart
//!  13. similar_client_names       clients      fuzzy grouping
//!  14. payment_method_mapping     payments     drift + orphan

mod balances;
mod clients;
mod conversions;
mod fees;
mod financial;
mod movements;
mod orders;
mod payments;

pub use balances::{BalanceDrift, NegativeBalances};
pub use clients::{fuzzy_name_key, MissingClients, SimilarClientNames};
pub use conversions::ConversionReconciliation;
pub use fees::FeeDiscrepancies;
pub use financial::{AmountMismatches, OrphanSyncEntries};
pub use movements::MissingMovements;
pub use orders::{DuplicateSyncEntries, MissingPurchases, MissingSales, StaleSyncEntries};
pub use payments::PaymentMethodMapping;

use crate::detector::DetectorRegistry;

/// Every detector, in execution order.
pub fn standard_registry() -> DetectorRegistry {
    DetectorRegistry::new()
        .with(Box::new(MissingPurchases))
        .with(Box::new(MissingSales))
        .with(Box::new(DuplicateSyncEntries))
        .with(Box::new(StaleSyncEntries))
        .with(Box::new(AmountMismatches))
        .with(Box::new(OrphanSyncEntries))
        .with(Box::new(FeeDiscrepancies))
        .with(Box::new(NegativeBalances))
        .with(Box::new(BalanceDrift))
        .with(Box::new(MissingMovements))
        .with(Box::new(ConversionReconciliation))
        .with(Box::new(MissingClients))
        .with(Box::new(SimilarClientNames))
        .with(Box::new(PaymentMethodMapping))
}
