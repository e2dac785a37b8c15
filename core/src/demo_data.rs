//! Synthetic ledgers with known, injected discrepancies.
//!
//! Every order gets at most one injected fault, so a scan over a fresh
//! demo database reports exactly what `DemoReport` says was injected.
//! Seed into an empty store: identifiers derive from the seed and collide
//! on a second run with the same seed.

use crate::{
    clock::ScanWindow,
    error::ReconResult,
    rng::DemoRng,
    store::{
        ErpConversionRow, MovementType, ReconStore, SyncEntryRow, SyncTable, TerminalBalanceRow,
        TerminalConversionRow, TerminalMovementRow, TerminalOrderRow, TradeType,
        WalletBalanceRow, WalletMovementRow, TERMINAL_COMPLETED,
    },
    types::{EpochMillis, MILLIS_PER_HOUR},
};
use chrono::{DateTime, Utc};
use serde::Serialize;

const COUNTERPARTIES: [&str; 8] = [
    "Rajesh Kumar",
    "Priya Sharma",
    "Amit Verma",
    "Sneha Iyer",
    "Vikram Singh",
    "Anjali Mehta",
    "Karan Patel",
    "Deepa Nair",
];

const MAPPED_METHODS: [(&str, i64); 3] = [("UPI", 1), ("IMPS", 2), ("Bank Transfer", 3)];
const UNMAPPED_METHOD: &str = "Paytm";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DemoReport {
    pub orders: usize,
    pub unsynced_purchases: usize,
    pub unsynced_sales: usize,
    pub duplicated_orders: usize,
    pub amount_mismatches: usize,
    pub fee_mismatches: usize,
    pub fees_not_recorded: usize,
    pub stale_syncs: usize,
    pub orphan_syncs: usize,
    pub movements: usize,
    pub missing_movements: usize,
    pub conversions: usize,
    pub missing_conversions: usize,
    pub negative_balances: usize,
}

#[derive(Clone, Copy)]
enum OrderFault {
    None,
    Unsynced,
    Duplicated,
    AmountOff,
    FeeOff,
    FeeMissing,
    Stale,
    Orphan,
}

fn roll_fault(rng: &mut DemoRng) -> OrderFault {
    let r = rng.next_f64();
    match r {
        r if r < 0.06 => OrderFault::Unsynced,
        r if r < 0.10 => OrderFault::Duplicated,
        r if r < 0.15 => OrderFault::AmountOff,
        r if r < 0.20 => OrderFault::FeeOff,
        r if r < 0.23 => OrderFault::FeeMissing,
        r if r < 0.26 => OrderFault::Stale,
        r if r < 0.28 => OrderFault::Orphan,
        _ => OrderFault::None,
    }
}

fn fmt2(v: f64) -> String {
    format!("{v:.2}")
}

/// Populate both ledgers for the desk day containing `now`.
pub fn seed_demo_ledgers(
    store: &ReconStore,
    seed: u64,
    order_count: usize,
    now: DateTime<Utc>,
) -> ReconResult<DemoReport> {
    let mut rng = DemoRng::new(seed);
    let window = ScanWindow::for_instant(now, 0)?;
    let span = (window.end - window.start).max(0) as u64;
    let mut report = DemoReport {
        orders: order_count,
        ..DemoReport::default()
    };
    let mut at = |rng: &mut DemoRng| -> EpochMillis { window.start + rng.below(span + 1) as i64 };

    seed_master_data(store)?;

    for i in 0..order_count {
        let trade_type = if rng.chance(0.5) { TradeType::Buy } else { TradeType::Sell };
        let table = match trade_type {
            TradeType::Buy => SyncTable::Purchase,
            TradeType::Sell => SyncTable::Sale,
        };
        let fiat = rng.amount(500.0, 50_000.0);
        let commission = (fiat * 0.001 * 100.0).round() / 100.0;
        let created_at = at(&mut rng);
        let order_number = format!("P2P-{seed}-{i:05}");
        let pay_method = if rng.chance(0.05) {
            UNMAPPED_METHOD
        } else {
            rng.pick(&MAPPED_METHODS).0
        };

        store.insert_terminal_order(&TerminalOrderRow {
            order_number: order_number.clone(),
            trade_type,
            asset: "USDT".into(),
            fiat_amount: fmt2(fiat),
            crypto_amount: fmt2(fiat / 88.5),
            commission: Some(fmt2(commission)),
            status: TERMINAL_COMPLETED.into(),
            counterparty: Some(rng.pick(&COUNTERPARTIES).to_string()),
            pay_method: Some(pay_method.into()),
            created_at,
        })?;

        let entry_id = (i as i64) + 1;
        store.insert_ledger_entry(table, entry_id, &order_number, &fmt2(fiat), created_at)?;

        let mut sync = SyncEntryRow {
            id: 0,
            order_number: order_number.clone(),
            asset: Some("USDT".into()),
            amount: Some(fmt2(fiat)),
            fee: Some(fmt2(commission)),
            counterparty: None,
            sync_status: "synced".into(),
            entry_id: Some(entry_id),
            created_at,
            updated_at: created_at,
        };

        match roll_fault(&mut rng) {
            OrderFault::None => {}
            OrderFault::Unsynced => {
                match trade_type {
                    TradeType::Buy => report.unsynced_purchases += 1,
                    TradeType::Sell => report.unsynced_sales += 1,
                }
                continue;
            }
            OrderFault::Duplicated => {
                store.insert_sync_entry(table, &sync)?;
                report.duplicated_orders += 1;
            }
            OrderFault::AmountOff => {
                let off = rng.amount(1.0, 300.0);
                sync.amount = Some(fmt2(fiat + off));
                report.amount_mismatches += 1;
            }
            OrderFault::FeeOff => {
                sync.fee = Some(fmt2(commission + 0.5));
                report.fee_mismatches += 1;
            }
            OrderFault::FeeMissing => {
                sync.fee = None;
                report.fees_not_recorded += 1;
            }
            OrderFault::Stale => {
                sync.sync_status = "pending".into();
                sync.updated_at = window.end - 30 * MILLIS_PER_HOUR;
                report.stale_syncs += 1;
            }
            OrderFault::Orphan => {
                sync.entry_id = Some(1_000_000 + entry_id);
                report.orphan_syncs += 1;
            }
        }
        store.insert_sync_entry(table, &sync)?;
    }

    seed_movements(store, &mut rng, &mut report, seed, (order_count / 10).max(1), &mut at)?;
    seed_conversions(store, &mut rng, &mut report, seed, (order_count / 20).max(1), &mut at)?;
    seed_balances(store, &mut rng, &mut report, window.end)?;

    log::info!("seeded demo ledgers (seed {seed}): {report:?}");
    Ok(report)
}

fn seed_master_data(store: &ReconStore) -> ReconResult<()> {
    for (label, id) in MAPPED_METHODS {
        store.insert_payment_method(id, label, true)?;
        store.map_payment_label(label, id)?;
    }
    // Mapping into a payment method that was never created.
    store.map_payment_label("PhonePe", 99)?;

    // All but the last counterparty are on file; one has a near-duplicate.
    for name in &COUNTERPARTIES[..COUNTERPARTIES.len() - 1] {
        store.insert_client(name, Some(name), true)?;
    }
    store.insert_client("Rajesh K.", None, true)?;
    Ok(())
}

fn seed_movements(
    store: &ReconStore,
    rng: &mut DemoRng,
    report: &mut DemoReport,
    seed: u64,
    count: usize,
    at: &mut impl FnMut(&mut DemoRng) -> EpochMillis,
) -> ReconResult<()> {
    for i in 0..count {
        let movement_type = if rng.chance(0.5) {
            MovementType::Deposit
        } else {
            MovementType::Withdrawal
        };
        let amount = fmt2(rng.amount(100.0, 10_000.0));
        let movement_id = format!("MV-{seed}-{i:04}");
        let created_at = at(rng);
        store.insert_terminal_movement(&TerminalMovementRow {
            movement_id: movement_id.clone(),
            movement_type,
            asset: "USDT".into(),
            amount: amount.clone(),
            network_fee: Some("1.00".into()),
            status: TERMINAL_COMPLETED.into(),
            tx_id: Some(format!("0x{:016x}", rng.below(u64::MAX))),
            created_at,
        })?;
        report.movements += 1;

        if rng.chance(0.1) {
            report.missing_movements += 1;
            continue;
        }
        store.insert_wallet_movement(&WalletMovementRow {
            id: 0,
            terminal_ref: movement_id,
            movement_type,
            asset: "USDT".into(),
            amount,
            created_at,
        })?;
    }
    Ok(())
}

fn seed_conversions(
    store: &ReconStore,
    rng: &mut DemoRng,
    report: &mut DemoReport,
    seed: u64,
    count: usize,
    at: &mut impl FnMut(&mut DemoRng) -> EpochMillis,
) -> ReconResult<()> {
    for i in 0..count {
        let from_amount = rng.amount(1_000.0, 20_000.0);
        let to_amount = fmt2(from_amount / 65_000.0 * 1_000.0);
        let conversion_id = format!("CV-{seed}-{i:04}");
        let created_at = at(rng);
        store.insert_terminal_conversion(&TerminalConversionRow {
            conversion_id: conversion_id.clone(),
            from_asset: "USDT".into(),
            to_asset: "BTC".into(),
            from_amount: fmt2(from_amount),
            to_amount: to_amount.clone(),
            status: TERMINAL_COMPLETED.into(),
            created_at,
        })?;
        report.conversions += 1;

        if rng.chance(0.1) {
            report.missing_conversions += 1;
            continue;
        }
        store.insert_erp_conversion(&ErpConversionRow {
            id: 0,
            terminal_ref: conversion_id,
            from_asset: "USDT".into(),
            to_asset: "BTC".into(),
            from_amount: fmt2(from_amount),
            to_amount,
            created_at,
        })?;
    }
    Ok(())
}

fn seed_balances(
    store: &ReconStore,
    rng: &mut DemoRng,
    report: &mut DemoReport,
    now: EpochMillis,
) -> ReconResult<()> {
    let main = rng.amount(10_000.0, 50_000.0);
    let petty = if rng.chance(0.5) {
        report.negative_balances += 1;
        -rng.amount(10.0, 200.0)
    } else {
        rng.amount(10.0, 200.0)
    };
    for (wallet, balance) in [("main", main), ("petty", petty)] {
        store.upsert_wallet_balance(&WalletBalanceRow {
            wallet_id: wallet.into(),
            asset: "USDT".into(),
            balance: fmt2(balance),
            updated_at: now,
        })?;
    }
    // Exchange snapshot agrees with the ERP total.
    store.upsert_terminal_balance(&TerminalBalanceRow {
        asset: "USDT".into(),
        free: fmt2(main + petty),
        locked: "0".into(),
        snapshot_at: now,
    })?;
    Ok(())
}
