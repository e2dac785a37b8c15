//! Fixtures shared by the integration tests.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use recon_core::{
    engine::ScanEngine,
    store::{SyncEntryRow, SyncTable, TerminalOrderRow, TradeType, TERMINAL_COMPLETED},
    types::{EpochMillis, MILLIS_PER_HOUR},
};

/// 2024-03-10 12:00 at the desk (UTC+05:30).
pub fn now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-03-10T06:30:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

/// One hour before `now()`, safely inside today's window.
pub fn today() -> EpochMillis {
    now().timestamp_millis() - MILLIS_PER_HOUR
}

/// Yesterday at the desk, outside today's window.
pub fn yesterday() -> EpochMillis {
    now().timestamp_millis() - 20 * MILLIS_PER_HOUR
}

pub fn build() -> ScanEngine {
    let _ = env_logger::builder().is_test(true).try_init();
    ScanEngine::build_test().expect("build_test failed")
}

pub fn order(number: &str, trade_type: TradeType, fiat: &str) -> TerminalOrderRow {
    TerminalOrderRow {
        order_number: number.to_string(),
        trade_type,
        asset: "USDT".into(),
        fiat_amount: fiat.to_string(),
        crypto_amount: "10.00".into(),
        commission: None,
        status: TERMINAL_COMPLETED.into(),
        counterparty: None,
        pay_method: None,
        created_at: today(),
    }
}

pub fn sync(number: &str, amount: &str) -> SyncEntryRow {
    SyncEntryRow {
        id: 0,
        order_number: number.to_string(),
        asset: Some("USDT".into()),
        amount: Some(amount.to_string()),
        fee: None,
        counterparty: None,
        sync_status: "synced".into(),
        entry_id: None,
        created_at: today(),
        updated_at: today(),
    }
}

/// Completed order plus a matching sync row and ledger entry.
pub fn synced_order(engine: &ScanEngine, o: &TerminalOrderRow, entry_id: i64) {
    let table = match o.trade_type {
        TradeType::Buy => SyncTable::Purchase,
        TradeType::Sell => SyncTable::Sale,
    };
    engine.store.insert_terminal_order(o).unwrap();
    engine
        .store
        .insert_ledger_entry(table, entry_id, &o.order_number, &o.fiat_amount, o.created_at)
        .unwrap();
    let mut row = sync(&o.order_number, &o.fiat_amount);
    row.entry_id = Some(entry_id);
    row.fee = o.commission.clone();
    engine.store.insert_sync_entry(table, &row).unwrap();
}
