//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! Detectors and the engine call store methods. They never execute SQL.
//!
//! The terminal and ERP ledgers are read-only to the engine; their insert
//! methods exist for ingestion tooling, demo data and tests.

use crate::{error::ReconResult, finding::Severity, types::EpochMillis};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

mod erp;
mod scan;
mod settings;
mod terminal;

pub use terminal::TERMINAL_COMPLETED;

/// Maximum keys bound into one `IN (...)` lookup.
pub const KEY_BATCH: usize = 500;

pub struct ReconStore {
    conn: Connection,
}

impl ReconStore {
    pub fn open(path: &str) -> ReconResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> ReconResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> ReconResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_terminal_ledger.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/003_erp_ledger.sql"))?;
        Ok(())
    }
}

/// `?,?,?` for an `IN (...)` clause of `n` keys.
fn placeholders(n: usize) -> String {
    vec!["?"; n].join(",")
}

// ── Terminal (exchange) ledger rows ───────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeType {
    Buy,
    Sell,
}

impl TradeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }

    fn from_column(s: &str) -> Self {
        if s.eq_ignore_ascii_case("SELL") {
            Self::Sell
        } else {
            Self::Buy
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TerminalOrderRow {
    pub order_number: String,
    pub trade_type: TradeType,
    pub asset: String,
    pub fiat_amount: String,
    pub crypto_amount: String,
    pub commission: Option<String>,
    pub status: String,
    pub counterparty: Option<String>,
    pub pay_method: Option<String>,
    pub created_at: EpochMillis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    Deposit,
    Withdrawal,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Withdrawal => "withdrawal",
        }
    }

    fn from_column(s: &str) -> Self {
        if s.eq_ignore_ascii_case("withdrawal") {
            Self::Withdrawal
        } else {
            Self::Deposit
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TerminalMovementRow {
    pub movement_id: String,
    pub movement_type: MovementType,
    pub asset: String,
    pub amount: String,
    pub network_fee: Option<String>,
    pub status: String,
    pub tx_id: Option<String>,
    pub created_at: EpochMillis,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TerminalConversionRow {
    pub conversion_id: String,
    pub from_asset: String,
    pub to_asset: String,
    pub from_amount: String,
    pub to_amount: String,
    pub status: String,
    pub created_at: EpochMillis,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TerminalBalanceRow {
    pub asset: String,
    pub free: String,
    pub locked: String,
    pub snapshot_at: EpochMillis,
}

// ── ERP ledger rows ───────────────────────────────────────────────────

/// The two sync tables mirroring exchange trades into the ERP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncTable {
    Purchase,
    Sale,
}

impl SyncTable {
    pub const ALL: [SyncTable; 2] = [SyncTable::Purchase, SyncTable::Sale];

    fn table(&self) -> &'static str {
        match self {
            Self::Purchase => "erp_purchase_sync",
            Self::Sale => "erp_sale_sync",
        }
    }

    fn entry_table(&self) -> &'static str {
        match self {
            Self::Purchase => "erp_purchase_entry",
            Self::Sale => "erp_sale_entry",
        }
    }

    /// Short label used in finding references, e.g. `purchase_sync#12`.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Purchase => "purchase_sync",
            Self::Sale => "sale_sync",
        }
    }

    pub fn row_ref(&self, id: i64) -> String {
        format!("{}#{id}", self.label())
    }
}

/// Workflow states a sync row passes through before it is settled.
pub const INTERMEDIATE_SYNC_STATUSES: [&str; 2] = ["pending", "processing"];

#[derive(Debug, Clone, PartialEq)]
pub struct SyncEntryRow {
    /// Assigned by the database; ignored on insert.
    pub id: i64,
    pub order_number: String,
    pub asset: Option<String>,
    pub amount: Option<String>,
    pub fee: Option<String>,
    pub counterparty: Option<String>,
    pub sync_status: String,
    pub entry_id: Option<i64>,
    pub created_at: EpochMillis,
    pub updated_at: EpochMillis,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateKeyRow {
    pub order_number: String,
    /// Row ids sharing the key, ascending.
    pub ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WalletBalanceRow {
    pub wallet_id: String,
    pub asset: String,
    pub balance: String,
    pub updated_at: EpochMillis,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WalletMovementRow {
    pub id: i64,
    pub terminal_ref: String,
    pub movement_type: MovementType,
    pub asset: String,
    pub amount: String,
    pub created_at: EpochMillis,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ErpConversionRow {
    pub id: i64,
    pub terminal_ref: String,
    pub from_asset: String,
    pub to_asset: String,
    pub from_amount: String,
    pub to_amount: String,
    pub created_at: EpochMillis,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRow {
    pub client_id: i64,
    pub name: String,
    pub nickname: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentMappingRow {
    pub terminal_label: String,
    pub payment_method_id: i64,
    /// None when the referenced payment method does not exist.
    pub method_active: Option<bool>,
}

// ── Engine-owned rows ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Running,
    Completed,
    Failed,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    fn from_column(s: &str) -> Self {
        match s {
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => Self::Running,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanRunRow {
    pub scan_id: String,
    pub scope: Vec<String>,
    pub triggered_by: String,
    pub status: ScanStatus,
    pub started_at: EpochMillis,
    pub completed_at: Option<EpochMillis>,
    pub duration_ms: Option<i64>,
    pub findings_count: i64,
    pub critical_count: i64,
    pub warning_count: i64,
    pub review_count: i64,
    pub info_count: i64,
    pub summary: Option<String>,
    pub error: Option<String>,
}

/// Per-severity tallies written to the scan run at completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub critical: i64,
    pub warning: i64,
    pub review: i64,
    pub info: i64,
}

impl SeverityCounts {
    pub fn record(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::Warning => self.warning += 1,
            Severity::Review => self.review += 1,
            Severity::Info => self.info += 1,
        }
    }

    pub fn total(&self) -> i64 {
        self.critical + self.warning + self.review + self.info
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanCompletion {
    pub completed_at: EpochMillis,
    pub duration_ms: i64,
    pub counts: SeverityCounts,
    pub summary: String,
}
