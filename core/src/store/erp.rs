use super::{
    placeholders, ClientRow, DuplicateKeyRow, ErpConversionRow, PaymentMappingRow, ReconStore,
    SyncEntryRow, SyncTable, WalletBalanceRow, WalletMovementRow, INTERMEDIATE_SYNC_STATUSES,
    KEY_BATCH,
};
use crate::{error::ReconResult, types::EpochMillis};
use rusqlite::{params, params_from_iter};
use std::collections::HashSet;

const SYNC_COLUMNS: &str = "id, order_number, asset, amount, fee, counterparty,
                            sync_status, entry_id, created_at, updated_at";

impl ReconStore {
    // ─────────────────────────────────────────────────────────────────
    // Purchase / sale sync tables
    // ─────────────────────────────────────────────────────────────────

    /// Insert a sync row and return its assigned id.
    pub fn insert_sync_entry(&self, table: SyncTable, e: &SyncEntryRow) -> ReconResult<i64> {
        self.conn.execute(
            &format!(
                "INSERT INTO {}
                 (order_number, asset, amount, fee, counterparty, sync_status,
                  entry_id, created_at, updated_at)
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9)",
                table.table()
            ),
            params![
                e.order_number,
                e.asset,
                e.amount,
                e.fee,
                e.counterparty,
                e.sync_status,
                e.entry_id,
                e.created_at,
                e.updated_at,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn update_sync_status(
        &self,
        table: SyncTable,
        id: i64,
        status: &str,
        updated_at: EpochMillis,
    ) -> ReconResult<()> {
        self.conn.execute(
            &format!(
                "UPDATE {} SET sync_status = ?1, updated_at = ?2 WHERE id = ?3",
                table.table()
            ),
            params![status, updated_at, id],
        )?;
        Ok(())
    }

    /// Insert a purchase/sale ledger entry that sync rows point at.
    pub fn insert_ledger_entry(
        &self,
        table: SyncTable,
        entry_id: i64,
        order_number: &str,
        total_amount: &str,
        created_at: EpochMillis,
    ) -> ReconResult<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO {} (entry_id, order_number, total_amount, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                table.entry_table()
            ),
            params![entry_id, order_number, total_amount, created_at],
        )?;
        Ok(())
    }

    /// Sync rows referencing any of `order_numbers`, looked up in key batches.
    pub fn sync_entries_for_orders(
        &self,
        table: SyncTable,
        order_numbers: &[String],
    ) -> ReconResult<Vec<SyncEntryRow>> {
        let mut out = Vec::new();
        for chunk in order_numbers.chunks(KEY_BATCH) {
            let sql = format!(
                "SELECT {SYNC_COLUMNS} FROM {} WHERE order_number IN ({}) ORDER BY id ASC",
                table.table(),
                placeholders(chunk.len())
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(chunk.iter()), Self::map_sync_row)?
                .collect::<Result<Vec<_>, _>>()?;
            out.extend(rows);
        }
        Ok(out)
    }

    /// Order numbers referenced by more than one row of `table`.
    pub fn duplicate_sync_keys(&self, table: SyncTable) -> ReconResult<Vec<DuplicateKeyRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT order_number, group_concat(id)
             FROM {}
             GROUP BY order_number
             HAVING COUNT(*) > 1
             ORDER BY order_number ASC",
            table.table()
        ))?;
        let rows = stmt
            .query_map([], |row| {
                let ids: String = row.get(1)?;
                let mut ids: Vec<i64> = ids
                    .split(',')
                    .filter_map(|s| s.trim().parse().ok())
                    .collect();
                ids.sort_unstable();
                Ok(DuplicateKeyRow {
                    order_number: row.get(0)?,
                    ids,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Rows still in an intermediate workflow state, last touched before `cutoff`.
    pub fn stale_sync_entries(
        &self,
        table: SyncTable,
        cutoff: EpochMillis,
    ) -> ReconResult<Vec<SyncEntryRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SYNC_COLUMNS} FROM {}
             WHERE sync_status IN (?1, ?2) AND updated_at < ?3
             ORDER BY updated_at ASC, id ASC",
            table.table()
        ))?;
        let rows = stmt
            .query_map(
                params![
                    INTERMEDIATE_SYNC_STATUSES[0],
                    INTERMEDIATE_SYNC_STATUSES[1],
                    cutoff
                ],
                Self::map_sync_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Rows whose `entry_id` names a ledger entry that does not exist.
    pub fn orphan_sync_entries(&self, table: SyncTable) -> ReconResult<Vec<SyncEntryRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SYNC_COLUMNS} FROM {} s
             WHERE s.entry_id IS NOT NULL
               AND NOT EXISTS (SELECT 1 FROM {} e WHERE e.entry_id = s.entry_id)
             ORDER BY s.id ASC",
            table.table(),
            table.entry_table()
        ))?;
        let rows = stmt
            .query_map([], Self::map_sync_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn sync_entry_count(&self, table: SyncTable) -> ReconResult<i64> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", table.table()),
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn map_sync_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SyncEntryRow> {
        Ok(SyncEntryRow {
            id: row.get(0)?,
            order_number: row.get(1)?,
            asset: row.get(2)?,
            amount: row.get(3)?,
            fee: row.get(4)?,
            counterparty: row.get(5)?,
            sync_status: row.get(6)?,
            entry_id: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    // ─────────────────────────────────────────────────────────────────
    // Wallets
    // ─────────────────────────────────────────────────────────────────

    pub fn upsert_wallet_balance(&self, b: &WalletBalanceRow) -> ReconResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO erp_wallet_balance (wallet_id, asset, balance, updated_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![b.wallet_id, b.asset, b.balance, b.updated_at],
        )?;
        Ok(())
    }

    pub fn wallet_balances(&self) -> ReconResult<Vec<WalletBalanceRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT wallet_id, asset, balance, updated_at
             FROM erp_wallet_balance
             ORDER BY asset ASC, wallet_id ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(WalletBalanceRow {
                    wallet_id: row.get(0)?,
                    asset: row.get(1)?,
                    balance: row.get(2)?,
                    updated_at: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn insert_wallet_movement(&self, m: &WalletMovementRow) -> ReconResult<i64> {
        self.conn.execute(
            "INSERT INTO erp_wallet_movement
             (terminal_ref, movement_type, asset, amount, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                m.terminal_ref,
                m.movement_type.as_str(),
                m.asset,
                m.amount,
                m.created_at,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Which of `refs` have at least one ERP wallet movement.
    pub fn wallet_movement_refs(&self, refs: &[String]) -> ReconResult<HashSet<String>> {
        let mut found = HashSet::new();
        for chunk in refs.chunks(KEY_BATCH) {
            let sql = format!(
                "SELECT DISTINCT terminal_ref FROM erp_wallet_movement
                 WHERE terminal_ref IN ({})",
                placeholders(chunk.len())
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(chunk.iter()), |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            found.extend(rows);
        }
        Ok(found)
    }

    // ─────────────────────────────────────────────────────────────────
    // Conversions
    // ─────────────────────────────────────────────────────────────────

    pub fn insert_erp_conversion(&self, c: &ErpConversionRow) -> ReconResult<i64> {
        self.conn.execute(
            "INSERT INTO erp_conversion
             (terminal_ref, from_asset, to_asset, from_amount, to_amount, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                c.terminal_ref,
                c.from_asset,
                c.to_asset,
                c.from_amount,
                c.to_amount,
                c.created_at,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn erp_conversions_for(&self, refs: &[String]) -> ReconResult<Vec<ErpConversionRow>> {
        let mut out = Vec::new();
        for chunk in refs.chunks(KEY_BATCH) {
            let sql = format!(
                "SELECT id, terminal_ref, from_asset, to_asset, from_amount, to_amount, created_at
                 FROM erp_conversion
                 WHERE terminal_ref IN ({})
                 ORDER BY id ASC",
                placeholders(chunk.len())
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(chunk.iter()), |row| {
                    Ok(ErpConversionRow {
                        id: row.get(0)?,
                        terminal_ref: row.get(1)?,
                        from_asset: row.get(2)?,
                        to_asset: row.get(3)?,
                        from_amount: row.get(4)?,
                        to_amount: row.get(5)?,
                        created_at: row.get(6)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            out.extend(rows);
        }
        Ok(out)
    }

    // ─────────────────────────────────────────────────────────────────
    // Clients
    // ─────────────────────────────────────────────────────────────────

    pub fn insert_client(
        &self,
        name: &str,
        nickname: Option<&str>,
        is_active: bool,
    ) -> ReconResult<i64> {
        self.conn.execute(
            "INSERT INTO erp_client (name, nickname, is_active) VALUES (?1, ?2, ?3)",
            params![name, nickname, is_active],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Lower-cased nicknames from `nicknames` that exist on any client.
    ///
    /// Folding happens here rather than in SQL: SQLite's `lower()` only
    /// folds ASCII, so "Élodie" would never meet "élodie".
    pub fn known_client_nicknames(&self, nicknames: &[String]) -> ReconResult<HashSet<String>> {
        let wanted: HashSet<String> = nicknames.iter().map(|n| n.trim().to_lowercase()).collect();
        if wanted.is_empty() {
            return Ok(HashSet::new());
        }
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT nickname FROM erp_client WHERE nickname IS NOT NULL")?;
        let stored = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(stored
            .into_iter()
            .map(|n| n.trim().to_lowercase())
            .filter(|n| wanted.contains(n))
            .collect())
    }

    pub fn active_clients(&self) -> ReconResult<Vec<ClientRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT client_id, name, nickname, is_active
             FROM erp_client
             WHERE is_active = 1
             ORDER BY client_id ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ClientRow {
                    client_id: row.get(0)?,
                    name: row.get(1)?,
                    nickname: row.get(2)?,
                    is_active: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ─────────────────────────────────────────────────────────────────
    // Payment methods
    // ─────────────────────────────────────────────────────────────────

    pub fn insert_payment_method(&self, id: i64, name: &str, is_active: bool) -> ReconResult<()> {
        self.conn.execute(
            "INSERT INTO erp_payment_method (payment_method_id, name, is_active)
             VALUES (?1, ?2, ?3)",
            params![id, name, is_active],
        )?;
        Ok(())
    }

    pub fn map_payment_label(&self, terminal_label: &str, payment_method_id: i64) -> ReconResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO erp_payment_mapping (terminal_label, payment_method_id)
             VALUES (?1, ?2)",
            params![terminal_label, payment_method_id],
        )?;
        Ok(())
    }

    /// Every mapping with the state of the method it points at.
    pub fn payment_mappings(&self) -> ReconResult<Vec<PaymentMappingRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT m.terminal_label, m.payment_method_id, pm.is_active
             FROM erp_payment_mapping m
             LEFT JOIN erp_payment_method pm ON pm.payment_method_id = m.payment_method_id
             ORDER BY m.terminal_label ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(PaymentMappingRow {
                    terminal_label: row.get(0)?,
                    payment_method_id: row.get(1)?,
                    method_active: row.get::<_, Option<bool>>(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

