use super::{
    MovementType, ReconStore, TerminalBalanceRow, TerminalConversionRow, TerminalMovementRow,
    TerminalOrderRow, TradeType,
};
use crate::{clock::ScanWindow, error::ReconResult};
use rusqlite::params;

/// Terminal status for a settled order, movement or conversion.
pub const TERMINAL_COMPLETED: &str = "COMPLETED";

impl ReconStore {
    // ─────────────────────────────────────────────────────────────────
    // Orders
    // ─────────────────────────────────────────────────────────────────

    pub fn insert_terminal_order(&self, o: &TerminalOrderRow) -> ReconResult<()> {
        self.conn.execute(
            "INSERT INTO terminal_order
             (order_number, trade_type, asset, fiat_amount, crypto_amount,
              commission, status, counterparty, pay_method, created_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
            params![
                o.order_number,
                o.trade_type.as_str(),
                o.asset,
                o.fiat_amount,
                o.crypto_amount,
                o.commission,
                o.status,
                o.counterparty,
                o.pay_method,
                o.created_at,
            ],
        )?;
        Ok(())
    }

    /// Completed orders created inside the window, optionally one side only.
    pub fn completed_orders(
        &self,
        window: &ScanWindow,
        trade_type: Option<TradeType>,
    ) -> ReconResult<Vec<TerminalOrderRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT order_number, trade_type, asset, fiat_amount, crypto_amount,
                    commission, status, counterparty, pay_method, created_at
             FROM terminal_order
             WHERE status = ?1
               AND created_at >= ?2 AND created_at <= ?3
               AND (?4 IS NULL OR trade_type = ?4)
             ORDER BY created_at ASC, order_number ASC",
        )?;
        let rows = stmt
            .query_map(
                params![
                    TERMINAL_COMPLETED,
                    window.start,
                    window.end,
                    trade_type.map(|t| t.as_str()),
                ],
                |row| {
                    Ok(TerminalOrderRow {
                        order_number: row.get(0)?,
                        trade_type: TradeType::from_column(&row.get::<_, String>(1)?),
                        asset: row.get(2)?,
                        fiat_amount: row.get(3)?,
                        crypto_amount: row.get(4)?,
                        commission: row.get(5)?,
                        status: row.get(6)?,
                        counterparty: row.get(7)?,
                        pay_method: row.get(8)?,
                        created_at: row.get(9)?,
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ─────────────────────────────────────────────────────────────────
    // Wallet movements
    // ─────────────────────────────────────────────────────────────────

    pub fn insert_terminal_movement(&self, m: &TerminalMovementRow) -> ReconResult<()> {
        self.conn.execute(
            "INSERT INTO terminal_movement
             (movement_id, movement_type, asset, amount, network_fee, status, tx_id, created_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8)",
            params![
                m.movement_id,
                m.movement_type.as_str(),
                m.asset,
                m.amount,
                m.network_fee,
                m.status,
                m.tx_id,
                m.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn completed_movements(&self, window: &ScanWindow) -> ReconResult<Vec<TerminalMovementRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT movement_id, movement_type, asset, amount, network_fee,
                    status, tx_id, created_at
             FROM terminal_movement
             WHERE status = ?1 AND created_at >= ?2 AND created_at <= ?3
             ORDER BY created_at ASC, movement_id ASC",
        )?;
        let rows = stmt
            .query_map(params![TERMINAL_COMPLETED, window.start, window.end], |row| {
                Ok(TerminalMovementRow {
                    movement_id: row.get(0)?,
                    movement_type: MovementType::from_column(&row.get::<_, String>(1)?),
                    asset: row.get(2)?,
                    amount: row.get(3)?,
                    network_fee: row.get(4)?,
                    status: row.get(5)?,
                    tx_id: row.get(6)?,
                    created_at: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ─────────────────────────────────────────────────────────────────
    // Spot conversions
    // ─────────────────────────────────────────────────────────────────

    pub fn insert_terminal_conversion(&self, c: &TerminalConversionRow) -> ReconResult<()> {
        self.conn.execute(
            "INSERT INTO terminal_conversion
             (conversion_id, from_asset, to_asset, from_amount, to_amount, status, created_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7)",
            params![
                c.conversion_id,
                c.from_asset,
                c.to_asset,
                c.from_amount,
                c.to_amount,
                c.status,
                c.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn completed_conversions(
        &self,
        window: &ScanWindow,
    ) -> ReconResult<Vec<TerminalConversionRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT conversion_id, from_asset, to_asset, from_amount, to_amount,
                    status, created_at
             FROM terminal_conversion
             WHERE status = ?1 AND created_at >= ?2 AND created_at <= ?3
             ORDER BY created_at ASC, conversion_id ASC",
        )?;
        let rows = stmt
            .query_map(params![TERMINAL_COMPLETED, window.start, window.end], |row| {
                Ok(TerminalConversionRow {
                    conversion_id: row.get(0)?,
                    from_asset: row.get(1)?,
                    to_asset: row.get(2)?,
                    from_amount: row.get(3)?,
                    to_amount: row.get(4)?,
                    status: row.get(5)?,
                    created_at: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ─────────────────────────────────────────────────────────────────
    // Balance snapshot
    // ─────────────────────────────────────────────────────────────────

    pub fn upsert_terminal_balance(&self, b: &TerminalBalanceRow) -> ReconResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO terminal_balance (asset, free, locked, snapshot_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![b.asset, b.free, b.locked, b.snapshot_at],
        )?;
        Ok(())
    }

    pub fn terminal_balances(&self) -> ReconResult<Vec<TerminalBalanceRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT asset, free, locked, snapshot_at
             FROM terminal_balance
             ORDER BY asset ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(TerminalBalanceRow {
                    asset: row.get(0)?,
                    free: row.get(1)?,
                    locked: row.get(2)?,
                    snapshot_at: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
