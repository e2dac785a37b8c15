use super::{ReconStore, ScanCompletion, ScanRunRow, ScanStatus};
use crate::{
    error::{ReconError, ReconResult},
    finding::Finding,
    types::EpochMillis,
};
use rusqlite::{
    params, params_from_iter,
    types::{Type, Value},
    Connection, OptionalExtension, Transaction, TransactionBehavior,
};

const FINDING_COLUMNS: [&str; 16] = [
    "scan_id",
    "finding_type",
    "severity",
    "category",
    "asset",
    "terminal_ref",
    "erp_ref",
    "terminal_amount",
    "erp_amount",
    "variance",
    "suggested_action",
    "confidence",
    "reasoning",
    "details",
    "status",
    "created_at",
];

impl ReconStore {
    // ─────────────────────────────────────────────────────────────────
    // Scan runs
    // ─────────────────────────────────────────────────────────────────

    /// Insert a running scan. With `guard_since`, refuse while another scan
    /// started at or after that instant is still running. Check and insert
    /// share one IMMEDIATE transaction.
    pub fn open_scan(&self, run: &ScanRunRow, guard_since: Option<EpochMillis>) -> ReconResult<()> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;

        if let Some(since) = guard_since {
            let running = tx
                .query_row(
                    "SELECT scan_id FROM recon_scan
                     WHERE status = 'running' AND started_at >= ?1
                     ORDER BY started_at DESC LIMIT 1",
                    params![since],
                    |row| row.get::<_, String>(0),
                )
                .optional()?;
            if let Some(scan_id) = running {
                return Err(ReconError::ScanInProgress { scan_id });
            }
        }

        tx.execute(
            "INSERT INTO recon_scan (scan_id, scope, triggered_by, status, started_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                run.scan_id,
                serde_json::to_string(&run.scope)?,
                run.triggered_by,
                ScanStatus::Running.as_str(),
                run.started_at,
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Insert all findings in batches and close the scan run, atomically.
    pub fn finalize_scan(
        &self,
        scan_id: &str,
        findings: &[Finding],
        batch_size: usize,
        completion: &ScanCompletion,
    ) -> ReconResult<()> {
        let tx = self.conn.unchecked_transaction()?;

        for batch in findings.chunks(batch_size.max(1)) {
            Self::insert_finding_batch(&tx, batch, completion.completed_at)?;
        }

        let c = &completion.counts;
        let updated = tx.execute(
            "UPDATE recon_scan
             SET status = ?1, completed_at = ?2, duration_ms = ?3,
                 findings_count = ?4, critical_count = ?5, warning_count = ?6,
                 review_count = ?7, info_count = ?8, summary = ?9
             WHERE scan_id = ?10 AND status = 'running'",
            params![
                ScanStatus::Completed.as_str(),
                completion.completed_at,
                completion.duration_ms,
                c.total(),
                c.critical,
                c.warning,
                c.review,
                c.info,
                completion.summary,
                scan_id,
            ],
        )?;
        if updated != 1 {
            return Err(anyhow::anyhow!("scan run {scan_id} is not open").into());
        }

        tx.commit()?;
        Ok(())
    }

    pub fn mark_scan_failed(
        &self,
        scan_id: &str,
        error: &str,
        completed_at: EpochMillis,
        duration_ms: i64,
    ) -> ReconResult<()> {
        self.conn.execute(
            "UPDATE recon_scan
             SET status = ?1, completed_at = ?2, duration_ms = ?3, error = ?4
             WHERE scan_id = ?5 AND status = 'running'",
            params![
                ScanStatus::Failed.as_str(),
                completed_at,
                duration_ms,
                error,
                scan_id,
            ],
        )?;
        Ok(())
    }

    fn insert_finding_batch(
        conn: &Connection,
        batch: &[Finding],
        created_at: EpochMillis,
    ) -> ReconResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let row = format!("({})", vec!["?"; FINDING_COLUMNS.len()].join(","));
        let sql = format!(
            "INSERT INTO recon_finding ({}) VALUES {}",
            FINDING_COLUMNS.join(", "),
            vec![row.as_str(); batch.len()].join(",")
        );

        let mut values: Vec<Value> = Vec::with_capacity(batch.len() * FINDING_COLUMNS.len());
        for f in batch {
            values.push(Value::Text(f.scan_id.clone()));
            values.push(Value::Text(f.finding_type.as_str().to_string()));
            values.push(Value::Text(f.severity.as_str().to_string()));
            values.push(Value::Text(f.category.as_str().to_string()));
            values.push(opt_text(&f.asset));
            values.push(opt_text(&f.terminal_ref));
            values.push(opt_text(&f.erp_ref));
            values.push(opt_real(f.terminal_amount));
            values.push(opt_real(f.erp_amount));
            values.push(opt_real(f.variance));
            values.push(Value::Text(f.suggested_action.as_str().to_string()));
            values.push(Value::Real(f.confidence));
            values.push(Value::Text(f.reasoning.clone()));
            values.push(Value::Text(serde_json::to_string(&f.details)?));
            values.push(Value::Text("open".to_string()));
            values.push(Value::Integer(created_at));
        }

        conn.execute(&sql, params_from_iter(values.iter()))?;
        Ok(())
    }

    pub fn get_scan(&self, scan_id: &str) -> ReconResult<Option<ScanRunRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT scan_id, scope, triggered_by, status, started_at, completed_at,
                        duration_ms, findings_count, critical_count, warning_count,
                        review_count, info_count, summary, error
                 FROM recon_scan WHERE scan_id = ?1",
                params![scan_id],
                |row| {
                    let scope: String = row.get(1)?;
                    Ok(ScanRunRow {
                        scan_id: row.get(0)?,
                        scope: serde_json::from_str(&scope)
                            .map_err(|e| conversion_error(1, e))?,
                        triggered_by: row.get(2)?,
                        status: ScanStatus::from_column(&row.get::<_, String>(3)?),
                        started_at: row.get(4)?,
                        completed_at: row.get(5)?,
                        duration_ms: row.get(6)?,
                        findings_count: row.get(7)?,
                        critical_count: row.get(8)?,
                        warning_count: row.get(9)?,
                        review_count: row.get(10)?,
                        info_count: row.get(11)?,
                        summary: row.get(12)?,
                        error: row.get(13)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Findings of one scan in insertion order.
    pub fn findings_for_scan(&self, scan_id: &str) -> ReconResult<Vec<Finding>> {
        let mut stmt = self.conn.prepare(
            "SELECT scan_id, finding_type, severity, category, asset, terminal_ref, erp_ref,
                    terminal_amount, erp_amount, variance, suggested_action, confidence,
                    reasoning, details
             FROM recon_finding
             WHERE scan_id = ?1
             ORDER BY finding_id ASC",
        )?;
        let rows = stmt
            .query_map(params![scan_id], |row| {
                let details: String = row.get(13)?;
                Ok(Finding {
                    scan_id: row.get(0)?,
                    finding_type: parse_column(row, 1)?,
                    severity: parse_column(row, 2)?,
                    category: parse_column(row, 3)?,
                    asset: row.get(4)?,
                    terminal_ref: row.get(5)?,
                    erp_ref: row.get(6)?,
                    terminal_amount: row.get(7)?,
                    erp_amount: row.get(8)?,
                    variance: row.get(9)?,
                    suggested_action: parse_column(row, 10)?,
                    confidence: row.get(11)?,
                    reasoning: row.get(12)?,
                    details: serde_json::from_str(&details).map_err(|e| conversion_error(13, e))?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn finding_count(&self, scan_id: &str) -> ReconResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM recon_finding WHERE scan_id = ?1",
            params![scan_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn scan_count(&self) -> ReconResult<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM recon_scan", [], |row| row.get(0))?;
        Ok(count)
    }
}

fn opt_text(v: &Option<String>) -> Value {
    v.clone().map(Value::Text).unwrap_or(Value::Null)
}

fn opt_real(v: Option<f64>) -> Value {
    v.map(Value::Real).unwrap_or(Value::Null)
}

fn parse_column<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>().map_err(|e| conversion_error(idx, e))
}

fn conversion_error<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}
