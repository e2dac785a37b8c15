use super::ReconStore;
use crate::{error::ReconResult, types::EpochMillis};
use rusqlite::{params, OptionalExtension};

/// Values a boolean setting accepts as "on".
const TRUTHY: [&str; 4] = ["true", "1", "on", "yes"];

impl ReconStore {
    pub fn get_setting(&self, key: &str) -> ReconResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM app_setting WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn set_setting(&self, key: &str, value: &str, updated_at: EpochMillis) -> ReconResult<()> {
        self.conn.execute(
            "INSERT INTO app_setting (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, updated_at],
        )?;
        Ok(())
    }

    /// A missing flag reads as disabled.
    pub fn flag_enabled(&self, key: &str) -> ReconResult<bool> {
        Ok(self
            .get_setting(key)?
            .map(|v| TRUTHY.iter().any(|t| v.trim().eq_ignore_ascii_case(t)))
            .unwrap_or(false))
    }
}
