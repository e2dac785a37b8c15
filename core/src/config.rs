//! Engine configuration.
//!
//! Operational knobs only. Detection thresholds are constants in
//! `classify`.

use serde::{Deserialize, Serialize};

pub const DEFAULT_FLAG_KEY: &str = "reconciliation_engine_enabled";
pub const DEFAULT_INSERT_BATCH_SIZE: usize = 100;
pub const MAX_INSERT_BATCH_SIZE: usize = 500;
pub const MAX_LOOKBACK_DAYS: u32 = 31;
/// One week.
pub const MAX_RUNNING_SCAN_TIMEOUT_MINUTES: i64 = 7 * 24 * 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// `app_setting` key that gates every scan.
    pub feature_flag_key: String,
    /// Findings per INSERT statement.
    pub insert_batch_size: usize,
    /// Refuse to open a scan while another one is running.
    pub exclusive_scans: bool,
    /// A running scan older than this no longer blocks new ones
    /// (it is assumed to have crashed).
    pub running_scan_timeout_minutes: i64,
    /// Whole days added before desk-midnight at the window start.
    pub lookback_days: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            feature_flag_key: DEFAULT_FLAG_KEY.to_string(),
            insert_batch_size: DEFAULT_INSERT_BATCH_SIZE,
            exclusive_scans: true,
            running_scan_timeout_minutes: 60,
            lookback_days: 0,
        }
    }
}

impl EngineConfig {
    /// Load from a JSON file. Missing keys fall back to defaults.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.feature_flag_key.trim().is_empty() {
            anyhow::bail!("feature_flag_key must not be empty");
        }
        if !(1..=MAX_INSERT_BATCH_SIZE).contains(&self.insert_batch_size) {
            anyhow::bail!(
                "insert_batch_size must be in 1..={MAX_INSERT_BATCH_SIZE}, got {}",
                self.insert_batch_size
            );
        }
        if !(1..=MAX_RUNNING_SCAN_TIMEOUT_MINUTES).contains(&self.running_scan_timeout_minutes) {
            anyhow::bail!(
                "running_scan_timeout_minutes must be in 1..={MAX_RUNNING_SCAN_TIMEOUT_MINUTES}, got {}",
                self.running_scan_timeout_minutes
            );
        }
        if self.lookback_days > MAX_LOOKBACK_DAYS {
            anyhow::bail!(
                "lookback_days must be at most {MAX_LOOKBACK_DAYS}, got {}",
                self.lookback_days
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let c = EngineConfig::default();
        assert_eq!(c.insert_batch_size, 100);
        assert!(c.exclusive_scans);
        c.validate().unwrap();
    }

    #[test]
    fn partial_json_fills_defaults() {
        let c: EngineConfig = serde_json::from_str(r#"{ "lookback_days": 2 }"#).unwrap();
        assert_eq!(c.lookback_days, 2);
        assert_eq!(c.feature_flag_key, DEFAULT_FLAG_KEY);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let mut c = EngineConfig::default();
        c.insert_batch_size = 0;
        assert!(c.validate().is_err());
        c.insert_batch_size = 100;
        c.lookback_days = 90;
        assert!(c.validate().is_err());
    }

    #[test]
    fn rejects_running_scan_timeouts_outside_one_week() {
        let mut c = EngineConfig::default();
        c.running_scan_timeout_minutes = 0;
        assert!(c.validate().is_err());
        c.running_scan_timeout_minutes = i64::MAX;
        let err = c.validate().unwrap_err();
        assert!(err.to_string().contains("running_scan_timeout_minutes"));
        c.running_scan_timeout_minutes = MAX_RUNNING_SCAN_TIMEOUT_MINUTES;
        c.validate().unwrap();
    }

    #[test]
    fn load_rejects_huge_running_scan_timeout() {
        let path = std::env::temp_dir().join(format!("recon-config-{}.json", std::process::id()));
        std::fs::write(&path, r#"{ "running_scan_timeout_minutes": 9223372036854775807 }"#)
            .unwrap();
        let result = EngineConfig::load(path.to_str().unwrap());
        std::fs::remove_file(&path).unwrap();
        assert!(result.is_err());
    }

    #[test]
    fn load_reports_missing_file() {
        let err = EngineConfig::load("/nonexistent/reconciliation.json").unwrap_err();
        assert!(err.to_string().contains("Cannot read"));
    }
}
