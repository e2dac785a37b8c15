//! Scan window: the single day boundary every detector agrees on.
//!
//! The desk books its day in India Standard Time (UTC+05:30) no matter
//! where the engine runs. A scan covers [start of desk-today, trigger instant],
//! optionally widened by whole days of lookback.

use crate::{
    error::{ReconError, ReconResult},
    types::EpochMillis,
};
use chrono::{DateTime, Days, FixedOffset, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Desk timezone offset east of UTC, in seconds.
pub const DESK_UTC_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanWindow {
    /// Inclusive lower bound (desk midnight, as UTC epoch ms).
    pub start: EpochMillis,
    /// Inclusive upper bound (the trigger instant).
    pub end: EpochMillis,
}

impl ScanWindow {
    pub fn for_instant(now: DateTime<Utc>, lookback_days: u32) -> ReconResult<Self> {
        let offset = desk_offset()?;
        let desk_date = now.with_timezone(&offset).date_naive();
        let start_date = desk_date
            .checked_sub_days(Days::new(u64::from(lookback_days)))
            .ok_or_else(|| ReconError::Window(format!("lookback of {lookback_days} days underflows")))?;
        let midnight = start_date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| ReconError::Window(format!("no midnight on {start_date}")))?;
        let start = offset
            .from_local_datetime(&midnight)
            .single()
            .ok_or_else(|| ReconError::Window(format!("ambiguous desk midnight on {start_date}")))?;

        Ok(Self {
            start: start.with_timezone(&Utc).timestamp_millis(),
            end: now.timestamp_millis(),
        })
    }

    pub fn contains(&self, ts: EpochMillis) -> bool {
        ts >= self.start && ts <= self.end
    }
}

fn desk_offset() -> ReconResult<FixedOffset> {
    FixedOffset::east_opt(DESK_UTC_OFFSET_SECS)
        .ok_or_else(|| ReconError::Window(format!("invalid desk offset {DESK_UTC_OFFSET_SECS}s")))
}
