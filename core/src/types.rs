//! Shared primitive types used across the engine.

/// UTC epoch milliseconds. Every timestamp in both ledgers uses this.
pub type EpochMillis = i64;

/// The canonical scan-run identifier (UUID v4, hyphenated).
pub type ScanId = String;

pub const MILLIS_PER_HOUR: EpochMillis = 60 * 60 * 1000;
