//! Amount parsing and comparison.
//!
//! Both ledgers hand us amounts as text (exchange API strings, ERP columns
//! typed TEXT). Parsing is lenient about formatting and strict about content:
//! anything that is not a finite number yields None and the caller skips
//! the comparison.

/// Decimal places kept when computing a variance.
pub const VARIANCE_SCALE: i32 = 8;

/// Parse a stored amount. Accepts surrounding whitespace, thousands
/// separators and a single leading currency sign.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    let unsigned = trimmed
        .strip_prefix('₹')
        .or_else(|| trimmed.strip_prefix('$'))
        .unwrap_or(trimmed)
        .trim_start();
    if unsigned.is_empty() {
        return None;
    }
    let cleaned: String = unsigned.chars().filter(|c| *c != ',' && *c != '_').collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse an optional column; empty strings count as absent.
pub fn parse_opt(raw: Option<&str>) -> Option<f64> {
    raw.and_then(parse_amount)
}

/// Absolute difference, rounded so float noise never crosses a threshold.
pub fn variance(a: f64, b: f64) -> f64 {
    round_to((a - b).abs(), VARIANCE_SCALE)
}

pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Human formatting used in reasoning text: at least two decimals,
/// at most eight, trailing zeros beyond the second trimmed.
pub fn format_amount(value: f64) -> String {
    let full = format!("{:.8}", round_to(value, VARIANCE_SCALE));
    let (int_part, frac) = match full.split_once('.') {
        Some(parts) => parts,
        None => return format!("{full}.00"),
    };
    let mut frac = frac.trim_end_matches('0').to_string();
    while frac.len() < 2 {
        frac.push('0');
    }
    format!("{int_part}.{frac}")
}
