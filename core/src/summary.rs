//! Scan summary: aggregate counts plus a deterministic narrative.
//!
//! The narrative is plain formatting over the counts. No model is called.

use crate::{
    finding::{Category, Finding},
    store::SeverityCounts,
    types::ScanId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What a successful trigger returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub scan_id: ScanId,
    pub findings_count: i64,
    pub critical_count: i64,
    pub warning_count: i64,
    pub review_count: i64,
    pub info_count: i64,
    pub duration_ms: i64,
    pub ai_summary: String,
    /// Detectors that failed and contributed nothing.
    #[serde(default)]
    pub failed_modules: Vec<String>,
}

pub fn tally(findings: &[Finding]) -> SeverityCounts {
    let mut counts = SeverityCounts::default();
    for f in findings {
        counts.record(f.severity);
    }
    counts
}

/// Category with the most findings; ties go to the earlier category.
fn busiest_category(findings: &[Finding]) -> Option<(Category, usize)> {
    let mut per_category: BTreeMap<Category, usize> = BTreeMap::new();
    for f in findings {
        *per_category.entry(f.category).or_default() += 1;
    }
    per_category
        .into_iter()
        .fold(None, |best, (cat, n)| match best {
            Some((_, m)) if m >= n => best,
            _ => Some((cat, n)),
        })
}

fn plural(n: i64, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

pub fn compose(
    counts: &SeverityCounts,
    findings: &[Finding],
    modules_run: usize,
    failed_modules: &[String],
) -> String {
    let mut text = if counts.total() == 0 {
        format!(
            "No discrepancies found across {}.",
            plural(modules_run as i64, "module")
        )
    } else {
        format!(
            "{} across {}: {} critical, {} warning, {} review, {} info.",
            plural(counts.total(), "finding"),
            plural(modules_run as i64, "module"),
            counts.critical,
            counts.warning,
            counts.review,
            counts.info,
        )
    };

    if counts.critical > 0 {
        text.push_str(&format!(
            " Immediate action needed on {}.",
            plural(counts.critical, "critical issue")
        ));
    }
    if let Some((category, n)) = busiest_category(findings) {
        text.push_str(&format!(" Most findings are in {category} ({n})."));
    }
    if !failed_modules.is_empty() {
        text.push_str(&format!(
            " {} failed and contributed no findings: {}.",
            plural(failed_modules.len() as i64, "module"),
            failed_modules.join(", ")
        ));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::{FindingType, Severity};

    fn finding(t: FindingType, s: Severity) -> Finding {
        Finding::builder("s", t).severity(s).build()
    }

    #[test]
    fn clean_scan_reads_as_clean() {
        let counts = SeverityCounts::default();
        assert_eq!(
            compose(&counts, &[], 14, &[]),
            "No discrepancies found across 14 modules."
        );
    }

    #[test]
    fn counts_and_busiest_category_are_reported() {
        let findings = vec![
            finding(FindingType::MissingPurchase, Severity::Critical),
            finding(FindingType::StalePendingSync, Severity::Review),
            finding(FindingType::FeeMismatch, Severity::Warning),
        ];
        let counts = tally(&findings);
        assert_eq!(counts.total(), 3);
        assert_eq!(
            compose(&counts, &findings, 14, &[]),
            "3 findings across 14 modules: 1 critical, 1 warning, 1 review, 0 info. \
             Immediate action needed on 1 critical issue. Most findings are in orders (2)."
        );
    }

    #[test]
    fn failed_modules_are_named() {
        let counts = SeverityCounts::default();
        let text = compose(&counts, &[], 3, &["balance_drift".to_string()]);
        assert!(text.ends_with("1 module failed and contributed no findings: balance_drift."));
    }

    #[test]
    fn tally_matches_total() {
        let findings: Vec<Finding> = Severity::ALL
            .iter()
            .map(|s| finding(FindingType::OrphanEntry, *s))
            .collect();
        let counts = tally(&findings);
        assert_eq!(counts.total(), 4);
        assert_eq!((counts.critical, counts.warning, counts.review, counts.info), (1, 1, 1, 1));
    }
}
