//! Severity / confidence model shared by every detector.
//!
//! Structural checks (duplicates, negative balances, missing required
//! counterparts) score >= 0.85. Fuzzy checks (name similarity,
//! payment-method drift) score <= 0.75.
//!
//! Thresholds are fixed constants. They are not configuration.

use crate::finding::{FindingType, Severity};

/// A materiality rule for value-mismatch detectors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialityRule {
    /// Smallest variance that produces a finding.
    pub threshold: f64,
    /// Variance strictly above this escalates to critical.
    pub critical_above: Option<f64>,
}

pub const AMOUNT_RULE: MaterialityRule = MaterialityRule {
    threshold: 0.50,
    critical_above: Some(100.0),
};

pub const FEE_RULE: MaterialityRule = MaterialityRule {
    threshold: 0.01,
    critical_above: None,
};

/// Workflow rows stuck in an intermediate state longer than this are stale.
pub const STALE_AFTER_HOURS: i64 = 24;

/// Fuzzy client-name key length (characters, after trim + lowercase).
pub const NAME_PREFIX_LEN: usize = 5;

impl MaterialityRule {
    /// None when the variance is immaterial, otherwise the severity it earns.
    pub fn classify(&self, variance: f64) -> Option<Severity> {
        if variance < self.threshold {
            return None;
        }
        match self.critical_above {
            Some(limit) if variance > limit => Some(Severity::Critical),
            _ => Some(Severity::Warning),
        }
    }
}

pub fn base_severity(t: FindingType) -> Severity {
    use FindingType::*;
    match t {
        MissingPurchase | MissingSale | DuplicateEntry | NegativeBalance | MissingDeposit
        | MissingWithdrawal => Severity::Critical,
        AmountMismatch | OrphanEntry | FeeMismatch | FeeNotRecorded | BalanceMismatch
        | MissingConversion | ConversionMismatch | OrphanPaymentMapping => Severity::Warning,
        StalePendingSync | PossibleDuplicateClient | UnmappedPaymentMethod => Severity::Review,
        MissingClient => Severity::Info,
    }
}

pub fn confidence(t: FindingType) -> f64 {
    use FindingType::*;
    match t {
        DuplicateEntry => 0.99,
        NegativeBalance => 0.98,
        MissingPurchase | MissingSale | OrphanEntry => 0.95,
        AmountMismatch | OrphanPaymentMapping => 0.92,
        MissingDeposit | MissingWithdrawal | MissingConversion => 0.90,
        FeeMismatch | ConversionMismatch => 0.88,
        StalePendingSync | FeeNotRecorded | BalanceMismatch | MissingClient => 0.85,
        UnmappedPaymentMethod => 0.70,
        PossibleDuplicateClient => 0.60,
    }
}

pub fn clamp_confidence(c: f64) -> f64 {
    if c.is_nan() {
        0.0
    } else {
        c.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_rule_thresholds() {
        assert_eq!(AMOUNT_RULE.classify(0.30), None);
        assert_eq!(AMOUNT_RULE.classify(0.4999), None);
        assert_eq!(AMOUNT_RULE.classify(0.50), Some(Severity::Warning));
        assert_eq!(AMOUNT_RULE.classify(100.0), Some(Severity::Warning));
        assert_eq!(AMOUNT_RULE.classify(100.01), Some(Severity::Critical));
        assert_eq!(AMOUNT_RULE.classify(150.0), Some(Severity::Critical));
    }

    #[test]
    fn fee_rule_never_escalates() {
        assert_eq!(FEE_RULE.classify(0.009), None);
        assert_eq!(FEE_RULE.classify(0.01), Some(Severity::Warning));
        assert_eq!(FEE_RULE.classify(5000.0), Some(Severity::Warning));
    }

    #[test]
    fn confidences_respect_structural_and_fuzzy_bands() {
        for t in FindingType::ALL {
            let c = confidence(t);
            assert!((0.0..=1.0).contains(&c));
            match t {
                FindingType::PossibleDuplicateClient | FindingType::UnmappedPaymentMethod => {
                    assert!(c <= 0.75, "{t} is fuzzy but scores {c}")
                }
                _ => assert!(c >= 0.85, "{t} is structural but scores {c}"),
            }
        }
    }

    #[test]
    fn clamp_handles_out_of_range_and_nan() {
        assert_eq!(clamp_confidence(-0.2), 0.0);
        assert_eq!(clamp_confidence(1.2), 1.0);
        assert_eq!(clamp_confidence(f64::NAN), 0.0);
        assert_eq!(clamp_confidence(0.42), 0.42);
    }
}
