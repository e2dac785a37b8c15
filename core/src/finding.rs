//! Findings: one detected discrepancy between the terminal and ERP ledgers.
//!
//! Every closed vocabulary a finding carries (type, severity, category,
//! suggested action) is an enum here. Each finding type belongs to exactly
//! one category and has one default remediation hint.

use crate::{amount, classify, reasoning, types::ScanId};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Ordered urgency. `Critical` compares greatest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Review,
    Warning,
    Critical,
}

impl Severity {
    /// Most urgent first.
    pub const ALL: [Severity; 4] = [
        Severity::Critical,
        Severity::Warning,
        Severity::Review,
        Severity::Info,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Warning => "warning",
            Self::Review => "review",
            Self::Info => "info",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Orders,
    Financial,
    Fees,
    Balances,
    Movements,
    Conversions,
    Clients,
    Payments,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Orders,
        Category::Financial,
        Category::Fees,
        Category::Balances,
        Category::Movements,
        Category::Conversions,
        Category::Clients,
        Category::Payments,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Orders => "orders",
            Self::Financial => "financial",
            Self::Fees => "fees",
            Self::Balances => "balances",
            Self::Movements => "movements",
            Self::Conversions => "conversions",
            Self::Clients => "clients",
            Self::Payments => "payments",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingType {
    MissingPurchase,
    MissingSale,
    DuplicateEntry,
    StalePendingSync,
    AmountMismatch,
    OrphanEntry,
    FeeMismatch,
    FeeNotRecorded,
    NegativeBalance,
    BalanceMismatch,
    MissingDeposit,
    MissingWithdrawal,
    MissingConversion,
    ConversionMismatch,
    MissingClient,
    PossibleDuplicateClient,
    UnmappedPaymentMethod,
    OrphanPaymentMapping,
}

impl FindingType {
    pub const ALL: [FindingType; 18] = [
        FindingType::MissingPurchase,
        FindingType::MissingSale,
        FindingType::DuplicateEntry,
        FindingType::StalePendingSync,
        FindingType::AmountMismatch,
        FindingType::OrphanEntry,
        FindingType::FeeMismatch,
        FindingType::FeeNotRecorded,
        FindingType::NegativeBalance,
        FindingType::BalanceMismatch,
        FindingType::MissingDeposit,
        FindingType::MissingWithdrawal,
        FindingType::MissingConversion,
        FindingType::ConversionMismatch,
        FindingType::MissingClient,
        FindingType::PossibleDuplicateClient,
        FindingType::UnmappedPaymentMethod,
        FindingType::OrphanPaymentMapping,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingPurchase => "missing_purchase",
            Self::MissingSale => "missing_sale",
            Self::DuplicateEntry => "duplicate_entry",
            Self::StalePendingSync => "stale_pending_sync",
            Self::AmountMismatch => "amount_mismatch",
            Self::OrphanEntry => "orphan_entry",
            Self::FeeMismatch => "fee_mismatch",
            Self::FeeNotRecorded => "fee_not_recorded",
            Self::NegativeBalance => "negative_balance",
            Self::BalanceMismatch => "balance_mismatch",
            Self::MissingDeposit => "missing_deposit",
            Self::MissingWithdrawal => "missing_withdrawal",
            Self::MissingConversion => "missing_conversion",
            Self::ConversionMismatch => "conversion_mismatch",
            Self::MissingClient => "missing_client",
            Self::PossibleDuplicateClient => "possible_duplicate_client",
            Self::UnmappedPaymentMethod => "unmapped_payment_method",
            Self::OrphanPaymentMapping => "orphan_payment_mapping",
        }
    }

    pub fn category(&self) -> Category {
        match self {
            Self::MissingPurchase
            | Self::MissingSale
            | Self::DuplicateEntry
            | Self::StalePendingSync => Category::Orders,
            Self::AmountMismatch | Self::OrphanEntry => Category::Financial,
            Self::FeeMismatch | Self::FeeNotRecorded => Category::Fees,
            Self::NegativeBalance | Self::BalanceMismatch => Category::Balances,
            Self::MissingDeposit | Self::MissingWithdrawal => Category::Movements,
            Self::MissingConversion | Self::ConversionMismatch => Category::Conversions,
            Self::MissingClient | Self::PossibleDuplicateClient => Category::Clients,
            Self::UnmappedPaymentMethod | Self::OrphanPaymentMapping => Category::Payments,
        }
    }

    pub fn default_action(&self) -> SuggestedAction {
        match self {
            Self::MissingPurchase => SuggestedAction::CreatePurchaseEntry,
            Self::MissingSale => SuggestedAction::CreateSaleEntry,
            Self::DuplicateEntry => SuggestedAction::RemoveDuplicate,
            Self::StalePendingSync => SuggestedAction::FollowUpWorkflow,
            Self::AmountMismatch => SuggestedAction::ReviewAmount,
            Self::OrphanEntry | Self::OrphanPaymentMapping => SuggestedAction::FixReference,
            Self::FeeMismatch => SuggestedAction::ReviewFee,
            Self::FeeNotRecorded => SuggestedAction::RecordFee,
            Self::NegativeBalance => SuggestedAction::InvestigateBalance,
            Self::BalanceMismatch => SuggestedAction::AdjustBalance,
            Self::MissingDeposit | Self::MissingWithdrawal => SuggestedAction::CreateWalletMovement,
            Self::MissingConversion => SuggestedAction::CreateConversionEntry,
            Self::ConversionMismatch => SuggestedAction::ReviewConversion,
            Self::MissingClient => SuggestedAction::CreateClient,
            Self::PossibleDuplicateClient => SuggestedAction::MergeClients,
            Self::UnmappedPaymentMethod => SuggestedAction::MapPaymentMethod,
        }
    }
}

/// Remediation hint handed to the external workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    CreatePurchaseEntry,
    CreateSaleEntry,
    RemoveDuplicate,
    FollowUpWorkflow,
    ReviewAmount,
    FixReference,
    ReviewFee,
    RecordFee,
    InvestigateBalance,
    AdjustBalance,
    CreateWalletMovement,
    CreateConversionEntry,
    ReviewConversion,
    CreateClient,
    MergeClients,
    MapPaymentMethod,
}

impl SuggestedAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreatePurchaseEntry => "create_purchase_entry",
            Self::CreateSaleEntry => "create_sale_entry",
            Self::RemoveDuplicate => "remove_duplicate",
            Self::FollowUpWorkflow => "follow_up_workflow",
            Self::ReviewAmount => "review_amount",
            Self::FixReference => "fix_reference",
            Self::ReviewFee => "review_fee",
            Self::RecordFee => "record_fee",
            Self::InvestigateBalance => "investigate_balance",
            Self::AdjustBalance => "adjust_balance",
            Self::CreateWalletMovement => "create_wallet_movement",
            Self::CreateConversionEntry => "create_conversion_entry",
            Self::ReviewConversion => "review_conversion",
            Self::CreateClient => "create_client",
            Self::MergeClients => "merge_clients",
            Self::MapPaymentMethod => "map_payment_method",
        }
    }

    const ALL: [SuggestedAction; 16] = [
        Self::CreatePurchaseEntry,
        Self::CreateSaleEntry,
        Self::RemoveDuplicate,
        Self::FollowUpWorkflow,
        Self::ReviewAmount,
        Self::FixReference,
        Self::ReviewFee,
        Self::RecordFee,
        Self::InvestigateBalance,
        Self::AdjustBalance,
        Self::CreateWalletMovement,
        Self::CreateConversionEntry,
        Self::ReviewConversion,
        Self::CreateClient,
        Self::MergeClients,
        Self::MapPaymentMethod,
    ];
}

/// Error for a stored vocabulary value this build does not know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} '{}'", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

fn lookup<T: Copy>(
    kind: &'static str,
    all: &[T],
    name: impl Fn(&T) -> &'static str,
    s: &str,
) -> Result<T, UnknownVariant> {
    all.iter()
        .copied()
        .find(|v| name(v) == s)
        .ok_or_else(|| UnknownVariant { kind, value: s.to_string() })
}

impl FromStr for Severity {
    type Err = UnknownVariant;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        lookup("severity", &Self::ALL, Self::as_str, s)
    }
}

impl FromStr for Category {
    type Err = UnknownVariant;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        lookup("category", &Self::ALL, Self::as_str, s)
    }
}

impl FromStr for FindingType {
    type Err = UnknownVariant;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        lookup("finding type", &Self::ALL, Self::as_str, s)
    }
}

impl FromStr for SuggestedAction {
    type Err = UnknownVariant;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        lookup("suggested action", &Self::ALL, Self::as_str, s)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for FindingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub scan_id: ScanId,
    pub finding_type: FindingType,
    pub severity: Severity,
    pub category: Category,
    pub asset: Option<String>,
    pub terminal_ref: Option<String>,
    pub erp_ref: Option<String>,
    pub terminal_amount: Option<f64>,
    pub erp_amount: Option<f64>,
    pub variance: Option<f64>,
    pub suggested_action: SuggestedAction,
    pub confidence: f64,
    pub reasoning: String,
    pub details: serde_json::Value,
}

impl Finding {
    /// Start a finding with the type's default severity, confidence and
    /// action. Detectors refine it and call `build()`.
    pub fn builder(scan_id: &str, finding_type: FindingType) -> FindingBuilder {
        FindingBuilder {
            finding: Finding {
                scan_id: scan_id.to_string(),
                finding_type,
                severity: classify::base_severity(finding_type),
                category: finding_type.category(),
                asset: None,
                terminal_ref: None,
                erp_ref: None,
                terminal_amount: None,
                erp_amount: None,
                variance: None,
                suggested_action: finding_type.default_action(),
                confidence: classify::confidence(finding_type),
                reasoning: String::new(),
                details: serde_json::Value::Object(serde_json::Map::new()),
            },
        }
    }
}

#[must_use]
pub struct FindingBuilder {
    finding: Finding,
}

impl FindingBuilder {
    pub fn severity(mut self, severity: Severity) -> Self {
        self.finding.severity = severity;
        self
    }

    pub fn asset(mut self, asset: impl Into<String>) -> Self {
        self.finding.asset = Some(asset.into());
        self
    }

    pub fn terminal_ref(mut self, r: impl Into<String>) -> Self {
        self.finding.terminal_ref = Some(r.into());
        self
    }

    pub fn erp_ref(mut self, r: impl Into<String>) -> Self {
        self.finding.erp_ref = Some(r.into());
        self
    }

    pub fn terminal_amount(mut self, amount: f64) -> Self {
        self.finding.terminal_amount = Some(amount);
        self
    }

    pub fn erp_amount(mut self, amount: f64) -> Self {
        self.finding.erp_amount = Some(amount);
        self
    }

    /// Set both sides of a comparison; variance is derived, never supplied.
    pub fn compared(mut self, terminal: f64, erp: f64) -> Self {
        self.finding.terminal_amount = Some(terminal);
        self.finding.erp_amount = Some(erp);
        self.finding.variance = Some(amount::variance(terminal, erp));
        self
    }

    pub fn confidence(mut self, confidence: f64) -> Self {
        self.finding.confidence = confidence;
        self
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.finding.details = details;
        self
    }

    /// Clamp confidence, render reasoning from the finding's own fields.
    pub fn build(mut self) -> Finding {
        self.finding.confidence = classify::clamp_confidence(self.finding.confidence);
        self.finding.reasoning = reasoning::render(&self.finding);
        self.finding
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_orders_critical_highest() {
        assert!(Severity::Critical > Severity::Warning);
        assert!(Severity::Warning > Severity::Review);
        assert!(Severity::Review > Severity::Info);
    }

    #[test]
    fn vocabularies_round_trip_through_their_names() {
        for t in FindingType::ALL {
            assert_eq!(t.as_str().parse::<FindingType>().unwrap(), t);
        }
        for c in Category::ALL {
            assert_eq!(c.as_str().parse::<Category>().unwrap(), c);
        }
        for s in Severity::ALL {
            assert_eq!(s.as_str().parse::<Severity>().unwrap(), s);
        }
        assert!("bogus".parse::<Severity>().is_err());
    }

    #[test]
    fn serde_names_match_column_names() {
        let json = serde_json::to_string(&FindingType::PossibleDuplicateClient).unwrap();
        assert_eq!(json, "\"possible_duplicate_client\"");
        let json = serde_json::to_string(&SuggestedAction::CreateWalletMovement).unwrap();
        assert_eq!(json, "\"create_wallet_movement\"");
    }

    #[test]
    fn every_category_owns_at_least_one_type() {
        for c in Category::ALL {
            assert!(FindingType::ALL.iter().any(|t| t.category() == c), "{c} has no types");
        }
    }

    #[test]
    fn builder_derives_variance_and_clamps_confidence() {
        let f = Finding::builder("scan-1", FindingType::AmountMismatch)
            .terminal_ref("123")
            .compared(1000.0, 1150.0)
            .confidence(1.7)
            .build();
        assert_eq!(f.category, Category::Financial);
        assert_eq!(f.variance, Some(150.0));
        assert_eq!(f.confidence, 1.0);
        assert!(!f.reasoning.is_empty());
    }
}
