//! Reasoning text: deterministic template substitution.
//!
//! Each finding type owns one template. Placeholders are filled from the
//! finding's own fields; absent values render as "n/a". No inference.

use crate::{
    amount::format_amount,
    finding::{Finding, FindingType},
};

const MISSING: &str = "n/a";

pub fn template(t: FindingType) -> &'static str {
    match t {
        FindingType::MissingPurchase => {
            "Exchange BUY order {terminal_ref} completed for {terminal_amount} ({asset}) \
             but no purchase sync entry references it."
        }
        FindingType::MissingSale => {
            "Exchange SELL order {terminal_ref} completed for {terminal_amount} ({asset}) \
             but no sale sync entry references it."
        }
        FindingType::DuplicateEntry => {
            "Order {terminal_ref} is referenced by more than one ERP sync row ({erp_ref}). \
             Only one entry should exist per exchange order."
        }
        FindingType::StalePendingSync => {
            "ERP sync row {erp_ref} for order {terminal_ref} has been waiting in an \
             intermediate workflow state for more than 24 hours."
        }
        FindingType::AmountMismatch => {
            "Order {terminal_ref} settled for {terminal_amount} on the exchange but ERP row \
             {erp_ref} records {erp_amount}; variance {variance} ({severity})."
        }
        FindingType::OrphanEntry => {
            "ERP sync row {erp_ref} for order {terminal_ref} points to a ledger entry that \
             does not exist."
        }
        FindingType::FeeMismatch => {
            "Exchange commission on order {terminal_ref} is {terminal_amount} but ERP row \
             {erp_ref} records a fee of {erp_amount}; variance {variance}."
        }
        FindingType::FeeNotRecorded => {
            "Exchange charged {terminal_amount} commission on order {terminal_ref} but ERP \
             row {erp_ref} records no fee."
        }
        FindingType::NegativeBalance => {
            "Wallet {erp_ref} holds a negative {asset} balance of {erp_amount}."
        }
        FindingType::BalanceMismatch => {
            "Exchange reports {terminal_amount} {asset} while ERP wallets sum to \
             {erp_amount}; variance {variance} ({severity})."
        }
        FindingType::MissingDeposit => {
            "Deposit {terminal_ref} of {terminal_amount} {asset} completed on the exchange \
             with no matching ERP wallet movement."
        }
        FindingType::MissingWithdrawal => {
            "Withdrawal {terminal_ref} of {terminal_amount} {asset} completed on the \
             exchange with no matching ERP wallet movement."
        }
        FindingType::MissingConversion => {
            "Spot conversion {terminal_ref} into {terminal_amount} {asset} has no ERP \
             conversion record."
        }
        FindingType::ConversionMismatch => {
            "Conversion {terminal_ref} produced {terminal_amount} {asset} but ERP row \
             {erp_ref} records {erp_amount}; variance {variance} ({severity})."
        }
        FindingType::MissingClient => {
            "Counterparty {terminal_ref} traded with the desk but has no ERP client record."
        }
        FindingType::PossibleDuplicateClient => {
            "Client records {erp_ref} have near-identical names and may be the same \
             counterparty. Review before merging."
        }
        FindingType::UnmappedPaymentMethod => {
            "Exchange payment method {terminal_ref} appears on completed orders but is not \
             mapped to any ERP payment method."
        }
        FindingType::OrphanPaymentMapping => {
            "Payment label {terminal_ref} maps to ERP payment method {erp_ref}, which is \
             missing or inactive."
        }
    }
}

/// Fill `{name}` tokens in one pass so values are emitted verbatim, even
/// when they themselves contain braces. Unknown tokens are kept as written.
pub fn render(f: &Finding) -> String {
    let amount = |v: Option<f64>| v.map(format_amount).unwrap_or_else(|| MISSING.to_string());
    let text = |v: &Option<String>| v.clone().unwrap_or_else(|| MISSING.to_string());

    let mut out = String::new();
    let mut rest = template(f.finding_type);
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            rest = &rest[open..];
            break;
        };
        let value = match &after[..close] {
            "terminal_ref" => text(&f.terminal_ref),
            "erp_ref" => text(&f.erp_ref),
            "asset" => text(&f.asset),
            "terminal_amount" => amount(f.terminal_amount),
            "erp_amount" => amount(f.erp_amount),
            "variance" => amount(f.variance),
            "severity" => f.severity.as_str().to_string(),
            _ => rest[open..open + close + 2].to_string(),
        };
        out.push_str(&value);
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::Severity;

    #[test]
    fn renders_fields_into_template() {
        let f = Finding::builder("s", FindingType::AmountMismatch)
            .terminal_ref("ORD-9")
            .erp_ref("purchase_sync#4")
            .compared(1000.0, 1150.0)
            .severity(Severity::Critical)
            .build();
        assert_eq!(
            f.reasoning,
            "Order ORD-9 settled for 1000.00 on the exchange but ERP row purchase_sync#4 \
             records 1150.00; variance 150.00 (critical)."
        );
    }

    #[test]
    fn absent_fields_render_as_na() {
        let f = Finding::builder("s", FindingType::MissingPurchase).build();
        assert!(f.reasoning.contains("order n/a completed for n/a (n/a)"));
    }

    #[test]
    fn no_placeholder_survives_rendering() {
        for t in FindingType::ALL {
            let f = Finding::builder("s", t)
                .terminal_ref("T")
                .erp_ref("E")
                .asset("USDT")
                .compared(1.0, 2.0)
                .build();
            assert!(!f.reasoning.contains('{'), "{t}: {}", f.reasoning);
        }
    }

    #[test]
    fn braces_in_field_values_are_not_substituted_again() {
        let f = Finding::builder("s", FindingType::MissingClient)
            .terminal_ref("{erp_ref}{asset}")
            .build();
        assert_eq!(
            f.reasoning,
            "Counterparty {erp_ref}{asset} traded with the desk but has no ERP client record."
        );

        let f = Finding::builder("s", FindingType::AmountMismatch)
            .terminal_ref("ORD-{variance}")
            .erp_ref("purchase_sync#{severity}")
            .compared(10.0, 12.0)
            .build();
        assert!(f.reasoning.starts_with("Order ORD-{variance} settled for 10.00"));
        assert!(f.reasoning.contains("ERP row purchase_sync#{severity} records 12.00"));
    }
}
