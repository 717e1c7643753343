//! Books vs GSTR-2A diff

use bigdecimal::BigDecimal;
use std::collections::{HashMap, VecDeque};

use crate::config::SeverityThresholds;
use crate::reconciliation::{Discrepancy, DiscrepancyKind, Severity};
use crate::types::*;
use crate::utils::progress::BatchControl;

/// Join key: invoice number and supplier GSTIN, compared exactly
type InvoiceKey = (String, String);

/// Tolerance and severity policy for one run
#[derive(Debug, Clone, PartialEq)]
pub struct MatchPolicy {
    pub tolerance: BigDecimal,
    pub severity: SeverityThresholds,
}

impl MatchPolicy {
    fn differs(&self, difference: &BigDecimal) -> bool {
        difference.abs() > self.tolerance
    }

    /// Grade `|difference| / invoice_value` against the configured ratios
    pub fn severity(&self, difference: &BigDecimal, invoice_value: &BigDecimal) -> Severity {
        let zero = BigDecimal::from(0);
        if *invoice_value <= zero {
            return Severity::High;
        }

        let ratio = difference.abs() / invoice_value;
        if ratio >= self.severity.high {
            Severity::High
        } else if ratio >= self.severity.medium {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

/// Raw outcome of a diff run
#[derive(Debug, Clone, Default)]
pub struct DiffOutcome {
    pub discrepancies: Vec<Discrepancy>,
    /// Pairs joined by key with every compared field equal
    pub matched: usize,
    /// Pairs joined by key
    pub paired: usize,
    pub cancelled: bool,
}

fn books_key(purchase: &Purchase) -> InvoiceKey {
    (
        purchase.invoice_number.clone(),
        purchase.supplier_gstin.clone().unwrap_or_default(),
    )
}

fn portal_key(invoice: &CounterpartyInvoice) -> InvoiceKey {
    (invoice.invoice_number.clone(), invoice.supplier_gstin.clone())
}

/// Diff the books against supplier-reported invoices.
///
/// Each counterpart invoice is used at most once. When cancelled, the
/// `missing_in_books` pass is skipped since unvisited books invoices would
/// otherwise surface as false positives.
pub fn diff(
    books: &[Purchase],
    portal: &[CounterpartyInvoice],
    policy: &MatchPolicy,
    control: &BatchControl,
) -> DiffOutcome {
    let mut outcome = DiffOutcome::default();
    let mut unmatched: HashMap<InvoiceKey, VecDeque<usize>> = HashMap::new();
    for (index, invoice) in portal.iter().enumerate() {
        unmatched.entry(portal_key(invoice)).or_default().push_back(index);
    }
    let mut used = vec![false; portal.len()];

    let total = books.len();
    for (index, purchase) in books.iter().enumerate() {
        if control.is_cancelled() {
            outcome.cancelled = true;
            return outcome;
        }

        let counterpart = unmatched
            .get_mut(&books_key(purchase))
            .and_then(VecDeque::pop_front);

        match counterpart {
            None => outcome.discrepancies.push(missing_in_gstr2a(purchase)),
            Some(portal_index) => {
                used[portal_index] = true;
                outcome.paired += 1;
                let found = compare(purchase, &portal[portal_index], policy);
                if found.is_empty() {
                    outcome.matched += 1;
                }
                outcome.discrepancies.extend(found);
            }
        }

        control.report("reconcile", index + 1, total, Some(&purchase.invoice_number));
    }

    outcome.discrepancies.extend(
        portal
            .iter()
            .zip(&used)
            .filter(|(_, used)| !**used)
            .map(|(invoice, _)| missing_in_books(invoice)),
    );

    outcome
}

fn missing_in_gstr2a(purchase: &Purchase) -> Discrepancy {
    let tax = purchase.gst_amount();
    let itc_impact = if purchase.itc_eligible {
        -tax.clone()
    } else {
        BigDecimal::from(0)
    };

    Discrepancy {
        kind: DiscrepancyKind::MissingInGstr2a,
        severity: Severity::High,
        invoice_number: purchase.invoice_number.clone(),
        gstin: purchase.supplier_gstin.clone().unwrap_or_default(),
        supplier_name: purchase.supplier_name.clone(),
        books_value: Some(purchase.taxable_value.clone()),
        portal_value: None,
        amount_difference: purchase.taxable_value.clone(),
        tax_difference: tax,
        itc_impact,
        description: format!(
            "Invoice {} is in the books but not reported by the supplier",
            purchase.invoice_number
        ),
    }
}

fn missing_in_books(invoice: &CounterpartyInvoice) -> Discrepancy {
    Discrepancy {
        kind: DiscrepancyKind::MissingInBooks,
        severity: Severity::High,
        invoice_number: invoice.invoice_number.clone(),
        gstin: invoice.supplier_gstin.clone(),
        supplier_name: invoice.supplier_name.clone(),
        books_value: None,
        portal_value: Some(invoice.taxable_value.clone()),
        amount_difference: -invoice.taxable_value.clone(),
        tax_difference: -invoice.tax_amount.clone(),
        itc_impact: invoice.tax_amount.clone(),
        description: format!(
            "Invoice {} reported by the supplier is missing from the books",
            invoice.invoice_number
        ),
    }
}

fn compare(
    purchase: &Purchase,
    invoice: &CounterpartyInvoice,
    policy: &MatchPolicy,
) -> Vec<Discrepancy> {
    let zero = BigDecimal::from(0);
    let mut found = Vec::new();
    let base = |kind, severity, amount_difference, tax_difference, itc_impact, description| {
        Discrepancy {
            kind,
            severity,
            invoice_number: purchase.invoice_number.clone(),
            gstin: invoice.supplier_gstin.clone(),
            supplier_name: invoice
                .supplier_name
                .clone()
                .or_else(|| purchase.supplier_name.clone()),
            books_value: Some(purchase.taxable_value.clone()),
            portal_value: Some(invoice.taxable_value.clone()),
            amount_difference,
            tax_difference,
            itc_impact,
            description,
        }
    };

    let amount_difference = &purchase.taxable_value - &invoice.taxable_value;
    if policy.differs(&amount_difference) {
        found.push(base(
            DiscrepancyKind::AmountMismatch,
            policy.severity(&amount_difference, &invoice.taxable_value),
            amount_difference.clone(),
            zero.clone(),
            zero.clone(),
            format!(
                "Taxable value {} in books vs {} reported",
                purchase.taxable_value, invoice.taxable_value
            ),
        ));
    }

    let books_tax = purchase.gst_amount();
    let tax_difference = &books_tax - &invoice.tax_amount;
    if policy.differs(&tax_difference) {
        let itc_impact = if purchase.itc_eligible {
            -tax_difference.clone()
        } else {
            zero.clone()
        };
        found.push(base(
            DiscrepancyKind::TaxMismatch,
            policy.severity(&tax_difference, &invoice.taxable_value),
            zero.clone(),
            tax_difference,
            itc_impact,
            format!(
                "Tax {books_tax} in books vs {} reported",
                invoice.tax_amount
            ),
        ));
    }

    if purchase.invoice_date != invoice.invoice_date {
        found.push(base(
            DiscrepancyKind::DateMismatch,
            Severity::Low,
            zero.clone(),
            zero.clone(),
            zero,
            format!(
                "Invoice dated {} in books vs {} reported",
                purchase.invoice_date, invoice.invoice_date
            ),
        ));
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn policy() -> MatchPolicy {
        MatchPolicy {
            tolerance: BigDecimal::from(0),
            severity: SeverityThresholds::default(),
        }
    }

    #[test]
    fn test_severity_ratio_bands() {
        let policy = policy();
        let value = BigDecimal::from(10000);

        assert_eq!(policy.severity(&BigDecimal::from(50), &value), Severity::Low);
        assert_eq!(policy.severity(&BigDecimal::from(100), &value), Severity::Medium);
        assert_eq!(policy.severity(&BigDecimal::from(-499), &value), Severity::Medium);
        assert_eq!(policy.severity(&BigDecimal::from(500), &value), Severity::High);
        assert_eq!(
            policy.severity(&BigDecimal::from(1), &BigDecimal::from(0)),
            Severity::High
        );
    }

    #[test]
    fn test_tolerance_absorbs_rounding() {
        let policy = MatchPolicy {
            tolerance: BigDecimal::from_str("0.50").unwrap(),
            severity: SeverityThresholds::default(),
        };

        assert!(!policy.differs(&BigDecimal::from_str("0.49").unwrap()));
        assert!(!policy.differs(&BigDecimal::from_str("-0.50").unwrap()));
        assert!(policy.differs(&BigDecimal::from_str("0.51").unwrap()));
    }
}
