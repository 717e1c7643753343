//! GSTR-2A reconciliation
//!
//! Diffs purchases recorded in the books against the invoices suppliers
//! reported for the same period. A run never writes reconciliation state;
//! discrepancies are recomputed every time and only the run itself is audited.

pub mod engine;

use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

use crate::audit::{AuditRecord, AuditTrail};
use crate::config::GstConfig;
use crate::returns::ReturnPeriod;
use crate::traits::*;
use crate::types::*;
use crate::utils::money::round_money;
use crate::utils::progress::BatchControl;

pub use engine::{diff, DiffOutcome, MatchPolicy};

/// Kind of difference between the books and the supplier's report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyKind {
    MissingInBooks,
    #[serde(rename = "missing_in_gstr2a")]
    MissingInGstr2a,
    AmountMismatch,
    TaxMismatch,
    DateMismatch,
}

impl fmt::Display for DiscrepancyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DiscrepancyKind::MissingInBooks => "missing_in_books",
            DiscrepancyKind::MissingInGstr2a => "missing_in_gstr2a",
            DiscrepancyKind::AmountMismatch => "amount_mismatch",
            DiscrepancyKind::TaxMismatch => "tax_mismatch",
            DiscrepancyKind::DateMismatch => "date_mismatch",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// One difference for one counterpart invoice key.
///
/// Differences are signed as books minus supplier report. `itc_impact` is the
/// change in claimable credit if the supplier's figure is taken as correct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub kind: DiscrepancyKind,
    pub severity: Severity,
    pub invoice_number: String,
    pub gstin: String,
    pub supplier_name: Option<String>,
    /// Taxable value in the books, if the invoice is there
    pub books_value: Option<BigDecimal>,
    /// Taxable value reported by the supplier, if reported
    pub portal_value: Option<BigDecimal>,
    pub amount_difference: BigDecimal,
    pub tax_difference: BigDecimal,
    pub itc_impact: BigDecimal,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub period: ReturnPeriod,
    pub discrepancies: Vec<Discrepancy>,
    /// Invoices present on both sides with nothing to report
    pub matched: usize,
    pub total_invoices_in_books: usize,
    pub total_invoices_in_gstr2a: usize,
    /// True when the run stopped early; `discrepancies` then covers only the
    /// books invoices visited before the stop
    pub cancelled: bool,
    pub generated_at: NaiveDateTime,
}

impl ReconciliationReport {
    pub fn count_of(&self, kind: DiscrepancyKind) -> usize {
        self.discrepancies.iter().filter(|d| d.kind == kind).count()
    }

    pub fn count_by_severity(&self, severity: Severity) -> usize {
        self.discrepancies
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    /// Every invoice on both sides matched cleanly
    pub fn is_clean(&self) -> bool {
        !self.cancelled && self.discrepancies.is_empty()
    }
}

/// Summed effect of a set of discrepancies
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FinancialImpact {
    pub total_impact: BigDecimal,
    pub tax_impact: BigDecimal,
    pub itc_impact: BigDecimal,
}

impl FinancialImpact {
    pub fn rounded(&self, scale: i64) -> FinancialImpact {
        FinancialImpact {
            total_impact: round_money(&self.total_impact, scale),
            tax_impact: round_money(&self.tax_impact, scale),
            itc_impact: round_money(&self.itc_impact, scale),
        }
    }
}

/// Sum the differences, optionally only for one kind
pub fn financial_impact(
    discrepancies: &[Discrepancy],
    kind: Option<DiscrepancyKind>,
) -> FinancialImpact {
    discrepancies
        .iter()
        .filter(|d| kind.is_none_or(|kind| d.kind == kind))
        .fold(FinancialImpact::default(), |mut impact, d| {
            impact.total_impact += &d.amount_difference;
            impact.tax_impact += &d.tax_difference;
            impact.itc_impact += &d.itc_impact;
            impact
        })
}

/// Runs books vs GSTR-2A reconciliation against the store
pub struct ReconciliationEngine<S: GstStore> {
    storage: S,
    audit: AuditTrail<S>,
    policy: MatchPolicy,
}

impl<S: GstStore + Clone> ReconciliationEngine<S> {
    pub fn new(storage: S, config: &GstConfig) -> Self {
        Self {
            audit: AuditTrail::new(storage.clone(), config.actor.clone()),
            storage,
            policy: MatchPolicy {
                tolerance: config.match_tolerance.clone(),
                severity: config.severity.clone(),
            },
        }
    }

    pub fn policy(&self) -> &MatchPolicy {
        &self.policy
    }

    /// Reconcile one period's purchases against supplier-reported invoices
    pub async fn reconcile(
        &mut self,
        period: ReturnPeriod,
        control: &BatchControl,
    ) -> GstResult<ReconciliationReport> {
        let books = self
            .storage
            .purchases_in_period(period.start_date(), period.end_date())
            .await
            .map_err(|e| GstError::persistence("load purchases", e))?;
        let reported = self
            .storage
            .counterparty_invoices(period.start_date(), period.end_date())
            .await
            .map_err(|e| GstError::persistence("load counterparty invoices", e))?;

        let outcome = diff(&books, &reported, &self.policy, control);

        let report = ReconciliationReport {
            period,
            discrepancies: outcome.discrepancies,
            matched: outcome.matched,
            total_invoices_in_books: books.len(),
            total_invoices_in_gstr2a: reported.len(),
            cancelled: outcome.cancelled,
            generated_at: chrono::Utc::now().naive_utc(),
        };

        let impact = financial_impact(&report.discrepancies, None);
        self.audit
            .record_after_commit(
                AuditRecord::new(
                    AuditAction::Reconcile,
                    EntityType::Reconciliation,
                    period.code(),
                    format!(
                        "Reconciled {} books invoices against {} reported: {} discrepancies",
                        report.total_invoices_in_books,
                        report.total_invoices_in_gstr2a,
                        report.discrepancies.len()
                    ),
                )
                .after(&serde_json::json!({
                    "matched": report.matched,
                    "discrepancies": report.discrepancies.len(),
                    "high": report.count_by_severity(Severity::High),
                    "cancelled": report.cancelled,
                    "itc_impact": impact.itc_impact.to_string(),
                })),
            )
            .await;

        info!(
            period = %period,
            books = report.total_invoices_in_books,
            reported = report.total_invoices_in_gstr2a,
            matched = report.matched,
            discrepancies = report.discrepancies.len(),
            cancelled = report.cancelled,
            "reconciliation finished"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SeverityThresholds;
    use crate::utils::progress::CancellationToken;
    use chrono::NaiveDate;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, day).unwrap()
    }

    fn purchase(number: &str, gstin: &str, value: i64, tax: i64) -> Purchase {
        Purchase {
            id: format!("p-{number}"),
            invoice_number: number.to_string(),
            invoice_date: date(5),
            supplier_gstin: Some(gstin.to_string()),
            supplier_name: Some("Fresh Farms".to_string()),
            place_of_supply: "27".to_string(),
            taxable_value: BigDecimal::from(value),
            rate: BigDecimal::from(12),
            tax: TaxComponents::new(
                BigDecimal::from(0),
                BigDecimal::from(tax) / BigDecimal::from(2),
                BigDecimal::from(tax) / BigDecimal::from(2),
            ),
            itc_eligible: true,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }

    fn reported(number: &str, gstin: &str, value: i64, tax: i64) -> CounterpartyInvoice {
        CounterpartyInvoice {
            invoice_number: number.to_string(),
            supplier_gstin: gstin.to_string(),
            supplier_name: Some("Fresh Farms".to_string()),
            invoice_date: date(5),
            taxable_value: BigDecimal::from(value),
            tax_amount: BigDecimal::from(tax),
        }
    }

    fn exact() -> MatchPolicy {
        MatchPolicy {
            tolerance: BigDecimal::from(0),
            severity: SeverityThresholds::default(),
        }
    }

    const SUPPLIER: &str = "27AAAAA0000A1Z5";

    #[test]
    fn test_books_only_invoice() {
        let outcome = diff(
            &[purchase("INV-100", SUPPLIER, 10000, 1200)],
            &[],
            &exact(),
            &BatchControl::new(),
        );

        assert_eq!(outcome.discrepancies.len(), 1);
        let found = &outcome.discrepancies[0];
        assert_eq!(found.kind, DiscrepancyKind::MissingInGstr2a);
        assert_eq!(found.severity, Severity::High);
        assert_eq!(found.itc_impact, BigDecimal::from(-1200));
    }

    #[test]
    fn test_reported_only_invoice() {
        let outcome = diff(
            &[],
            &[reported("INV-100", SUPPLIER, 10000, 1200)],
            &exact(),
            &BatchControl::new(),
        );

        assert_eq!(outcome.discrepancies.len(), 1);
        assert_eq!(outcome.discrepancies[0].kind, DiscrepancyKind::MissingInBooks);
        assert_eq!(outcome.discrepancies[0].itc_impact, BigDecimal::from(1200));
    }

    #[test]
    fn test_identical_invoice_matches() {
        let outcome = diff(
            &[purchase("INV-100", SUPPLIER, 10000, 1200)],
            &[reported("INV-100", SUPPLIER, 10000, 1200)],
            &exact(),
            &BatchControl::new(),
        );

        assert!(outcome.discrepancies.is_empty());
        assert_eq!(outcome.matched, 1);
        assert_eq!(outcome.paired, 1);
    }

    #[test]
    fn test_same_number_different_supplier_does_not_join() {
        let outcome = diff(
            &[purchase("INV-100", SUPPLIER, 10000, 1200)],
            &[reported("INV-100", "29BBBBB1111B1Z5", 10000, 1200)],
            &exact(),
            &BatchControl::new(),
        );

        assert_eq!(outcome.matched, 0);
        assert_eq!(outcome.discrepancies.len(), 2);
    }

    #[test]
    fn test_one_discrepancy_per_differing_dimension() {
        let mut books = purchase("INV-7", SUPPLIER, 10000, 1200);
        books.invoice_date = date(6);

        let outcome = diff(
            &[books],
            &[reported("INV-7", SUPPLIER, 9000, 1080)],
            &exact(),
            &BatchControl::new(),
        );

        let kinds: Vec<_> = outcome.discrepancies.iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![
                DiscrepancyKind::AmountMismatch,
                DiscrepancyKind::TaxMismatch,
                DiscrepancyKind::DateMismatch
            ]
        );

        let amount = &outcome.discrepancies[0];
        assert_eq!(amount.amount_difference, BigDecimal::from(1000));
        // 1000 / 9000 is above the 5% high ratio
        assert_eq!(amount.severity, Severity::High);

        let tax = &outcome.discrepancies[1];
        assert_eq!(tax.tax_difference, BigDecimal::from(120));
        assert_eq!(tax.itc_impact, BigDecimal::from(-120));

        assert_eq!(outcome.discrepancies[2].severity, Severity::Low);
        assert_eq!(outcome.matched, 0);
    }

    #[test]
    fn test_tolerance_hides_small_differences() {
        let policy = MatchPolicy {
            tolerance: BigDecimal::from(1),
            severity: SeverityThresholds::default(),
        };

        let outcome = diff(
            &[purchase("INV-8", SUPPLIER, 10001, 1200)],
            &[reported("INV-8", SUPPLIER, 10000, 1200)],
            &policy,
            &BatchControl::new(),
        );

        assert!(outcome.discrepancies.is_empty());
        assert_eq!(outcome.matched, 1);
    }

    #[test]
    fn test_duplicate_reports_join_once() {
        let outcome = diff(
            &[purchase("INV-9", SUPPLIER, 500, 60)],
            &[
                reported("INV-9", SUPPLIER, 500, 60),
                reported("INV-9", SUPPLIER, 500, 60),
            ],
            &exact(),
            &BatchControl::new(),
        );

        assert_eq!(outcome.matched, 1);
        assert_eq!(outcome.discrepancies.len(), 1);
        assert_eq!(outcome.discrepancies[0].kind, DiscrepancyKind::MissingInBooks);
    }

    #[test]
    fn test_cancelled_run_skips_missing_in_books() {
        let token = CancellationToken::new();
        token.cancel();
        let control = BatchControl::new().with_cancellation(token);

        let outcome = diff(
            &[purchase("INV-1", SUPPLIER, 500, 60)],
            &[reported("INV-2", SUPPLIER, 500, 60)],
            &exact(),
            &control,
        );

        assert!(outcome.cancelled);
        assert!(outcome.discrepancies.is_empty());
    }

    #[test]
    fn test_financial_impact_filters_by_kind() {
        let outcome = diff(
            &[
                purchase("INV-1", SUPPLIER, 1000, 120),
                purchase("INV-2", SUPPLIER, 2000, 240),
            ],
            &[
                reported("INV-2", SUPPLIER, 2000, 200),
                reported("INV-3", SUPPLIER, 3000, 360),
            ],
            &exact(),
            &BatchControl::new(),
        );

        let all = financial_impact(&outcome.discrepancies, None);
        // books-only INV-1: +1000 / +120 / -120
        // tax mismatch INV-2: 0 / +40 / -40
        // reported-only INV-3: -3000 / -360 / +360
        assert_eq!(all.total_impact, BigDecimal::from(-2000));
        assert_eq!(all.tax_impact, BigDecimal::from(-200));
        assert_eq!(all.itc_impact, BigDecimal::from(200));

        let tax_only = financial_impact(&outcome.discrepancies, Some(DiscrepancyKind::TaxMismatch));
        assert_eq!(tax_only.tax_impact, BigDecimal::from(40));
        assert_eq!(tax_only.total_impact, BigDecimal::from(0));
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&DiscrepancyKind::MissingInGstr2a).unwrap();
        assert_eq!(json, "\"missing_in_gstr2a\"");
        assert_eq!(DiscrepancyKind::AmountMismatch.to_string(), "amount_mismatch");
    }
}
