//! Derived filing states and period-level compliance checks

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::GstConfig;
use crate::returns::{Gstr1Payload, Gstr3bPayload, ReturnPeriod};
use crate::types::*;

/// Largest GSTR-1 vs GSTR-3B tax gap attributable to per-line rounding
const ROUNDING_ALLOWANCE: i32 = 1;

/// Filing state as shown to a user; `Late` and `Overdue` are never stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DisplayStatus {
    Draft,
    Generated,
    Filed,
    /// Filed after the due date
    Late,
    /// Not filed and the due date has passed
    Overdue,
}

/// The filing that represents a period: a filed record if there is one, else the newest
pub fn current_filing(filings: &[ReturnFiling]) -> Option<&ReturnFiling> {
    filings
        .iter()
        .filter(|filing| filing.status == FilingStatus::Filed)
        .min_by_key(|filing| filing.filed_at)
        .or_else(|| filings.iter().max_by_key(|filing| filing.created_at))
}

pub fn display_status(
    filing: Option<&ReturnFiling>,
    return_type: ReturnType,
    period: ReturnPeriod,
    today: NaiveDate,
    config: &GstConfig,
) -> DisplayStatus {
    let due = period.due_date(return_type, config);

    match filing {
        Some(filing) if filing.status == FilingStatus::Filed => match filing.filed_at {
            Some(filed_at) if filed_at.date() > due => DisplayStatus::Late,
            _ => DisplayStatus::Filed,
        },
        _ if today > due => DisplayStatus::Overdue,
        Some(filing) if filing.status == FilingStatus::Generated => DisplayStatus::Generated,
        _ => DisplayStatus::Draft,
    }
}

/// Compliance position for the most recent closed period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceStatus {
    pub period: ReturnPeriod,
    pub gstr1: DisplayStatus,
    pub gstr3b: DisplayStatus,
    pub gstr1_filed: bool,
    pub gstr3b_filed: bool,
    /// Earliest statutory due date on or after today
    pub next_due_date: NaiveDate,
    pub penalties: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Assess last period's filings as of `today`
pub fn assess(
    today: NaiveDate,
    period: ReturnPeriod,
    gstr1_filings: &[ReturnFiling],
    gstr3b_filings: &[ReturnFiling],
    config: &GstConfig,
) -> ComplianceStatus {
    let mut penalties = Vec::new();
    let mut recommendations = Vec::new();
    let mut statuses = Vec::with_capacity(2);

    for (return_type, filings) in [
        (ReturnType::Gstr1, gstr1_filings),
        (ReturnType::Gstr3b, gstr3b_filings),
    ] {
        let status = display_status(current_filing(filings), return_type, period, today, config);
        let due = period.due_date(return_type, config);

        match status {
            DisplayStatus::Late => penalties.push(format!(
                "{return_type} for {period} was filed after the due date {due}"
            )),
            DisplayStatus::Overdue => {
                penalties.push(format!("{return_type} for {period} is overdue since {due}"));
                recommendations.push(format!("File {return_type} for {period}"));
            }
            DisplayStatus::Draft | DisplayStatus::Generated => {
                recommendations.push(format!("File {return_type} for {period} by {due}"));
            }
            DisplayStatus::Filed => {}
        }
        statuses.push(status);
    }

    let current = period.next();
    let next_due_date = [
        period.due_date(ReturnType::Gstr1, config),
        period.due_date(ReturnType::Gstr3b, config),
        current.due_date(ReturnType::Gstr1, config),
        current.due_date(ReturnType::Gstr3b, config),
    ]
    .into_iter()
    .filter(|due| *due >= today)
    .min()
    .unwrap_or_else(|| current.next().due_date(ReturnType::Gstr1, config));

    let is_filed = |status: DisplayStatus| matches!(status, DisplayStatus::Filed | DisplayStatus::Late);

    ComplianceStatus {
        period,
        gstr1: statuses[0],
        gstr3b: statuses[1],
        gstr1_filed: is_filed(statuses[0]),
        gstr3b_filed: is_filed(statuses[1]),
        next_due_date,
        penalties,
        recommendations,
    }
}

/// Headline totals of a period's two returns, cross-checked against each other
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnSummary {
    pub period: ReturnPeriod,
    /// B2B and B2CL invoices plus B2CS rows
    pub outward_supplies: usize,
    pub total_tax_collected: BigDecimal,
    pub total_itc_availed: BigDecimal,
    pub net_tax_liability: BigDecimal,
    /// Tax reported line by line in GSTR-1
    pub gstr1_tax: BigDecimal,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
}

pub fn summarize(
    gstr1: &Gstr1Payload,
    gstr3b: &Gstr3bPayload,
    tolerance: &BigDecimal,
) -> ReturnSummary {
    let zero = BigDecimal::from(0);
    let total_tax_collected = gstr3b.outward_supplies.tax.total();
    let total_itc_availed = gstr3b.itc_availed.total();
    let net_tax_liability = gstr3b.net_liability();
    let gstr1_tax = gstr1_tax_total(gstr1);

    let mut issues = Vec::new();
    let mut recommendations = Vec::new();

    if total_tax_collected == zero {
        issues.push("No tax collected in the period".to_string());
    }

    let allowance = tolerance.max(&BigDecimal::from(ROUNDING_ALLOWANCE)).clone();
    let gap = (&gstr1_tax - &total_tax_collected).abs();
    if gap > allowance {
        issues.push(format!(
            "GSTR-1 reports {gstr1_tax} tax but GSTR-3B declares {total_tax_collected}"
        ));
        recommendations
            .push("Review invoice-level tax in GSTR-1 against the GSTR-3B summary".to_string());
    }

    if total_itc_availed > total_tax_collected {
        recommendations.push(
            "Input tax credit exceeds output tax; the excess carries forward".to_string(),
        );
    }
    if net_tax_liability > zero {
        recommendations.push(format!(
            "Pay net liability of {net_tax_liability} before filing GSTR-3B"
        ));
    }

    ReturnSummary {
        period: gstr3b.period,
        outward_supplies: gstr1.outward_supply_count(),
        total_tax_collected,
        total_itc_availed,
        net_tax_liability,
        gstr1_tax,
        issues,
        recommendations,
    }
}

fn gstr1_tax_total(payload: &Gstr1Payload) -> BigDecimal {
    let invoices = payload
        .b2b
        .iter()
        .flat_map(|entry| entry.invoices.iter())
        .chain(payload.b2cl.iter().flat_map(|entry| entry.invoices.iter()));

    let invoice_tax: BigDecimal = invoices
        .flat_map(|invoice| invoice.items.iter())
        .map(|item| &item.igst + &item.cgst + &item.sgst)
        .sum();
    let small_tax: BigDecimal = payload
        .b2cs
        .iter()
        .map(|row| &row.igst + &row.cgst + &row.sgst)
        .sum();

    invoice_tax + small_tax
}
