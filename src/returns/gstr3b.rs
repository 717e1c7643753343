//! GSTR-3B: monthly summary return

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use crate::returns::ReturnPeriod;
use crate::tax::gst::itc_components;
use crate::types::*;
use crate::utils::money::round_money;

/// Taxable value and tax heads of a group of supplies
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SupplySummary {
    pub taxable_value: BigDecimal,
    pub tax: TaxComponents,
}

impl SupplySummary {
    fn rounded(&self, scale: i64) -> Self {
        Self {
            taxable_value: round_money(&self.taxable_value, scale),
            tax: self.tax.rounded(scale),
        }
    }
}

/// GSTR-3B payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gstr3bPayload {
    pub gstin: Option<String>,
    pub period: ReturnPeriod,
    pub outward_supplies: SupplySummary,
    pub inward_supplies: SupplySummary,
    /// Credit from ITC-eligible purchases only
    pub itc_availed: TaxComponents,
    /// Per-head outward tax less credit, floored at zero
    pub tax_liability: TaxComponents,
}

impl Gstr3bPayload {
    /// Total cash payable across all heads
    pub fn net_liability(&self) -> BigDecimal {
        self.tax_liability.total()
    }
}

/// Summarise a period's sales and purchases.
///
/// Liability is derived from unrounded sums; every figure is rounded once at the end.
pub fn build(
    period: ReturnPeriod,
    gstin: Option<String>,
    sales: &[SaleInvoice],
    purchases: &[Purchase],
    scale: i64,
) -> Gstr3bPayload {
    let mut outward = SupplySummary::default();
    for sale in sales {
        outward.taxable_value += sale.taxable_value();
        outward.tax += &sale.tax();
    }

    let mut inward = SupplySummary::default();
    for purchase in purchases {
        inward.taxable_value += &purchase.taxable_value;
        inward.tax += &purchase.tax;
    }

    let itc = itc_components(purchases);
    let liability = outward.tax.liability_after(&itc);

    Gstr3bPayload {
        gstin,
        period,
        outward_supplies: outward.rounded(scale),
        inward_supplies: inward.rounded(scale),
        itc_availed: itc.rounded(scale),
        tax_liability: liability.rounded(scale),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tax::gst::calculate;
    use chrono::NaiveDate;

    fn purchase(number: &str, value: i64, rate: i64, inter_state: bool, eligible: bool) -> Purchase {
        let split = calculate(&BigDecimal::from(value), &BigDecimal::from(rate), inter_state);
        Purchase {
            id: number.to_lowercase(),
            invoice_number: number.to_string(),
            invoice_date: NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
            supplier_gstin: Some("27PQRST9876K1Z2".to_string()),
            supplier_name: None,
            place_of_supply: "27".to_string(),
            taxable_value: BigDecimal::from(value),
            rate: BigDecimal::from(rate),
            tax: split.components(),
            itc_eligible: eligible,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }

    fn sale(value: i64, rate: i64, inter_state: bool) -> SaleInvoice {
        let split = calculate(&BigDecimal::from(value), &BigDecimal::from(rate), inter_state);
        SaleInvoice {
            id: "s1".to_string(),
            invoice_number: "INV-1".to_string(),
            invoice_date: NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            customer_gstin: None,
            customer_name: None,
            place_of_supply: "27".to_string(),
            reverse_charge: false,
            lines: vec![SaleLine {
                serial_number: 1,
                product_id: None,
                description: "Mango juice".to_string(),
                hsn_code: Some("2009".to_string()),
                taxable_value: BigDecimal::from(value),
                rate: BigDecimal::from(rate),
                tax: split.components(),
            }],
            created_at: chrono::Utc::now().naive_utc(),
        }
    }

    #[test]
    fn test_ineligible_purchases_add_no_credit() {
        let period = ReturnPeriod::new(3, 2024).unwrap();
        let sales = vec![sale(10000, 12, false)];
        let purchases = vec![
            purchase("P-1", 5000, 12, false, true),
            purchase("P-2", 5000, 12, false, false),
        ];

        let payload = build(period, None, &sales, &purchases, 2);

        assert_eq!(payload.inward_supplies.taxable_value, BigDecimal::from(10000));
        assert_eq!(payload.itc_availed.cgst, BigDecimal::from(300));
        assert_eq!(payload.tax_liability.cgst, BigDecimal::from(300));
        assert_eq!(payload.tax_liability.sgst, BigDecimal::from(300));
        assert_eq!(payload.net_liability(), BigDecimal::from(600));
    }

    #[test]
    fn test_excess_credit_floors_each_head() {
        let period = ReturnPeriod::new(3, 2024).unwrap();
        let sales = vec![sale(1000, 18, true)];
        let purchases = vec![purchase("P-3", 10000, 18, false, true)];

        let payload = build(period, None, &sales, &purchases, 2);

        // IGST credit is zero, so the whole IGST outward tax stays payable
        assert_eq!(payload.tax_liability.igst, BigDecimal::from(180));
        assert_eq!(payload.tax_liability.cgst, BigDecimal::from(0));
        assert_eq!(payload.tax_liability.sgst, BigDecimal::from(0));
    }
}
