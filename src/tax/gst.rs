//! GST (Goods and Services Tax) calculation engine for Indian tax compliance

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::tax::gstin;
use crate::types::*;
use crate::utils::money::percent_of;

/// Highest statutory GST slab in percent
pub const MAX_GST_RATE: i32 = 28;

/// GST rate structure for Indian taxation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GstRate {
    /// Total GST rate percentage (e.g., 18.0 for 18%)
    pub total_rate: BigDecimal,
    /// CGST rate percentage (Central GST)
    pub cgst_rate: BigDecimal,
    /// SGST rate percentage (State GST)
    pub sgst_rate: BigDecimal,
    /// IGST rate percentage (Integrated GST)
    pub igst_rate: BigDecimal,
}

impl GstRate {
    /// Create a new GST rate with intra-state rates (CGST + SGST)
    pub fn intra_state(total_rate: BigDecimal) -> Self {
        let half_rate = &total_rate / BigDecimal::from(2);
        Self {
            total_rate,
            cgst_rate: half_rate.clone(),
            sgst_rate: half_rate,
            igst_rate: BigDecimal::from(0),
        }
    }

    /// Create a new GST rate with inter-state rates (IGST)
    pub fn inter_state(total_rate: BigDecimal) -> Self {
        Self {
            total_rate: total_rate.clone(),
            cgst_rate: BigDecimal::from(0),
            sgst_rate: BigDecimal::from(0),
            igst_rate: total_rate,
        }
    }

    pub fn for_supply(total_rate: BigDecimal, inter_state: bool) -> Self {
        if inter_state {
            Self::inter_state(total_rate)
        } else {
            Self::intra_state(total_rate)
        }
    }

    /// Validate that the GST rate structure is correct
    pub fn validate(&self) -> GstResult<()> {
        validate_rate(&self.total_rate)?;

        let calculated_total = &self.cgst_rate + &self.sgst_rate + &self.igst_rate;
        if calculated_total != self.total_rate {
            return Err(GstError::Validation(format!(
                "GST components don't add up to total rate: {} != {}",
                calculated_total, self.total_rate
            )));
        }

        // For intra-state transactions, CGST and SGST should be equal
        if self.igst_rate == BigDecimal::from(0) && self.cgst_rate != self.sgst_rate {
            return Err(GstError::Validation(
                "CGST and SGST rates must be equal for intra-state transactions".to_string(),
            ));
        }

        // For inter-state transactions, only IGST should be non-zero
        if self.igst_rate > BigDecimal::from(0)
            && (self.cgst_rate > BigDecimal::from(0) || self.sgst_rate > BigDecimal::from(0))
        {
            return Err(GstError::Validation(
                "Only IGST should be applicable for inter-state transactions".to_string(),
            ));
        }

        Ok(())
    }
}

/// Reject rates outside `0..=28` percent
pub fn validate_rate(rate: &BigDecimal) -> GstResult<()> {
    if *rate < BigDecimal::from(0) || *rate > BigDecimal::from(MAX_GST_RATE) {
        return Err(GstError::Validation(format!(
            "GST rate must be between 0 and {MAX_GST_RATE}, got {rate}"
        )));
    }
    Ok(())
}

/// Tax split of a taxable amount
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxSplit {
    /// Rate structure the split was computed with
    pub gst_rate: GstRate,
    pub igst: BigDecimal,
    pub cgst: BigDecimal,
    pub sgst: BigDecimal,
    /// `amount * rate / 100`
    pub total: BigDecimal,
}

impl TaxSplit {
    pub fn components(&self) -> TaxComponents {
        TaxComponents::new(self.igst.clone(), self.cgst.clone(), self.sgst.clone())
    }
}

/// Split `amount` at `rate` percent into IGST, or equal CGST and SGST halves
pub fn calculate(amount: &BigDecimal, rate: &BigDecimal, inter_state: bool) -> TaxSplit {
    calculate_with_rate(amount, GstRate::for_supply(rate.clone(), inter_state))
}

/// Split `amount` using an explicit rate structure
pub fn calculate_with_rate(amount: &BigDecimal, gst_rate: GstRate) -> TaxSplit {
    let igst = percent_of(amount, &gst_rate.igst_rate);
    let cgst = percent_of(amount, &gst_rate.cgst_rate);
    let sgst = percent_of(amount, &gst_rate.sgst_rate);
    let total = &igst + &cgst + &sgst;

    TaxSplit {
        gst_rate,
        igst,
        cgst,
        sgst,
        total,
    }
}

/// Buyer-side liability under reverse charge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReverseCharge {
    pub taxable_value: BigDecimal,
    pub gst_amount: BigDecimal,
    pub total_amount: BigDecimal,
}

pub fn reverse_charge(amount: &BigDecimal, rate: &BigDecimal) -> ReverseCharge {
    let gst_amount = percent_of(amount, rate);
    ReverseCharge {
        taxable_value: amount.clone(),
        total_amount: amount + &gst_amount,
        gst_amount,
    }
}

/// Input tax credit available from ITC-eligible purchases
pub fn aggregate_itc(purchases: &[Purchase]) -> BigDecimal {
    purchases
        .iter()
        .filter(|purchase| purchase.itc_eligible)
        .map(Purchase::gst_amount)
        .sum()
}

/// Per-head input tax credit from ITC-eligible purchases
pub fn itc_components(purchases: &[Purchase]) -> TaxComponents {
    let mut credit = TaxComponents::default();
    for purchase in purchases.iter().filter(|purchase| purchase.itc_eligible) {
        credit += &purchase.tax;
    }
    credit
}

/// Unpriced sales line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleLineInput {
    pub serial_number: u32,
    pub product_id: Option<String>,
    pub description: String,
    pub hsn_code: Option<String>,
    pub taxable_value: BigDecimal,
    pub rate: BigDecimal,
}

/// Unpriced sales invoice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleInvoiceDraft {
    pub id: String,
    pub invoice_number: String,
    pub invoice_date: NaiveDate,
    pub customer_gstin: Option<String>,
    pub customer_name: Option<String>,
    pub place_of_supply: String,
    pub reverse_charge: bool,
    pub lines: Vec<SaleLineInput>,
}

/// Unpriced purchase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseDraft {
    pub id: String,
    pub invoice_number: String,
    pub invoice_date: NaiveDate,
    pub supplier_gstin: Option<String>,
    pub supplier_name: Option<String>,
    pub place_of_supply: String,
    pub taxable_value: BigDecimal,
    pub rate: BigDecimal,
    pub itc_eligible: bool,
}

/// Prices sales and purchases from the registered business's point of view
#[derive(Debug, Clone, Default)]
pub struct GstCalculator {
    /// GSTIN of the business whose books are being priced
    business_gstin: Option<String>,
}

impl GstCalculator {
    pub fn new(business_gstin: Option<String>) -> Self {
        Self { business_gstin }
    }

    /// Inter-state status of a supply to or from `counterparty_gstin`.
    ///
    /// Without a counterparty GSTIN the business's state is compared with the
    /// place of supply instead.
    pub fn supply_is_inter_state(
        &self,
        counterparty_gstin: Option<&str>,
        place_of_supply: &str,
    ) -> bool {
        let business = self.business_gstin.as_deref();
        match counterparty_gstin.filter(|gstin| !gstin.trim().is_empty()) {
            Some(counterparty) => gstin::is_inter_state(business, Some(counterparty)),
            None => match business.and_then(gstin::state_code) {
                Some(home_state) if !place_of_supply.is_empty() => home_state != place_of_supply,
                _ => false,
            },
        }
    }

    /// Price a single sales line
    pub fn price_sale_line(&self, input: SaleLineInput, inter_state: bool) -> GstResult<SaleLine> {
        validate_taxable_value(&input.taxable_value)?;
        let gst_rate = GstRate::for_supply(input.rate.clone(), inter_state);
        gst_rate.validate()?;

        let split = calculate_with_rate(&input.taxable_value, gst_rate);
        Ok(SaleLine {
            serial_number: input.serial_number,
            product_id: input.product_id,
            description: input.description,
            hsn_code: input.hsn_code,
            taxable_value: input.taxable_value,
            rate: input.rate,
            tax: split.components(),
        })
    }

    /// Price every line of a sales invoice
    pub fn price_invoice(&self, draft: SaleInvoiceDraft) -> GstResult<SaleInvoice> {
        if draft.invoice_number.trim().is_empty() {
            return Err(GstError::Validation(
                "Invoice number cannot be empty".to_string(),
            ));
        }
        if let Some(customer) = draft.customer_gstin.as_deref() {
            gstin::require_valid_gstin(customer, "customer_gstin")?;
        }

        let inter_state =
            self.supply_is_inter_state(draft.customer_gstin.as_deref(), &draft.place_of_supply);
        let lines = draft
            .lines
            .into_iter()
            .map(|line| self.price_sale_line(line, inter_state))
            .collect::<GstResult<Vec<_>>>()?;

        Ok(SaleInvoice {
            id: draft.id,
            invoice_number: draft.invoice_number,
            invoice_date: draft.invoice_date,
            customer_gstin: draft.customer_gstin,
            customer_name: draft.customer_name,
            place_of_supply: draft.place_of_supply,
            reverse_charge: draft.reverse_charge,
            lines,
            created_at: chrono::Utc::now().naive_utc(),
        })
    }

    /// Price a purchase; the supplier is the seller here
    pub fn price_purchase(&self, draft: PurchaseDraft) -> GstResult<Purchase> {
        validate_taxable_value(&draft.taxable_value)?;
        validate_rate(&draft.rate)?;
        if let Some(supplier) = draft.supplier_gstin.as_deref() {
            gstin::require_valid_gstin(supplier, "supplier_gstin")?;
        }

        let inter_state =
            self.supply_is_inter_state(draft.supplier_gstin.as_deref(), &draft.place_of_supply);
        let split = calculate(&draft.taxable_value, &draft.rate, inter_state);

        Ok(Purchase {
            id: draft.id,
            invoice_number: draft.invoice_number,
            invoice_date: draft.invoice_date,
            supplier_gstin: draft.supplier_gstin,
            supplier_name: draft.supplier_name,
            place_of_supply: draft.place_of_supply,
            taxable_value: draft.taxable_value,
            rate: draft.rate,
            tax: split.components(),
            itc_eligible: draft.itc_eligible,
            created_at: chrono::Utc::now().naive_utc(),
        })
    }
}

fn validate_taxable_value(amount: &BigDecimal) -> GstResult<()> {
    if *amount < BigDecimal::from(0) {
        return Err(GstError::Validation(format!(
            "Taxable value cannot be negative, got {amount}"
        )));
    }
    Ok(())
}
