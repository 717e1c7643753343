//! GSTR-1: outward supplies return

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::returns::ReturnPeriod;
use crate::types::*;
use crate::utils::money::round_money;

/// Per-line record inside an invoice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub serial_number: u32,
    pub hsn_code: Option<String>,
    pub taxable_value: BigDecimal,
    pub rate: BigDecimal,
    pub igst: BigDecimal,
    pub cgst: BigDecimal,
    pub sgst: BigDecimal,
}

/// Invoice as reported in the B2B and B2C-Large schedules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    pub invoice_number: String,
    pub invoice_date: chrono::NaiveDate,
    /// Invoice value including tax
    pub value: BigDecimal,
    pub place_of_supply: String,
    pub reverse_charge: bool,
    pub items: Vec<ItemRecord>,
}

/// B2B supplies to one registered recipient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct B2bEntry {
    /// Recipient GSTIN
    pub counterparty_gstin: String,
    pub invoices: Vec<InvoiceRecord>,
}

/// Large consumer invoices for one place of supply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct B2clEntry {
    pub place_of_supply: String,
    pub invoices: Vec<InvoiceRecord>,
}

/// Aggregation key for small consumer supplies
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SupplyKey {
    pub place_of_supply: String,
    pub rate: BigDecimal,
}

/// Small consumer supplies aggregated by place of supply and rate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct B2csEntry {
    pub place_of_supply: String,
    pub rate: BigDecimal,
    /// "OE": other than e-commerce
    pub supply_type: String,
    pub taxable_value: BigDecimal,
    pub igst: BigDecimal,
    pub cgst: BigDecimal,
    pub sgst: BigDecimal,
}

/// One HSN summary row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HsnSummaryEntry {
    pub hsn_code: String,
    pub description: Option<String>,
    pub rate: BigDecimal,
    pub line_count: usize,
    pub taxable_value: BigDecimal,
    pub igst: BigDecimal,
    pub cgst: BigDecimal,
    pub sgst: BigDecimal,
}

/// HSN-wise summary of outward supplies
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HsnSummary {
    pub entries: Vec<HsnSummaryEntry>,
    /// Lines whose HSN code could not be resolved
    pub unclassified_lines: usize,
}

/// Nil-rated (0%) supplies
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NilRatedSummary {
    pub line_count: usize,
    pub taxable_value: BigDecimal,
}

/// GSTR-1 payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gstr1Payload {
    pub gstin: Option<String>,
    pub period: ReturnPeriod,
    pub b2b: Vec<B2bEntry>,
    pub b2cl: Vec<B2clEntry>,
    pub b2cs: Vec<B2csEntry>,
    pub hsn: HsnSummary,
    pub nil: NilRatedSummary,
}

impl Gstr1Payload {
    /// Number of reported supply records across B2B, B2CL and B2CS
    pub fn outward_supply_count(&self) -> usize {
        let b2b: usize = self.b2b.iter().map(|entry| entry.invoices.len()).sum();
        let b2cl: usize = self.b2cl.iter().map(|entry| entry.invoices.len()).sum();
        b2b + b2cl + self.b2cs.len()
    }
}

/// Resolves HSN codes and descriptions for lines that were sold without one
#[derive(Debug, Clone, Default)]
pub struct HsnResolver {
    /// product id -> mapped code
    pub product_codes: HashMap<String, String>,
    /// code -> description from the code table
    pub descriptions: HashMap<String, String>,
}

impl HsnResolver {
    fn resolve(&self, line: &SaleLine) -> Option<String> {
        line.hsn_code
            .clone()
            .filter(|code| !code.trim().is_empty())
            .or_else(|| {
                line.product_id
                    .as_ref()
                    .and_then(|id| self.product_codes.get(id))
                    .cloned()
            })
    }
}

#[derive(Default)]
struct Accumulator {
    line_count: usize,
    taxable_value: BigDecimal,
    tax: TaxComponents,
}

impl Accumulator {
    fn add(&mut self, line: &SaleLine) {
        self.line_count += 1;
        self.taxable_value += &line.taxable_value;
        self.tax += &line.tax;
    }
}

/// Partition a period's sales into the GSTR-1 schedules.
///
/// Sums are accumulated at full precision and rounded to `scale` once.
pub fn build(
    period: ReturnPeriod,
    gstin: Option<String>,
    sales: &[SaleInvoice],
    resolver: &HsnResolver,
    b2c_large_threshold: &BigDecimal,
    scale: i64,
) -> Gstr1Payload {
    let mut b2b: BTreeMap<String, Vec<InvoiceRecord>> = BTreeMap::new();
    let mut b2cl: BTreeMap<String, Vec<InvoiceRecord>> = BTreeMap::new();
    let mut b2cs: BTreeMap<SupplyKey, Accumulator> = BTreeMap::new();
    let mut hsn: BTreeMap<(String, BigDecimal), Accumulator> = BTreeMap::new();
    let mut hsn_summary = HsnSummary::default();
    let mut nil = Accumulator::default();

    for sale in sales {
        match sale.customer_gstin.as_deref().filter(|_| sale.is_b2b()) {
            Some(ctin) => {
                b2b.entry(ctin.to_string())
                    .or_default()
                    .push(invoice_record(sale, resolver, scale));
            }
            None if sale.total() > *b2c_large_threshold => {
                b2cl.entry(sale.place_of_supply.clone())
                    .or_default()
                    .push(invoice_record(sale, resolver, scale));
            }
            None => {
                for line in &sale.lines {
                    let key = SupplyKey {
                        place_of_supply: sale.place_of_supply.clone(),
                        rate: line.rate.normalized(),
                    };
                    b2cs.entry(key).or_default().add(line);
                }
            }
        }

        for line in &sale.lines {
            match resolver.resolve(line) {
                Some(code) => hsn
                    .entry((code, line.rate.normalized()))
                    .or_default()
                    .add(line),
                None => hsn_summary.unclassified_lines += 1,
            }
            if line.rate == BigDecimal::from(0) {
                nil.add(line);
            }
        }
    }

    hsn_summary.entries = hsn
        .into_iter()
        .map(|((hsn_code, rate), acc)| {
            let tax = acc.tax.rounded(scale);
            HsnSummaryEntry {
                description: resolver.descriptions.get(&hsn_code).cloned(),
                hsn_code,
                rate,
                line_count: acc.line_count,
                taxable_value: round_money(&acc.taxable_value, scale),
                igst: tax.igst,
                cgst: tax.cgst,
                sgst: tax.sgst,
            }
        })
        .collect();

    Gstr1Payload {
        gstin,
        period,
        b2b: b2b
            .into_iter()
            .map(|(counterparty_gstin, invoices)| B2bEntry {
                counterparty_gstin,
                invoices,
            })
            .collect(),
        b2cl: b2cl
            .into_iter()
            .map(|(place_of_supply, invoices)| B2clEntry {
                place_of_supply,
                invoices,
            })
            .collect(),
        b2cs: b2cs
            .into_iter()
            .map(|(key, acc)| {
                let tax = acc.tax.rounded(scale);
                B2csEntry {
                    place_of_supply: key.place_of_supply,
                    rate: key.rate,
                    supply_type: "OE".to_string(),
                    taxable_value: round_money(&acc.taxable_value, scale),
                    igst: tax.igst,
                    cgst: tax.cgst,
                    sgst: tax.sgst,
                }
            })
            .collect(),
        hsn: hsn_summary,
        nil: NilRatedSummary {
            line_count: nil.line_count,
            taxable_value: round_money(&nil.taxable_value, scale),
        },
    }
}

fn invoice_record(sale: &SaleInvoice, resolver: &HsnResolver, scale: i64) -> InvoiceRecord {
    InvoiceRecord {
        invoice_number: sale.invoice_number.clone(),
        invoice_date: sale.invoice_date,
        value: round_money(&sale.total(), scale),
        place_of_supply: sale.place_of_supply.clone(),
        reverse_charge: sale.reverse_charge,
        items: sale
            .lines
            .iter()
            .map(|line| {
                let tax = line.tax.rounded(scale);
                ItemRecord {
                    serial_number: line.serial_number,
                    hsn_code: resolver.resolve(line),
                    taxable_value: round_money(&line.taxable_value, scale),
                    rate: line.rate.clone(),
                    igst: tax.igst,
                    cgst: tax.cgst,
                    sgst: tax.sgst,
                }
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tax::gst::calculate;
    use chrono::NaiveDate;

    fn line(serial: u32, hsn: Option<&str>, value: i64, rate: i64, inter_state: bool) -> SaleLine {
        let split = calculate(&BigDecimal::from(value), &BigDecimal::from(rate), inter_state);
        SaleLine {
            serial_number: serial,
            product_id: None,
            description: format!("item {serial}"),
            hsn_code: hsn.map(str::to_string),
            taxable_value: BigDecimal::from(value),
            rate: BigDecimal::from(rate),
            tax: split.components(),
        }
    }

    fn sale(number: &str, gstin: Option<&str>, pos: &str, lines: Vec<SaleLine>) -> SaleInvoice {
        SaleInvoice {
            id: number.to_lowercase(),
            invoice_number: number.to_string(),
            invoice_date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            customer_gstin: gstin.map(str::to_string),
            customer_name: None,
            place_of_supply: pos.to_string(),
            reverse_charge: false,
            lines,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }

    fn period() -> ReturnPeriod {
        ReturnPeriod::new(3, 2024).unwrap()
    }

    #[test]
    fn test_partitions_b2b_b2cl_b2cs() {
        let sales = vec![
            sale(
                "INV-1",
                Some("27XYZAB5678C1Z9"),
                "27",
                vec![line(1, Some("2009"), 10000, 12, false)],
            ),
            sale("INV-2", None, "29", vec![line(1, Some("2009"), 300000, 12, true)]),
            sale("INV-3", None, "27", vec![line(1, Some("2009"), 1000, 12, false)]),
            sale("INV-4", None, "27", vec![line(1, Some("2202"), 2000, 12, false)]),
        ];

        let payload = build(
            period(),
            None,
            &sales,
            &HsnResolver::default(),
            &BigDecimal::from(250000),
            2,
        );

        assert_eq!(payload.b2b.len(), 1);
        assert_eq!(payload.b2b[0].counterparty_gstin, "27XYZAB5678C1Z9");
        assert_eq!(payload.b2cl.len(), 1);
        assert_eq!(payload.b2cl[0].place_of_supply, "29");

        // INV-3 and INV-4 share (27, 12%) so they collapse into one row
        assert_eq!(payload.b2cs.len(), 1);
        assert_eq!(payload.b2cs[0].taxable_value, BigDecimal::from(3000));
        assert_eq!(payload.b2cs[0].cgst, BigDecimal::from(180));
        assert_eq!(payload.b2cs[0].sgst, BigDecimal::from(180));
        assert_eq!(payload.outward_supply_count(), 3);
    }

    #[test]
    fn test_b2c_at_threshold_is_small() {
        // 200000 + 25% = 250000, exactly the threshold
        let sales = vec![sale("INV-9", None, "27", vec![line(1, None, 200000, 25, false)])];

        let payload = build(
            period(),
            None,
            &sales,
            &HsnResolver::default(),
            &BigDecimal::from(250000),
            2,
        );

        assert!(payload.b2cl.is_empty());
        assert_eq!(payload.b2cs.len(), 1);
    }

    #[test]
    fn test_b2cs_keeps_rates_apart() {
        let sales = vec![sale(
            "INV-5",
            None,
            "27",
            vec![
                line(1, Some("2009"), 1000, 12, false),
                line(2, Some("2009"), 1000, 5, false),
            ],
        )];

        let payload = build(
            period(),
            None,
            &sales,
            &HsnResolver::default(),
            &BigDecimal::from(250000),
            2,
        );

        assert_eq!(payload.b2cs.len(), 2);
    }

    #[test]
    fn test_hsn_summary_resolves_through_products() {
        let mut unmapped = line(1, None, 1000, 12, false);
        unmapped.product_id = Some("p1".to_string());
        let orphan = line(2, None, 500, 0, false);

        let mut resolver = HsnResolver::default();
        resolver
            .product_codes
            .insert("p1".to_string(), "2009".to_string());
        resolver
            .descriptions
            .insert("2009".to_string(), "Fruit juices".to_string());

        let payload = build(
            period(),
            None,
            &[sale("INV-6", None, "27", vec![unmapped, orphan])],
            &resolver,
            &BigDecimal::from(250000),
            2,
        );

        assert_eq!(payload.hsn.entries.len(), 1);
        assert_eq!(payload.hsn.entries[0].hsn_code, "2009");
        assert_eq!(
            payload.hsn.entries[0].description.as_deref(),
            Some("Fruit juices")
        );
        assert_eq!(payload.hsn.unclassified_lines, 1);
        assert_eq!(payload.nil.line_count, 1);
        assert_eq!(payload.nil.taxable_value, BigDecimal::from(500));
    }
}
