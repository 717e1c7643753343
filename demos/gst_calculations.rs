//! GST calculation examples

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use gst_core::tax::gstin;
use gst_core::{
    aggregate_itc, calculate, reverse_charge, GstCalculator, PurchaseDraft, SaleInvoiceDraft,
    SaleLineInput,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🧾 GST Core - Calculation Examples\n");

    // 1. GSTIN checks
    println!("🔎 GSTIN Checks:");
    for value in ["27ABCDE1234F1Z5", "22aaaaa0000a1z5", "22AAAAA0000A1Z"] {
        println!("  {value}: valid = {}", gstin::validate_format(value));
    }
    println!(
        "  27ABCDE1234F1Z5 → 29ABCDE1234F1Z5 inter-state: {}",
        gstin::is_inter_state(Some("27ABCDE1234F1Z5"), Some("29ABCDE1234F1Z5"))
    );
    println!();

    // 2. Intra-state vs inter-state splits
    let base_amount = BigDecimal::from(10000);
    let rate = BigDecimal::from(18);

    println!("🏢 Intra-state Supply (CGST + SGST):");
    let intra = calculate(&base_amount, &rate, false);
    println!("  Base Amount: ₹{base_amount}");
    println!("  CGST (9%):   ₹{}", intra.cgst);
    println!("  SGST (9%):   ₹{}", intra.sgst);
    println!("  Total GST:   ₹{}", intra.total);
    println!();

    println!("🌍 Inter-state Supply (IGST only):");
    let inter = calculate(&base_amount, &rate, true);
    println!("  Base Amount: ₹{base_amount}");
    println!("  IGST (18%):  ₹{}", inter.igst);
    println!("  Total GST:   ₹{}", inter.total);
    println!();

    // 3. Reverse charge
    println!("🔄 Reverse Charge (recipient pays the tax):");
    let charge = reverse_charge(&BigDecimal::from(25000), &BigDecimal::from(5));
    println!("  Taxable:     ₹{}", charge.taxable_value);
    println!("  GST:         ₹{}", charge.gst_amount);
    println!("  Total:       ₹{}", charge.total_amount);
    println!();

    // 4. Multi-line invoice priced from the GSTINs
    println!("🧃 Multi-line Invoice:");
    let calculator = GstCalculator::new(Some("27ABCDE1234F1Z5".to_string()));
    let lines = [
        ("Plain cane juice", "2009", 4000, 5),
        ("Mango cooler", "2009", 6000, 12),
        ("Ginger fizz", "2202", 2500, 18),
    ];
    let invoice = calculator.price_invoice(SaleInvoiceDraft {
        id: "demo-sale".to_string(),
        invoice_number: "INV-2024-001".to_string(),
        invoice_date: NaiveDate::from_ymd_opt(2024, 4, 10).unwrap(),
        customer_gstin: Some("29AAAAA0000A1Z5".to_string()),
        customer_name: Some("Cool Drinks".to_string()),
        place_of_supply: "29".to_string(),
        reverse_charge: false,
        lines: lines
            .iter()
            .enumerate()
            .map(|(index, (description, hsn, value, rate))| SaleLineInput {
                serial_number: index as u32 + 1,
                product_id: None,
                description: description.to_string(),
                hsn_code: Some(hsn.to_string()),
                taxable_value: BigDecimal::from(*value),
                rate: BigDecimal::from(*rate),
            })
            .collect(),
    })?;

    for line in &invoice.lines {
        println!(
            "    {}. {} ({}) ₹{} @ {}% → IGST ₹{}",
            line.serial_number,
            line.description,
            line.hsn_code.as_deref().unwrap_or("-"),
            line.taxable_value,
            line.rate,
            line.tax.igst
        );
    }
    let tax = invoice.tax();
    println!("  Taxable value: ₹{}", invoice.taxable_value());
    println!("  Total IGST:    ₹{}", tax.igst);
    println!("  Grand Total:   ₹{}", invoice.total());
    println!();

    // 5. Input tax credit
    println!("💳 Input Tax Credit:");
    let purchases = [("BILL-17", 8000, true), ("BILL-18", 3000, false)]
        .into_iter()
        .map(|(number, value, itc_eligible)| {
            calculator.price_purchase(PurchaseDraft {
                id: number.to_lowercase(),
                invoice_number: number.to_string(),
                invoice_date: NaiveDate::from_ymd_opt(2024, 4, 3).unwrap(),
                supplier_gstin: Some("27PQRST6789K1Z3".to_string()),
                supplier_name: Some("Fresh Farms".to_string()),
                place_of_supply: "27".to_string(),
                taxable_value: BigDecimal::from(value),
                rate: BigDecimal::from(12),
                itc_eligible,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    for purchase in &purchases {
        println!(
            "  {}: GST ₹{} (eligible: {})",
            purchase.invoice_number,
            purchase.gst_amount(),
            purchase.itc_eligible
        );
    }
    println!("  Claimable ITC: ₹{}", aggregate_itc(&purchases));

    Ok(())
}
