//! End-to-end compliance workflow on in-memory storage
//!
//! Run with `RUST_LOG=gst_core=info cargo run --example gst_workflow` to see the
//! engine's structured logs.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use gst_core::audit::{AuditQuery, CsvAuditExporter, ExportFormat};
use gst_core::eway::{EWayBillDecision, EWayBillRequest, Party, TransportDetails};
use gst_core::returns::ReturnPeriod;
use gst_core::{
    BatchControl, CounterpartyInvoice, GstCompliance, GstConfig, MemoryStorage, Product,
    PurchaseDraft, ReturnType, SaleInvoiceDraft, SaleLineInput,
};
use tracing_subscriber::EnvFilter;

const BUSINESS: &str = "27ABCDE1234F1Z5";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse()?))
        .with_writer(std::io::stderr)
        .init();

    println!("🧾 GST Core - Compliance Workflow\n");

    let storage = MemoryStorage::new();
    let mut engine = GstCompliance::new(storage.clone(), GstConfig::for_business(BUSINESS))?;
    let period = ReturnPeriod::new(4, 2024)?;

    // 1. Classify the inventory
    println!("🏷️  Mapping Inventory to HSN Codes...");
    for (id, name, category, product_type) in [
        ("p1", "Mango Cooler", "Juices", "tropical"),
        ("p2", "Plain Cane Juice", "Cane", "cane"),
        ("p3", "Jaljeera Twist", "Drinks", "spiced/herbal/others"),
        ("p4", "Orange Burst", "Juices", "citrus"),
    ] {
        storage.add_product(Product::new(
            id.to_string(),
            name.to_string(),
            Some(category.to_string()),
            Some(product_type.to_string()),
        ))?;
    }

    let (sender, mut receiver) = tokio::sync::mpsc::unbounded_channel();
    let outcome = engine
        .auto_map(&BatchControl::new().with_progress(sender))
        .await?;
    while let Ok(progress) = receiver.try_recv() {
        println!(
            "  [{:>3}%] {}",
            progress.percentage,
            progress.item.unwrap_or_default()
        );
    }
    for detail in &outcome.details {
        println!(
            "  ✓ {} → {} at {}% ({})",
            detail.product, detail.code, detail.rate, detail.description
        );
    }
    let stats = engine.mapping_stats().await?;
    println!("  Mapped {}/{} ({}%)", stats.mapped, stats.total, stats.percentage);
    println!();

    // 2. Record the month's sales and purchases
    println!("💰 Recording April Transactions...");
    let date = |day| NaiveDate::from_ymd_opt(2024, 4, day).unwrap();
    let sales = [
        ("INV-001", Some("27XYZAB5678C1Z9"), "27", 40000, 12),
        ("INV-002", Some("29AAAAA0000A1Z5"), "29", 65000, 12),
        ("INV-003", None, "27", 1800, 18),
    ];
    let mut recorded = Vec::new();
    for (number, customer, place, value, rate) in sales {
        let invoice = engine.price_invoice(SaleInvoiceDraft {
            id: number.to_lowercase(),
            invoice_number: number.to_string(),
            invoice_date: date(12),
            customer_gstin: customer.map(str::to_string),
            customer_name: None,
            place_of_supply: place.to_string(),
            reverse_charge: false,
            lines: vec![SaleLineInput {
                serial_number: 1,
                product_id: Some("p1".to_string()),
                description: "Mango Cooler".to_string(),
                hsn_code: Some("2009".to_string()),
                taxable_value: BigDecimal::from(value),
                rate: BigDecimal::from(rate),
            }],
        })?;
        println!("  Sale {}: total ₹{}", invoice.invoice_number, invoice.total());
        storage.add_sale(invoice.clone())?;
        recorded.push(invoice);
    }

    let purchase = engine.price_purchase(PurchaseDraft {
        id: "bill-17".to_string(),
        invoice_number: "BILL-17".to_string(),
        invoice_date: date(3),
        supplier_gstin: Some("27PQRST6789K1Z3".to_string()),
        supplier_name: Some("Fresh Farms".to_string()),
        place_of_supply: "27".to_string(),
        taxable_value: BigDecimal::from(20000),
        rate: BigDecimal::from(12),
        itc_eligible: true,
    })?;
    println!("  Purchase {}: GST ₹{}", purchase.invoice_number, purchase.gst_amount());
    storage.add_purchase(purchase)?;
    storage.add_counterparty_invoice(CounterpartyInvoice {
        invoice_number: "BILL-17".to_string(),
        supplier_gstin: "27PQRST6789K1Z3".to_string(),
        supplier_name: Some("Fresh Farms".to_string()),
        invoice_date: date(3),
        taxable_value: BigDecimal::from(20500),
        tax_amount: BigDecimal::from(2460),
    })?;
    println!();

    // 3. Reconcile against supplier-reported data
    println!("🔍 Reconciling with GSTR-2A...");
    let report = engine.reconcile(period, &BatchControl::new()).await?;
    println!(
        "  Matched {} of {} invoices",
        report.matched, report.total_invoices_in_books
    );
    for discrepancy in &report.discrepancies {
        println!(
            "  ⚠️  [{:?}] {}: {}",
            discrepancy.severity, discrepancy.invoice_number, discrepancy.description
        );
    }
    let impact = engine.financial_impact(&report.discrepancies, None);
    println!("  ITC impact: ₹{}", impact.itc_impact);
    println!();

    // 4. Returns
    println!("📄 Preparing Returns...");
    let gstr1 = engine.generate_gstr1(period).await?;
    println!(
        "  GSTR-1: {} B2B, {} B2CL, {} B2CS records",
        gstr1.b2b.len(),
        gstr1.b2cl.len(),
        gstr1.b2cs.len()
    );
    let gstr3b = engine.generate_gstr3b(period).await?;
    println!("  GSTR-3B net liability: ₹{}", gstr3b.net_liability());

    engine.prepare_return(ReturnType::Gstr3b, period).await?;
    let receipt = engine
        .file_gstr(ReturnType::Gstr3b, period, gstr3b.into())
        .await?;
    println!("  Filed GSTR-3B, reference {}", receipt.reference);
    println!();

    // 5. E-way bill for the inter-state shipment
    println!("🚚 E-way Bill...");
    let invoice = recorded
        .into_iter()
        .find(|sale| sale.place_of_supply == "29")
        .ok_or("inter-state sale not recorded")?;
    let decision = engine
        .generate_eway_bill(EWayBillRequest {
            invoice,
            consignor: Party {
                gstin: Some(BUSINESS.to_string()),
                name: "Juice Works".to_string(),
                address: "Plot 4, MIDC".to_string(),
                place: "Pune".to_string(),
                pincode: "411019".to_string(),
            },
            consignee: Party {
                gstin: Some("29AAAAA0000A1Z5".to_string()),
                name: "Cool Drinks".to_string(),
                address: "12 MG Road".to_string(),
                place: "Bengaluru".to_string(),
                pincode: "560001".to_string(),
            },
            transport: TransportDetails {
                vehicle_number: Some("MH12AB1234".to_string()),
                distance_km: 840,
                ..TransportDetails::default()
            },
            cess: None,
        })
        .await?;
    match decision {
        EWayBillDecision::Issued(bill) => {
            println!("  Issued {} valid until {}", bill.number, bill.valid_until)
        }
        EWayBillDecision::NotRequired { threshold, invoice_total } => {
            println!("  Not required: ₹{invoice_total} is below ₹{threshold}")
        }
    }
    println!();

    // 6. Audit trail
    println!("📚 Audit Trail:");
    let export = engine
        .export_audit_log(&AuditQuery::default(), ExportFormat::Csv, &CsvAuditExporter)
        .await?;
    print!("{}", String::from_utf8(export)?);

    Ok(())
}
