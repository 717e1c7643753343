//! Core record types and errors for the GST compliance engine

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::AddAssign;

use crate::eway::EWayBillPayload;
use crate::returns::{ReturnPayload, ReturnPeriod};
use crate::utils::money::round_money;

/// Kind of tax classification code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CodeKind {
    /// Harmonized System of Nomenclature - goods (4, 6 or 8 digits)
    Hsn,
    /// Services Accounting Code - services (6 digits)
    Sac,
}

impl fmt::Display for CodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodeKind::Hsn => write!(f, "HSN"),
            CodeKind::Sac => write!(f, "SAC"),
        }
    }
}

/// Persisted HSN/SAC code with its applicable rate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxCode {
    /// Numeric classification code
    pub code: String,
    /// Human-readable description of the goods or services
    pub description: String,
    /// Applicable GST rate in percent
    pub rate: BigDecimal,
    /// Whether this is an HSN or SAC code
    pub kind: CodeKind,
    /// Grouping used in the code table (e.g. "Beverages")
    pub category: String,
    /// When the code was added
    pub created_at: NaiveDateTime,
}

/// Input for adding a code to the code table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTaxCode {
    pub code: String,
    pub description: String,
    pub rate: BigDecimal,
    pub kind: CodeKind,
    pub category: String,
}

/// Inventory product as seen by the classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    /// SKU or barcode
    pub sku: Option<String>,
    pub category: Option<String>,
    pub product_type: Option<String>,
    /// Assigned HSN/SAC code, if mapped
    pub tax_code: Option<String>,
    /// Assigned GST rate in percent, if mapped
    pub rate: Option<BigDecimal>,
    pub updated_at: NaiveDateTime,
}

impl Product {
    /// Create an unmapped product
    pub fn new(
        id: String,
        name: String,
        category: Option<String>,
        product_type: Option<String>,
    ) -> Self {
        Self {
            id,
            name,
            sku: None,
            category,
            product_type,
            tax_code: None,
            rate: None,
            updated_at: chrono::Utc::now().naive_utc(),
        }
    }

    /// A product counts as mapped only when it carries a non-blank code
    pub fn is_mapped(&self) -> bool {
        self.tax_code
            .as_deref()
            .is_some_and(|code| !code.trim().is_empty())
    }

    /// Assign a classification code and rate
    pub fn assign_code(&mut self, code: String, rate: BigDecimal) {
        self.tax_code = Some(code);
        self.rate = Some(rate);
        self.updated_at = chrono::Utc::now().naive_utc();
    }
}

/// CGST / SGST / IGST amounts for a line, invoice or return head
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TaxComponents {
    pub igst: BigDecimal,
    pub cgst: BigDecimal,
    pub sgst: BigDecimal,
}

impl TaxComponents {
    pub fn new(igst: BigDecimal, cgst: BigDecimal, sgst: BigDecimal) -> Self {
        Self { igst, cgst, sgst }
    }

    /// Sum of all three heads
    pub fn total(&self) -> BigDecimal {
        &self.igst + &self.cgst + &self.sgst
    }

    /// Per-head `max(0, self - credit)`
    pub fn liability_after(&self, credit: &TaxComponents) -> TaxComponents {
        fn floor_zero(value: BigDecimal) -> BigDecimal {
            if value < BigDecimal::from(0) {
                BigDecimal::from(0)
            } else {
                value
            }
        }

        TaxComponents {
            igst: floor_zero(&self.igst - &credit.igst),
            cgst: floor_zero(&self.cgst - &credit.cgst),
            sgst: floor_zero(&self.sgst - &credit.sgst),
        }
    }

    /// Copy with every head rounded to `scale` decimal places
    pub fn rounded(&self, scale: i64) -> TaxComponents {
        TaxComponents {
            igst: round_money(&self.igst, scale),
            cgst: round_money(&self.cgst, scale),
            sgst: round_money(&self.sgst, scale),
        }
    }
}

impl AddAssign<&TaxComponents> for TaxComponents {
    fn add_assign(&mut self, other: &TaxComponents) {
        self.igst += &other.igst;
        self.cgst += &other.cgst;
        self.sgst += &other.sgst;
    }
}

/// Priced line of a sales invoice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleLine {
    pub serial_number: u32,
    /// Inventory product this line sells, used to resolve a missing HSN code
    pub product_id: Option<String>,
    pub description: String,
    pub hsn_code: Option<String>,
    pub taxable_value: BigDecimal,
    /// GST rate in percent
    pub rate: BigDecimal,
    pub tax: TaxComponents,
}

/// Outward supply invoice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleInvoice {
    pub id: String,
    pub invoice_number: String,
    pub invoice_date: NaiveDate,
    /// Present for B2B supplies
    pub customer_gstin: Option<String>,
    pub customer_name: Option<String>,
    /// Two-digit state code of the place of supply
    pub place_of_supply: String,
    pub reverse_charge: bool,
    pub lines: Vec<SaleLine>,
    pub created_at: NaiveDateTime,
}

impl SaleInvoice {
    /// True when the buyer is a registered taxpayer
    pub fn is_b2b(&self) -> bool {
        self.customer_gstin
            .as_deref()
            .is_some_and(|gstin| !gstin.trim().is_empty())
    }

    pub fn taxable_value(&self) -> BigDecimal {
        self.lines.iter().map(|line| &line.taxable_value).sum()
    }

    pub fn tax(&self) -> TaxComponents {
        let mut tax = TaxComponents::default();
        for line in &self.lines {
            tax += &line.tax;
        }
        tax
    }

    /// Invoice value including tax
    pub fn total(&self) -> BigDecimal {
        self.taxable_value() + self.tax().total()
    }
}

/// Inward supply (purchase) recorded in the books
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: String,
    pub invoice_number: String,
    pub invoice_date: NaiveDate,
    pub supplier_gstin: Option<String>,
    pub supplier_name: Option<String>,
    pub place_of_supply: String,
    pub taxable_value: BigDecimal,
    pub rate: BigDecimal,
    pub tax: TaxComponents,
    /// Whether the tax paid can be claimed as input tax credit
    pub itc_eligible: bool,
    pub created_at: NaiveDateTime,
}

impl Purchase {
    /// Total GST paid on the purchase
    pub fn gst_amount(&self) -> BigDecimal {
        self.tax.total()
    }

    pub fn total(&self) -> BigDecimal {
        &self.taxable_value + self.gst_amount()
    }
}

/// Invoice reported by a supplier, as auto-populated in GSTR-2A
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterpartyInvoice {
    pub invoice_number: String,
    pub supplier_gstin: String,
    pub supplier_name: Option<String>,
    pub invoice_date: NaiveDate,
    pub taxable_value: BigDecimal,
    pub tax_amount: BigDecimal,
}

/// Statutory return types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReturnType {
    #[serde(rename = "GSTR1")]
    Gstr1,
    #[serde(rename = "GSTR3B")]
    Gstr3b,
}

impl fmt::Display for ReturnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnType::Gstr1 => write!(f, "GSTR-1"),
            ReturnType::Gstr3b => write!(f, "GSTR-3B"),
        }
    }
}

/// Stored lifecycle state of a return filing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FilingStatus {
    Draft,
    Generated,
    /// Terminal
    Filed,
}

impl FilingStatus {
    /// Allowed stored transitions: DRAFT -> GENERATED -> FILED
    pub fn can_transition_to(&self, next: FilingStatus) -> bool {
        matches!(
            (self, next),
            (FilingStatus::Draft, FilingStatus::Generated)
                | (FilingStatus::Draft, FilingStatus::Filed)
                | (FilingStatus::Generated, FilingStatus::Filed)
        )
    }
}

/// Return filing record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnFiling {
    pub id: String,
    pub return_type: ReturnType,
    pub period: ReturnPeriod,
    pub gstin: Option<String>,
    pub payload: ReturnPayload,
    pub status: FilingStatus,
    /// Acknowledgement reference number, set when filed
    pub reference: Option<String>,
    pub created_at: NaiveDateTime,
    pub filed_at: Option<NaiveDateTime>,
}

/// Stored e-way bill state; `Expired` is only ever derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EWayBillStatus {
    Generated,
    Cancelled,
    Expired,
}

/// Shipment compliance document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EWayBill {
    pub number: String,
    pub invoice_number: String,
    pub payload: EWayBillPayload,
    pub status: EWayBillStatus,
    pub generated_at: NaiveDateTime,
    pub valid_until: NaiveDateTime,
    pub cancellation_reason: Option<String>,
    pub cancelled_at: Option<NaiveDateTime>,
}

impl EWayBill {
    /// Status as of `now`, deriving `Expired` for generated bills past their window
    pub fn effective_status(&self, now: NaiveDateTime) -> EWayBillStatus {
        match self.status {
            EWayBillStatus::Generated if now > self.valid_until => EWayBillStatus::Expired,
            status => status,
        }
    }
}

/// Kind of state change recorded in the audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    View,
    Export,
    Import,
    Generate,
    File,
    Reconcile,
    Cancel,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AuditAction::Create => "CREATE",
            AuditAction::Update => "UPDATE",
            AuditAction::Delete => "DELETE",
            AuditAction::View => "VIEW",
            AuditAction::Export => "EXPORT",
            AuditAction::Import => "IMPORT",
            AuditAction::Generate => "GENERATE",
            AuditAction::File => "FILE",
            AuditAction::Reconcile => "RECONCILE",
            AuditAction::Cancel => "CANCEL",
        };
        f.write_str(label)
    }
}

/// Entity an audit entry refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    Sale,
    Purchase,
    GstrFiling,
    EwayBill,
    HsnCode,
    Product,
    Reconciliation,
    BusinessConfig,
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EntityType::Sale => "SALE",
            EntityType::Purchase => "PURCHASE",
            EntityType::GstrFiling => "GSTR_FILING",
            EntityType::EwayBill => "EWAY_BILL",
            EntityType::HsnCode => "HSN_CODE",
            EntityType::Product => "PRODUCT",
            EntityType::Reconciliation => "RECONCILIATION",
            EntityType::BusinessConfig => "BUSINESS_CONFIG",
        };
        f.write_str(label)
    }
}

/// Immutable audit trail record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: String,
    pub timestamp: NaiveDateTime,
    pub actor: String,
    pub action: AuditAction,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub description: String,
    pub before: Option<serde_json::Value>,
    pub after: Option<serde_json::Value>,
}

/// Per-item failure inside a batch operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItemError {
    /// Identifier of the failed item (product id or name)
    pub item: String,
    pub message: String,
}

/// Combined result of a batch operation; `success` is false when any item failed
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub success: bool,
    pub count: usize,
    pub errors: Vec<BatchItemError>,
    /// Set when the batch stopped early on a cancellation request
    #[serde(default)]
    pub cancelled: bool,
}

impl BatchOutcome {
    pub fn new() -> Self {
        Self {
            success: true,
            count: 0,
            errors: Vec::new(),
            cancelled: false,
        }
    }

    pub fn record_failure(&mut self, item: impl Into<String>, message: impl Into<String>) {
        self.success = false;
        self.errors.push(BatchItemError {
            item: item.into(),
            message: message.into(),
        });
    }
}

/// Errors raised by a storage backend
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("backend failure: {0}")]
    Backend(String),
    #[error("duplicate key: {0}")]
    Duplicate(String),
    #[error("row not found: {0}")]
    NotFound(String),
}

/// Result type for storage calls
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in the compliance engine
#[derive(Debug, thiserror::Error)]
pub enum GstError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("Storage error during {operation}: {source}")]
    Persistence {
        operation: &'static str,
        source: StoreError,
    },
    #[error("External service error: {0}")]
    ExternalService(String),
    #[error("{return_type} for period {period} has already been filed")]
    DuplicateFiling {
        return_type: ReturnType,
        period: ReturnPeriod,
    },
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl GstError {
    /// Wrap a store failure with the name of the attempted operation, logging it
    pub fn persistence(operation: &'static str, source: StoreError) -> Self {
        tracing::error!(operation, error = %source, "store call failed");
        GstError::Persistence { operation, source }
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        GstError::NotFound {
            entity,
            id: id.into(),
        }
    }
}

/// Result type for engine operations
pub type GstResult<T> = Result<T, GstError>;
