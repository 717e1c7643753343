//! Traits for storage abstraction and extensibility

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::audit::{AuditQuery, ExportFormat};
use crate::classification::analyzer::CatalogEntry;
use crate::returns::ReturnPeriod;
use crate::types::*;

/// Storage abstraction for the compliance engine
///
/// The backing store is assumed to be row-atomic with no transactions spanning
/// calls. Audit entries can only be appended and queried.
#[async_trait]
pub trait GstStore: Send + Sync {
    /// List all products ordered by name
    async fn list_products(&self) -> StoreResult<Vec<Product>>;

    /// List products with no (or a blank) HSN/SAC code, ordered by name
    async fn list_products_without_code(&self) -> StoreResult<Vec<Product>>;

    /// Get a product by ID
    async fn get_product(&self, product_id: &str) -> StoreResult<Option<Product>>;

    /// Overwrite an existing product row
    async fn update_product(&mut self, product: &Product) -> StoreResult<()>;

    /// Get a code from the code table
    async fn get_tax_code(&self, code: &str) -> StoreResult<Option<TaxCode>>;

    /// Insert a code; fails with `StoreError::Duplicate` if it already exists
    async fn insert_tax_code(&mut self, tax_code: &TaxCode) -> StoreResult<()>;

    /// List the code table ordered by code
    async fn list_tax_codes(&self) -> StoreResult<Vec<TaxCode>>;

    /// Sales invoices dated within `[start, end]`
    async fn sales_in_period(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StoreResult<Vec<SaleInvoice>>;

    /// Purchases dated within `[start, end]`
    async fn purchases_in_period(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StoreResult<Vec<Purchase>>;

    /// Supplier-reported (GSTR-2A) invoices dated within `[start, end]`
    async fn counterparty_invoices(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StoreResult<Vec<CounterpartyInvoice>>;

    /// Insert a new filing record
    async fn insert_filing(&mut self, filing: &ReturnFiling) -> StoreResult<()>;

    /// Overwrite an existing filing record
    async fn update_filing(&mut self, filing: &ReturnFiling) -> StoreResult<()>;

    /// All filings of one type for one period
    async fn find_filings(
        &self,
        return_type: ReturnType,
        period: &ReturnPeriod,
    ) -> StoreResult<Vec<ReturnFiling>>;

    /// Insert a newly issued e-way bill
    async fn insert_eway_bill(&mut self, bill: &EWayBill) -> StoreResult<()>;

    /// Get an e-way bill by number
    async fn get_eway_bill(&self, number: &str) -> StoreResult<Option<EWayBill>>;

    /// Overwrite an existing e-way bill
    async fn update_eway_bill(&mut self, bill: &EWayBill) -> StoreResult<()>;

    /// Append an audit entry
    async fn append_audit(&mut self, entry: &AuditEntry) -> StoreResult<()>;

    /// Audit entries matching every filter in `query`, newest first
    async fn query_audit(&self, query: &AuditQuery) -> StoreResult<Vec<AuditEntry>>;
}

/// Renders audit entries into a file format (CSV, spreadsheet, PDF)
pub trait AuditExporter: Send + Sync {
    /// Formats this exporter can produce
    fn supports(&self, format: ExportFormat) -> bool;

    /// Render the already-filtered entries
    fn export(&self, entries: &[AuditEntry], format: ExportFormat) -> GstResult<Vec<u8>>;
}

/// Searchable source of classification codes for the inventory analyzer
pub trait HsnCatalog: Send + Sync {
    /// Entries whose description or category mentions `term` (already lower-cased)
    fn search(&self, term: &str) -> Vec<CatalogEntry>;
}
