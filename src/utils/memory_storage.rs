//! In-memory storage implementation for testing

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::audit::AuditQuery;
use crate::returns::ReturnPeriod;
use crate::traits::*;
use crate::types::*;

fn read<T>(lock: &RwLock<T>) -> StoreResult<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
}

fn write<T>(lock: &RwLock<T>) -> StoreResult<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
}

fn in_range(date: NaiveDate, start: NaiveDate, end: NaiveDate) -> bool {
    date >= start && date <= end
}

/// Writes the store should reject, for exercising failure paths
#[derive(Debug, Default)]
struct Faults {
    product_updates: HashSet<String>,
    /// Codes whose insert reports a duplicate, as if another writer got there first
    tax_code_races: HashSet<String>,
    audit_appends: bool,
}

/// In-memory storage implementation for testing and development.
///
/// Clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    products: Arc<RwLock<HashMap<String, Product>>>,
    tax_codes: Arc<RwLock<HashMap<String, TaxCode>>>,
    sales: Arc<RwLock<Vec<SaleInvoice>>>,
    purchases: Arc<RwLock<Vec<Purchase>>>,
    counterparty: Arc<RwLock<Vec<CounterpartyInvoice>>>,
    filings: Arc<RwLock<HashMap<String, ReturnFiling>>>,
    eway_bills: Arc<RwLock<HashMap<String, EWayBill>>>,
    audit: Arc<RwLock<Vec<AuditEntry>>>,
    faults: Arc<RwLock<Faults>>,
}

impl MemoryStorage {
    /// Create a new memory storage instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_product(&self, product: Product) -> StoreResult<()> {
        write(&self.products)?.insert(product.id.clone(), product);
        Ok(())
    }

    pub fn add_tax_code(&self, tax_code: TaxCode) -> StoreResult<()> {
        write(&self.tax_codes)?.insert(tax_code.code.clone(), tax_code);
        Ok(())
    }

    pub fn add_sale(&self, sale: SaleInvoice) -> StoreResult<()> {
        write(&self.sales)?.push(sale);
        Ok(())
    }

    pub fn add_purchase(&self, purchase: Purchase) -> StoreResult<()> {
        write(&self.purchases)?.push(purchase);
        Ok(())
    }

    /// Record an invoice as reported by the supplier in GSTR-2A
    pub fn add_counterparty_invoice(&self, invoice: CounterpartyInvoice) -> StoreResult<()> {
        write(&self.counterparty)?.push(invoice);
        Ok(())
    }

    /// Every audit entry in append order
    pub fn audit_entries(&self) -> StoreResult<Vec<AuditEntry>> {
        Ok(read(&self.audit)?.clone())
    }

    /// Reject updates to this product with a backend error
    pub fn fail_product_update(&self, product_id: impl Into<String>) -> StoreResult<()> {
        write(&self.faults)?.product_updates.insert(product_id.into());
        Ok(())
    }

    /// Make inserts of `code` fail with `StoreError::Duplicate` without storing it
    pub fn fail_tax_code_insert_with_duplicate(&self, code: impl Into<String>) -> StoreResult<()> {
        write(&self.faults)?.tax_code_races.insert(code.into());
        Ok(())
    }

    /// Reject every audit append with a backend error
    pub fn fail_audit_appends(&self, fail: bool) -> StoreResult<()> {
        write(&self.faults)?.audit_appends = fail;
        Ok(())
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) -> StoreResult<()> {
        write(&self.products)?.clear();
        write(&self.tax_codes)?.clear();
        write(&self.sales)?.clear();
        write(&self.purchases)?.clear();
        write(&self.counterparty)?.clear();
        write(&self.filings)?.clear();
        write(&self.eway_bills)?.clear();
        write(&self.audit)?.clear();
        *write(&self.faults)? = Faults::default();
        Ok(())
    }
}

#[async_trait]
impl GstStore for MemoryStorage {
    async fn list_products(&self) -> StoreResult<Vec<Product>> {
        let mut products: Vec<Product> = read(&self.products)?.values().cloned().collect();
        products.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(products)
    }

    async fn list_products_without_code(&self) -> StoreResult<Vec<Product>> {
        let mut products = self.list_products().await?;
        products.retain(|product| !product.is_mapped());
        Ok(products)
    }

    async fn get_product(&self, product_id: &str) -> StoreResult<Option<Product>> {
        Ok(read(&self.products)?.get(product_id).cloned())
    }

    async fn update_product(&mut self, product: &Product) -> StoreResult<()> {
        if read(&self.faults)?.product_updates.contains(&product.id) {
            return Err(StoreError::Backend(format!(
                "write rejected for product {}",
                product.id
            )));
        }

        let mut products = write(&self.products)?;
        match products.get_mut(&product.id) {
            Some(existing) => {
                *existing = product.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(product.id.clone())),
        }
    }

    async fn get_tax_code(&self, code: &str) -> StoreResult<Option<TaxCode>> {
        Ok(read(&self.tax_codes)?.get(code).cloned())
    }

    async fn insert_tax_code(&mut self, tax_code: &TaxCode) -> StoreResult<()> {
        if read(&self.faults)?.tax_code_races.contains(&tax_code.code) {
            return Err(StoreError::Duplicate(tax_code.code.clone()));
        }

        let mut codes = write(&self.tax_codes)?;
        if codes.contains_key(&tax_code.code) {
            return Err(StoreError::Duplicate(tax_code.code.clone()));
        }
        codes.insert(tax_code.code.clone(), tax_code.clone());
        Ok(())
    }

    async fn list_tax_codes(&self) -> StoreResult<Vec<TaxCode>> {
        let mut codes: Vec<TaxCode> = read(&self.tax_codes)?.values().cloned().collect();
        codes.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(codes)
    }

    async fn sales_in_period(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StoreResult<Vec<SaleInvoice>> {
        Ok(read(&self.sales)?
            .iter()
            .filter(|sale| in_range(sale.invoice_date, start, end))
            .cloned()
            .collect())
    }

    async fn purchases_in_period(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StoreResult<Vec<Purchase>> {
        Ok(read(&self.purchases)?
            .iter()
            .filter(|purchase| in_range(purchase.invoice_date, start, end))
            .cloned()
            .collect())
    }

    async fn counterparty_invoices(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StoreResult<Vec<CounterpartyInvoice>> {
        Ok(read(&self.counterparty)?
            .iter()
            .filter(|invoice| in_range(invoice.invoice_date, start, end))
            .cloned()
            .collect())
    }

    async fn insert_filing(&mut self, filing: &ReturnFiling) -> StoreResult<()> {
        let mut filings = write(&self.filings)?;
        if filings.contains_key(&filing.id) {
            return Err(StoreError::Duplicate(filing.id.clone()));
        }
        filings.insert(filing.id.clone(), filing.clone());
        Ok(())
    }

    async fn update_filing(&mut self, filing: &ReturnFiling) -> StoreResult<()> {
        let mut filings = write(&self.filings)?;
        match filings.get_mut(&filing.id) {
            Some(existing) => {
                *existing = filing.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(filing.id.clone())),
        }
    }

    async fn find_filings(
        &self,
        return_type: ReturnType,
        period: &ReturnPeriod,
    ) -> StoreResult<Vec<ReturnFiling>> {
        let mut filings: Vec<ReturnFiling> = read(&self.filings)?
            .values()
            .filter(|filing| filing.return_type == return_type && filing.period == *period)
            .cloned()
            .collect();
        filings.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(filings)
    }

    async fn insert_eway_bill(&mut self, bill: &EWayBill) -> StoreResult<()> {
        let mut bills = write(&self.eway_bills)?;
        if bills.contains_key(&bill.number) {
            return Err(StoreError::Duplicate(bill.number.clone()));
        }
        bills.insert(bill.number.clone(), bill.clone());
        Ok(())
    }

    async fn get_eway_bill(&self, number: &str) -> StoreResult<Option<EWayBill>> {
        Ok(read(&self.eway_bills)?.get(number).cloned())
    }

    async fn update_eway_bill(&mut self, bill: &EWayBill) -> StoreResult<()> {
        let mut bills = write(&self.eway_bills)?;
        match bills.get_mut(&bill.number) {
            Some(existing) => {
                *existing = bill.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(bill.number.clone())),
        }
    }

    async fn append_audit(&mut self, entry: &AuditEntry) -> StoreResult<()> {
        if read(&self.faults)?.audit_appends {
            return Err(StoreError::Backend("audit table unavailable".to_string()));
        }
        write(&self.audit)?.push(entry.clone());
        Ok(())
    }

    async fn query_audit(&self, query: &AuditQuery) -> StoreResult<Vec<AuditEntry>> {
        let mut entries: Vec<AuditEntry> = read(&self.audit)?
            .iter()
            .filter(|entry| query.matches(entry))
            .cloned()
            .collect();
        // newest first; equal timestamps come out in reverse append order
        entries.reverse();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;

    #[tokio::test]
    async fn test_products_without_code_sorted_by_name() {
        let storage = MemoryStorage::new();
        storage
            .add_product(Product::new("p2".to_string(), "Zesty Lime".to_string(), None, None))
            .unwrap();
        storage
            .add_product(Product::new("p1".to_string(), "Apple Fizz".to_string(), None, None))
            .unwrap();
        let mut mapped = Product::new("p3".to_string(), "Berry Blast".to_string(), None, None);
        mapped.assign_code("2009".to_string(), BigDecimal::from(12));
        storage.add_product(mapped).unwrap();

        let unmapped = storage.list_products_without_code().await.unwrap();
        let names: Vec<_> = unmapped.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Apple Fizz", "Zesty Lime"]);
    }

    #[tokio::test]
    async fn test_tax_code_insert_rejects_duplicate() {
        let mut storage = MemoryStorage::new();
        let code = TaxCode {
            code: "2009".to_string(),
            description: "Fruit juices".to_string(),
            rate: BigDecimal::from(12),
            kind: CodeKind::Hsn,
            category: "Beverages".to_string(),
            created_at: chrono::Utc::now().naive_utc(),
        };

        storage.insert_tax_code(&code).await.unwrap();
        assert_eq!(
            storage.insert_tax_code(&code).await,
            Err(StoreError::Duplicate("2009".to_string()))
        );
    }

    #[tokio::test]
    async fn test_injected_product_fault() {
        let mut storage = MemoryStorage::new();
        let product = Product::new("p1".to_string(), "Mango Cooler".to_string(), None, None);
        storage.add_product(product.clone()).unwrap();
        storage.fail_product_update("p1").unwrap();

        assert!(matches!(
            storage.update_product(&product).await,
            Err(StoreError::Backend(_))
        ));
    }

    #[tokio::test]
    async fn test_update_missing_product() {
        let mut storage = MemoryStorage::new();
        let product = Product::new("ghost".to_string(), "Ghost".to_string(), None, None);

        assert_eq!(
            storage.update_product(&product).await,
            Err(StoreError::NotFound("ghost".to_string()))
        );
    }
}
