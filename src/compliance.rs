//! Main compliance orchestrator that coordinates the GST services

use bigdecimal::BigDecimal;
use chrono::NaiveDate;

use crate::audit::{AuditQuery, AuditTrail, ExportFormat};
use crate::classification::analyzer::AnalysisReport;
use crate::classification::mapper::{
    AutoMapOutcome, CodeAssignment, HsnMapper, MappingExport, MappingReport, MappingStats,
};
use crate::classification::registry::{Classification, CodeRegistry};
use crate::classification::{validate_code, InventoryAnalyzer, TaxCodeService};
use crate::config::GstConfig;
use crate::eway::{EWayBillDecision, EWayBillManager, EWayBillRequest};
use crate::reconciliation::{
    financial_impact, Discrepancy, DiscrepancyKind, FinancialImpact, ReconciliationEngine,
    ReconciliationReport,
};
use crate::returns::{
    ComplianceStatus, DisplayStatus, FilingReceipt, Gstr1Payload, Gstr3bPayload, ReturnPayload,
    ReturnPeriod, ReturnService, ReturnSummary,
};
use crate::tax::gst::{self, GstCalculator, PurchaseDraft, ReverseCharge, SaleInvoiceDraft, TaxSplit};
use crate::tax::gstin;
use crate::traits::*;
use crate::types::*;
use crate::utils::progress::BatchControl;

/// Entry point for the interactive layer: one instance per business
pub struct GstCompliance<S: GstStore> {
    config: GstConfig,
    calculator: GstCalculator,
    codes: TaxCodeService<S>,
    mapper: HsnMapper<S>,
    analyzer: InventoryAnalyzer<S>,
    returns: ReturnService<S>,
    reconciler: ReconciliationEngine<S>,
    eway: EWayBillManager<S>,
    audit: AuditTrail<S>,
}

impl<S: GstStore + Clone> GstCompliance<S> {
    /// Create the engine with the built-in beverage registry
    pub fn new(storage: S, config: GstConfig) -> GstResult<Self> {
        Self::with_registry(storage, config, CodeRegistry::beverages())
    }

    /// Create the engine with a custom classification registry
    pub fn with_registry(storage: S, config: GstConfig, registry: CodeRegistry) -> GstResult<Self> {
        config.validate()?;
        let actor = config.actor.clone();

        Ok(Self {
            calculator: GstCalculator::new(config.business_gstin.clone()),
            codes: TaxCodeService::new(storage.clone(), actor.clone()),
            mapper: HsnMapper::new(storage.clone(), registry.clone(), actor.clone()),
            analyzer: InventoryAnalyzer::new(storage.clone(), registry),
            returns: ReturnService::new(storage.clone(), config.clone()),
            reconciler: ReconciliationEngine::new(storage.clone(), &config),
            eway: EWayBillManager::new(storage.clone(), &config),
            audit: AuditTrail::new(storage, actor),
            config,
        })
    }

    pub fn config(&self) -> &GstConfig {
        &self.config
    }

    // GSTIN checks
    pub fn validate_gstin(&self, value: &str) -> bool {
        gstin::validate_format(value)
    }

    pub fn state_code<'a>(&self, value: &'a str) -> Option<&'a str> {
        gstin::state_code(value)
    }

    pub fn is_inter_state(&self, seller: Option<&str>, buyer: Option<&str>) -> bool {
        gstin::is_inter_state(seller, buyer)
    }

    // Tax calculation
    pub fn calculate(&self, amount: &BigDecimal, rate: &BigDecimal, inter_state: bool) -> TaxSplit {
        gst::calculate(amount, rate, inter_state)
    }

    pub fn reverse_charge(&self, amount: &BigDecimal, rate: &BigDecimal) -> ReverseCharge {
        gst::reverse_charge(amount, rate)
    }

    pub fn aggregate_itc(&self, purchases: &[Purchase]) -> BigDecimal {
        gst::aggregate_itc(purchases)
    }

    /// Price a sales invoice, deciding IGST vs CGST/SGST from the GSTINs
    pub fn price_invoice(&self, draft: SaleInvoiceDraft) -> GstResult<SaleInvoice> {
        self.calculator.price_invoice(draft)
    }

    pub fn price_purchase(&self, draft: PurchaseDraft) -> GstResult<Purchase> {
        self.calculator.price_purchase(draft)
    }

    // Code table
    pub fn validate_code(&self, code: &str, kind: CodeKind) -> bool {
        validate_code(code, kind)
    }

    pub async fn get_tax_rate(&self, code: &str) -> GstResult<BigDecimal> {
        self.codes.get_tax_rate(code).await
    }

    pub async fn add_code(&mut self, data: NewTaxCode) -> GstResult<TaxCode> {
        self.codes.add_code(data).await
    }

    pub async fn get_all_codes(&self) -> GstResult<Vec<TaxCode>> {
        self.codes.get_all_codes().await
    }

    // Classification and mapping
    pub fn classify(
        &self,
        category: Option<&str>,
        product_name: &str,
        product_type: Option<&str>,
    ) -> Classification {
        self.mapper
            .registry()
            .classify(category, product_name, product_type)
    }

    pub async fn get_products_without_code(&self) -> GstResult<Vec<Product>> {
        self.mapper.get_products_without_code().await
    }

    pub async fn auto_map(&mut self, control: &BatchControl) -> GstResult<AutoMapOutcome> {
        self.mapper.auto_map(control).await
    }

    pub async fn mapping_stats(&self) -> GstResult<MappingStats> {
        self.mapper.mapping_stats().await
    }

    pub async fn update_product_code(
        &mut self,
        product_id: &str,
        code: &str,
        rate: BigDecimal,
    ) -> GstResult<Product> {
        self.mapper.update_product_code(product_id, code, rate).await
    }

    pub async fn bulk_update(
        &mut self,
        assignments: Vec<CodeAssignment>,
        control: &BatchControl,
    ) -> BatchOutcome {
        self.mapper.bulk_update(assignments, control).await
    }

    pub async fn generate_mapping_report(&self) -> GstResult<MappingReport> {
        self.mapper.generate_mapping_report().await
    }

    pub async fn export_mapping_report(&mut self) -> GstResult<MappingExport> {
        self.mapper.export_mapping_report().await
    }

    /// Suggest codes for every product in the inventory
    pub async fn analyze_inventory(&self, control: &BatchControl) -> GstResult<AnalysisReport> {
        self.analyzer.generate_report(control).await
    }

    // Returns
    pub async fn generate_gstr1(&self, period: ReturnPeriod) -> GstResult<Gstr1Payload> {
        self.returns.generate_gstr1(period).await
    }

    pub async fn generate_gstr3b(&self, period: ReturnPeriod) -> GstResult<Gstr3bPayload> {
        self.returns.generate_gstr3b(period).await
    }

    pub async fn prepare_return(
        &mut self,
        return_type: ReturnType,
        period: ReturnPeriod,
    ) -> GstResult<ReturnFiling> {
        self.returns.prepare_return(return_type, period).await
    }

    pub async fn file_gstr(
        &mut self,
        return_type: ReturnType,
        period: ReturnPeriod,
        payload: ReturnPayload,
    ) -> GstResult<FilingReceipt> {
        self.returns.file_gstr(return_type, period, payload).await
    }

    pub async fn return_status(
        &self,
        return_type: ReturnType,
        period: ReturnPeriod,
        today: NaiveDate,
    ) -> GstResult<DisplayStatus> {
        self.returns.display_status(return_type, period, today).await
    }

    pub async fn check_compliance(&self, today: NaiveDate) -> GstResult<ComplianceStatus> {
        self.returns.check_compliance(today).await
    }

    pub async fn reconcile_summary(&self, period: ReturnPeriod) -> GstResult<ReturnSummary> {
        self.returns.reconcile_summary(period).await
    }

    // Reconciliation
    pub async fn reconcile(
        &mut self,
        period: ReturnPeriod,
        control: &BatchControl,
    ) -> GstResult<ReconciliationReport> {
        self.reconciler.reconcile(period, control).await
    }

    pub fn financial_impact(
        &self,
        discrepancies: &[Discrepancy],
        kind: Option<DiscrepancyKind>,
    ) -> FinancialImpact {
        financial_impact(discrepancies, kind).rounded(self.config.money_scale)
    }

    // E-way bills
    pub async fn generate_eway_bill(
        &mut self,
        request: EWayBillRequest,
    ) -> GstResult<EWayBillDecision> {
        self.eway.generate(request).await
    }

    pub async fn cancel_eway_bill(&mut self, number: &str, reason: &str) -> GstResult<EWayBill> {
        self.eway.cancel(number, reason).await
    }

    pub async fn eway_bill_status(&self, number: &str) -> GstResult<EWayBillStatus> {
        self.eway.status(number).await
    }

    // Audit trail
    pub async fn audit_log(&self, query: &AuditQuery) -> GstResult<Vec<AuditEntry>> {
        self.audit.query(query).await
    }

    pub async fn export_audit_log(
        &mut self,
        query: &AuditQuery,
        format: ExportFormat,
        exporter: &dyn AuditExporter,
    ) -> GstResult<Vec<u8>> {
        self.audit.export(query, format, exporter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::memory_storage::MemoryStorage;

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = GstConfig::default();
        config.eway_validity_hours = 0;

        assert!(matches!(
            GstCompliance::new(MemoryStorage::new(), config),
            Err(GstError::Validation(_))
        ));
    }

    #[test]
    fn test_classify_uses_registry() {
        let engine = GstCompliance::new(MemoryStorage::new(), GstConfig::default()).unwrap();
        let classification = engine.classify(Some("tropical"), "Mango Cooler", Some("tropical"));

        assert_eq!(classification.key, "tropical");
        assert_eq!(classification.rate, BigDecimal::from(12));
    }

    #[tokio::test]
    async fn test_unknown_code_rate_is_not_found() {
        let engine = GstCompliance::new(MemoryStorage::new(), GstConfig::default()).unwrap();

        assert!(matches!(
            engine.get_tax_rate("9999").await,
            Err(GstError::NotFound { entity: "Tax code", .. })
        ));
    }
}
