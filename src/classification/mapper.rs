//! Assigning classification codes to inventory products

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::audit::{AuditRecord, AuditTrail};
use crate::classification::codes::validate_code;
use crate::classification::registry::CodeRegistry;
use crate::tax::gst::validate_rate;
use crate::traits::*;
use crate::types::*;
use crate::utils::progress::BatchControl;

/// Code-table category for codes the registry seeds
pub const REGISTRY_CODE_CATEGORY: &str = "Beverages";

/// Column order of the exported mapping report
pub const MAPPING_REPORT_HEADER: [&str; 7] = [
    "Product Name",
    "SKU/Barcode",
    "Category",
    "Type",
    "HSN Code",
    "Tax Rate(%)",
    "Status",
];

/// One product mapped by an auto-map run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappedProduct {
    pub product_id: String,
    pub product: String,
    pub sku: Option<String>,
    pub code: String,
    pub rate: BigDecimal,
    pub description: String,
}

/// Result of an auto-map run
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AutoMapOutcome {
    /// False when any product failed
    pub success: bool,
    pub mapped: usize,
    pub errors: Vec<BatchItemError>,
    pub details: Vec<MappedProduct>,
    /// The run stopped early on request; unvisited products stay unmapped
    pub cancelled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingStats {
    pub total: usize,
    pub mapped: usize,
    pub unmapped: usize,
    /// `round(mapped / total * 100)`, 0 for an empty inventory
    pub percentage: u32,
}

impl MappingStats {
    pub fn from_counts(total: usize, mapped: usize) -> Self {
        let percentage = if total == 0 {
            0
        } else {
            ((mapped * 100 + total / 2) / total) as u32
        };
        Self {
            total,
            mapped,
            unmapped: total - mapped,
            percentage,
        }
    }
}

/// Manual code assignment for one product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeAssignment {
    pub product_id: String,
    pub code: String,
    pub rate: BigDecimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MappingStatus {
    Mapped,
    Unmapped,
}

impl MappingStatus {
    fn as_str(&self) -> &'static str {
        match self {
            MappingStatus::Mapped => "Mapped",
            MappingStatus::Unmapped => "Unmapped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingReportRow {
    pub id: String,
    pub name: String,
    pub sku: Option<String>,
    pub category: Option<String>,
    pub product_type: Option<String>,
    pub code: Option<String>,
    pub rate: Option<BigDecimal>,
    pub status: MappingStatus,
}

/// Per-product mapping state, ordered by product name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingReport {
    pub generated_at: NaiveDateTime,
    pub products: Vec<MappingReportRow>,
}

/// Rendered mapping report
#[derive(Debug, Clone, PartialEq)]
pub struct MappingExport {
    pub file_name: String,
    pub content: Vec<u8>,
}

/// `hsn-mapping-report-YYYY-MM-DD.csv`
pub fn report_file_name(date: NaiveDate) -> String {
    format!("hsn-mapping-report-{}.csv", date.format("%Y-%m-%d"))
}

/// Render the report as CSV with every field quoted
pub fn render_mapping_csv(report: &MappingReport) -> GstResult<Vec<u8>> {
    let write_error = |e: csv::Error| {
        GstError::ExternalService(format!("Failed to write mapping report: {e}"))
    };

    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .from_writer(Vec::new());

    writer
        .write_record(MAPPING_REPORT_HEADER)
        .map_err(write_error)?;
    for row in &report.products {
        let rate = row.rate.as_ref().map(ToString::to_string).unwrap_or_default();
        writer
            .write_record([
                row.name.as_str(),
                row.sku.as_deref().unwrap_or_default(),
                row.category.as_deref().unwrap_or_default(),
                row.product_type.as_deref().unwrap_or_default(),
                row.code.as_deref().unwrap_or_default(),
                rate.as_str(),
                row.status.as_str(),
            ])
            .map_err(write_error)?;
    }

    writer
        .into_inner()
        .map_err(|e| GstError::ExternalService(format!("Failed to flush mapping report: {e}")))
}

fn validate_assignment(code: &str, rate: &BigDecimal) -> GstResult<()> {
    if !validate_code(code, CodeKind::Hsn) && !validate_code(code, CodeKind::Sac) {
        return Err(GstError::Validation(format!(
            "'{code}' is not a valid HSN or SAC code"
        )));
    }
    validate_rate(rate)
}

/// Maps inventory products to classification codes
pub struct HsnMapper<S: GstStore> {
    storage: S,
    audit: AuditTrail<S>,
    registry: CodeRegistry,
}

impl<S: GstStore + Clone> HsnMapper<S> {
    pub fn new(storage: S, registry: CodeRegistry, actor: impl Into<String>) -> Self {
        Self {
            audit: AuditTrail::new(storage.clone(), actor),
            storage,
            registry,
        }
    }

    pub fn registry(&self) -> &CodeRegistry {
        &self.registry
    }

    /// Products without a (non-blank) code, ordered by name
    pub async fn get_products_without_code(&self) -> GstResult<Vec<Product>> {
        self.storage
            .list_products_without_code()
            .await
            .map_err(|e| GstError::persistence("list unmapped products", e))
    }

    /// Insert every code the registry can assign that the code table lacks.
    ///
    /// A duplicate-key failure means another writer inserted the code first and
    /// is ignored. Other failures are logged and skipped; the mapping that
    /// follows does not depend on the code table.
    pub async fn ensure_codes_exist(&mut self) -> usize {
        let mut inserted = 0;

        for new_code in self.registry.required_codes(REGISTRY_CODE_CATEGORY) {
            match self.storage.get_tax_code(&new_code.code).await {
                Ok(Some(_)) => continue,
                Ok(None) => {}
                Err(error) => {
                    warn!(code = %new_code.code, error = %error, "could not check code table");
                    continue;
                }
            }

            let tax_code = TaxCode {
                code: new_code.code,
                description: new_code.description,
                rate: new_code.rate,
                kind: new_code.kind,
                category: new_code.category,
                created_at: chrono::Utc::now().naive_utc(),
            };

            match self.storage.insert_tax_code(&tax_code).await {
                Ok(()) => {
                    inserted += 1;
                    self.audit
                        .record_after_commit(
                            AuditRecord::new(
                                AuditAction::Create,
                                EntityType::HsnCode,
                                &tax_code.code,
                                format!("Seeded code {} from the registry", tax_code.code),
                            )
                            .after(&tax_code),
                        )
                        .await;
                }
                Err(StoreError::Duplicate(_)) => {
                    debug!(code = %tax_code.code, "code inserted concurrently");
                }
                Err(error) => {
                    warn!(code = %tax_code.code, error = %error, "could not insert code");
                }
            }
        }

        inserted
    }

    /// Classify and persist every unmapped product.
    ///
    /// Each product is written independently: a failed write is recorded in
    /// `errors` and the batch moves on. Re-running after a clean run maps nothing.
    pub async fn auto_map(&mut self, control: &BatchControl) -> GstResult<AutoMapOutcome> {
        let products = self.get_products_without_code().await?;
        let mut outcome = AutoMapOutcome {
            success: true,
            ..AutoMapOutcome::default()
        };

        if products.is_empty() {
            info!("all products already have a classification code");
            return Ok(outcome);
        }

        self.ensure_codes_exist().await;

        let total = products.len();
        for (index, product) in products.into_iter().enumerate() {
            if control.is_cancelled() {
                warn!(done = index, total, "auto-map cancelled");
                outcome.cancelled = true;
                break;
            }

            let classification = self.registry.classify_product(&product);
            let before = product.clone();
            let mut updated = product;
            updated.assign_code(classification.code.clone(), classification.rate.clone());

            match self.storage.update_product(&updated).await {
                Ok(()) => {
                    outcome.mapped += 1;
                    self.audit
                        .record_after_commit(
                            AuditRecord::new(
                                AuditAction::Update,
                                EntityType::Product,
                                &updated.id,
                                format!(
                                    "Auto-mapped {} to {} at {}% ({})",
                                    updated.name,
                                    classification.code,
                                    classification.rate,
                                    classification.rule
                                ),
                            )
                            .before(&before)
                            .after(&updated),
                        )
                        .await;
                    outcome.details.push(MappedProduct {
                        product_id: updated.id.clone(),
                        product: updated.name.clone(),
                        sku: updated.sku.clone(),
                        code: classification.code,
                        rate: classification.rate,
                        description: classification.description,
                    });
                }
                Err(error) => {
                    warn!(product = %updated.id, error = %error, "product mapping failed");
                    outcome.success = false;
                    outcome.errors.push(BatchItemError {
                        item: updated.id.clone(),
                        message: format!("{}: {error}", updated.name),
                    });
                }
            }

            control.report("auto_map", index + 1, total, Some(&updated.name));
        }

        info!(
            mapped = outcome.mapped,
            failed = outcome.errors.len(),
            cancelled = outcome.cancelled,
            "auto-map finished"
        );
        Ok(outcome)
    }

    pub async fn mapping_stats(&self) -> GstResult<MappingStats> {
        let products = self
            .storage
            .list_products()
            .await
            .map_err(|e| GstError::persistence("list products", e))?;
        let mapped = products.iter().filter(|product| product.is_mapped()).count();
        Ok(MappingStats::from_counts(products.len(), mapped))
    }

    /// Manually set one product's code and rate
    pub async fn update_product_code(
        &mut self,
        product_id: &str,
        code: &str,
        rate: BigDecimal,
    ) -> GstResult<Product> {
        let code = code.trim();
        validate_assignment(code, &rate)?;

        let before = self
            .storage
            .get_product(product_id)
            .await
            .map_err(|e| GstError::persistence("get product", e))?
            .ok_or_else(|| GstError::not_found("Product", product_id))?;

        let mut product = before.clone();
        product.assign_code(code.to_string(), rate);
        self.storage
            .update_product(&product)
            .await
            .map_err(|e| GstError::persistence("update product", e))?;

        self.audit
            .record_after_commit(
                AuditRecord::new(
                    AuditAction::Update,
                    EntityType::Product,
                    &product.id,
                    format!("Assigned code {code} to {}", product.name),
                )
                .before(&before)
                .after(&product),
            )
            .await;

        Ok(product)
    }

    /// Apply many assignments; each one succeeds or fails on its own
    pub async fn bulk_update(
        &mut self,
        assignments: Vec<CodeAssignment>,
        control: &BatchControl,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::new();
        let total = assignments.len();

        for (index, assignment) in assignments.into_iter().enumerate() {
            if control.is_cancelled() {
                warn!(done = index, total, "bulk update cancelled");
                outcome.cancelled = true;
                break;
            }

            match self
                .update_product_code(&assignment.product_id, &assignment.code, assignment.rate)
                .await
            {
                Ok(_) => outcome.count += 1,
                Err(error) => outcome.record_failure(&assignment.product_id, error.to_string()),
            }

            control.report("bulk_update", index + 1, total, Some(&assignment.product_id));
        }

        info!(
            updated = outcome.count,
            failed = outcome.errors.len(),
            cancelled = outcome.cancelled,
            "bulk code update finished"
        );
        outcome
    }

    pub async fn generate_mapping_report(&self) -> GstResult<MappingReport> {
        let products = self
            .storage
            .list_products()
            .await
            .map_err(|e| GstError::persistence("list products", e))?;

        Ok(MappingReport {
            generated_at: chrono::Utc::now().naive_utc(),
            products: products
                .into_iter()
                .map(|product| MappingReportRow {
                    status: if product.is_mapped() {
                        MappingStatus::Mapped
                    } else {
                        MappingStatus::Unmapped
                    },
                    id: product.id,
                    name: product.name,
                    sku: product.sku,
                    category: product.category,
                    product_type: product.product_type,
                    code: product.tax_code,
                    rate: product.rate,
                })
                .collect(),
        })
    }

    /// Mapping report as a CSV file
    pub async fn export_mapping_report(&mut self) -> GstResult<MappingExport> {
        let report = self.generate_mapping_report().await?;
        let content = render_mapping_csv(&report)?;
        let file_name = report_file_name(report.generated_at.date());

        self.audit
            .record_after_commit(AuditRecord::new(
                AuditAction::Export,
                EntityType::Product,
                &file_name,
                format!("Exported mapping report for {} products", report.products.len()),
            ))
            .await;

        Ok(MappingExport { file_name, content })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_percentage_rounds() {
        assert_eq!(MappingStats::from_counts(0, 0).percentage, 0);
        assert_eq!(MappingStats::from_counts(3, 2).percentage, 67);
        assert_eq!(MappingStats::from_counts(8, 1).percentage, 13); // 12.5 rounds up
        assert_eq!(MappingStats::from_counts(4, 4).unmapped, 0);
    }

    #[test]
    fn test_report_file_name() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(report_file_name(date), "hsn-mapping-report-2024-03-07.csv");
    }

    #[test]
    fn test_csv_quotes_every_field() {
        let report = MappingReport {
            generated_at: NaiveDate::from_ymd_opt(2024, 3, 7)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            products: vec![
                MappingReportRow {
                    id: "p1".to_string(),
                    name: "Mango Cooler".to_string(),
                    sku: Some("8901".to_string()),
                    category: Some("Juices".to_string()),
                    product_type: Some("tropical".to_string()),
                    code: Some("2009".to_string()),
                    rate: Some(BigDecimal::from(12)),
                    status: MappingStatus::Mapped,
                },
                MappingReportRow {
                    id: "p2".to_string(),
                    name: "Ice \"Tea\"".to_string(),
                    sku: None,
                    category: None,
                    product_type: None,
                    code: None,
                    rate: None,
                    status: MappingStatus::Unmapped,
                },
            ],
        };

        let text = String::from_utf8(render_mapping_csv(&report).unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            r#""Product Name","SKU/Barcode","Category","Type","HSN Code","Tax Rate(%)","Status""#
        );
        assert_eq!(
            lines[1],
            r#""Mango Cooler","8901","Juices","tropical","2009","12","Mapped""#
        );
        assert_eq!(lines[2], r#""Ice ""Tea""","","","","","","Unmapped""#);
    }

    #[test]
    fn test_assignment_validation() {
        assert!(validate_assignment("2009", &BigDecimal::from(12)).is_ok());
        assert!(validate_assignment("996331", &BigDecimal::from(18)).is_ok());
        assert!(validate_assignment("20A9", &BigDecimal::from(12)).is_err());
        assert!(validate_assignment("2009", &BigDecimal::from(30)).is_err());
    }
}
