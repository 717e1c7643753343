//! HSN/SAC code table

use bigdecimal::BigDecimal;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

use crate::audit::{AuditRecord, AuditTrail};
use crate::tax::gst::validate_rate;
use crate::traits::*;
use crate::types::*;

static HSN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{4}([0-9]{2})?([0-9]{2})?$").expect("Invalid HSN regex"));
static SAC_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{6}$").expect("Invalid SAC regex"));

/// HSN codes are 4, 6 or 8 digits; SAC codes are 6 digits
pub fn validate_code(code: &str, kind: CodeKind) -> bool {
    match kind {
        CodeKind::Hsn => HSN_PATTERN.is_match(code),
        CodeKind::Sac => SAC_PATTERN.is_match(code),
    }
}

/// Reads and extends the persisted code table
pub struct TaxCodeService<S: GstStore> {
    storage: S,
    audit: AuditTrail<S>,
}

impl<S: GstStore + Clone> TaxCodeService<S> {
    pub fn new(storage: S, actor: impl Into<String>) -> Self {
        Self {
            audit: AuditTrail::new(storage.clone(), actor),
            storage,
        }
    }

    pub async fn get_code(&self, code: &str) -> GstResult<Option<TaxCode>> {
        self.storage
            .get_tax_code(code)
            .await
            .map_err(|e| GstError::persistence("get tax code", e))
    }

    /// Rate of a code in the table
    pub async fn get_tax_rate(&self, code: &str) -> GstResult<BigDecimal> {
        self.get_code(code)
            .await?
            .map(|tax_code| tax_code.rate)
            .ok_or_else(|| GstError::not_found("Tax code", code))
    }

    /// Add a code after checking its shape and rate
    pub async fn add_code(&mut self, data: NewTaxCode) -> GstResult<TaxCode> {
        let code = data.code.trim().to_string();
        if !validate_code(&code, data.kind) {
            return Err(GstError::Validation(format!(
                "'{code}' is not a valid {} code",
                data.kind
            )));
        }
        validate_rate(&data.rate)?;
        if data.description.trim().is_empty() {
            return Err(GstError::Validation(
                "Code description cannot be empty".to_string(),
            ));
        }

        let tax_code = TaxCode {
            code,
            description: data.description,
            rate: data.rate,
            kind: data.kind,
            category: data.category,
            created_at: chrono::Utc::now().naive_utc(),
        };

        match self.storage.insert_tax_code(&tax_code).await {
            Ok(()) => {}
            Err(StoreError::Duplicate(_)) => {
                return Err(GstError::Validation(format!(
                    "Code '{}' already exists",
                    tax_code.code
                )))
            }
            Err(e) => return Err(GstError::persistence("insert tax code", e)),
        }

        self.audit
            .record_after_commit(
                AuditRecord::new(
                    AuditAction::Create,
                    EntityType::HsnCode,
                    &tax_code.code,
                    format!("Added {} code {} at {}%", tax_code.kind, tax_code.code, tax_code.rate),
                )
                .after(&tax_code),
            )
            .await;

        info!(code = %tax_code.code, kind = %tax_code.kind, rate = %tax_code.rate, "tax code added");
        Ok(tax_code)
    }

    /// Whole code table ordered by code
    pub async fn get_all_codes(&self) -> GstResult<Vec<TaxCode>> {
        let mut codes = self
            .storage
            .list_tax_codes()
            .await
            .map_err(|e| GstError::persistence("list tax codes", e))?;
        codes.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(codes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hsn_lengths() {
        assert!(validate_code("2009", CodeKind::Hsn));
        assert!(validate_code("200911", CodeKind::Hsn));
        assert!(validate_code("20091100", CodeKind::Hsn));
        assert!(!validate_code("20091", CodeKind::Hsn));
        assert!(!validate_code("2009110", CodeKind::Hsn));
        assert!(!validate_code("200911001", CodeKind::Hsn));
        assert!(!validate_code("20A9", CodeKind::Hsn));
    }

    #[test]
    fn test_sac_is_six_digits() {
        assert!(validate_code("996331", CodeKind::Sac));
        assert!(!validate_code("9963", CodeKind::Sac));
        assert!(!validate_code("99633100", CodeKind::Sac));
    }
}
