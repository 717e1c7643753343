//! E-way bill issuance and cancellation
//!
//! Submission to the government portal is simulated: a bill number is
//! generated locally and the bill is stored as `GENERATED`.

use bigdecimal::BigDecimal;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::audit::{AuditRecord, AuditTrail};
use crate::config::{GstConfig, MAX_EWAY_VALIDITY_HOURS};
use crate::tax::gstin;
use crate::traits::*;
use crate::types::*;
use crate::utils::money::round_money;

/// Outward supply
const SUPPLY_TYPE_OUTWARD: &str = "O";
/// Sub-type "supply"
const SUB_SUPPLY_TYPE_SUPPLY: &str = "1";
const DOC_TYPE_INVOICE: &str = "INV";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    #[default]
    Road,
    Rail,
    Air,
    Ship,
}

impl TransportMode {
    /// Portal code for the mode
    pub fn code(&self) -> &'static str {
        match self {
            TransportMode::Road => "1",
            TransportMode::Rail => "2",
            TransportMode::Air => "3",
            TransportMode::Ship => "4",
        }
    }
}

/// Consignor or consignee as entered by the caller
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Party {
    pub gstin: Option<String>,
    pub name: String,
    pub address: String,
    pub place: String,
    pub pincode: String,
}

/// Party block of the bill payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartyDetails {
    pub gstin: Option<String>,
    pub trade_name: String,
    pub address: String,
    pub place: String,
    pub pincode: String,
    /// Two-digit state code, taken from the GSTIN when there is one
    pub state_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TransportDetails {
    pub transporter_id: Option<String>,
    pub transporter_name: Option<String>,
    pub document_number: Option<String>,
    #[serde(default)]
    pub mode: TransportMode,
    #[serde(default)]
    pub distance_km: u32,
    pub vehicle_number: Option<String>,
}

/// Document submitted for an e-way bill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EWayBillPayload {
    pub supply_type: String,
    pub sub_supply_type: String,
    pub doc_type: String,
    pub doc_number: String,
    pub doc_date: NaiveDate,
    pub from: PartyDetails,
    pub to: PartyDetails,
    pub taxable_value: BigDecimal,
    pub tax: TaxComponents,
    pub cess: BigDecimal,
    pub total_value: BigDecimal,
    pub transport: TransportDetails,
}

/// Invoice to ship plus the parties and transport it moves with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EWayBillRequest {
    pub invoice: SaleInvoice,
    pub consignor: Party,
    pub consignee: Party,
    #[serde(default)]
    pub transport: TransportDetails,
    #[serde(default)]
    pub cess: Option<BigDecimal>,
}

/// Result of asking for an e-way bill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EWayBillDecision {
    /// Invoice value below the threshold; nothing was stored
    NotRequired {
        threshold: BigDecimal,
        invoice_total: BigDecimal,
    },
    Issued(EWayBill),
}

impl EWayBillDecision {
    pub fn is_required(&self) -> bool {
        matches!(self, EWayBillDecision::Issued(_))
    }

    pub fn bill(&self) -> Option<&EWayBill> {
        match self {
            EWayBillDecision::Issued(bill) => Some(bill),
            EWayBillDecision::NotRequired { .. } => None,
        }
    }
}

/// "EWB" followed by 12 digits
pub fn generate_bill_number() -> String {
    format!("EWB{:012}", Uuid::new_v4().as_u128() % 1_000_000_000_000)
}

fn party_details(party: &Party, fallback_state: Option<&str>) -> PartyDetails {
    let gstin = party
        .gstin
        .as_deref()
        .map(str::trim)
        .filter(|gstin| !gstin.is_empty());

    PartyDetails {
        gstin: gstin.map(str::to_string),
        trade_name: party.name.clone(),
        address: party.address.clone(),
        place: party.place.clone(),
        pincode: party.pincode.clone(),
        state_code: gstin
            .and_then(gstin::state_code)
            .or(fallback_state)
            .map(str::to_string),
    }
}

/// Assemble the bill payload from a priced invoice; amounts rounded to `scale`
pub fn build_payload(request: &EWayBillRequest, scale: i64) -> EWayBillPayload {
    let invoice = &request.invoice;
    let cess = request.cess.clone().unwrap_or_else(|| BigDecimal::from(0));
    let total = invoice.total() + &cess;

    EWayBillPayload {
        supply_type: SUPPLY_TYPE_OUTWARD.to_string(),
        sub_supply_type: SUB_SUPPLY_TYPE_SUPPLY.to_string(),
        doc_type: DOC_TYPE_INVOICE.to_string(),
        doc_number: invoice.invoice_number.clone(),
        doc_date: invoice.invoice_date,
        from: party_details(&request.consignor, None),
        to: party_details(&request.consignee, Some(&invoice.place_of_supply)),
        taxable_value: round_money(&invoice.taxable_value(), scale),
        tax: invoice.tax().rounded(scale),
        cess: round_money(&cess, scale),
        total_value: round_money(&total, scale),
        transport: request.transport.clone(),
    }
}

fn validate_request(request: &EWayBillRequest) -> GstResult<()> {
    if request.invoice.invoice_number.trim().is_empty() {
        return Err(GstError::Validation(
            "Invoice number is required for an e-way bill".to_string(),
        ));
    }
    if request.invoice.lines.is_empty() {
        return Err(GstError::Validation(format!(
            "Invoice {} has no lines",
            request.invoice.invoice_number
        )));
    }
    for (party, field) in [
        (&request.consignor, "consignor_gstin"),
        (&request.consignee, "consignee_gstin"),
    ] {
        if let Some(gstin) = party.gstin.as_deref().filter(|g| !g.trim().is_empty()) {
            gstin::require_valid_gstin(gstin.trim(), field)?;
        }
    }
    Ok(())
}

/// Issues and cancels e-way bills
pub struct EWayBillManager<S: GstStore> {
    storage: S,
    audit: AuditTrail<S>,
    threshold: BigDecimal,
    validity: Duration,
    scale: i64,
}

impl<S: GstStore + Clone> EWayBillManager<S> {
    pub fn new(storage: S, config: &GstConfig) -> Self {
        Self {
            audit: AuditTrail::new(storage.clone(), config.actor.clone()),
            storage,
            threshold: config.eway_bill_threshold.clone(),
            validity: Duration::hours(
                config
                    .eway_validity_hours
                    .clamp(1, MAX_EWAY_VALIDITY_HOURS),
            ),
            scale: config.money_scale,
        }
    }

    /// Issue a bill when the invoice total reaches the threshold
    pub async fn generate(&mut self, request: EWayBillRequest) -> GstResult<EWayBillDecision> {
        self.generate_at(request, chrono::Utc::now().naive_utc()).await
    }

    pub async fn generate_at(
        &mut self,
        request: EWayBillRequest,
        now: NaiveDateTime,
    ) -> GstResult<EWayBillDecision> {
        let invoice_total = request.invoice.total();
        if invoice_total < self.threshold {
            info!(
                invoice = %request.invoice.invoice_number,
                total = %invoice_total,
                "e-way bill not required"
            );
            return Ok(EWayBillDecision::NotRequired {
                threshold: self.threshold.clone(),
                invoice_total: round_money(&invoice_total, self.scale),
            });
        }

        validate_request(&request)?;

        let bill = EWayBill {
            number: generate_bill_number(),
            invoice_number: request.invoice.invoice_number.clone(),
            payload: build_payload(&request, self.scale),
            status: EWayBillStatus::Generated,
            generated_at: now,
            valid_until: now + self.validity,
            cancellation_reason: None,
            cancelled_at: None,
        };

        self.storage
            .insert_eway_bill(&bill)
            .await
            .map_err(|e| GstError::persistence("insert e-way bill", e))?;

        self.audit
            .record_after_commit(
                AuditRecord::new(
                    AuditAction::Generate,
                    EntityType::EwayBill,
                    &bill.number,
                    format!(
                        "Generated e-way bill {} for invoice {}",
                        bill.number, bill.invoice_number
                    ),
                )
                .after(&bill),
            )
            .await;

        info!(
            number = %bill.number,
            invoice = %bill.invoice_number,
            valid_until = %bill.valid_until,
            "e-way bill generated"
        );
        Ok(EWayBillDecision::Issued(bill))
    }

    pub async fn get(&self, number: &str) -> GstResult<EWayBill> {
        self.storage
            .get_eway_bill(number)
            .await
            .map_err(|e| GstError::persistence("get e-way bill", e))?
            .ok_or_else(|| GstError::not_found("E-way bill", number))
    }

    /// Status of a bill as of now, with expiry derived
    pub async fn status(&self, number: &str) -> GstResult<EWayBillStatus> {
        let bill = self.get(number).await?;
        Ok(bill.effective_status(chrono::Utc::now().naive_utc()))
    }

    /// Cancel a generated bill; a reason is mandatory
    pub async fn cancel(&mut self, number: &str, reason: &str) -> GstResult<EWayBill> {
        self.cancel_at(number, reason, chrono::Utc::now().naive_utc())
            .await
    }

    pub async fn cancel_at(
        &mut self,
        number: &str,
        reason: &str,
        now: NaiveDateTime,
    ) -> GstResult<EWayBill> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(GstError::Validation(
                "A cancellation reason is required".to_string(),
            ));
        }

        let before = self.get(number).await?;
        match before.effective_status(now) {
            EWayBillStatus::Generated => {}
            status => {
                warn!(number, ?status, "refusing to cancel e-way bill");
                return Err(GstError::InvalidState(format!(
                    "E-way bill {number} is {status:?} and cannot be cancelled"
                )));
            }
        }

        let mut bill = before.clone();
        bill.status = EWayBillStatus::Cancelled;
        bill.cancellation_reason = Some(reason.to_string());
        bill.cancelled_at = Some(now);

        self.storage
            .update_eway_bill(&bill)
            .await
            .map_err(|e| GstError::persistence("update e-way bill", e))?;

        self.audit
            .record_after_commit(
                AuditRecord::new(
                    AuditAction::Cancel,
                    EntityType::EwayBill,
                    &bill.number,
                    format!("Cancelled e-way bill {}: {reason}", bill.number),
                )
                .before(&before)
                .after(&bill),
            )
            .await;

        info!(number = %bill.number, reason, "e-way bill cancelled");
        Ok(bill)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::memory_storage::MemoryStorage;

    fn request(taxable: i64) -> EWayBillRequest {
        let line = SaleLine {
            serial_number: 1,
            product_id: None,
            description: "Mango pulp".to_string(),
            hsn_code: Some("2008".to_string()),
            taxable_value: BigDecimal::from(taxable),
            rate: BigDecimal::from(12),
            tax: TaxComponents::new(
                BigDecimal::from(taxable * 12 / 100),
                BigDecimal::from(0),
                BigDecimal::from(0),
            ),
        };

        EWayBillRequest {
            invoice: SaleInvoice {
                id: "s1".to_string(),
                invoice_number: "INV-1".to_string(),
                invoice_date: NaiveDate::from_ymd_opt(2024, 4, 10).unwrap(),
                customer_gstin: Some("29AAAAA0000A1Z5".to_string()),
                customer_name: Some("Cool Drinks".to_string()),
                place_of_supply: "29".to_string(),
                reverse_charge: false,
                lines: vec![line],
                created_at: chrono::Utc::now().naive_utc(),
            },
            consignor: Party {
                gstin: Some("27ABCDE1234F1Z5".to_string()),
                name: "Juice Works".to_string(),
                ..Party::default()
            },
            consignee: Party {
                gstin: Some("29AAAAA0000A1Z5".to_string()),
                name: "Cool Drinks".to_string(),
                ..Party::default()
            },
            transport: TransportDetails::default(),
            cess: None,
        }
    }

    #[test]
    fn test_bill_number_shape() {
        let number = generate_bill_number();
        assert_eq!(number.len(), 15);
        assert!(number.starts_with("EWB"));
        assert!(number[3..].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_payload_takes_state_codes_from_gstin() {
        let payload = build_payload(&request(50000), 2);

        assert_eq!(payload.supply_type, "O");
        assert_eq!(payload.doc_type, "INV");
        assert_eq!(payload.from.state_code.as_deref(), Some("27"));
        assert_eq!(payload.to.state_code.as_deref(), Some("29"));
        assert_eq!(payload.tax.igst, BigDecimal::from(6000));
        assert_eq!(payload.total_value, BigDecimal::from(56000));
        assert_eq!(payload.transport.mode.code(), "1");
    }

    #[test]
    fn test_unregistered_consignee_falls_back_to_place_of_supply() {
        let mut request = request(50000);
        request.consignee.gstin = None;

        let payload = build_payload(&request, 2);
        assert_eq!(payload.to.gstin, None);
        assert_eq!(payload.to.state_code.as_deref(), Some("29"));
    }

    #[test]
    fn test_rejects_malformed_consignee_gstin() {
        let mut request = request(50000);
        request.consignee.gstin = Some("29-bad".to_string());
        assert!(matches!(
            validate_request(&request),
            Err(GstError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_oversized_validity_is_capped() {
        let config = GstConfig {
            eway_validity_hours: i64::MAX,
            ..GstConfig::default()
        };
        let mut manager = EWayBillManager::new(MemoryStorage::new(), &config);

        let decision = manager.generate(request(60000)).await.unwrap();
        let bill = decision.bill().unwrap();
        assert_eq!(
            bill.valid_until - bill.generated_at,
            Duration::hours(MAX_EWAY_VALIDITY_HOURS)
        );
    }
}
