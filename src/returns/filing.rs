//! Return generation, preparation and filing

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};
use uuid::Uuid;

use crate::audit::{AuditRecord, AuditTrail};
use crate::config::{GstConfig, RefilingPolicy};
use crate::returns::compliance::{self, ComplianceStatus, DisplayStatus, ReturnSummary};
use crate::returns::gstr1::{self, Gstr1Payload, HsnResolver};
use crate::returns::gstr3b::{self, Gstr3bPayload};
use crate::returns::{ReturnPayload, ReturnPeriod};
use crate::traits::*;
use crate::types::*;

/// Acknowledgement of a filed return
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilingReceipt {
    pub filing_id: String,
    pub return_type: ReturnType,
    pub period: ReturnPeriod,
    /// Acknowledgement reference number
    pub reference: String,
    pub filed_at: chrono::NaiveDateTime,
}

/// Builds, prepares and files GSTR-1 and GSTR-3B
pub struct ReturnService<S: GstStore> {
    storage: S,
    audit: AuditTrail<S>,
    config: GstConfig,
}

impl<S: GstStore + Clone> ReturnService<S> {
    pub fn new(storage: S, config: GstConfig) -> Self {
        Self {
            audit: AuditTrail::new(storage.clone(), config.actor.clone()),
            storage,
            config,
        }
    }

    /// Build the GSTR-1 payload for a period from the stored sales
    pub async fn generate_gstr1(&self, period: ReturnPeriod) -> GstResult<Gstr1Payload> {
        let sales = self
            .storage
            .sales_in_period(period.start_date(), period.end_date())
            .await
            .map_err(|e| GstError::persistence("load sales", e))?;
        let resolver = self.hsn_resolver().await?;

        let payload = gstr1::build(
            period,
            self.config.business_gstin.clone(),
            &sales,
            &resolver,
            &self.config.b2c_large_threshold,
            self.config.money_scale,
        );

        info!(
            period = %period,
            invoices = sales.len(),
            b2b = payload.b2b.len(),
            b2cl = payload.b2cl.len(),
            b2cs = payload.b2cs.len(),
            "GSTR-1 generated"
        );
        if payload.hsn.unclassified_lines > 0 {
            warn!(
                period = %period,
                lines = payload.hsn.unclassified_lines,
                "sale lines without an HSN code left out of the HSN summary"
            );
        }

        Ok(payload)
    }

    /// Build the GSTR-3B payload for a period from the stored sales and purchases
    pub async fn generate_gstr3b(&self, period: ReturnPeriod) -> GstResult<Gstr3bPayload> {
        let (start, end) = (period.start_date(), period.end_date());
        let sales = self
            .storage
            .sales_in_period(start, end)
            .await
            .map_err(|e| GstError::persistence("load sales", e))?;
        let purchases = self
            .storage
            .purchases_in_period(start, end)
            .await
            .map_err(|e| GstError::persistence("load purchases", e))?;

        let payload = gstr3b::build(
            period,
            self.config.business_gstin.clone(),
            &sales,
            &purchases,
            self.config.money_scale,
        );

        info!(
            period = %period,
            sales = sales.len(),
            purchases = purchases.len(),
            net_liability = %payload.net_liability(),
            "GSTR-3B generated"
        );
        Ok(payload)
    }

    pub async fn generate(
        &self,
        return_type: ReturnType,
        period: ReturnPeriod,
    ) -> GstResult<ReturnPayload> {
        Ok(match return_type {
            ReturnType::Gstr1 => self.generate_gstr1(period).await?.into(),
            ReturnType::Gstr3b => self.generate_gstr3b(period).await?.into(),
        })
    }

    /// Generate a return and store it as `GENERATED`, replacing an earlier unfiled draft
    pub async fn prepare_return(
        &mut self,
        return_type: ReturnType,
        period: ReturnPeriod,
    ) -> GstResult<ReturnFiling> {
        let filings = self.filings(return_type, period).await?;
        self.guard_refiling(return_type, period, &filings)?;

        let payload = self.generate(return_type, period).await?;
        let existing = filings
            .into_iter()
            .filter(|filing| filing.status != FilingStatus::Filed)
            .max_by_key(|filing| filing.created_at);

        let filing = match existing {
            Some(mut filing) => {
                let before = filing.clone();
                filing.payload = payload;
                filing.status = FilingStatus::Generated;
                self.storage
                    .update_filing(&filing)
                    .await
                    .map_err(|e| GstError::persistence("update filing", e))?;

                self.audit
                    .record_after_commit(
                        AuditRecord::new(
                            AuditAction::Generate,
                            EntityType::GstrFiling,
                            &filing.id,
                            format!("Regenerated {return_type} for {period}"),
                        )
                        .before(&before.status)
                        .after(&filing.status),
                    )
                    .await;
                filing
            }
            None => {
                let filing = ReturnFiling {
                    id: Uuid::new_v4().to_string(),
                    return_type,
                    period,
                    gstin: self.config.business_gstin.clone(),
                    payload,
                    status: FilingStatus::Generated,
                    reference: None,
                    created_at: chrono::Utc::now().naive_utc(),
                    filed_at: None,
                };
                self.storage
                    .insert_filing(&filing)
                    .await
                    .map_err(|e| GstError::persistence("insert filing", e))?;

                self.audit
                    .record_after_commit(
                        AuditRecord::new(
                            AuditAction::Generate,
                            EntityType::GstrFiling,
                            &filing.id,
                            format!("Generated {return_type} for {period}"),
                        )
                        .after(&filing.status),
                    )
                    .await;
                filing
            }
        };

        info!(filing = %filing.id, return_type = %return_type, period = %period, "return prepared");
        Ok(filing)
    }

    /// File a return for a period.
    ///
    /// Moves a prepared filing to `FILED`, or records a new `FILED` filing when
    /// none was prepared. Submission to the portal is simulated; the reference
    /// number is generated locally.
    pub async fn file_gstr(
        &mut self,
        return_type: ReturnType,
        period: ReturnPeriod,
        payload: ReturnPayload,
    ) -> GstResult<FilingReceipt> {
        if payload.return_type() != return_type {
            return Err(GstError::Validation(format!(
                "Payload is a {} but {return_type} was requested",
                payload.return_type()
            )));
        }
        if payload.period() != period {
            return Err(GstError::Validation(format!(
                "Payload covers period {} but {period} was requested",
                payload.period()
            )));
        }

        let filings = self.filings(return_type, period).await?;
        self.guard_refiling(return_type, period, &filings)?;

        let now = chrono::Utc::now().naive_utc();
        let reference = generate_reference(now.date());
        let prepared = filings
            .into_iter()
            .filter(|filing| filing.status.can_transition_to(FilingStatus::Filed))
            .max_by_key(|filing| filing.created_at);

        let filing = match prepared {
            Some(mut filing) => {
                filing.payload = payload;
                filing.status = FilingStatus::Filed;
                filing.reference = Some(reference.clone());
                filing.filed_at = Some(now);
                self.storage
                    .update_filing(&filing)
                    .await
                    .map_err(|e| GstError::persistence("file return", e))?;
                filing
            }
            None => {
                let filing = ReturnFiling {
                    id: Uuid::new_v4().to_string(),
                    return_type,
                    period,
                    gstin: payload
                        .gstin()
                        .map(str::to_string)
                        .or_else(|| self.config.business_gstin.clone()),
                    payload,
                    status: FilingStatus::Filed,
                    reference: Some(reference.clone()),
                    created_at: now,
                    filed_at: Some(now),
                };
                self.storage
                    .insert_filing(&filing)
                    .await
                    .map_err(|e| GstError::persistence("file return", e))?;
                filing
            }
        };

        let receipt = FilingReceipt {
            filing_id: filing.id.clone(),
            return_type,
            period,
            reference,
            filed_at: now,
        };

        self.audit
            .record_after_commit(
                AuditRecord::new(
                    AuditAction::File,
                    EntityType::GstrFiling,
                    &filing.id,
                    format!("Filed {return_type} for {period}"),
                )
                .after(&receipt),
            )
            .await;

        info!(
            filing = %receipt.filing_id,
            reference = %receipt.reference,
            return_type = %return_type,
            period = %period,
            "return filed"
        );
        Ok(receipt)
    }

    /// Display state of a period's return as of `today`
    pub async fn display_status(
        &self,
        return_type: ReturnType,
        period: ReturnPeriod,
        today: NaiveDate,
    ) -> GstResult<DisplayStatus> {
        let filings = self.filings(return_type, period).await?;
        Ok(compliance::display_status(
            compliance::current_filing(&filings),
            return_type,
            period,
            today,
            &self.config,
        ))
    }

    /// Whether last month's returns are filed, as of `today`
    pub async fn check_compliance(&self, today: NaiveDate) -> GstResult<ComplianceStatus> {
        let period = ReturnPeriod::containing(today)?.previous();
        let gstr1 = self.filings(ReturnType::Gstr1, period).await?;
        let gstr3b = self.filings(ReturnType::Gstr3b, period).await?;

        let status = compliance::assess(today, period, &gstr1, &gstr3b, &self.config);
        info!(
            period = %period,
            gstr1_filed = status.gstr1_filed,
            gstr3b_filed = status.gstr3b_filed,
            "compliance checked"
        );
        Ok(status)
    }

    /// Cross-check a period's GSTR-1 against its GSTR-3B
    pub async fn reconcile_summary(&self, period: ReturnPeriod) -> GstResult<ReturnSummary> {
        let gstr1 = self.generate_gstr1(period).await?;
        let gstr3b = self.generate_gstr3b(period).await?;
        Ok(compliance::summarize(
            &gstr1,
            &gstr3b,
            &self.config.match_tolerance,
        ))
    }

    /// All stored filings of one type for a period
    pub async fn filings(
        &self,
        return_type: ReturnType,
        period: ReturnPeriod,
    ) -> GstResult<Vec<ReturnFiling>> {
        self.storage
            .find_filings(return_type, &period)
            .await
            .map_err(|e| GstError::persistence("find filings", e))
    }

    fn guard_refiling(
        &self,
        return_type: ReturnType,
        period: ReturnPeriod,
        filings: &[ReturnFiling],
    ) -> GstResult<()> {
        let already_filed = filings
            .iter()
            .any(|filing| filing.status == FilingStatus::Filed);

        if already_filed && self.config.refiling == RefilingPolicy::Reject {
            warn!(return_type = %return_type, period = %period, "re-filing rejected");
            return Err(GstError::DuplicateFiling {
                return_type,
                period,
            });
        }
        Ok(())
    }

    async fn hsn_resolver(&self) -> GstResult<HsnResolver> {
        let products = self
            .storage
            .list_products()
            .await
            .map_err(|e| GstError::persistence("list products", e))?;
        let codes = self
            .storage
            .list_tax_codes()
            .await
            .map_err(|e| GstError::persistence("list tax codes", e))?;

        let product_codes: HashMap<String, String> = products
            .into_iter()
            .filter(Product::is_mapped)
            .filter_map(|product| product.tax_code.map(|code| (product.id, code)))
            .collect();
        let descriptions = codes
            .into_iter()
            .map(|code| (code.code, code.description))
            .collect();

        Ok(HsnResolver {
            product_codes,
            descriptions,
        })
    }
}

/// Acknowledgement reference: `AA` + `YYMMDD` + 9 characters
fn generate_reference(date: NaiveDate) -> String {
    let suffix: String = Uuid::new_v4()
        .simple()
        .to_string()
        .to_uppercase()
        .chars()
        .take(9)
        .collect();
    format!("AA{}{}", date.format("%y%m%d"), suffix)
}
