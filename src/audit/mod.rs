//! Append-only audit trail
//!
//! Every state-changing call in the engine appends one [`AuditEntry`] through
//! [`AuditTrail`]. Entries are never updated or deleted; the storage seam offers
//! no way to do so.

pub mod export;

pub use export::CsvAuditExporter;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::traits::*;
use crate::types::*;

/// Output formats an exporter may produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Excel,
    Pdf,
}

/// Conjunctive audit filters; `None` matches everything
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditQuery {
    /// Inclusive lower bound
    pub from: Option<NaiveDateTime>,
    /// Inclusive upper bound
    pub to: Option<NaiveDateTime>,
    pub action: Option<AuditAction>,
    pub actor: Option<String>,
}

impl AuditQuery {
    pub fn between(from: NaiveDateTime, to: NaiveDateTime) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
            ..Self::default()
        }
    }

    pub fn with_action(mut self, action: AuditAction) -> Self {
        self.action = Some(action);
        self
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn matches(&self, entry: &AuditEntry) -> bool {
        self.from.is_none_or(|from| entry.timestamp >= from)
            && self.to.is_none_or(|to| entry.timestamp <= to)
            && self.action.is_none_or(|action| entry.action == action)
            && self
                .actor
                .as_deref()
                .is_none_or(|actor| entry.actor == actor)
    }
}

/// A state change about to be recorded
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub action: AuditAction,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub description: String,
    pub before: Option<serde_json::Value>,
    pub after: Option<serde_json::Value>,
}

impl AuditRecord {
    pub fn new(
        action: AuditAction,
        entity_type: EntityType,
        entity_id: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            action,
            entity_type,
            entity_id: entity_id.into(),
            description: description.into(),
            before: None,
            after: None,
        }
    }

    /// Attach a snapshot of the entity before the change
    pub fn before<T: Serialize>(mut self, value: &T) -> Self {
        self.before = serde_json::to_value(value).ok();
        self
    }

    /// Attach a snapshot of the entity after the change
    pub fn after<T: Serialize>(mut self, value: &T) -> Self {
        self.after = serde_json::to_value(value).ok();
        self
    }
}

/// Audit trail recorder
#[derive(Clone)]
pub struct AuditTrail<S: GstStore> {
    storage: S,
    actor: String,
}

impl<S: GstStore> AuditTrail<S> {
    pub fn new(storage: S, actor: impl Into<String>) -> Self {
        Self {
            storage,
            actor: actor.into(),
        }
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }

    /// Append one entry stamped with the current time and the configured actor
    pub async fn record(&mut self, record: AuditRecord) -> GstResult<AuditEntry> {
        let entry = AuditEntry {
            id: Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now().naive_utc(),
            actor: self.actor.clone(),
            action: record.action,
            entity_type: record.entity_type,
            entity_id: record.entity_id,
            description: record.description,
            before: record.before,
            after: record.after,
        };

        self.storage
            .append_audit(&entry)
            .await
            .map_err(|e| GstError::persistence("append audit entry", e))?;

        debug!(
            action = %entry.action,
            entity_type = %entry.entity_type,
            entity_id = %entry.entity_id,
            "audit entry recorded"
        );
        Ok(entry)
    }

    /// Record after a mutation has already been persisted.
    ///
    /// The mutation stands even if the audit write fails; the failure is logged.
    pub async fn record_after_commit(&mut self, record: AuditRecord) {
        let entity_id = record.entity_id.clone();
        if let Err(error) = self.record(record).await {
            warn!(entity_id = %entity_id, error = %error, "audit entry lost after committed change");
        }
    }

    /// Entries matching every filter, newest first
    pub async fn query(&self, query: &AuditQuery) -> GstResult<Vec<AuditEntry>> {
        self.storage
            .query_audit(query)
            .await
            .map_err(|e| GstError::persistence("query audit trail", e))
    }

    /// Filter and hand the matching entries to an exporter
    pub async fn export(
        &mut self,
        query: &AuditQuery,
        format: ExportFormat,
        exporter: &dyn AuditExporter,
    ) -> GstResult<Vec<u8>> {
        if !exporter.supports(format) {
            return Err(GstError::ExternalService(format!(
                "No exporter available for {format:?}"
            )));
        }

        let entries = self.query(query).await?;
        let bytes = exporter.export(&entries, format)?;

        self.record_after_commit(AuditRecord::new(
            AuditAction::Export,
            EntityType::BusinessConfig,
            "audit-trail",
            format!("Exported {} audit entries as {format:?}", entries.len()),
        ))
        .await;

        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn entry(day: u32, action: AuditAction, actor: &str) -> AuditEntry {
        AuditEntry {
            id: format!("e{day}"),
            timestamp: NaiveDate::from_ymd_opt(2024, 3, day)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            actor: actor.to_string(),
            action,
            entity_type: EntityType::Product,
            entity_id: "p1".to_string(),
            description: String::new(),
            before: None,
            after: None,
        }
    }

    #[test]
    fn test_empty_query_matches_everything() {
        let query = AuditQuery::default();
        assert!(query.matches(&entry(1, AuditAction::Update, "alice")));
        assert!(query.matches(&entry(30, AuditAction::Cancel, "bob")));
    }

    #[test]
    fn test_filters_are_conjunctive() {
        let from = NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(23, 59, 59)
            .unwrap();
        let query = AuditQuery::between(from, to)
            .with_action(AuditAction::Update)
            .with_actor("alice");

        assert!(query.matches(&entry(7, AuditAction::Update, "alice")));
        assert!(!query.matches(&entry(7, AuditAction::Update, "bob")));
        assert!(!query.matches(&entry(7, AuditAction::Create, "alice")));
        assert!(!query.matches(&entry(11, AuditAction::Update, "alice")));
    }

    #[test]
    fn test_record_snapshots() {
        let product = Product::new("p1".to_string(), "Mango Cooler".to_string(), None, None);
        let record = AuditRecord::new(
            AuditAction::Update,
            EntityType::Product,
            "p1",
            "Assigned HSN 2009",
        )
        .before(&product);

        assert!(record.before.is_some());
        assert!(record.after.is_none());
    }
}
