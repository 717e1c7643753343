//! CSV export of audit entries

use serde::Serialize;

use crate::audit::ExportFormat;
use crate::traits::AuditExporter;
use crate::types::*;

#[derive(Debug, Serialize)]
struct AuditRow<'a> {
    #[serde(rename = "Timestamp")]
    timestamp: String,
    #[serde(rename = "User")]
    actor: &'a str,
    #[serde(rename = "Action")]
    action: String,
    #[serde(rename = "Entity Type")]
    entity_type: String,
    #[serde(rename = "Entity ID")]
    entity_id: &'a str,
    #[serde(rename = "Description")]
    description: &'a str,
}

/// Writes audit entries as CSV; spreadsheet and PDF rendering live outside the engine
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvAuditExporter;

impl AuditExporter for CsvAuditExporter {
    fn supports(&self, format: ExportFormat) -> bool {
        format == ExportFormat::Csv
    }

    fn export(&self, entries: &[AuditEntry], format: ExportFormat) -> GstResult<Vec<u8>> {
        if !self.supports(format) {
            return Err(GstError::ExternalService(format!(
                "CSV exporter cannot produce {format:?}"
            )));
        }

        let mut writer = csv::Writer::from_writer(Vec::new());
        for entry in entries {
            let row = AuditRow {
                timestamp: entry.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                actor: &entry.actor,
                action: entry.action.to_string(),
                entity_type: entry.entity_type.to_string(),
                entity_id: &entry.entity_id,
                description: &entry.description,
            };
            writer
                .serialize(&row)
                .map_err(|e| GstError::ExternalService(format!("Failed to write audit row: {e}")))?;
        }

        writer
            .into_inner()
            .map_err(|e| GstError::ExternalService(format!("Failed to flush audit export: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_csv_export_has_header_and_rows() {
        let entry = AuditEntry {
            id: "e1".to_string(),
            timestamp: NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap(),
            actor: "alice".to_string(),
            action: AuditAction::File,
            entity_type: EntityType::GstrFiling,
            entity_id: "f1".to_string(),
            description: "Filed GSTR-1, 022024".to_string(),
            before: None,
            after: None,
        };

        let bytes = CsvAuditExporter
            .export(&[entry], ExportFormat::Csv)
            .unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();

        assert_eq!(
            lines.next(),
            Some("Timestamp,User,Action,Entity Type,Entity ID,Description")
        );
        assert_eq!(
            lines.next(),
            Some("2024-03-01 09:30:00,alice,FILE,GSTR_FILING,f1,\"Filed GSTR-1, 022024\"")
        );
    }

    #[test]
    fn test_rejects_other_formats() {
        assert!(!CsvAuditExporter.supports(ExportFormat::Pdf));
        assert!(matches!(
            CsvAuditExporter.export(&[], ExportFormat::Excel),
            Err(GstError::ExternalService(_))
        ));
    }
}
