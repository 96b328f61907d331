//! JSON output for API consumers.
//!
//! `data.json` is a pretty-printed array of [`ExportRow`]s in output order;
//! `status.json` is the per-source report of the cycle that produced it.

use super::{ExportRow, export_rows};
use crate::error::ExportError;
use crate::models::{Record, StatusReport};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::json;
use tracing::{info, instrument};

#[instrument(level = "info", skip_all, fields(count = records.len()))]
pub fn render_records(records: &[Record]) -> Result<String, ExportError> {
    let rows: Vec<ExportRow> = export_rows(records);
    let json = serde_json::to_string_pretty(&rows)?;
    info!(bytes = json.len(), "Rendered JSON");
    Ok(json)
}

pub fn render_status(report: &StatusReport) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// `{"timestamp": "...", "records": n}`
pub fn render_last_updated(generated_at: DateTime<Utc>, records: usize) -> Result<String, ExportError> {
    let stamp = generated_at.to_rfc3339_opts(SecondsFormat::Secs, true);
    Ok(serde_json::to_string_pretty(
        &json!({ "timestamp": stamp, "records": records }),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AdapterStatus, SourceReport};
    use crate::outputs::fixtures::sample;
    use chrono::TimeZone;
    use serde_json::Value;

    #[test]
    fn test_absent_fields_are_null() {
        let json = render_records(&sample()).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        let rows = value.as_array().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["company_name"], "Acme Corp");
        assert_eq!(rows[0]["threat_actor"], "LockBit");
        assert_eq!(rows[2]["company_name"], "Zeta Clinic");
        assert!(rows[2]["date_reported"].is_null());
        assert!(rows[2]["url"].is_null());
        assert_eq!(rows[2].as_object().unwrap().len(), 11);
    }

    #[test]
    fn test_status_and_timestamp() {
        let at = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let mut report = StatusReport::new(at);
        report.sources.insert(
            "HHS OCR".to_string(),
            SourceReport {
                status: AdapterStatus::Partial,
                record_count: 4,
                dropped: 1,
                error: Some("parse error: page 2".to_string()),
                elapsed_ms: 120,
            },
        );
        let value: Value = serde_json::from_str(&render_status(&report).unwrap()).unwrap();
        assert_eq!(value["sources"]["HHS OCR"]["status"], "partial");
        assert_eq!(value["sources"]["HHS OCR"]["record_count"], 4);

        let value: Value = serde_json::from_str(&render_last_updated(at, 3).unwrap()).unwrap();
        assert_eq!(value["timestamp"], "2025-01-02T03:04:05Z");
        assert_eq!(value["records"], 3);
    }
}
