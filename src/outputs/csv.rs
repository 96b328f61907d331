//! CSV output: the same rows as `data.json`, one per line.

use super::{ExportRow, export_rows};
use crate::error::ExportError;
use crate::models::Record;
use tracing::{info, instrument};

#[instrument(level = "info", skip_all, fields(count = records.len()))]
pub fn render_records(records: &[Record]) -> Result<String, ExportError> {
    let mut writer = ::csv::Writer::from_writer(Vec::new());
    for row in export_rows(records) {
        writer.serialize(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Io(e.into_error()))?;
    let csv = String::from_utf8(bytes)?;
    info!(bytes = csv.len(), "Rendered CSV");
    Ok(csv)
}

/// Parse rows written by [`render_records`].
pub fn read_rows(csv: &str) -> Result<Vec<ExportRow>, ExportError> {
    let mut reader = ::csv::Reader::from_reader(csv.as_bytes());
    let rows = reader.deserialize().collect::<Result<Vec<ExportRow>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outputs::fixtures::sample;
    use crate::outputs::json;

    #[test]
    fn test_header_row() {
        let csv = render_records(&sample()).unwrap();
        let header = csv.lines().next().unwrap();
        assert_eq!(
            header,
            "company_name,date_reported,source,sources,url,description,records_affected,\
             state_records_affected,location,threat_actor,breach_type"
        );
    }

    #[test]
    fn test_csv_and_json_carry_the_same_rows() {
        let records = sample();
        let from_csv = read_rows(&render_records(&records).unwrap()).unwrap();
        let from_json: Vec<ExportRow> =
            serde_json::from_str(&json::render_records(&records).unwrap()).unwrap();
        assert_eq!(from_csv, from_json);
        assert_eq!(from_csv[0].description.as_deref(), Some("Acme, Inc. said \"attackers\" <accessed> files."));
        assert_eq!(from_csv[2].url, None);
    }
}
