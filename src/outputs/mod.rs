//! Feed and export generation.
//!
//! Everything here is a pure function of a finalised record set, except
//! [`export`], which writes the rendered bundle to disk.
//!
//! # Submodules
//!
//! - [`feed`]: RSS 2.0 and Atom 1.0 documents
//! - [`json`]: pretty JSON array of [`ExportRow`]s
//! - [`csv`]: CSV table of the same rows
//! - [`export`]: the on-disk bundle
//!
//! # Output Structure
//!
//! ```text
//! export_dir/
//! ├── rss.xml
//! ├── atom.xml
//! ├── data.json
//! ├── data.csv
//! ├── status.json
//! └── last_updated.json
//! ```

use crate::models::Record;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

pub mod csv;
pub mod export;
pub mod feed;
pub mod json;

/// Newest first, undated last, ties by company name.
pub fn compare_for_output(a: &Record, b: &Record) -> Ordering {
    let key = |r: &Record| r.date_reported.as_ref().and_then(|d| d.sort_key());
    match (key(a), key(b)) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a.company_name.cmp(&b.company_name))
}

/// Sort records into output order. Stable.
pub fn sort_for_output(records: &mut [Record]) {
    records.sort_by(compare_for_output);
}

/// One record as it appears in JSON and CSV exports.
///
/// Both formats serialise this struct, so their fields are identical.
/// Absent values are `null` in JSON and empty cells in CSV.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRow {
    pub company_name: String,
    pub date_reported: Option<String>,
    pub source: String,
    /// Every source that reported this incident, comma separated.
    pub sources: String,
    pub url: Option<String>,
    pub description: Option<String>,
    pub records_affected: Option<String>,
    pub state_records_affected: Option<String>,
    pub location: Option<String>,
    pub threat_actor: Option<String>,
    pub breach_type: Option<String>,
}

impl From<&Record> for ExportRow {
    fn from(record: &Record) -> Self {
        Self {
            company_name: record.company_name.clone(),
            date_reported: record.date_reported.as_ref().map(|d| d.display()),
            source: record.source.clone(),
            sources: record.sources.join(", "),
            url: record.url.clone(),
            description: record.description.clone(),
            records_affected: record.records_affected.clone(),
            state_records_affected: record.state_records_affected.clone(),
            location: record.location.clone(),
            threat_actor: record.threat_actor.clone(),
            breach_type: record.breach_type.clone(),
        }
    }
}

/// Rows in output order.
pub fn export_rows(records: &[Record]) -> Vec<ExportRow> {
    let mut sorted = records.to_vec();
    sort_for_output(&mut sorted);
    sorted.iter().map(ExportRow::from).collect()
}
