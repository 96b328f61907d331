//! HHS Office for Civil Rights breach portal.
//!
//! The portal lists HIPAA breaches affecting 500 or more individuals in a
//! JSF-rendered table. An "Expand All" column with script cruft precedes the
//! data columns, so columns are found by header text.

use crate::error::AdapterError;
use crate::models::RawRecord;
use crate::scrapers::html::{Table, cell, extract_tables};
use crate::scrapers::http::{FetchText, HttpClient};
use crate::scrapers::{CapabilityClass, FetchOutcome, SourceAdapter};
use async_trait::async_trait;
use tracing::{info, instrument};

pub const SOURCE: &str = "HHS OCR";
const PORTAL_URL: &str = "https://ocrportal.hhs.gov/ocr/breach/breach_report.jsf";

fn is_breach_table(table: &Table) -> bool {
    table.column_containing("name of covered entity").is_some()
}

/// Extract at most `limit` rows from the portal page.
pub fn parse_portal(html: &str, page_url: &str, limit: usize) -> Result<Vec<RawRecord>, AdapterError> {
    let tables = extract_tables(html);
    let table = tables
        .iter()
        .find(|t| is_breach_table(t))
        .ok_or_else(|| AdapterError::parse("breach table not found on HHS OCR portal"))?;

    let company = table.column_containing("name of covered entity");
    let date = table.column_containing("breach submission date");
    let records = table.column_containing("individuals affected");
    let state = table.column(|h| h == "state");
    let kind = table.column_containing("type of breach");

    Ok(table
        .rows
        .iter()
        .take(limit)
        .map(|row| {
            let breach_type = cell(row, kind);
            RawRecord {
                date_reported: cell(row, date),
                url: page_url.to_string(),
                records_affected: cell(row, records),
                location: cell(row, state),
                breach_type: if breach_type.is_empty() {
                    "Healthcare Breach".to_string()
                } else {
                    breach_type
                },
                ..RawRecord::new(cell(row, company), SOURCE)
            }
        })
        .collect())
}

#[derive(Debug)]
pub struct HhsOcr {
    http: HttpClient,
    url: String,
}

impl HhsOcr {
    pub fn new(http: HttpClient) -> Self {
        Self::with_url(http, PORTAL_URL)
    }

    pub fn with_url(http: HttpClient, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }
}

#[async_trait]
impl SourceAdapter for HhsOcr {
    fn name(&self) -> &str {
        SOURCE
    }

    fn capability(&self) -> CapabilityClass {
        CapabilityClass::StaticScrape
    }

    fn default_limit(&self) -> usize {
        100
    }

    #[instrument(level = "info", skip_all, fields(source = SOURCE, limit = limit))]
    async fn fetch(&self, limit: usize) -> FetchOutcome {
        let result = async {
            let body = self.http.fetch_text(&self.url).await?;
            parse_portal(&body, &self.url, limit)
        }
        .await;
        if let Ok(records) = &result {
            info!(count = records.len(), "Fetched HHS OCR breaches");
        }
        result.into()
    }
}
