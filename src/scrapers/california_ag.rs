//! California Attorney General data breach list.

use crate::error::AdapterError;
use crate::models::RawRecord;
use crate::scrapers::html::{cell, extract_tables};
use crate::scrapers::http::{FetchText, HttpClient};
use crate::scrapers::{CapabilityClass, FetchOutcome, SourceAdapter};
use async_trait::async_trait;
use tracing::{info, instrument};

pub const SOURCE: &str = "California AG";
const LIST_URL: &str = "https://oag.ca.gov/privacy/databreach/list";

pub fn parse_list(html: &str, page_url: &str, limit: usize) -> Result<Vec<RawRecord>, AdapterError> {
    let tables = extract_tables(html);
    let table = tables
        .iter()
        .find(|t| t.column_containing("organization name").is_some())
        .ok_or_else(|| AdapterError::parse("breach list table not found on California AG page"))?;

    let company = table.column_containing("organization name");
    let date = table.column_containing("reported date");

    Ok(table
        .rows
        .iter()
        .take(limit)
        .map(|row| RawRecord {
            date_reported: cell(row, date),
            url: page_url.to_string(),
            location: "California".to_string(),
            breach_type: "Data Breach".to_string(),
            ..RawRecord::new(cell(row, company), SOURCE)
        })
        .collect())
}

#[derive(Debug)]
pub struct CaliforniaAg {
    http: HttpClient,
    url: String,
}

impl CaliforniaAg {
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            url: LIST_URL.to_string(),
        }
    }
}

#[async_trait]
impl SourceAdapter for CaliforniaAg {
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
            parse_list(&body, &self.url, limit)
        }
        .await;
        if let Ok(records) = &result {
            info!(count = records.len(), "Fetched California AG breaches");
        }
        result.into()
    }
}
