//! Texas Attorney General data security breach reports.
//!
//! The report table is a Salesforce page that loads unsorted; clicking the
//! "Date Published" header twice sorts it newest first.

use crate::browser::{BrowserLane, BrowserLease};
use crate::error::AdapterError;
use crate::models::RawRecord;
use crate::scrapers::html::{Table, cell, extract_tables};
use crate::scrapers::{CapabilityClass, FetchOutcome, SourceAdapter};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

pub const SOURCE: &str = "Texas AG";
const REPORT_URL: &str =
    "https://oag.my.site.com/datasecuritybreachreport/apex/DataSecurityReportsPage";

const SORT_BY_PUBLISHED: &str = r#"
(() => {
  const th = Array.from(document.querySelectorAll('#mycdrs th'))
    .find(el => el.innerText.includes('Date Published'));
  if (!th) return false;
  th.click();
  th.click();
  return true;
})()
"#;

fn pick_table(tables: &[Table]) -> Option<&Table> {
    tables
        .iter()
        .find(|t| t.column_containing("entity or individual name").is_some())
        .or_else(|| tables.iter().find(|t| t.headers.len() >= 9))
        .or_else(|| tables.first())
}

pub fn parse_reports(html: &str, page_url: &str, limit: usize) -> Result<Vec<RawRecord>, AdapterError> {
    let tables = extract_tables(html);
    let table = pick_table(&tables)
        .ok_or_else(|| AdapterError::parse("report table not found on Texas AG page"))?;

    let name = table.column_containing("entity or individual name");
    let city = table.column(|h| h.contains("city"));
    let state = table.column(|h| h == "state" || h.starts_with("state "));
    let published = table.column_containing("date published");
    let texans = table.column_containing("number of texans affected");

    Ok(table
        .rows
        .iter()
        .take(limit)
        .map(|row| {
            let location = [cell(row, city), cell(row, state)]
                .into_iter()
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(", ");
            RawRecord {
                date_reported: cell(row, published),
                url: page_url.to_string(),
                state_records_affected: cell(row, texans),
                location: if location.is_empty() {
                    "Texas".to_string()
                } else {
                    location
                },
                breach_type: "State Registry".to_string(),
                ..RawRecord::new(cell(row, name), SOURCE)
            }
        })
        .collect())
}

#[derive(Debug)]
pub struct TexasAg {
    lane: Arc<BrowserLane>,
    url: String,
    settle: Duration,
}

impl TexasAg {
    pub fn new(lane: Arc<BrowserLane>) -> Self {
        Self {
            lane,
            url: REPORT_URL.to_string(),
            settle: Duration::from_secs(5),
        }
    }

    async fn scrape(&self, lease: &mut BrowserLease, limit: usize) -> Result<Vec<RawRecord>, AdapterError> {
        lease.goto(&self.url, self.settle).await?;
        match lease.evaluate(SORT_BY_PUBLISHED).await {
            Ok(sorted) => debug!(sorted = %sorted, "Sorted Texas AG table"),
            Err(e) => debug!(error = %e, "Sorting Texas AG table failed"),
        }
        tokio::time::sleep(self.settle / 2).await;
        let html = lease.content().await?;
        parse_reports(&html, &self.url, limit)
    }
}

#[async_trait]
impl SourceAdapter for TexasAg {
    fn name(&self) -> &str {
        SOURCE
    }

    fn capability(&self) -> CapabilityClass {
        CapabilityClass::BrowserAutomation
    }

    fn default_limit(&self) -> usize {
        50
    }

    #[instrument(level = "info", skip_all, fields(source = SOURCE, limit = limit))]
    async fn fetch(&self, limit: usize) -> FetchOutcome {
        let mut lease = match self.lane.lease().await {
            Ok(lease) => lease,
            Err(e) => return FetchOutcome::failed(e),
        };
        let result = self.scrape(&mut lease, limit).await;
        lease.release().await;
        if let Ok(records) = &result {
            info!(count = records.len(), "Fetched Texas AG reports");
        }
        result.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::testing::FakeLauncher;
    use crate::models::AdapterStatus;
    use serde_json::json;

    const PAGE: &str = r#"
    <table id="mycdrs">
      <thead><tr>
        <th>Entity or Individual Name</th><th>Entity or Individual Address</th>
        <th>Entity or Individual City</th><th>State</th><th>Entity or Individual Zip Code</th>
        <th>Type(s) of Information Affected</th><th>Number of Texans Affected</th>
        <th>Notice Provided to Consumers (Y/N)</th><th>Method(s) of Notice to Consumers</th>
        <th>Date Published at OAG Website</th>
      </tr></thead>
      <tbody>
        <tr><td>Acme Corp</td><td>1 Main St</td><td>Austin</td><td>TX</td><td>78701</td>
            <td>Name; SSN</td><td>1,204</td><td>Y</td><td>U.S. Mail</td><td>12/23/2024</td></tr>
        <tr><td>Beta LLC</td><td></td><td></td><td></td><td></td>
            <td>Name</td><td>15</td><td>Y</td><td>Email</td><td>12/20/2024</td></tr>
      </tbody>
    </table>"#;

    #[test]
    fn test_parse_reports() {
        let records = parse_reports(PAGE, REPORT_URL, 10).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].company_name, "Acme Corp");
        assert_eq!(records[0].location, "Austin, TX");
        assert_eq!(records[0].state_records_affected, "1,204");
        assert_eq!(records[0].date_reported, "12/23/2024");
        assert_eq!(records[1].location, "Texas");
    }

    #[test]
    fn test_no_table() {
        assert!(parse_reports("<p>Loading…</p>", REPORT_URL, 10).is_err());
    }

    #[tokio::test]
    async fn test_fetch_sorts_then_reads() {
        let launcher = FakeLauncher::default()
            .page(REPORT_URL, PAGE)
            .script(REPORT_URL, json!(true));
        let adapter = TexasAg {
            settle: Duration::ZERO,
            ..TexasAg::new(Arc::new(BrowserLane::new(Arc::new(launcher))))
        };
        let outcome = adapter.fetch(1).await;
        assert_eq!(outcome.status(), AdapterStatus::Ok);
        assert_eq!(outcome.records.len(), 1);
    }
}
