//! Washington Attorney General data breach notifications.

use crate::browser::{BrowserLane, BrowserLease};
use crate::error::AdapterError;
use crate::models::RawRecord;
use crate::scrapers::html::{cell, extract_tables};
use crate::scrapers::{CapabilityClass, FetchOutcome, SourceAdapter};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

pub const SOURCE: &str = "Washington AG";
const NOTIFICATIONS_URL: &str = "https://www.atg.wa.gov/data-breach-notifications";

/// Responsive layouts repeat the column label inside each cell
/// (`Date Reported 12/23/2024`); strip it when present.
fn without_label(value: String, label: &str) -> String {
    let labelled = value
        .get(..label.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(label));
    if labelled {
        value[label.len()..].trim_start_matches([':', ' ']).to_string()
    } else {
        value
    }
}

pub fn parse_notifications(
    html: &str,
    page_url: &str,
    limit: usize,
) -> Result<Vec<RawRecord>, AdapterError> {
    let tables = extract_tables(html);
    let table = tables
        .first()
        .ok_or_else(|| AdapterError::parse("notification table not found on Washington AG page"))?;

    let name = table.column_containing("organization name").or(Some(0));
    let date = table.column_containing("date reported").or(Some(1));
    let residents = table
        .column_containing("number of washingtonians affected")
        .or(Some(2));

    Ok(table
        .rows
        .iter()
        .take(limit)
        .map(|row| RawRecord {
            date_reported: without_label(cell(row, date), "Date Reported"),
            url: page_url.to_string(),
            state_records_affected: without_label(
                cell(row, residents),
                "Number of Washingtonians Affected",
            ),
            location: "Washington".to_string(),
            breach_type: "State Registry".to_string(),
            ..RawRecord::new(without_label(cell(row, name), "Organization Name"), SOURCE)
        })
        .collect())
}

#[derive(Debug)]
pub struct WashingtonAg {
    lane: Arc<BrowserLane>,
    url: String,
    settle: Duration,
}

impl WashingtonAg {
    pub fn new(lane: Arc<BrowserLane>) -> Self {
        Self {
            lane,
            url: NOTIFICATIONS_URL.to_string(),
            settle: Duration::from_secs(3),
        }
    }

    async fn scrape(&self, lease: &mut BrowserLease, limit: usize) -> Result<Vec<RawRecord>, AdapterError> {
        let html = lease.render(&self.url, self.settle).await?;
        parse_notifications(&html, &self.url, limit)
    }
}

#[async_trait]
impl SourceAdapter for WashingtonAg {
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
            info!(count = records.len(), "Fetched Washington AG notifications");
        }
        result.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::testing::FakeLauncher;
    use crate::models::AdapterStatus;
    use std::sync::atomic::Ordering;

    #[test]
    fn test_parse_with_headers() {
        let html = r#"
        <table>
          <tr><th>Date Reported</th><th>Organization Name</th><th>Date of Breach</th>
              <th>Number of Washingtonians Affected</th></tr>
          <tr><td>12/23/2024</td><td>Acme Corp</td><td>11/02/2024</td><td>2,100</td></tr>
        </table>"#;
        let records = parse_notifications(html, NOTIFICATIONS_URL, 10).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].company_name, "Acme Corp");
        assert_eq!(records[0].date_reported, "12/23/2024");
        assert_eq!(records[0].state_records_affected, "2,100");
        assert_eq!(records[0].location, "Washington");
    }

    #[test]
    fn test_parse_labelled_cells() {
        let html = r#"
        <table>
          <tr><td>Organization Name Beta LLC</td><td>Date Reported: 12/20/2024</td>
              <td>Number of Washingtonians Affected 640</td></tr>
        </table>"#;
        let records = parse_notifications(html, NOTIFICATIONS_URL, 10).unwrap();
        assert_eq!(records[0].company_name, "Beta LLC");
        assert_eq!(records[0].date_reported, "12/20/2024");
        assert_eq!(records[0].state_records_affected, "640");
    }

    #[tokio::test]
    async fn test_fetch_releases_lane() {
        let launcher = FakeLauncher::default().page(
            NOTIFICATIONS_URL,
            "<table><tr><td>Acme</td><td>12/23/2024</td><td>1</td></tr></table>",
        );
        let counters = Arc::clone(&launcher.counters);
        let adapter = WashingtonAg {
            settle: Duration::ZERO,
            ..WashingtonAg::new(Arc::new(BrowserLane::new(Arc::new(launcher))))
        };
        let outcome = adapter.fetch(10).await;
        assert_eq!(outcome.status(), AdapterStatus::Ok);
        assert_eq!(outcome.records[0].company_name, "Acme");
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
        assert_eq!(counters.active.load(Ordering::SeqCst), 0);
    }
}
