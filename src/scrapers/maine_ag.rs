//! Maine Attorney General breach notices.
//!
//! The list page is rendered client-side and links each notice by a UUID
//! file name. Notice pages are a column of `Key: Value` lines.

use crate::browser::{BrowserLane, BrowserLease};
use crate::error::AdapterError;
use crate::models::RawRecord;
use crate::scrapers::{CapabilityClass, FetchOutcome, SourceAdapter};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};
use url::Url;

pub const SOURCE: &str = "Maine AG";
const BASE_URL: &str =
    "https://www.maine.gov/agviewer/content/ag/985235c7-cb95-4be2-8792-a1252b4f8318/";
const CONTENT_TEXT: &str = "document.querySelector('#content')?.innerText ?? ''";

static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("static selector"));
static NOTICE_FILE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-f0-9]{8}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{12}\.s?html$")
        .expect("static regex")
});

/// Notice URLs linked from the list page, in page order without repeats.
pub fn notice_links(html: &str, base: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut links: Vec<String> = Vec::new();
    for anchor in document.select(&ANCHOR) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let file = href.rsplit('/').next().unwrap_or(href);
        if !NOTICE_FILE.is_match(file) {
            continue;
        }
        if let Ok(url) = base.join(href) {
            let url = url.to_string();
            if !links.contains(&url) {
                links.push(url);
            }
        }
    }
    links
}

/// Parse the `Key: Value` text of a notice page.
pub fn parse_notice(text: &str, url: &str) -> RawRecord {
    let fields: HashMap<&str, &str> = text
        .lines()
        .filter_map(|line| line.split_once(": "))
        .map(|(k, v)| (k.trim(), v.trim()))
        .collect();
    let get = |key: &str| fields.get(key).copied().unwrap_or_default().to_string();

    let date_reported = fields
        .get("Date(s) of consumer notification")
        .or_else(|| fields.get("Date Breach Discovered"))
        .copied()
        .unwrap_or_default()
        .to_string();
    let city = get("City");
    let state = get("State, or Country if outside the US");
    let location = [city.as_str(), state.as_str()]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ");

    RawRecord {
        date_reported,
        url: url.to_string(),
        records_affected: get("Total number of persons affected (including residents)"),
        state_records_affected: get("Total number of Maine residents affected"),
        location,
        breach_type: "State Registry".to_string(),
        ..RawRecord::new(get("Entity Name"), SOURCE)
    }
}

#[derive(Debug)]
pub struct MaineAg {
    lane: Arc<BrowserLane>,
    base: String,
    settle: Duration,
}

impl MaineAg {
    pub fn new(lane: Arc<BrowserLane>) -> Self {
        Self {
            lane,
            base: BASE_URL.to_string(),
            settle: Duration::from_secs(3),
        }
    }

    async fn scrape(&self, lease: &mut BrowserLease, limit: usize) -> FetchOutcome {
        let base = match Url::parse(&self.base) {
            Ok(base) => base,
            Err(e) => return FetchOutcome::failed(e.into()),
        };
        let list_url = format!("{}list.html", self.base);
        let links = match lease.render(&list_url, self.settle).await {
            Ok(html) => notice_links(&html, &base),
            Err(e) => return FetchOutcome::failed(e),
        };
        if links.is_empty() {
            return FetchOutcome::failed(AdapterError::parse("no notices on Maine AG list"));
        }

        let mut records = Vec::new();
        let mut last_error = None;
        for url in links.into_iter().take(limit) {
            let text = async {
                lease.goto(&url, self.settle / 3).await?;
                lease.evaluate(CONTENT_TEXT).await
            }
            .await;
            match text {
                Ok(value) => {
                    let text = value.as_str().unwrap_or_default();
                    records.push(parse_notice(text, &url));
                }
                Err(e) => {
                    debug!(%url, error = %e, "Notice page failed");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if records.is_empty() => FetchOutcome::failed(e),
            Some(e) => FetchOutcome::partial(records, e),
            None => FetchOutcome::ok(records),
        }
    }
}

#[async_trait]
impl SourceAdapter for MaineAg {
    fn name(&self) -> &str {
        SOURCE
    }

    fn capability(&self) -> CapabilityClass {
        CapabilityClass::BrowserAutomation
    }

    fn default_limit(&self) -> usize {
        20
    }

    #[instrument(level = "info", skip_all, fields(source = SOURCE, limit = limit))]
    async fn fetch(&self, limit: usize) -> FetchOutcome {
        let mut lease = match self.lane.lease().await {
            Ok(lease) => lease,
            Err(e) => return FetchOutcome::failed(e),
        };
        let outcome = self.scrape(&mut lease, limit).await;
        lease.release().await;
        info!(count = outcome.records.len(), "Fetched Maine AG notices");
        outcome
    }
}
