//! Rescana threat-intel blog.

use crate::browser::{BrowserLane, BrowserLease};
use crate::error::AdapterError;
use crate::models::RawRecord;
use crate::scrapers::html::element_text;
use crate::scrapers::{CapabilityClass, FetchOutcome, SourceAdapter};
use crate::utils::matches_keywords;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};
use url::Url;

pub const SOURCE: &str = "Rescana";
const BLOG_URL: &str = "https://www.rescana.com/blog";
const SCROLL_TO_END: &str = "window.scrollTo(0, document.body.scrollHeight)";

const KEYWORDS: &[&str] = &[
    "breach", "ransomware", "hack", "cyber", "attack", "security", "threat", "vulnerability",
    "malware", "data", "incident",
];

static POST_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"a[href*="/post/"]"#).expect("static selector"));
static DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)[a-z]*\.? \d{1,2},? \d{4}\b|\b\d{1,2}/\d{1,2}/\d{4}\b")
        .expect("static regex")
});

fn title_from_slug(href: &str) -> String {
    href.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .split('-')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut c = w.chars();
            match c.next() {
                Some(f) => f.to_uppercase().collect::<String>() + c.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn post_date(link: ElementRef<'_>) -> String {
    link.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| matches!(el.value().name(), "article" | "div"))
        .and_then(|card| DATE.find(&element_text(card)).map(|m| m.as_str().to_string()))
        .unwrap_or_default()
}

pub fn parse_blog(html: &str, page_url: &str, limit: usize) -> Result<Vec<RawRecord>, AdapterError> {
    let base = Url::parse(page_url)?;
    let document = Html::parse_document(html);
    let mut seen: Vec<String> = Vec::new();
    let mut records = Vec::new();

    for link in document.select(&POST_LINK) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let Ok(url) = base.join(href) else {
            continue;
        };
        let url = url.to_string();
        if seen.contains(&url) {
            continue;
        }
        seen.push(url.clone());

        let mut title = element_text(link);
        if title.is_empty() {
            title = link
                .value()
                .attr("title")
                .filter(|t| !t.trim().is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| title_from_slug(href));
        }
        if title.is_empty() || !matches_keywords(&title, KEYWORDS) {
            continue;
        }

        records.push(RawRecord {
            date_reported: post_date(link),
            url,
            breach_type: "Threat Intel".to_string(),
            ..RawRecord::new(title, SOURCE)
        });
        if records.len() >= limit {
            break;
        }
    }

    if seen.is_empty() {
        return Err(AdapterError::parse("no posts on Rescana blog"));
    }
    Ok(records)
}

#[derive(Debug)]
pub struct Rescana {
    lane: Arc<BrowserLane>,
    url: String,
    settle: Duration,
}

impl Rescana {
    pub fn new(lane: Arc<BrowserLane>) -> Self {
        Self {
            lane,
            url: BLOG_URL.to_string(),
            settle: Duration::from_secs(5),
        }
    }

    async fn scrape(&self, lease: &mut BrowserLease, limit: usize) -> Result<Vec<RawRecord>, AdapterError> {
        lease.goto(&self.url, self.settle).await?;
        // Lazy-loaded posts only appear after scrolling.
        lease.evaluate(SCROLL_TO_END).await?;
        tokio::time::sleep(self.settle / 2).await;
        let html = lease.content().await?;
        parse_blog(&html, &self.url, limit)
    }
}

#[async_trait]
impl SourceAdapter for Rescana {
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
        let result = self.scrape(&mut lease, limit).await;
        lease.release().await;
        if let Ok(records) = &result {
            info!(count = records.len(), "Fetched Rescana posts");
        }
        result.into()
    }
}
