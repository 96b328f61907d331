//! BreachSense breach listing scraper.
//!
//! `https://www.breachsense.com/breaches/` links one card per victim; card
//! links end in `-data-breach`. Threat actor and date are only available as
//! free text inside the card.

use crate::error::AdapterError;
use crate::models::RawRecord;
use crate::scrapers::html::element_text;
use crate::scrapers::http::{FetchText, HttpClient};
use crate::scrapers::{CapabilityClass, FetchOutcome, SourceAdapter};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::{debug, info, instrument};
use url::Url;

pub const SOURCE: &str = "BreachSense";
const LISTING_URL: &str = "https://www.breachsense.com/breaches/";

static BREACH_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"a[href*="-data-breach"]"#).expect("static selector"));
static HEADING: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h2, h3, h4").expect("static selector"));

static ACTOR_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [r"(?i)threat actor[:\s]+(\w+)", r"Group[:\s]+(\w+)"]
        .into_iter()
        .map(|p| Regex::new(p).expect("static regex"))
        .collect()
});

static DATE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)((?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)[a-z]*\s+\d{1,2},?\s*\d{4})",
        r"(\d{1,2}/\d{1,2}/\d{2,4})",
        r"(\d{4}-\d{2}-\d{2})",
        r"(?i)(\d{1,2}\s+(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)[a-z]*\s+\d{4})",
    ]
    .into_iter()
    .map(|p| Regex::new(p).expect("static regex"))
    .collect()
});

fn first_capture(patterns: &[Regex], text: &str) -> String {
    patterns
        .iter()
        .find_map(|re| re.captures(text))
        .map(|caps| caps[1].to_string())
        .unwrap_or_default()
}

fn card_of(link: ElementRef<'_>) -> Option<ElementRef<'_>> {
    link.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| matches!(el.value().name(), "article" | "div" | "section"))
}

/// Extract at most `limit` victims from the listing page.
pub fn parse_listing(html: &str, base: &Url, limit: usize) -> Result<Vec<RawRecord>, AdapterError> {
    let document = Html::parse_document(html);
    let links: Vec<ElementRef<'_>> = document.select(&BREACH_LINK).collect();
    if links.is_empty() {
        return Err(AdapterError::parse("no breach links on BreachSense listing"));
    }

    let mut seen = HashSet::new();
    let mut records = Vec::new();
    for link in links {
        if records.len() >= limit {
            break;
        }
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let Ok(url) = base.join(href) else {
            debug!(%href, "Unresolvable link");
            continue;
        };
        if !seen.insert(url.to_string()) {
            continue;
        }

        let title = link
            .select(&HEADING)
            .next()
            .map(element_text)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| element_text(link));
        let company = title.replace("Data Breach", "").replace("data-breach", "");
        let company = company.trim();
        if company.is_empty() {
            continue;
        }

        let card_text = card_of(link).map(element_text).unwrap_or_default();
        records.push(RawRecord {
            url: url.to_string(),
            threat_actor: first_capture(&ACTOR_PATTERNS, &card_text),
            date_reported: first_capture(&DATE_PATTERNS, &card_text),
            breach_type: "Ransomware".to_string(),
            ..RawRecord::new(company, SOURCE)
        });
    }
    Ok(records)
}

#[derive(Debug)]
pub struct BreachSense {
    http: HttpClient,
    url: String,
}

impl BreachSense {
    pub fn new(http: HttpClient) -> Self {
        Self::with_url(http, LISTING_URL)
    }

    pub fn with_url(http: HttpClient, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }
}

#[async_trait]
impl SourceAdapter for BreachSense {
    fn name(&self) -> &str {
        SOURCE
    }

    fn capability(&self) -> CapabilityClass {
        CapabilityClass::StaticScrape
    }

    fn default_limit(&self) -> usize {
        50
    }

    #[instrument(level = "info", skip_all, fields(source = SOURCE, limit = limit))]
    async fn fetch(&self, limit: usize) -> FetchOutcome {
        let result = async {
            let base = Url::parse(&self.url)?;
            let body = self.http.fetch_text(&self.url).await?;
            parse_listing(&body, &base, limit)
        }
        .await;
        if let Ok(records) = &result {
            info!(count = records.len(), "Fetched BreachSense listing");
        }
        result.into()
    }
}
