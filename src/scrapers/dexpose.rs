//! DeXpose intel feed.
//!
//! Posts are rendered in a grid; each grid item carries its WordPress tags as
//! `tag-*` CSS classes, and the ransomware group is one of those tags.

use crate::error::AdapterError;
use crate::models::RawRecord;
use crate::scrapers::html::element_text;
use crate::scrapers::http::{FetchText, HttpClient};
use crate::scrapers::{CapabilityClass, FetchOutcome, SourceAdapter};
use crate::utils::{MAX_DESCRIPTION_CHARS, truncate_chars};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{info, instrument};

pub const SOURCE: &str = "DeXpose";
const FEED_URL: &str = "https://www.dexpose.io/intel-feeds/";

const KNOWN_ACTORS: &[&str] = &[
    "qilin", "akira", "lockbit", "blackcat", "alphv", "clop", "play", "bianlian", "medusa",
    "rhysida", "hunters", "ransomhub", "8base", "cactus", "blackbasta", "royal", "vice", "snatch",
    "ragnar", "payoutsking", "conti", "hive", "revil", "darkside", "avaddon",
];

static GRID_ITEM: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".w-grid-item").expect("static selector"));
static TITLE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".w-post-elm-title").expect("static selector"));
static HEADING: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h2, h3, h4").expect("static selector"));
static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a").expect("static selector"));
static TIME: Lazy<Selector> = Lazy::new(|| Selector::parse("time").expect("static selector"));
static EXCERPT: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".w-post-elm-content").expect("static selector"));

/// Capitalise the first letter: `qilin` → `Qilin`.
fn title_case(s: &str) -> String {
    let mut c = s.chars();
    match c.next() {
        None => String::new(),
        Some(f) => f.to_uppercase().collect::<String>() + c.as_str(),
    }
}

fn actor_from_tags(item: ElementRef<'_>) -> String {
    item.value()
        .classes()
        .filter_map(|c| c.strip_prefix("tag-"))
        .map(str::to_lowercase)
        .find(|tag| KNOWN_ACTORS.contains(&tag.as_str()))
        .map(|tag| title_case(&tag))
        .unwrap_or_default()
}

fn parse_item(item: ElementRef<'_>, page_url: &str) -> Option<RawRecord> {
    let title_el = item
        .select(&TITLE)
        .next()
        .or_else(|| item.select(&HEADING).next())?;
    let link = title_el.select(&ANCHOR).next();
    let title = link.map(element_text).unwrap_or_else(|| element_text(title_el));
    if title.is_empty() {
        return None;
    }
    let url = link
        .and_then(|a| a.value().attr("href"))
        .filter(|h| !h.is_empty())
        .unwrap_or(page_url)
        .to_string();
    let date_reported = item
        .select(&TIME)
        .next()
        .map(|t| {
            t.value()
                .attr("datetime")
                .map(str::to_string)
                .unwrap_or_else(|| element_text(t))
        })
        .unwrap_or_default();
    let description = item
        .select(&EXCERPT)
        .next()
        .map(|e| truncate_chars(&element_text(e), MAX_DESCRIPTION_CHARS))
        .unwrap_or_default();

    Some(RawRecord {
        date_reported,
        url,
        description,
        threat_actor: actor_from_tags(item),
        breach_type: "Ransomware".to_string(),
        ..RawRecord::new(title, SOURCE)
    })
}

pub fn parse_feed_page(html: &str, page_url: &str, limit: usize) -> Result<Vec<RawRecord>, AdapterError> {
    let document = Html::parse_document(html);
    let items: Vec<ElementRef<'_>> = document
        .select(&GRID_ITEM)
        .filter(|el| el.value().classes().any(|c| c.contains("post")))
        .collect();
    if items.is_empty() {
        return Err(AdapterError::parse("no grid posts on DeXpose feed"));
    }
    Ok(items
        .into_iter()
        .filter_map(|item| parse_item(item, page_url))
        .take(limit)
        .collect())
}

#[derive(Debug)]
pub struct DeXpose {
    http: HttpClient,
    url: String,
}

impl DeXpose {
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            url: FEED_URL.to_string(),
        }
    }
}

#[async_trait]
impl SourceAdapter for DeXpose {
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
            let body = self.http.fetch_text(&self.url).await?;
            parse_feed_page(&body, &self.url, limit)
        }
        .await;
        if let Ok(records) = &result {
            info!(count = records.len(), "Fetched DeXpose posts");
        }
        result.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
    <div class="w-grid-list">
      <article class="w-grid-item post-101 post type-post tag-qilin tag-usa">
        <h2 class="w-post-elm post_title w-post-elm-title"><a href="https://www.dexpose.io/acme/">Acme Corp</a></h2>
        <time class="w-post-elm post_date" datetime="2024-12-23T08:00:00+00:00">December 23, 2024</time>
        <div class="w-post-elm-content"><p>Acme Corp appeared on a leak site.</p></div>
      </article>
      <article class="w-grid-item post-102 post type-post tag-unknowngang">
        <h3>Beta LLC</h3>
      </article>
      <div class="w-grid-item ad-slot"><h3>Sponsored</h3></div>
    </div>"#;

    #[test]
    fn test_parse_feed_page() {
        let records = parse_feed_page(PAGE, FEED_URL, 10).unwrap();
        assert_eq!(records.len(), 2);

        let acme = &records[0];
        assert_eq!(acme.company_name, "Acme Corp");
        assert_eq!(acme.threat_actor, "Qilin");
        assert_eq!(acme.url, "https://www.dexpose.io/acme/");
        assert_eq!(acme.date_reported, "2024-12-23T08:00:00+00:00");
        assert_eq!(acme.description, "Acme Corp appeared on a leak site.");

        let beta = &records[1];
        assert_eq!(beta.company_name, "Beta LLC");
        assert_eq!(beta.threat_actor, "");
        assert_eq!(beta.url, FEED_URL);
    }

    #[test]
    fn test_limit() {
        assert_eq!(parse_feed_page(PAGE, FEED_URL, 1).unwrap().len(), 1);
    }
}
