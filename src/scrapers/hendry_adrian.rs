//! Hendry Adrian ransom monitor (WordPress).
//!
//! The listing page only carries victim names and post dates. The first few
//! posts are enriched from their detail pages, which name the actor, the
//! victim country and the discovery date.

use crate::error::AdapterError;
use crate::models::RawRecord;
use crate::scrapers::html::element_text;
use crate::scrapers::http::{FetchText, HttpClient};
use crate::scrapers::{CapabilityClass, FetchOutcome, SourceAdapter};
use crate::utils::{MAX_DESCRIPTION_CHARS, truncate_chars};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::{debug, info, instrument};

pub const SOURCE: &str = "Hendry Adrian";
const LISTING_URL: &str = "https://www.hendryadrian.com/ransom-monitor/";
const DETAIL_DELAY: Duration = Duration::from_millis(300);

static POST_TITLE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h2.wp-block-post-title").expect("static selector"));
static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a").expect("static selector"));
static TIME: Lazy<Selector> = Lazy::new(|| Selector::parse("time").expect("static selector"));
static CONTENT: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.entry-content, article").expect("static selector"));
static ACTOR_LINK: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"a[href*="cse.google.com"][href*="q="]"#).expect("static selector")
});
static COUNTRY_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"a[href*="/ransom/id.php?id="]"#).expect("static selector"));
static META_DESCRIPTION: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[name="description"]"#).expect("static selector"));

static ACTOR_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Actor:\s*([^\n]+)").expect("static regex"));
static HASHTAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"#([A-Z][a-zA-Z]+)").expect("static regex"));
static CAMEL_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([a-z])([A-Z])").expect("static regex"));
static DISCOVERED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Discovered:\s*(\d{4}-\d{2}-\d{2})").expect("static regex"));

/// A victim post as listed on the monitor page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedPost {
    pub company_name: String,
    pub url: String,
    pub date: String,
}

/// Metadata recovered from a post's own page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostDetails {
    pub actor: String,
    pub country: String,
    pub discovered: String,
    pub description: String,
}

fn post_container(title: ElementRef<'_>) -> Option<ElementRef<'_>> {
    title
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().classes().any(|c| c == "wp-block-post"))
}

/// Extract up to `limit` posts from the listing page.
pub fn parse_listing(html: &str, page_url: &str, limit: usize) -> Result<Vec<ListedPost>, AdapterError> {
    let document = Html::parse_document(html);
    let titles: Vec<ElementRef<'_>> = document.select(&POST_TITLE).collect();
    if titles.is_empty() {
        return Err(AdapterError::parse("no posts on Hendry Adrian listing"));
    }

    let mut posts = Vec::new();
    for title in titles {
        if posts.len() >= limit {
            break;
        }
        let Some(link) = title.select(&ANCHOR).next() else {
            continue;
        };
        let full_title = element_text(link);
        let company_name = full_title
            .strip_prefix("Ransom!")
            .unwrap_or(&full_title)
            .trim()
            .to_string();
        if company_name.is_empty() {
            continue;
        }
        let url = link
            .value()
            .attr("href")
            .filter(|h| !h.is_empty())
            .unwrap_or(page_url)
            .to_string();
        let date = post_container(title)
            .and_then(|post| post.select(&TIME).next())
            .map(|time| {
                time.value()
                    .attr("datetime")
                    .map(str::to_string)
                    .unwrap_or_else(|| element_text(time))
            })
            .unwrap_or_default();

        posts.push(ListedPost {
            company_name,
            url,
            date,
        });
    }
    Ok(posts)
}

/// Parse a post page.
pub fn parse_details(html: &str) -> PostDetails {
    let document = Html::parse_document(html);
    let content = document
        .select(&CONTENT)
        .next()
        .unwrap_or_else(|| document.root_element());
    // keep line structure for the label regexes
    let text: String = content.text().collect();

    let actor = content
        .select(&ACTOR_LINK)
        .next()
        .map(element_text)
        .or_else(|| ACTOR_LINE.captures(&text).map(|c| c[1].trim().to_string()))
        .unwrap_or_default();

    let country = content
        .select(&COUNTRY_LINK)
        .next()
        .map(element_text)
        .or_else(|| {
            HASHTAG
                .captures(&text)
                .map(|c| CAMEL_BOUNDARY.replace_all(&c[1], "$1 $2").to_string())
        })
        .unwrap_or_default();

    let discovered = DISCOVERED
        .captures(&text)
        .map(|c| c[1].to_string())
        .unwrap_or_default();

    let description = document
        .select(&META_DESCRIPTION)
        .next()
        .and_then(|meta| meta.value().attr("content"))
        .map(|d| truncate_chars(d, MAX_DESCRIPTION_CHARS))
        .unwrap_or_default();

    PostDetails {
        actor,
        country,
        discovered,
        description,
    }
}

fn to_record(post: ListedPost, details: Option<PostDetails>) -> RawRecord {
    let details = details.unwrap_or_default();
    let date_reported = if details.discovered.is_empty() {
        post.date
    } else {
        details.discovered
    };
    RawRecord {
        date_reported,
        url: post.url,
        description: details.description,
        location: details.country,
        threat_actor: details.actor,
        breach_type: "Ransomware".to_string(),
        ..RawRecord::new(post.company_name, SOURCE)
    }
}

#[derive(Debug)]
pub struct HendryAdrian {
    http: HttpClient,
    url: String,
    detail_pages: usize,
    detail_delay: Duration,
}

impl HendryAdrian {
    pub fn new(http: HttpClient, detail_pages: usize) -> Self {
        Self {
            http,
            url: LISTING_URL.to_string(),
            detail_pages,
            detail_delay: DETAIL_DELAY,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    async fn details(&self, post_url: &str) -> Option<PostDetails> {
        match self.http.fetch_text(post_url).await {
            Ok(body) => Some(parse_details(&body)),
            Err(e) => {
                debug!(url = %post_url, error = %e, "Detail page unavailable");
                None
            }
        }
    }
}

#[async_trait]
impl SourceAdapter for HendryAdrian {
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
        let listing = async {
            let body = self.http.fetch_text(&self.url).await?;
            parse_listing(&body, &self.url, limit)
        }
        .await;
        let posts = match listing {
            Ok(posts) => posts,
            Err(e) => return FetchOutcome::failed(e),
        };

        let detail_limit = posts.len().min(self.detail_pages);
        let mut records = Vec::with_capacity(posts.len());
        for (i, post) in posts.into_iter().enumerate() {
            let details = if i < detail_limit && post.url.starts_with("http") {
                let details = self.details(&post.url).await;
                tokio::time::sleep(self.detail_delay).await;
                details
            } else {
                None
            };
            records.push(to_record(post, details));
        }

        info!(count = records.len(), detail_limit, "Fetched Hendry Adrian posts");
        FetchOutcome::ok(records)
    }
}
