//! Syndication-feed adapters.
//!
//! One streaming RSS 2.0 / Atom 1.0 parser ([`parse_feed`]) backs every
//! feed-based source. Feeds differ only in URL, headline filter, breach type
//! and, for Red Packet Security, how the title is split into actor and victim.

use crate::config::NewsFeed;
use crate::error::AdapterError;
use crate::models::RawRecord;
use crate::scrapers::http::{FetchText, HttpClient};
use crate::scrapers::{CapabilityClass, FetchOutcome, SourceAdapter};
use crate::utils::{MAX_DESCRIPTION_CHARS, html_to_text, matches_keywords, truncate_chars};
use async_trait::async_trait;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::{info, instrument, warn};

pub const DATABREACHES_NET: &str = "DataBreaches.net";
pub const HIPAA_JOURNAL: &str = "HIPAA Journal";
pub const BLEEPING_COMPUTER: &str = "BleepingComputer";
pub const RED_PACKET_SECURITY: &str = "Red Packet Security";

const HIPAA_KEYWORDS: &[&str] = &[
    "breach", "hack", "ransomware", "exposed", "attack", "hipaa", "leak", "cyberattack", "data",
];

const BLEEPING_KEYWORDS: &[&str] = &[
    "breach", "ransomware", "hack", "leak", "attack", "data stolen", "cyberattack", "compromised",
];

const NEWS_KEYWORDS: &[&str] = &[
    "breach", "ransomware", "hack", "leak", "attack", "data", "malware", "phishing",
    "vulnerability", "exploit", "threat", "cyber", "security", "compromise", "stolen", "exposed",
];

/// One `<item>` or `<entry>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub published: String,
    pub updated: String,
    /// `description`/`summary`, or `content:encoded`/`content` when no summary exists.
    pub summary: String,
}

#[derive(Debug, Default)]
struct ItemBuilder {
    item: FeedItem,
    content: String,
}

impl ItemBuilder {
    fn push_text(&mut self, tag: &str, text: &str) {
        let field = match tag {
            "title" => &mut self.item.title,
            "link" => &mut self.item.link,
            "pubDate" | "published" | "date" => &mut self.item.published,
            "updated" => &mut self.item.updated,
            "description" | "summary" => &mut self.item.summary,
            "encoded" | "content" => &mut self.content,
            _ => return,
        };
        field.push_str(text);
    }

    fn link_attr(&mut self, e: &BytesStart<'_>) {
        if !self.item.link.is_empty() {
            return;
        }
        let rel = e
            .try_get_attribute("rel")
            .ok()
            .flatten()
            .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()));
        if rel.as_deref().is_some_and(|r| r != "alternate") {
            return;
        }
        if let Some(href) = e
            .try_get_attribute("href")
            .ok()
            .flatten()
            .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
        {
            self.item.link = href;
        }
    }

    fn finish(mut self) -> FeedItem {
        if self.item.summary.trim().is_empty() {
            self.item.summary = self.content;
        }
        self.item.title = self.item.title.trim().to_string();
        self.item.link = self.item.link.trim().to_string();
        self.item
    }
}

/// Parse an RSS 2.0 or Atom document into its items, in document order.
pub fn parse_feed(xml: &str) -> Result<Vec<FeedItem>, AdapterError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut items = Vec::new();
    let mut current: Option<ItemBuilder> = None;
    let mut tag = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                match name.as_str() {
                    "item" | "entry" => current = Some(ItemBuilder::default()),
                    "link" => {
                        if let Some(builder) = current.as_mut() {
                            builder.link_attr(&e);
                        }
                        tag = name;
                    }
                    _ => tag = name,
                }
            }
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"link" {
                    if let Some(builder) = current.as_mut() {
                        builder.link_attr(&e);
                    }
                }
            }
            Ok(Event::Text(e)) => {
                if let Some(builder) = current.as_mut() {
                    let text = e
                        .unescape()
                        .map(|t| t.into_owned())
                        .unwrap_or_else(|_| String::from_utf8_lossy(&e).into_owned());
                    builder.push_text(&tag, &text);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(builder) = current.as_mut() {
                    let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                    builder.push_text(&tag, &text);
                }
            }
            Ok(Event::End(e)) => {
                let name = e.local_name();
                if matches!(name.as_ref(), b"item" | b"entry") {
                    if let Some(builder) = current.take() {
                        items.push(builder.finish());
                    }
                }
                tag.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(AdapterError::Xml(format!(
                    "at byte {}: {e}",
                    reader.buffer_position()
                )));
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(items)
}

/// How a feed title maps onto a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TitleStyle {
    /// The headline is the record's subject.
    Headline,
    /// `[GROUP] – Ransomware Victim: Company`.
    VictimPost,
}

/// Split a Red Packet Security title into `(actor, company)`.
pub fn split_victim_title(title: &str) -> (String, String) {
    let title = title.trim();
    let Some(rest) = title.strip_prefix('[') else {
        return (String::new(), title.to_string());
    };
    let Some(end) = rest.find(']') else {
        return (String::new(), title.to_string());
    };
    let actor = rest[..end].trim().to_string();
    let company = if let Some((_, company)) = title.rsplit_once("Ransomware Victim:") {
        company.trim().to_string()
    } else if let Some((_, company)) = title.rsplit_once('–') {
        company.trim().to_string()
    } else {
        title.to_string()
    };
    (actor, company)
}

/// A syndication feed turned into breach records.
#[derive(Debug)]
pub struct FeedAdapter {
    name: String,
    /// Tried in order until one yields records.
    urls: Vec<String>,
    keywords: &'static [&'static str],
    breach_type: String,
    style: TitleStyle,
    default_limit: usize,
    http: HttpClient,
}

impl FeedAdapter {
    fn new(
        http: HttpClient,
        name: &str,
        urls: &[&str],
        keywords: &'static [&'static str],
        breach_type: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            urls: urls.iter().map(|u| u.to_string()).collect(),
            keywords,
            breach_type: breach_type.to_string(),
            style: TitleStyle::Headline,
            default_limit: 30,
            http,
        }
    }

    pub fn databreaches_net(http: HttpClient) -> Self {
        Self {
            default_limit: 50,
            ..Self::new(http, DATABREACHES_NET, &["https://databreaches.net/feed/"], &[], "Data Breach")
        }
    }

    pub fn hipaa_journal(http: HttpClient) -> Self {
        Self::new(
            http,
            HIPAA_JOURNAL,
            &[
                "https://www.hipaajournal.com/feed/",
                "https://www.hipaajournal.com/category/hipaa-breach-news/feed/",
            ],
            HIPAA_KEYWORDS,
            "Healthcare Breach",
        )
    }

    pub fn bleeping_computer(http: HttpClient) -> Self {
        Self::new(
            http,
            BLEEPING_COMPUTER,
            &["https://www.bleepingcomputer.com/feed/"],
            BLEEPING_KEYWORDS,
            "Security News",
        )
    }

    pub fn red_packet_security(http: HttpClient) -> Self {
        Self {
            style: TitleStyle::VictimPost,
            default_limit: 50,
            ..Self::new(
                http,
                RED_PACKET_SECURITY,
                &["https://www.redpacketsecurity.com/category/ransomware/feed/"],
                &[],
                "Ransomware",
            )
        }
    }

    /// A configured security-news feed.
    pub fn news(http: HttpClient, feed: &NewsFeed) -> Self {
        Self {
            default_limit: 20,
            ..Self::new(http, &feed.name, &[feed.url.as_str()], NEWS_KEYWORDS, &feed.category)
        }
    }

    /// Same adapter reading from other URLs.
    pub fn with_urls(mut self, urls: Vec<String>) -> Self {
        self.urls = urls;
        self
    }

    /// Convert parsed items into at most `limit` candidates.
    fn records(&self, items: Vec<FeedItem>, limit: usize) -> Vec<RawRecord> {
        items
            .into_iter()
            .filter(|item| matches_keywords(&item.title, self.keywords))
            .take(limit)
            .map(|item| self.record(item))
            .collect()
    }

    fn record(&self, item: FeedItem) -> RawRecord {
        let (threat_actor, company_name) = match self.style {
            TitleStyle::Headline => (String::new(), item.title),
            TitleStyle::VictimPost => split_victim_title(&item.title),
        };
        let date_reported = if item.published.trim().is_empty() {
            item.updated
        } else {
            item.published
        };
        RawRecord {
            date_reported,
            url: item.link,
            description: truncate_chars(&html_to_text(&item.summary), MAX_DESCRIPTION_CHARS),
            threat_actor,
            breach_type: self.breach_type.clone(),
            ..RawRecord::new(company_name, self.name.clone())
        }
    }
}

#[async_trait]
impl SourceAdapter for FeedAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn capability(&self) -> CapabilityClass {
        CapabilityClass::SyndicationFeed
    }

    fn default_limit(&self) -> usize {
        self.default_limit
    }

    #[instrument(level = "info", skip_all, fields(source = %self.name, limit = limit))]
    async fn fetch(&self, limit: usize) -> FetchOutcome {
        let mut last_error = None;
        let mut reachable = false;

        for url in &self.urls {
            let parsed = match self.http.fetch_text(url).await {
                Ok(body) => parse_feed(&body),
                Err(e) => Err(e),
            };
            match parsed {
                Ok(items) => {
                    reachable = true;
                    let total = items.len();
                    let records = self.records(items, limit);
                    info!(%url, items = total, count = records.len(), "Parsed feed");
                    if !records.is_empty() {
                        return FetchOutcome::ok(records);
                    }
                }
                Err(e) => {
                    warn!(%url, error = %e, "Feed unavailable");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if !reachable => FetchOutcome::failed(e),
            _ => FetchOutcome::ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CollectionConfig;
    use crate::models::AdapterStatus;
    use crate::scrapers::http::build_client;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:content="http://purl.org/rss/1.0/modules/content/">
  <channel>
    <title>Example</title>
    <link>https://example.com</link>
    <item>
      <title>Acme Corp discloses data breach</title>
      <link>https://example.com/acme</link>
      <pubDate>Mon, 23 Dec 2024 14:05:00 +0000</pubDate>
      <description><![CDATA[<p>Attackers accessed <b>customer</b> records.</p>]]></description>
    </item>
    <item>
      <title>Quarterly roundup &amp; podcast</title>
      <link>https://example.com/roundup</link>
      <description>Nothing to see &lt;here&gt;</description>
    </item>
    <item>
      <title>[AKIRA] – Ransomware Victim: Beta Logistics</title>
      <link>https://example.com/beta</link>
      <content:encoded><![CDATA[<div>Full post</div>]]></content:encoded>
    </item>
  </channel>
</rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Example</title>
  <entry>
    <title>Gamma Health hit by ransomware</title>
    <link rel="self" href="https://example.com/self"/>
    <link rel="alternate" href="https://example.com/gamma"/>
    <updated>2024-12-20T08:00:00Z</updated>
    <summary type="html">&lt;p&gt;Gamma summary&lt;/p&gt;</summary>
  </entry>
</feed>"#;

    fn client() -> HttpClient {
        build_client(&CollectionConfig::default()).unwrap()
    }

    #[test]
    fn test_parse_rss() {
        let items = parse_feed(RSS).unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].title, "Acme Corp discloses data breach");
        assert_eq!(items[0].link, "https://example.com/acme");
        assert_eq!(items[0].published, "Mon, 23 Dec 2024 14:05:00 +0000");
        assert_eq!(
            html_to_text(&items[0].summary),
            "Attackers accessed customer records."
        );
        assert_eq!(items[1].title, "Quarterly roundup & podcast");
        assert_eq!(items[1].summary, "Nothing to see <here>");
        assert_eq!(items[2].summary, "<div>Full post</div>");
    }

    #[test]
    fn test_parse_atom() {
        let items = parse_feed(ATOM).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].link, "https://example.com/gamma");
        assert_eq!(items[0].updated, "2024-12-20T08:00:00Z");
        assert_eq!(html_to_text(&items[0].summary), "Gamma summary");
    }

    #[test]
    fn test_malformed_feed_is_an_error() {
        let err = parse_feed("<rss><channel><item><title>x</item></rss>").unwrap_err();
        assert!(matches!(err, AdapterError::Xml(_)));
    }

    #[test]
    fn test_split_victim_title() {
        assert_eq!(
            split_victim_title("[AKIRA] – Ransomware Victim: Beta Logistics"),
            ("AKIRA".to_string(), "Beta Logistics".to_string())
        );
        assert_eq!(
            split_victim_title("[QILIN] – Delta Farms"),
            ("QILIN".to_string(), "Delta Farms".to_string())
        );
        assert_eq!(
            split_victim_title("Plain headline"),
            (String::new(), "Plain headline".to_string())
        );
    }

    #[test]
    fn test_keyword_filter_and_limit() {
        let adapter = FeedAdapter::bleeping_computer(client());
        let records = adapter.records(parse_feed(RSS).unwrap(), 10);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].company_name, "Acme Corp discloses data breach");
        assert_eq!(records[0].source, "BleepingComputer");
        assert_eq!(records[0].breach_type, "Security News");
        assert_eq!(records[0].date_reported, "Mon, 23 Dec 2024 14:05:00 +0000");
        assert!(records[1].company_name.contains("Beta Logistics"));

        let adapter = FeedAdapter::databreaches_net(client());
        assert_eq!(adapter.records(parse_feed(RSS).unwrap(), 2).len(), 2);
    }

    #[test]
    fn test_red_packet_records() {
        let adapter = FeedAdapter::red_packet_security(client());
        let records = adapter.records(parse_feed(RSS).unwrap(), 10);
        let beta = &records[2];
        assert_eq!(beta.company_name, "Beta Logistics");
        assert_eq!(beta.threat_actor, "AKIRA");
        assert_eq!(beta.description, "Full post");
    }

    #[tokio::test]
    async fn test_falls_back_to_second_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/primary"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/fallback"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RSS))
            .mount(&server)
            .await;

        let adapter = FeedAdapter::hipaa_journal(client()).with_urls(vec![
            format!("{}/primary", server.uri()),
            format!("{}/fallback", server.uri()),
        ]);
        let outcome = adapter.fetch(10).await;
        assert_eq!(outcome.status(), AdapterStatus::Ok);
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.records[0].source, "HIPAA Journal");
        assert_eq!(outcome.records[0].breach_type, "Healthcare Breach");
    }

    #[tokio::test]
    async fn test_all_urls_down_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let adapter =
            FeedAdapter::databreaches_net(client()).with_urls(vec![format!("{}/feed", server.uri())]);
        let outcome = adapter.fetch(10).await;
        assert_eq!(outcome.status(), AdapterStatus::Failed);
    }
}
