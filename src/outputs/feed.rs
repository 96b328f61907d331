//! RSS 2.0 and Atom 1.0 rendering.
//!
//! Each record becomes one item. The item date is the reported date at
//! midnight UTC; records without a usable date get the generation time, an
//! `Undated` category and an explicit "not provided" line so the fallback is
//! never mistaken for a real reported date.

use super::sort_for_output;
use crate::config::FeedConfig;
use crate::error::ExportError;
use crate::models::Record;
use crate::utils::slugify;
use chrono::{DateTime, NaiveTime, SecondsFormat, Utc};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::collections::HashMap;
use std::io::Write;
use tracing::{info, instrument};

const ATOM_NS: &str = "http://www.w3.org/2005/Atom";
const GENERATOR: &str = "awful_breach_feed";

/// Everything an item needs, derived once from a record.
struct Item<'a> {
    record: &'a Record,
    link: String,
    guid: String,
    published: Option<DateTime<Utc>>,
    body: String,
}

impl<'a> Item<'a> {
    fn new(record: &'a Record) -> Self {
        let published = record
            .date_reported
            .as_ref()
            .and_then(|d| d.sort_key())
            .map(|d| d.and_time(NaiveTime::MIN).and_utc());
        Self {
            record,
            link: item_link(record),
            guid: item_guid(record),
            published,
            body: item_body(record),
        }
    }

    fn categories(&self) -> Vec<String> {
        let mut categories = Vec::new();
        if let Some(kind) = &self.record.breach_type {
            categories.push(kind.clone());
        }
        categories.push(self.record.source.clone());
        if let Some(actor) = &self.record.threat_actor {
            categories.push(format!("Actor: {actor}"));
        }
        if self.published.is_none() {
            categories.push("Undated".to_string());
        }
        categories
    }
}

/// Items in output order with document-unique guids.
///
/// Undated records are never merged, so two can share company and source;
/// later occurrences of a guid get `-2`, `-3`... appended.
fn items(records: &[Record]) -> Vec<Item<'_>> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    records
        .iter()
        .map(|record| {
            let mut item = Item::new(record);
            let count = seen.entry(item.guid.clone()).or_insert(0);
            *count += 1;
            if *count > 1 {
                item.guid = format!("{}-{}", item.guid, count);
            }
            item
        })
        .collect()
}

/// The record's link, or a search for the company when it has none.
pub fn item_link(record: &Record) -> String {
    record.url.clone().unwrap_or_else(|| {
        format!(
            "https://www.google.com/search?q={}",
            urlencoding::encode(&format!("{} data breach", record.company_name))
        )
    })
}

/// Stable identifier: `slug(company)-date-slug(source)`.
pub fn item_guid(record: &Record) -> String {
    let date = record
        .date_reported
        .as_ref()
        .map(|d| slugify(&d.display()))
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| "undated".to_string());
    format!(
        "{}-{}-{}",
        slugify(&record.company_name),
        date,
        slugify(&record.source)
    )
}

/// Description text followed by labelled metadata lines.
pub fn item_body(record: &Record) -> String {
    let mut lines = vec![
        record
            .description
            .clone()
            .unwrap_or_else(|| generated_summary(record)),
    ];
    match &record.date_reported {
        Some(date) if date.sort_key().is_some() => lines.push(format!("Date Reported: {}", date.display())),
        Some(date) => lines.push(format!("Date Reported: {} (unrecognised format)", date.raw())),
        None => lines.push("Date Reported: not provided".to_string()),
    }
    if let Some(actor) = &record.threat_actor {
        lines.push(format!("Threat Actor: {actor}"));
    }
    if let Some(count) = &record.records_affected {
        lines.push(format!("Records Affected: {count}"));
    }
    if let Some(count) = &record.state_records_affected {
        lines.push(format!("State Residents Affected: {count}"));
    }
    if let Some(location) = &record.location {
        lines.push(format!("Location: {location}"));
    }
    lines.push(format!("Source: {}", record.sources.join(", ")));
    if let Some(kind) = &record.breach_type {
        lines.push(format!("Type: {kind}"));
    }
    lines.join("\n")
}

/// One-line summary for records that arrive without a description.
fn generated_summary(record: &Record) -> String {
    let kind = record
        .breach_type
        .as_deref()
        .map(str::to_lowercase)
        .unwrap_or_else(|| "data breach".to_string());
    let mut summary = format!("{} reported a {kind}", record.company_name);
    if let Some(count) = &record.records_affected {
        summary.push_str(&format!(" affecting {count} records"));
    }
    if let Some(location) = &record.location {
        summary.push_str(&format!(" in {location}"));
    }
    if let Some(actor) = &record.threat_actor {
        summary.push_str(&format!(". Attributed to {actor}"));
    }
    summary.push('.');
    summary
}

fn start<W: Write>(writer: &mut Writer<W>, element: BytesStart<'_>) -> Result<(), ExportError> {
    writer.write_event(Event::Start(element))?;
    Ok(())
}

fn end<W: Write>(writer: &mut Writer<W>, name: &str) -> Result<(), ExportError> {
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn text_element<W: Write>(writer: &mut Writer<W>, name: &str, text: &str) -> Result<(), ExportError> {
    start(writer, BytesStart::new(name))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    end(writer, name)
}

fn empty_element<W: Write>(writer: &mut Writer<W>, element: BytesStart<'_>) -> Result<(), ExportError> {
    writer.write_event(Event::Empty(element))?;
    Ok(())
}

fn new_document() -> Result<Writer<Vec<u8>>, ExportError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    Ok(writer)
}

fn finish(writer: Writer<Vec<u8>>) -> Result<String, ExportError> {
    Ok(String::from_utf8(writer.into_inner())?)
}

/// Render an RSS 2.0 document.
#[instrument(level = "info", skip_all, fields(count = records.len()))]
pub fn render_rss(records: &[Record], feed: &FeedConfig, generated_at: DateTime<Utc>) -> Result<String, ExportError> {
    let mut sorted = records.to_vec();
    sort_for_output(&mut sorted);

    let mut w = new_document()?;
    let mut rss = BytesStart::new("rss");
    rss.push_attribute(("version", "2.0"));
    rss.push_attribute(("xmlns:atom", ATOM_NS));
    start(&mut w, rss)?;
    start(&mut w, BytesStart::new("channel"))?;
    text_element(&mut w, "title", &feed.title)?;
    text_element(&mut w, "link", &feed.link)?;
    text_element(&mut w, "description", &feed.description)?;
    text_element(&mut w, "language", "en")?;
    text_element(&mut w, "generator", GENERATOR)?;
    text_element(&mut w, "lastBuildDate", &generated_at.to_rfc2822())?;

    for item in items(&sorted) {
        let record = item.record;
        start(&mut w, BytesStart::new("item"))?;
        text_element(&mut w, "title", &record.company_name)?;
        text_element(&mut w, "link", &item.link)?;
        text_element(&mut w, "description", &item.body)?;
        let published = item.published.unwrap_or(generated_at);
        text_element(&mut w, "pubDate", &published.to_rfc2822())?;
        let mut guid = BytesStart::new("guid");
        guid.push_attribute(("isPermaLink", "false"));
        start(&mut w, guid)?;
        w.write_event(Event::Text(BytesText::new(&item.guid)))?;
        end(&mut w, "guid")?;
        for category in item.categories() {
            text_element(&mut w, "category", &category)?;
        }
        end(&mut w, "item")?;
    }

    end(&mut w, "channel")?;
    end(&mut w, "rss")?;
    let xml = finish(w)?;
    info!(bytes = xml.len(), "Rendered RSS");
    Ok(xml)
}

/// Render an Atom 1.0 document.
///
/// Undated entries carry only `<updated>` (the generation time).
#[instrument(level = "info", skip_all, fields(count = records.len()))]
pub fn render_atom(records: &[Record], feed: &FeedConfig, generated_at: DateTime<Utc>) -> Result<String, ExportError> {
    let mut sorted = records.to_vec();
    sort_for_output(&mut sorted);
    let stamp = |t: DateTime<Utc>| t.to_rfc3339_opts(SecondsFormat::Secs, true);

    let mut w = new_document()?;
    let mut root = BytesStart::new("feed");
    root.push_attribute(("xmlns", ATOM_NS));
    start(&mut w, root)?;
    text_element(&mut w, "id", &feed.link)?;
    text_element(&mut w, "title", &feed.title)?;
    text_element(&mut w, "subtitle", &feed.description)?;
    let mut link = BytesStart::new("link");
    link.push_attribute(("href", feed.link.as_str()));
    link.push_attribute(("rel", "alternate"));
    empty_element(&mut w, link)?;
    text_element(&mut w, "generator", GENERATOR)?;
    text_element(&mut w, "updated", &stamp(generated_at))?;

    for item in items(&sorted) {
        let record = item.record;
        start(&mut w, BytesStart::new("entry"))?;
        text_element(&mut w, "id", &format!("urn:breach:{}", item.guid))?;
        text_element(&mut w, "title", &record.company_name)?;
        let mut link = BytesStart::new("link");
        link.push_attribute(("href", item.link.as_str()));
        empty_element(&mut w, link)?;
        text_element(&mut w, "updated", &stamp(item.published.unwrap_or(generated_at)))?;
        if let Some(published) = item.published {
            text_element(&mut w, "published", &stamp(published))?;
        }
        start(&mut w, BytesStart::new("author"))?;
        text_element(&mut w, "name", &record.source)?;
        end(&mut w, "author")?;
        let mut summary = BytesStart::new("summary");
        summary.push_attribute(("type", "text"));
        start(&mut w, summary)?;
        w.write_event(Event::Text(BytesText::new(&item.body)))?;
        end(&mut w, "summary")?;
        for category in item.categories() {
            let mut term = BytesStart::new("category");
            term.push_attribute(("term", category.as_str()));
            empty_element(&mut w, term)?;
        }
        end(&mut w, "entry")?;
    }

    end(&mut w, "feed")?;
    let xml = finish(w)?;
    info!(bytes = xml.len(), "Rendered Atom");
    Ok(xml)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outputs::fixtures::{record, sample};
    use crate::scrapers::rss::parse_feed;
    use chrono::TimeZone;

    fn generated_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap()
    }

    #[test]
    fn test_guid_and_link() {
        let acme = &sample()[1];
        assert_eq!(item_guid(acme), "acme-corp-2024-12-23-ransomware-live");
        assert_eq!(item_link(acme), "https://example.com/acme?id=1&src=feed");

        let undated = record("Zeta Clinic", "HHS OCR", "");
        assert_eq!(item_guid(&undated), "zeta-clinic-undated-hhs-ocr");
        assert_eq!(
            item_link(&undated),
            "https://www.google.com/search?q=Zeta%20Clinic%20data%20breach"
        );
    }

    #[test]
    fn test_body_lines() {
        let body = item_body(&sample()[1]);
        assert!(body.starts_with("Acme, Inc. said"));
        assert!(body.contains("\nDate Reported: 2024-12-23"));
        assert!(body.contains("\nThreat Actor: LockBit"));
        assert!(body.contains("\nRecords Affected: 12,000"));
        assert!(body.contains("\nLocation: Portland, ME"));
        assert!(body.contains("\nSource: Ransomware.live, DataBreaches.net"));
        assert!(body.ends_with("\nType: Ransomware"));

        let undated = item_body(&record("Zeta Clinic", "HHS OCR", ""));
        assert_eq!(
            undated,
            "Zeta Clinic reported a data breach.\nDate Reported: not provided\nSource: HHS OCR"
        );
    }

    #[test]
    fn test_generated_summary() {
        let mut record = sample()[1].clone();
        record.description = None;
        assert_eq!(
            item_body(&record).lines().next(),
            Some("Acme Corp reported a ransomware affecting 12,000 records in Portland, ME. Attributed to LockBit.")
        );
    }

    #[test]
    fn test_actor_category() {
        let xml = render_rss(&sample(), &FeedConfig::default(), generated_at()).unwrap();
        assert!(xml.contains("<category>Actor: LockBit</category>"));
        assert_eq!(xml.matches("<category>Actor:").count(), 1);
    }

    #[test]
    fn test_repeated_guids_are_disambiguated() {
        let records = vec![
            record("Zeta Clinic", "HHS OCR", ""),
            record("Zeta Clinic", "HHS OCR", ""),
        ];
        let xml = render_rss(&records, &FeedConfig::default(), generated_at()).unwrap();
        assert!(xml.contains(">zeta-clinic-undated-hhs-ocr</guid>"));
        assert!(xml.contains(">zeta-clinic-undated-hhs-ocr-2</guid>"));

        let atom = render_atom(&records, &FeedConfig::default(), generated_at()).unwrap();
        assert!(atom.contains("<id>urn:breach:zeta-clinic-undated-hhs-ocr-2</id>"));
    }

    #[test]
    fn test_rss_reads_back() {
        let xml = render_rss(&sample(), &FeedConfig::default(), generated_at()).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<guid isPermaLink=\"false\">acme-corp-2024-12-23-ransomware-live</guid>"));
        assert!(xml.contains("<category>Undated</category>"));
        assert!(xml.contains("&amp;src=feed"));

        let items = parse_feed(&xml).unwrap();
        let titles: Vec<_> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["Acme Corp", "Beta LLC", "Zeta Clinic"]);
        assert_eq!(items[0].link, "https://example.com/acme?id=1&src=feed");
        assert_eq!(items[0].published, "Mon, 23 Dec 2024 00:00:00 +0000");
        assert_eq!(items[2].published, generated_at().to_rfc2822());
        assert!(items[0].summary.contains("\"attackers\" <accessed>"));
    }

    #[test]
    fn test_atom_omits_published_when_undated() {
        let xml = render_atom(&sample(), &FeedConfig::default(), generated_at()).unwrap();
        assert_eq!(xml.matches("<entry>").count(), 3);
        assert_eq!(xml.matches("<published>").count(), 2);
        assert!(xml.contains("<published>2024-12-23T00:00:00Z</published>"));
        assert!(xml.contains("<updated>2025-01-02T03:04:05Z</updated>"));

        let items = parse_feed(&xml).unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].link, "https://example.com/acme?id=1&src=feed");
        assert_eq!(items[2].published, "");
    }
}
