//! Data models for breach reports and collection status.
//!
//! This module defines the core data structures used throughout the application:
//! - [`RawRecord`]: An unvalidated candidate exactly as an adapter scraped it
//! - [`Record`]: A normalised breach report, immutable once produced
//! - [`AdapterStatus`], [`SourceReport`], [`StatusReport`]: Per-source outcome of a collection cycle
//!
//! Adapters only ever build [`RawRecord`]s. The orchestrator turns them into
//! [`Record`]s with [`Record::from_raw`], dropping (and counting) candidates
//! that cannot be keyed.

use crate::dates::ReportedDate;
use crate::error::ValidationDrop;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Values sources use to say "we don't know".
const PLACEHOLDERS: &[&str] = &["unknown", "n/a", "na", "nan", "none", "null", "-", "not found"];

/// A candidate breach report as scraped, before validation.
///
/// All fields are free text; empty strings mean "not provided".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    pub company_name: String,
    pub date_reported: String,
    pub source: String,
    pub url: String,
    pub description: String,
    pub records_affected: String,
    pub state_records_affected: String,
    pub location: String,
    pub threat_actor: String,
    pub breach_type: String,
}

impl RawRecord {
    /// Start a candidate with the two required fields.
    pub fn new(company_name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            company_name: company_name.into(),
            source: source.into(),
            ..Default::default()
        }
    }
}

/// A normalised breach report.
///
/// `company_name` and `source` are always non-empty. `sources` is the
/// provenance list: it always starts with `source` and grows only when the
/// deduplicator merges reports of the same incident.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub company_name: String,
    pub date_reported: Option<ReportedDate>,
    pub source: String,
    pub sources: Vec<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub records_affected: Option<String>,
    pub state_records_affected: Option<String>,
    pub location: Option<String>,
    pub threat_actor: Option<String>,
    pub breach_type: Option<String>,
}

impl Record {
    /// Validate and normalise a candidate.
    ///
    /// Whitespace is collapsed, placeholders such as `Unknown` or `N/A`
    /// become absent values, and the date is parsed.
    pub fn from_raw(raw: RawRecord) -> Result<Self, ValidationDrop> {
        let company_name = clean_value(&raw.company_name).ok_or(ValidationDrop::MissingCompanyName)?;
        let source = collapse_whitespace(&raw.source);
        if source.is_empty() {
            return Err(ValidationDrop::MissingSource);
        }

        Ok(Self {
            company_name,
            date_reported: ReportedDate::parse(&raw.date_reported),
            sources: vec![source.clone()],
            source,
            url: clean_url(&raw.url),
            description: clean_text(&raw.description),
            records_affected: clean_value(&raw.records_affected),
            state_records_affected: clean_value(&raw.state_records_affected),
            location: clean_value(&raw.location),
            threat_actor: clean_value(&raw.threat_actor),
            breach_type: clean_value(&raw.breach_type),
        })
    }

    /// Whether the record carries a date that could be parsed.
    pub fn is_dated(&self) -> bool {
        self.date_reported
            .as_ref()
            .and_then(ReportedDate::sort_key)
            .is_some()
    }

    /// `records_affected` as an integer, when it is one (`"1,234"` → 1234).
    pub fn records_affected_count(&self) -> Option<u64> {
        let digits: String = self
            .records_affected
            .as_deref()?
            .chars()
            .filter(|c| !matches!(c, ',' | ' ' | '_'))
            .collect();
        digits.parse().ok()
    }

    /// Number of populated optional fields.
    pub fn populated_fields(&self) -> usize {
        [
            self.date_reported.is_some(),
            self.url.is_some(),
            self.description.is_some(),
            self.records_affected.is_some(),
            self.state_records_affected.is_some(),
            self.location.is_some(),
            self.threat_actor.is_some(),
            self.breach_type.is_some(),
        ]
        .into_iter()
        .filter(|set| *set)
        .count()
    }
}

pub(crate) fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn clean_text(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn clean_value(s: &str) -> Option<String> {
    let s = collapse_whitespace(s);
    if s.is_empty() || PLACEHOLDERS.contains(&s.to_lowercase().as_str()) {
        None
    } else {
        Some(s)
    }
}

fn clean_url(s: &str) -> Option<String> {
    let s = s.trim();
    (s.starts_with("http://") || s.starts_with("https://")).then(|| s.to_string())
}

/// Outcome class of one adapter run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterStatus {
    /// Completed without error.
    Ok,
    /// Failed part-way; records extracted before the failure are kept.
    Partial,
    /// Produced nothing usable.
    Failed,
    /// Not run this cycle (browser automation disabled).
    Skipped,
}

/// What one adapter contributed to a collection cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    pub status: AdapterStatus,
    /// Valid records kept after truncation to the limit.
    pub record_count: usize,
    /// Candidates excluded by validation.
    pub dropped: usize,
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

/// Per-source outcome of one collection cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub collected_at: DateTime<Utc>,
    pub sources: BTreeMap<String, SourceReport>,
    /// Valid records before deduplication.
    pub raw_records: usize,
    /// Records after deduplication.
    pub merged_records: usize,
}

impl StatusReport {
    pub fn new(collected_at: DateTime<Utc>) -> Self {
        Self {
            collected_at,
            sources: BTreeMap::new(),
            raw_records: 0,
            merged_records: 0,
        }
    }

    fn ran(&self) -> impl Iterator<Item = &SourceReport> {
        self.sources
            .values()
            .filter(|r| r.status != AdapterStatus::Skipped)
    }

    /// Every adapter that ran failed (and at least one ran).
    pub fn is_total_failure(&self) -> bool {
        let mut ran = self.ran().peekable();
        ran.peek().is_some() && ran.all(|r| r.status == AdapterStatus::Failed)
    }

    pub fn count(&self, status: AdapterStatus) -> usize {
        self.sources.values().filter(|r| r.status == status).count()
    }

    /// Candidates dropped by validation across all sources.
    pub fn dropped(&self) -> usize {
        self.sources.values().map(|r| r.dropped).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(status: AdapterStatus) -> SourceReport {
        SourceReport {
            status,
            record_count: 0,
            dropped: 0,
            error: None,
            elapsed_ms: 0,
        }
    }

    #[test]
    fn test_from_raw_normalises_fields() {
        let raw = RawRecord {
            company_name: "  Acme \n Corp ".to_string(),
            date_reported: "2024-12-23".to_string(),
            source: "Maine AG".to_string(),
            url: "https://example.com/notice".to_string(),
            records_affected: "Unknown".to_string(),
            state_records_affected: "N/A".to_string(),
            threat_actor: "".to_string(),
            breach_type: "State Registry".to_string(),
            ..Default::default()
        };

        let record = Record::from_raw(raw).unwrap();
        assert_eq!(record.company_name, "Acme Corp");
        assert_eq!(record.sources, vec!["Maine AG".to_string()]);
        assert_eq!(record.records_affected, None);
        assert_eq!(record.state_records_affected, None);
        assert_eq!(record.threat_actor, None);
        assert!(record.is_dated());
        assert_eq!(record.breach_type.as_deref(), Some("State Registry"));
    }

    #[test]
    fn test_from_raw_drops_unkeyable_candidates() {
        assert_eq!(
            Record::from_raw(RawRecord::new("   ", "HHS OCR")),
            Err(ValidationDrop::MissingCompanyName)
        );
        assert_eq!(
            Record::from_raw(RawRecord::new("Unknown", "HHS OCR")),
            Err(ValidationDrop::MissingCompanyName)
        );
        assert_eq!(
            Record::from_raw(RawRecord::new("Acme", "")),
            Err(ValidationDrop::MissingSource)
        );
    }

    #[test]
    fn test_non_http_url_is_absent() {
        let mut raw = RawRecord::new("Acme", "Rescana");
        raw.url = "/post/acme".to_string();
        assert_eq!(Record::from_raw(raw).unwrap().url, None);
    }

    #[test]
    fn test_unparseable_date_is_retained_but_undated() {
        let mut raw = RawRecord::new("Acme", "BreachSense");
        raw.date_reported = "last Tuesday".to_string();
        let record = Record::from_raw(raw).unwrap();
        assert_eq!(record.date_reported.as_ref().unwrap().raw(), "last Tuesday");
        assert!(!record.is_dated());
    }

    #[test]
    fn test_records_affected_count() {
        let mut raw = RawRecord::new("Acme", "HHS OCR");
        raw.records_affected = "1,234,567".to_string();
        let record = Record::from_raw(raw).unwrap();
        assert_eq!(record.records_affected_count(), Some(1_234_567));
    }

    #[test]
    fn test_total_failure_ignores_skipped() {
        let mut status = StatusReport::new(Utc::now());
        assert!(!status.is_total_failure());

        status.sources.insert("a".into(), report(AdapterStatus::Failed));
        status.sources.insert("b".into(), report(AdapterStatus::Skipped));
        assert!(status.is_total_failure());

        status.sources.insert("c".into(), report(AdapterStatus::Partial));
        assert!(!status.is_total_failure());
        assert_eq!(status.count(AdapterStatus::Failed), 1);
    }
}
