//! Reported-date parsing.
//!
//! Sources publish dates in every format imaginable: RFC 2822 feed dates,
//! ISO timestamps with microseconds, US `MM/DD/YYYY` registry dates, prose
//! like `Dec 23, 2024`, and month-only values like `March 2024`. Everything
//! is folded into a [`ReportedDate`] that keeps the raw text and, when the
//! text could be understood, a comparable calendar value.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

static FRACTIONAL_SECONDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{2}:\d{2}:\d{2})\.\d+").expect("static regex"));
static ISO_DAY_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4}-\d{2}-\d{2})").expect("static regex"));
static ISO_MONTH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{1,2})$").expect("static regex"));
static SLASH_MONTH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})/(\d{4})$").expect("static regex"));
static SLASH_SHORT_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,2}/\d{1,2}/\d{2}$").expect("static regex"));

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%b %d, %Y",
    "%b %d %Y",
    "%d %b %Y",
    "%d %b, %Y",
    "%Y/%m/%d",
];

/// How much of a calendar date a source actually told us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParsedDate {
    /// A specific day.
    Day(NaiveDate),
    /// Month and year only; stored as the first of the month.
    Month(NaiveDate),
    /// Text that could not be understood.
    Unparsed,
}

/// Granularity used when comparing dates for entity resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateGranularity {
    Day,
    #[default]
    Month,
    Year,
}

/// A coarse date value two records must share to be considered the same incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateBucket {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

/// A reported date as published, plus its parsed value if any.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReportedDate {
    raw: String,
    parsed: ParsedDate,
}

impl ReportedDate {
    /// Parse raw text. Returns `None` for empty input.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        Some(Self {
            raw: raw.to_string(),
            parsed: parse_date_text(raw),
        })
    }

    /// The text exactly as the source published it (trimmed).
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn parsed(&self) -> ParsedDate {
        self.parsed
    }

    /// Chronological value for ordering; `None` means undated.
    pub fn sort_key(&self) -> Option<NaiveDate> {
        match self.parsed {
            ParsedDate::Day(d) | ParsedDate::Month(d) => Some(d),
            ParsedDate::Unparsed => None,
        }
    }

    /// Normalised text: `YYYY-MM-DD`, `YYYY-MM`, or the raw text when unparsed.
    pub fn display(&self) -> String {
        match self.parsed {
            ParsedDate::Day(d) => d.format("%Y-%m-%d").to_string(),
            ParsedDate::Month(d) => d.format("%Y-%m").to_string(),
            ParsedDate::Unparsed => self.raw.clone(),
        }
    }

    /// Coarse identity value, or `None` when no safe comparison is possible.
    ///
    /// A month-only date has no day bucket.
    pub fn bucket(&self, granularity: DateGranularity) -> Option<DateBucket> {
        let (date, precise) = match self.parsed {
            ParsedDate::Day(d) => (d, true),
            ParsedDate::Month(d) => (d, false),
            ParsedDate::Unparsed => return None,
        };
        match granularity {
            DateGranularity::Day if precise => Some(DateBucket {
                year: date.year(),
                month: date.month(),
                day: date.day(),
            }),
            DateGranularity::Day => None,
            DateGranularity::Month => Some(DateBucket {
                year: date.year(),
                month: date.month(),
                day: 0,
            }),
            DateGranularity::Year => Some(DateBucket {
                year: date.year(),
                month: 0,
                day: 0,
            }),
        }
    }
}

fn plausible(date: NaiveDate) -> Option<NaiveDate> {
    (1970..=2100).contains(&date.year()).then_some(date)
}

fn parse_date_text(raw: &str) -> ParsedDate {
    let clean = FRACTIONAL_SECONDS.replace(raw, "$1");
    let clean = clean.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(clean) {
        if let Some(d) = plausible(dt.date_naive()) {
            return ParsedDate::Day(d);
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(clean) {
        if let Some(d) = plausible(dt.date_naive()) {
            return ParsedDate::Day(d);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(clean, fmt) {
            if let Some(d) = plausible(dt.date()) {
                return ParsedDate::Day(d);
            }
        }
    }
    if SLASH_SHORT_YEAR.is_match(clean) {
        if let Ok(d) = NaiveDate::parse_from_str(clean, "%m/%d/%y") {
            if let Some(d) = plausible(d) {
                return ParsedDate::Day(d);
            }
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(clean, fmt) {
            if let Some(d) = plausible(d) {
                return ParsedDate::Day(d);
            }
        }
    }
    if let Some(month) = parse_month_only(clean) {
        return ParsedDate::Month(month);
    }
    // "2024-12-24 10:11:12 UTC" and similar trailing junk
    if let Some(caps) = ISO_DAY_PREFIX.captures(clean) {
        if let Ok(d) = NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d") {
            if let Some(d) = plausible(d) {
                return ParsedDate::Day(d);
            }
        }
    }
    ParsedDate::Unparsed
}

fn parse_month_only(clean: &str) -> Option<NaiveDate> {
    let first_of = |year: i32, month: u32| NaiveDate::from_ymd_opt(year, month, 1).and_then(plausible);

    if let Some(caps) = ISO_MONTH.captures(clean) {
        return first_of(caps[1].parse().ok()?, caps[2].parse().ok()?);
    }
    if let Some(caps) = SLASH_MONTH.captures(clean) {
        return first_of(caps[2].parse().ok()?, caps[1].parse().ok()?);
    }
    // "March 2024" / "Mar 2024"
    NaiveDate::parse_from_str(&format!("1 {clean}"), "%d %b %Y")
        .ok()
        .and_then(plausible)
}
