//! Cross-source entity resolution.
//!
//! Two records describe the same incident when their normalised company
//! names match and their reported dates fall in the same coarse bucket
//! (calendar month by default). Matching records are folded into one, field
//! by field, in source-priority order. Records without a usable date never
//! merge.

use crate::config::DedupConfig;
use crate::dates::{DateBucket, DateGranularity};
use crate::models::Record;
use itertools::Itertools;
use std::collections::HashMap;
use tracing::{debug, info, instrument};

const LEGAL_SUFFIXES: &[&str] = &[
    "inc",
    "incorporated",
    "llc",
    "ltd",
    "limited",
    "corp",
    "corporation",
    "company",
    "co",
    "plc",
];

/// Case-fold, strip punctuation, collapse whitespace and drop trailing legal
/// suffixes: `"Acme Corp."` and `"ACME  corp"` both become `"acme"`.
pub fn normalize_name(name: &str) -> String {
    let cleaned: String = name
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    let mut words: Vec<&str> = cleaned.split_whitespace().collect();
    while words.len() > 1
        && words
            .last()
            .is_some_and(|w| LEGAL_SUFFIXES.contains(w))
    {
        words.pop();
    }
    words.join(" ")
}

/// Edit distance between two strings, by characters.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != *cb);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

struct Cluster {
    name: String,
    members: Vec<Record>,
}

/// Merges records that describe the same incident.
#[derive(Debug, Clone)]
pub struct Deduplicator {
    priority: HashMap<String, usize>,
    granularity: DateGranularity,
    max_name_distance: usize,
}

impl Deduplicator {
    pub fn new(config: &DedupConfig) -> Self {
        let priority = config
            .source_priority
            .iter()
            .enumerate()
            .map(|(rank, source)| (source.to_lowercase(), rank))
            .collect();
        Self {
            priority,
            granularity: config.date_granularity,
            max_name_distance: config.max_name_distance,
        }
    }

    /// Position of `source` in the priority order; unlisted sources rank last.
    fn rank(&self, source: &str) -> usize {
        self.priority
            .get(&source.to_lowercase())
            .copied()
            .unwrap_or(usize::MAX)
    }

    fn same_name(&self, a: &str, b: &str) -> bool {
        if a == b {
            return true;
        }
        let max = self.max_name_distance;
        max > 0 && a.chars().count().min(b.chars().count()) > max && levenshtein(a, b) <= max
    }

    fn key(&self, record: &Record) -> Option<DateBucket> {
        record.date_reported.as_ref()?.bucket(self.granularity)
    }

    /// Collapse duplicate reports.
    ///
    /// Output order is source priority, then input order; running the result
    /// through again returns it unchanged.
    #[instrument(level = "info", skip_all, fields(input = records.len()))]
    pub fn dedupe(&self, mut records: Vec<Record>) -> Vec<Record> {
        records.sort_by_key(|r| self.rank(&r.source));

        let mut clusters: Vec<Cluster> = Vec::new();
        let mut by_bucket: HashMap<DateBucket, Vec<usize>> = HashMap::new();

        for record in records {
            let Some(bucket) = self.key(&record) else {
                clusters.push(Cluster {
                    name: String::new(),
                    members: vec![record],
                });
                continue;
            };
            let name = normalize_name(&record.company_name);
            let candidates = by_bucket.entry(bucket).or_default();
            match candidates
                .iter()
                .copied()
                .find(|&idx| self.same_name(&clusters[idx].name, &name))
            {
                Some(idx) => {
                    debug!(company = %record.company_name, source = %record.source, "Merging duplicate");
                    clusters[idx].members.push(record);
                }
                None => {
                    candidates.push(clusters.len());
                    clusters.push(Cluster {
                        name,
                        members: vec![record],
                    });
                }
            }
        }

        let merged: Vec<Record> = clusters.into_iter().map(|c| merge(c.members)).collect();
        info!(output = merged.len(), "Deduplicated records");
        merged
    }
}

fn first_set<T: Clone>(members: &[Record], field: impl Fn(&Record) -> &Option<T>) -> Option<T> {
    members.iter().find_map(|m| field(m).clone())
}

/// Fold priority-ordered duplicates into one record.
///
/// Each optional field takes the first value present; provenance is the
/// union of every member's sources.
fn merge(mut members: Vec<Record>) -> Record {
    if members.len() == 1 {
        return members.remove(0);
    }
    let sources = members
        .iter()
        .flat_map(|m| m.sources.iter().cloned())
        .unique()
        .collect();
    let head = &members[0];
    Record {
        company_name: head.company_name.clone(),
        date_reported: first_set(&members, |m| &m.date_reported),
        source: head.source.clone(),
        sources,
        url: first_set(&members, |m| &m.url),
        description: first_set(&members, |m| &m.description),
        records_affected: first_set(&members, |m| &m.records_affected),
        state_records_affected: first_set(&members, |m| &m.state_records_affected),
        location: first_set(&members, |m| &m.location),
        threat_actor: first_set(&members, |m| &m.threat_actor),
        breach_type: first_set(&members, |m| &m.breach_type),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawRecord;

    fn record(company: &str, source: &str, date: &str) -> Record {
        Record::from_raw(RawRecord {
            date_reported: date.to_string(),
            ..RawRecord::new(company, source)
        })
        .unwrap()
    }

    fn dedup() -> Deduplicator {
        Deduplicator::new(&DedupConfig::default())
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("Acme Corp."), "acme");
        assert_eq!(normalize_name("  ACME   corp "), "acme");
        assert_eq!(normalize_name("Beta, Inc."), "beta");
        assert_eq!(normalize_name("Company"), "company");
        assert_eq!(normalize_name("St. Mary's Health"), "st marys health");
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("acme", "acme"), 0);
    }

    #[test]
    fn test_merges_across_sources() {
        let news = record("Acme Corp", "DataBreaches.net", "2024-12-23");
        let mut tracker = record("acme corp", "Ransomware.live", "2024-12-24");
        tracker.threat_actor = Some("LockBit".to_string());

        let merged = dedup().dedupe(vec![news, tracker]);
        assert_eq!(merged.len(), 1);
        let acme = &merged[0];
        assert_eq!(acme.threat_actor.as_deref(), Some("LockBit"));
        assert_eq!(acme.sources, vec!["Ransomware.live", "DataBreaches.net"]);
        assert_eq!(acme.source, "Ransomware.live");
    }

    #[test]
    fn test_merge_keeps_every_field() {
        let mut registry = record("Acme Corp", "Maine AG", "12/23/2024");
        registry.records_affected = Some("12,000".to_string());
        registry.url = Some("https://maine.gov/acme".to_string());
        let mut news = record("ACME CORP", "HIPAA Journal", "2024-12-02");
        news.description = Some("Acme disclosed a breach.".to_string());
        news.url = Some("https://hipaajournal.com/acme".to_string());
        news.breach_type = Some("Hacking/IT Incident".to_string());

        let merged = dedup().dedupe(vec![news, registry]);
        assert_eq!(merged.len(), 1);
        let acme = &merged[0];
        assert_eq!(acme.company_name, "Acme Corp");
        assert_eq!(acme.url.as_deref(), Some("https://maine.gov/acme"));
        assert_eq!(acme.records_affected.as_deref(), Some("12,000"));
        assert_eq!(acme.description.as_deref(), Some("Acme disclosed a breach."));
        assert_eq!(acme.breach_type.as_deref(), Some("Hacking/IT Incident"));
    }

    #[test]
    fn test_undated_never_merge() {
        let records = vec![
            record("Acme Corp", "HHS OCR", ""),
            record("Acme Corp", "Maine AG", ""),
            record("Acme Corp", "Texas AG", "sometime last year"),
            record("Acme Corp", "Washington AG", "2024-12-01"),
        ];
        assert_eq!(dedup().dedupe(records).len(), 4);
    }

    #[test]
    fn test_different_months_stay_apart() {
        let records = vec![
            record("Acme Corp", "HHS OCR", "2024-11-30"),
            record("Acme Corp", "Maine AG", "2024-12-01"),
        ];
        assert_eq!(dedup().dedupe(records).len(), 2);

        let yearly = Deduplicator::new(&DedupConfig {
            date_granularity: DateGranularity::Year,
            ..DedupConfig::default()
        });
        let records = vec![
            record("Acme Corp", "HHS OCR", "2024-11-30"),
            record("Acme Corp", "Maine AG", "2024-12-01"),
        ];
        assert_eq!(yearly.dedupe(records).len(), 1);
    }

    #[test]
    fn test_fuzzy_names_are_opt_in() {
        let records = || {
            vec![
                record("Acme Healthcare", "HHS OCR", "2024-12-02"),
                record("Acme Helthcare", "DataBreaches.net", "2024-12-05"),
            ]
        };
        assert_eq!(dedup().dedupe(records()).len(), 2);

        let fuzzy = Deduplicator::new(&DedupConfig {
            max_name_distance: 1,
            ..DedupConfig::default()
        });
        assert_eq!(fuzzy.dedupe(records()).len(), 1);
    }

    #[test]
    fn test_idempotent() {
        let mut tracker = record("acme corp", "Ransomware.live", "2024-12-24");
        tracker.threat_actor = Some("LockBit".to_string());
        let input = vec![
            record("Acme Corp", "DataBreaches.net", "2024-12-23"),
            tracker,
            record("Beta LLC", "Some Blog", "2024-12-10"),
            record("Beta", "California AG", "12/11/2024"),
            record("Gamma", "HHS OCR", ""),
            record("Delta Clinic", "HHS OCR", "March 2024"),
            record("delta clinic", "Texas AG", "03/30/2024"),
        ];
        let d = dedup();
        let once = d.dedupe(input);
        let twice = d.dedupe(once.clone());
        assert_eq!(once, twice);
        assert_eq!(once.len(), 4);
    }

    #[test]
    fn test_unlisted_sources_rank_last() {
        let d = dedup();
        assert!(d.rank("HHS OCR") < d.rank("Rescana"));
        assert_eq!(d.rank("Unlisted Blog"), usize::MAX);
        assert_eq!(d.rank("hhs ocr"), d.rank("HHS OCR"));
    }
}
