//! Breach source adapters.
//!
//! Every origin is wrapped in a [`SourceAdapter`]. The orchestrator only sees
//! the trait: a name, a [`CapabilityClass`] used for scheduling, and
//! `fetch(limit)`, which never fails past its own boundary. Whatever an
//! adapter managed to extract before an error is returned alongside the
//! error in a [`FetchOutcome`].
//!
//! # Supported Sources
//!
//! | Source | Module | Class |
//! |--------|--------|-------|
//! | Ransomware.live | [`ransomware_live`] | API |
//! | DataBreaches.net, HIPAA Journal, BleepingComputer, Red Packet Security, news feeds | [`rss`] | Syndication feed |
//! | BreachSense | [`breachsense`] | Static scrape |
//! | HHS OCR | [`hhs_ocr`] | Static scrape |
//! | California AG | [`california_ag`] | Static scrape |
//! | Hendry Adrian | [`hendry_adrian`] | Static scrape |
//! | DeXpose | [`dexpose`] | Static scrape |
//! | Maine AG | [`maine_ag`] | Browser automation |
//! | Texas AG | [`texas_ag`] | Browser automation |
//! | Washington AG | [`washington_ag`] | Browser automation |
//! | Rescana | [`rescana`] | Browser automation |

use crate::browser::BrowserLane;
use crate::config::Config;
use crate::error::AdapterError;
use crate::models::{AdapterStatus, RawRecord};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

pub mod breachsense;
pub mod california_ag;
pub mod dexpose;
pub mod hendry_adrian;
pub mod hhs_ocr;
pub mod html;
pub mod http;
pub mod maine_ag;
pub mod ransomware_live;
pub mod rescana;
pub mod rss;
pub mod texas_ag;
pub mod washington_ag;

use http::HttpClient;

/// Names of the built-in adapters. Status reports are keyed by adapter
/// name, so configured news feeds may not reuse one.
pub const BUILTIN_SOURCES: &[&str] = &[
    ransomware_live::SOURCE,
    rss::DATABREACHES_NET,
    breachsense::SOURCE,
    rss::HIPAA_JOURNAL,
    hhs_ocr::SOURCE,
    california_ag::SOURCE,
    rss::BLEEPING_COMPUTER,
    rss::RED_PACKET_SECURITY,
    hendry_adrian::SOURCE,
    dexpose::SOURCE,
    maine_ag::SOURCE,
    texas_ag::SOURCE,
    washington_ag::SOURCE,
    rescana::SOURCE,
];

/// Scheduling category of an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityClass {
    Api,
    SyndicationFeed,
    StaticScrape,
    /// Holds a headless browser; runs on the exclusive lane.
    BrowserAutomation,
}

impl CapabilityClass {
    /// Whether adapters of this class need the exclusive browser lane.
    pub fn is_exclusive(self) -> bool {
        matches!(self, Self::BrowserAutomation)
    }
}

impl fmt::Display for CapabilityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Api => "api",
            Self::SyndicationFeed => "feed",
            Self::StaticScrape => "static",
            Self::BrowserAutomation => "browser",
        };
        f.write_str(s)
    }
}

/// Records an adapter extracted, plus the error that stopped it, if any.
#[derive(Debug)]
pub struct FetchOutcome {
    pub records: Vec<RawRecord>,
    pub error: Option<AdapterError>,
}

impl FetchOutcome {
    pub fn ok(records: Vec<RawRecord>) -> Self {
        Self {
            records,
            error: None,
        }
    }

    pub fn failed(error: AdapterError) -> Self {
        Self {
            records: Vec::new(),
            error: Some(error),
        }
    }

    /// Records extracted before `error` stopped the adapter.
    pub fn partial(records: Vec<RawRecord>, error: AdapterError) -> Self {
        Self {
            records,
            error: Some(error),
        }
    }

    pub fn status(&self) -> AdapterStatus {
        match (&self.error, self.records.is_empty()) {
            (None, _) => AdapterStatus::Ok,
            (Some(_), false) => AdapterStatus::Partial,
            (Some(_), true) => AdapterStatus::Failed,
        }
    }
}

impl From<Result<Vec<RawRecord>, AdapterError>> for FetchOutcome {
    fn from(result: Result<Vec<RawRecord>, AdapterError>) -> Self {
        match result {
            Ok(records) => Self::ok(records),
            Err(e) => Self::failed(e),
        }
    }
}

/// A source of candidate breach records.
///
/// Implementations must honour `limit` locally and must not panic on bad
/// input; errors go into the returned [`FetchOutcome`].
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Source name stamped on every record, e.g. `"Maine AG"`.
    fn name(&self) -> &str;

    fn capability(&self) -> CapabilityClass;

    /// Limit used when the configuration does not set one.
    fn default_limit(&self) -> usize {
        25
    }

    async fn fetch(&self, limit: usize) -> FetchOutcome;
}

/// Build every configured adapter, in declaration order.
pub fn default_adapters(
    config: &Config,
    http: &HttpClient,
    lane: &Arc<BrowserLane>,
) -> Vec<Arc<dyn SourceAdapter>> {
    let settings = &config.collection;
    let mut adapters: Vec<Arc<dyn SourceAdapter>> = vec![
        Arc::new(ransomware_live::RansomwareLive::new(
            http.clone(),
            settings.us_only,
        )),
        Arc::new(rss::FeedAdapter::databreaches_net(http.clone())),
        Arc::new(breachsense::BreachSense::new(http.clone())),
        Arc::new(rss::FeedAdapter::hipaa_journal(http.clone())),
        Arc::new(hhs_ocr::HhsOcr::new(http.clone())),
        Arc::new(california_ag::CaliforniaAg::new(http.clone())),
        Arc::new(rss::FeedAdapter::bleeping_computer(http.clone())),
        Arc::new(rss::FeedAdapter::red_packet_security(http.clone())),
        Arc::new(hendry_adrian::HendryAdrian::new(
            http.clone(),
            settings.hendry_detail_pages,
        )),
        Arc::new(dexpose::DeXpose::new(http.clone())),
    ];

    adapters.extend(
        config
            .news_feeds
            .0
            .iter()
            .map(|feed| Arc::new(rss::FeedAdapter::news(http.clone(), feed)) as Arc<dyn SourceAdapter>),
    );

    adapters.push(Arc::new(maine_ag::MaineAg::new(Arc::clone(lane))));
    adapters.push(Arc::new(texas_ag::TexasAg::new(Arc::clone(lane))));
    adapters.push(Arc::new(washington_ag::WashingtonAg::new(Arc::clone(lane))));
    adapters.push(Arc::new(rescana::Rescana::new(Arc::clone(lane))));

    adapters
}
