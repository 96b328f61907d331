//! YAML configuration.
//!
//! Every key has a default, so an absent file or a partial file is valid.
//! Command-line flags are applied on top with [`Config::apply_overrides`].
//!
//! ```yaml
//! collection:
//!   max_concurrent: 5
//!   max_per_source: 25
//! dedup:
//!   date_granularity: month
//!   max_name_distance: 0
//! cache:
//!   ttl_secs: 3600
//! ```

use crate::dates::DateGranularity;
use crate::error::ConfigError;
use crate::scrapers::BUILTIN_SOURCES;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{info, instrument};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub feed: FeedConfig,
    pub collection: CollectionConfig,
    pub dedup: DedupConfig,
    pub cache: CacheConfig,
    pub news_feeds: NewsFeeds,
}

/// Channel metadata for the generated RSS/Atom documents.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub title: String,
    pub link: String,
    pub description: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            title: "Data Breach Feed".to_string(),
            link: "https://example.com/breaches".to_string(),
            description: "Aggregated data breach notifications from state registries, \
                          ransomware trackers and security news"
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    /// Worker pool size for API, feed and static-scrape adapters.
    pub max_concurrent: usize,
    pub adapter_timeout_secs: u64,
    pub browser_timeout_secs: u64,
    /// Limit passed to every adapter; 0 lets each adapter use its own default.
    pub max_per_source: usize,
    pub request_timeout_secs: u64,
    pub max_retries: usize,
    pub user_agent: String,
    pub us_only: bool,
    /// How many Hendry Adrian posts get a detail-page fetch.
    pub hendry_detail_pages: usize,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 5,
            adapter_timeout_secs: 60,
            browser_timeout_secs: 240,
            max_per_source: 25,
            request_timeout_secs: 30,
            max_retries: 2,
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36"
                .to_string(),
            us_only: true,
            hendry_detail_pages: 25,
        }
    }
}

impl CollectionConfig {
    pub fn adapter_timeout(&self) -> Duration {
        Duration::from_secs(self.adapter_timeout_secs)
    }

    pub fn browser_timeout(&self) -> Duration {
        Duration::from_secs(self.browser_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Source names, most authoritative first. Unlisted sources rank last.
    pub source_priority: Vec<String>,
    pub date_granularity: DateGranularity,
    /// Largest Levenshtein distance between normalised names still treated as equal.
    pub max_name_distance: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        let source_priority = [
            "HHS OCR",
            "Maine AG",
            "Texas AG",
            "Washington AG",
            "California AG",
            "Ransomware.live",
            "Hendry Adrian",
            "DeXpose",
            "BreachSense",
            "Red Packet Security",
            "DataBreaches.net",
            "HIPAA Journal",
            "BleepingComputer",
            "Rescana",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        Self {
            source_priority,
            date_granularity: DateGranularity::Month,
            max_name_distance: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    pub use_browser: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 3600,
            use_browser: false,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// A security-news feed filtered for breach-related headlines.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewsFeed {
    pub name: String,
    pub url: String,
    pub category: String,
}

/// The configured news feeds; defaults to a curated list.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct NewsFeeds(pub Vec<NewsFeed>);

impl Default for NewsFeeds {
    fn default() -> Self {
        let feeds = [
            ("Krebs on Security", "https://krebsonsecurity.com/feed/", "News"),
            ("The Record", "https://therecord.media/feed/", "News"),
            ("The Hacker News", "https://feeds.feedburner.com/TheHackernews", "News"),
            ("SecurityWeek", "https://feeds.feedburner.com/securityweek", "News"),
            ("Dark Reading", "https://www.darkreading.com/rss.xml", "News"),
            ("CyberScoop", "https://www.cyberscoop.com/feed", "News"),
            ("SC Media", "https://www.scworld.com/feed", "News"),
            ("Security Affairs", "https://securityaffairs.com/feed", "News"),
            ("HackRead", "https://hackread.com/feed/", "News"),
            ("Cyble", "https://cyble.com/feed/", "Threat Intel"),
            ("WeLiveSecurity", "https://www.welivesecurity.com/en/feed/", "News"),
            ("Graham Cluley", "https://grahamcluley.com/feed/", "News"),
            ("Tripwire", "https://www.tripwire.com/state-of-security/feed", "News"),
            ("DataBreachToday", "https://www.databreachtoday.com/rssFeeds.php", "Healthcare"),
            ("BankInfoSecurity", "https://www.bankinfosecurity.com/rss-feeds", "Finance"),
            ("Sophos News", "https://news.sophos.com/en-us/feed/", "Threat Intel"),
            ("Kaspersky Securelist", "https://securelist.com/feed/", "Threat Intel"),
            ("SentinelOne Labs", "https://www.sentinelone.com/feed/", "Threat Intel"),
            ("Malwarebytes Blog", "https://www.malwarebytes.com/blog/feed", "Threat Intel"),
        ];
        Self(
            feeds
                .into_iter()
                .map(|(name, url, category)| NewsFeed {
                    name: name.to_string(),
                    url: url.to_string(),
                    category: category.to_string(),
                })
                .collect(),
        )
    }
}

impl Config {
    /// Parse configuration from YAML text.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.collection.max_concurrent == 0 {
            return Err(ConfigError::Invalid(
                "collection.max_concurrent must be at least 1".to_string(),
            ));
        }
        if self.collection.adapter_timeout_secs == 0 || self.collection.browser_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "adapter timeouts must be at least one second".to_string(),
            ));
        }
        if let Some(feed) = self.news_feeds.0.iter().find(|f| url::Url::parse(&f.url).is_err()) {
            return Err(ConfigError::Invalid(format!(
                "news feed {} has an invalid url: {}",
                feed.name, feed.url
            )));
        }
        let mut names: HashSet<String> = BUILTIN_SOURCES.iter().map(|n| n.to_lowercase()).collect();
        for feed in &self.news_feeds.0 {
            if feed.name.trim().is_empty() {
                return Err(ConfigError::Invalid("news feed names must not be empty".to_string()));
            }
            if !names.insert(feed.name.trim().to_lowercase()) {
                return Err(ConfigError::Invalid(format!(
                    "news feed name {} is already used by another source",
                    feed.name
                )));
            }
        }
        Ok(())
    }

    /// Apply command-line overrides.
    pub fn apply_overrides(
        &mut self,
        no_parallel: bool,
        no_browser: bool,
        max_per_source: Option<usize>,
    ) {
        if no_parallel {
            self.collection.max_concurrent = 1;
        }
        if no_browser {
            self.cache.use_browser = false;
        }
        if let Some(limit) = max_per_source {
            self.collection.max_per_source = limit;
        }
    }
}

/// Load configuration from `path`, or defaults when no path is given.
#[instrument(level = "info")]
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let Some(path) = path else {
        info!("No config file given; using defaults");
        return Ok(Config::default());
    };
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_string(),
        source,
    })?;
    let config = Config::from_yaml(&text)?;
    info!(
        %path,
        news_feeds = config.news_feeds.0.len(),
        ttl_secs = config.cache.ttl_secs,
        "Loaded configuration"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.collection.max_concurrent, 5);
        assert_eq!(config.collection.max_per_source, 25);
        assert_eq!(config.cache.ttl(), Duration::from_secs(3600));
        assert_eq!(config.dedup.date_granularity, DateGranularity::Month);
        assert_eq!(config.dedup.source_priority[0], "HHS OCR");
        assert_eq!(config.news_feeds.0.len(), 19);
    }

    #[test]
    fn test_partial_yaml_keeps_other_defaults() {
        let yaml = r#"
collection:
  max_concurrent: 2
dedup:
  date_granularity: day
  max_name_distance: 1
news_feeds:
  - name: Example
    url: https://example.com/feed
    category: News
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.collection.max_concurrent, 2);
        assert_eq!(config.collection.adapter_timeout_secs, 60);
        assert_eq!(config.dedup.date_granularity, DateGranularity::Day);
        assert_eq!(config.dedup.max_name_distance, 1);
        assert_eq!(config.news_feeds.0.len(), 1);
        assert_eq!(config.feed.title, "Data Breach Feed");
    }

    #[test]
    fn test_zero_pool_is_rejected() {
        let err = Config::from_yaml("collection:\n  max_concurrent: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_default_feed_names_are_unique() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_feed_reusing_a_source_name_is_rejected() {
        let yaml = "news_feeds:\n  - { name: databreaches.net, url: 'https://example.com/feed', category: News }\n";
        assert!(matches!(
            Config::from_yaml(yaml),
            Err(ConfigError::Invalid(_))
        ));

        let yaml = "news_feeds:\n  - { name: Example, url: 'https://example.com/a', category: News }\n  \
                    - { name: Example, url: 'https://example.com/b', category: News }\n";
        assert!(matches!(
            Config::from_yaml(yaml),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_bad_feed_url_is_rejected() {
        let yaml = "news_feeds:\n  - { name: Bad, url: 'not a url', category: News }\n";
        assert!(matches!(
            Config::from_yaml(yaml),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_overrides() {
        let mut config = Config::default();
        config.cache.use_browser = true;
        config.apply_overrides(true, true, Some(10));
        assert_eq!(config.collection.max_concurrent, 1);
        assert!(!config.cache.use_browser);
        assert_eq!(config.collection.max_per_source, 10);
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cache:\n  ttl_secs: 60\n  use_browser: true").unwrap();
        let config = load_config(file.path().to_str()).unwrap();
        assert_eq!(config.cache.ttl_secs, 60);
        assert!(config.cache.use_browser);
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Some("/nonexistent/breach-feed.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
