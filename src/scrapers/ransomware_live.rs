//! Ransomware.live recent-victims API.
//!
//! `GET https://api.ransomware.live/v2/recentvictims` returns a JSON array of
//! victims posted to ransomware leak sites. No authentication is needed.

use crate::error::AdapterError;
use crate::models::RawRecord;
use crate::scrapers::http::{FetchText, HttpClient};
use crate::scrapers::{CapabilityClass, FetchOutcome, SourceAdapter};
use crate::utils::{MAX_DESCRIPTION_CHARS, truncate_chars};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, instrument};

pub const SOURCE: &str = "Ransomware.live";
const API_URL: &str = "https://api.ransomware.live/v2/recentvictims";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Victim {
    victim: Option<String>,
    country: Option<String>,
    group_name: Option<String>,
    /// Either a bare name or `{ "name": ... }`.
    group: Option<Value>,
    attackdate: Option<String>,
    discovered: Option<String>,
    url: Option<String>,
    activity: Option<String>,
    description: Option<String>,
}

impl Victim {
    fn is_us(&self) -> bool {
        let country = self.country.as_deref().unwrap_or_default().trim().to_uppercase();
        matches!(country.as_str(), "US" | "USA" | "UNITED STATES")
    }

    fn group(&self) -> String {
        if let Some(name) = self.group_name.as_deref().filter(|s| !s.is_empty()) {
            return name.to_string();
        }
        match &self.group {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Object(map)) => map
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            _ => String::new(),
        }
    }

    fn date(&self) -> String {
        let raw = self
            .attackdate
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.discovered.as_deref())
            .unwrap_or_default();
        // drop microseconds
        raw.split('.').next().unwrap_or_default().to_string()
    }

    fn into_record(self) -> RawRecord {
        let name = self.victim.clone().unwrap_or_default();
        let url = self
            .url
            .clone()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| {
                format!(
                    "https://www.ransomware.live/search?query={}",
                    urlencoding::encode(&name)
                )
            });
        let description = self
            .activity
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.description.as_deref())
            .unwrap_or_default();

        RawRecord {
            date_reported: self.date(),
            threat_actor: self.group(),
            description: truncate_chars(description, MAX_DESCRIPTION_CHARS),
            location: self.country.clone().unwrap_or_default(),
            url,
            breach_type: "Ransomware".to_string(),
            ..RawRecord::new(name, SOURCE)
        }
    }
}

/// Decode the API payload, keeping at most `limit` victims.
pub fn parse_victims(body: &str, us_only: bool, limit: usize) -> Result<Vec<RawRecord>, AdapterError> {
    let victims: Vec<Victim> = serde_json::from_str(body)?;
    Ok(victims
        .into_iter()
        .filter(|v| !us_only || v.is_us())
        .take(limit)
        .map(Victim::into_record)
        .collect())
}

#[derive(Debug)]
pub struct RansomwareLive {
    http: HttpClient,
    url: String,
    us_only: bool,
}

impl RansomwareLive {
    pub fn new(http: HttpClient, us_only: bool) -> Self {
        Self::with_url(http, API_URL, us_only)
    }

    pub fn with_url(http: HttpClient, url: impl Into<String>, us_only: bool) -> Self {
        Self {
            http,
            url: url.into(),
            us_only,
        }
    }
}

#[async_trait]
impl SourceAdapter for RansomwareLive {
    fn name(&self) -> &str {
        SOURCE
    }

    fn capability(&self) -> CapabilityClass {
        CapabilityClass::Api
    }

    fn default_limit(&self) -> usize {
        30
    }

    #[instrument(level = "info", skip_all, fields(source = SOURCE, limit = limit))]
    async fn fetch(&self, limit: usize) -> FetchOutcome {
        let result = async {
            let body = self.http.fetch_text(&self.url).await?;
            parse_victims(&body, self.us_only, limit)
        }
        .await;
        if let Ok(records) = &result {
            info!(count = records.len(), us_only = self.us_only, "Fetched ransomware.live victims");
        }
        result.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CollectionConfig;
    use crate::models::AdapterStatus;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAYLOAD: &str = r#"[
        {"victim": "Acme Corp", "country": "US", "group_name": "lockbit3",
         "attackdate": "2024-12-24 10:11:12.123456", "url": "", "activity": "Manufacturing"},
        {"victim": "Foreign GmbH", "country": "DE", "group_name": "akira",
         "attackdate": "2024-12-24 09:00:00"},
        {"victim": "Beta LLC", "country": "usa", "group": {"name": "play"},
         "discovered": "2024-12-20 01:02:03", "url": "https://example.com/beta", "activity": null},
        {"victim": "Gamma Inc", "country": "United States", "group": "medusa"}
    ]"#;

    #[test]
    fn test_parse_victims_us_only() {
        let records = parse_victims(PAYLOAD, true, 10).unwrap();
        assert_eq!(records.len(), 3);

        let acme = &records[0];
        assert_eq!(acme.company_name, "Acme Corp");
        assert_eq!(acme.threat_actor, "lockbit3");
        assert_eq!(acme.date_reported, "2024-12-24 10:11:12");
        assert_eq!(acme.url, "https://www.ransomware.live/search?query=Acme%20Corp");
        assert_eq!(acme.description, "Manufacturing");
        assert_eq!(acme.breach_type, "Ransomware");

        assert_eq!(records[1].threat_actor, "play");
        assert_eq!(records[1].date_reported, "2024-12-20 01:02:03");
        assert_eq!(records[1].url, "https://example.com/beta");
        assert_eq!(records[2].threat_actor, "medusa");
    }

    #[test]
    fn test_parse_victims_limit_and_all_countries() {
        let records = parse_victims(PAYLOAD, false, 2).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].company_name, "Foreign GmbH");
    }

    #[test]
    fn test_bad_payload_is_an_error() {
        assert!(matches!(
            parse_victims("{not json", true, 10),
            Err(AdapterError::Json(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_against_mock_api() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/recentvictims"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAYLOAD))
            .mount(&server)
            .await;

        let http = crate::scrapers::http::build_client(&CollectionConfig::default()).unwrap();
        let adapter =
            RansomwareLive::with_url(http, format!("{}/v2/recentvictims", server.uri()), true);
        let outcome = adapter.fetch(2).await;
        assert_eq!(outcome.status(), AdapterStatus::Ok);
        assert_eq!(outcome.records.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_not_found_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let http = crate::scrapers::http::build_client(&CollectionConfig::default()).unwrap();
        let adapter = RansomwareLive::with_url(http, server.uri(), true);
        let outcome = adapter.fetch(10).await;
        assert_eq!(outcome.status(), AdapterStatus::Failed);
        assert!(outcome.records.is_empty());
    }
}
