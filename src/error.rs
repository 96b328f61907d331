//! Error taxonomy for collection, validation, export and configuration.
//!
//! Adapter failures are captured into a [`crate::scrapers::FetchOutcome`]
//! and never cross the orchestrator. Validation failures are counted, not
//! raised. Only export and configuration errors reach the binary.

use std::time::Duration;
use thiserror::Error;

/// Failure of a single source adapter.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Transport-level HTTP failure (connect, TLS, body read, client timeout).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// JSON payload could not be decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Syndication feed was not well-formed XML.
    #[error("XML error: {0}")]
    Xml(String),

    /// Page structure did not match what the adapter expects.
    #[error("parse error: {0}")]
    Parse(String),

    /// Browser launch, navigation or evaluation failed.
    #[error("browser error: {0}")]
    Browser(String),

    /// The adapter exceeded its deadline.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The adapter task panicked or was cancelled.
    #[error("adapter task aborted: {0}")]
    Panicked(String),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
}

impl AdapterError {
    /// Create a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Create a browser error.
    pub fn browser(message: impl std::fmt::Display) -> Self {
        Self::Browser(message.to_string())
    }

    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Timeout(_) => true,
            _ => false,
        }
    }
}

/// Why a candidate record was excluded before deduplication.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ValidationDrop {
    #[error("company name is missing or a placeholder")]
    MissingCompanyName,

    #[error("source is missing")]
    MissingSource,
}

/// Failure while rendering or writing an output representation.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML write error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("output is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Failure while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
