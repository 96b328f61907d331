//! Write the full output bundle to a directory.

use super::{csv, feed, json};
use crate::config::FeedConfig;
use crate::error::ExportError;
use crate::models::{Record, StatusReport};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

pub const RSS_FILE: &str = "rss.xml";
pub const ATOM_FILE: &str = "atom.xml";
pub const JSON_FILE: &str = "data.json";
pub const CSV_FILE: &str = "data.csv";
pub const STATUS_FILE: &str = "status.json";
pub const LAST_UPDATED_FILE: &str = "last_updated.json";

/// Render every format and write it under `dir`, creating the directory.
///
/// Everything is rendered before the first write, so a rendering error
/// leaves the directory untouched. Returns the written paths.
#[instrument(level = "info", skip_all, fields(dir = %dir.display(), count = records.len()))]
pub async fn write_bundle(
    dir: &Path,
    records: &[Record],
    report: &StatusReport,
    feed_config: &FeedConfig,
    generated_at: DateTime<Utc>,
) -> Result<Vec<PathBuf>, ExportError> {
    let files = [
        (RSS_FILE, feed::render_rss(records, feed_config, generated_at)?),
        (ATOM_FILE, feed::render_atom(records, feed_config, generated_at)?),
        (JSON_FILE, json::render_records(records)?),
        (CSV_FILE, csv::render_records(records)?),
        (STATUS_FILE, json::render_status(report)?),
        (
            LAST_UPDATED_FILE,
            json::render_last_updated(generated_at, records.len())?,
        ),
    ];

    if let Err(e) = fs::create_dir_all(dir).await {
        error!(error = %e, "Failed to create export dir");
        return Err(e.into());
    }

    let mut written = Vec::with_capacity(files.len());
    for (name, contents) in files {
        let path = dir.join(name);
        fs::write(&path, contents).await?;
        info!(path = %path.display(), "Wrote export file");
        written.push(path);
    }
    Ok(written)
}

/// Write a single document, creating parent directories.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn write_file(path: &Path, contents: &str) -> Result<(), ExportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, contents).await?;
    info!(bytes = contents.len(), "Wrote file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outputs::fixtures::sample;
    use crate::outputs::ExportRow;

    #[tokio::test]
    async fn test_write_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("site");
        let records = sample();
        let report = StatusReport::new(Utc::now());

        let written = write_bundle(&out, &records, &report, &FeedConfig::default(), Utc::now())
            .await
            .unwrap();
        assert_eq!(written.len(), 6);
        for path in &written {
            assert!(path.is_file(), "{} missing", path.display());
        }

        let json = std::fs::read_to_string(out.join(JSON_FILE)).unwrap();
        let rows: Vec<ExportRow> = serde_json::from_str(&json).unwrap();
        assert_eq!(rows.len(), 3);

        let csv_text = std::fs::read_to_string(out.join(CSV_FILE)).unwrap();
        assert_eq!(csv::read_rows(&csv_text).unwrap(), rows);

        let rss = std::fs::read_to_string(out.join(RSS_FILE)).unwrap();
        assert_eq!(rss.matches("<item>").count(), 3);
    }

    #[tokio::test]
    async fn test_write_file_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/feed.xml");
        write_file(&path, "<rss/>").await.unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "<rss/>");
    }
}
