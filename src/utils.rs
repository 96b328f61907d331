//! Utility functions for text cleanup, slugs, keyword filters and file system checks.
//!
//! This module provides helper functions used throughout the application:
//! - HTML-to-text reduction for feed summaries and scraped cells
//! - String truncation for descriptions and logging
//! - Slugification for deterministic feed identifiers
//! - Keyword filtering for news headlines
//! - File system validation for export directories

use scraper::Html;
use std::fs as stdfs;
use std::io;
use tokio::fs;
use tracing::{info, instrument};

/// Maximum characters kept from any scraped description.
pub const MAX_DESCRIPTION_CHARS: usize = 500;

/// Reduce an HTML fragment to its visible text with whitespace collapsed.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(html_to_text("<p>Hello <b>world</b></p>"), "Hello world");
/// ```
pub fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let text = fragment.root_element().text().collect::<Vec<_>>().join(" ");
    collapse(&text)
}

/// Collapse runs of whitespace into single spaces and trim.
pub fn collapse(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Keep at most `max` characters, respecting UTF-8 boundaries.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to `max` characters with an ellipsis and
/// byte count indicator appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    let kept = truncate_chars(s, max);
    if kept.len() == s.len() {
        kept
    } else {
        format!("{}…(+{} bytes)", kept, s.len() - kept.len())
    }
}

/// Convert text to a URL-friendly slug.
///
/// Lowercases, drops everything that is not alphanumeric, and joins the
/// remaining words with single hyphens.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(slugify("Acme Corp, Inc."), "acme-corp-inc");
/// ```
pub fn slugify(text: &str) -> String {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Whether `title` contains any of `keywords` (case-insensitive).
///
/// An empty keyword list matches everything.
pub fn matches_keywords(title: &str, keywords: &[&str]) -> bool {
    if keywords.is_empty() {
        return true;
    }
    let lower = title.to_lowercase();
    keywords.iter().any(|kw| lower.contains(kw))
}

/// Ensure a directory exists and is writable.
///
/// This function creates the directory if it doesn't exist, then performs
/// a write test by creating and immediately deleting a probe file.
///
/// # Errors
///
/// Returns an error if:
/// - The directory cannot be created
/// - The directory is not writable (permission denied, read-only filesystem, etc.)
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> io::Result<()> {
    fs::create_dir_all(path).await?;
    // Try a small sync write using std fs (simpler error surface)
    let probe_path = format!("{}/..__probe_write__", path.trim_end_matches('/'));
    stdfs::File::create(&probe_path)?;
    let _ = stdfs::remove_file(&probe_path);
    info!("Output directory is writable");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_to_text() {
        assert_eq!(
            html_to_text("<p>Acme <b>Corp</b> disclosed\n a breach.</p><p>More</p>"),
            "Acme Corp disclosed a breach. More"
        );
        assert_eq!(html_to_text("plain text"), "plain text");
        assert_eq!(html_to_text("Fish &amp; Chips"), "Fish & Chips");
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn test_truncate_for_log_short_string() {
        let s = "Hello, world!";
        assert_eq!(truncate_for_log(s, 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("Acme Corp, Inc."), "acme-corp-inc");
        assert_eq!(slugify("Multiple   Spaces"), "multiple-spaces");
        assert_eq!(slugify("Special@#$Characters"), "special-characters");
        assert_eq!(slugify("Ransomware.live"), "ransomware-live");
    }

    #[test]
    fn test_matches_keywords() {
        assert!(matches_keywords("Hospital hit by RANSOMWARE", &["ransomware"]));
        assert!(!matches_keywords("Quarterly earnings", &["breach", "hack"]));
        assert!(matches_keywords("anything", &[]));
    }

    #[tokio::test]
    async fn test_ensure_writable_dir_creates_nested() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        ensure_writable_dir(nested.to_str().unwrap()).await.unwrap();
        assert!(nested.is_dir());
    }
}
