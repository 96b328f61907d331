//! Command-line interface definitions for Awful Breach Feed.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Collection settings given here override the configuration file.

use clap::{Parser, ValueEnum};

/// Which syndication format `--output` receives.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FeedFormat {
    #[default]
    Rss,
    Atom,
    /// RSS at `--output`, Atom next to it with an `.atom` extension.
    Both,
}

/// Command-line arguments for the Awful Breach Feed application.
///
/// # Examples
///
/// ```sh
/// # Collect once and write an RSS feed
/// awful_breach_feed -o breach_feed.xml
///
/// # Skip browser-rendered registries, also export JSON and CSV
/// awful_breach_feed --no-browser -j breaches.json -c breaches.csv
///
/// # Write the full bundle (rss, atom, json, csv, status)
/// awful_breach_feed --export-dir ./docs
///
/// # Serve the feeds with a one-hour cache
/// awful_breach_feed --serve --port 8080
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path of the feed file to write
    #[arg(short, long, default_value = "breach_feed.xml")]
    pub output: String,

    /// Feed format written to --output
    #[arg(short, long, value_enum, default_value_t = FeedFormat::Rss)]
    pub format: FeedFormat,

    /// Also export records as JSON to this path
    #[arg(short, long)]
    pub json: Option<String>,

    /// Also export records as CSV to this path
    #[arg(short, long)]
    pub csv: Option<String>,

    /// Write rss.xml, atom.xml, data.json, data.csv, status.json and last_updated.json here
    #[arg(long)]
    pub export_dir: Option<String>,

    /// Run cheap adapters one at a time
    #[arg(long)]
    pub no_parallel: bool,

    /// Skip adapters that need a headless browser
    #[arg(long, env = "BREACH_FEED_NO_BROWSER")]
    pub no_browser: bool,

    /// Records requested from each source (0 = each source's default)
    #[arg(short = 'n', long)]
    pub max_per_source: Option<usize>,

    /// Serve the feeds over HTTP instead of writing files
    #[arg(long)]
    pub serve: bool,

    /// Address to bind when serving
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port to bind when serving
    #[arg(short, long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    /// Optional path to config.yaml file
    #[arg(long, env = "BREACH_FEED_CONFIG")]
    pub config: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["awful_breach_feed"]);

        assert_eq!(cli.output, "breach_feed.xml");
        assert_eq!(cli.format, FeedFormat::Rss);
        assert!(!cli.serve);
        assert!(cli.max_per_source.is_none());
    }

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "awful_breach_feed",
            "--output",
            "./feed.xml",
            "--format",
            "both",
            "--export-dir",
            "./docs",
            "--no-parallel",
            "--max-per-source",
            "10",
        ]);

        assert_eq!(cli.output, "./feed.xml");
        assert_eq!(cli.format, FeedFormat::Both);
        assert_eq!(cli.export_dir.as_deref(), Some("./docs"));
        assert!(cli.no_parallel);
        assert_eq!(cli.max_per_source, Some(10));
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::parse_from([
            "awful_breach_feed",
            "-o",
            "/tmp/feed.xml",
            "-f",
            "atom",
            "-j",
            "/tmp/data.json",
            "-c",
            "/tmp/data.csv",
            "-p",
            "8080",
        ]);

        assert_eq!(cli.output, "/tmp/feed.xml");
        assert_eq!(cli.format, FeedFormat::Atom);
        assert_eq!(cli.json.as_deref(), Some("/tmp/data.json"));
        assert_eq!(cli.csv.as_deref(), Some("/tmp/data.csv"));
        assert_eq!(cli.port, 8080);
    }
}
