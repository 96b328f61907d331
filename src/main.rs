//! # Awful Breach Feed
//!
//! Collects data breach notifications from state registries, the HHS OCR
//! portal, ransomware trackers and security news feeds, merges duplicates,
//! and writes RSS/Atom (plus optional JSON, CSV and a full export bundle) or
//! serves them over HTTP.
//!
//! ## Usage
//!
//! ```sh
//! awful_breach_feed -o breach_feed.xml --export-dir ./docs
//! awful_breach_feed --serve --port 8080
//! ```

use awful_breach_feed::browser::{BrowserLane, ChromiumLauncher};
use awful_breach_feed::cache::FreshnessCache;
use awful_breach_feed::cli::{Cli, FeedFormat};
use awful_breach_feed::collector::{Collect, Collector};
use awful_breach_feed::config::load_config;
use awful_breach_feed::dedup::Deduplicator;
use awful_breach_feed::outputs::{csv, export, feed, json};
use awful_breach_feed::scrapers::{default_adapters, http::build_client};
use awful_breach_feed::server::{self, AppState};
use awful_breach_feed::utils::ensure_writable_dir;
use chrono::Utc;
use clap::Parser;
use std::error::Error;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("awful_breach_feed starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let mut config = load_config(args.config.as_deref())?;
    config.apply_overrides(args.no_parallel, args.no_browser, args.max_per_source);

    let http = build_client(&config.collection)?;
    let lane = Arc::new(BrowserLane::new(Arc::new(ChromiumLauncher::new(
        config.collection.user_agent.clone(),
    ))));
    let adapters = default_adapters(&config, &http, &lane);
    info!(adapters = adapters.len(), "Registered source adapters");
    let collector = Arc::new(Collector::new(
        adapters,
        Deduplicator::new(&config.dedup),
        config.collection.clone(),
    ));

    if args.serve {
        let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
        let state = AppState {
            cache: Arc::new(FreshnessCache::new(
                collector as Arc<dyn Collect>,
                config.cache.ttl(),
                config.cache.use_browser,
            )),
            feed: Arc::new(config.feed.clone()),
        };
        server::serve(addr, state).await?;
        return Ok(());
    }

    // ---- One-shot collection ----
    let collection = collector.collect_all(!args.no_browser).await;
    let records = collection.records;
    let report = collection.report;
    let generated_at = Utc::now();
    if report.is_total_failure() {
        error!("No source produced records; writing an empty feed");
    }

    // ---- Feed output ----
    let output = Path::new(&args.output);
    let primary = match args.format {
        FeedFormat::Atom => feed::render_atom(&records, &config.feed, generated_at)?,
        FeedFormat::Rss | FeedFormat::Both => {
            feed::render_rss(&records, &config.feed, generated_at)?
        }
    };
    export::write_file(output, &primary).await?;
    if args.format == FeedFormat::Both {
        let atom_path = output.with_extension("atom");
        let atom = feed::render_atom(&records, &config.feed, generated_at)?;
        export::write_file(&atom_path, &atom).await?;
    }

    if let Some(path) = &args.json {
        export::write_file(Path::new(path), &json::render_records(&records)?).await?;
    }
    if let Some(path) = &args.csv {
        export::write_file(Path::new(path), &csv::render_records(&records)?).await?;
    }

    if let Some(dir) = &args.export_dir {
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(path = %dir, error = %e, "Export directory is not writable");
            return Err(e.into());
        }
        let written =
            export::write_bundle(Path::new(dir), &records, &report, &config.feed, generated_at)
                .await?;
        info!(files = written.len(), path = %dir, "Wrote export bundle");
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        records = records.len(),
        dropped = report.dropped(),
        "Execution complete"
    );

    Ok(())
}
