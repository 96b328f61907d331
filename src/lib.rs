//! # Awful Breach Feed
//!
//! Collects data breach notifications from state attorney-general
//! registries, the HHS OCR breach portal, ransomware leak-site trackers and
//! security news feeds, merges duplicates across sources, and publishes the
//! result as RSS, Atom, JSON and CSV, either as files or over HTTP.
//!
//! ## Architecture
//!
//! 1. **Collection**: every [`scrapers::SourceAdapter`] runs in isolation
//!    under a deadline; browser-rendered sources share one exclusive lane
//! 2. **Validation**: raw candidates become [`models::Record`]s or are counted as drops
//! 3. **Deduplication**: records for the same company and date bucket merge
//! 4. **Output**: [`outputs`] renders feeds and exports; [`server`] serves
//!    them through a [`cache::FreshnessCache`]

pub mod browser;
pub mod cache;
pub mod cli;
pub mod collector;
pub mod config;
pub mod dates;
pub mod dedup;
pub mod error;
pub mod models;
pub mod outputs;
pub mod scrapers;
pub mod server;
pub mod utils;
