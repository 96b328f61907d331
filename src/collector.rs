//! Collection orchestrator.
//!
//! Cheap adapters (API, feed, static scrape) run concurrently on a bounded
//! pool; browser-automation adapters run one after another in declaration
//! order. Every adapter runs in its own task under its own deadline, so a
//! hung, failing or panicking adapter only costs its own slot. Candidates are
//! validated, counted, and handed to the [`Deduplicator`].

use crate::config::CollectionConfig;
use crate::dedup::Deduplicator;
use crate::error::AdapterError;
use crate::models::{AdapterStatus, Record, SourceReport, StatusReport};
use crate::scrapers::{FetchOutcome, SourceAdapter};
use crate::utils::truncate_for_log;
use async_trait::async_trait;
use chrono::Utc;
use futures::FutureExt;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

/// Merged records of one cycle plus what every source contributed.
#[derive(Debug, Clone)]
pub struct Collection {
    pub records: Vec<Record>,
    pub report: StatusReport,
}

/// Anything that can run a full collection cycle.
///
/// Never fails: a cycle where every source is down still returns an empty
/// record set with an all-failed report.
#[async_trait]
pub trait Collect: Send + Sync {
    async fn collect_all(&self, use_browser: bool) -> Collection;
}

/// One adapter's finished run.
struct AdapterRun {
    name: String,
    outcome: FetchOutcome,
    elapsed: Duration,
}

/// Run an adapter in its own task, bounded by `timeout`.
///
/// On timeout the task is aborted, which drops any browser lease it holds.
async fn run_adapter(adapter: Arc<dyn SourceAdapter>, limit: usize, timeout: Duration) -> AdapterRun {
    let name = adapter.name().to_string();
    let limit = if limit == 0 {
        adapter.default_limit()
    } else {
        limit
    };
    let started = Instant::now();

    let task = tokio::spawn(async move { adapter.fetch(limit).await });
    let abort = task.abort_handle();
    let mut outcome = match tokio::time::timeout(timeout, task).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(join_error)) => FetchOutcome::failed(AdapterError::Panicked(join_error.to_string())),
        Err(_) => {
            abort.abort();
            FetchOutcome::failed(AdapterError::Timeout(timeout))
        }
    };
    outcome.records.truncate(limit);

    AdapterRun {
        name,
        outcome,
        elapsed: started.elapsed(),
    }
}

/// Key for `name` in the report; a repeated name gets a `#2`, `#3`... suffix
/// so one adapter's status never hides another's.
fn report_key(report: &StatusReport, name: String) -> String {
    if !report.sources.contains_key(&name) {
        return name;
    }
    let key = (2..)
        .map(|n| format!("{name} #{n}"))
        .find(|key| !report.sources.contains_key(key))
        .unwrap_or_default();
    warn!(source = %name, %key, "Duplicate adapter name; reported under a distinct key");
    key
}

/// Runs every configured adapter and merges the results.
pub struct Collector {
    adapters: Vec<Arc<dyn SourceAdapter>>,
    dedup: Deduplicator,
    settings: CollectionConfig,
}

impl Collector {
    pub fn new(
        adapters: Vec<Arc<dyn SourceAdapter>>,
        dedup: Deduplicator,
        settings: CollectionConfig,
    ) -> Self {
        Self {
            adapters,
            dedup,
            settings,
        }
    }

    pub fn adapters(&self) -> &[Arc<dyn SourceAdapter>] {
        &self.adapters
    }

    /// Validate one run's candidates into `records` and file its report.
    fn absorb(&self, run: AdapterRun, records: &mut Vec<Record>, report: &mut StatusReport) {
        let AdapterRun {
            name,
            outcome,
            elapsed,
        } = run;
        let status = outcome.status();
        let mut kept = 0;
        let mut dropped = 0;
        for raw in outcome.records {
            match Record::from_raw(raw) {
                Ok(record) => {
                    records.push(record);
                    kept += 1;
                }
                Err(reason) => {
                    debug!(source = %name, %reason, "Dropped candidate");
                    dropped += 1;
                }
            }
        }

        let elapsed_ms = elapsed.as_millis() as u64;
        let error = outcome.error.map(|e| e.to_string());
        let logged = error.as_deref().map(|e| truncate_for_log(e, 300));
        match status {
            AdapterStatus::Ok => {
                info!(source = %name, count = kept, dropped, elapsed_ms, "Source ok")
            }
            AdapterStatus::Partial => {
                warn!(source = %name, count = kept, dropped, elapsed_ms, error = ?logged, "Source partial")
            }
            AdapterStatus::Failed | AdapterStatus::Skipped => {
                error!(source = %name, elapsed_ms, error = ?logged, "Source failed")
            }
        }

        let key = report_key(report, name);
        report.sources.insert(
            key,
            SourceReport {
                status,
                record_count: kept,
                dropped,
                error,
                elapsed_ms,
            },
        );
    }
}

#[async_trait]
impl Collect for Collector {
    #[instrument(level = "info", skip_all, fields(adapters = self.adapters.len(), use_browser = use_browser))]
    async fn collect_all(&self, use_browser: bool) -> Collection {
        let started = Instant::now();
        let mut report = StatusReport::new(Utc::now());
        let mut records = Vec::new();
        let limit = self.settings.max_per_source;

        let (exclusive, cheap): (Vec<_>, Vec<_>) = self
            .adapters
            .iter()
            .cloned()
            .partition(|a| a.capability().is_exclusive());

        // Concurrent wave; completion order.
        let timeout = self.settings.adapter_timeout();
        let pending: Vec<futures::future::BoxFuture<'static, AdapterRun>> = cheap
            .into_iter()
            .map(|adapter| run_adapter(adapter, limit, timeout).boxed())
            .collect();
        let runs: Vec<AdapterRun> = stream::iter(pending)
            .buffer_unordered(self.settings.max_concurrent.max(1))
            .collect()
            .await;
        for run in runs {
            self.absorb(run, &mut records, &mut report);
        }

        // Browser lane; declaration order.
        if use_browser {
            let timeout = self.settings.browser_timeout();
            for adapter in exclusive {
                let run = run_adapter(adapter, limit, timeout).await;
                self.absorb(run, &mut records, &mut report);
            }
        } else {
            for adapter in exclusive {
                debug!(source = adapter.name(), "Browser automation disabled; skipping");
                let key = report_key(&report, adapter.name().to_string());
                report.sources.insert(
                    key,
                    SourceReport {
                        status: AdapterStatus::Skipped,
                        record_count: 0,
                        dropped: 0,
                        error: None,
                        elapsed_ms: 0,
                    },
                );
            }
        }

        report.raw_records = records.len();
        let records = self.dedup.dedupe(records);
        report.merged_records = records.len();

        info!(
            raw = report.raw_records,
            merged = report.merged_records,
            ok = report.count(AdapterStatus::Ok),
            partial = report.count(AdapterStatus::Partial),
            failed = report.count(AdapterStatus::Failed),
            skipped = report.count(AdapterStatus::Skipped),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Collection finished"
        );
        if report.is_total_failure() {
            error!("Every source failed this cycle");
        }

        Collection { records, report }
    }
}
