//! Freshness cache over the collector.
//!
//! Holds the last merged record set with its status report and serves it
//! until the TTL runs out. At most one collection runs at a time: callers
//! that need a refresh while one is in flight either get the current data
//! straight away (flagged stale) or, when there is nothing to serve yet,
//! wait for the in-flight refresh and share its result.

use crate::collector::{Collect, Collection};
use crate::models::{Record, StatusReport};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

/// What a caller gets back from [`FreshnessCache::get`].
#[derive(Debug, Clone)]
pub struct CacheResponse {
    pub records: Arc<Vec<Record>>,
    /// Report of the most recent collection attempt.
    pub report: Arc<StatusReport>,
    /// Served without running a collection for this call.
    pub from_cache: bool,
    /// The records predate a failed or in-flight refresh.
    pub stale: bool,
    /// When the records were collected; `None` before the first success.
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl CacheResponse {
    /// `HIT`, `MISS` or `STALE`.
    pub fn cache_status(&self) -> &'static str {
        match (self.from_cache, self.stale) {
            (_, true) => "STALE",
            (true, false) => "HIT",
            (false, false) => "MISS",
        }
    }
}

#[derive(Debug)]
struct State {
    records: Arc<Vec<Record>>,
    report: Arc<StatusReport>,
    refreshed_at: Option<DateTime<Utc>>,
    /// Last successful collection.
    refreshed: Option<Instant>,
    /// Bumped by every finished collection attempt.
    generation: u64,
    stale: bool,
}

impl Default for State {
    fn default() -> Self {
        Self {
            records: Arc::new(Vec::new()),
            report: Arc::new(StatusReport::new(Utc::now())),
            refreshed_at: None,
            refreshed: None,
            generation: 0,
            stale: false,
        }
    }
}

impl State {
    fn has_data(&self) -> bool {
        self.refreshed.is_some()
    }

    fn is_fresh(&self, ttl: Duration) -> bool {
        self.refreshed.is_some_and(|t| t.elapsed() < ttl)
    }

    fn response(&self, from_cache: bool, stale: bool) -> CacheResponse {
        CacheResponse {
            records: Arc::clone(&self.records),
            report: Arc::clone(&self.report),
            from_cache,
            stale,
            refreshed_at: self.refreshed_at,
        }
    }
}

/// Last good collection plus single-flight refresh.
pub struct FreshnessCache {
    collector: Arc<dyn Collect>,
    ttl: Duration,
    use_browser: bool,
    state: RwLock<State>,
    refresh: Mutex<()>,
}

impl FreshnessCache {
    pub fn new(collector: Arc<dyn Collect>, ttl: Duration, use_browser: bool) -> Self {
        Self {
            collector,
            ttl,
            use_browser,
            state: RwLock::new(State::default()),
            refresh: Mutex::new(()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Current records, collecting first when forced, empty or expired.
    #[instrument(level = "info", skip_all, fields(force_refresh = force_refresh))]
    pub async fn get(&self, force_refresh: bool) -> CacheResponse {
        let seen = {
            let state = self.state.read().await;
            if !force_refresh && state.is_fresh(self.ttl) {
                debug!("Cache hit");
                return state.response(true, state.stale);
            }
            state.generation
        };
        self.refresh_since(seen, force_refresh).await
    }

    /// Collect unless a collection finished after generation `seen`.
    async fn refresh_since(&self, seen: u64, force_refresh: bool) -> CacheResponse {
        let _guard = match self.refresh.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                if !force_refresh {
                    let state = self.state.read().await;
                    if state.has_data() {
                        debug!("Refresh in flight; serving stale data");
                        return state.response(true, true);
                    }
                }
                self.refresh.lock().await
            }
        };

        // A refresh may have finished between the first read and the lock.
        {
            let state = self.state.read().await;
            if state.generation != seen {
                debug!("Sharing result of concurrent refresh");
                return state.response(false, state.stale);
            }
        }

        let collection = self.collector.collect_all(self.use_browser).await;
        self.store(collection).await
    }

    async fn store(&self, collection: Collection) -> CacheResponse {
        let Collection { records, report } = collection;
        let now = Instant::now();
        let mut state = self.state.write().await;
        state.generation += 1;

        if report.is_total_failure() && state.has_data() {
            warn!(
                kept = state.records.len(),
                "Every source failed; keeping previous records"
            );
            state.report = Arc::new(report);
            state.stale = true;
            return state.response(false, true);
        }

        info!(count = records.len(), "Cache refreshed");
        let total_failure = report.is_total_failure();
        state.records = Arc::new(records);
        state.report = Arc::new(report);
        state.stale = false;
        if !total_failure {
            state.refreshed = Some(now);
            state.refreshed_at = Some(Utc::now());
        }
        state.response(false, false)
    }

    /// Drop the cached records; the next [`get`](Self::get) collects.
    pub async fn invalidate(&self) {
        let mut state = self.state.write().await;
        *state = State {
            generation: state.generation,
            ..State::default()
        };
        info!("Cache invalidated");
    }
}
