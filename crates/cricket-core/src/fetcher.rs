use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::TtlCache;
use crate::config::{FeedConfig, SourceDef};
use crate::feed::parse_feed_body;
use crate::loader::{LoadError, Loader, ProxyRotation};
use crate::matches::mock::mock_matches;
use crate::matches::{dedup_matches, sort_matches, Match};

const CACHE_KEY: &str = "matches";

/// Where a match list came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedOrigin {
    /// Fetched from the sources just now.
    Live,
    /// Served from the cache within its TTL.
    Cache,
    /// Every source failed; an expired cached list was served instead.
    Stale,
    /// Every source failed and nothing was cached.
    Mock,
}

impl std::fmt::Display for FeedOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Live => write!(f, "live"),
            Self::Cache => write!(f, "cache"),
            Self::Stale => write!(f, "stale"),
            Self::Mock => write!(f, "mock"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub fetched_at: DateTime<Utc>,
    pub matches: Vec<Match>,
}

#[derive(Debug, Clone)]
pub struct MatchList {
    pub origin: FeedOrigin,
    pub snapshot: Arc<Snapshot>,
}

impl MatchList {
    pub fn matches(&self) -> &[Match] {
        &self.snapshot.matches
    }

    pub fn find(&self, id: &str) -> Option<&Match> {
        self.snapshot.matches.iter().find(|m| m.id == id)
    }
}

/// Counters exposed through the metrics endpoint.
#[derive(Debug, Default)]
pub struct FetchStats {
    pub cache_hits: AtomicU64,
    pub source_fetches: AtomicU64,
    pub source_failures: AtomicU64,
    pub stale_fallbacks: AtomicU64,
    pub mock_fallbacks: AtomicU64,
}

/// Aggregates the configured feeds behind a short-lived cache.
pub struct MatchFetcher {
    config: FeedConfig,
    loader: Arc<dyn Loader>,
    proxies: Arc<ProxyRotation>,
    cache: TtlCache<Snapshot>,
    refill: Mutex<()>,
    stats: FetchStats,
}

impl MatchFetcher {
    pub fn new(config: FeedConfig, loader: Arc<dyn Loader>) -> Self {
        Self {
            proxies: Arc::new(ProxyRotation::new(config.proxies.clone())),
            cache: TtlCache::new(config.cache_ttl),
            refill: Mutex::new(()),
            stats: FetchStats::default(),
            config,
            loader,
        }
    }

    pub fn stats(&self) -> &FetchStats {
        &self.stats
    }

    /// Relay rotation shared with playback sessions.
    pub fn proxies(&self) -> Arc<ProxyRotation> {
        Arc::clone(&self.proxies)
    }

    /// Current match list. Never fails: falls back to the stale cache, then
    /// to placeholder records.
    ///
    /// Only one caller refills an expired cache; concurrent callers wait and
    /// then share the list it stored.
    pub async fn fetch(&self) -> MatchList {
        if let Some(snapshot) = self.cache.get(CACHE_KEY).await {
            return self.cache_hit(snapshot);
        }

        let _refill = self.refill.lock().await;
        let now = Utc::now();
        let mut fetched = false;
        let refreshed = &mut fetched;
        let filled = self
            .cache
            .get_or_try_insert_with(CACHE_KEY, || async move {
                *refreshed = true;
                let matches = self.fetch_sources(now).await;
                if matches.is_empty() {
                    Err(())
                } else {
                    Ok(Snapshot {
                        fetched_at: now,
                        matches,
                    })
                }
            })
            .await;

        match filled {
            Ok(snapshot) if fetched => {
                info!(count = snapshot.matches.len(), "Fetched match list");
                return MatchList {
                    origin: FeedOrigin::Live,
                    snapshot,
                };
            }
            Ok(snapshot) => return self.cache_hit(snapshot),
            Err(()) => {}
        }

        if let Some(snapshot) = self.cache.get_stale(CACHE_KEY).await {
            warn!(
                fetched_at = %snapshot.fetched_at,
                "All sources failed, serving stale match list"
            );
            self.stats.stale_fallbacks.fetch_add(1, Ordering::Relaxed);
            return MatchList {
                origin: FeedOrigin::Stale,
                snapshot,
            };
        }

        warn!("All sources failed and nothing cached, serving placeholder matches");
        self.stats.mock_fallbacks.fetch_add(1, Ordering::Relaxed);
        MatchList {
            origin: FeedOrigin::Mock,
            snapshot: Arc::new(Snapshot {
                fetched_at: now,
                matches: mock_matches(now),
            }),
        }
    }

    /// Drops the cached list so the next [`fetch`](Self::fetch) hits the sources.
    pub async fn invalidate(&self) {
        self.cache.invalidate(CACHE_KEY).await;
    }

    /// Fetches from the sources now, whatever the cache holds.
    pub async fn refresh(&self) -> MatchList {
        self.invalidate().await;
        self.fetch().await
    }

    fn cache_hit(&self, snapshot: Arc<Snapshot>) -> MatchList {
        self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
        MatchList {
            origin: FeedOrigin::Cache,
            snapshot,
        }
    }

    pub async fn find(&self, id: &str) -> Option<Match> {
        self.fetch().await.find(id).cloned()
    }

    async fn fetch_sources(&self, now: DateTime<Utc>) -> Vec<Match> {
        let concurrency = self.config.max_concurrent_fetches.max(1);
        let futures: Vec<_> = self
            .config
            .sources
            .iter()
            .enumerate()
            .map(|(i, source)| async move { (i, self.fetch_source(source, now).await) })
            .collect();

        let mut results: Vec<(usize, Result<Vec<Match>, LoadError>)> = stream::iter(futures)
            .buffer_unordered(concurrency)
            .collect()
            .await;
        // Earlier sources win deduplication, whatever order they finished in.
        results.sort_by_key(|(i, _)| *i);

        let mut all = Vec::new();
        for (i, result) in results {
            let source = &self.config.sources[i];
            match result {
                Ok(matches) => {
                    debug!(source = %source.name, count = matches.len(), "Source answered");
                    all.extend(matches);
                }
                Err(e) => {
                    self.stats.source_failures.fetch_add(1, Ordering::Relaxed);
                    warn!(source = %source.name, error = %e, "Source failed");
                }
            }
        }

        let mut matches = dedup_matches(all);
        sort_matches(&mut matches);
        matches
    }

    async fn fetch_source(
        &self,
        source: &SourceDef,
        now: DateTime<Utc>,
    ) -> Result<Vec<Match>, LoadError> {
        let mut targets = vec![source.url.clone()];
        if source.proxy {
            targets.extend(self.proxies.variants(&source.url));
        }

        let mut last_error = None;
        for (attempt, target) in targets.iter().enumerate() {
            self.stats.source_fetches.fetch_add(1, Ordering::Relaxed);
            let result = match self.loader.load(target).await {
                Ok(body) => parse_feed_body(&body, &source.name, target, now),
                Err(e) => Err(e),
            };
            match result {
                Ok(matches) => return Ok(matches),
                Err(e) => {
                    debug!(source = %source.name, attempt, url = %target, error = %e, "Source attempt failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| LoadError::Network {
            url: source.url.clone(),
            reason: "no fetch attempted".into(),
            is_last_retry: true,
        }))
    }
}
