use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A remote match feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDef {
    pub name: String,
    pub url: String,
    /// Retry through the configured relay proxies when the direct fetch fails.
    #[serde(default)]
    pub proxy: bool,
}

/// Configuration for the match fetcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// How long a fetched match list is served from memory (default: 30s).
    pub cache_ttl: Duration,
    /// HTTP request timeout for feed fetches.
    pub request_timeout: Duration,
    /// Maximum number of retries for failed fetches.
    pub max_retries: u32,
    /// Base backoff duration for retries (doubled each attempt).
    pub retry_backoff: Duration,
    /// Relay proxy templates. `{url}` is replaced by the percent-encoded target.
    pub proxies: Vec<String>,
    pub sources: Vec<SourceDef>,
    pub max_concurrent_fetches: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(30),
            request_timeout: Duration::from_secs(10),
            max_retries: 1,
            retry_backoff: Duration::from_millis(200),
            proxies: Vec::new(),
            sources: Vec::new(),
            max_concurrent_fetches: 4,
        }
    }
}

impl FeedConfig {
    pub fn with_cache_ttl(mut self, ms: u64) -> Self {
        self.cache_ttl = Duration::from_millis(ms.max(1));
        self
    }

    pub fn with_request_timeout(mut self, ms: u64) -> Self {
        self.request_timeout = Duration::from_millis(ms);
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_retry_backoff(mut self, ms: u64) -> Self {
        self.retry_backoff = Duration::from_millis(ms);
        self
    }

    pub fn with_proxies(mut self, proxies: Vec<String>) -> Self {
        self.proxies = proxies;
        self
    }

    pub fn with_sources(mut self, sources: Vec<SourceDef>) -> Self {
        self.sources = sources;
        self
    }

    pub fn with_max_concurrent_fetches(mut self, max: usize) -> Self {
        self.max_concurrent_fetches = max.max(1);
        self
    }
}

/// Configuration for stream URL resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Check candidates for existence before handing one out.
    pub probe: bool,
    pub probe_timeout: Duration,
    /// Guessed stream location; `{id}` is replaced by the match id.
    pub url_template: Option<String>,
    /// Last-resort videos, one picked at random.
    pub demo_urls: Vec<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            probe: true,
            probe_timeout: Duration::from_secs(4),
            url_template: None,
            demo_urls: Vec::new(),
        }
    }
}

impl ResolverConfig {
    pub fn with_probe(mut self, enabled: bool) -> Self {
        self.probe = enabled;
        self
    }

    pub fn with_probe_timeout(mut self, ms: u64) -> Self {
        self.probe_timeout = Duration::from_millis(ms);
        self
    }

    pub fn with_url_template(mut self, template: impl Into<String>) -> Self {
        self.url_template = Some(template.into());
        self
    }

    pub fn with_demo_urls(mut self, urls: Vec<String>) -> Self {
        self.demo_urls = urls;
        self
    }
}

/// Configuration for a playback session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Upper bound on a single attach attempt.
    pub attempt_timeout: Duration,
    pub max_attempts: usize,
    /// The backend plays HLS manifests itself, so only reachability is checked.
    pub native_hls: bool,
    /// Tried after the resolved URL and its proxied variants.
    pub fallback_urls: Vec<String>,
    /// Maximum number of events to retain per session (ring buffer capacity).
    pub event_limit: usize,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            attempt_timeout: Duration::from_secs(10),
            max_attempts: 6,
            native_hls: false,
            fallback_urls: Vec::new(),
            event_limit: 100,
        }
    }
}

impl PlayerConfig {
    pub fn with_attempt_timeout(mut self, ms: u64) -> Self {
        self.attempt_timeout = Duration::from_millis(ms);
        self
    }

    pub fn with_max_attempts(mut self, max: usize) -> Self {
        self.max_attempts = max.max(1);
        self
    }

    pub fn with_native_hls(mut self, native: bool) -> Self {
        self.native_hls = native;
        self
    }

    pub fn with_fallback_urls(mut self, urls: Vec<String>) -> Self {
        self.fallback_urls = urls;
        self
    }

    pub fn with_event_limit(mut self, limit: usize) -> Self {
        self.event_limit = limit.max(1);
        self
    }
}
