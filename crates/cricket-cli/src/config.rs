//! TOML configuration file schema and parsing.
//!
//! Example config file:
//!
//! ```toml
//! state_dir = ".cricket-stream"
//!
//! [server]
//! listen = "0.0.0.0:8080"
//! log_format = "json"
//!
//! [feed]
//! cache_ttl_ms = 30000
//! retry_backoff_ms = 200
//! proxies = ["https://corsproxy.io/?{url}"]
//!
//! [[source]]
//! name = "primary"
//! url = "https://example.com/matches.json"
//! proxy = true
//!
//! [resolver]
//! probe_timeout_ms = 4000
//! demo_urls = ["https://example.com/demo.mp4"]
//!
//! [player]
//! attempt_timeout_ms = 10000
//! fallback_urls = ["https://example.com/fallback.m3u8"]
//! ```

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use cricket_core::loader::proxied_url;
use cricket_core::{FeedConfig, PlayerConfig, ResolverConfig, SourceDef};

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Directory for the flag file.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub feed: FeedSection,

    #[serde(default)]
    pub source: Vec<SourceDef>,

    #[serde(default)]
    pub resolver: ResolverSection,

    #[serde(default)]
    pub player: PlayerSection,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            server: ServerConfig::default(),
            feed: FeedSection::default(),
            source: Vec::new(),
            resolver: ResolverSection::default(),
            player: PlayerSection::default(),
        }
    }
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".cricket-stream")
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            log_format: default_log_format(),
        }
    }
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_log_format() -> String {
    "pretty".into()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedSection {
    pub cache_ttl_ms: Option<u64>,
    pub request_timeout_ms: Option<u64>,
    pub max_retries: Option<u32>,
    /// Base delay before the first retry; doubles on each further one.
    pub retry_backoff_ms: Option<u64>,
    pub max_concurrent_fetches: Option<usize>,
    #[serde(default)]
    pub proxies: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResolverSection {
    pub probe: Option<bool>,
    pub probe_timeout_ms: Option<u64>,
    /// Stream URL guess; `{id}` is replaced by the match id.
    pub url_template: Option<String>,
    #[serde(default)]
    pub demo_urls: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlayerSection {
    pub attempt_timeout_ms: Option<u64>,
    pub max_attempts: Option<usize>,
    pub native_hls: Option<bool>,
    pub event_limit: Option<usize>,
    #[serde(default)]
    pub fallback_urls: Vec<String>,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {}", path.display(), e))?;

        let config: AppConfig = toml::from_str(&content)
            .map_err(|e| format!("Failed to parse config file {}: {}", path.display(), e))?;

        config.validate()?;
        Ok(config)
    }

    /// Loads `path` when given, otherwise the built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, String> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn to_feed_config(&self) -> FeedConfig {
        let f = &self.feed;
        let mut c = FeedConfig::default()
            .with_proxies(f.proxies.clone())
            .with_sources(self.source.clone());
        if let Some(v) = f.cache_ttl_ms {
            c = c.with_cache_ttl(v);
        }
        if let Some(v) = f.request_timeout_ms {
            c = c.with_request_timeout(v);
        }
        if let Some(v) = f.max_retries {
            c = c.with_max_retries(v);
        }
        if let Some(v) = f.retry_backoff_ms {
            c = c.with_retry_backoff(v);
        }
        if let Some(v) = f.max_concurrent_fetches {
            c = c.with_max_concurrent_fetches(v);
        }
        c
    }

    pub fn to_resolver_config(&self) -> ResolverConfig {
        let r = &self.resolver;
        let mut c = ResolverConfig::default().with_demo_urls(r.demo_urls.clone());
        if let Some(v) = r.probe {
            c = c.with_probe(v);
        }
        if let Some(v) = r.probe_timeout_ms {
            c = c.with_probe_timeout(v);
        }
        if let Some(ref t) = r.url_template {
            c = c.with_url_template(t.clone());
        }
        c
    }

    pub fn to_player_config(&self) -> PlayerConfig {
        let p = &self.player;
        let mut c = PlayerConfig::default().with_fallback_urls(p.fallback_urls.clone());
        if let Some(v) = p.attempt_timeout_ms {
            c = c.with_attempt_timeout(v);
        }
        if let Some(v) = p.max_attempts {
            c = c.with_max_attempts(v);
        }
        if let Some(v) = p.native_hls {
            c = c.with_native_hls(v);
        }
        if let Some(v) = p.event_limit {
            c = c.with_event_limit(v);
        }
        c
    }

    fn validate(&self) -> Result<(), String> {
        let mut names = HashSet::new();
        for (i, s) in self.source.iter().enumerate() {
            if s.name.trim().is_empty() {
                return Err(format!("Source name at index {} must not be empty", i));
            }
            if !names.insert(s.name.as_str()) {
                return Err(format!("Duplicate source name: {}", s.name));
            }
            check_http_url(&s.url).map_err(|e| format!("Invalid URL for source '{}': {}", s.name, e))?;
        }

        for (i, template) in self.feed.proxies.iter().enumerate() {
            let sample = proxied_url(template, "https://example.com/matches.json");
            check_http_url(&sample)
                .map_err(|e| format!("Invalid proxy template at index {}: {} ({})", i, template, e))?;
        }

        if self.feed.cache_ttl_ms == Some(0) {
            return Err("feed.cache_ttl_ms must be greater than zero".into());
        }

        if let Some(ref t) = self.resolver.url_template {
            check_http_url(&t.replace("{id}", "match"))
                .map_err(|e| format!("Invalid resolver.url_template: {} ({})", t, e))?;
        }
        for u in &self.resolver.demo_urls {
            check_http_url(u).map_err(|e| format!("Invalid demo URL: {}", e))?;
        }
        for u in &self.player.fallback_urls {
            check_http_url(u).map_err(|e| format!("Invalid fallback URL: {}", e))?;
        }

        match self.server.log_format.as_str() {
            "pretty" | "json" => {}
            other => {
                return Err(format!(
                    "Invalid log_format '{}': must be 'pretty' or 'json'",
                    other
                ));
            }
        }

        Ok(())
    }
}

fn check_http_url(s: &str) -> Result<(), String> {
    let parsed = url::Url::parse(s).map_err(|e| format!("{} ({})", s, e))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(format!("{} (scheme '{}' is not http or https)", s, other)),
    }
}
