mod http;
mod proxy;

pub use http::HttpLoader;
pub use proxy::{proxied_url, ProxyRotation};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("HTTP error {status} fetching {url}: {message}")]
    Http {
        url: String,
        status: u16,
        message: String,
        is_last_retry: bool,
    },
    #[error("Network error fetching {url}: {reason}")]
    Network {
        url: String,
        reason: String,
        is_last_retry: bool,
    },
    #[error("Parse error for {url}: {message}")]
    Parse { url: String, message: String },
    #[error("Timeout fetching {url}")]
    Timeout { url: String, is_last_retry: bool },
}

impl LoadError {
    pub fn is_last_retry(&self) -> bool {
        match self {
            Self::Http { is_last_retry, .. } => *is_last_retry,
            Self::Network { is_last_retry, .. } => *is_last_retry,
            Self::Timeout { is_last_retry, .. } => *is_last_retry,
            Self::Parse { .. } => true,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result of a lightweight existence check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeInfo {
    pub status: u16,
    pub content_type: Option<String>,
}

impl ProbeInfo {
    pub fn is_manifest(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("mpegurl"))
    }
}

/// Fetches feed bodies, manifests, and probes media URLs.
///
/// Object-safe and Send + Sync so one loader can be shared by the fetcher,
/// the resolver, and every playback session.
#[async_trait]
pub trait Loader: Send + Sync {
    async fn load(&self, uri: &str) -> Result<String, LoadError>;

    async fn probe(&self, uri: &str) -> Result<ProbeInfo, LoadError>;
}
