use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, RANGE};
use reqwest::{Client, Response, StatusCode};
use tracing::{debug, warn};

use super::{LoadError, Loader, ProbeInfo};

const USER_AGENT: &str = concat!("cricket-stream/", env!("CARGO_PKG_VERSION"));

/// HTTP loader with connection pooling, retries, and backoff.
#[derive(Debug, Clone)]
pub struct HttpLoader {
    client: Client,
    max_retries: u32,
    base_backoff: Duration,
}

impl HttpLoader {
    pub fn new(timeout: Duration, max_retries: u32, base_backoff: Duration) -> Result<Self, LoadError> {
        let client = Self::build_client(timeout)?;
        Ok(Self::with_client(client, max_retries, base_backoff))
    }

    pub fn with_client(client: Client, max_retries: u32, base_backoff: Duration) -> Self {
        Self {
            client,
            max_retries,
            base_backoff,
        }
    }

    pub fn from_config(config: &crate::config::FeedConfig) -> Result<Self, LoadError> {
        Self::new(config.request_timeout, config.max_retries, config.retry_backoff)
    }

    pub fn build_client(timeout: Duration) -> Result<Client, LoadError> {
        Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .pool_max_idle_per_host(20)
            .user_agent(USER_AGENT)
            .gzip(true)
            .build()
            .map_err(|e| LoadError::Network {
                url: String::new(),
                reason: format!("failed to build HTTP client: {e}"),
                is_last_retry: true,
            })
    }

    fn classify_send_error(uri: &str, e: reqwest::Error, is_last: bool) -> LoadError {
        if e.is_timeout() {
            LoadError::Timeout {
                url: uri.to_string(),
                is_last_retry: is_last,
            }
        } else {
            LoadError::Network {
                url: uri.to_string(),
                reason: e.to_string(),
                is_last_retry: is_last,
            }
        }
    }

    fn status_error(uri: &str, status: StatusCode, is_last: bool) -> LoadError {
        LoadError::Http {
            url: uri.to_string(),
            status: status.as_u16(),
            message: status.canonical_reason().unwrap_or("Unknown").to_string(),
            is_last_retry: is_last,
        }
    }

    fn probe_info(response: &Response) -> ProbeInfo {
        ProbeInfo {
            status: response.status().as_u16(),
            content_type: response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string()),
        }
    }
}

#[async_trait]
impl Loader for HttpLoader {
    async fn load(&self, uri: &str) -> Result<String, LoadError> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            let is_last = attempt == self.max_retries;

            if attempt > 0 {
                let backoff = self.base_backoff * 2u32.saturating_pow(attempt - 1);
                debug!(uri, attempt, backoff_ms = backoff.as_millis(), "Retrying fetch");
                tokio::time::sleep(backoff).await;
            }

            match self.client.get(uri).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        match response.text().await {
                            Ok(body) => return Ok(body),
                            Err(e) => {
                                last_error = Some(LoadError::Network {
                                    url: uri.to_string(),
                                    reason: e.to_string(),
                                    is_last_retry: is_last,
                                });
                            }
                        }
                    } else {
                        warn!(uri, status = status.as_u16(), attempt, "Fetch returned error status");
                        let err = Self::status_error(uri, status, is_last);
                        if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
                            return Err(err);
                        }
                        last_error = Some(err);
                    }
                }
                Err(e) => {
                    warn!(uri, attempt, error = %e, "Fetch failed");
                    last_error = Some(Self::classify_send_error(uri, e, is_last));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| LoadError::Network {
            url: uri.to_string(),
            reason: "no attempt made".into(),
            is_last_retry: true,
        }))
    }

    async fn probe(&self, uri: &str) -> Result<ProbeInfo, LoadError> {
        let head = self
            .client
            .head(uri)
            .send()
            .await
            .map_err(|e| Self::classify_send_error(uri, e, true))?;

        let status = head.status();
        if status.is_success() {
            return Ok(Self::probe_info(&head));
        }

        // Some CDNs and relays reject HEAD outright.
        if status == StatusCode::METHOD_NOT_ALLOWED || status == StatusCode::NOT_IMPLEMENTED {
            debug!(uri, "HEAD rejected, probing with ranged GET");
            let ranged = self
                .client
                .get(uri)
                .header(RANGE, "bytes=0-0")
                .send()
                .await
                .map_err(|e| Self::classify_send_error(uri, e, true))?;
            if ranged.status().is_success() {
                return Ok(Self::probe_info(&ranged));
            }
            return Err(Self::status_error(uri, ranged.status(), true));
        }

        Err(Self::status_error(uri, status, true))
    }
}
