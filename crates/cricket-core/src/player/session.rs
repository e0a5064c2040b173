use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::attach::{attach, Attached, StreamError};
use super::event::{EventRing, PlaybackEvent, PlaybackEventKind};
use super::state::{SessionState, SessionStatus};
use crate::config::PlayerConfig;
use crate::loader::{Loader, ProxyRotation};

#[derive(Debug)]
struct Inner {
    state: SessionState,
    current: Option<Attached>,
    attempts_made: usize,
    runs: u32,
    last_error: Option<String>,
    events: EventRing,
    updated_at: DateTime<Utc>,
}

impl Inner {
    fn transition(&mut self, target: SessionState, session_id: Uuid) {
        if !self.state.can_transition_to(target) {
            warn!(session_id = %session_id, from = %self.state, to = %target, "Unexpected state transition");
        }
        self.state = target;
        self.updated_at = Utc::now();
    }

    fn record(&mut self, event: PlaybackEvent) {
        self.events.push(event);
        self.updated_at = Utc::now();
    }
}

/// Plays one match: walks the attempt list until a URL attaches.
pub struct PlaybackSession {
    id: Uuid,
    match_id: String,
    source_url: String,
    config: PlayerConfig,
    loader: Arc<dyn Loader>,
    proxies: Arc<ProxyRotation>,
    inner: RwLock<Inner>,
    run_lock: Mutex<()>,
    created_at: DateTime<Utc>,
}

impl PlaybackSession {
    pub fn new(
        match_id: impl Into<String>,
        source_url: impl Into<String>,
        config: PlayerConfig,
        loader: Arc<dyn Loader>,
        proxies: Arc<ProxyRotation>,
    ) -> Self {
        let now = Utc::now();
        let events = EventRing::new(config.event_limit);
        Self {
            id: Uuid::new_v4(),
            match_id: match_id.into(),
            source_url: source_url.into(),
            config,
            loader,
            proxies,
            inner: RwLock::new(Inner {
                state: SessionState::Idle,
                current: None,
                attempts_made: 0,
                runs: 0,
                last_error: None,
                events,
                updated_at: now,
            }),
            run_lock: Mutex::new(()),
            created_at: now,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Newest first.
    pub async fn events(&self) -> Vec<PlaybackEvent> {
        self.inner.read().await.events.list()
    }

    pub async fn status(&self) -> SessionStatus {
        let inner = self.inner.read().await;
        SessionStatus {
            id: self.id,
            match_id: self.match_id.clone(),
            state: inner.state,
            source_url: self.source_url.clone(),
            current_url: inner.current.as_ref().map(|a| a.url.clone()),
            mode: inner.current.as_ref().map(|a| a.mode),
            variant_url: inner.current.as_ref().and_then(|a| a.variant_url.clone()),
            attempts_made: inner.attempts_made,
            runs: inner.runs,
            last_error: inner.last_error.clone(),
            created_at: self.created_at,
            updated_at: inner.updated_at,
        }
    }

    /// URLs to try, in order: the source, its proxied forms, then the
    /// configured fallbacks. Duplicates dropped, capped at `max_attempts`.
    pub fn attempt_urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = Vec::new();
        let candidates = std::iter::once(self.source_url.clone())
            .chain(self.proxies.variants(&self.source_url))
            .chain(self.config.fallback_urls.iter().cloned());
        for url in candidates {
            let url = url.trim().to_string();
            if url.is_empty() || urls.contains(&url) {
                continue;
            }
            urls.push(url);
            if urls.len() >= self.config.max_attempts {
                break;
            }
        }
        urls
    }

    /// Runs the attempt loop to completion.
    ///
    /// Concurrent calls do not stack: while one run is in flight, others
    /// return the current status immediately.
    pub async fn run(&self) -> SessionStatus {
        let Ok(_guard) = self.run_lock.try_lock() else {
            debug!(session_id = %self.id, "Run already in progress");
            return self.status().await;
        };

        {
            let mut inner = self.inner.write().await;
            inner.transition(SessionState::Loading, self.id);
            inner.runs += 1;
            inner.attempts_made = 0;
            inner.current = None;
            inner.last_error = None;
        }

        let urls = self.attempt_urls();
        info!(session_id = %self.id, match_id = %self.match_id, attempts = urls.len(), "Starting playback");

        for (idx, url) in urls.iter().enumerate() {
            {
                let mut inner = self.inner.write().await;
                inner.attempts_made = idx + 1;
                inner.record(PlaybackEvent::new(
                    PlaybackEventKind::AttemptStarted,
                    Some(idx),
                    url.as_str(),
                    format!("attempt {} of {}", idx + 1, urls.len()),
                ));
            }

            let outcome = match tokio::time::timeout(
                self.config.attempt_timeout,
                attach(self.loader.as_ref(), url, self.config.native_hls),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(StreamError::Timeout(self.config.attempt_timeout)),
            };

            let mut inner = self.inner.write().await;
            match outcome {
                Ok(attached) => {
                    info!(session_id = %self.id, url = %url, mode = %attached.mode, "Playback attached");
                    inner.record(PlaybackEvent::new(
                        PlaybackEventKind::Attached,
                        Some(idx),
                        url.as_str(),
                        format!("{} playback", attached.mode),
                    ));
                    inner.current = Some(attached);
                    inner.transition(SessionState::Playing, self.id);
                    drop(inner);
                    return self.status().await;
                }
                Err(e) => {
                    let kind = match e {
                        StreamError::Timeout(_) => PlaybackEventKind::AttemptTimedOut,
                        _ => PlaybackEventKind::AttemptFailed,
                    };
                    warn!(session_id = %self.id, url = %url, error = %e, "Playback attempt failed");
                    inner.record(PlaybackEvent::new(kind, Some(idx), url.as_str(), e.to_string()));
                    inner.last_error = Some(e.to_string());
                }
            }
        }

        let mut inner = self.inner.write().await;
        warn!(session_id = %self.id, match_id = %self.match_id, "Stream unavailable");
        inner.record(PlaybackEvent::new(
            PlaybackEventKind::Exhausted,
            None,
            self.source_url.as_str(),
            format!("all {} attempts failed", urls.len()),
        ));
        inner.transition(SessionState::Unavailable, self.id);
        drop(inner);
        self.status().await
    }

    /// Starts over from the first attempt.
    pub async fn retry(&self) -> SessionStatus {
        {
            let mut inner = self.inner.write().await;
            inner.record(PlaybackEvent::new(
                PlaybackEventKind::RetryRequested,
                None,
                self.source_url.as_str(),
                "manual retry",
            ));
        }
        self.run().await
    }

    /// Runs the attempt loop on a background task.
    pub fn spawn_run(self: &Arc<Self>) -> JoinHandle<SessionStatus> {
        let session = Arc::clone(self);
        tokio::spawn(async move { session.run().await })
    }

    pub fn spawn_retry(self: &Arc<Self>) -> JoinHandle<SessionStatus> {
        let session = Arc::clone(self);
        tokio::spawn(async move { session.retry().await })
    }
}
