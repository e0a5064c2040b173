use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackEventKind {
    AttemptStarted,
    Attached,
    AttemptFailed,
    AttemptTimedOut,
    Exhausted,
    RetryRequested,
}

impl fmt::Display for PlaybackEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AttemptStarted => write!(f, "TRY"),
            Self::Attached => write!(f, "PLAYING"),
            Self::AttemptFailed => write!(f, "FAILED"),
            Self::AttemptTimedOut => write!(f, "TIMEOUT"),
            Self::Exhausted => write!(f, "UNAVAILABLE"),
            Self::RetryRequested => write!(f, "RETRY"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub kind: PlaybackEventKind,
    /// Position in the attempt list, when the event belongs to an attempt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempt: Option<usize>,
    pub url: String,
    pub details: String,
}

impl PlaybackEvent {
    pub fn new(
        kind: PlaybackEventKind,
        attempt: Option<usize>,
        url: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            kind,
            attempt,
            url: url.into(),
            details: details.into(),
        }
    }
}

/// Fixed-capacity circular buffer for recent events. O(1) insert, evicts oldest when full.
#[derive(Debug, Clone)]
pub struct EventRing {
    buffer: VecDeque<PlaybackEvent>,
    capacity: usize,
}

impl EventRing {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, event: PlaybackEvent) {
        if self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(event);
    }

    /// Newest first.
    pub fn list(&self) -> Vec<PlaybackEvent> {
        self.buffer.iter().rev().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(kind: PlaybackEventKind, details: &str) -> PlaybackEvent {
        PlaybackEvent::new(kind, Some(0), "https://cdn/live.m3u8", details)
    }

    #[test]
    fn ring_evicts_oldest() {
        let mut ring = EventRing::new(2);
        ring.push(ev(PlaybackEventKind::AttemptStarted, "e1"));
        ring.push(ev(PlaybackEventKind::AttemptFailed, "e2"));
        ring.push(ev(PlaybackEventKind::AttemptStarted, "e3"));
        assert_eq!(ring.len(), 2);
        let events = ring.list();
        assert_eq!(events[0].details, "e3");
        assert_eq!(events[1].details, "e2");
    }

    #[test]
    fn list_is_newest_first() {
        let mut ring = EventRing::new(5);
        ring.push(ev(PlaybackEventKind::AttemptStarted, "e1"));
        ring.push(ev(PlaybackEventKind::Attached, "e2"));
        assert_eq!(ring.list()[0].kind, PlaybackEventKind::Attached);
    }

    #[test]
    fn zero_capacity_holds_one() {
        let mut ring = EventRing::new(0);
        ring.push(ev(PlaybackEventKind::AttemptStarted, "e1"));
        ring.push(ev(PlaybackEventKind::Exhausted, "e2"));
        assert_eq!(ring.len(), 1);
        assert!(!ring.is_empty());
    }

    #[test]
    fn kind_display() {
        assert_eq!(PlaybackEventKind::Exhausted.to_string(), "UNAVAILABLE");
        assert_eq!(PlaybackEventKind::AttemptTimedOut.to_string(), "TIMEOUT");
    }
}
