use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a URL is attached to the media backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackMode {
    /// Manifest parsed and followed client-side.
    Hls,
    /// Manifest handed to a backend that plays HLS itself.
    Native,
    /// Single progressive file (mp4, webm, ...).
    Progressive,
}

impl fmt::Display for PlaybackMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hls => write!(f, "hls"),
            Self::Native => write!(f, "native"),
            Self::Progressive => write!(f, "progressive"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Loading,
    Playing,
    Unavailable,
}

impl SessionState {
    pub fn can_transition_to(self, target: SessionState) -> bool {
        matches!(
            (self, target),
            (SessionState::Idle, SessionState::Loading)
                | (SessionState::Loading, SessionState::Playing)
                | (SessionState::Loading, SessionState::Unavailable)
                | (SessionState::Playing, SessionState::Loading)
                | (SessionState::Unavailable, SessionState::Loading)
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Loading => write!(f, "loading"),
            Self::Playing => write!(f, "playing"),
            Self::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// Point-in-time view of a playback session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatus {
    pub id: Uuid,
    pub match_id: String,
    pub state: SessionState,
    pub source_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<PlaybackMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant_url: Option<String>,
    pub attempts_made: usize,
    pub runs: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
