use std::collections::HashMap;
use std::fmt::Write;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;

use cricket_core::{PlaybackSession, SessionState};

use crate::state::AppState;

const SESSION_STATES: [SessionState; 4] = [
    SessionState::Idle,
    SessionState::Loading,
    SessionState::Playing,
    SessionState::Unavailable,
];

pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let mut out = String::with_capacity(2048);

    let stats = state.fetcher.stats();
    let counters = [
        ("cricket_feed_cache_hits", "Match list requests served from cache", &stats.cache_hits),
        ("cricket_feed_source_fetches", "Requests sent to feed sources, relays included", &stats.source_fetches),
        ("cricket_feed_source_failures", "Feed sources that failed every attempt", &stats.source_failures),
        ("cricket_feed_stale_fallbacks", "Match lists served stale after all sources failed", &stats.stale_fallbacks),
        ("cricket_feed_mock_fallbacks", "Match lists served from placeholder data", &stats.mock_fallbacks),
    ];
    for (name, help, value) in counters {
        let _ = writeln!(out, "# TYPE {name} counter");
        let _ = writeln!(out, "# HELP {name} {help}");
        let _ = writeln!(out, "{name}_total {}", value.load(Ordering::Relaxed));
    }

    let sessions: Vec<Arc<PlaybackSession>> =
        state.sessions.iter().map(|e| Arc::clone(e.value())).collect();

    let mut by_state: HashMap<SessionState, usize> = HashMap::new();
    let mut attempts = Vec::with_capacity(sessions.len());
    for s in &sessions {
        let status = s.status().await;
        *by_state.entry(status.state).or_default() += 1;
        attempts.push((status.id, status.match_id, status.attempts_made));
    }

    let _ = writeln!(out, "# TYPE cricket_sessions gauge");
    let _ = writeln!(out, "# HELP cricket_sessions Playback sessions by state");
    for st in SESSION_STATES {
        let _ = writeln!(
            out,
            "cricket_sessions{{state=\"{}\"}} {}",
            st,
            by_state.get(&st).copied().unwrap_or(0)
        );
    }

    let _ = writeln!(out, "# TYPE cricket_session_attempts gauge");
    let _ = writeln!(out, "# HELP cricket_session_attempts Attempts made in the latest run");
    for (id, match_id, n) in &attempts {
        let _ = writeln!(
            out,
            "cricket_session_attempts{{session_id=\"{}\",match_id=\"{}\"}} {}",
            id,
            escape_label(match_id),
            n
        );
    }

    let _ = writeln!(out, "# EOF");

    (
        [(
            header::CONTENT_TYPE,
            "application/openmetrics-text; version=1.0.0; charset=utf-8",
        )],
        out,
    )
}

/// Escapes a label value for the exposition format. Match ids come straight
/// from third-party feeds.
fn escape_label(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out
}
