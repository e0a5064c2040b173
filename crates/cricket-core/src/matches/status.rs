use chrono::{DateTime, Duration, Utc};

use super::model::MatchStatus;

/// A match is assumed live for this long after its scheduled start.
pub const LIVE_WINDOW_HOURS: i64 = 8;

// Phrases are matched against whole words, in this order. Breaks and
// interruptions come first so "won the toss" or "play suspended" stay live.
const IN_PLAY_MARKERS: &[&str] = &[
    "toss", "suspended", "interrupted", "delayed", "rain delay", "bad light", "innings break",
    "stumps", "drinks", "lunch", "tea",
];
const COMPLETED_MARKERS: &[&str] = &[
    "completed", "complete", "finished", "result", "ended", "won by", "won the match", "beat",
    "abandoned", "draw", "drawn", "tied",
];
const UPCOMING_MARKERS: &[&str] = &[
    "upcoming", "scheduled", "not started", "yet to begin", "fixture", "starts", "preview",
];
const LIVE_MARKERS: &[&str] = &["live", "in progress"];

/// Explicit status fields a feed entry may carry.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusHints<'a> {
    pub text: Option<&'a str>,
    pub started: Option<bool>,
    pub ended: Option<bool>,
}

/// Maps a free-form status label onto a [`MatchStatus`], if it is recognisable.
pub fn status_from_text(text: &str) -> Option<MatchStatus> {
    let words: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    if words.is_empty() {
        return None;
    }
    let any = |markers: &[&str]| markers.iter().any(|m| has_phrase(&words, m));

    if any(IN_PLAY_MARKERS) {
        Some(MatchStatus::Live)
    } else if any(COMPLETED_MARKERS) {
        Some(MatchStatus::Completed)
    } else if any(UPCOMING_MARKERS) {
        Some(MatchStatus::Upcoming)
    } else if any(LIVE_MARKERS) {
        Some(MatchStatus::Live)
    } else {
        None
    }
}

/// True when the words of `phrase` appear consecutively in `words`.
fn has_phrase(words: &[String], phrase: &str) -> bool {
    let parts: Vec<&str> = phrase.split(' ').collect();
    words
        .windows(parts.len())
        .any(|w| w.iter().zip(&parts).all(|(word, part)| word == part))
}

/// Returns exactly one status for a match.
///
/// Explicit hints win: a recognisable status label first, then the
/// started/ended flags. Otherwise the time window decides: before the start
/// is upcoming, up to [`LIVE_WINDOW_HOURS`] after it is live, later is
/// completed.
pub fn classify_status(
    hints: StatusHints<'_>,
    start: DateTime<Utc>,
    now: DateTime<Utc>,
) -> MatchStatus {
    if let Some(status) = hints.text.and_then(status_from_text) {
        return status;
    }

    match (hints.started, hints.ended) {
        (_, Some(true)) => return MatchStatus::Completed,
        (Some(true), _) => return MatchStatus::Live,
        (Some(false), _) => return MatchStatus::Upcoming,
        _ => {}
    }

    if now < start {
        MatchStatus::Upcoming
    } else if now <= start + Duration::hours(LIVE_WINDOW_HOURS) {
        MatchStatus::Live
    } else {
        MatchStatus::Completed
    }
}
