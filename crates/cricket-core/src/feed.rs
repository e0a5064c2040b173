//! Defensive parsing of third-party match feeds.
//!
//! Feeds are undocumented and disagree on everything: the array may sit at the
//! top level or under one of several keys, each field has a handful of
//! spellings, teams come as strings, objects, or arrays, and start times come
//! as RFC 3339, naive timestamps, or epoch numbers. Every lookup below tries
//! its keys in order and an entry is only kept once both team names resolve.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;
use tracing::debug;

use crate::loader::LoadError;
use crate::matches::status::{classify_status, StatusHints};
use crate::matches::{Match, Team};

const LIST_KEYS: &[&str] = &["matches", "data", "events", "response", "results"];

const ID_KEYS: &[&str] = &["id", "matchId", "match_id", "unique_id", "eventId", "_id"];
const TEAM1_KEYS: &[&str] = &["team1", "teamA", "team_a", "homeTeam", "home_team", "home", "t1"];
const TEAM2_KEYS: &[&str] = &["team2", "teamB", "team_b", "awayTeam", "away_team", "away", "t2"];
const TEAM_LIST_KEYS: &[&str] = &["teams", "teamInfo", "team_info"];
const TITLE_KEYS: &[&str] = &["name", "title", "matchTitle", "match_title"];
const TEAM_NAME_KEYS: &[&str] = &["name", "teamName", "fullName", "title"];
const TEAM_SHORT_KEYS: &[&str] = &["shortName", "short_name", "shortname", "sname", "abbr"];
const TEAM_FLAG_KEYS: &[&str] = &["flag", "logo", "img", "image", "imageUrl", "flagUrl"];
const TOURNAMENT_KEYS: &[&str] = &[
    "tournament",
    "series",
    "seriesName",
    "series_name",
    "league",
    "competition",
    "event",
];
const START_KEYS: &[&str] = &[
    "startTime",
    "start_time",
    "dateTimeGMT",
    "startDate",
    "date",
    "start",
    "timestamp",
];
const STATUS_KEYS: &[&str] = &["status", "state", "matchStatus", "match_status"];
const STARTED_KEYS: &[&str] = &["matchStarted", "started"];
const ENDED_KEYS: &[&str] = &["matchEnded", "ended"];
const LIVE_FLAG_KEYS: &[&str] = &["isLive", "is_live", "live"];
const IMAGE_KEYS: &[&str] = &["image", "thumbnail", "banner", "poster", "cover", "img"];
const STREAM_KEYS: &[&str] = &["streamUrl", "stream_url", "stream", "m3u8", "hls", "url", "link"];
const AD_FREE_KEYS: &[&str] = &["adfree_url", "adfreeUrl", "adFreeUrl", "ad_free_url"];
const DAI_KEYS: &[&str] = &["dai_url", "daiUrl", "dai"];
const LANGUAGE_KEYS: &[&str] = &["language", "lang"];
const STREAMABLE_KEYS: &[&str] = &["isStreamable", "is_streamable", "streamable"];
const QUALITY_KEYS: &[&str] = &["quality", "resolution"];

const DEFAULT_TOURNAMENT: &str = "Cricket";
const DEFAULT_LANGUAGE: &str = "English";

/// Parses a raw feed body. Only malformed JSON is an error; unusable entries
/// are skipped.
pub fn parse_feed_body(
    body: &str,
    source: &str,
    url: &str,
    now: DateTime<Utc>,
) -> Result<Vec<Match>, LoadError> {
    let raw: Value = serde_json::from_str(body).map_err(|e| LoadError::Parse {
        url: url.to_string(),
        message: e.to_string(),
    })?;
    Ok(parse_feed(&raw, source, now))
}

pub fn parse_feed(raw: &Value, source: &str, now: DateTime<Utc>) -> Vec<Match> {
    let entries = match entries(raw) {
        Some(e) => e,
        None => return Vec::new(),
    };

    let matches: Vec<Match> = entries
        .iter()
        .filter_map(|entry| parse_entry(entry, source, now))
        .collect();

    debug!(
        source,
        entries = entries.len(),
        kept = matches.len(),
        "Parsed feed"
    );
    matches
}

fn entries(raw: &Value) -> Option<&Vec<Value>> {
    if let Some(list) = raw.as_array() {
        return Some(list);
    }
    LIST_KEYS.iter().find_map(|k| match raw.get(*k) {
        Some(Value::Array(list)) => Some(list),
        // Some feeds nest one more level, e.g. {"data": {"matches": [...]}}.
        Some(inner @ Value::Object(_)) => {
            LIST_KEYS.iter().find_map(|k2| inner.get(*k2).and_then(Value::as_array))
        }
        _ => None,
    })
}

fn parse_entry(entry: &Value, source: &str, now: DateTime<Utc>) -> Option<Match> {
    if !entry.is_object() {
        return None;
    }

    let (team1, team2) = teams(entry)?;

    let start_time = START_KEYS
        .iter()
        .find_map(|k| entry.get(*k).and_then(parse_time))
        .unwrap_or(now);

    let status_text = first_str(entry, STATUS_KEYS);
    let live_flag = first_bool(entry, LIVE_FLAG_KEYS) == Some(true);
    let hints = StatusHints {
        text: if live_flag { Some("live") } else { status_text.as_deref() },
        started: first_bool(entry, STARTED_KEYS),
        ended: first_bool(entry, ENDED_KEYS),
    };
    let status = classify_status(hints, start_time, now);

    let stream_url = first_url(entry, STREAM_KEYS);
    let ad_free_url = first_url(entry, AD_FREE_KEYS);
    let dai_url = first_url(entry, DAI_KEYS);
    let has_source = stream_url.is_some() || ad_free_url.is_some() || dai_url.is_some();

    let id = first_str(entry, ID_KEYS).unwrap_or_else(|| {
        format!(
            "{}-{}-{}-{}",
            slug(source),
            slug(&team1.name),
            slug(&team2.name),
            start_time.timestamp()
        )
    });

    Some(Match {
        id,
        team1,
        team2,
        start_time,
        status,
        tournament: first_str(entry, TOURNAMENT_KEYS)
            .unwrap_or_else(|| DEFAULT_TOURNAMENT.to_string()),
        image: first_str(entry, IMAGE_KEYS).unwrap_or_default(),
        stream_url,
        ad_free_url,
        dai_url,
        language: first_str(entry, LANGUAGE_KEYS).unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
        is_streamable: first_bool(entry, STREAMABLE_KEYS).unwrap_or(has_source),
        quality: first_str(entry, QUALITY_KEYS),
    })
}

fn teams(entry: &Value) -> Option<(Team, Team)> {
    let direct = (
        TEAM1_KEYS.iter().find_map(|k| entry.get(*k).and_then(team_from_value)),
        TEAM2_KEYS.iter().find_map(|k| entry.get(*k).and_then(team_from_value)),
    );
    if let (Some(t1), Some(t2)) = direct {
        return Some((t1, t2));
    }

    for key in TEAM_LIST_KEYS {
        if let Some(list) = entry.get(*key).and_then(Value::as_array) {
            let parsed: Vec<Team> = list.iter().filter_map(team_from_value).collect();
            if parsed.len() >= 2 {
                let mut it = parsed.into_iter();
                return Some((it.next()?, it.next()?));
            }
        }
    }

    TITLE_KEYS
        .iter()
        .find_map(|k| entry.get(*k).and_then(Value::as_str).and_then(split_title))
}

fn team_from_value(v: &Value) -> Option<Team> {
    match v {
        Value::String(s) => non_blank(s).map(Team::new),
        Value::Object(_) => {
            let name = first_str(v, TEAM_NAME_KEYS)?;
            let mut team = Team::new(name);
            if let Some(short) = first_str(v, TEAM_SHORT_KEYS) {
                team.short_name = short.to_uppercase();
            }
            if let Some(flag) = first_str(v, TEAM_FLAG_KEYS) {
                team = team.with_flag(flag);
            }
            Some(team)
        }
        _ => None,
    }
}

/// "India vs Australia, 1st Test" -> (India, Australia).
fn split_title(title: &str) -> Option<(Team, Team)> {
    let lower = title.to_ascii_lowercase();
    let (idx, sep_len) = [" vs. ", " vs ", " v "]
        .iter()
        .find_map(|sep| lower.find(sep).map(|i| (i, sep.len())))?;
    let left = non_blank(&title[..idx])?;
    let rest = &title[idx + sep_len..];
    let right = non_blank(rest.split(',').next().unwrap_or(rest))?;
    Some((Team::new(left), Team::new(right)))
}

fn non_blank(s: &str) -> Option<String> {
    let t = s.trim();
    (!t.is_empty()).then(|| t.to_string())
}

fn first_str(v: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match v.get(*k)? {
        Value::String(s) => non_blank(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn first_bool(v: &Value, keys: &[&str]) -> Option<bool> {
    keys.iter().find_map(|k| match v.get(*k)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        Value::Number(n) => n.as_i64().map(|i| i != 0),
        _ => None,
    })
}

fn first_url(v: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| {
        let s = v.get(*k)?.as_str()?.trim();
        (s.starts_with("http://") || s.starts_with("https://")).then(|| s.to_string())
    })
}

fn parse_time(v: &Value) -> Option<DateTime<Utc>> {
    match v {
        Value::Number(n) => n.as_i64().and_then(from_epoch),
        Value::String(s) => parse_time_str(s.trim()),
        _ => None,
    }
}

fn from_epoch(n: i64) -> Option<DateTime<Utc>> {
    // Anything past ~1973 in milliseconds is larger than any plausible seconds value.
    if n.abs() >= 100_000_000_000 {
        Utc.timestamp_millis_opt(n).single()
    } else {
        Utc.timestamp_opt(n, 0).single()
    }
}

pub(crate) fn parse_time_str(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }
    if let Ok(n) = s.parse::<i64>() {
        return from_epoch(n);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    const NAIVE_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn slug(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matches::MatchStatus;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 9, 12, 0, 0).unwrap()
    }

    #[test]
    fn parses_top_level_array_with_string_teams() {
        let raw = json!([{
            "id": "abc",
            "team1": "India",
            "team2": "Australia",
            "startTime": "2025-03-09T10:00:00Z",
            "tournament": "BGT",
            "streamUrl": "https://cdn.example/abc/index.m3u8"
        }]);
        let ms = parse_feed(&raw, "primary", now());
        assert_eq!(ms.len(), 1);
        let m = &ms[0];
        assert_eq!(m.id, "abc");
        assert_eq!(m.team1.short_name, "IND");
        assert_eq!(m.status, MatchStatus::Live);
        assert!(m.is_streamable);
        assert_eq!(m.language, "English");
    }

    #[test]
    fn parses_nested_object_teams_and_numeric_ids() {
        let raw = json!({
            "data": [{
                "matchId": 991,
                "teamA": { "name": "Chennai Super Kings", "shortName": "csk", "logo": "https://img/csk.png" },
                "teamB": { "teamName": "Mumbai Indians" },
                "series": "IPL",
                "start_time": 1741600800000i64,
                "status": "Match not started"
            }]
        });
        let ms = parse_feed(&raw, "alt", now());
        assert_eq!(ms.len(), 1);
        assert_eq!(ms[0].id, "991");
        assert_eq!(ms[0].team1.short_name, "CSK");
        assert_eq!(ms[0].team1.flag, "https://img/csk.png");
        assert_eq!(ms[0].team2.short_name, "MI");
        assert_eq!(ms[0].tournament, "IPL");
        assert_eq!(ms[0].status, MatchStatus::Upcoming);
        assert!(!ms[0].is_streamable);
    }

    #[test]
    fn parses_team_info_array_and_flags() {
        let raw = json!({
            "response": [{
                "id": "x1",
                "name": "ignored title",
                "teamInfo": [
                    { "name": "England", "shortname": "ENG", "img": "https://img/eng.png" },
                    { "name": "South Africa", "shortname": "SA" }
                ],
                "dateTimeGMT": "2025-03-08T09:30:00",
                "matchStarted": true,
                "matchEnded": true
            }]
        });
        let ms = parse_feed(&raw, "cricapi", now());
        assert_eq!(ms[0].team1.name, "England");
        assert_eq!(ms[0].team2.short_name, "SA");
        assert_eq!(ms[0].status, MatchStatus::Completed);
    }

    #[test]
    fn splits_title_when_no_team_fields() {
        let raw = json!({ "matches": [{ "title": "Pakistan vs Sri Lanka, 2nd ODI", "isLive": true }] });
        let ms = parse_feed(&raw, "site", now());
        assert_eq!(ms[0].team1.name, "Pakistan");
        assert_eq!(ms[0].team2.name, "Sri Lanka");
        assert_eq!(ms[0].status, MatchStatus::Live);
        assert_eq!(ms[0].tournament, "Cricket");
        assert!(ms[0].id.starts_with("site-pakistan-sri-lanka-"));
    }

    #[test]
    fn drops_entries_missing_a_team() {
        let raw = json!([
            { "team1": "India", "team2": "" },
            { "team1": "India" },
            "not an object",
            { "team1": "Nepal", "team2": "Oman" }
        ]);
        let ms = parse_feed(&raw, "s", now());
        assert_eq!(ms.len(), 1);
        assert_eq!(ms[0].team2.name, "Oman");
    }

    #[test]
    fn picks_ad_free_and_dai_urls_and_ignores_non_http() {
        let raw = json!([{
            "team1": "A Team", "team2": "B Team",
            "url": "/watch/123",
            "adfree_url": "https://adfree.example/a.m3u8",
            "dai_url": "https://dai.example/b.m3u8",
            "quality": "HD"
        }]);
        let m = &parse_feed(&raw, "s", now())[0];
        assert_eq!(m.stream_url, None);
        assert_eq!(m.ad_free_url.as_deref(), Some("https://adfree.example/a.m3u8"));
        assert_eq!(m.dai_url.as_deref(), Some("https://dai.example/b.m3u8"));
        assert_eq!(m.quality.as_deref(), Some("HD"));
        assert!(m.is_streamable);
    }

    #[test]
    fn unknown_shape_yields_nothing() {
        assert!(parse_feed(&json!({ "message": "rate limited" }), "s", now()).is_empty());
        assert!(parse_feed(&json!(null), "s", now()).is_empty());
    }

    #[test]
    fn invalid_json_is_parse_error() {
        let err = parse_feed_body("<html>", "s", "https://feed", now()).unwrap_err();
        assert!(matches!(err, LoadError::Parse { .. }));
    }

    #[test]
    fn time_formats() {
        let expected = Utc.with_ymd_and_hms(2025, 3, 9, 10, 0, 0).unwrap();
        assert_eq!(parse_time_str("2025-03-09T10:00:00Z"), Some(expected));
        assert_eq!(parse_time_str("2025-03-09T15:30:00+05:30"), Some(expected));
        assert_eq!(parse_time_str("2025-03-09 10:00:00"), Some(expected));
        assert_eq!(parse_time_str("2025-03-09T10:00"), Some(expected));
        assert_eq!(parse_time_str("1741514400"), Some(expected));
        assert_eq!(parse_time_str("1741514400000"), Some(expected));
        assert_eq!(
            parse_time_str("2025-03-09"),
            Some(Utc.with_ymd_and_hms(2025, 3, 9, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_time_str("tomorrow"), None);
    }
}
