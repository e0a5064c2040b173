use chrono::{DateTime, Duration, Utc};

use super::model::{Match, MatchStatus, Team};

fn placeholder(
    id: &str,
    team1: &str,
    team2: &str,
    tournament: &str,
    start_time: DateTime<Utc>,
    status: MatchStatus,
) -> Match {
    Match {
        id: id.to_string(),
        team1: Team::new(team1),
        team2: Team::new(team2),
        start_time,
        status,
        tournament: tournament.to_string(),
        image: String::new(),
        stream_url: None,
        ad_free_url: None,
        dai_url: None,
        language: "English".to_string(),
        is_streamable: status == MatchStatus::Live,
        quality: None,
    }
}

/// Served when no source answers and nothing is cached.
pub fn mock_matches(now: DateTime<Utc>) -> Vec<Match> {
    vec![
        placeholder(
            "mock-1",
            "India",
            "Australia",
            "Border-Gavaskar Trophy",
            now - Duration::hours(2),
            MatchStatus::Live,
        ),
        placeholder(
            "mock-2",
            "England",
            "New Zealand",
            "ICC World Test Championship",
            now + Duration::hours(3),
            MatchStatus::Upcoming,
        ),
        placeholder(
            "mock-3",
            "Pakistan",
            "South Africa",
            "Tri-Nation Series",
            now - Duration::days(1),
            MatchStatus::Completed,
        ),
    ]
}
