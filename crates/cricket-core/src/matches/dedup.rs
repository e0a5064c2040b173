use std::collections::HashSet;

use super::model::{Match, MatchStatus};

fn normalize(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Composite identity across sources; ids are source-specific and ignored.
pub fn dedup_key(m: &Match) -> (String, String, String) {
    (
        normalize(&m.team1.name),
        normalize(&m.team2.name),
        normalize(&m.tournament),
    )
}

/// Drops later records that share (team1, team2, tournament) with an earlier one.
pub fn dedup_matches(matches: Vec<Match>) -> Vec<Match> {
    let mut seen = HashSet::new();
    matches
        .into_iter()
        .filter(|m| seen.insert(dedup_key(m)))
        .collect()
}

/// Live first, then upcoming soonest-first, then completed most-recent-first.
pub fn sort_matches(matches: &mut [Match]) {
    fn rank(status: MatchStatus) -> u8 {
        match status {
            MatchStatus::Live => 0,
            MatchStatus::Upcoming => 1,
            MatchStatus::Completed => 2,
        }
    }

    matches.sort_by(|a, b| {
        rank(a.status).cmp(&rank(b.status)).then_with(|| match a.status {
            MatchStatus::Completed => b.start_time.cmp(&a.start_time),
            _ => a.start_time.cmp(&b.start_time),
        })
    });
}
