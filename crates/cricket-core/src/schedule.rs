use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::matches::{Match, MatchStatus};

pub const LIVE_REFRESH: Duration = Duration::from_secs(10);
pub const STARTING_SOON_REFRESH: Duration = Duration::from_secs(15);
pub const IDLE_REFRESH: Duration = Duration::from_secs(30);

/// An upcoming match this many minutes away or closer counts as starting soon.
pub const STARTING_SOON_MINUTES: i64 = 30;

/// How long to wait before the next list refresh.
pub fn refresh_interval(matches: &[Match], now: DateTime<Utc>) -> Duration {
    if matches.iter().any(|m| m.status == MatchStatus::Live) {
        return LIVE_REFRESH;
    }

    let starting_soon = matches.iter().any(|m| {
        m.status == MatchStatus::Upcoming && {
            let until = m.start_time - now;
            until >= chrono::Duration::zero() && until <= chrono::Duration::minutes(STARTING_SOON_MINUTES)
        }
    });

    if starting_soon {
        STARTING_SOON_REFRESH
    } else {
        IDLE_REFRESH
    }
}
