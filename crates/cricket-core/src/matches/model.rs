use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Live,
    Upcoming,
    Completed,
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Live => write!(f, "live"),
            Self::Upcoming => write!(f, "upcoming"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

impl std::str::FromStr for MatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "live" => Ok(Self::Live),
            "upcoming" => Ok(Self::Upcoming),
            "completed" => Ok(Self::Completed),
            other => Err(format!("unknown match status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub name: String,
    pub short_name: String,
    /// Flag or logo image URL; empty when the source has none.
    pub flag: String,
}

impl Team {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let short_name = super::team::short_name(&name);
        Self {
            name,
            short_name,
            flag: String::new(),
        }
    }

    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.flag = flag.into();
        self
    }
}

/// One fixture as shown in the match list. Rebuilt on every fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub id: String,
    pub team1: Team,
    pub team2: Team,
    pub start_time: DateTime<Utc>,
    pub status: MatchStatus,
    pub tournament: String,
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ad_free_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dai_url: Option<String>,
    pub language: String,
    pub is_streamable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
}

impl Match {
    pub fn title(&self) -> String {
        format!("{} vs {}", self.team1.name, self.team2.name)
    }

    /// Any URL the resolver could start from.
    pub fn has_stream_source(&self) -> bool {
        [&self.ad_free_url, &self.dai_url, &self.stream_url]
            .iter()
            .any(|u| u.as_deref().is_some_and(|s| !s.trim().is_empty()))
    }
}
