#![forbid(unsafe_code)]

pub mod cache;
pub mod config;
pub mod feed;
pub mod fetcher;
pub mod flags;
pub mod loader;
pub mod matches;
pub mod player;
pub mod resolver;
pub mod schedule;

pub use cache::TtlCache;
pub use config::{FeedConfig, PlayerConfig, ResolverConfig, SourceDef};
pub use fetcher::{FeedOrigin, FetchStats, MatchFetcher, MatchList, Snapshot};
pub use flags::{FlagError, FlagStore, NOTICE_SHOWN};
pub use loader::{HttpLoader, LoadError, Loader, ProbeInfo, ProxyRotation};
pub use matches::{Match, MatchStatus, Team};
pub use player::{
    PlaybackEvent, PlaybackEventKind, PlaybackMode, PlaybackSession, SessionState, SessionStatus,
    StreamError,
};
pub use resolver::{Candidate, CandidateKind, Resolution, StreamResolver};
pub use schedule::refresh_interval;
