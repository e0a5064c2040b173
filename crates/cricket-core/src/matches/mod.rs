pub mod dedup;
pub mod mock;
pub mod model;
pub mod status;
pub mod team;

pub use dedup::{dedup_matches, sort_matches};
pub use model::{Match, MatchStatus, Team};
pub use status::{classify_status, LIVE_WINDOW_HOURS};
pub use team::short_name;
