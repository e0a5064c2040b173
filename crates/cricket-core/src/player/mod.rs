pub mod attach;
pub mod event;
pub mod session;
pub mod state;

pub use attach::{attach, is_manifest_url, select_mode, Attached, StreamError};
pub use event::{EventRing, PlaybackEvent, PlaybackEventKind};
pub use session::PlaybackSession;
pub use state::{PlaybackMode, SessionState, SessionStatus};
