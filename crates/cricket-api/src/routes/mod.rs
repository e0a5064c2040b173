mod matches;
mod sessions;

use axum::Router;

use crate::state::AppState;

pub use matches::{MatchListResponse, StreamResponse};
pub use sessions::{CreateSessionRequest, DeleteSessionResponse, EventsResponse};

pub fn router() -> Router<AppState> {
    Router::new().merge(matches::router()).merge(sessions::router())
}
