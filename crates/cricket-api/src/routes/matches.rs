use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cricket_core::{
    refresh_interval, Candidate, CandidateKind, FeedOrigin, Match, MatchList, MatchStatus,
};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

#[derive(Serialize)]
pub struct MatchListResponse {
    pub origin: FeedOrigin,
    /// Suggested delay before polling again.
    pub refresh_interval_secs: u64,
    pub fetched_at: DateTime<Utc>,
    pub matches: Vec<Match>,
}

#[derive(Serialize)]
pub struct StreamResponse {
    pub match_id: String,
    pub url: String,
    pub kind: CandidateKind,
    pub verified: bool,
    pub candidates: Vec<Candidate>,
}

pub(super) fn router() -> Router<AppState> {
    Router::new()
        .route("/matches", get(list_matches))
        .route("/matches/refresh", post(refresh_matches))
        .route("/matches/{id}", get(get_match))
        .route("/matches/{id}/stream", get(resolve_stream))
}

/// GET /api/v1/matches
async fn list_matches(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<MatchListResponse>, ApiError> {
    let status = parse_status(&query)?;
    let list = state.fetcher.fetch().await;
    Ok(Json(list_response(&list, status)))
}

/// POST /api/v1/matches/refresh
///
/// Drops the cached list and fetches from the sources straight away.
async fn refresh_matches(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<MatchListResponse>, ApiError> {
    let status = parse_status(&query)?;
    let list = state.fetcher.refresh().await;
    Ok(Json(list_response(&list, status)))
}

fn parse_status(query: &ListQuery) -> Result<Option<MatchStatus>, ApiError> {
    query
        .status
        .as_deref()
        .map(str::parse::<MatchStatus>)
        .transpose()
        .map_err(ApiError::BadRequest)
}

fn list_response(list: &MatchList, status: Option<MatchStatus>) -> MatchListResponse {
    let interval = refresh_interval(list.matches(), Utc::now());
    let matches = list
        .matches()
        .iter()
        .filter(|m| status.is_none_or(|s| m.status == s))
        .cloned()
        .collect();

    MatchListResponse {
        origin: list.origin,
        refresh_interval_secs: interval.as_secs(),
        fetched_at: list.snapshot.fetched_at,
        matches,
    }
}

/// GET /api/v1/matches/:id
async fn get_match(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Match>, ApiError> {
    state
        .fetcher
        .find(&id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Match {} not found", id)))
}

/// GET /api/v1/matches/:id/stream
async fn resolve_stream(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StreamResponse>, ApiError> {
    let m = state
        .fetcher
        .find(&id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Match {} not found", id)))?;

    let resolution = state.resolver.resolve(&m).await.ok_or_else(|| {
        ApiError::Unprocessable(format!("Match {} has no stream source", id))
    })?;

    Ok(Json(StreamResponse {
        match_id: m.id,
        url: resolution.url,
        kind: resolution.kind,
        verified: resolution.verified,
        candidates: resolution.candidates,
    }))
}
