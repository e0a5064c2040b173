use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use cricket_core::{PlaybackEvent, PlaybackSession, SessionStatus};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub match_id: String,
}

#[derive(Serialize)]
pub struct DeleteSessionResponse {
    pub message: String,
    pub id: Uuid,
}

#[derive(Serialize)]
pub struct EventsResponse {
    pub session_id: Uuid,
    pub events: Vec<PlaybackEvent>,
}

pub(super) fn router() -> Router<AppState> {
    Router::new()
        .route("/sessions", post(create_session).get(list_sessions))
        .route("/sessions/{id}", get(get_session).delete(delete_session))
        .route("/sessions/{id}/retry", post(retry_session))
        .route("/sessions/{id}/events", get(get_events))
}

fn parse_session_id(id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id).map_err(|_| ApiError::BadRequest(format!("Invalid session ID: {}", id)))
}

fn get_session_arc(state: &AppState, id: Uuid) -> Result<Arc<PlaybackSession>, ApiError> {
    state
        .session(&id)
        .ok_or_else(|| ApiError::NotFound(format!("Session {} not found", id)))
}

/// POST /api/v1/sessions
///
/// Resolves the match's stream and starts the attempt loop in the
/// background. Poll the session until it settles on `playing` or
/// `unavailable`.
async fn create_session(
    State(state): State<AppState>,
    Json(body): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let match_id = body.match_id.trim();
    if match_id.is_empty() {
        return Err(ApiError::BadRequest("match_id must not be empty".into()));
    }

    let m = state
        .fetcher
        .find(match_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Match {} not found", match_id)))?;
    let resolution = state.resolver.resolve(&m).await.ok_or_else(|| {
        ApiError::Unprocessable(format!("Match {} has no stream source", match_id))
    })?;

    let session = Arc::new(PlaybackSession::new(
        m.id,
        resolution.url,
        state.player_config.clone(),
        Arc::clone(&state.loader),
        state.fetcher.proxies(),
    ));
    state.sessions.insert(session.id(), Arc::clone(&session));

    session.spawn_run();
    Ok((StatusCode::CREATED, Json(session.status().await)))
}

/// GET /api/v1/sessions
async fn list_sessions(State(state): State<AppState>) -> Json<Vec<SessionStatus>> {
    let sessions: Vec<Arc<PlaybackSession>> =
        state.sessions.iter().map(|e| Arc::clone(e.value())).collect();
    let mut out = Vec::with_capacity(sessions.len());
    for s in sessions {
        out.push(s.status().await);
    }
    out.sort_by_key(|s| s.created_at);
    Json(out)
}

/// GET /api/v1/sessions/:id
async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionStatus>, ApiError> {
    let id = parse_session_id(&id)?;
    let session = get_session_arc(&state, id)?;
    Ok(Json(session.status().await))
}

/// POST /api/v1/sessions/:id/retry
///
/// Starts a fresh attempt loop in the background; a run already in flight
/// is left alone.
async fn retry_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_session_id(&id)?;
    let session = get_session_arc(&state, id)?;
    session.spawn_retry();
    Ok((StatusCode::ACCEPTED, Json(session.status().await)))
}

/// DELETE /api/v1/sessions/:id
async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteSessionResponse>, ApiError> {
    let id = parse_session_id(&id)?;
    state
        .sessions
        .remove(&id)
        .ok_or_else(|| ApiError::NotFound(format!("Session {} not found", id)))?;

    Ok(Json(DeleteSessionResponse {
        message: "Session deleted".into(),
        id,
    }))
}

/// GET /api/v1/sessions/:id/events
async fn get_events(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EventsResponse>, ApiError> {
    let id = parse_session_id(&id)?;
    let session = get_session_arc(&state, id)?;
    Ok(Json(EventsResponse {
        session_id: id,
        events: session.events().await,
    }))
}
