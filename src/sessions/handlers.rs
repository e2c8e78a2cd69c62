use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::dto::{SessionResponse, SubmitRequest, SubmittedResponse};
use crate::{
    auth::AuthUser, error::AppError, food_logs::FoodLog, profiles::services::owner_offset,
    state::AppState,
};

pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/parse-sessions", post(submit_session))
        .route("/parse-sessions/:id", get(get_session))
        .route("/parse-sessions/:id/cancel", post(cancel_session))
        .route("/parse-sessions/:id/commit", post(commit_session))
}

/// POST /parse-sessions
#[instrument(skip(state, body))]
pub async fn submit_session(
    State(state): State<AppState>,
    AuthUser(owner): AuthUser,
    Json(body): Json<SubmitRequest>,
) -> Result<Response, AppError> {
    let offset = owner_offset(state.store.as_ref(), owner).await?;

    if body.wait {
        let session = state.sessions.parse(owner, &body.text, offset).await?;
        return Ok((StatusCode::OK, Json(SessionResponse::from(session))).into_response());
    }

    let submitted = state.sessions.submit(owner, &body.text, offset).await?;
    let body = SubmittedResponse {
        session_id: submitted.session.id,
        status: submitted.session.status,
    };
    Ok((StatusCode::ACCEPTED, Json(body)).into_response())
}

#[instrument(skip(state))]
pub async fn get_session(
    State(state): State<AppState>,
    AuthUser(owner): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = state.sessions.get(owner, id).await?;
    Ok(Json(session.into()))
}

#[instrument(skip(state))]
pub async fn cancel_session(
    State(state): State<AppState>,
    AuthUser(owner): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<SessionResponse>), AppError> {
    let session = state.sessions.cancel(owner, id).await?;
    Ok((StatusCode::ACCEPTED, Json(session.into())))
}

/// Turns a completed session into food log rows, once.
#[instrument(skip(state))]
pub async fn commit_session(
    State(state): State<AppState>,
    AuthUser(owner): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<Vec<FoodLog>>), AppError> {
    let logs = state.materializer.materialize(owner, id).await?;
    Ok((StatusCode::CREATED, Json(logs)))
}
