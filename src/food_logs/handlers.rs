use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use time::{Duration, OffsetDateTime};
use tracing::{info, instrument};
use uuid::Uuid;

use super::dto::{LogRange, ManualLogRequest};
use super::repo_types::FoodLog;
use super::services;
use crate::{
    auth::AuthUser,
    error::AppError,
    food_bank::{window, Period},
    profiles::services::owner_offset,
    state::AppState,
};

pub fn food_log_routes() -> Router<AppState> {
    Router::new()
        .route("/food-logs", get(list_food_logs).post(create_food_log))
        .route("/food-logs/:id", delete(delete_food_log))
}

#[instrument(skip(state))]
pub async fn list_food_logs(
    State(state): State<AppState>,
    AuthUser(owner): AuthUser,
    Query(range): Query<LogRange>,
) -> Result<Json<Vec<FoodLog>>, AppError> {
    let (from, to) = match (range.from, range.to) {
        (Some(from), Some(to)) => (from, to),
        (Some(from), None) => (from, from + Duration::days(1)),
        (None, Some(to)) => (to - Duration::days(1), to),
        (None, None) => {
            let offset = owner_offset(state.store.as_ref(), owner).await?;
            window(Period::Day, OffsetDateTime::now_utc(), offset)
        }
    };
    if from >= to {
        return Err(AppError::field("from", "must be earlier than `to`"));
    }

    let logs = state.store.list_food_logs(owner, from, to).await?;
    Ok(Json(logs))
}

#[instrument(skip(state, body))]
pub async fn create_food_log(
    State(state): State<AppState>,
    AuthUser(owner): AuthUser,
    Json(body): Json<ManualLogRequest>,
) -> Result<(StatusCode, Json<FoodLog>), AppError> {
    let log = services::create_manual(state.store.as_ref(), owner, body).await?;
    Ok((StatusCode::CREATED, Json(log)))
}

#[instrument(skip(state))]
pub async fn delete_food_log(
    State(state): State<AppState>,
    AuthUser(owner): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !state.store.delete_food_log(owner, id).await? {
        return Err(AppError::not_found("food log"));
    }
    info!(%owner, food_log_id = %id, "food log deleted");
    Ok(StatusCode::NO_CONTENT)
}
