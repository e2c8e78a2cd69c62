use axum::{extract::State, routing::get, Json, Router};
use tracing::instrument;

use super::dto::{ProfileRequest, RequirementsResponse};
use super::repo_types::UserProfile;
use super::services;
use crate::{auth::AuthUser, error::AppError, state::AppState};

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/profile", get(get_profile).put(put_profile))
        .route("/nutritional-requirements", get(get_requirements))
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(owner): AuthUser,
) -> Result<Json<UserProfile>, AppError> {
    let profile = services::load_profile(state.store.as_ref(), owner).await?;
    Ok(Json(profile))
}

#[instrument(skip(state, body))]
pub async fn put_profile(
    State(state): State<AppState>,
    AuthUser(owner): AuthUser,
    Json(body): Json<ProfileRequest>,
) -> Result<Json<UserProfile>, AppError> {
    let profile = services::save_profile(state.store.as_ref(), owner, body).await?;
    Ok(Json(profile))
}

#[instrument(skip(state))]
pub async fn get_requirements(
    State(state): State<AppState>,
    AuthUser(owner): AuthUser,
) -> Result<Json<RequirementsResponse>, AppError> {
    let (profile, requirements) = services::requirements_for(state.store.as_ref(), owner).await?;
    Ok(Json(RequirementsResponse {
        profile_updated_at: profile.updated_at,
        requirements,
    }))
}
