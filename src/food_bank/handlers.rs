use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use time::OffsetDateTime;
use tracing::instrument;

use super::aggregator::{FoodBankSummary, Period};
use crate::{auth::AuthUser, error::AppError, state::AppState};

pub fn food_bank_routes() -> Router<AppState> {
    Router::new().route("/food-bank/:period", get(get_food_bank))
}

/// GET /food-bank/:period, period is day, week or month
#[instrument(skip(state))]
pub async fn get_food_bank(
    State(state): State<AppState>,
    AuthUser(owner): AuthUser,
    Path(period): Path<String>,
) -> Result<Json<FoodBankSummary>, AppError> {
    let period: Period = period.parse()?;
    let summary = state
        .food_bank
        .summary(owner, period, OffsetDateTime::now_utc())
        .await?;
    Ok(Json(summary))
}
