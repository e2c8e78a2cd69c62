use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod handlers;
pub mod materializer;
pub mod repo_types;
pub mod services;

pub use materializer::LogMaterializer;
pub use repo_types::{FoodLog, LogSource};

pub fn router() -> Router<AppState> {
    handlers::food_log_routes()
}
