use crate::state::AppState;
use axum::Router;

pub mod aggregator;
pub mod handlers;

pub use aggregator::{
    summarize, window, FoodBankAggregator, FoodBankSummary, NutrientStanding, NutrientStatus,
    Period,
};

pub fn router() -> Router<AppState> {
    handlers::food_bank_routes()
}
