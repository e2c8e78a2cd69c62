use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod handlers;
pub mod repo_types;
pub mod requirements;
pub mod services;

pub use repo_types::{ActivityLevel, Gender, Goal, UserProfile};
pub use requirements::RequirementSet;

pub fn router() -> Router<AppState> {
    handlers::profile_routes()
}
