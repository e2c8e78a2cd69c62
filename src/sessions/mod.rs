use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod handlers;
pub mod manager;
pub mod repo_types;
pub mod state_machine;

pub use manager::{ParsingSessionManager, ResolutionOutcome, SubmittedSession};
pub use repo_types::{DishResult, ParsingSession, PayloadSource};
pub use state_machine::{advance, SessionEvent, SessionStatus, TransitionError};

pub fn router() -> Router<AppState> {
    handlers::session_routes()
}
