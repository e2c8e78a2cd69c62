//! Persistence for sessions, food logs and profiles.

pub mod memory;
pub mod numeric;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::food_logs::FoodLog;
use crate::profiles::UserProfile;
use crate::sessions::{ParsingSession, SessionStatus};

/// Result of the atomic check-and-commit of a session's food logs.
#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    Committed(Vec<FoodLog>),
    SessionNotFound,
    NotCompleted(SessionStatus),
    AlreadyMaterialized,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_session(&self, session: &ParsingSession) -> anyhow::Result<()>;

    /// Overwrites pipeline fields of a session that is still running. Finished
    /// sessions are left alone and reported as an error; `materialized_at` is never touched.
    async fn save_session(&self, session: &ParsingSession) -> anyhow::Result<()>;

    async fn get_session(&self, owner: Uuid, id: Uuid) -> anyhow::Result<Option<ParsingSession>>;

    /// Inserts `logs` and marks the session materialized in one step, after
    /// re-checking ownership, status and the materialized mark.
    async fn commit_session_logs(
        &self,
        owner: Uuid,
        session_id: Uuid,
        logs: &[FoodLog],
        at: OffsetDateTime,
    ) -> anyhow::Result<CommitOutcome>;

    async fn insert_food_log(&self, log: &FoodLog) -> anyhow::Result<FoodLog>;

    /// Logs with `from <= logged_at < to`, oldest first.
    async fn list_food_logs(
        &self,
        owner: Uuid,
        from: OffsetDateTime,
        to: OffsetDateTime,
    ) -> anyhow::Result<Vec<FoodLog>>;

    /// `false` when no log with that id belongs to `owner`.
    async fn delete_food_log(&self, owner: Uuid, id: Uuid) -> anyhow::Result<bool>;

    async fn upsert_profile(&self, profile: &UserProfile) -> anyhow::Result<UserProfile>;

    async fn get_profile(&self, owner: Uuid) -> anyhow::Result<Option<UserProfile>>;
}
