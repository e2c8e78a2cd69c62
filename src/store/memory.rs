use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{numeric, CommitOutcome, Store};
use crate::food_logs::FoodLog;
use crate::profiles::UserProfile;
use crate::sessions::{ParsingSession, SessionStatus};

#[derive(Debug, Default)]
struct Inner {
    sessions: HashMap<Uuid, ParsingSession>,
    logs: Vec<FoodLog>,
    profiles: HashMap<Uuid, UserProfile>,
}

/// Process-local store, used when no database is configured and in tests.
///
/// Nutrient amounts go through the same NUMERIC normalization as the
/// Postgres store, so both read back identical values.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn session_ids(&self) -> Vec<Uuid> {
        self.inner.read().await.sessions.keys().copied().collect()
    }
}

fn normalized(log: &FoodLog) -> anyhow::Result<FoodLog> {
    Ok(FoodLog {
        nutrition: numeric::normalize_payload(&log.nutrition)?,
        ..log.clone()
    })
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_session(&self, session: &ParsingSession) -> anyhow::Result<()> {
        let mut inner = self.inner.write().await;
        if inner.sessions.contains_key(&session.id) {
            anyhow::bail!("session {} already exists", session.id);
        }
        inner.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn save_session(&self, session: &ParsingSession) -> anyhow::Result<()> {
        let mut inner = self.inner.write().await;
        let Some(existing) = inner.sessions.get_mut(&session.id) else {
            anyhow::bail!("session {} does not exist", session.id);
        };
        if existing.status.is_terminal() {
            anyhow::bail!("session {} is already {}", session.id, existing.status);
        }
        let materialized_at = existing.materialized_at;
        *existing = ParsingSession {
            materialized_at,
            ..session.clone()
        };
        Ok(())
    }

    async fn get_session(&self, owner: Uuid, id: Uuid) -> anyhow::Result<Option<ParsingSession>> {
        let inner = self.inner.read().await;
        Ok(inner
            .sessions
            .get(&id)
            .filter(|s| s.owner == owner)
            .cloned())
    }

    async fn commit_session_logs(
        &self,
        owner: Uuid,
        session_id: Uuid,
        logs: &[FoodLog],
        at: OffsetDateTime,
    ) -> anyhow::Result<CommitOutcome> {
        let rows = logs.iter().map(normalized).collect::<anyhow::Result<Vec<_>>>()?;

        let mut inner = self.inner.write().await;
        let Some(session) = inner
            .sessions
            .get_mut(&session_id)
            .filter(|s| s.owner == owner)
        else {
            return Ok(CommitOutcome::SessionNotFound);
        };
        if session.status != SessionStatus::Completed {
            return Ok(CommitOutcome::NotCompleted(session.status));
        }
        if session.materialized_at.is_some() {
            return Ok(CommitOutcome::AlreadyMaterialized);
        }
        session.materialized_at = Some(at);
        session.updated_at = at;
        inner.logs.extend(rows.iter().cloned());
        Ok(CommitOutcome::Committed(rows))
    }

    async fn insert_food_log(&self, log: &FoodLog) -> anyhow::Result<FoodLog> {
        let row = normalized(log)?;
        self.inner.write().await.logs.push(row.clone());
        Ok(row)
    }

    async fn list_food_logs(
        &self,
        owner: Uuid,
        from: OffsetDateTime,
        to: OffsetDateTime,
    ) -> anyhow::Result<Vec<FoodLog>> {
        let inner = self.inner.read().await;
        let mut logs: Vec<FoodLog> = inner
            .logs
            .iter()
            .filter(|l| l.owner == owner && l.logged_at >= from && l.logged_at < to)
            .cloned()
            .collect();
        logs.sort_by_key(|l| (l.logged_at, l.created_at));
        Ok(logs)
    }

    async fn delete_food_log(&self, owner: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let mut inner = self.inner.write().await;
        let before = inner.logs.len();
        inner.logs.retain(|l| !(l.id == id && l.owner == owner));
        Ok(inner.logs.len() != before)
    }

    async fn upsert_profile(&self, profile: &UserProfile) -> anyhow::Result<UserProfile> {
        self.inner
            .write()
            .await
            .profiles
            .insert(profile.owner, profile.clone());
        Ok(profile.clone())
    }

    async fn get_profile(&self, owner: Uuid) -> anyhow::Result<Option<UserProfile>> {
        Ok(self.inner.read().await.profiles.get(&owner).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::food_logs::LogSource;
    use crate::nutrition::{Nutrient, NutritionPayload};
    use time::macros::datetime;

    fn log(owner: Uuid, at: OffsetDateTime, kcal: f64) -> FoodLog {
        FoodLog {
            id: Uuid::new_v4(),
            owner,
            description: "rice".into(),
            nutrition: NutritionPayload::new().with(Nutrient::Calories, kcal),
            serving_size: None,
            meal_type: None,
            confidence_score: None,
            source: LogSource::Manual,
            session_id: None,
            logged_at: at,
            created_at: at,
        }
    }

    #[tokio::test]
    async fn lists_half_open_window_for_owner_only() {
        let store = MemoryStore::new();
        let me = Uuid::new_v4();
        let start = datetime!(2024-05-10 00:00 UTC);
        let end = datetime!(2024-05-11 00:00 UTC);
        store.insert_food_log(&log(me, start, 1.0)).await.unwrap();
        store.insert_food_log(&log(me, end, 2.0)).await.unwrap();
        store
            .insert_food_log(&log(Uuid::new_v4(), start, 3.0))
            .await
            .unwrap();

        let logs = store.list_food_logs(me, start, end).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].nutrition.calories(), 1.0);
    }

    #[tokio::test]
    async fn amounts_are_stored_at_numeric_scale() {
        let store = MemoryStore::new();
        let row = store
            .insert_food_log(&log(Uuid::new_v4(), OffsetDateTime::now_utc(), 123.45678))
            .await
            .unwrap();
        assert_eq!(row.nutrition.calories(), 123.457);
    }

    #[tokio::test]
    async fn delete_respects_owner() {
        let store = MemoryStore::new();
        let me = Uuid::new_v4();
        let row = store
            .insert_food_log(&log(me, OffsetDateTime::now_utc(), 1.0))
            .await
            .unwrap();
        assert!(!store.delete_food_log(Uuid::new_v4(), row.id).await.unwrap());
        assert!(store.delete_food_log(me, row.id).await.unwrap());
        assert!(!store.delete_food_log(me, row.id).await.unwrap());
    }

    #[tokio::test]
    async fn save_updates_live_sessions() {
        let store = MemoryStore::new();
        let mut s = ParsingSession::new(Uuid::new_v4(), "rice".into(), "rice".into());
        store.insert_session(&s).await.unwrap();
        s.status = SessionStatus::Extracting;
        store.save_session(&s).await.unwrap();
        let back = store.get_session(s.owner, s.id).await.unwrap().unwrap();
        assert_eq!(back.status, SessionStatus::Extracting);
        assert!(store.get_session(Uuid::new_v4(), s.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn finished_sessions_are_never_overwritten() {
        let store = MemoryStore::new();
        let mut s = ParsingSession::new(Uuid::new_v4(), "rice".into(), "rice".into());
        s.status = SessionStatus::Completed;
        store.insert_session(&s).await.unwrap();
        let at = OffsetDateTime::now_utc();
        let out = store.commit_session_logs(s.owner, s.id, &[], at).await.unwrap();
        assert_eq!(out, CommitOutcome::Committed(vec![]));

        s.status = SessionStatus::Failed;
        assert!(store.save_session(&s).await.is_err());
        let back = store.get_session(s.owner, s.id).await.unwrap().unwrap();
        assert_eq!(back.status, SessionStatus::Completed);
        assert_eq!(back.materialized_at, Some(at));
    }
}
