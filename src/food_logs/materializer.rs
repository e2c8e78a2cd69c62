use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::repo_types::{FoodLog, LogSource};
use crate::error::AppError;
use crate::extraction::bounded_confidence;
use crate::sessions::{ParsingSession, SessionStatus};
use crate::store::{CommitOutcome, Store};

/// Commits a completed parsing session to the food log, exactly once.
#[derive(Clone)]
pub struct LogMaterializer {
    store: Arc<dyn Store>,
}

impl LogMaterializer {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    #[instrument(skip(self))]
    pub async fn materialize(&self, owner: Uuid, session_id: Uuid) -> Result<Vec<FoodLog>, AppError> {
        let session = self
            .store
            .get_session(owner, session_id)
            .await?
            .ok_or_else(|| AppError::not_found("parsing session"))?;
        check_committable(&session)?;

        let now = OffsetDateTime::now_utc();
        let rows = log_rows(&session, now);

        // the store re-checks status and the mark under its own lock/transaction
        match self
            .store
            .commit_session_logs(owner, session_id, &rows, now)
            .await?
        {
            CommitOutcome::Committed(logs) => {
                info!(%owner, %session_id, rows = logs.len(), "session materialized");
                Ok(logs)
            }
            CommitOutcome::SessionNotFound => Err(AppError::not_found("parsing session")),
            CommitOutcome::NotCompleted(status) => Err(AppError::InvalidState {
                status,
                expected: "completed",
            }),
            CommitOutcome::AlreadyMaterialized => {
                warn!(%owner, %session_id, "lost a concurrent commit");
                Err(AppError::AlreadyMaterialized { session_id })
            }
        }
    }
}

fn check_committable(session: &ParsingSession) -> Result<(), AppError> {
    if session.status != SessionStatus::Completed {
        return Err(AppError::InvalidState {
            status: session.status,
            expected: "completed",
        });
    }
    if session.materialized_at.is_some() {
        return Err(AppError::AlreadyMaterialized {
            session_id: session.id,
        });
    }
    Ok(())
}

fn log_rows(session: &ParsingSession, now: OffsetDateTime) -> Vec<FoodLog> {
    let logged_at = session
        .extracted_datetime
        .or(session.completed_at)
        .unwrap_or(now);

    session
        .parsed_dishes
        .iter()
        .map(|dish| FoodLog {
            id: Uuid::new_v4(),
            owner: session.owner,
            description: dish.description.clone(),
            nutrition: dish.nutrition.clone(),
            serving_size: dish.serving_size.clone(),
            meal_type: dish.meal_type.or(session.meal_type),
            confidence_score: Some(bounded_confidence(dish.confidence)),
            source: LogSource::Ai,
            session_id: Some(session.id),
            logged_at,
            created_at: now,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nutrition::{MealType, Nutrient, NutritionPayload};
    use crate::sessions::{DishResult, PayloadSource};
    use crate::store::MemoryStore;
    use time::macros::datetime;

    fn dish(name: &str, kcal: f64) -> DishResult {
        DishResult {
            description: name.into(),
            serving_size: Some("1 cup".into()),
            meal_type: None,
            confidence: 0.8,
            nutrition: NutritionPayload::new()
                .with(Nutrient::Calories, kcal)
                .with(Nutrient::Protein, 3.14159),
            source: PayloadSource::Resolved,
            category: None,
        }
    }

    async fn completed(store: &MemoryStore, owner: Uuid) -> ParsingSession {
        let mut s = ParsingSession::new(owner, "rice and milk".into(), "rice and milk".into());
        s.status = SessionStatus::Completed;
        s.parsed_dishes = vec![dish("rice", 205.0), dish("milk", 122.5)];
        s.meal_type = Some(MealType::Lunch);
        s.extracted_datetime = Some(datetime!(2024-05-10 12:30 UTC));
        s.completed_at = Some(datetime!(2024-05-10 12:31 UTC));
        store.insert_session(&s).await.unwrap();
        s
    }

    #[tokio::test]
    async fn commits_every_dish_once() {
        let store = Arc::new(MemoryStore::new());
        let owner = Uuid::new_v4();
        let s = completed(&store, owner).await;
        let materializer = LogMaterializer::new(store.clone());

        let logs = materializer.materialize(owner, s.id).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert!(logs.iter().all(|l| l.source == LogSource::Ai));
        assert!(logs.iter().all(|l| l.session_id == Some(s.id)));
        assert!(logs.iter().all(|l| l.logged_at == datetime!(2024-05-10 12:30 UTC)));
        assert_eq!(logs[0].meal_type, Some(MealType::Lunch));

        let err = materializer.materialize(owner, s.id).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyMaterialized { .. }));

        let stored = store
            .list_food_logs(
                owner,
                datetime!(2024-05-10 00:00 UTC),
                datetime!(2024-05-11 00:00 UTC),
            )
            .await
            .unwrap();
        assert_eq!(stored.len(), 2);
    }

    #[tokio::test]
    async fn concurrent_commits_produce_one_set_of_rows() {
        let store = Arc::new(MemoryStore::new());
        let owner = Uuid::new_v4();
        let s = completed(&store, owner).await;
        let a = LogMaterializer::new(store.clone());
        let b = a.clone();

        let (first, second) = tokio::join!(a.materialize(owner, s.id), b.materialize(owner, s.id));
        assert_eq!(first.is_ok() as u8 + second.is_ok() as u8, 1);

        let stored = store
            .list_food_logs(
                owner,
                datetime!(2024-05-01 00:00 UTC),
                datetime!(2024-06-01 00:00 UTC),
            )
            .await
            .unwrap();
        assert_eq!(stored.len(), 2);
    }

    #[tokio::test]
    async fn unfinished_session_is_not_committable() {
        let store = Arc::new(MemoryStore::new());
        let owner = Uuid::new_v4();
        let s = ParsingSession::new(owner, "rice".into(), "rice".into());
        store.insert_session(&s).await.unwrap();

        let err = LogMaterializer::new(store)
            .materialize(owner, s.id)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::InvalidState {
                status: SessionStatus::Pending,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn foreign_session_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let s = completed(&store, Uuid::new_v4()).await;

        let err = LogMaterializer::new(store)
            .materialize(Uuid::new_v4(), s.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[tokio::test]
    async fn amounts_round_trip_within_tolerance() {
        let store = Arc::new(MemoryStore::new());
        let owner = Uuid::new_v4();
        let s = completed(&store, owner).await;

        let logs = LogMaterializer::new(store)
            .materialize(owner, s.id)
            .await
            .unwrap();
        let protein = logs[0].nutrition.amount(Nutrient::Protein);
        assert!((protein - 3.14159).abs() < 1e-3);
        assert_eq!(logs[1].nutrition.calories(), 122.5);
    }

    #[test]
    fn logged_at_falls_back_to_completion() {
        let mut s = ParsingSession::new(Uuid::new_v4(), "x".into(), "x".into());
        s.parsed_dishes = vec![dish("toast", 80.0)];
        s.completed_at = Some(datetime!(2024-05-10 07:00 UTC));
        let now = datetime!(2024-05-10 09:00 UTC);
        assert_eq!(log_rows(&s, now)[0].logged_at, datetime!(2024-05-10 07:00 UTC));

        s.completed_at = None;
        assert_eq!(log_rows(&s, now)[0].logged_at, now);
    }
}
