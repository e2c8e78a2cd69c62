use time::OffsetDateTime;
use tracing::{info, instrument};
use uuid::Uuid;

use super::dto::ManualLogRequest;
use super::repo_types::{FoodLog, LogSource};
use crate::error::AppError;
use crate::nutrition::MAX_DISH_AMOUNT;
use crate::store::Store;

const MAX_DESCRIPTION_CHARS: usize = 200;

fn validate(req: &ManualLogRequest) -> Result<(), AppError> {
    let description = req.description.trim();
    if description.is_empty() {
        return Err(AppError::field("description", "must not be empty"));
    }
    if description.chars().count() > MAX_DESCRIPTION_CHARS {
        return Err(AppError::field(
            "description",
            format!("must be at most {MAX_DESCRIPTION_CHARS} characters"),
        ));
    }
    if let Some((nutrient, _)) = req
        .nutrition
        .iter()
        .find(|(_, v)| !v.is_finite() || !(0.0..=MAX_DISH_AMOUNT).contains(v))
    {
        return Err(AppError::field(
            "nutrition",
            format!("{nutrient} must be between 0 and {MAX_DISH_AMOUNT}"),
        ));
    }
    Ok(())
}

/// Validates and stores a hand-entered food log row.
#[instrument(skip(store, req))]
pub async fn create_manual(
    store: &dyn Store,
    owner: Uuid,
    req: ManualLogRequest,
) -> Result<FoodLog, AppError> {
    validate(&req)?;
    let now = OffsetDateTime::now_utc();
    let log = FoodLog {
        id: Uuid::new_v4(),
        owner,
        description: req.description.trim().to_string(),
        nutrition: req.nutrition,
        serving_size: req.serving_size,
        meal_type: req.meal_type,
        confidence_score: None,
        source: LogSource::Manual,
        session_id: None,
        logged_at: req.logged_at.unwrap_or(now),
        created_at: now,
    };
    let saved = store.insert_food_log(&log).await?;
    info!(%owner, food_log_id = %saved.id, "manual food log added");
    Ok(saved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nutrition::{Nutrient, NutritionPayload};
    use crate::store::MemoryStore;
    use time::macros::datetime;

    fn request(description: &str, kcal: f64) -> ManualLogRequest {
        ManualLogRequest {
            description: description.into(),
            nutrition: NutritionPayload::new().with(Nutrient::Calories, kcal),
            serving_size: None,
            meal_type: None,
            logged_at: Some(datetime!(2024-05-10 12:00 UTC)),
        }
    }

    #[tokio::test]
    async fn stores_a_manual_row() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let log = create_manual(&store, owner, request("  apple pie ", 320.0))
            .await
            .unwrap();

        assert_eq!(log.description, "apple pie");
        assert_eq!(log.source, LogSource::Manual);
        assert_eq!(log.session_id, None);
        assert_eq!(log.confidence_score, None);

        let stored = store
            .list_food_logs(
                owner,
                datetime!(2024-05-10 00:00 UTC),
                datetime!(2024-05-11 00:00 UTC),
            )
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].nutrition.calories(), 320.0);
    }

    #[tokio::test]
    async fn rejects_bad_rows_before_storing() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        for req in [
            request("   ", 100.0),
            request(&"x".repeat(201), 100.0),
            request("toast", -5.0),
            request("toast", f64::NAN),
            request("toast", 1e9),
        ] {
            let err = create_manual(&store, owner, req).await.unwrap_err();
            assert!(matches!(err, AppError::InvalidInput(_)));
        }

        let stored = store
            .list_food_logs(
                owner,
                datetime!(2024-01-01 00:00 UTC),
                datetime!(2025-01-01 00:00 UTC),
            )
            .await
            .unwrap();
        assert!(stored.is_empty());
    }
}
