use serde::Deserialize;
use time::OffsetDateTime;

use crate::nutrition::{MealType, NutritionPayload};

/// `GET /food-logs?from=..&to=..`, both RFC 3339. Defaults to the owner's local today.
#[derive(Debug, Default, Deserialize)]
pub struct LogRange {
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub from: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub to: Option<OffsetDateTime>,
}

/// `POST /food-logs`: a row entered by hand rather than parsed.
#[derive(Debug, Clone, Deserialize)]
pub struct ManualLogRequest {
    pub description: String,
    #[serde(default)]
    pub nutrition: NutritionPayload,
    #[serde(default)]
    pub serving_size: Option<String>,
    #[serde(default)]
    pub meal_type: Option<MealType>,
    /// Defaults to now.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub logged_at: Option<OffsetDateTime>,
}
