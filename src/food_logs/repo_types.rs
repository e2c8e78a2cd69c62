use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::nutrition::{MealType, NutritionPayload};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogSource {
    Manual,
    Ai,
}

impl LogSource {
    pub const fn as_str(self) -> &'static str {
        match self {
            LogSource::Manual => "manual",
            LogSource::Ai => "ai",
        }
    }
}

impl FromStr for LogSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(LogSource::Manual),
            "ai" => Ok(LogSource::Ai),
            other => anyhow::bail!("unknown log source `{other}`"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FoodLog {
    pub id: Uuid,
    pub owner: Uuid,
    pub description: String,
    pub nutrition: NutritionPayload,
    pub serving_size: Option<String>,
    pub meal_type: Option<MealType>,
    pub confidence_score: Option<f64>,
    pub source: LogSource,
    /// Parsing session the row was committed from.
    pub session_id: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub logged_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
