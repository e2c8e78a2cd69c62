use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::state_machine::SessionStatus;
use crate::error::ErrorReport;
use crate::extraction::{DishDescriptor, MealAnalysis};
use crate::nutrition::{FoodCategory, MealType, NutritionPayload};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PayloadSource {
    Resolved,
    Fallback,
}

/// One dish with the nutrition attached to it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DishResult {
    pub description: String,
    pub serving_size: Option<String>,
    pub meal_type: Option<MealType>,
    pub confidence: f64,
    pub nutrition: NutritionPayload,
    pub source: PayloadSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<FoodCategory>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParsingSession {
    pub id: Uuid,
    pub owner: Uuid,
    pub raw_input: String,
    pub sanitized_input: String,
    pub status: SessionStatus,
    pub dishes: Vec<DishDescriptor>,
    pub parsed_dishes: Vec<DishResult>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub extracted_datetime: Option<OffsetDateTime>,
    pub meal_type: Option<MealType>,
    pub confidence_score: Option<f64>,
    pub meal_analysis: Option<MealAnalysis>,
    pub error: Option<ErrorReport>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub materialized_at: Option<OffsetDateTime>,
}

impl ParsingSession {
    pub fn new(owner: Uuid, raw_input: String, sanitized_input: String) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: Uuid::new_v4(),
            owner,
            raw_input,
            sanitized_input,
            status: SessionStatus::Pending,
            dishes: Vec::new(),
            parsed_dishes: Vec::new(),
            extracted_datetime: None,
            meal_type: None,
            confidence_score: None,
            meal_analysis: None,
            error: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
            materialized_at: None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.message.as_str())
    }
}
