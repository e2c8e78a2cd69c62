//! Boundary to the external nutrition intelligence service.
//!
//! The pipeline only ever talks to a [`NutritionExtractionService`]; which
//! provider backs it is chosen from configuration at startup.

pub mod heuristic;
pub mod hints;
pub mod http;

#[cfg(test)]
pub mod fake;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

use crate::config::{ExtractionConfig, ExtractionProvider};
use crate::nutrition::{MealType, Nutrient, NutrientGroup, NutritionPayload};
use crate::sessions::DishResult;

/// One dish named in the meal description, before any nutrition is attached.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DishDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serving_hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meal_type: Option<MealType>,
}

impl DishDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            serving_hint: None,
            meal_type: None,
        }
    }

    pub fn serving(mut self, hint: impl Into<String>) -> Self {
        self.serving_hint = Some(hint.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub text: String,
    /// Current time in the owner's offset, for resolving "yesterday" or "at 8am".
    pub local_now: OffsetDateTime,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub dishes: Vec<DishDescriptor>,
    pub consumed_at: Option<OffsetDateTime>,
    pub meal_type: Option<MealType>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedNutrition {
    pub payload: NutritionPayload,
    pub confidence: f64,
}

/// Confidence held to `[0, 1]`; NaN and infinities count as no confidence at all.
pub fn bounded_confidence(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Overall assessment of a parsed meal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MealAnalysis {
    pub overall_health_score: f64,
    pub protein_adequacy: String,
    pub fiber_content: String,
    pub vitamin_balance: String,
    pub mineral_balance: String,
    pub recommendations: Vec<String>,
}

impl MealAnalysis {
    /// Rule-based assessment over the summed nutrition of `dishes`.
    pub fn estimate(dishes: &[DishResult]) -> Self {
        let mut total = NutritionPayload::new();
        for dish in dishes {
            total += &dish.nutrition;
        }
        let protein = total.amount(Nutrient::Protein);
        let fiber = total.amount(Nutrient::Fiber);
        let fat = total.amount(Nutrient::Fat);

        let mut score: f64 = 7.0;
        let mut recommendations = Vec::new();
        if protein >= 20.0 {
            score += 1.0;
        } else {
            recommendations.push("Add a protein source such as eggs, yogurt or legumes.".into());
        }
        if fiber >= 5.0 {
            score += 1.0;
        } else {
            recommendations.push("Include whole grains, vegetables or fruit for fiber.".into());
        }
        if fat <= 30.0 {
            score += 1.0;
        } else {
            recommendations.push("Balance higher-fat items with lighter sides.".into());
        }

        let vitamins = count_present(&total, NutrientGroup::Vitamins);
        let minerals = count_present(&total, NutrientGroup::Minerals);

        Self {
            overall_health_score: score.min(10.0),
            protein_adequacy: level(protein, 10.0, 20.0).into(),
            fiber_content: level(fiber, 2.0, 5.0).into(),
            vitamin_balance: balance(vitamins).into(),
            mineral_balance: balance(minerals).into(),
            recommendations,
        }
    }
}

fn count_present(payload: &NutritionPayload, group: NutrientGroup) -> usize {
    payload
        .iter()
        .filter(|(n, v)| n.group() == group && *v > 0.0)
        .count()
}

fn level(value: f64, moderate: f64, high: f64) -> &'static str {
    if value >= high {
        "high"
    } else if value >= moderate {
        "moderate"
    } else {
        "low"
    }
}

fn balance(present: usize) -> &'static str {
    match present {
        0 => "unknown",
        1..=3 => "limited",
        _ => "good",
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("service unavailable: {0}")]
    Unavailable(String),
    #[error("service rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

#[async_trait]
pub trait NutritionExtractionService: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &'static str;

    /// Identifies the dishes in a sanitized description, plus meal time and
    /// meal type when the text makes them clear.
    async fn extract_dishes(&self, request: &ExtractionRequest)
        -> Result<Extraction, ServiceError>;

    /// Nutrition for a single dish at the given serving.
    async fn resolve_nutrition(
        &self,
        dish: &DishDescriptor,
        serving_hint: Option<&str>,
    ) -> Result<ResolvedNutrition, ServiceError>;

    async fn analyze_meal(&self, dishes: &[DishResult]) -> Result<MealAnalysis, ServiceError>;
}

/// Builds the configured provider.
pub fn from_config(
    config: &ExtractionConfig,
) -> Result<Arc<dyn NutritionExtractionService>, ServiceError> {
    match config.provider {
        ExtractionProvider::Heuristic => Ok(Arc::new(heuristic::HeuristicExtractionService)),
        ExtractionProvider::Http => {
            let base_url = config.base_url.as_deref().ok_or_else(|| {
                ServiceError::Unavailable("EXTRACTION_BASE_URL is not set".into())
            })?;
            Ok(Arc::new(http::HttpExtractionService::new(
                base_url,
                config.api_key.clone(),
                config.request_timeout,
            )?))
        }
    }
}
