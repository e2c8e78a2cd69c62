use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;

use super::{
    DishDescriptor, Extraction, ExtractionRequest, MealAnalysis, NutritionExtractionService,
    ResolvedNutrition, ServiceError,
};
use crate::nutrition::{MealType, Nutrient, NutritionPayload};
use crate::sessions::DishResult;

/// How a fake call behaves.
#[derive(Debug, Clone)]
pub enum Behavior {
    Ok,
    Fail,
    /// Sleeps for the given duration, then succeeds.
    Slow(Duration),
    /// Never finishes within any sane timeout.
    Hang,
}

impl Behavior {
    async fn run(&self) -> Result<(), ServiceError> {
        match self {
            Behavior::Ok => Ok(()),
            Behavior::Fail => Err(ServiceError::Unavailable("fake failure".into())),
            Behavior::Slow(d) => {
                tokio::time::sleep(*d).await;
                Ok(())
            }
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(24 * 3600)).await;
                Ok(())
            }
        }
    }
}

/// Scripted extraction service for pipeline tests.
#[derive(Debug)]
pub struct FakeExtractor {
    pub dishes: Vec<DishDescriptor>,
    pub consumed_at: Option<OffsetDateTime>,
    pub meal_type: Option<MealType>,
    pub extract: Behavior,
    pub analyze: Behavior,
    /// Per-dish resolve behaviour; dishes not listed resolve immediately.
    pub resolve: HashMap<String, Behavior>,
    /// Per-dish payload override for successful lookups.
    pub payloads: HashMap<String, NutritionPayload>,
    pub confidence: f64,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    resolve_calls: AtomicUsize,
}

impl FakeExtractor {
    pub fn new<I, S>(dishes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            dishes: dishes.into_iter().map(DishDescriptor::new).collect(),
            consumed_at: None,
            meal_type: None,
            extract: Behavior::Ok,
            analyze: Behavior::Ok,
            resolve: HashMap::new(),
            payloads: HashMap::new(),
            confidence: 0.9,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            resolve_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_dishes(mut self, dishes: Vec<DishDescriptor>) -> Self {
        self.dishes = dishes;
        self
    }

    pub fn with_extract(mut self, behavior: Behavior) -> Self {
        self.extract = behavior;
        self
    }

    pub fn with_analyze(mut self, behavior: Behavior) -> Self {
        self.analyze = behavior;
        self
    }

    pub fn with_resolve(mut self, dish: &str, behavior: Behavior) -> Self {
        self.resolve.insert(dish.to_string(), behavior);
        self
    }

    pub fn with_payload(mut self, dish: &str, payload: NutritionPayload) -> Self {
        self.payloads.insert(dish.to_string(), payload);
        self
    }

    pub fn with_time(mut self, at: OffsetDateTime, meal_type: MealType) -> Self {
        self.consumed_at = Some(at);
        self.meal_type = Some(meal_type);
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NutritionExtractionService for FakeExtractor {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn extract_dishes(
        &self,
        _request: &ExtractionRequest,
    ) -> Result<Extraction, ServiceError> {
        self.extract.run().await?;
        Ok(Extraction {
            dishes: self.dishes.clone(),
            consumed_at: self.consumed_at,
            meal_type: self.meal_type,
        })
    }

    async fn resolve_nutrition(
        &self,
        dish: &DishDescriptor,
        _serving_hint: Option<&str>,
    ) -> Result<ResolvedNutrition, ServiceError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let behavior = self.resolve.get(&dish.name).cloned().unwrap_or(Behavior::Ok);
        let outcome = behavior.run().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome?;

        let payload = self.payloads.get(&dish.name).cloned().unwrap_or_else(|| {
            NutritionPayload::new()
                .with(Nutrient::Calories, 100.0)
                .with(Nutrient::Protein, 5.0)
                .with(Nutrient::Fat, 2.0)
                .with(Nutrient::Carbs, 15.0)
        });
        Ok(ResolvedNutrition {
            payload,
            confidence: self.confidence,
        })
    }

    async fn analyze_meal(&self, dishes: &[DishResult]) -> Result<MealAnalysis, ServiceError> {
        self.analyze.run().await?;
        Ok(MealAnalysis::estimate(dishes))
    }
}
