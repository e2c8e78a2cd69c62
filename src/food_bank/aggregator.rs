use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use time::{Duration, OffsetDateTime, UtcOffset};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::{AppError, InputRejection};
use crate::food_logs::FoodLog;
use crate::nutrition::{Nutrient, NutritionPayload};
use crate::profiles::{requirements, RequirementSet};
use crate::store::Store;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Day,
    Week,
    Month,
}

impl Period {
    pub const fn days(self) -> u32 {
        match self {
            Period::Day => 1,
            Period::Week => 7,
            Period::Month => 30,
        }
    }
}

impl FromStr for Period {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "day" | "daily" | "today" => Ok(Period::Day),
            "week" | "weekly" => Ok(Period::Week),
            "month" | "monthly" => Ok(Period::Month),
            other => Err(AppError::InvalidInput(InputRejection::Field {
                field: "period",
                message: format!("unknown period `{other}`, use day, week or month"),
            })),
        }
    }
}

/// `[start, end)` covering the period, ending at the owner's next local midnight.
pub fn window(period: Period, now: OffsetDateTime, offset: UtcOffset) -> (OffsetDateTime, OffsetDateTime) {
    let local = now.to_offset(offset);
    let end = local.date().midnight().assume_offset(offset) + Duration::days(1);
    let start = end - Duration::days(i64::from(period.days()));
    (start, end)
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NutrientStatus {
    Under,
    Adequate,
    Over,
}

impl NutrientStatus {
    pub fn classify(consumed: f64, target: f64, band: f64) -> Self {
        if consumed < (1.0 - band) * target {
            NutrientStatus::Under
        } else if consumed > (1.0 + band) * target {
            NutrientStatus::Over
        } else {
            NutrientStatus::Adequate
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NutrientStanding {
    pub nutrient: Nutrient,
    pub consumed: f64,
    pub target: f64,
    pub status: NutrientStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct FoodBankSummary {
    pub period: Period,
    #[serde(with = "time::serde::rfc3339")]
    pub start: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end: OffsetDateTime,
    pub days: u32,
    pub consumed: NutritionPayload,
    pub targets: RequirementSet,
    pub standings: Vec<NutrientStanding>,
    pub completion_rate: f64,
    pub food_log_ids: Vec<Uuid>,
    pub log_count: usize,
}

/// Rolls the logs of one window up against the daily requirements.
pub fn summarize(
    period: Period,
    (start, end): (OffsetDateTime, OffsetDateTime),
    daily: &RequirementSet,
    logs: &[FoodLog],
    band: f64,
) -> FoodBankSummary {
    let mut consumed = NutritionPayload::new();
    for log in logs {
        consumed += &log.nutrition;
    }

    let targets = daily.over_days(period.days());
    let standings = targets
        .tracked()
        .map(|(nutrient, target)| {
            let amount = consumed.amount(nutrient);
            NutrientStanding {
                nutrient,
                consumed: amount,
                target,
                status: NutrientStatus::classify(amount, target, band),
            }
        })
        .collect();

    let completion_rate = Nutrient::CORE_MACROS
        .iter()
        .map(|n| match targets.target(*n) {
            Some(t) if t > 0.0 => (consumed.amount(*n) / t).min(1.0),
            _ => 0.0,
        })
        .sum::<f64>()
        / Nutrient::CORE_MACROS.len() as f64;

    FoodBankSummary {
        period,
        start,
        end,
        days: period.days(),
        consumed,
        targets,
        standings,
        completion_rate,
        food_log_ids: logs.iter().map(|l| l.id).collect(),
        log_count: logs.len(),
    }
}

#[derive(Clone)]
pub struct FoodBankAggregator {
    store: Arc<dyn Store>,
    band: f64,
}

impl FoodBankAggregator {
    pub fn new(store: Arc<dyn Store>, band: f64) -> Self {
        Self { store, band }
    }

    #[instrument(skip(self))]
    pub async fn summary(
        &self,
        owner: Uuid,
        period: Period,
        now: OffsetDateTime,
    ) -> Result<FoodBankSummary, AppError> {
        let profile = self
            .store
            .get_profile(owner)
            .await?
            .ok_or_else(|| AppError::not_found("profile"))?;
        let daily = requirements::calculate(&profile);
        let bounds = window(period, now, profile.utc_offset());
        let logs = self.store.list_food_logs(owner, bounds.0, bounds.1).await?;
        debug!(%owner, logs = logs.len(), "food bank window loaded");
        Ok(summarize(period, bounds, &daily, &logs, self.band))
    }
}
