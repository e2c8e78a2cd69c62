use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::repo_types::{ActivityLevel, Gender, Goal};
use super::requirements::RequirementSet;

/// Body of `PUT /profile`.
#[derive(Debug, Deserialize)]
pub struct ProfileRequest {
    pub gender: Gender,
    pub height_cm: f64,
    pub weight_kg: f64,
    pub age: u32,
    pub activity_level: ActivityLevel,
    pub goal: Goal,
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

#[derive(Debug, Serialize)]
pub struct RequirementsResponse {
    #[serde(with = "time::serde::rfc3339")]
    pub profile_updated_at: OffsetDateTime,
    #[serde(flatten)]
    pub requirements: RequirementSet,
}
