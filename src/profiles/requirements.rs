//! Daily nutrient targets derived from a user profile.
//!
//! The calculation is pure and always runs in the same order:
//! BMR (Mifflin-St Jeor) → TDEE → goal-adjusted calories → protein → fat → carbs,
//! followed by fiber and the micronutrient reference table.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::repo_types::{ActivityLevel, Gender, Goal, UserProfile};
use crate::nutrition::Nutrient;

const KCAL_PER_G_PROTEIN: f64 = 4.0;
const KCAL_PER_G_CARBS: f64 = 4.0;
const KCAL_PER_G_FAT: f64 = 9.0;
const FAT_SHARE: f64 = 0.30;
const GOAL_ADJUSTMENT_KCAL: f64 = 500.0;
const FIBER_G_PER_1000_KCAL: f64 = 14.0;

/// Computed daily targets for one profile snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequirementSet {
    pub bmr: f64,
    pub tdee: f64,
    pub calories: f64,
    pub protein_g: f64,
    pub fat_g: f64,
    pub carbs_g: f64,
    pub fiber_g: f64,
    pub micronutrients: BTreeMap<Nutrient, f64>,
}

impl RequirementSet {
    pub fn target(&self, nutrient: Nutrient) -> Option<f64> {
        match nutrient {
            Nutrient::Calories => Some(self.calories),
            Nutrient::Protein => Some(self.protein_g),
            Nutrient::Fat => Some(self.fat_g),
            Nutrient::Carbs => Some(self.carbs_g),
            Nutrient::Fiber => Some(self.fiber_g),
            other => self.micronutrients.get(&other).copied(),
        }
    }

    /// Every nutrient with a target, in catalog order.
    pub fn tracked(&self) -> impl Iterator<Item = (Nutrient, f64)> + '_ {
        Nutrient::ALL
            .iter()
            .filter_map(|n| self.target(*n).map(|t| (*n, t)))
    }

    /// Targets multiplied over a window of `days` days.
    pub fn over_days(&self, days: u32) -> Self {
        let f = f64::from(days);
        Self {
            bmr: self.bmr,
            tdee: self.tdee,
            calories: self.calories * f,
            protein_g: self.protein_g * f,
            fat_g: self.fat_g * f,
            carbs_g: self.carbs_g * f,
            fiber_g: self.fiber_g * f,
            micronutrients: self
                .micronutrients
                .iter()
                .map(|(n, v)| (*n, v * f))
                .collect(),
        }
    }
}

/// Mifflin-St Jeor basal metabolic rate in kcal/day.
pub fn bmr(profile: &UserProfile) -> f64 {
    let base = 10.0 * profile.weight_kg + 6.25 * profile.height_cm - 5.0 * f64::from(profile.age);
    match profile.gender {
        Gender::Male => base + 5.0,
        Gender::Female => base - 161.0,
    }
}

pub fn activity_multiplier(level: ActivityLevel) -> f64 {
    match level {
        ActivityLevel::Sedentary => 1.20,
        ActivityLevel::LightlyActive => 1.375,
        ActivityLevel::ModeratelyActive => 1.55,
        ActivityLevel::VeryActive => 1.725,
        ActivityLevel::ExtremelyActive => 1.90,
    }
}

/// Protein grams per kg of body weight.
///
/// Activity sets the base; goals can only raise it. Weight loss does not raise
/// sedentary profiles, which stay at the 0.8 g/kg baseline.
pub fn protein_per_kg(level: ActivityLevel, goal: Goal) -> f64 {
    let base: f64 = match level {
        ActivityLevel::Sedentary => 0.8,
        ActivityLevel::LightlyActive => 1.0,
        ActivityLevel::ModeratelyActive => 1.2,
        ActivityLevel::VeryActive | ActivityLevel::ExtremelyActive => 1.6,
    };
    match (goal, level) {
        (Goal::GainWeight, _) => base.max(1.4),
        (Goal::LoseWeight, ActivityLevel::Sedentary) => base,
        (Goal::LoseWeight, _) => base.max(1.2),
        (Goal::MaintainWeight, _) => base,
    }
}

pub fn calculate(profile: &UserProfile) -> RequirementSet {
    let bmr = bmr(profile);
    let tdee = bmr * activity_multiplier(profile.activity_level);
    let calories = match profile.goal {
        Goal::LoseWeight => (tdee - GOAL_ADJUSTMENT_KCAL).max(bmr),
        Goal::GainWeight => tdee + GOAL_ADJUSTMENT_KCAL,
        Goal::MaintainWeight => tdee,
    };

    let protein_g = profile.weight_kg * protein_per_kg(profile.activity_level, profile.goal);
    let fat_g = calories * FAT_SHARE / KCAL_PER_G_FAT;
    let remaining = calories - protein_g * KCAL_PER_G_PROTEIN - fat_g * KCAL_PER_G_FAT;
    let carbs_g = (remaining / KCAL_PER_G_CARBS).max(0.0);
    let fiber_g = calories / 1000.0 * FIBER_G_PER_1000_KCAL;

    RequirementSet {
        bmr,
        tdee,
        calories,
        protein_g,
        fat_g,
        carbs_g,
        fiber_g,
        micronutrients: micronutrient_targets(profile.gender, profile.age),
    }
}

/// Adult reference intakes (RDA/AI) for vitamins, minerals and sodium.
pub fn micronutrient_targets(gender: Gender, age: u32) -> BTreeMap<Nutrient, f64> {
    use Nutrient::*;
    let male = gender == Gender::Male;
    let older = age > 50;
    let pick = |m: f64, f: f64| if male { m } else { f };

    BTreeMap::from([
        (Sodium, 1500.0),
        (VitaminA, pick(900.0, 700.0)),
        (VitaminC, pick(90.0, 75.0)),
        (VitaminD, if age > 70 { 20.0 } else { 15.0 }),
        (VitaminE, 15.0),
        (VitaminK, pick(120.0, 90.0)),
        (VitaminB1, pick(1.2, 1.1)),
        (VitaminB2, pick(1.3, 1.1)),
        (VitaminB3, pick(16.0, 14.0)),
        (VitaminB5, 5.0),
        (VitaminB6, if older { pick(1.7, 1.5) } else { 1.3 }),
        (VitaminB7, 30.0),
        (VitaminB9, 400.0),
        (VitaminB12, 2.4),
        (Calcium, if older && !male { 1200.0 } else { 1000.0 }),
        (Iron, if male || older { 8.0 } else { 18.0 }),
        (Magnesium, pick(420.0, 320.0)),
        (Phosphorus, 700.0),
        (Potassium, pick(3400.0, 2600.0)),
        (Zinc, pick(11.0, 8.0)),
        (Copper, 0.9),
        (Manganese, pick(2.3, 1.8)),
        (Selenium, 55.0),
        (Chromium, if older { pick(30.0, 20.0) } else { pick(35.0, 25.0) }),
        (Molybdenum, 45.0),
    ])
}
