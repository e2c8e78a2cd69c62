//! Built-in reference estimates used when live nutrition lookup is unusable.
//!
//! A dish is mapped to a coarse [`FoodCategory`] from the words in its name and
//! receives that category's per-serving reference payload, scaled by the serving
//! hint when the hint carries a quantity.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::nutrient::Nutrient;
use super::payload::NutritionPayload;

/// Confidence attached to every fallback estimate.
pub const FALLBACK_CONFIDENCE: f64 = 0.3;

/// Largest single-dish amount, in any unit, that a lookup may report.
pub const MAX_DISH_AMOUNT: f64 = 100_000.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FoodCategory {
    Grain,
    Protein,
    Fruit,
    Vegetable,
    Dairy,
    Mixed,
}

const GRAIN_WORDS: &[&str] = &[
    "oat", "oats", "oatmeal", "porridge", "rice", "bread", "toast", "pasta", "spaghetti",
    "noodle", "cereal", "quinoa", "bagel", "tortilla", "granola", "couscous", "barley",
    "muesli", "pancake", "waffle", "cracker",
];
const PROTEIN_WORDS: &[&str] = &[
    "chicken", "beef", "pork", "fish", "salmon", "tuna", "cod", "egg", "turkey", "tofu",
    "steak", "shrimp", "prawn", "lamb", "bacon", "sausage", "ham", "bean", "lentil",
    "chickpea", "tempeh", "jerky",
];
const FRUIT_WORDS: &[&str] = &[
    "banana", "apple", "orange", "berry", "berries", "strawberry", "blueberry", "raspberry",
    "grape", "mango", "pear", "peach", "pineapple", "melon", "watermelon", "kiwi", "plum",
    "cherry", "cherries", "fruit",
];
const VEGETABLE_WORDS: &[&str] = &[
    "salad", "broccoli", "spinach", "carrot", "lettuce", "tomato", "tomatoes", "cucumber",
    "pepper", "kale", "zucchini", "cabbage", "cauliflower", "asparagus", "celery", "onion",
    "mushroom", "vegetable", "veggies", "greens",
];
const DAIRY_WORDS: &[&str] = &[
    "milk", "yogurt", "yoghurt", "cheese", "kefir", "cottage", "cream", "latte", "butter",
    "skyr",
];
const ZERO_CALORIE_WORDS: &[&str] = &[
    "water", "tea", "coffee", "espresso", "americano", "diet", "zero", "seltzer", "sparkling",
];

lazy_static! {
    static ref SERVING_RE: Regex =
        Regex::new(r"(?i)^\s*(\d+(?:\.\d+)?|an?|one|half)\s*([a-z]+)?").unwrap();
}

/// Result of applying the fallback policy to one dish.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackEstimate {
    pub category: FoodCategory,
    pub payload: NutritionPayload,
    pub confidence: f64,
}

fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_owned)
        .collect()
}

fn mentions(words: &[String], vocabulary: &[&str]) -> bool {
    words.iter().any(|w| {
        vocabulary.contains(&w.as_str())
            || w.strip_suffix('s').is_some_and(|s| vocabulary.contains(&s))
    })
}

/// Picks the single category the dish name points at, or `Mixed` when none or several match.
pub fn categorize(description: &str) -> FoodCategory {
    let words = words(description);
    let candidates = [
        (FoodCategory::Grain, GRAIN_WORDS),
        (FoodCategory::Protein, PROTEIN_WORDS),
        (FoodCategory::Fruit, FRUIT_WORDS),
        (FoodCategory::Vegetable, VEGETABLE_WORDS),
        (FoodCategory::Dairy, DAIRY_WORDS),
    ];
    let mut hits = candidates
        .iter()
        .filter(|(_, vocab)| mentions(&words, vocab))
        .map(|(c, _)| *c);
    match (hits.next(), hits.next()) {
        (Some(only), None) => only,
        _ => FoodCategory::Mixed,
    }
}

impl FoodCategory {
    /// Grams (or ml) the reference payload describes.
    pub fn reference_grams(self) -> f64 {
        match self {
            FoodCategory::Grain => 200.0,
            FoodCategory::Protein => 120.0,
            FoodCategory::Fruit => 120.0,
            FoodCategory::Vegetable => 100.0,
            FoodCategory::Dairy => 245.0,
            FoodCategory::Mixed => 250.0,
        }
    }

    /// Typical single-serving nutrition for the category.
    pub fn reference_payload(self) -> NutritionPayload {
        use Nutrient::*;
        let p = NutritionPayload::new();
        match self {
            FoodCategory::Grain => p
                .with(Calories, 250.0)
                .with(Protein, 7.0)
                .with(Fat, 3.0)
                .with(Carbs, 50.0)
                .with(Fiber, 4.0)
                .with(Sugar, 1.0)
                .with(Sodium, 10.0)
                .with(VitaminB1, 0.3)
                .with(VitaminB3, 2.5)
                .with(VitaminB9, 60.0)
                .with(Iron, 2.0)
                .with(Magnesium, 60.0)
                .with(Phosphorus, 150.0)
                .with(Zinc, 1.5)
                .with(Manganese, 1.3)
                .with(Selenium, 12.0),
            FoodCategory::Protein => p
                .with(Calories, 220.0)
                .with(Protein, 30.0)
                .with(Fat, 10.0)
                .with(Carbs, 0.0)
                .with(Sodium, 80.0)
                .with(VitaminB3, 9.0)
                .with(VitaminB6, 0.6)
                .with(VitaminB12, 1.2)
                .with(Iron, 1.5)
                .with(Zinc, 3.5)
                .with(Phosphorus, 250.0)
                .with(Potassium, 350.0)
                .with(Selenium, 30.0)
                .with(Cholesterol, 100.0)
                .with(SaturatedFat, 3.0)
                .with(MonounsaturatedFat, 4.0)
                .with(PolyunsaturatedFat, 2.0),
            FoodCategory::Fruit => p
                .with(Calories, 90.0)
                .with(Protein, 1.0)
                .with(Fat, 0.3)
                .with(Carbs, 23.0)
                .with(Fiber, 3.0)
                .with(Sugar, 14.0)
                .with(VitaminA, 5.0)
                .with(VitaminC, 10.0)
                .with(VitaminB6, 0.4)
                .with(VitaminB9, 20.0)
                .with(Potassium, 360.0)
                .with(Magnesium, 27.0),
            FoodCategory::Vegetable => p
                .with(Calories, 35.0)
                .with(Protein, 2.0)
                .with(Fat, 0.3)
                .with(Carbs, 7.0)
                .with(Fiber, 3.0)
                .with(Sugar, 3.0)
                .with(Sodium, 30.0)
                .with(VitaminA, 300.0)
                .with(VitaminC, 30.0)
                .with(VitaminK, 90.0)
                .with(VitaminB9, 60.0)
                .with(Potassium, 300.0)
                .with(Calcium, 40.0)
                .with(Iron, 1.0)
                .with(Magnesium, 25.0),
            FoodCategory::Dairy => p
                .with(Calories, 150.0)
                .with(Protein, 8.0)
                .with(Fat, 8.0)
                .with(Carbs, 12.0)
                .with(Sugar, 12.0)
                .with(Sodium, 105.0)
                .with(VitaminA, 110.0)
                .with(VitaminD, 2.9)
                .with(VitaminB2, 0.4)
                .with(VitaminB12, 1.1)
                .with(Calcium, 300.0)
                .with(Phosphorus, 250.0)
                .with(Potassium, 350.0)
                .with(Zinc, 1.0)
                .with(Cholesterol, 24.0)
                .with(SaturatedFat, 5.0),
            FoodCategory::Mixed => p
                .with(Calories, 350.0)
                .with(Protein, 15.0)
                .with(Fat, 14.0)
                .with(Carbs, 40.0)
                .with(Fiber, 4.0)
                .with(Sugar, 5.0)
                .with(Sodium, 600.0)
                .with(Calcium, 80.0)
                .with(Iron, 2.5)
                .with(Potassium, 400.0)
                .with(Cholesterol, 40.0)
                .with(SaturatedFat, 5.0),
        }
    }
}

/// Portion multiplier derived from a serving hint such as "2 cups" or "80 g".
pub fn serving_multiplier(hint: Option<&str>, category: FoodCategory) -> f64 {
    let Some(caps) = hint.and_then(|h| SERVING_RE.captures(h)) else {
        return 1.0;
    };
    let quantity = match caps[1].to_lowercase().as_str() {
        "a" | "an" | "one" => 1.0,
        "half" => 0.5,
        n => n.parse::<f64>().unwrap_or(1.0),
    };
    let unit = caps.get(2).map(|m| m.as_str().to_lowercase());
    let grams = match unit.as_deref() {
        Some("g" | "gm" | "gms" | "gram" | "grams" | "ml") => Some(quantity),
        Some("kg" | "l") => Some(quantity * 1000.0),
        Some("oz" | "ounce" | "ounces") => Some(quantity * 28.35),
        _ => None,
    };
    let factor = match grams {
        Some(g) => g / category.reference_grams(),
        None => quantity,
    };
    factor.clamp(0.1, 10.0)
}

/// True when a looked-up payload cannot be trusted for the dish.
pub fn is_degenerate(description: &str, payload: &NutritionPayload) -> bool {
    if payload
        .iter()
        .any(|(_, v)| !v.is_finite() || !(0.0..=MAX_DISH_AMOUNT).contains(&v))
    {
        return true;
    }
    payload.calories() <= 0.0 && !mentions(&words(description), ZERO_CALORIE_WORDS)
}

pub fn estimate(description: &str, serving_hint: Option<&str>) -> FallbackEstimate {
    let category = categorize(description);
    let factor = serving_multiplier(serving_hint, category);
    FallbackEstimate {
        category,
        payload: category.reference_payload().scaled(factor),
        confidence: FALLBACK_CONFIDENCE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categorizes_by_keywords() {
        assert_eq!(categorize("oatmeal"), FoodCategory::Grain);
        assert_eq!(categorize("Grilled Chicken Breast"), FoodCategory::Protein);
        assert_eq!(categorize("bananas"), FoodCategory::Fruit);
        assert_eq!(categorize("spinach"), FoodCategory::Vegetable);
        assert_eq!(categorize("greek yogurt"), FoodCategory::Dairy);
        assert_eq!(categorize("chicken salad"), FoodCategory::Mixed);
        assert_eq!(categorize("pizza"), FoodCategory::Mixed);
    }

    #[test]
    fn serving_hint_scales_counts_and_weights() {
        assert_eq!(serving_multiplier(Some("2 cups"), FoodCategory::Grain), 2.0);
        assert_eq!(serving_multiplier(Some("a small"), FoodCategory::Fruit), 1.0);
        assert_eq!(serving_multiplier(Some("half"), FoodCategory::Fruit), 0.5);
        assert_eq!(serving_multiplier(Some("100 g"), FoodCategory::Grain), 0.5);
        assert_eq!(serving_multiplier(Some("250ml"), FoodCategory::Mixed), 1.0);
        assert_eq!(serving_multiplier(None, FoodCategory::Dairy), 1.0);
        assert_eq!(serving_multiplier(Some("500 slices"), FoodCategory::Grain), 10.0);
    }

    #[test]
    fn zero_calories_is_degenerate_unless_dish_is_non_caloric() {
        let empty = NutritionPayload::new().with(Nutrient::Calories, 0.0);
        assert!(is_degenerate("fried rice", &empty));
        assert!(!is_degenerate("sparkling water", &empty));
        assert!(!is_degenerate("black coffee", &empty));
    }

    #[test]
    fn negative_or_nan_is_degenerate() {
        let bad = NutritionPayload::new()
            .with(Nutrient::Calories, 120.0)
            .with(Nutrient::Protein, -1.0);
        assert!(is_degenerate("toast", &bad));
        let nan = NutritionPayload::new().with(Nutrient::Calories, f64::NAN);
        assert!(is_degenerate("toast", &nan));
    }

    #[test]
    fn absurdly_large_amounts_are_degenerate() {
        let huge = NutritionPayload::new()
            .with(Nutrient::Calories, 250.0)
            .with(Nutrient::Sodium, 1e12);
        assert!(is_degenerate("toast", &huge));
        let big_but_plausible = NutritionPayload::new().with(Nutrient::Calories, 5_000.0);
        assert!(!is_degenerate("toast", &big_but_plausible));
    }

    #[test]
    fn estimate_is_tagged_low_confidence() {
        let e = estimate("banana", Some("2"));
        assert_eq!(e.category, FoodCategory::Fruit);
        assert_eq!(e.confidence, FALLBACK_CONFIDENCE);
        assert_eq!(e.payload.calories(), 180.0);
    }
}
