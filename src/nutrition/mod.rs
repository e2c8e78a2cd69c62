pub mod fallback;
pub mod meal_type;
pub mod nutrient;
pub mod payload;

pub use fallback::{FallbackEstimate, FoodCategory, FALLBACK_CONFIDENCE, MAX_DISH_AMOUNT};
pub use meal_type::MealType;
pub use nutrient::{Nutrient, NutrientGroup, Unit};
pub use payload::NutritionPayload;
