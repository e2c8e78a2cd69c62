use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Measurement unit attached to every nutrient amount.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Kcal,
    G,
    Mg,
    Mcg,
}

/// Payload group a nutrient is reported under.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum NutrientGroup {
    Macros,
    Vitamins,
    Minerals,
    Lipids,
}

macro_rules! nutrients {
    ($($variant:ident => ($key:literal, $unit:ident, $group:ident)),+ $(,)?) => {
        /// Every nutrient tracked by a payload, food log or requirement set.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Nutrient {
            $($variant),+
        }

        impl Nutrient {
            pub const ALL: &'static [Nutrient] = &[$(Nutrient::$variant),+];

            /// Stable snake_case key, also used as the storage column name.
            pub const fn key(self) -> &'static str {
                match self {
                    $(Nutrient::$variant => $key),+
                }
            }

            pub const fn unit(self) -> Unit {
                match self {
                    $(Nutrient::$variant => Unit::$unit),+
                }
            }

            pub const fn group(self) -> NutrientGroup {
                match self {
                    $(Nutrient::$variant => NutrientGroup::$group),+
                }
            }

            pub fn from_key(key: &str) -> Option<Self> {
                match key {
                    $($key => Some(Nutrient::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

nutrients! {
    Calories => ("calories_kcal", Kcal, Macros),
    Protein => ("protein_g", G, Macros),
    Fat => ("fat_g", G, Macros),
    Carbs => ("carbs_g", G, Macros),
    Fiber => ("fiber_g", G, Macros),
    Sugar => ("sugar_g", G, Macros),
    Sodium => ("sodium_mg", Mg, Macros),

    VitaminA => ("vitamin_a_mcg", Mcg, Vitamins),
    VitaminC => ("vitamin_c_mg", Mg, Vitamins),
    VitaminD => ("vitamin_d_mcg", Mcg, Vitamins),
    VitaminE => ("vitamin_e_mg", Mg, Vitamins),
    VitaminK => ("vitamin_k_mcg", Mcg, Vitamins),
    VitaminB1 => ("vitamin_b1_mg", Mg, Vitamins),
    VitaminB2 => ("vitamin_b2_mg", Mg, Vitamins),
    VitaminB3 => ("vitamin_b3_mg", Mg, Vitamins),
    VitaminB5 => ("vitamin_b5_mg", Mg, Vitamins),
    VitaminB6 => ("vitamin_b6_mg", Mg, Vitamins),
    VitaminB7 => ("vitamin_b7_mcg", Mcg, Vitamins),
    VitaminB9 => ("vitamin_b9_mcg", Mcg, Vitamins),
    VitaminB12 => ("vitamin_b12_mcg", Mcg, Vitamins),

    Calcium => ("calcium_mg", Mg, Minerals),
    Iron => ("iron_mg", Mg, Minerals),
    Magnesium => ("magnesium_mg", Mg, Minerals),
    Phosphorus => ("phosphorus_mg", Mg, Minerals),
    Potassium => ("potassium_mg", Mg, Minerals),
    Zinc => ("zinc_mg", Mg, Minerals),
    Copper => ("copper_mg", Mg, Minerals),
    Manganese => ("manganese_mg", Mg, Minerals),
    Selenium => ("selenium_mcg", Mcg, Minerals),
    Chromium => ("chromium_mcg", Mcg, Minerals),
    Molybdenum => ("molybdenum_mcg", Mcg, Minerals),

    Cholesterol => ("cholesterol_mg", Mg, Lipids),
    SaturatedFat => ("saturated_fat_g", G, Lipids),
    TransFat => ("trans_fat_g", G, Lipids),
    PolyunsaturatedFat => ("polyunsaturated_fat_g", G, Lipids),
    MonounsaturatedFat => ("monounsaturated_fat_g", G, Lipids),
}

impl Nutrient {
    /// Macros every completion rate is computed over.
    pub const CORE_MACROS: [Nutrient; 4] = [
        Nutrient::Calories,
        Nutrient::Protein,
        Nutrient::Fat,
        Nutrient::Carbs,
    ];

    pub fn in_group(group: NutrientGroup) -> impl Iterator<Item = Nutrient> {
        Self::ALL.iter().copied().filter(move |n| n.group() == group)
    }
}

impl fmt::Display for Nutrient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl Serialize for Nutrient {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.key())
    }
}

impl<'de> Deserialize<'de> for Nutrient {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let key = String::deserialize(deserializer)?;
        Nutrient::from_key(&key)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown nutrient `{key}`")))
    }
}
