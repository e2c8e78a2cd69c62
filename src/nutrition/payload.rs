use std::collections::BTreeMap;
use std::ops::AddAssign;

use serde::{Deserialize, Serialize};

use super::nutrient::{Nutrient, NutrientGroup, Unit};

/// Amounts for any subset of the tracked nutrients. Absent nutrients read as 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(into = "PayloadGroups", try_from = "PayloadGroups")]
pub struct NutritionPayload {
    amounts: BTreeMap<Nutrient, f64>,
}

impl NutritionPayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, nutrient: Nutrient, amount: f64) -> Self {
        self.set(nutrient, amount);
        self
    }

    pub fn set(&mut self, nutrient: Nutrient, amount: f64) {
        self.amounts.insert(nutrient, amount);
    }

    pub fn get(&self, nutrient: Nutrient) -> Option<f64> {
        self.amounts.get(&nutrient).copied()
    }

    pub fn amount(&self, nutrient: Nutrient) -> f64 {
        self.get(nutrient).unwrap_or(0.0)
    }

    pub fn calories(&self) -> f64 {
        self.amount(Nutrient::Calories)
    }

    pub fn is_empty(&self) -> bool {
        self.amounts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Nutrient, f64)> + '_ {
        self.amounts.iter().map(|(n, v)| (*n, *v))
    }

    /// Builds a payload from flat `key -> amount` pairs, skipping unknown keys and nulls.
    pub fn from_flat<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, Option<f64>)>,
    {
        let amounts = pairs
            .into_iter()
            .filter_map(|(k, v)| Some((Nutrient::from_key(k)?, v?)))
            .collect();
        Self { amounts }
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            amounts: self.amounts.iter().map(|(n, v)| (*n, v * factor)).collect(),
        }
    }
}

impl AddAssign<&NutritionPayload> for NutritionPayload {
    fn add_assign(&mut self, rhs: &NutritionPayload) {
        for (n, v) in rhs.iter() {
            *self.amounts.entry(n).or_insert(0.0) += v;
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Amount {
    pub amount: f64,
    pub unit: Unit,
}

/// Wire shape: four groups of `key -> {amount, unit}`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PayloadGroups {
    #[serde(default)]
    pub macros: BTreeMap<Nutrient, Amount>,
    #[serde(default)]
    pub vitamins: BTreeMap<Nutrient, Amount>,
    #[serde(default)]
    pub minerals: BTreeMap<Nutrient, Amount>,
    #[serde(default)]
    pub lipids: BTreeMap<Nutrient, Amount>,
}

impl From<NutritionPayload> for PayloadGroups {
    fn from(p: NutritionPayload) -> Self {
        let mut groups = PayloadGroups::default();
        for (n, amount) in p.amounts {
            let entry = Amount {
                amount,
                unit: n.unit(),
            };
            let bucket = match n.group() {
                NutrientGroup::Macros => &mut groups.macros,
                NutrientGroup::Vitamins => &mut groups.vitamins,
                NutrientGroup::Minerals => &mut groups.minerals,
                NutrientGroup::Lipids => &mut groups.lipids,
            };
            bucket.insert(n, entry);
        }
        groups
    }
}

impl TryFrom<PayloadGroups> for NutritionPayload {
    type Error = String;

    fn try_from(groups: PayloadGroups) -> Result<Self, Self::Error> {
        let mut amounts = BTreeMap::new();
        let all = [
            (NutrientGroup::Macros, groups.macros),
            (NutrientGroup::Vitamins, groups.vitamins),
            (NutrientGroup::Minerals, groups.minerals),
            (NutrientGroup::Lipids, groups.lipids),
        ];
        for (group, bucket) in all {
            for (n, a) in bucket {
                if n.group() != group {
                    return Err(format!("{n} does not belong to {group:?}"));
                }
                if a.unit != n.unit() {
                    return Err(format!("{n} must be reported in {:?}", n.unit()));
                }
                amounts.insert(n, a.amount);
            }
        }
        Ok(Self { amounts })
    }
}
