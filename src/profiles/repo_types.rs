use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, UtcOffset};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Sedentary,
    LightlyActive,
    ModeratelyActive,
    VeryActive,
    ExtremelyActive,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Goal {
    LoseWeight,
    MaintainWeight,
    GainWeight,
}

macro_rules! text_enum {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub const fn as_str(self) -> &'static str {
                match self {
                    $($ty::$variant => $text),+
                }
            }
        }

        impl FromStr for $ty {
            type Err = anyhow::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($ty::$variant),)+
                    other => anyhow::bail!("unknown {} `{}`", stringify!($ty), other),
                }
            }
        }
    };
}

text_enum!(Gender { Male => "male", Female => "female" });
text_enum!(ActivityLevel {
    Sedentary => "sedentary",
    LightlyActive => "lightly_active",
    ModeratelyActive => "moderately_active",
    VeryActive => "very_active",
    ExtremelyActive => "extremely_active",
});
text_enum!(Goal {
    LoseWeight => "lose_weight",
    MaintainWeight => "maintain_weight",
    GainWeight => "gain_weight",
});

/// One profile per owner; upserted, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub owner: Uuid,
    pub gender: Gender,
    pub height_cm: f64,
    pub weight_kg: f64,
    pub age: u32,
    pub activity_level: ActivityLevel,
    pub goal: Goal,
    /// Offset of the owner's local day boundary from UTC.
    pub utc_offset_minutes: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl UserProfile {
    pub fn validate(&self) -> Result<(), AppError> {
        if !(100.0..=250.0).contains(&self.height_cm) {
            return Err(AppError::field("height_cm", "must be between 100 and 250"));
        }
        if !(30.0..=300.0).contains(&self.weight_kg) {
            return Err(AppError::field("weight_kg", "must be between 30 and 300"));
        }
        if !(13..=100).contains(&self.age) {
            return Err(AppError::field("age", "must be between 13 and 100"));
        }
        if !(-720..=840).contains(&self.utc_offset_minutes) {
            return Err(AppError::field(
                "utc_offset_minutes",
                "must be between -720 and 840",
            ));
        }
        Ok(())
    }

    pub fn utc_offset(&self) -> UtcOffset {
        UtcOffset::from_whole_seconds(self.utc_offset_minutes * 60).unwrap_or(UtcOffset::UTC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> UserProfile {
        UserProfile {
            owner: Uuid::new_v4(),
            gender: Gender::Female,
            height_cm: 165.0,
            weight_kg: 60.0,
            age: 25,
            activity_level: ActivityLevel::Sedentary,
            goal: Goal::LoseWeight,
            utc_offset_minutes: 120,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn text_round_trip() {
        for level in [
            ActivityLevel::Sedentary,
            ActivityLevel::LightlyActive,
            ActivityLevel::ModeratelyActive,
            ActivityLevel::VeryActive,
            ActivityLevel::ExtremelyActive,
        ] {
            assert_eq!(level.as_str().parse::<ActivityLevel>().unwrap(), level);
        }
        assert!("couch_potato".parse::<ActivityLevel>().is_err());
        assert_eq!("gain_weight".parse::<Goal>().unwrap(), Goal::GainWeight);
    }

    #[test]
    fn validates_ranges() {
        assert!(profile().validate().is_ok());
        let mut p = profile();
        p.weight_kg = 12.0;
        assert!(matches!(p.validate(), Err(AppError::InvalidInput(_))));
        let mut p = profile();
        p.utc_offset_minutes = 2000;
        assert!(p.validate().is_err());
    }

    #[test]
    fn offset_from_minutes() {
        assert_eq!(profile().utc_offset().whole_minutes(), 120);
    }
}
