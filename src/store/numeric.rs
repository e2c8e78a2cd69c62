//! The single conversion point between stored NUMERIC amounts and `f64`.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::nutrition::NutritionPayload;

/// Scale of every NUMERIC nutrient column.
pub const SCALE: u32 = 3;

/// NUMERIC(12, 3) leaves nine digits before the point.
const LIMIT: f64 = 1e9;

pub fn to_decimal(value: f64) -> anyhow::Result<Decimal> {
    if value.abs() >= LIMIT {
        anyhow::bail!("amount {value} does not fit NUMERIC(12, {SCALE})");
    }
    let d = Decimal::from_f64(value)
        .ok_or_else(|| anyhow::anyhow!("amount {value} cannot be stored as NUMERIC"))?;
    Ok(d.round_dp_with_strategy(SCALE, RoundingStrategy::MidpointAwayFromZero))
}

pub fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// What an amount reads back as after a round trip through storage.
pub fn normalize(value: f64) -> anyhow::Result<f64> {
    to_decimal(value).map(to_f64)
}

pub fn normalize_payload(payload: &NutritionPayload) -> anyhow::Result<NutritionPayload> {
    let mut out = NutritionPayload::new();
    for (n, v) in payload.iter() {
        out.set(n, normalize(v)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nutrition::Nutrient;

    #[test]
    fn round_trip_within_tolerance() {
        for v in [0.0, 1.0, 0.1 + 0.2, 123.4567, 2500.0, 0.0004, 9_999_999.999] {
            let back = to_f64(to_decimal(v).unwrap());
            assert!((back - v).abs() <= 0.0005, "{v} came back as {back}");
        }
    }

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(to_decimal(2.0625).unwrap().to_string(), "2.063");
        assert_eq!(normalize(2.0).unwrap(), 2.0);
    }

    #[test]
    fn rejects_non_finite() {
        assert!(to_decimal(f64::NAN).is_err());
        assert!(to_decimal(f64::INFINITY).is_err());
    }

    #[test]
    fn rejects_amounts_the_column_cannot_hold() {
        assert!(to_decimal(999_999_999.999).is_ok());
        assert!(to_decimal(1e9).is_err());
        assert!(to_decimal(-5e12).is_err());
    }

    #[test]
    fn normalizes_whole_payload() {
        let p = NutritionPayload::new()
            .with(Nutrient::Protein, 3.14159)
            .with(Nutrient::VitaminB12, 2.4);
        let n = normalize_payload(&p).unwrap();
        assert_eq!(n.get(Nutrient::Protein), Some(3.142));
        assert_eq!(n.get(Nutrient::VitaminB12), Some(2.4));
    }
}
