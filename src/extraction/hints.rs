//! Local inference of when a meal was eaten and which meal it was, used when
//! the provider leaves those fields empty.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use time::{Duration, OffsetDateTime, Time};

use crate::nutrition::MealType;

lazy_static! {
    static ref AT_TIME_RE: Regex =
        Regex::new(r"(?i)\bat\s+(\d{1,2})(?::(\d{2}))?\s*(am|pm)?\b").unwrap();
    static ref CLOCK_RE: Regex = Regex::new(r"(?i)\b(\d{1,2}):(\d{2})\s*(am|pm)?\b").unwrap();
    static ref MERIDIEM_RE: Regex = Regex::new(r"(?i)\b(\d{1,2})\s*(am|pm)\b").unwrap();
    static ref DAY_RE: Regex =
        Regex::new(r"(?i)\b(today|yesterday|tonight|last night|this morning)\b").unwrap();
    static ref MEAL_WORD_RE: Regex = Regex::new(
        r"(?i)\b(breakfast|brunch|lunch|dinner|supper|snack|snacks|snacking|morning|noon|midday|evening|night)\b"
    )
    .unwrap();
}

/// Meal time named in `text`, expressed in `local_now`'s offset.
///
/// A bare clock time that would land more than an hour in the future is taken
/// to mean the previous day ("pizza at 11pm" sent the next morning).
pub fn meal_time(text: &str, local_now: OffsetDateTime) -> Option<OffsetDateTime> {
    let day = DAY_RE
        .captures(text)
        .map(|c| c[1].to_ascii_lowercase());
    let date = match day.as_deref() {
        Some("yesterday") | Some("last night") => local_now.date().previous_day()?,
        _ => local_now.date(),
    };

    let clock = [&*AT_TIME_RE, &*CLOCK_RE, &*MERIDIEM_RE]
        .iter()
        .find_map(|re| re.captures_iter(text).find_map(|c| clock_time(&c)));

    let time = match (clock, day.as_deref()) {
        (Some(t), _) => t,
        (None, Some("this morning")) => Time::from_hms(8, 0, 0).ok()?,
        (None, Some("tonight")) | (None, Some("last night")) => Time::from_hms(19, 0, 0).ok()?,
        (None, Some(_)) => Time::from_hms(12, 0, 0).ok()?,
        (None, None) => return None,
    };

    let at = local_now.replace_date(date).replace_time(time);
    if day.is_none() && at > local_now + Duration::hours(1) {
        return Some(at - Duration::days(1));
    }
    Some(at)
}

fn clock_time(c: &Captures<'_>) -> Option<Time> {
    let mut hour: u8 = c.get(1)?.as_str().parse().ok()?;
    let minute: u8 = match c.get(2) {
        // MERIDIEM_RE puts am/pm in the second group
        Some(m) if m.as_str().chars().all(|ch| ch.is_ascii_digit()) => m.as_str().parse().ok()?,
        _ => 0,
    };
    let meridiem = c
        .iter()
        .skip(2)
        .flatten()
        .map(|m| m.as_str().to_ascii_lowercase())
        .find(|m| m == "am" || m == "pm");
    match meridiem.as_deref() {
        Some(_) if !(1..=12).contains(&hour) => return None,
        Some("pm") if hour != 12 => hour += 12,
        Some("am") if hour == 12 => hour = 0,
        _ => {}
    }
    Time::from_hms(hour, minute, 0).ok()
}

/// Meal type named in `text`, else derived from the hour of `consumed_at`.
pub fn meal_type(text: &str, consumed_at: Option<OffsetDateTime>) -> Option<MealType> {
    let named = MEAL_WORD_RE.captures(text).map(|c| {
        match c[1].to_ascii_lowercase().as_str() {
            "breakfast" | "brunch" | "morning" => MealType::Breakfast,
            "lunch" | "noon" | "midday" => MealType::Lunch,
            "dinner" | "supper" | "evening" | "night" => MealType::Dinner,
            _ => MealType::Snack,
        }
    });
    named.or_else(|| consumed_at.map(|t| MealType::for_hour(t.hour())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    // 09:30 at UTC+02:00
    fn now() -> OffsetDateTime {
        datetime!(2024-05-10 09:30 +02:00)
    }

    #[test]
    fn at_hour_with_meridiem() {
        let t = meal_time("oatmeal for breakfast at 8am", now()).unwrap();
        assert_eq!(t, datetime!(2024-05-10 08:00 +02:00));
    }

    #[test]
    fn clock_with_minutes() {
        let t = meal_time("had a sandwich, 12:30 pm", datetime!(2024-05-10 14:00 +02:00)).unwrap();
        assert_eq!(t, datetime!(2024-05-10 12:30 +02:00));
    }

    #[test]
    fn yesterday_without_time_is_noon() {
        let t = meal_time("yesterday I had lasagna", now()).unwrap();
        assert_eq!(t, datetime!(2024-05-09 12:00 +02:00));
    }

    #[test]
    fn yesterday_with_time() {
        let t = meal_time("pizza yesterday at 9pm", now()).unwrap();
        assert_eq!(t, datetime!(2024-05-09 21:00 +02:00));
    }

    #[test]
    fn future_clock_time_rolls_back_a_day() {
        let t = meal_time("pizza at 11pm", now()).unwrap();
        assert_eq!(t, datetime!(2024-05-09 23:00 +02:00));
    }

    #[test]
    fn quantities_are_not_times() {
        assert_eq!(meal_time("2 cups of rice and 3 eggs", now()), None);
        assert_eq!(meal_time("ate at 25 places", now()), None);
    }

    #[test]
    fn meal_type_from_words_then_hour() {
        assert_eq!(meal_type("eggs for breakfast", None), Some(MealType::Breakfast));
        assert_eq!(meal_type("supper was soup", None), Some(MealType::Dinner));
        assert_eq!(
            meal_type("a bagel", Some(datetime!(2024-05-10 12:15 +02:00))),
            Some(MealType::Lunch)
        );
        assert_eq!(meal_type("a bagel", None), None);
    }
}
