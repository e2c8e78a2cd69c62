use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;

use super::{
    hints, DishDescriptor, Extraction, ExtractionRequest, MealAnalysis, NutritionExtractionService,
    ResolvedNutrition, ServiceError,
};
use crate::sessions::DishResult;

lazy_static! {
    static ref TIME_PHRASE_RE: Regex = Regex::new(
        r"(?i)\b(?:at\s+)?(?:\d{1,2}:\d{2}\s*(?:am|pm)?|\d{1,2}\s*(?:am|pm))\b|\bat\s+\d{1,2}\b"
    )
    .unwrap();
    static ref MEAL_PHRASE_RE: Regex = Regex::new(
        r"(?i)\b(?:for|at|during|as)\s+(?:my\s+|a\s+)?(?:breakfast|brunch|lunch|dinner|supper|snack)\b"
    )
    .unwrap();
    static ref FILLER_RE: Regex = Regex::new(
        r"(?i)\b(?:i|we)\s+(?:just\s+)?(?:had|ate|have\s+eaten|drank|eat|grabbed)\b|\b(?:today|yesterday|tonight|last\s+night|this\s+morning|then|also)\b"
    )
    .unwrap();
    static ref SPLIT_RE: Regex =
        Regex::new(r"(?i)\s*(?:,|;|&|\+|\band\b|\bwith\b|\bplus\b|\bfollowed\s+by\b)\s*").unwrap();
    static ref PORTION_RE: Regex = Regex::new(
        r"(?i)^(\d+(?:\.\d+)?|an?|one|two|three|four|five|half|some)\s*(g|gm|gms|grams?|kg|ml|l|oz|cups?|tbsp|tsp|slices?|pieces?|bowls?|glass(?:es)?|plates?|servings?|handfuls?|small|medium|large)?\b\s*(?:of\s+)?(.*)$"
    )
    .unwrap();
}

/// Offline provider: regex dish extraction, no nutrition database, rule-based analysis.
///
/// Every `resolve_nutrition` call is refused, so each dish takes the fallback path.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicExtractionService;

#[async_trait]
impl NutritionExtractionService for HeuristicExtractionService {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    async fn extract_dishes(
        &self,
        request: &ExtractionRequest,
    ) -> Result<Extraction, ServiceError> {
        let consumed_at = hints::meal_time(&request.text, request.local_now);
        Ok(Extraction {
            dishes: split_dishes(&request.text),
            consumed_at,
            meal_type: hints::meal_type(&request.text, consumed_at),
        })
    }

    async fn resolve_nutrition(
        &self,
        _dish: &DishDescriptor,
        _serving_hint: Option<&str>,
    ) -> Result<ResolvedNutrition, ServiceError> {
        Err(ServiceError::Unavailable(
            "heuristic provider has no nutrition database".into(),
        ))
    }

    async fn analyze_meal(&self, dishes: &[DishResult]) -> Result<MealAnalysis, ServiceError> {
        Ok(MealAnalysis::estimate(dishes))
    }
}

pub fn split_dishes(text: &str) -> Vec<DishDescriptor> {
    let stripped = TIME_PHRASE_RE.replace_all(text, " ");
    let stripped = MEAL_PHRASE_RE.replace_all(&stripped, " ");
    let stripped = FILLER_RE.replace_all(&stripped, " ");

    let mut dishes: Vec<DishDescriptor> = Vec::new();
    for chunk in SPLIT_RE.split(&stripped) {
        let chunk = chunk.trim_matches(|c: char| c.is_whitespace() || c.is_ascii_punctuation());
        if let Some(dish) = parse_chunk(chunk) {
            if !dishes.iter().any(|d| d.name.eq_ignore_ascii_case(&dish.name)) {
                dishes.push(dish);
            }
        }
    }
    dishes
}

fn parse_chunk(chunk: &str) -> Option<DishDescriptor> {
    let (name, hint) = match PORTION_RE.captures(chunk) {
        Some(c) if !c[3].trim().is_empty() => {
            let qty = normalize_quantity(&c[1]);
            let hint = match (qty, c.get(2)) {
                (Some(q), Some(unit)) => Some(format!("{q} {}", unit.as_str().to_lowercase())),
                (Some(q), None) => Some(q.to_string()),
                (None, Some(unit)) => Some(unit.as_str().to_lowercase()),
                (None, None) => None,
            };
            (c[3].trim().to_string(), hint)
        }
        _ => (chunk.to_string(), None),
    };
    let name = name
        .trim_matches(|c: char| c.is_whitespace() || c.is_ascii_punctuation())
        .to_lowercase();
    if !name.chars().any(char::is_alphabetic) {
        return None;
    }
    Some(DishDescriptor {
        name,
        serving_hint: hint,
        meal_type: None,
    })
}

fn normalize_quantity(raw: &str) -> Option<&str> {
    match raw.to_ascii_lowercase().as_str() {
        "a" | "an" | "one" => Some("1"),
        "two" => Some("2"),
        "three" => Some("3"),
        "four" => Some("4"),
        "five" => Some("5"),
        "half" => Some("0.5"),
        "some" => None,
        _ => Some(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nutrition::MealType;
    use time::macros::datetime;

    #[test]
    fn splits_quantities_and_names() {
        let dishes = split_dishes("I had 2 cups of oatmeal with 1 banana for breakfast at 8am");
        assert_eq!(
            dishes,
            vec![
                DishDescriptor::new("oatmeal").serving("2 cups"),
                DishDescriptor::new("banana").serving("1"),
            ]
        );
    }

    #[test]
    fn handles_lists_and_articles() {
        let dishes = split_dishes("a bowl of rice, grilled chicken and a glass of milk");
        let names: Vec<_> = dishes.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["rice", "grilled chicken", "milk"]);
        assert_eq!(dishes[0].serving_hint.as_deref(), Some("1 bowl"));
        assert_eq!(dishes[1].serving_hint, None);
    }

    #[test]
    fn drops_duplicates_and_empty_chunks() {
        let dishes = split_dishes("toast, , toast and 3");
        assert_eq!(dishes, vec![DishDescriptor::new("toast")]);
    }

    #[tokio::test]
    async fn extraction_fills_time_and_meal_type() {
        let request = ExtractionRequest {
            text: "I had 2 cups of oatmeal with 1 banana for breakfast at 8am".into(),
            local_now: datetime!(2024-05-10 09:30 +02:00),
        };
        let out = HeuristicExtractionService
            .extract_dishes(&request)
            .await
            .unwrap();
        assert_eq!(out.dishes.len(), 2);
        assert_eq!(out.consumed_at, Some(datetime!(2024-05-10 08:00 +02:00)));
        assert_eq!(out.meal_type, Some(MealType::Breakfast));
    }

    #[tokio::test]
    async fn never_resolves_nutrition() {
        let r = HeuristicExtractionService
            .resolve_nutrition(&DishDescriptor::new("rice"), None)
            .await;
        assert!(matches!(r, Err(ServiceError::Unavailable(_))));
    }
}
