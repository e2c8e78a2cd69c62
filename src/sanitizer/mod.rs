//! Validation and cleanup of free-text meal descriptions before any pipeline stage runs.

mod rules;

pub use rules::{RulesError, SanitizerRules};

use regex::Regex;
use tracing::debug;

use crate::error::{AppError, InputRejection};

/// Text that passed sanitization, ready for extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedInput {
    pub text: String,
    /// How many denylisted fragments were removed.
    pub neutralized: usize,
    pub rules_version: String,
}

#[derive(Debug, Clone)]
pub struct InputSanitizer {
    version: String,
    max_length: usize,
    short_input_threshold: usize,
    injection: Vec<Regex>,
    food_keywords: Option<Regex>,
    food_patterns: Vec<Regex>,
}

impl InputSanitizer {
    pub fn new(rules: SanitizerRules) -> Result<Self, RulesError> {
        let injection = rules
            .injection_patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        let food_patterns = rules
            .food_patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        let food_keywords = if rules.food_keywords.is_empty() {
            None
        } else {
            let alternation = rules
                .food_keywords
                .iter()
                .map(|k| regex::escape(k.trim()))
                .collect::<Vec<_>>()
                .join("|");
            Some(Regex::new(&format!(r"(?i)\b(?:{alternation})\b"))?)
        };
        Ok(Self {
            version: rules.version,
            max_length: rules.max_length,
            short_input_threshold: rules.short_input_threshold,
            injection,
            food_keywords,
            food_patterns,
        })
    }

    /// Overrides the configured maximum input length.
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn sanitize(&self, raw: &str) -> Result<SanitizedInput, AppError> {
        let reject = |r: InputRejection| Err(AppError::InvalidInput(r));

        let cleaned = collapse_whitespace(raw);
        if cleaned.is_empty() {
            return reject(InputRejection::Empty);
        }
        let length = cleaned.chars().count();
        if length > self.max_length {
            return reject(InputRejection::TooLong {
                max: self.max_length,
                actual: length,
            });
        }

        let mut text = cleaned;
        let mut neutralized = 0;
        for re in &self.injection {
            let hits = re.find_iter(&text).count();
            if hits > 0 {
                neutralized += hits;
                text = re.replace_all(&text, " ").into_owned();
            }
        }
        if neutralized > 0 {
            text = collapse_whitespace(&text)
                .trim_start_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace())
                .to_string();
            if !text.chars().any(char::is_alphanumeric) {
                return reject(InputRejection::OnlyInstructions);
            }
        }

        // Short inputs get the benefit of the doubt unless something was stripped from them.
        let short = text.chars().count() < self.short_input_threshold && neutralized == 0;
        if !short && !self.looks_like_food(&text) {
            return reject(InputRejection::NotFoodRelated);
        }

        debug!(
            rules_version = %self.version,
            neutralized,
            chars = text.chars().count(),
            "input sanitized"
        );
        Ok(SanitizedInput {
            text,
            neutralized,
            rules_version: self.version.clone(),
        })
    }

    fn looks_like_food(&self, text: &str) -> bool {
        self.food_keywords.as_ref().is_some_and(|re| re.is_match(text))
            || self.food_patterns.iter().any(|re| re.is_match(text))
    }
}

/// Drops control characters and collapses runs of whitespace into single spaces.
fn collapse_whitespace(raw: &str) -> String {
    raw.split(|c: char| c.is_whitespace() || c.is_control())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
