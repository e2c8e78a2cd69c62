use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

const EMBEDDED_RULES: &str = include_str!("../../config/sanitizer_rules.json");

/// Versioned vocabulary and denylist the sanitizer is built from.
#[derive(Debug, Clone, Deserialize)]
pub struct SanitizerRules {
    pub version: String,
    pub max_length: usize,
    pub short_input_threshold: usize,
    pub injection_patterns: Vec<String>,
    pub food_keywords: Vec<String>,
    #[serde(default)]
    pub food_patterns: Vec<String>,
}

#[derive(Debug, Error)]
pub enum RulesError {
    #[error("read sanitizer rules: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse sanitizer rules: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid pattern in sanitizer rules: {0}")]
    Pattern(#[from] regex::Error),
}

impl SanitizerRules {
    /// Rules snapshot shipped with the binary.
    pub fn embedded() -> Result<Self, RulesError> {
        Ok(serde_json::from_str(EMBEDDED_RULES)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, RulesError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}
