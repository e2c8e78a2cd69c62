use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
}

/// Per-stage limits for the parsing pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub extract_timeout: Duration,
    /// Applied to each dish lookup separately.
    pub resolve_timeout: Duration,
    pub analyze_timeout: Duration,
    /// Process-wide cap on concurrent dish lookups.
    pub resolve_concurrency: usize,
    pub max_input_chars: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            extract_timeout: Duration::from_secs(15),
            resolve_timeout: Duration::from_secs(10),
            analyze_timeout: Duration::from_secs(15),
            resolve_concurrency: 4,
            max_input_chars: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionProvider {
    Http,
    Heuristic,
}

impl FromStr for ExtractionProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(ExtractionProvider::Http),
            "heuristic" => Ok(ExtractionProvider::Heuristic),
            other => anyhow::bail!("unknown EXTRACTION_PROVIDER `{other}`"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    pub provider: ExtractionProvider,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    /// HTTP client timeout; stage timeouts in [`PipelineConfig`] still apply on top.
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `None` keeps everything in process memory.
    pub database_url: Option<String>,
    pub jwt: JwtConfig,
    pub pipeline: PipelineConfig,
    pub extraction: ExtractionConfig,
    /// Relative width of the "adequate" band around each food-bank target.
    pub adequate_band: f64,
    pub sanitizer_rules_path: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty());
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "nutrilog".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "nutrilog-users".into()),
        };

        let defaults = PipelineConfig::default();
        let pipeline = PipelineConfig {
            extract_timeout: secs("EXTRACT_TIMEOUT_SECS", defaults.extract_timeout),
            resolve_timeout: secs("RESOLVE_TIMEOUT_SECS", defaults.resolve_timeout),
            analyze_timeout: secs("ANALYZE_TIMEOUT_SECS", defaults.analyze_timeout),
            resolve_concurrency: parsed("RESOLVE_CONCURRENCY")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.resolve_concurrency),
            max_input_chars: parsed("MAX_INPUT_CHARS"),
        };

        let provider = match std::env::var("EXTRACTION_PROVIDER") {
            Ok(v) => v.parse()?,
            Err(_) => ExtractionProvider::Heuristic,
        };
        let extraction = ExtractionConfig {
            provider,
            base_url: std::env::var("EXTRACTION_BASE_URL").ok(),
            api_key: std::env::var("EXTRACTION_API_KEY").ok(),
            request_timeout: secs("EXTRACTION_HTTP_TIMEOUT_SECS", Duration::from_secs(30)),
        };

        let adequate_band = parsed("FOOD_BANK_ADEQUATE_BAND")
            .filter(|b: &f64| (0.0..1.0).contains(b))
            .unwrap_or(0.10);

        Ok(Self {
            database_url,
            jwt,
            pipeline,
            extraction,
            adequate_band,
            sanitizer_rules_path: std::env::var("SANITIZER_RULES_PATH").ok().map(PathBuf::from),
        })
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            database_url: None,
            jwt: JwtConfig {
                secret: "test".into(),
                issuer: "test".into(),
                audience: "test".into(),
            },
            pipeline: PipelineConfig::default(),
            extraction: ExtractionConfig {
                provider: ExtractionProvider::Heuristic,
                base_url: None,
                api_key: None,
                request_timeout: Duration::from_secs(5),
            },
            adequate_band: 0.10,
            sanitizer_rules_path: None,
        }
    }
}

fn parsed<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

fn secs(key: &str, default: Duration) -> Duration {
    parsed::<u64>(key)
        .map(Duration::from_secs)
        .unwrap_or(default)
}
