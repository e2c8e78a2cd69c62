use std::sync::Arc;

use crate::config::AppConfig;
use crate::extraction::{self, NutritionExtractionService};
use crate::food_bank::FoodBankAggregator;
use crate::food_logs::LogMaterializer;
use crate::sanitizer::{InputSanitizer, SanitizerRules};
use crate::sessions::ParsingSessionManager;
use crate::store::{MemoryStore, PgStore, Store};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    pub sessions: ParsingSessionManager,
    pub materializer: LogMaterializer,
    pub food_bank: FoodBankAggregator,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;

        let store: Arc<dyn Store> = match config.database_url.as_deref() {
            Some(url) => {
                let store = PgStore::connect(url).await?;
                if let Err(e) = store.migrate().await {
                    tracing::warn!(error = %e, "migrations folder not found or migration failed; continuing");
                }
                Arc::new(store)
            }
            None => {
                tracing::warn!("DATABASE_URL not set; using the in-memory store");
                Arc::new(MemoryStore::new())
            }
        };

        let extractor = extraction::from_config(&config.extraction)?;
        tracing::info!(provider = extractor.name(), "extraction provider ready");

        Self::from_parts(Arc::new(config), store, extractor)
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        store: Arc<dyn Store>,
        extractor: Arc<dyn NutritionExtractionService>,
    ) -> anyhow::Result<Self> {
        let rules = match &config.sanitizer_rules_path {
            Some(path) => SanitizerRules::from_path(path)?,
            None => SanitizerRules::embedded()?,
        };
        let mut sanitizer = InputSanitizer::new(rules)?;
        if let Some(max) = config.pipeline.max_input_chars {
            sanitizer = sanitizer.with_max_length(max);
        }
        tracing::debug!(rules_version = sanitizer.version(), "sanitizer rules loaded");

        let sessions = ParsingSessionManager::new(
            store.clone(),
            extractor,
            sanitizer,
            config.pipeline.clone(),
        );

        Ok(Self {
            materializer: LogMaterializer::new(store.clone()),
            food_bank: FoodBankAggregator::new(store.clone(), config.adequate_band),
            sessions,
            store,
            config,
        })
    }

    /// In-memory state with the offline heuristic extractor.
    #[cfg(test)]
    pub fn fake() -> Self {
        let config = Arc::new(AppConfig::for_tests());
        let store = Arc::new(MemoryStore::new()) as Arc<dyn Store>;
        let extractor = Arc::new(extraction::heuristic::HeuristicExtractionService)
            as Arc<dyn NutritionExtractionService>;
        Self::from_parts(config, store, extractor).expect("fake state")
    }
}
