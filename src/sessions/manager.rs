use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use time::{OffsetDateTime, UtcOffset};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::repo_types::{DishResult, ParsingSession, PayloadSource};
use super::state_machine::{advance, SessionEvent, SessionStatus};
use crate::config::PipelineConfig;
use crate::error::AppError;
use crate::extraction::{
    bounded_confidence, hints, DishDescriptor, ExtractionRequest, NutritionExtractionService, ResolvedNutrition,
};
use crate::nutrition::{fallback, MealType};
use crate::sanitizer::InputSanitizer;
use crate::store::Store;

/// How one dish lookup ended.
#[derive(Debug)]
pub enum ResolutionOutcome {
    Resolved(ResolvedNutrition),
    /// Lookup was unusable; the fallback estimate is used instead.
    Degraded(String),
}

/// A freshly created session and the task driving it.
pub struct SubmittedSession {
    pub session: ParsingSession,
    pub task: JoinHandle<ParsingSession>,
    cancellation: CancellationToken,
}

impl SubmittedSession {
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }
}

/// Cancels the session when dropped unless disarmed.
struct CancelOnDrop(Option<CancellationToken>);

impl CancelOnDrop {
    fn disarm(mut self) {
        self.0 = None;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if let Some(token) = self.0.take() {
            token.cancel();
        }
    }
}

#[derive(Clone)]
pub struct ParsingSessionManager {
    store: Arc<dyn Store>,
    extractor: Arc<dyn NutritionExtractionService>,
    sanitizer: Arc<InputSanitizer>,
    config: Arc<PipelineConfig>,
    lookups: Arc<Semaphore>,
    running: Arc<Mutex<HashMap<Uuid, CancellationToken>>>,
}

impl ParsingSessionManager {
    pub fn new(
        store: Arc<dyn Store>,
        extractor: Arc<dyn NutritionExtractionService>,
        sanitizer: InputSanitizer,
        config: PipelineConfig,
    ) -> Self {
        let permits = config.resolve_concurrency.max(1);
        Self {
            store,
            extractor,
            sanitizer: Arc::new(sanitizer),
            config: Arc::new(config),
            lookups: Arc::new(Semaphore::new(permits)),
            running: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Sanitizes `raw_text`, stores a pending session and starts parsing it in the background.
    #[instrument(skip(self, raw_text), fields(chars = raw_text.chars().count()))]
    pub async fn submit(
        &self,
        owner: Uuid,
        raw_text: &str,
        utc_offset: UtcOffset,
    ) -> Result<SubmittedSession, AppError> {
        let sanitized = self.sanitizer.sanitize(raw_text)?;
        if sanitized.neutralized > 0 {
            warn!(%owner, neutralized = sanitized.neutralized, "neutralized instructions in meal text");
        }

        let session = ParsingSession::new(owner, raw_text.to_string(), sanitized.text);
        let token = CancellationToken::new();
        {
            let mut running = self.running.lock().await;
            self.store.insert_session(&session).await?;
            running.insert(session.id, token.clone());
        }

        let task = tokio::spawn(self.clone().run(session.clone(), token.clone(), utc_offset));
        info!(session_id = %session.id, %owner, "parsing session submitted");
        Ok(SubmittedSession {
            session,
            task,
            cancellation: token,
        })
    }

    /// Submits and waits for the terminal session. Dropping the future cancels parsing.
    pub async fn parse(
        &self,
        owner: Uuid,
        raw_text: &str,
        utc_offset: UtcOffset,
    ) -> Result<ParsingSession, AppError> {
        let submitted = self.submit(owner, raw_text, utc_offset).await?;
        let guard = CancelOnDrop(Some(submitted.cancellation.clone()));
        let session = submitted
            .task
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("parsing task failed: {e}")))?;
        guard.disarm();
        Ok(session)
    }

    pub async fn get(&self, owner: Uuid, id: Uuid) -> Result<ParsingSession, AppError> {
        self.store
            .get_session(owner, id)
            .await?
            .ok_or_else(|| AppError::not_found("parsing session"))
    }

    /// Requests cancellation. The running stage finishes and its result is discarded.
    #[instrument(skip(self))]
    pub async fn cancel(&self, owner: Uuid, id: Uuid) -> Result<ParsingSession, AppError> {
        // `run` saves the terminal state before dropping its token, so the read
        // and the token lookup must happen under the same lock.
        let running = self.running.lock().await;
        let session = self.get(owner, id).await?;
        if session.status.is_terminal() {
            return Err(AppError::InvalidState {
                status: session.status,
                expected: "a session that is still parsing",
            });
        }

        if let Some(token) = running.get(&id) {
            token.cancel();
            info!(session_id = %id, "cancellation requested");
            return Ok(session);
        }

        // no live task (e.g. the process restarted mid-parse)
        let session = advance(session, SessionEvent::Cancelled("cancelled by user".into()))
            .map_err(|e| AppError::Internal(e.into()))?;
        self.store.save_session(&session).await?;
        Ok(session)
    }

    async fn run(
        self,
        session: ParsingSession,
        token: CancellationToken,
        utc_offset: UtcOffset,
    ) -> ParsingSession {
        let id = session.id;
        let last_known = session.clone();
        let finished = match self.drive(session, &token, utc_offset).await {
            Ok(s) => s,
            Err(e) => {
                error!(session_id = %id, error = %e, "parsing session aborted");
                self.abort(last_known, e.to_string()).await
            }
        };
        self.running.lock().await.remove(&id);
        info!(
            session_id = %id,
            status = %finished.status,
            dishes = finished.parsed_dishes.len(),
            "parsing session finished"
        );
        finished
    }

    async fn abort(&self, last_known: ParsingSession, reason: String) -> ParsingSession {
        let current = match self.store.get_session(last_known.owner, last_known.id).await {
            Ok(Some(s)) => s,
            _ => last_known,
        };
        if current.status.is_terminal() {
            return current;
        }
        match advance(current.clone(), SessionEvent::Aborted(reason)) {
            Ok(failed) => {
                if let Err(e) = self.store.save_session(&failed).await {
                    error!(session_id = %failed.id, error = %e, "could not persist aborted session");
                }
                failed
            }
            Err(_) => current,
        }
    }

    async fn step(
        &self,
        session: ParsingSession,
        event: SessionEvent,
    ) -> anyhow::Result<ParsingSession> {
        let next = advance(session, event)?;
        self.store.save_session(&next).await?;
        Ok(next)
    }

    async fn drive(
        &self,
        session: ParsingSession,
        token: &CancellationToken,
        utc_offset: UtcOffset,
    ) -> anyhow::Result<ParsingSession> {
        let id = session.id;
        if token.is_cancelled() {
            return self.step(session, cancelled()).await;
        }
        let mut session = self.step(session, SessionEvent::Start).await?;

        // extract
        let started = Instant::now();
        let request = ExtractionRequest {
            text: session.sanitized_input.clone(),
            local_now: OffsetDateTime::now_utc().to_offset(utc_offset),
        };
        let outcome = timeout(
            self.config.extract_timeout,
            self.extractor.extract_dishes(&request),
        )
        .await;
        if token.is_cancelled() {
            return self.step(session, cancelled()).await;
        }
        let event = match outcome {
            Ok(Ok(extraction)) => {
                let consumed_at = extraction
                    .consumed_at
                    .or_else(|| hints::meal_time(&request.text, request.local_now));
                let meal_type = extraction
                    .meal_type
                    .or_else(|| hints::meal_type(&request.text, consumed_at));
                log_stage(id, "extract", started, "ok");
                SessionEvent::Extracted {
                    dishes: extraction.dishes,
                    consumed_at,
                    meal_type,
                }
            }
            Ok(Err(e)) => {
                log_stage(id, "extract", started, "error");
                SessionEvent::ExtractionFailed(e.to_string())
            }
            Err(_) => {
                log_stage(id, "extract", started, "timeout");
                SessionEvent::ExtractionFailed(format!(
                    "extraction timed out after {}s",
                    self.config.extract_timeout.as_secs()
                ))
            }
        };
        session = self.step(session, event).await?;
        if session.status != SessionStatus::Resolving {
            return Ok(session);
        }

        // resolve
        let started = Instant::now();
        let results = self.resolve_all(&session).await;
        let degraded = results
            .iter()
            .filter(|r| r.source == PayloadSource::Fallback)
            .count();
        log_stage(
            id,
            "resolve",
            started,
            if degraded == 0 { "ok" } else { "degraded" },
        );
        if token.is_cancelled() {
            return self.step(session, cancelled()).await;
        }
        session = self.step(session, SessionEvent::Resolved(results)).await?;

        // analyze
        let started = Instant::now();
        let outcome = timeout(
            self.config.analyze_timeout,
            self.extractor.analyze_meal(&session.parsed_dishes),
        )
        .await;
        if token.is_cancelled() {
            return self.step(session, cancelled()).await;
        }
        let analysis = match outcome {
            Ok(Ok(a)) => {
                log_stage(id, "analyze", started, "ok");
                Some(a)
            }
            Ok(Err(e)) => {
                warn!(session_id = %id, error = %e, "meal analysis unavailable");
                log_stage(id, "analyze", started, "error");
                None
            }
            Err(_) => {
                log_stage(id, "analyze", started, "timeout");
                None
            }
        };
        self.step(session, SessionEvent::Analyzed(analysis)).await
    }

    /// Looks up every dish concurrently. Never fails: unusable lookups fall back.
    async fn resolve_all(&self, session: &ParsingSession) -> Vec<DishResult> {
        let mut set = JoinSet::new();
        for (idx, dish) in session.dishes.iter().cloned().enumerate() {
            let extractor = Arc::clone(&self.extractor);
            let lookups = Arc::clone(&self.lookups);
            let limit = self.config.resolve_timeout;
            let session_id = session.id;
            set.spawn(async move {
                let _permit = lookups.acquire_owned().await;
                let started = Instant::now();
                let hint = dish.serving_hint.as_deref();
                let outcome = match timeout(limit, extractor.resolve_nutrition(&dish, hint)).await {
                    Ok(Ok(r)) if fallback::is_degenerate(&dish.name, &r.payload) => {
                        ResolutionOutcome::Degraded("degenerate nutrition payload".into())
                    }
                    Ok(Ok(r)) => ResolutionOutcome::Resolved(r),
                    Ok(Err(e)) => ResolutionOutcome::Degraded(e.to_string()),
                    Err(_) => ResolutionOutcome::Degraded(format!(
                        "lookup timed out after {}s",
                        limit.as_secs()
                    )),
                };
                if let ResolutionOutcome::Degraded(reason) = &outcome {
                    warn!(%session_id, dish = %dish.name, %reason, "using fallback estimate");
                }
                debug!(
                    %session_id,
                    dish = %dish.name,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "dish lookup finished"
                );
                (idx, outcome)
            });
        }

        let mut outcomes: Vec<Option<ResolutionOutcome>> =
            (0..session.dishes.len()).map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, outcome)) => outcomes[idx] = Some(outcome),
                Err(e) => error!(session_id = %session.id, error = %e, "dish lookup task failed"),
            }
        }

        session
            .dishes
            .iter()
            .zip(outcomes)
            .map(|(dish, outcome)| {
                let outcome = outcome
                    .unwrap_or_else(|| ResolutionOutcome::Degraded("lookup task failed".into()));
                dish_result(dish, outcome, session.meal_type)
            })
            .collect()
    }
}

fn cancelled() -> SessionEvent {
    SessionEvent::Cancelled("cancelled before parsing finished".into())
}

fn log_stage(session_id: Uuid, stage: &'static str, started: Instant, outcome: &'static str) {
    info!(
        %session_id,
        stage,
        duration_ms = started.elapsed().as_millis() as u64,
        outcome,
        "pipeline stage finished"
    );
}

pub(crate) fn dish_result(
    dish: &DishDescriptor,
    outcome: ResolutionOutcome,
    session_meal: Option<MealType>,
) -> DishResult {
    let meal_type = dish.meal_type.or(session_meal);
    match outcome {
        ResolutionOutcome::Resolved(r) => DishResult {
            description: dish.name.clone(),
            serving_size: dish.serving_hint.clone(),
            meal_type,
            confidence: bounded_confidence(r.confidence),
            nutrition: r.payload,
            source: PayloadSource::Resolved,
            category: None,
        },
        ResolutionOutcome::Degraded(_) => {
            let estimate = fallback::estimate(&dish.name, dish.serving_hint.as_deref());
            DishResult {
                description: dish.name.clone(),
                serving_size: dish.serving_hint.clone(),
                meal_type,
                confidence: estimate.confidence,
                nutrition: estimate.payload,
                source: PayloadSource::Fallback,
                category: Some(estimate.category),
            }
        }
    }
}
