use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

use super::repo_types::{DishResult, ParsingSession};
use crate::error::AppError;
use crate::extraction::{bounded_confidence, DishDescriptor, MealAnalysis};
use crate::nutrition::MealType;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    Extracting,
    Resolving,
    Analyzing,
    Completed,
    Failed,
}

impl SessionStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Extracting => "extracting",
            SessionStatus::Resolving => "resolving",
            SessionStatus::Analyzing => "analyzing",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Failed)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "pending" => SessionStatus::Pending,
            "extracting" => SessionStatus::Extracting,
            "resolving" => SessionStatus::Resolving,
            "analyzing" => SessionStatus::Analyzing,
            "completed" => SessionStatus::Completed,
            "failed" => SessionStatus::Failed,
            other => anyhow::bail!("unknown session status `{other}`"),
        })
    }
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    Start,
    Extracted {
        dishes: Vec<DishDescriptor>,
        consumed_at: Option<OffsetDateTime>,
        meal_type: Option<MealType>,
    },
    ExtractionFailed(String),
    Resolved(Vec<DishResult>),
    Analyzed(Option<MealAnalysis>),
    Cancelled(String),
    /// The pipeline itself broke (storage, internal bug).
    Aborted(String),
}

impl SessionEvent {
    fn name(&self) -> &'static str {
        match self {
            SessionEvent::Start => "start",
            SessionEvent::Extracted { .. } => "extracted",
            SessionEvent::ExtractionFailed(_) => "extraction_failed",
            SessionEvent::Resolved(_) => "resolved",
            SessionEvent::Analyzed(_) => "analyzed",
            SessionEvent::Cancelled(_) => "cancelled",
            SessionEvent::Aborted(_) => "aborted",
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum TransitionError {
    #[error("cannot apply `{event}` to a {from} session")]
    Illegal {
        from: SessionStatus,
        event: &'static str,
    },
    #[error("resolution returned {got} results for {expected} dishes")]
    IncompleteResolution { expected: usize, got: usize },
}

/// The only way a session's status changes.
pub fn advance(
    mut session: ParsingSession,
    event: SessionEvent,
) -> Result<ParsingSession, TransitionError> {
    use SessionEvent as E;
    use SessionStatus as S;

    let now = OffsetDateTime::now_utc();
    let illegal = |from: SessionStatus, event: &SessionEvent| TransitionError::Illegal {
        from,
        event: event.name(),
    };

    match (session.status, event) {
        (S::Pending, E::Start) => {
            session.status = S::Extracting;
        }
        (
            S::Extracting,
            E::Extracted {
                dishes,
                consumed_at,
                meal_type,
            },
        ) => {
            if dishes.is_empty() {
                fail(
                    &mut session,
                    AppError::ExtractionFailed {
                        reason: "no dishes were recognised in the description".into(),
                    },
                    now,
                );
            } else {
                session.dishes = dishes;
                session.extracted_datetime = consumed_at;
                session.meal_type = meal_type;
                session.status = S::Resolving;
            }
        }
        (S::Extracting, E::ExtractionFailed(reason)) => {
            fail(&mut session, AppError::ExtractionFailed { reason }, now);
        }
        (S::Resolving, E::Resolved(results)) => {
            if results.len() != session.dishes.len() {
                return Err(TransitionError::IncompleteResolution {
                    expected: session.dishes.len(),
                    got: results.len(),
                });
            }
            session.parsed_dishes = results;
            session.status = S::Analyzing;
        }
        (S::Analyzing, E::Analyzed(analysis)) => {
            session.meal_analysis = analysis;
            session.confidence_score = Some(mean_confidence(&session.parsed_dishes));
            session.status = S::Completed;
            session.completed_at = Some(now);
        }
        (from, E::Cancelled(reason)) if !from.is_terminal() => {
            fail(&mut session, AppError::Cancelled { reason }, now);
        }
        (from, E::Aborted(reason)) if !from.is_terminal() => {
            fail(&mut session, AppError::Internal(anyhow::anyhow!(reason)), now);
        }
        (from, event) => return Err(illegal(from, &event)),
    }

    session.updated_at = now;
    Ok(session)
}

fn fail(session: &mut ParsingSession, error: AppError, now: OffsetDateTime) {
    session.status = SessionStatus::Failed;
    session.error = Some(error.report());
    session.completed_at = Some(now);
}

fn mean_confidence(dishes: &[DishResult]) -> f64 {
    if dishes.is_empty() {
        return 0.0;
    }
    let sum: f64 = dishes.iter().map(|d| bounded_confidence(d.confidence)).sum();
    sum / dishes.len() as f64
}
