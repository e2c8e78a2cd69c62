use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::sessions::SessionStatus;

/// Why a piece of caller input was refused.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum InputRejection {
    #[error("input is empty")]
    Empty,
    #[error("input is {actual} characters, the limit is {max}")]
    TooLong { max: usize, actual: usize },
    #[error("input does not look like a food or meal description")]
    NotFoodRelated,
    #[error("input contains only disallowed instructions")]
    OnlyInstructions,
    #[error("{field}: {message}")]
    Field {
        field: &'static str,
        message: String,
    },
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid input: {0}")]
    InvalidInput(InputRejection),

    #[error("no dishes could be extracted: {reason}")]
    ExtractionFailed { reason: String },

    #[error("parsing was cancelled: {reason}")]
    Cancelled { reason: String },

    #[error("session {session_id} was already committed to the food log")]
    AlreadyMaterialized { session_id: Uuid },

    #[error("{resource} not found")]
    NotFound { resource: &'static str },

    #[error("session is {status}, expected {expected}")]
    InvalidState {
        status: SessionStatus,
        expected: &'static str,
    },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Caller-facing description of a terminal failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorReport {
    pub code: String,
    pub title: String,
    pub message: String,
    pub suggestions: Vec<String>,
}

impl AppError {
    pub fn not_found(resource: &'static str) -> Self {
        AppError::NotFound { resource }
    }

    pub fn field(field: &'static str, message: impl Into<String>) -> Self {
        AppError::InvalidInput(InputRejection::Field {
            field,
            message: message.into(),
        })
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidInput(_) => "INVALID_INPUT",
            AppError::ExtractionFailed { .. } => "EXTRACTION_FAILED",
            AppError::Cancelled { .. } => "CANCELLED",
            AppError::AlreadyMaterialized { .. } => "ALREADY_MATERIALIZED",
            AppError::NotFound { .. } => "NOT_FOUND",
            AppError::InvalidState { .. } => "INVALID_STATE",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::ExtractionFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Cancelled { .. } => StatusCode::CONFLICT,
            AppError::AlreadyMaterialized { .. } => StatusCode::CONFLICT,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::InvalidState { .. } => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn report(&self) -> ErrorReport {
        let (title, suggestions): (&str, &[&str]) = match self {
            AppError::InvalidInput(InputRejection::Empty) => (
                "Nothing to analyze",
                &["Describe what you ate, for example \"2 eggs and toast for breakfast\"."],
            ),
            AppError::InvalidInput(InputRejection::TooLong { .. }) => (
                "Description too long",
                &[
                    "Shorten the description to the foods and amounts.",
                    "Log large meals in several smaller entries.",
                ],
            ),
            AppError::InvalidInput(InputRejection::NotFoodRelated) => (
                "That doesn't look like a meal",
                &[
                    "Mention the foods you ate, e.g. \"a bowl of rice with chicken\".",
                    "Include amounts such as grams, cups or pieces.",
                ],
            ),
            AppError::InvalidInput(InputRejection::OnlyInstructions) => (
                "Unsupported request",
                &["Only describe the food you ate; instructions are ignored."],
            ),
            AppError::InvalidInput(InputRejection::Field { .. }) => (
                "Invalid value",
                &["Check the highlighted field and try again."],
            ),
            AppError::ExtractionFailed { .. } => (
                "We couldn't find any food",
                &[
                    "List each food separately, e.g. \"oatmeal, banana, coffee\".",
                    "Try again in a moment if the problem persists.",
                ],
            ),
            AppError::Cancelled { .. } => (
                "Parsing cancelled",
                &["Submit the description again to restart parsing."],
            ),
            AppError::AlreadyMaterialized { .. } => (
                "Already logged",
                &["Open your food log to review or delete these entries."],
            ),
            AppError::NotFound { .. } => (
                "Not found",
                &["Check the identifier, or create the resource first."],
            ),
            AppError::InvalidState { .. } => (
                "Not ready yet",
                &["Wait until parsing has completed, then try again."],
            ),
            AppError::Internal(_) => (
                "Something went wrong",
                &["Try again in a moment."],
            ),
        };
        let message = match self {
            // internals stay in the logs
            AppError::Internal(_) => "An unexpected error occurred.".to_string(),
            other => other.to_string(),
        };
        ErrorReport {
            code: self.code().to_string(),
            title: title.to_string(),
            message,
            suggestions: suggestions.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Internal(e) = &self {
            tracing::error!(error = %e, "internal error");
        }
        (self.status_code(), Json(self.report())).into_response()
    }
}
