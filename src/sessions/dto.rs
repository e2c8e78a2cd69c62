use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo_types::ParsingSession;
use super::state_machine::SessionStatus;

/// Body of `POST /parse-sessions`.
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub text: String,
    /// Hold the request open until parsing finishes. Disconnecting cancels the session.
    #[serde(default)]
    pub wait: bool,
}

#[derive(Debug, Serialize)]
pub struct SubmittedResponse {
    pub session_id: Uuid,
    pub status: SessionStatus,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    #[serde(flatten)]
    pub session: ParsingSession,
    pub error_message: Option<String>,
}

impl From<ParsingSession> for SessionResponse {
    fn from(session: ParsingSession) -> Self {
        let error_message = session.error_message().map(str::to_owned);
        Self {
            session,
            error_message,
        }
    }
}
