//! Feedback intake endpoint
//!
//! POST /api/feedback logs whatever the client sent and acknowledges it.
//! Deliberately lenient: a missing, malformed, or empty body is still a
//! success.

use axum::{Json, extract::State, extract::rejection::JsonRejection};
use serde::{Deserialize, Serialize};

use crate::handlers::AppState;
use crate::metrics::{Outcome, Route};

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FeedbackAck {
    pub success: bool,
}

/// POST /api/feedback handler
pub async fn handler(
    State(state): State<AppState>,
    payload: Result<Json<FeedbackRequest>, JsonRejection>,
) -> Json<FeedbackAck> {
    match payload.ok().and_then(|Json(feedback)| feedback.message) {
        Some(message) => tracing::info!(feedback = %message, "feedback received"),
        None => tracing::info!("feedback received without message"),
    }

    state
        .metrics()
        .record_request(Route::Feedback, Outcome::Success);
    Json(FeedbackAck { success: true })
}
