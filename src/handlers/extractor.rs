//! JSON extractor with the gateway's stable validation error
//!
//! Every way a chat request body can be unusable (bad JSON syntax, wrong
//! shape, missing content type, failed field validation) collapses to the
//! same 400 response. The concrete rejection detail goes to the log, not
//! the client.

use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
};
use serde::de::DeserializeOwned;

use crate::chat::INVALID_MESSAGES_ERROR;
use crate::error::AppError;

/// JSON extractor whose rejection is the gateway's stable validation error
///
/// Use in place of `axum::Json` for the chat endpoint.
pub struct ChatJson<T>(pub T);

impl<S, T> FromRequest<S> for ChatJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ChatJson(value)),
            Err(rejection) => {
                tracing::debug!(
                    detail = %rejection.body_text(),
                    "rejecting unusable chat request body"
                );
                Err(AppError::Validation(INVALID_MESSAGES_ERROR.to_string()))
            }
        }
    }
}
