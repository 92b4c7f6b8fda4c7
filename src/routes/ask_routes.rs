use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use tracing::error;

use crate::agent::PromptResponder;
use crate::errors::AppError;
use crate::models::{AskRequest, AskResponse, ErrorBody};

const MAX_PROMPT_LENGTH: usize = 8000;

pub type Responder = Arc<dyn PromptResponder>;

/// Routes served under `/api/ai`.
pub fn router(responder: Responder) -> Router {
    Router::new()
        .route("/api/ai/ask", post(ask_handler))
        .with_state(responder)
}

/// POST `/api/ai/ask` — `{prompt}` in, `{response}` or `{message}` out
pub async fn ask_handler(
    State(responder): State<Responder>,
    Json(request): Json<AskRequest>,
) -> Response {
    if let Err(err) = validate(&request.prompt) {
        return error_response(&err);
    }

    match responder.respond(&request.prompt).await {
        Ok(text) => Json(AskResponse { response: Some(text) }).into_response(),
        Err(err) => {
            error!("AI request failed: {err}");
            error_response(&err)
        }
    }
}

fn validate(prompt: &str) -> Result<(), AppError> {
    if prompt.trim().is_empty() {
        return Err(AppError::EmptyPrompt);
    }
    if prompt.len() > MAX_PROMPT_LENGTH {
        return Err(AppError::FieldTooLong {
            field_name: "prompt".to_string(),
            max_length: MAX_PROMPT_LENGTH,
            actual_length: prompt.len(),
        });
    }
    Ok(())
}

// ── Helper ────────────────────────────────────────────────────────────────────

// Never 404: clients read that as a missing endpoint.
fn error_response(err: &AppError) -> Response {
    let status = if err.is_validation() {
        StatusCode::BAD_REQUEST
    } else if err.is_agent_unavailable() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(ErrorBody { message: err.to_string() })).into_response()
}
