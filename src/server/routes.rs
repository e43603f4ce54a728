use axum::{Json, extract::State};
use serde_json::Value;
use tracing::info;

use crate::io::{FormatRequest, FormatResponse};
use crate::stages::run_pipeline;

use super::{AppState, error::ApiError};

/// `POST /api/transcript/format`
pub async fn format_transcript(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<FormatResponse>, ApiError> {
    let request = FormatRequest::from_json(&body)?;
    info!(
        "Format request: {} chars, student name {}",
        request.char_count(),
        if request.student_name.is_some() { "given" } else { "absent" }
    );

    let result = run_pipeline(
        state.engine.as_ref(),
        &request.full_text,
        request.student_name.as_deref(),
        &state.config,
    )
    .await?;

    Ok(Json(FormatResponse::from(result)))
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(serde_json::json!({
        "status": "ok",
        "engine": state.engine.name(),
    }))
}
