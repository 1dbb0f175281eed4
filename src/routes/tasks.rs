//! Background task routes: triggering jobs and polling their status.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Form, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::task::TaskState;
use crate::services::queue::{self, Job};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct TriggerAssessmentForm {
    pub namespace: String,
}

/// POST /trigger_assessment — regenerate the namespace summary in background.
pub async fn trigger_assessment(
    State(state): State<AppState>,
    Form(form): Form<TriggerAssessmentForm>,
) -> Result<Json<Value>, AppError> {
    if form.namespace.trim().is_empty() {
        return Err(AppError::Validation("namespace must not be empty".to_string()));
    }

    let task_id = queue::enqueue(
        &state.redis,
        Job::GenerateAssessment {
            namespace: form.namespace.clone(),
        },
    )
    .await?;

    Ok(Json(json!({
        "status": "success",
        "message": format!("Assessment generation started for namespace {}", form.namespace),
        "task_id": task_id,
    })))
}

/// GET /test_worker — enqueue a ping job to verify the worker is consuming.
pub async fn test_worker(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let task_id = queue::enqueue(&state.redis, Job::Ping).await?;
    Ok(Json(json!({
        "status": "success",
        "message": "Test task enqueued",
        "task_id": task_id,
    })))
}

/// GET /task_status/{task_id} — poll a background task's state.
pub async fn task_status(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let record = queue::fetch_status(&state.redis, task_id).await?;
    let body = record.to_response();

    if record.state == TaskState::Failure {
        return Ok((StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response());
    }
    Ok(Json(body).into_response())
}
