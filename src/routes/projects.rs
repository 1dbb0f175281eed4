//! Project info routes.
//!
//! Project names double as namespace identifiers; the info text ends up in
//! the document overview given to the answering pipeline.

use axum::{
    extract::{Query, State},
    Form, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use crate::errors::AppError;
use crate::services::metadata;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct SetProjectInfoForm {
    #[validate(length(min = 1, message = "project_name must not be empty"))]
    pub project_name: String,
    pub info: String,
}

/// POST /set_project_info — store free-form project context.
pub async fn set_project_info(
    State(state): State<AppState>,
    Form(form): Form<SetProjectInfoForm>,
) -> Result<Json<Value>, AppError> {
    form.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    metadata::set_project_info(&state.db, &form.project_name, &form.info).await?;
    tracing::info!(project = %form.project_name, "Project info updated");

    Ok(Json(json!({
        "status": "success",
        "message": format!("Project info saved for {}", form.project_name),
    })))
}

#[derive(Debug, Deserialize)]
pub struct GetProjectInfoQuery {
    pub project_name: String,
}

/// GET /get_project_info?project_name=... — fetch stored project context.
pub async fn get_project_info(
    State(state): State<AppState>,
    Query(query): Query<GetProjectInfoQuery>,
) -> Result<Json<Value>, AppError> {
    match metadata::get_project_info(&state.db, &query.project_name).await? {
        Some(info) => Ok(Json(json!({
            "status": "success",
            "project_name": query.project_name,
            "info": info,
        }))),
        None => Ok(Json(json!({
            "status": "not_found",
            "message": format!("No project info found for {}", query.project_name),
        }))),
    }
}
