//! Document and namespace routes: upload, delete, and namespace management.

use axum::{
    extract::{Multipart, Path, State},
    Form, Json,
};
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::models::document::NamespaceInfo;
use crate::services::queue::{self, Job};
use crate::services::{metadata, vector_index};
use crate::AppState;

/// Parsed fields of an upload request.
#[derive(Debug, Default)]
struct UploadFields {
    file_data: Option<Vec<u8>>,
    file_name: String,
    namespace: String,
    file_id: String,
    additional_info: String,
    has_tables_or_graphics: bool,
    number_pages: Option<String>,
}

/// POST /upload — accept a PDF and enqueue processing (multipart).
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    let mut fields = UploadFields::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Multipart error: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                if let Some(fname) = field.file_name() {
                    fields.file_name = fname.to_string();
                }
                fields.file_data = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| AppError::Validation(format!("Failed to read file: {e}")))?
                        .to_vec(),
                );
            }
            "namespace" => fields.namespace = read_text(field, "namespace").await?,
            "file_id" => fields.file_id = read_text(field, "file_id").await?,
            "additional_info" => {
                fields.additional_info = read_text(field, "additional_info").await?
            }
            "has_tables_or_graphics" => {
                let text = read_text(field, "has_tables_or_graphics").await?;
                fields.has_tables_or_graphics = text.eq_ignore_ascii_case("true");
            }
            "number_pages" => fields.number_pages = Some(read_text(field, "number_pages").await?),
            _ => {}
        }
    }

    let Some(data) = fields.file_data else {
        return Err(AppError::Validation(
            "Missing 'file' field in multipart request".to_string(),
        ));
    };
    if fields.namespace.trim().is_empty() || fields.file_id.trim().is_empty() {
        return Err(AppError::Validation(
            "Fields 'namespace' and 'file_id' are required".to_string(),
        ));
    }

    if !fields.file_name.to_lowercase().ends_with(".pdf") {
        return Ok(Json(json!({
            "status": "error",
            "message": "Only PDF files are supported",
            "filename": fields.file_name,
        })));
    }

    // Comma-separated 1-indexed page numbers marked for standalone chunks.
    let special_pages: Vec<i32> = match &fields.number_pages {
        Some(raw) => {
            let parsed: Result<Vec<i32>, _> = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::parse)
                .collect();
            match parsed {
                Ok(pages) => pages,
                Err(_) => {
                    return Ok(Json(json!({
                        "status": "error",
                        "message": "number_pages must be a comma-separated list of integers",
                        "filename": fields.file_name,
                    })));
                }
            }
        }
        None => Vec::new(),
    };

    tracing::info!(
        file = %fields.file_name,
        namespace = %fields.namespace,
        "Upload started"
    );

    let content_base64 = base64::engine::general_purpose::STANDARD.encode(&data);
    let additional_info = if fields.additional_info.trim().is_empty() {
        None
    } else {
        Some(fields.additional_info.clone())
    };

    let task_id = queue::enqueue(
        &state.redis,
        Job::ProcessDocument {
            namespace: fields.namespace.clone(),
            document_id: fields.file_id.clone(),
            file_name: fields.file_name.clone(),
            has_tables_or_graphics: fields.has_tables_or_graphics,
            special_pages: special_pages.clone(),
            additional_info,
            content_base64,
        },
    )
    .await?;

    // Refresh example questions once the new document lands.
    queue::enqueue(
        &state.redis,
        Job::GenerateExampleQuestions {
            namespace: fields.namespace.clone(),
        },
    )
    .await?;

    Ok(Json(json!({
        "status": "success",
        "message": "File upload started",
        "task_id": task_id,
        "filename": fields.file_name,
        "special_pages": special_pages,
    })))
}

async fn read_text(field: axum::extract::multipart::Field<'_>, name: &str) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read {name}: {e}")))
}

#[derive(Debug, Deserialize)]
pub struct DeleteForm {
    pub file_name: String,
    pub namespace: String,
    pub file_id: String,
}

/// POST /delete — remove a document from the index and metadata store.
pub async fn delete(
    State(state): State<AppState>,
    Form(form): Form<DeleteForm>,
) -> Result<Json<Value>, AppError> {
    let chunks_deleted =
        vector_index::delete_document(&state.db, &form.namespace, &form.file_id).await?;
    let metadata_deleted =
        metadata::delete_document(&state.db, &form.namespace, &form.file_id).await?;

    // Derived artifacts go stale after a deletion; regenerate both.
    queue::enqueue(
        &state.redis,
        Job::GenerateAssessment {
            namespace: form.namespace.clone(),
        },
    )
    .await?;
    queue::enqueue(
        &state.redis,
        Job::GenerateExampleQuestions {
            namespace: form.namespace.clone(),
        },
    )
    .await?;

    tracing::info!(
        namespace = %form.namespace,
        document_id = %form.file_id,
        chunks_deleted,
        "Document deleted"
    );

    Ok(Json(json!({
        "status": "success",
        "message": format!(
            "Document {} deletion - chunks: {}, metadata: {}",
            form.file_id, chunks_deleted, metadata_deleted
        ),
    })))
}

#[derive(Debug, Deserialize)]
pub struct CreateNamespaceForm {
    pub namespace: String,
    pub dimension: Option<usize>,
}

/// POST /create_namespace — initialize a namespace.
///
/// The index is namespace-lazy, so this only validates the request; it
/// exists for API compatibility and for checking the embedding dimension.
pub async fn create_namespace(
    State(state): State<AppState>,
    Form(form): Form<CreateNamespaceForm>,
) -> Result<Json<Value>, AppError> {
    if form.namespace.trim().is_empty() {
        return Err(AppError::Validation("namespace must not be empty".to_string()));
    }
    let dimension = form.dimension.unwrap_or(state.config.embedding_dimension);
    if dimension != state.config.embedding_dimension {
        return Err(AppError::Validation(format!(
            "dimension {} does not match the configured embedding dimension {}",
            dimension, state.config.embedding_dimension
        )));
    }

    Ok(Json(json!({
        "status": "success",
        "message": format!("Namespace {} created/initialized successfully", form.namespace),
        "dimension": dimension,
    })))
}

#[derive(Debug, Deserialize)]
pub struct DeleteNamespaceForm {
    pub namespace: String,
}

/// POST /delete_namespace — remove all data belonging to a namespace.
///
/// Succeeds even when the namespace does not exist.
pub async fn delete_namespace(
    State(state): State<AppState>,
    Form(form): Form<DeleteNamespaceForm>,
) -> Result<Json<Value>, AppError> {
    let chunks_deleted = vector_index::delete_namespace(&state.db, &form.namespace).await?;
    metadata::delete_namespace(&state.db, &form.namespace).await?;
    state.chat.reset().await;

    tracing::info!(namespace = %form.namespace, chunks_deleted, "Namespace deleted");

    Ok(Json(json!({
        "status": "success",
        "message": format!("Namespace {} deletion process completed", form.namespace),
        "chunks_deleted": chunks_deleted,
    })))
}

/// GET /namespace_info/{namespace} — document metadata overview.
pub async fn namespace_info(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> Result<Json<NamespaceInfo>, AppError> {
    let documents = metadata::get_documents(&state.db, &namespace).await?;
    let project_info = metadata::get_project_info(&state.db, &namespace).await?;

    Ok(Json(NamespaceInfo {
        status: "success".to_string(),
        namespace,
        document_count: documents.len(),
        documents,
        project_info,
    }))
}
