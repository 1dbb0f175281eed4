//! Document and namespace metadata store.
//!
//! Holds per-namespace document records, project info, namespace summary
//! bullet points, and example question storage with a generation status.

use sqlx::PgPool;

use crate::errors::AppError;
use crate::models::document::{DocumentMetadata, QuestionAnswer, QuestionStatus};

/// Fields written when a document finishes (or fails) processing.
#[derive(Debug, Clone)]
pub struct DocumentUpsert<'a> {
    pub namespace: &'a str,
    pub document_id: &'a str,
    pub name: &'a str,
    pub summary: &'a str,
    pub chunk_count: i32,
    pub status: &'a str,
    pub processing: bool,
    pub progress: i32,
    pub additional_info: Option<&'a str>,
}

/// Insert or update a document's metadata row.
pub async fn upsert_document(pool: &PgPool, doc: &DocumentUpsert<'_>) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO documents
            (namespace, document_id, name, summary, chunk_count, status,
             processing, progress, additional_info)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (namespace, document_id) DO UPDATE SET
            name = EXCLUDED.name,
            summary = EXCLUDED.summary,
            chunk_count = EXCLUDED.chunk_count,
            status = EXCLUDED.status,
            processing = EXCLUDED.processing,
            progress = EXCLUDED.progress,
            additional_info = EXCLUDED.additional_info
        "#,
    )
    .bind(doc.namespace)
    .bind(doc.document_id)
    .bind(doc.name)
    .bind(doc.summary)
    .bind(doc.chunk_count)
    .bind(doc.status)
    .bind(doc.processing)
    .bind(doc.progress)
    .bind(doc.additional_info)
    .execute(pool)
    .await?;
    Ok(())
}

/// Update only the processing status fields of a document.
pub async fn update_document_status(
    pool: &PgPool,
    namespace: &str,
    document_id: &str,
    status: &str,
    processing: bool,
    progress: i32,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE documents
        SET status = $4, processing = $5, progress = $6
        WHERE namespace = $1 AND document_id = $2
        "#,
    )
    .bind(namespace)
    .bind(document_id)
    .bind(status)
    .bind(processing)
    .bind(progress)
    .execute(pool)
    .await?;
    Ok(())
}

/// List a namespace's documents, oldest first.
pub async fn get_documents(
    pool: &PgPool,
    namespace: &str,
) -> Result<Vec<DocumentMetadata>, AppError> {
    let docs = sqlx::query_as::<_, DocumentMetadata>(
        "SELECT * FROM documents WHERE namespace = $1 ORDER BY created_at",
    )
    .bind(namespace)
    .fetch_all(pool)
    .await?;
    Ok(docs)
}

/// Delete a document's metadata row. Returns whether a row existed.
pub async fn delete_document(
    pool: &PgPool,
    namespace: &str,
    document_id: &str,
) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM documents WHERE namespace = $1 AND document_id = $2")
        .bind(namespace)
        .bind(document_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Delete all metadata belonging to a namespace.
pub async fn delete_namespace(pool: &PgPool, namespace: &str) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;
    for table in [
        "documents",
        "namespace_summaries",
        "example_questions",
        "projects",
    ] {
        sqlx::query(&format!("DELETE FROM {table} WHERE namespace = $1"))
            .bind(namespace)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    Ok(())
}

/// Store or replace a project's info text.
pub async fn set_project_info(pool: &PgPool, namespace: &str, info: &str) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO projects (namespace, info, updated_at)
        VALUES ($1, $2, NOW())
        ON CONFLICT (namespace) DO UPDATE SET info = EXCLUDED.info, updated_at = NOW()
        "#,
    )
    .bind(namespace)
    .bind(info)
    .execute(pool)
    .await?;
    Ok(())
}

/// Fetch a project's info text.
pub async fn get_project_info(pool: &PgPool, namespace: &str) -> Result<Option<String>, AppError> {
    let info = sqlx::query_scalar::<_, String>("SELECT info FROM projects WHERE namespace = $1")
        .bind(namespace)
        .fetch_optional(pool)
        .await?;
    Ok(info)
}

/// Store or replace a namespace's summary bullet points.
pub async fn set_namespace_summary(
    pool: &PgPool,
    namespace: &str,
    bullet_points: &[String],
) -> Result<(), AppError> {
    let json = serde_json::to_value(bullet_points)
        .map_err(|e| AppError::Internal(format!("failed to serialize summary: {e}")))?;
    sqlx::query(
        r#"
        INSERT INTO namespace_summaries (namespace, bullet_points, updated_at)
        VALUES ($1, $2, NOW())
        ON CONFLICT (namespace) DO UPDATE
            SET bullet_points = EXCLUDED.bullet_points, updated_at = NOW()
        "#,
    )
    .bind(namespace)
    .bind(json)
    .execute(pool)
    .await?;
    Ok(())
}

/// Set the example-question generation status, preserving stored questions.
pub async fn set_question_status(
    pool: &PgPool,
    namespace: &str,
    status: QuestionStatus,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO example_questions (namespace, status, updated_at)
        VALUES ($1, $2, NOW())
        ON CONFLICT (namespace) DO UPDATE SET status = EXCLUDED.status, updated_at = NOW()
        "#,
    )
    .bind(namespace)
    .bind(status.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

/// Store generated questions and mark generation completed.
pub async fn set_questions(
    pool: &PgPool,
    namespace: &str,
    questions: &[QuestionAnswer],
) -> Result<(), AppError> {
    let json = serde_json::to_value(questions)
        .map_err(|e| AppError::Internal(format!("failed to serialize questions: {e}")))?;
    sqlx::query(
        r#"
        INSERT INTO example_questions (namespace, status, questions, updated_at)
        VALUES ($1, 'completed', $2, NOW())
        ON CONFLICT (namespace) DO UPDATE
            SET status = 'completed', questions = EXCLUDED.questions, updated_at = NOW()
        "#,
    )
    .bind(namespace)
    .bind(json)
    .execute(pool)
    .await?;
    Ok(())
}

/// Fetch stored questions with their generation status, if any exist.
pub async fn get_questions(
    pool: &PgPool,
    namespace: &str,
) -> Result<Option<(QuestionStatus, Vec<QuestionAnswer>)>, AppError> {
    let row = sqlx::query_as::<_, (String, serde_json::Value)>(
        "SELECT status, questions FROM example_questions WHERE namespace = $1",
    )
    .bind(namespace)
    .fetch_optional(pool)
    .await?;

    let Some((status, questions)) = row else {
        return Ok(None);
    };
    let status: QuestionStatus = status
        .parse()
        .map_err(|e: String| AppError::Internal(e))?;
    let questions: Vec<QuestionAnswer> = serde_json::from_value(questions)
        .map_err(|e| AppError::Internal(format!("stored questions are malformed: {e}")))?;
    Ok(Some((status, questions)))
}
