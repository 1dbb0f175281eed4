//! Document processing pipeline: extract, chunk, summarize, embed, index.
//!
//! Runs inside the background worker; progress is reported to the task
//! record between stages so `GET /task_status/{id}` can show it.

use serde::Serialize;
use sqlx::PgPool;

use crate::errors::AppError;
use crate::services::llm::LlmClient;
use crate::services::queue::JobContext;
use crate::services::vector_index::IndexedChunk;
use crate::services::{chunker, extraction, metadata, vector_index};

/// Chunk texts sent per embeddings request.
const EMBED_BATCH_SIZE: usize = 64;

/// Characters of document text given to the summarization prompt.
const SUMMARY_EXCERPT_CHARS: usize = 6000;

const SUMMARY_SYSTEM: &str = "\
You summarize documents. Write a short paragraph (3-5 sentences) describing \
what the document covers, in the document's own language.";

/// A document processing request, decoded from the queue payload.
#[derive(Debug)]
pub struct DocumentJob {
    pub namespace: String,
    pub document_id: String,
    pub file_name: String,
    pub has_tables_or_graphics: bool,
    pub special_pages: Vec<i32>,
    pub additional_info: Option<String>,
    pub data: Vec<u8>,
}

/// Result payload stored on the task record after a successful run.
#[derive(Debug, Serialize)]
pub struct ProcessOutcome {
    pub message: String,
    pub chunks: usize,
    pub index_status: String,
    pub metadata_status: String,
    pub file: String,
}

/// Run the full pipeline for one uploaded document.
///
/// On any stage failure the document's metadata row is marked `Failed`
/// before the error propagates to the task record.
pub async fn process_document(
    pool: &PgPool,
    llm: &LlmClient,
    job: &DocumentJob,
    ctx: &mut JobContext,
) -> Result<ProcessOutcome, AppError> {
    metadata::upsert_document(
        pool,
        &metadata::DocumentUpsert {
            namespace: &job.namespace,
            document_id: &job.document_id,
            name: &job.file_name,
            summary: "",
            chunk_count: 0,
            status: "Processing",
            processing: true,
            progress: 0,
            additional_info: job.additional_info.as_deref(),
        },
    )
    .await?;

    match run_pipeline(pool, llm, job, ctx).await {
        Ok(outcome) => Ok(outcome),
        Err(e) => {
            if let Err(status_err) = metadata::update_document_status(
                pool,
                &job.namespace,
                &job.document_id,
                "Failed",
                false,
                0,
            )
            .await
            {
                tracing::error!(
                    namespace = %job.namespace,
                    document_id = %job.document_id,
                    error = %status_err,
                    "Failed to mark document as failed"
                );
            }
            Err(e)
        }
    }
}

async fn run_pipeline(
    pool: &PgPool,
    llm: &LlmClient,
    job: &DocumentJob,
    ctx: &mut JobContext,
) -> Result<ProcessOutcome, AppError> {
    ctx.progress(10, "Extracting text").await?;
    let pages = extraction::extract_pages(&job.data)?;

    ctx.progress(30, "Chunking").await?;
    let chunks = chunker::chunk_pages(&pages, job.has_tables_or_graphics, &job.special_pages);
    if chunks.is_empty() {
        return Err(AppError::Extraction(
            "document contains no extractable text".to_string(),
        ));
    }

    ctx.progress(45, "Summarizing").await?;
    let full_text: String = pages
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    let excerpt: String = full_text.chars().take(SUMMARY_EXCERPT_CHARS).collect();
    let summary = llm.complete(SUMMARY_SYSTEM, &excerpt).await?;

    ctx.progress(60, "Embedding chunks").await?;
    let mut indexed = Vec::with_capacity(chunks.len());
    for (batch_start, batch) in chunks.chunks(EMBED_BATCH_SIZE).enumerate() {
        let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
        let embeddings = llm.embed(&texts).await?;
        for (i, (chunk, embedding)) in batch.iter().zip(embeddings).enumerate() {
            indexed.push(IndexedChunk {
                ordinal: (batch_start * EMBED_BATCH_SIZE + i) as i32,
                content: chunk.content.clone(),
                pages: chunk.pages.clone(),
                embedding,
            });
        }
    }

    ctx.progress(80, "Indexing").await?;
    let inserted =
        vector_index::upsert_chunks(pool, &job.namespace, &job.document_id, &indexed).await?;

    metadata::upsert_document(
        pool,
        &metadata::DocumentUpsert {
            namespace: &job.namespace,
            document_id: &job.document_id,
            name: &job.file_name,
            summary: &summary,
            chunk_count: inserted as i32,
            status: "Ready",
            processing: false,
            progress: 100,
            additional_info: job.additional_info.as_deref(),
        },
    )
    .await?;

    tracing::info!(
        namespace = %job.namespace,
        document_id = %job.document_id,
        chunks = inserted,
        "Document processed"
    );

    Ok(ProcessOutcome {
        message: format!("Document {} processed successfully", job.file_name),
        chunks: inserted,
        index_status: "success".to_string(),
        metadata_status: "success".to_string(),
        file: job.file_name.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_serializes_task_result_shape() {
        let outcome = ProcessOutcome {
            message: "Document syllabus.pdf processed successfully".to_string(),
            chunks: 14,
            index_status: "success".to_string(),
            metadata_status: "success".to_string(),
            file: "syllabus.pdf".to_string(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["chunks"], 14);
        assert_eq!(json["index_status"], "success");
        assert_eq!(json["file"], "syllabus.pdf");
    }
}
