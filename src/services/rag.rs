//! Retrieval-augmented answering with structured JSON responses.
//!
//! Embeds the question, retrieves the top chunks for the namespace together
//! with their neighbors, and asks the chat model for a JSON reply in the
//! [`StructuredResponse`] shape. Parsing is defensive: a malformed reply
//! degrades to a plain-text answer instead of failing the request.

use sqlx::PgPool;

use crate::errors::AppError;
use crate::models::chat::{ChatMessage, StructuredResponse, CONTEXT_WINDOW};
use crate::models::document::DocumentMetadata;
use crate::services::llm::LlmClient;
use crate::services::{metadata, vector_index};

/// Chunks retrieved per question.
const TOP_K: usize = 5;

const SYSTEM_PROMPT: &str = "\
You are a friendly study advisor with access to a specific set of documents. \
You are honest about your limits.

RULES:
- You only know the documents listed below.
- Say immediately when you have no information on a topic. Never invent facts.
- Answer only from the provided document excerpts.
- For unclear questions, ask one short clarifying question.
- Reply with a single JSON object and nothing else, in this exact shape:
{
  \"answer\": \"your detailed answer\",
  \"document_ids\": [\"ids of the documents you actually used\"],
  \"sources\": [\"verbatim sentences from the excerpts that support the answer\"],
  \"confidence_score\": 0.9,
  \"context_used\": false,
  \"additional_info\": \"extra notes or null\",
  \"pages\": [5, 12]
}
- document_ids and pages must come from the DOC_ID and PAGES markers of the
  excerpts you used; leave them empty if you used none.";

/// Answer a question over a namespace's documents.
pub async fn answer_question(
    pool: &PgPool,
    llm: &LlmClient,
    question: &str,
    namespace: &str,
    history: &[ChatMessage],
) -> Result<StructuredResponse, AppError> {
    let query_embedding = llm
        .embed(&[question.to_string()])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Llm("no embedding returned for question".to_string()))?;

    let hits = vector_index::search(pool, namespace, &query_embedding, TOP_K).await?;

    let mut retrieved_pages: Vec<i32> = Vec::new();
    let mut context_blocks: Vec<String> = Vec::new();
    for (i, hit) in hits.iter().enumerate() {
        retrieved_pages.extend(&hit.pages);
        let adjacent =
            vector_index::adjacent_chunks(pool, namespace, &hit.document_id, hit.ordinal).await?;
        context_blocks.push(render_hit(i + 1, hit, &adjacent));
    }

    let documents = metadata::get_documents(pool, namespace).await?;
    let system = format!("{SYSTEM_PROMPT}\n\n{}", document_overview(&documents));

    let context_used = !history.is_empty();
    let recent = &history[history.len().saturating_sub(CONTEXT_WINDOW)..];
    let user = render_user_prompt(question, recent, &context_blocks);

    tracing::debug!(
        namespace,
        hits = hits.len(),
        history = recent.len(),
        "Answering question"
    );

    let raw = llm.complete(&system, &user).await?;
    Ok(parse_structured_reply(&raw, context_used, &retrieved_pages))
}

/// Label a retrieval hit and its neighbors for the prompt.
fn render_hit(
    index: usize,
    hit: &vector_index::ChunkHit,
    adjacent: &vector_index::AdjacentChunks,
) -> String {
    let mut parts = vec![format!(
        "[DOC_ID: {}] [PAGES: {:?}]",
        hit.document_id, hit.pages
    )];
    if let Some(previous) = &adjacent.previous {
        parts.push(format!("--- EXCERPT {index} CONTEXT BEFORE ---\n{previous}"));
    }
    parts.push(format!("--- EXCERPT {index} MAIN MATCH ---\n{}", hit.content));
    if let Some(next) = &adjacent.next {
        parts.push(format!("--- EXCERPT {index} CONTEXT AFTER ---\n{next}"));
    }
    parts.join("\n")
}

/// Compact listing of the namespace's documents for the system prompt.
pub fn document_overview(documents: &[DocumentMetadata]) -> String {
    if documents.is_empty() {
        return "NO DOCUMENTS AVAILABLE - you currently have no documents in this namespace."
            .to_string();
    }

    let mut lines = vec![format!(
        "AVAILABLE DOCUMENTS ({} total):",
        documents.len()
    )];
    for doc in documents {
        let summary: String = doc.summary.chars().take(150).collect();
        let ellipsis = if doc.summary.chars().count() > 150 { "..." } else { "" };
        let mut line = format!(
            "- ID: {} | Name: {} | Topic: {summary}{ellipsis}",
            doc.document_id, doc.name
        );
        if let Some(info) = &doc.additional_info {
            line.push_str(&format!(" | Note: {info}"));
        }
        lines.push(line);
    }
    lines.join("\n")
}

fn render_user_prompt(
    question: &str,
    history: &[ChatMessage],
    context_blocks: &[String],
) -> String {
    let mut parts = Vec::new();
    if history.is_empty() {
        parts.push("This is the start of the conversation.".to_string());
    } else {
        let rendered: Vec<String> = history
            .iter()
            .map(|m| format!("{}: {}", m.role.to_string().to_uppercase(), m.content))
            .collect();
        parts.push(format!(
            "CONVERSATION SO FAR:\n{}",
            rendered.join("\n")
        ));
    }
    parts.push(format!("CURRENT QUESTION: {question}"));
    if context_blocks.is_empty() {
        parts.push("No relevant document excerpts were found.".to_string());
    } else {
        parts.push(format!(
            "DOCUMENT EXCERPTS:\n{}",
            context_blocks.join("\n\n")
        ));
    }
    parts.join("\n\n")
}

/// Parse the model's reply into a [`StructuredResponse`].
///
/// Extracts the outermost JSON object from the reply; on any parse failure
/// the raw text becomes the answer with a reduced confidence score.
pub fn parse_structured_reply(
    raw: &str,
    context_used: bool,
    retrieved_pages: &[i32],
) -> StructuredResponse {
    let Some(start) = raw.find('{') else {
        return StructuredResponse::fallback(
            raw.to_string(),
            context_used,
            "Reply contained no JSON object".to_string(),
        );
    };
    let Some(end) = raw.rfind('}') else {
        return StructuredResponse::fallback(
            raw.to_string(),
            context_used,
            "Reply contained no JSON object".to_string(),
        );
    };

    let parsed: serde_json::Value = match serde_json::from_str(&raw[start..=end]) {
        Ok(value) => value,
        Err(e) => {
            return StructuredResponse::fallback(
                raw.to_string(),
                context_used,
                format!("JSON parsing failed: {e}"),
            );
        }
    };

    let answer = parsed
        .get("answer")
        .and_then(|v| v.as_str())
        .unwrap_or(raw)
        .to_string();
    let document_ids = string_array(&parsed, "document_ids");
    let sources = string_array(&parsed, "sources");
    let confidence_score = parsed
        .get("confidence_score")
        .and_then(|v| v.as_f64())
        .map(|v| v as f32)
        .unwrap_or(0.8);
    let model_pages: Vec<i32> = parsed
        .get("pages")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_i64())
                .map(|v| v as i32)
                .collect()
        })
        .unwrap_or_default();
    let additional_info = parsed
        .get("additional_info")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    StructuredResponse {
        answer,
        document_ids,
        sources,
        confidence_score,
        context_used: parsed
            .get("context_used")
            .and_then(|v| v.as_bool())
            .unwrap_or(context_used),
        additional_info,
        pages: resolve_pages(&model_pages, retrieved_pages),
    }
}

/// Sorted, deduplicated page list: the model's claimed pages when present,
/// otherwise the pages of all retrieved chunks.
pub fn resolve_pages(model_pages: &[i32], retrieved_pages: &[i32]) -> Vec<i32> {
    let mut pages: Vec<i32> = if model_pages.is_empty() {
        retrieved_pages.to_vec()
    } else {
        model_pages.to_vec()
    };
    pages.sort_unstable();
    pages.dedup();
    pages
}

fn string_array(value: &serde_json::Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.to_string())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn doc(id: &str, summary: &str) -> DocumentMetadata {
        DocumentMetadata {
            namespace: "ns".to_string(),
            document_id: id.to_string(),
            name: format!("{id}.pdf"),
            summary: summary.to_string(),
            chunk_count: 1,
            status: "Ready".to_string(),
            processing: false,
            progress: 100,
            additional_info: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn parses_well_formed_reply() {
        let raw = r#"{
            "answer": "Registration closes May 15th.",
            "document_ids": ["doc1"],
            "sources": ["Registration closes on May 15th."],
            "confidence_score": 0.95,
            "context_used": true,
            "additional_info": null,
            "pages": [4]
        }"#;
        let response = parse_structured_reply(raw, false, &[4, 7]);
        assert_eq!(response.answer, "Registration closes May 15th.");
        assert_eq!(response.document_ids, vec!["doc1"]);
        assert_eq!(response.confidence_score, 0.95);
        assert!(response.context_used);
        assert_eq!(response.pages, vec![4]);
    }

    #[test]
    fn parses_json_embedded_in_prose() {
        let raw = "Here is my answer:\n{\"answer\": \"42\", \"pages\": []}\nHope that helps!";
        let response = parse_structured_reply(raw, false, &[1]);
        assert_eq!(response.answer, "42");
        // Model reported no pages, so retrieval pages are used.
        assert_eq!(response.pages, vec![1]);
    }

    #[test]
    fn malformed_reply_falls_back_to_raw_text() {
        let raw = "I could not produce JSON, sorry.";
        let response = parse_structured_reply(raw, true, &[]);
        assert_eq!(response.answer, raw);
        assert_eq!(response.confidence_score, 0.7);
        assert!(response.context_used);
        assert!(response.additional_info.is_some());
    }

    #[test]
    fn truncated_json_falls_back() {
        let raw = "{\"answer\": \"incomplete\"";
        let response = parse_structured_reply(raw, false, &[]);
        assert_eq!(response.confidence_score, 0.7);
        assert!(response
            .additional_info
            .as_deref()
            .unwrap()
            .contains("no JSON object"));
    }

    #[test]
    fn missing_fields_get_defaults() {
        let raw = r#"{"answer": "short"}"#;
        let response = parse_structured_reply(raw, true, &[2, 2, 1]);
        assert_eq!(response.confidence_score, 0.8);
        assert!(response.document_ids.is_empty());
        assert!(response.context_used);
        assert_eq!(response.pages, vec![1, 2]);
    }

    #[test]
    fn resolve_pages_prefers_model_pages() {
        assert_eq!(resolve_pages(&[7, 3, 7], &[1, 2]), vec![3, 7]);
    }

    #[test]
    fn resolve_pages_falls_back_to_retrieved() {
        assert_eq!(resolve_pages(&[], &[5, 2, 5]), vec![2, 5]);
    }

    #[test]
    fn overview_lists_documents_with_truncated_summaries() {
        let long_summary = "x".repeat(300);
        let docs = vec![doc("doc1", "Exam rules"), doc("doc2", &long_summary)];
        let overview = document_overview(&docs);
        assert!(overview.contains("ID: doc1"));
        assert!(overview.contains("Exam rules"));
        assert!(overview.contains("..."));
        assert!(!overview.contains(&long_summary));
    }

    #[test]
    fn overview_empty_namespace() {
        let overview = document_overview(&[]);
        assert!(overview.contains("NO DOCUMENTS AVAILABLE"));
    }
}
