//! Namespace assessment generation.
//!
//! Condenses all document summaries of a namespace into a handful of
//! bullet points, stored for the namespace overview. Runs as a background
//! job after uploads, deletions, or an explicit trigger.

use sqlx::PgPool;

use crate::errors::AppError;
use crate::services::llm::LlmClient;
use crate::services::{metadata, rag};

/// Bullet points requested from the model.
const NUM_BULLETS: usize = 5;

const ASSESSMENT_SYSTEM: &str = "\
You summarize a document collection into concise assessment bullet points. \
Reply with a JSON array of strings and nothing else.";

/// Generate and store assessment bullet points for a namespace.
pub async fn generate(
    pool: &PgPool,
    llm: &LlmClient,
    namespace: &str,
) -> Result<Vec<String>, AppError> {
    let documents = metadata::get_documents(pool, namespace).await?;
    if documents.is_empty() {
        metadata::set_namespace_summary(pool, namespace, &[]).await?;
        return Ok(Vec::new());
    }

    let overview = rag::document_overview(&documents);
    let prompt = format!(
        "Summarize the following document collection into at most {NUM_BULLETS} \
         assessment bullet points covering the main topics and their scope.\n\n\
         {overview}\n\n\
         Reply with a JSON array of bullet point strings."
    );

    let raw = llm.complete(ASSESSMENT_SYSTEM, &prompt).await?;
    let bullets = parse_bullets(&raw, NUM_BULLETS);
    metadata::set_namespace_summary(pool, namespace, &bullets).await?;

    tracing::info!(namespace, bullets = bullets.len(), "Assessment stored");
    Ok(bullets)
}

/// Parse bullet points from the model reply.
///
/// Accepts a JSON string array; otherwise falls back to lines starting
/// with a dash.
pub fn parse_bullets(raw: &str, limit: usize) -> Vec<String> {
    let parsed = raw
        .find('[')
        .and_then(|start| raw.rfind(']').map(|end| &raw[start..=end]))
        .and_then(|json| serde_json::from_str::<Vec<String>>(json).ok());

    if let Some(bullets) = parsed {
        return bullets.into_iter().take(limit).collect();
    }

    raw.lines()
        .filter_map(|line| line.trim().strip_prefix('-'))
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .take(limit)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_json_array() {
        let raw = r#"["Covers exam rules", "Covers registration"]"#;
        let bullets = parse_bullets(raw, 5);
        assert_eq!(bullets.len(), 2);
        assert_eq!(bullets[0], "Covers exam rules");
    }

    #[test]
    fn truncates_to_limit() {
        let raw = r#"["a", "b", "c"]"#;
        assert_eq!(parse_bullets(raw, 2).len(), 2);
    }

    #[test]
    fn falls_back_to_dash_lines() {
        let raw = "Summary:\n- First point\n- Second point\nDone";
        let bullets = parse_bullets(raw, 5);
        assert_eq!(bullets, vec!["First point", "Second point"]);
    }

    #[test]
    fn garbage_yields_empty() {
        assert!(parse_bullets("nothing useful", 5).is_empty());
    }
}
