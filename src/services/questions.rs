//! Example question generation for a namespace.
//!
//! Runs as a background job after uploads and deletions: proposes questions
//! from the document overview, answers each through the RAG pipeline, and
//! stores the pairs with a generation status the frontend can poll.

use sqlx::PgPool;

use crate::errors::AppError;
use crate::models::document::{QuestionAnswer, QuestionStatus};
use crate::services::llm::LlmClient;
use crate::services::{metadata, rag};

/// Questions generated per namespace.
const NUM_QUESTIONS: usize = 3;

const QUESTION_SYSTEM: &str = "\
You generate example questions that users could ask about a set of documents. \
Reply with a JSON array of question strings and nothing else.";

/// Fixed questions used when the model reply cannot be parsed.
fn fallback_questions() -> Vec<String> {
    vec![
        "What are the most important topics in the documents?".to_string(),
        "Which concepts are covered in the documents?".to_string(),
        "How can I use the information in the documents?".to_string(),
    ]
}

/// Generate and store example questions with answers for a namespace.
///
/// Returns the number of stored question/answer pairs. The generation
/// status is set to `error` if anything fails along the way.
pub async fn generate_and_store(
    pool: &PgPool,
    llm: &LlmClient,
    namespace: &str,
) -> Result<usize, AppError> {
    metadata::set_question_status(pool, namespace, QuestionStatus::Generating).await?;

    match generate(pool, llm, namespace).await {
        Ok(pairs) => {
            metadata::set_questions(pool, namespace, &pairs).await?;
            Ok(pairs.len())
        }
        Err(e) => {
            metadata::set_question_status(pool, namespace, QuestionStatus::Error).await?;
            Err(e)
        }
    }
}

async fn generate(
    pool: &PgPool,
    llm: &LlmClient,
    namespace: &str,
) -> Result<Vec<QuestionAnswer>, AppError> {
    let documents = metadata::get_documents(pool, namespace).await?;
    let questions = if documents.is_empty() {
        vec!["What is available in this namespace?".to_string()]
    } else {
        let overview: String = rag::document_overview(&documents)
            .chars()
            .take(3000)
            .collect();
        let prompt = format!(
            "Based on the following documents, generate {NUM_QUESTIONS} relevant, \
             specific questions users could ask about their content.\n\n\
             Documents:\n{overview}\n\n\
             Reply with a JSON array: [\"Question 1\", \"Question 2\", \"Question 3\"]"
        );
        let raw = llm.complete(QUESTION_SYSTEM, &prompt).await?;
        parse_questions(&raw, NUM_QUESTIONS)
    };

    let mut pairs = Vec::with_capacity(questions.len());
    for question in questions {
        let answer = match rag::answer_question(pool, llm, &question, namespace, &[]).await {
            Ok(response) => response.answer,
            Err(e) => {
                tracing::warn!(namespace, error = %e, "Failed to answer example question");
                format!("Failed to answer the question: {e}")
            }
        };
        pairs.push(QuestionAnswer { question, answer });
    }
    Ok(pairs)
}

/// Parse a JSON array of question strings, falling back to fixed questions.
pub fn parse_questions(raw: &str, limit: usize) -> Vec<String> {
    let parsed = raw
        .find('[')
        .and_then(|start| raw.rfind(']').map(|end| &raw[start..=end]))
        .and_then(|json| serde_json::from_str::<Vec<String>>(json).ok());

    match parsed {
        Some(questions) if !questions.is_empty() => {
            questions.into_iter().take(limit).collect()
        }
        _ => fallback_questions().into_iter().take(limit).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_clean_array() {
        let raw = r#"["What is X?", "How does Y work?", "Why Z?"]"#;
        let questions = parse_questions(raw, 3);
        assert_eq!(questions.len(), 3);
        assert_eq!(questions[0], "What is X?");
    }

    #[test]
    fn parses_array_embedded_in_prose() {
        let raw = "Sure, here you go:\n[\"One?\", \"Two?\"]\nDone.";
        let questions = parse_questions(raw, 3);
        assert_eq!(questions, vec!["One?", "Two?"]);
    }

    #[test]
    fn truncates_to_limit() {
        let raw = r#"["a", "b", "c", "d", "e"]"#;
        assert_eq!(parse_questions(raw, 3).len(), 3);
    }

    #[test]
    fn falls_back_on_garbage() {
        let questions = parse_questions("no json here", 3);
        assert_eq!(questions, fallback_questions());
    }

    #[test]
    fn falls_back_on_empty_array() {
        let questions = parse_questions("[]", 3);
        assert_eq!(questions, fallback_questions());
    }

    #[test]
    fn falls_back_on_non_string_array() {
        let questions = parse_questions("[1, 2, 3]", 3);
        assert_eq!(questions, fallback_questions());
    }
}
