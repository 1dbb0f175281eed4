//! Chat routes: conversation lifecycle, question answering, and example
//! questions.

use axum::{
    extract::{Path, State},
    Form, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use crate::errors::AppError;
use crate::models::chat::StructuredResponse;
use crate::models::document::QuestionStatus;
use crate::services::{metadata, rag};
use crate::AppState;

/// POST /start_bot — reset conversation state for a fresh session.
pub async fn start_bot(State(state): State<AppState>) -> Json<Value> {
    state.chat.reset().await;
    tracing::info!("Chat session started");

    Json(json!({
        "status": "success",
        "message": "Bot started successfully",
    }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageForm {
    #[validate(length(min = 1, message = "user_input must not be empty"))]
    pub user_input: String,
    #[validate(length(min = 1, message = "namespace must not be empty"))]
    pub namespace: String,
}

fn chat_envelope(status: &str, message: &str, response: &StructuredResponse) -> Json<Value> {
    Json(json!({
        "status": status,
        "message": message,
        "structured_response": response,
    }))
}

/// POST /send_message — answer a question over the namespace's documents.
///
/// Business failures are reported in-band with a degraded response body so
/// chat clients can render them as a normal assistant turn.
pub async fn send_message(
    State(state): State<AppState>,
    Form(form): Form<SendMessageForm>,
) -> Json<Value> {
    if form.validate().is_err()
        || form.user_input.trim().is_empty()
        || form.namespace.trim().is_empty()
    {
        return chat_envelope(
            "error",
            "User input and namespace must be non-empty strings",
            &StructuredResponse::invalid(
                "Please enter a question.",
                "Empty or missing user input or namespace",
            ),
        );
    }

    let question = form.user_input.trim();
    let history = state.chat.history(&form.namespace).await;

    match rag::answer_question(&state.db, &state.llm, question, &form.namespace, &history).await {
        Ok(response) => {
            state
                .chat
                .append_exchange(&form.namespace, question, &response.answer)
                .await;
            chat_envelope("success", "Response generated successfully", &response)
        }
        Err(e) => {
            tracing::error!(namespace = %form.namespace, error = %e, "Failed to answer question");
            chat_envelope(
                "error",
                &format!("Error generating response: {e}"),
                &StructuredResponse::invalid(
                    "Sorry, I ran into a problem answering that. Please try again.",
                    &e.to_string(),
                ),
            )
        }
    }
}

/// GET /get_example_questions/{namespace} — precomputed starter questions.
pub async fn get_example_questions(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> Result<Json<Value>, AppError> {
    match metadata::get_questions(&state.db, &namespace).await? {
        Some((QuestionStatus::Generating, _)) => Ok(Json(json!({
            "status": "generating",
            "message": "Example questions are being generated",
        }))),
        Some((QuestionStatus::Error, _)) => Ok(Json(json!({
            "status": "error",
            "message": "Example question generation failed",
        }))),
        Some((QuestionStatus::Completed, questions)) => Ok(Json(json!({
            "status": "success",
            "data": questions,
        }))),
        None => Ok(Json(json!({
            "status": "not_found",
            "message": format!("No example questions found for namespace {namespace}"),
        }))),
    }
}
