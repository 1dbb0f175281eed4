//! Chat conversation state and structured agent responses.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Maximum messages retained per namespace before trimming.
const MAX_HISTORY: usize = 10;

/// Number of trailing history messages included as answer context.
pub const CONTEXT_WINDOW: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl std::fmt::Display for ChatRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

/// Structured response returned by the answering pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredResponse {
    pub answer: String,
    pub document_ids: Vec<String>,
    pub sources: Vec<String>,
    pub confidence_score: f32,
    pub context_used: bool,
    pub additional_info: Option<String>,
    pub pages: Vec<i32>,
}

impl StructuredResponse {
    /// Zeroed response used when input validation rejects a request.
    pub fn invalid(answer: &str, additional_info: &str) -> Self {
        Self {
            answer: answer.to_string(),
            document_ids: Vec::new(),
            sources: Vec::new(),
            confidence_score: 0.0,
            context_used: false,
            additional_info: Some(additional_info.to_string()),
            pages: Vec::new(),
        }
    }

    /// Fallback response carrying the raw model output when JSON parsing fails.
    pub fn fallback(raw: String, context_used: bool, additional_info: String) -> Self {
        Self {
            answer: raw,
            document_ids: Vec::new(),
            sources: Vec::new(),
            confidence_score: 0.7,
            context_used,
            additional_info: Some(additional_info),
            pages: Vec::new(),
        }
    }
}

/// In-process conversation history, keyed by namespace.
///
/// Reset by `POST /start_bot`; each namespace keeps only the most recent
/// [`MAX_HISTORY`] messages.
#[derive(Clone, Default)]
pub struct ChatState {
    histories: Arc<RwLock<HashMap<String, Vec<ChatMessage>>>>,
}

impl ChatState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the history for a namespace.
    pub async fn history(&self, namespace: &str) -> Vec<ChatMessage> {
        self.histories
            .read()
            .await
            .get(namespace)
            .cloned()
            .unwrap_or_default()
    }

    /// Append a user/assistant exchange, trimming to the retention cap.
    pub async fn append_exchange(&self, namespace: &str, user: &str, assistant: &str) {
        let mut histories = self.histories.write().await;
        let history = histories.entry(namespace.to_string()).or_default();
        history.push(ChatMessage {
            role: ChatRole::User,
            content: user.to_string(),
        });
        history.push(ChatMessage {
            role: ChatRole::Assistant,
            content: assistant.to_string(),
        });
        if history.len() > MAX_HISTORY {
            let excess = history.len() - MAX_HISTORY;
            history.drain(..excess);
        }
    }

    /// Drop all conversation state.
    pub async fn reset(&self) {
        self.histories.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn history_starts_empty() {
        let state = ChatState::new();
        assert!(state.history("ns").await.is_empty());
    }

    #[tokio::test]
    async fn append_exchange_records_both_roles() {
        let state = ChatState::new();
        state.append_exchange("ns", "hello", "hi there").await;

        let history = state.history("ns").await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, ChatRole::User);
        assert_eq!(history[0].content, "hello");
        assert_eq!(history[1].role, ChatRole::Assistant);
        assert_eq!(history[1].content, "hi there");
    }

    #[tokio::test]
    async fn history_trimmed_to_cap() {
        let state = ChatState::new();
        for i in 0..8 {
            state
                .append_exchange("ns", &format!("q{i}"), &format!("a{i}"))
                .await;
        }

        let history = state.history("ns").await;
        assert_eq!(history.len(), 10);
        // Oldest exchanges dropped first.
        assert_eq!(history[0].content, "q3");
        assert_eq!(history[9].content, "a7");
    }

    #[tokio::test]
    async fn namespaces_are_isolated() {
        let state = ChatState::new();
        state.append_exchange("a", "q", "a").await;
        assert!(state.history("b").await.is_empty());
    }

    #[tokio::test]
    async fn reset_clears_all_namespaces() {
        let state = ChatState::new();
        state.append_exchange("a", "q", "a").await;
        state.reset().await;
        assert!(state.history("a").await.is_empty());
    }

    #[test]
    fn structured_response_round_trip() {
        let response = StructuredResponse {
            answer: "The deadline is May 15th.".to_string(),
            document_ids: vec!["doc1".to_string()],
            sources: vec!["The deadline for registration is May 15th.".to_string()],
            confidence_score: 0.9,
            context_used: true,
            additional_info: None,
            pages: vec![3, 7],
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["answer"], "The deadline is May 15th.");
        assert_eq!(json["pages"][1], 7);

        let back: StructuredResponse = serde_json::from_value(json).unwrap();
        assert_eq!(back.document_ids, vec!["doc1"]);
    }

    #[test]
    fn invalid_response_is_zeroed() {
        let response = StructuredResponse::invalid("Invalid input", "Empty user input");
        assert_eq!(response.confidence_score, 0.0);
        assert!(!response.context_used);
        assert!(response.document_ids.is_empty());
        assert!(response.pages.is_empty());
    }
}
