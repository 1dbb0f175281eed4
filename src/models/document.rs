//! Document metadata and namespace summary models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Metadata row for a processed document, stored per namespace.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DocumentMetadata {
    pub namespace: String,
    #[serde(rename = "id")]
    pub document_id: String,
    pub name: String,
    pub summary: String,
    pub chunk_count: i32,
    pub status: String,
    pub processing: bool,
    pub progress: i32,
    pub additional_info: Option<String>,
    #[serde(rename = "date")]
    pub created_at: DateTime<Utc>,
}

/// Aggregated view of a namespace returned by `GET /namespace_info/{namespace}`.
#[derive(Debug, Clone, Serialize)]
pub struct NamespaceInfo {
    pub status: String,
    pub namespace: String,
    pub document_count: usize,
    pub documents: Vec<DocumentMetadata>,
    pub project_info: Option<String>,
}

/// A stored example question with its generated answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestionAnswer {
    pub question: String,
    pub answer: String,
}

/// Generation status of a namespace's example questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionStatus {
    Generating,
    Completed,
    Error,
}

impl std::fmt::Display for QuestionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Generating => write!(f, "generating"),
            Self::Completed => write!(f, "completed"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for QuestionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generating" => Ok(Self::Generating),
            "completed" => Ok(Self::Completed),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown question status '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn question_status_round_trip() {
        for status in [
            QuestionStatus::Generating,
            QuestionStatus::Completed,
            QuestionStatus::Error,
        ] {
            let parsed = QuestionStatus::from_str(&status.to_string()).unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn question_status_rejects_unknown() {
        assert!(QuestionStatus::from_str("pending").is_err());
    }

    #[test]
    fn document_metadata_serializes_renamed_fields() {
        let doc = DocumentMetadata {
            namespace: "cs101".to_string(),
            document_id: "doc-1".to_string(),
            name: "syllabus.pdf".to_string(),
            summary: "Course overview".to_string(),
            chunk_count: 12,
            status: "Ready".to_string(),
            processing: false,
            progress: 100,
            additional_info: None,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["id"], "doc-1");
        assert!(json.get("date").is_some());
        assert!(json.get("document_id").is_none());
    }

    #[test]
    fn question_answer_round_trip() {
        let qa = QuestionAnswer {
            question: "What are the prerequisites?".to_string(),
            answer: "None.".to_string(),
        };
        let json = serde_json::to_string(&qa).unwrap();
        let back: QuestionAnswer = serde_json::from_str(&json).unwrap();
        assert_eq!(back, qa);
    }
}
