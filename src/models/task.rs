//! Background task states and the polling response envelope.

use serde_json::{json, Value};

/// Lifecycle states of a queued task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Processing,
    Success,
    Failure,
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Processing => write!(f, "PROCESSING"),
            Self::Success => write!(f, "SUCCESS"),
            Self::Failure => write!(f, "FAILURE"),
        }
    }
}

impl std::str::FromStr for TaskState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "PROCESSING" | "STARTED" => Ok(Self::Processing),
            "SUCCESS" => Ok(Self::Success),
            "FAILURE" | "REVOKED" => Ok(Self::Failure),
            other => Err(format!("unknown task state '{other}'")),
        }
    }
}

/// Snapshot of a task's Redis record.
///
/// An unknown task id deserializes to a pending record: polling may race
/// the enqueue, so absence is not an error.
#[derive(Debug, Clone)]
pub struct TaskRecord {
    pub state: TaskState,
    pub message: String,
    pub current: i64,
    pub total: i64,
    pub file: String,
    pub result: Option<Value>,
    pub error: Option<String>,
}

impl Default for TaskRecord {
    fn default() -> Self {
        Self {
            state: TaskState::Pending,
            message: String::new(),
            current: 0,
            total: 100,
            file: String::new(),
            result: None,
            error: None,
        }
    }
}

impl TaskRecord {
    /// Render the polling response body for this task's current state.
    ///
    /// Failure records are rendered too; the route layer decides the HTTP
    /// status code.
    pub fn to_response(&self) -> Value {
        match self.state {
            TaskState::Pending => json!({
                "state": "PENDING",
                "status": "PENDING",
                "message": "Task is waiting for execution",
                "progress": 0,
            }),
            TaskState::Processing => json!({
                "state": "PROCESSING",
                "status": "PROCESSING",
                "message": if self.message.is_empty() { "Processing" } else { self.message.as_str() },
                "current": self.current,
                "total": self.total,
                "progress": self.current,
                "file": self.file,
            }),
            TaskState::Success => {
                let result = self.result.clone().unwrap_or_else(|| {
                    json!({
                        "message": "No result data available",
                        "chunks": 0,
                        "index_status": "unknown",
                        "metadata_status": "unknown",
                        "file": "",
                    })
                });
                json!({
                    "state": "SUCCESS",
                    "status": "SUCCESS",
                    "message": "Completed successfully",
                    "progress": 100,
                    "result": result,
                })
            }
            TaskState::Failure => json!({
                "state": "FAILURE",
                "status": "FAILURE",
                "message": "Task processing failed",
                "error": {
                    "message": self.error.clone().unwrap_or_else(|| "Unknown error".to_string()),
                    "details": self.message,
                },
                "progress": 0,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn state_display_round_trip() {
        for state in [
            TaskState::Pending,
            TaskState::Processing,
            TaskState::Success,
            TaskState::Failure,
        ] {
            assert_eq!(TaskState::from_str(&state.to_string()).unwrap(), state);
        }
    }

    #[test]
    fn legacy_states_map_onto_lifecycle() {
        assert_eq!(TaskState::from_str("STARTED").unwrap(), TaskState::Processing);
        assert_eq!(TaskState::from_str("REVOKED").unwrap(), TaskState::Failure);
    }

    #[test]
    fn pending_response_has_zero_progress() {
        let record = TaskRecord::default();
        let body = record.to_response();
        assert_eq!(body["state"], "PENDING");
        assert_eq!(body["progress"], 0);
    }

    #[test]
    fn processing_response_carries_progress() {
        let record = TaskRecord {
            state: TaskState::Processing,
            message: "Embedding chunks".to_string(),
            current: 60,
            total: 100,
            file: "syllabus.pdf".to_string(),
            ..Default::default()
        };
        let body = record.to_response();
        assert_eq!(body["status"], "PROCESSING");
        assert_eq!(body["message"], "Embedding chunks");
        assert_eq!(body["progress"], 60);
        assert_eq!(body["file"], "syllabus.pdf");
    }

    #[test]
    fn success_response_defaults_missing_result() {
        let record = TaskRecord {
            state: TaskState::Success,
            ..Default::default()
        };
        let body = record.to_response();
        assert_eq!(body["progress"], 100);
        assert_eq!(body["result"]["chunks"], 0);
        assert_eq!(body["result"]["index_status"], "unknown");
    }

    #[test]
    fn success_response_passes_result_through() {
        let record = TaskRecord {
            state: TaskState::Success,
            result: Some(serde_json::json!({
                "message": "Document syllabus.pdf processed successfully",
                "chunks": 14,
                "index_status": "success",
                "metadata_status": "success",
                "file": "syllabus.pdf",
            })),
            ..Default::default()
        };
        let body = record.to_response();
        assert_eq!(body["result"]["chunks"], 14);
        assert_eq!(body["result"]["file"], "syllabus.pdf");
    }

    #[test]
    fn failure_response_carries_error_detail() {
        let record = TaskRecord {
            state: TaskState::Failure,
            message: "extract stage".to_string(),
            error: Some("not a PDF".to_string()),
            ..Default::default()
        };
        let body = record.to_response();
        assert_eq!(body["status"], "FAILURE");
        assert_eq!(body["error"]["message"], "not a PDF");
        assert_eq!(body["error"]["details"], "extract stage");
    }
}
