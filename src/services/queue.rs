//! Redis-backed background task queue and the in-process worker.
//!
//! Jobs are JSON payloads pushed to a Redis list; the worker consumes them
//! with `BRPOP` and records per-task state in a Redis hash (`task:{id}`)
//! that `GET /task_status/{task_id}` polls.

use std::collections::HashMap;

use base64::Engine;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::task::{TaskRecord, TaskState};
use crate::services::processing::{self, DocumentJob};
use crate::services::{assessment, questions};
use crate::AppState;

const QUEUE_KEY: &str = "tasks:queue";
const TASK_TTL_SECS: i64 = 86_400;
const POLL_TIMEOUT_SECS: f64 = 5.0;

/// Background job kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Job {
    ProcessDocument {
        namespace: String,
        document_id: String,
        file_name: String,
        has_tables_or_graphics: bool,
        special_pages: Vec<i32>,
        additional_info: Option<String>,
        content_base64: String,
    },
    GenerateAssessment {
        namespace: String,
    },
    GenerateExampleQuestions {
        namespace: String,
    },
    Ping,
}

/// A job with its assigned task id, as serialized onto the queue.
#[derive(Debug, Serialize, Deserialize)]
pub struct QueuedJob {
    pub id: Uuid,
    pub job: Job,
}

fn task_key(id: Uuid) -> String {
    format!("task:{id}")
}

/// Enqueue a job and create its pending task record. Returns the task id.
pub async fn enqueue(client: &redis::Client, job: Job) -> Result<Uuid, AppError> {
    let mut con = client.get_multiplexed_async_connection().await?;
    let id = Uuid::new_v4();
    let payload = serde_json::to_string(&QueuedJob { id, job })
        .map_err(|e| AppError::Internal(format!("failed to serialize job: {e}")))?;

    let key = task_key(id);
    redis::pipe()
        .hset(&key, "state", TaskState::Pending.to_string())
        .ignore()
        .expire(&key, TASK_TTL_SECS)
        .ignore()
        .lpush(QUEUE_KEY, payload)
        .ignore()
        .query_async::<()>(&mut con)
        .await?;

    tracing::debug!(task_id = %id, "Job enqueued");
    Ok(id)
}

/// Read a task's current record. Unknown ids read as pending.
pub async fn fetch_status(client: &redis::Client, id: Uuid) -> Result<TaskRecord, AppError> {
    let mut con = client.get_multiplexed_async_connection().await?;
    let map: HashMap<String, String> = con.hgetall(task_key(id)).await?;
    if map.is_empty() {
        return Ok(TaskRecord::default());
    }

    let get = |key: &str| map.get(key).cloned().unwrap_or_default();
    Ok(TaskRecord {
        state: get("state").parse().unwrap_or(TaskState::Pending),
        message: get("message"),
        current: get("current").parse().unwrap_or(0),
        total: get("total").parse().unwrap_or(100),
        file: get("file"),
        result: map
            .get("result")
            .and_then(|raw| serde_json::from_str(raw).ok()),
        error: map.get("error").cloned(),
    })
}

/// Progress reporter handed to long-running jobs.
pub struct JobContext {
    con: MultiplexedConnection,
    key: String,
    file: String,
}

impl JobContext {
    /// Mark the task as processing at the given progress point.
    pub async fn progress(&mut self, current: i64, message: &str) -> Result<(), AppError> {
        redis::pipe()
            .hset(&self.key, "state", TaskState::Processing.to_string())
            .ignore()
            .hset(&self.key, "current", current)
            .ignore()
            .hset(&self.key, "total", 100i64)
            .ignore()
            .hset(&self.key, "message", message)
            .ignore()
            .hset(&self.key, "file", &self.file)
            .ignore()
            .query_async::<()>(&mut self.con)
            .await?;
        Ok(())
    }
}

async fn set_success(
    con: &mut MultiplexedConnection,
    key: &str,
    result: serde_json::Value,
) -> Result<(), AppError> {
    redis::pipe()
        .hset(key, "state", TaskState::Success.to_string())
        .ignore()
        .hset(key, "result", result.to_string())
        .ignore()
        .expire(key, TASK_TTL_SECS)
        .ignore()
        .query_async::<()>(con)
        .await?;
    Ok(())
}

async fn set_failure(
    con: &mut MultiplexedConnection,
    key: &str,
    stage: &str,
    error: &AppError,
) -> Result<(), AppError> {
    redis::pipe()
        .hset(key, "state", TaskState::Failure.to_string())
        .ignore()
        .hset(key, "message", stage)
        .ignore()
        .hset(key, "error", error.to_string())
        .ignore()
        .expire(key, TASK_TTL_SECS)
        .ignore()
        .query_async::<()>(con)
        .await?;
    Ok(())
}

/// Worker loop: consume jobs until the process exits.
///
/// Job failures are captured into the task record; queue connection
/// failures trigger a reconnect with backoff.
pub async fn run_worker(state: AppState) {
    tracing::info!("Task worker started");
    loop {
        let mut con = match state.redis.get_multiplexed_async_connection().await {
            Ok(con) => con,
            Err(e) => {
                tracing::error!(error = %e, "Worker failed to connect to Redis, retrying");
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                continue;
            }
        };

        loop {
            let popped: Result<Option<(String, String)>, redis::RedisError> =
                con.brpop(QUEUE_KEY, POLL_TIMEOUT_SECS).await;
            match popped {
                Ok(Some((_, payload))) => execute_payload(&state, &mut con, &payload).await,
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Queue poll failed, reconnecting");
                    break;
                }
            }
        }
    }
}

async fn execute_payload(state: &AppState, con: &mut MultiplexedConnection, payload: &str) {
    let queued: QueuedJob = match serde_json::from_str(payload) {
        Ok(queued) => queued,
        Err(e) => {
            tracing::error!(error = %e, "Discarding malformed job payload");
            return;
        }
    };

    let key = task_key(queued.id);
    tracing::info!(task_id = %queued.id, "Executing job");

    let outcome = execute_job(state, con, &key, queued.job).await;
    let write_result = match outcome {
        Ok(result) => set_success(con, &key, result).await,
        Err((stage, error)) => {
            tracing::error!(task_id = %queued.id, stage, error = %error, "Job failed");
            set_failure(con, &key, &stage, &error).await
        }
    };
    if let Err(e) = write_result {
        tracing::error!(task_id = %queued.id, error = %e, "Failed to record task state");
    }
}

async fn execute_job(
    state: &AppState,
    con: &mut MultiplexedConnection,
    key: &str,
    job: Job,
) -> Result<serde_json::Value, (String, AppError)> {
    match job {
        Job::Ping => Ok(serde_json::json!({ "message": "pong" })),

        Job::ProcessDocument {
            namespace,
            document_id,
            file_name,
            has_tables_or_graphics,
            special_pages,
            additional_info,
            content_base64,
        } => {
            let data = base64::engine::general_purpose::STANDARD
                .decode(&content_base64)
                .map_err(|e| {
                    (
                        "decode".to_string(),
                        AppError::Internal(format!("invalid job payload: {e}")),
                    )
                })?;
            let document = DocumentJob {
                namespace,
                document_id,
                file_name: file_name.clone(),
                has_tables_or_graphics,
                special_pages,
                additional_info,
                data,
            };
            let mut ctx = JobContext {
                con: con.clone(),
                key: key.to_string(),
                file: file_name,
            };
            let outcome = processing::process_document(&state.db, &state.llm, &document, &mut ctx)
                .await
                .map_err(|e| ("process_document".to_string(), e))?;
            serde_json::to_value(&outcome)
                .map_err(|e| ("serialize".to_string(), AppError::Internal(e.to_string())))
        }

        Job::GenerateAssessment { namespace } => {
            let bullets = assessment::generate(&state.db, &state.llm, &namespace)
                .await
                .map_err(|e| ("generate_assessment".to_string(), e))?;
            Ok(serde_json::json!({
                "message": format!("Assessment generated for namespace {namespace}"),
                "bullet_points": bullets.len(),
            }))
        }

        Job::GenerateExampleQuestions { namespace } => {
            let count = questions::generate_and_store(&state.db, &state.llm, &namespace)
                .await
                .map_err(|e| ("generate_example_questions".to_string(), e))?;
            Ok(serde_json::json!({
                "message": format!("Example questions generated for namespace {namespace}"),
                "questions": count,
            }))
        }
    }
}
