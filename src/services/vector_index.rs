//! Namespaced vector index over PostgreSQL.
//!
//! Chunk embeddings are stored as `real[]` columns; retrieval loads the
//! namespace's vectors and ranks by cosine similarity in-process.

use sqlx::{FromRow, PgPool};

use crate::errors::AppError;

/// A chunk ready for insertion into the index.
#[derive(Debug, Clone)]
pub struct IndexedChunk {
    pub ordinal: i32,
    pub content: String,
    pub pages: Vec<i32>,
    pub embedding: Vec<f32>,
}

/// A retrieval hit with its similarity score.
#[derive(Debug, Clone)]
pub struct ChunkHit {
    pub document_id: String,
    pub ordinal: i32,
    pub content: String,
    pub pages: Vec<i32>,
    pub score: f32,
}

/// Neighboring chunk contents of a retrieval hit.
#[derive(Debug, Clone, Default)]
pub struct AdjacentChunks {
    pub previous: Option<String>,
    pub next: Option<String>,
}

#[derive(Debug, FromRow)]
struct ChunkRow {
    document_id: String,
    ordinal: i32,
    content: String,
    pages: Vec<i32>,
    embedding: Vec<f32>,
}

/// Cosine similarity of two vectors; 0.0 for mismatched or zero-norm inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Replace a document's chunks in the index. Returns the number inserted.
pub async fn upsert_chunks(
    pool: &PgPool,
    namespace: &str,
    document_id: &str,
    chunks: &[IndexedChunk],
) -> Result<usize, AppError> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM chunks WHERE namespace = $1 AND document_id = $2")
        .bind(namespace)
        .bind(document_id)
        .execute(&mut *tx)
        .await?;

    for chunk in chunks {
        sqlx::query(
            r#"
            INSERT INTO chunks (namespace, document_id, ordinal, content, pages, embedding)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(namespace)
        .bind(document_id)
        .bind(chunk.ordinal)
        .bind(&chunk.content)
        .bind(&chunk.pages)
        .bind(&chunk.embedding)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(chunks.len())
}

/// Top-k cosine retrieval over a namespace.
pub async fn search(
    pool: &PgPool,
    namespace: &str,
    query: &[f32],
    k: usize,
) -> Result<Vec<ChunkHit>, AppError> {
    let rows = sqlx::query_as::<_, ChunkRow>(
        "SELECT document_id, ordinal, content, pages, embedding FROM chunks WHERE namespace = $1",
    )
    .bind(namespace)
    .fetch_all(pool)
    .await?;

    let mut hits: Vec<ChunkHit> = rows
        .into_iter()
        .map(|row| {
            let score = cosine_similarity(query, &row.embedding);
            ChunkHit {
                document_id: row.document_id,
                ordinal: row.ordinal,
                content: row.content,
                pages: row.pages,
                score,
            }
        })
        .collect();

    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    hits.truncate(k);
    Ok(hits)
}

/// Fetch the chunks immediately before and after a hit, when they exist.
pub async fn adjacent_chunks(
    pool: &PgPool,
    namespace: &str,
    document_id: &str,
    ordinal: i32,
) -> Result<AdjacentChunks, AppError> {
    let rows = sqlx::query_as::<_, (i32, String)>(
        r#"
        SELECT ordinal, content FROM chunks
        WHERE namespace = $1 AND document_id = $2 AND ordinal IN ($3, $4)
        "#,
    )
    .bind(namespace)
    .bind(document_id)
    .bind(ordinal - 1)
    .bind(ordinal + 1)
    .fetch_all(pool)
    .await?;

    let mut adjacent = AdjacentChunks::default();
    for (ord, content) in rows {
        if ord == ordinal - 1 {
            adjacent.previous = Some(content);
        } else if ord == ordinal + 1 {
            adjacent.next = Some(content);
        }
    }
    Ok(adjacent)
}

/// Remove a document's chunks. Returns the number deleted.
pub async fn delete_document(
    pool: &PgPool,
    namespace: &str,
    document_id: &str,
) -> Result<u64, AppError> {
    let result = sqlx::query("DELETE FROM chunks WHERE namespace = $1 AND document_id = $2")
        .bind(namespace)
        .bind(document_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Remove every chunk in a namespace. Returns the number deleted.
pub async fn delete_namespace(pool: &PgPool, namespace: &str) -> Result<u64, AppError> {
    let result = sqlx::query("DELETE FROM chunks WHERE namespace = $1")
        .bind(namespace)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_identical_vectors() {
        let v = vec![0.5, 0.2, 0.8];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal_vectors() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn cosine_opposite_vectors() {
        let a = vec![1.0, 2.0];
        let b = vec![-1.0, -2.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_mismatched_lengths_is_zero() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn cosine_zero_norm_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }
}
