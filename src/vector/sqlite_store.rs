//! SQLite-backed [`VectorRepo`]: embeddings stored as little-endian f32
//! BLOBs (teacher's `chunk_vectors` convention), queried by brute-force
//! cosine similarity. Adequate for the corpus sizes this engine targets;
//! an ANN index is an orthogonal upgrade behind the same trait.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::sync::Arc;

use super::{normalize_metadata, VectorRepo};
use crate::error::{CoreError, CoreResult};
use crate::llm::LlmGateway;
use crate::models::VectorMatch;

/// Encode a float vector as little-endian f32 bytes.
fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode little-endian f32 bytes back into a vector.
fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`; `0.0` for empty or mismatched-length
/// vectors.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
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
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }
    dot / denom
}

pub struct SqliteVectorStore {
    pool: SqlitePool,
    gateway: Arc<LlmGateway>,
}

impl SqliteVectorStore {
    pub async fn new(pool: SqlitePool, gateway: Arc<LlmGateway>) -> CoreResult<Self> {
        let store = Self { pool, gateway };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> CoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS vectors (
                id TEXT PRIMARY KEY,
                document TEXT NOT NULL,
                metadata_json TEXT NOT NULL,
                embedding BLOB NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| CoreError::Internal(format!("failed to create vectors table: {e}")))?;
        Ok(())
    }

    async fn embed_one(&self, text: &str) -> CoreResult<Vec<f32>> {
        let mut vectors = self
            .gateway
            .embed(&[text.to_string()])
            .await
            .map_err(|e| CoreError::upstream(e.to_string()))?;
        vectors
            .pop()
            .ok_or_else(|| CoreError::Internal("embedding returned no vectors".to_string()))
    }
}

#[async_trait]
impl VectorRepo for SqliteVectorStore {
    async fn upsert(&self, id: &str, document: &str, metadata: &HashMap<String, Value>) -> CoreResult<()> {
        let embedding = self.embed_one(document).await?;
        let normalized = normalize_metadata(metadata);
        let metadata_json = serde_json::to_string(&normalized)
            .map_err(|e| CoreError::Internal(format!("failed to serialize metadata: {e}")))?;

        sqlx::query(
            "INSERT INTO vectors (id, document, metadata_json, embedding) VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET document = excluded.document, metadata_json = excluded.metadata_json, embedding = excluded.embedding",
        )
        .bind(id)
        .bind(document)
        .bind(&metadata_json)
        .bind(vec_to_blob(&embedding))
        .execute(&self.pool)
        .await
        .map_err(|e| CoreError::Internal(format!("vector upsert failed: {e}")))?;

        Ok(())
    }

    async fn query(
        &self,
        texts: &[String],
        k: usize,
        where_filter: Option<&HashMap<String, String>>,
    ) -> CoreResult<Vec<Vec<VectorMatch>>> {
        let rows = sqlx::query("SELECT id, document, metadata_json, embedding FROM vectors")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CoreError::Internal(format!("vector query failed: {e}")))?;

        let mut candidates: Vec<(String, String, HashMap<String, String>, Vec<f32>)> = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: String = row.get("id");
            let document: String = row.get("document");
            let metadata_json: String = row.get("metadata_json");
            let blob: Vec<u8> = row.get("embedding");
            let metadata: HashMap<String, String> = serde_json::from_str(&metadata_json).unwrap_or_default();

            if let Some(filter) = where_filter {
                let matches = filter
                    .iter()
                    .all(|(key, value)| metadata.get(key).map(|v| v == value).unwrap_or(false));
                if !matches {
                    continue;
                }
            }

            candidates.push((id, document, metadata, blob_to_vec(&blob)));
        }

        let mut all_results = Vec::with_capacity(texts.len());
        for text in texts {
            let query_vec = self.embed_one(text).await?;

            let mut scored: Vec<VectorMatch> = candidates
                .iter()
                .map(|(id, document, metadata, embedding)| {
                    let similarity = cosine_similarity(&query_vec, embedding) as f64;
                    VectorMatch {
                        id: id.clone(),
                        document: document.clone(),
                        metadata: metadata.clone(),
                        distance: 1.0 - similarity,
                    }
                })
                .collect();

            scored.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(std::cmp::Ordering::Equal));
            scored.truncate(k);
            all_results.push(scored);
        }

        Ok(all_results)
    }

    async fn get_by_metadata(&self, where_filter: &HashMap<String, String>) -> CoreResult<Vec<VectorMatch>> {
        let rows = sqlx::query("SELECT id, document, metadata_json FROM vectors")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CoreError::Internal(format!("vector get failed: {e}")))?;

        let mut matches = Vec::new();
        for row in &rows {
            let metadata_json: String = row.get("metadata_json");
            let metadata: HashMap<String, String> = serde_json::from_str(&metadata_json).unwrap_or_default();

            let filter_matches = where_filter
                .iter()
                .all(|(key, value)| metadata.get(key).map(|v| v == value).unwrap_or(false));
            if !filter_matches {
                continue;
            }

            matches.push(VectorMatch {
                id: row.get("id"),
                document: row.get("document"),
                metadata,
                distance: 0.0,
            });
        }

        Ok(matches)
    }

    async fn check_health(&self) -> (bool, String) {
        match sqlx::query("SELECT 1").fetch_one(&self.pool).await {
            Ok(_) => (true, "ok".to_string()),
            Err(e) => (false, format!("vector store unreachable: {e}")),
        }
    }

    async fn repair(&self) -> (bool, String) {
        match self.ensure_schema().await {
            Ok(()) => (true, "schema verified".to_string()),
            Err(e) => (false, e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_roundtrip() {
        let v = vec![1.0f32, -2.5, 3.125, 0.0];
        assert_eq!(blob_to_vec(&vec_to_blob(&v)), v);
    }

    #[test]
    fn cosine_identical_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal_is_zero() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    }

    #[test]
    fn cosine_mismatched_lengths_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }
}
