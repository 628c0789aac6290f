//! Narrow facade over a vector store (§4.6, C2).
//!
//! The only implementation is [`sqlite_store::SqliteVectorStore`], a
//! SQLite-backed brute-force cosine-similarity index modeled on the
//! teacher's `chunk_vectors` table and embedding-BLOB conventions. A real
//! deployment trades this for an ANN index; the trait is the seam.

pub mod sqlite_store;

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

use crate::error::CoreResult;
use crate::models::VectorMatch;

#[async_trait]
pub trait VectorRepo: Send + Sync {
    /// Embeds `document` and stores it under `id`, replacing any existing
    /// record with the same id. `metadata` values are string, number, or
    /// bool; lists are joined into comma-separated strings because the
    /// store does not natively support list-typed metadata.
    async fn upsert(&self, id: &str, document: &str, metadata: &HashMap<String, Value>) -> CoreResult<()>;

    /// Embeds each of `texts` and returns, per text, the `k` nearest
    /// records ordered by ascending cosine distance. `where_filter`, when
    /// present, restricts candidates to records whose metadata matches
    /// every given key/value exactly.
    async fn query(
        &self,
        texts: &[String],
        k: usize,
        where_filter: Option<&HashMap<String, String>>,
    ) -> CoreResult<Vec<Vec<VectorMatch>>>;

    /// Exact-match metadata lookup (no similarity ranking), used by
    /// duplicate detection. An empty filter returns every record, used for
    /// the fuzzy/case-insensitive scans §4.2 falls back to.
    async fn get_by_metadata(&self, where_filter: &HashMap<String, String>) -> CoreResult<Vec<VectorMatch>>;

    /// `(healthy, diagnostic)`.
    async fn check_health(&self) -> (bool, String);

    /// Attempts to rebuild the similarity index; `(success, diagnostic)`.
    async fn repair(&self) -> (bool, String);
}

/// Normalizes a metadata value to its stored string representation:
/// strings pass through, numbers/bools render via `Display`, arrays are
/// comma-joined (scalar elements only), everything else is dropped.
pub fn normalize_metadata(metadata: &HashMap<String, Value>) -> HashMap<String, String> {
    metadata
        .iter()
        .filter_map(|(k, v)| stringify_value(v).map(|s| (k.clone(), s)))
        .collect()
}

fn stringify_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => {
            let joined = items
                .iter()
                .filter_map(stringify_value)
                .collect::<Vec<_>>()
                .join(",");
            Some(joined)
        }
        Value::Null => None,
        Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_mixed_metadata() {
        let mut metadata = HashMap::new();
        metadata.insert("title".to_string(), Value::String("GraphRAG".to_string()));
        metadata.insert("count".to_string(), serde_json::json!(3));
        metadata.insert("active".to_string(), Value::Bool(true));
        metadata.insert(
            "tags".to_string(),
            serde_json::json!(["a", "b", "c"]),
        );

        let normalized = normalize_metadata(&metadata);
        assert_eq!(normalized.get("title").unwrap(), "GraphRAG");
        assert_eq!(normalized.get("count").unwrap(), "3");
        assert_eq!(normalized.get("active").unwrap(), "true");
        assert_eq!(normalized.get("tags").unwrap(), "a,b,c");
    }
}
