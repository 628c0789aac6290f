//! Hybrid retrieval (§4.7, C8): vector top-k fused with bounded graph
//! traversal seeded from the concepts those chunks mention.
//!
//! [`hybrid_search`] is a free function over `&dyn VectorRepo` / `&dyn
//! GraphRepo` rather than a struct — there is no per-call state to hold, and
//! both backends are already trait objects at the call sites (HTTP handlers,
//! MCP tools).

use std::collections::HashSet;

use crate::error::CoreResult;
use crate::graph::{GraphRepo, TraversalHit};
use crate::models::VectorMatch;
use crate::vector::VectorRepo;

/// Result of [`hybrid_search`]: the two retrieval streams, kept separate per
/// §4.7 step 5 — callers re-rank or display as they see fit.
#[derive(Debug, Clone, serde::Serialize)]
pub struct HybridSearchResult {
    pub vector_results: Vec<VectorMatch>,
    pub graph_results: Vec<TraversalHit>,
}

/// Runs the 5-step hybrid search algorithm for a single `query` string.
///
/// 1. `vector.query` for the `k_vector` nearest chunks/documents.
/// 2. Extract seed concept ids from each hit's metadata: both the
///    `concept_ids` (comma-joined) and `concept_id` (singular) keys are
///    honored, the former being canonical.
/// 3. `graph.traverse` all seeds at once within `max_hops`, which already
///    computes per-target path scores (sum of edge strengths, 0.5 default for
///    edges that lack one) and keeps only the max score seen per concept.
/// 4. The graph repo's traversal result is already fused and sorted
///    descending by score with stable ties, so no further merge is needed
///    here.
/// 5. Return both streams separately.
pub async fn hybrid_search(
    vector: &dyn VectorRepo,
    graph: &dyn GraphRepo,
    query: &str,
    k_vector: usize,
    max_hops: usize,
) -> CoreResult<HybridSearchResult> {
    let mut batches = vector.query(&[query.to_string()], k_vector, None).await?;
    let vector_results = batches.pop().unwrap_or_default();

    let seed_ids = seed_concept_ids(&vector_results);
    let graph_results = if seed_ids.is_empty() {
        Vec::new()
    } else {
        graph.traverse(&seed_ids, max_hops).await?
    };

    Ok(HybridSearchResult {
        vector_results,
        graph_results,
    })
}

/// Collects the distinct concept ids attached to a batch of vector hits,
/// preserving first-seen order (insertion order feeds the traversal's own
/// tie-breaking).
fn seed_concept_ids(matches: &[VectorMatch]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    let mut push = |id: &str| {
        if seen.insert(id.to_string()) {
            ids.push(id.to_string());
        }
    };

    for m in matches {
        if let Some(id) = m.metadata.get("concept_ids") {
            for part in id.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                push(part);
            }
        }
        if let Some(id) = m.metadata.get("concept_id") {
            if !id.is_empty() {
                push(id);
            }
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::memory::InMemoryGraphRepo;
    use crate::llm::LlmGateway;
    use crate::models::Relationship;
    use crate::vector::sqlite_store::SqliteVectorStore;
    use std::sync::Arc;

    fn edge(source: &str, target: &str, strength: f64) -> Relationship {
        let now = chrono::Utc::now();
        Relationship {
            source_id: source.to_string(),
            target_id: target.to_string(),
            kind: "RELATED_TO".to_string(),
            strength,
            description: None,
            method: "llm".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn seed_concept_ids_reads_both_metadata_keys_and_dedupes() {
        let mut m1 = std::collections::HashMap::new();
        m1.insert("concept_ids".to_string(), "c-a, c-b".to_string());
        let mut m2 = std::collections::HashMap::new();
        m2.insert("concept_id".to_string(), "c-b".to_string());
        let matches = vec![
            VectorMatch {
                id: "1".to_string(),
                document: "x".to_string(),
                metadata: m1,
                distance: 0.1,
            },
            VectorMatch {
                id: "2".to_string(),
                document: "y".to_string(),
                metadata: m2,
                distance: 0.2,
            },
        ];
        assert_eq!(seed_concept_ids(&matches), vec!["c-a".to_string(), "c-b".to_string()]);
    }

    #[tokio::test]
    async fn hybrid_search_fuses_vector_hits_with_graph_traversal() {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let gateway = Arc::new(LlmGateway::new(None, None));
        let vector = SqliteVectorStore::new(pool, gateway).await.unwrap();
        let graph = InMemoryGraphRepo::new();

        let mut meta = std::collections::HashMap::new();
        meta.insert("concept_ids".to_string(), serde_json::Value::String("c-nn".to_string()));
        vector.upsert("chunk-1", "neural networks are a kind of model", &meta).await.unwrap();

        graph.upsert_edge(&edge("c-nn", "c-dl", 0.8)).await.unwrap();

        let result = hybrid_search(&vector, &graph, "neural networks", 5, 2).await.unwrap();
        assert_eq!(result.vector_results.len(), 1);
        assert_eq!(result.graph_results.len(), 1);
        assert_eq!(result.graph_results[0].concept_id, "c-dl");
    }

    #[tokio::test]
    async fn hybrid_search_returns_empty_graph_results_without_seeds() {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let gateway = Arc::new(LlmGateway::new(None, None));
        let vector = SqliteVectorStore::new(pool, gateway).await.unwrap();
        let graph = InMemoryGraphRepo::new();

        vector
            .upsert("chunk-1", "no concepts attached here", &std::collections::HashMap::new())
            .await
            .unwrap();

        let result = hybrid_search(&vector, &graph, "no concepts", 5, 2).await.unwrap();
        assert_eq!(result.vector_results.len(), 1);
        assert!(result.graph_results.is_empty());
    }
}
