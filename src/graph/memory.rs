//! In-process graph store.
//!
//! Used for unit/integration tests and as a dependency-free default so the
//! crate is exercisable without a live Neo4j instance. Mirrors the shape of
//! a simple adjacency-map store; the concurrency guarantees required by §5
//! (serialized concept creation under the same `normalized_name`) come from
//! holding the single `RwLock` write guard for the whole of `upsert_concept`.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{GraphRepo, TraversalHit};
use crate::error::CoreResult;
use crate::models::{Chunk, Concept, Document, Relationship};

#[derive(Default)]
struct Inner {
    documents: HashMap<String, Document>,
    chunks: HashMap<String, Chunk>,
    chunks_by_document: HashMap<String, Vec<String>>,
    concepts: HashMap<String, Concept>,
    concepts_by_normalized_name: HashMap<String, String>,
    /// Keyed by (source_id, target_id, kind).
    edges: HashMap<(String, String, String), Relationship>,
    /// RELATED_TO adjacency for traversal: concept_id -> [(target_id, strength)].
    related_adjacency: HashMap<String, Vec<(String, f64)>>,
    /// source_id (document or chunk) -> (concept id, chunk_index) mentioned.
    mentions: HashMap<String, Vec<(String, Option<i64>)>>,
}

pub struct InMemoryGraphRepo {
    inner: RwLock<Inner>,
}

impl InMemoryGraphRepo {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }
}

impl Default for InMemoryGraphRepo {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GraphRepo for InMemoryGraphRepo {
    async fn create_document(&self, document: &Document) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.documents.insert(document.id.clone(), document.clone());
        Ok(())
    }

    async fn get_document(&self, document_id: &str) -> CoreResult<Option<Document>> {
        Ok(self.inner.read().await.documents.get(document_id).cloned())
    }

    async fn create_chunk(&self, chunk: &Chunk) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        inner
            .chunks_by_document
            .entry(chunk.document_id.clone())
            .or_default()
            .push(chunk.id.clone());
        inner.chunks.insert(chunk.id.clone(), chunk.clone());
        Ok(())
    }

    async fn chunks_of_document(&self, document_id: &str) -> CoreResult<Vec<Chunk>> {
        let inner = self.inner.read().await;
        let ids = inner
            .chunks_by_document
            .get(document_id)
            .cloned()
            .unwrap_or_default();
        Ok(ids
            .into_iter()
            .filter_map(|id| inner.chunks.get(&id).cloned())
            .collect())
    }

    async fn upsert_concept(&self, concept: &mut Concept) -> CoreResult<()> {
        let mut inner = self.inner.write().await;

        if let Some(existing) = inner.concepts.get(&concept.id).cloned() {
            concept.created_at = existing.created_at;
            inner.concepts.insert(concept.id.clone(), concept.clone());
            inner
                .concepts_by_normalized_name
                .insert(concept.normalized_name.clone(), concept.id.clone());
            return Ok(());
        }

        if let Some(existing_id) = inner
            .concepts_by_normalized_name
            .get(&concept.normalized_name)
            .cloned()
        {
            let existing = inner.concepts.get(&existing_id).cloned().unwrap();
            concept.id = existing_id.clone();
            concept.created_at = existing.created_at;
            inner.concepts.insert(existing_id, concept.clone());
            return Ok(());
        }

        inner
            .concepts_by_normalized_name
            .insert(concept.normalized_name.clone(), concept.id.clone());
        inner.concepts.insert(concept.id.clone(), concept.clone());
        Ok(())
    }

    async fn get_concept(&self, concept_id: &str) -> CoreResult<Option<Concept>> {
        Ok(self.inner.read().await.concepts.get(concept_id).cloned())
    }

    async fn find_concept_by_name(&self, normalized_name: &str) -> CoreResult<Option<Concept>> {
        let inner = self.inner.read().await;
        Ok(inner
            .concepts_by_normalized_name
            .get(normalized_name)
            .and_then(|id| inner.concepts.get(id))
            .cloned())
    }

    async fn list_concepts(&self) -> CoreResult<Vec<Concept>> {
        Ok(self.inner.read().await.concepts.values().cloned().collect())
    }

    async fn upsert_edge(&self, rel: &Relationship) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        let key = (rel.source_id.clone(), rel.target_id.clone(), rel.kind.clone());

        let merged = if let Some(existing) = inner.edges.get(&key) {
            let mut merged = rel.clone();
            merged.strength = existing.strength.max(rel.strength);
            merged.created_at = existing.created_at;
            merged
        } else {
            rel.clone()
        };

        if merged.kind == "RELATED_TO" {
            let adj = inner.related_adjacency.entry(merged.source_id.clone()).or_default();
            if let Some(entry) = adj.iter_mut().find(|(id, _)| *id == merged.target_id) {
                entry.1 = merged.strength;
            } else {
                adj.push((merged.target_id.clone(), merged.strength));
            }
        }

        inner.edges.insert(key, merged);
        Ok(())
    }

    async fn link_mentions(&self, source_id: &str, concept_id: &str, chunk_index: Option<i64>) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        let entry = inner.mentions.entry(source_id.to_string()).or_default();
        if let Some(existing) = entry.iter_mut().find(|(id, _)| id == concept_id) {
            existing.1 = chunk_index;
        } else {
            entry.push((concept_id.to_string(), chunk_index));
        }
        Ok(())
    }

    async fn traverse(&self, seed_ids: &[String], max_hops: usize) -> CoreResult<Vec<TraversalHit>> {
        if max_hops == 0 || seed_ids.is_empty() {
            return Ok(Vec::new());
        }

        let inner = self.inner.read().await;
        let seeds: std::collections::HashSet<&str> = seed_ids.iter().map(|s| s.as_str()).collect();

        let mut best: HashMap<String, f64> = seed_ids.iter().map(|s| (s.clone(), 0.0)).collect();
        let mut discovery_order: Vec<String> = Vec::new();

        for _ in 0..max_hops {
            let mut next = best.clone();
            for (node, score) in best.iter() {
                if let Some(neighbors) = inner.related_adjacency.get(node) {
                    for (target, strength) in neighbors {
                        let candidate = score + strength;
                        let is_new = !next.contains_key(target);
                        let improved = next.get(target).map(|cur| candidate > *cur).unwrap_or(true);
                        if improved {
                            next.insert(target.clone(), candidate);
                        }
                        if is_new && !seeds.contains(target.as_str()) {
                            discovery_order.push(target.clone());
                        }
                    }
                }
            }
            best = next;
        }

        let mut hits: Vec<TraversalHit> = discovery_order
            .into_iter()
            .filter_map(|id| {
                let score = *best.get(&id)?;
                let name = inner.concepts.get(&id).map(|c| c.name.clone()).unwrap_or_else(|| id.clone());
                Some(TraversalHit {
                    concept_id: id,
                    name,
                    score,
                })
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        Ok(hits)
    }

    async fn documents_mentioning(&self, normalized_name: &str, limit: usize) -> CoreResult<Vec<Document>> {
        let inner = self.inner.read().await;
        let Some(concept_id) = inner.concepts_by_normalized_name.get(normalized_name).cloned() else {
            return Ok(Vec::new());
        };

        let mut doc_ids: Vec<String> = Vec::new();
        for (source_id, concept_ids) in inner.mentions.iter() {
            if !concept_ids.iter().any(|(id, _)| *id == concept_id) {
                continue;
            }
            let doc_id = if inner.documents.contains_key(source_id) {
                Some(source_id.clone())
            } else {
                inner.chunks.get(source_id).map(|c| c.document_id.clone())
            };
            if let Some(doc_id) = doc_id {
                if !doc_ids.contains(&doc_id) {
                    doc_ids.push(doc_id);
                }
            }
        }

        Ok(doc_ids
            .into_iter()
            .take(limit)
            .filter_map(|id| inner.documents.get(&id).cloned())
            .collect())
    }

    async fn ping(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Concept;
    use chrono::Utc;

    fn concept(id: &str, name: &str) -> Concept {
        Concept {
            id: id.to_string(),
            name: name.to_string(),
            normalized_name: Concept::normalize(name),
            concept_type: "Concept".to_string(),
            abbreviation: None,
            description: None,
            source: "llm".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            chunk_index: None,
        }
    }

    fn edge(source: &str, target: &str, strength: f64) -> Relationship {
        Relationship {
            source_id: source.to_string(),
            target_id: target.to_string(),
            kind: "RELATED_TO".to_string(),
            strength,
            description: None,
            method: "llm".to_string(),
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn upsert_concept_adopts_existing_id_on_name_match() {
        let repo = InMemoryGraphRepo::new();
        let mut a = concept("concept-llm-x-aaaaaaaa", "GraphRAG");
        repo.upsert_concept(&mut a).await.unwrap();

        let mut b = concept("concept-keyword_text-x-bbbbbbbb", "graphrag");
        repo.upsert_concept(&mut b).await.unwrap();

        assert_eq!(b.id, a.id);
        assert_eq!(repo.list_concepts().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn upsert_edge_takes_max_strength() {
        let repo = InMemoryGraphRepo::new();
        repo.upsert_edge(&edge("a", "b", 0.3)).await.unwrap();
        repo.upsert_edge(&edge("a", "b", 0.9)).await.unwrap();

        let hits = repo.traverse(&["a".to_string()], 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].score, 0.9);
    }

    #[tokio::test]
    async fn traverse_respects_max_hops_zero() {
        let repo = InMemoryGraphRepo::new();
        repo.upsert_edge(&edge("a", "b", 0.8)).await.unwrap();
        let hits = repo.traverse(&["a".to_string()], 0).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn traverse_accumulates_path_score_across_hops() {
        let repo = InMemoryGraphRepo::new();
        repo.upsert_edge(&edge("c-nn", "c-dl", 0.8)).await.unwrap();
        repo.upsert_edge(&edge("c-dl", "c-ml", 0.7)).await.unwrap();

        let hits = repo.traverse(&["c-nn".to_string()], 2).await.unwrap();
        let dl = hits.iter().find(|h| h.concept_id == "c-dl").unwrap();
        let ml = hits.iter().find(|h| h.concept_id == "c-ml").unwrap();
        assert!((dl.score - 0.8).abs() < 1e-9);
        assert!((ml.score - 1.5).abs() < 1e-9);
        // descending order
        assert_eq!(hits[0].concept_id, "c-ml");
    }
}
