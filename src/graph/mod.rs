//! Narrow facade over a property-graph store (§4.5, C1).
//!
//! `GraphRepo` is the only way the rest of the crate touches the graph.
//! Two backends exist: [`neo4j::Neo4jGraphRepo`] for production use and
//! [`memory::InMemoryGraphRepo`] for tests and environments without a live
//! Neo4j instance.

pub mod memory;
pub mod neo4j;

use async_trait::async_trait;

use crate::error::CoreResult;
use crate::models::{Chunk, Concept, Document, Relationship};

/// One step of a bounded graph walk from a seed concept: the concept
/// reached and the accumulated path score (sum of edge strengths along the
/// path actually taken to first reach it).
#[derive(Debug, Clone)]
pub struct TraversalHit {
    pub concept_id: String,
    pub name: String,
    pub score: f64,
}

#[async_trait]
pub trait GraphRepo: Send + Sync {
    /// Creates a Document node. Documents are never re-created; callers
    /// must have already confirmed non-duplication.
    async fn create_document(&self, document: &Document) -> CoreResult<()>;

    async fn get_document(&self, document_id: &str) -> CoreResult<Option<Document>>;

    /// Creates a Chunk node and the `Document-[:HAS_CHUNK]->Chunk` edge.
    async fn create_chunk(&self, chunk: &Chunk) -> CoreResult<()>;

    async fn chunks_of_document(&self, document_id: &str) -> CoreResult<Vec<Chunk>>;

    /// Merges a concept per the §4.5 identity rules. On return,
    /// `concept.id` has been rewritten to the adopted id when an existing
    /// node with the same `normalized_name` (or the same `id`) was found.
    async fn upsert_concept(&self, concept: &mut Concept) -> CoreResult<()>;

    async fn get_concept(&self, concept_id: &str) -> CoreResult<Option<Concept>>;

    async fn find_concept_by_name(&self, normalized_name: &str) -> CoreResult<Option<Concept>>;

    async fn list_concepts(&self) -> CoreResult<Vec<Concept>>;

    /// Merges a directed edge per the §4.5 merge rule
    /// (`strength := max(existing, new)`, `description`/`method` overwritten).
    async fn upsert_edge(&self, rel: &Relationship) -> CoreResult<()>;

    /// Links a Document or Chunk to a Concept via `MENTIONS_CONCEPT`. Plain
    /// presence edge, no `strength`. `chunk_index` records which chunk the
    /// mention was observed in as an edge property; `None` for whole-document
    /// (unchunked) mentions.
    async fn link_mentions(&self, source_id: &str, concept_id: &str, chunk_index: Option<i64>) -> CoreResult<()>;

    /// Concepts reachable from `seed_ids` within `max_hops` hops over
    /// `RELATED_TO`, scored by the sum of edge strengths along the path
    /// first used to reach each destination (accumulated per destination
    /// concept, not per path — §9). `max_hops == 0` yields an empty result.
    async fn traverse(&self, seed_ids: &[String], max_hops: usize) -> CoreResult<Vec<TraversalHit>>;

    /// Documents that mention the given concept (by normalized name),
    /// directly or via one of their chunks.
    async fn documents_mentioning(&self, normalized_name: &str, limit: usize) -> CoreResult<Vec<Document>>;

    /// True when the store is reachable.
    async fn ping(&self) -> bool;
}
