//! Ingestion pipeline (§4.4, C7).
//!
//! [`Ingestor::ingest`] is the single entry point both the HTTP handler and
//! the job-manager-driven folder import worker call: dedup check, Document
//! node creation, chunk-or-whole-text extraction, dual write to the graph
//! and vector stores, then concept/relationship merge into the graph.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::chunk;
use crate::config::ChunkingConfig;
use crate::dedupe::DuplicateDetector;
use crate::error::{CoreError, CoreResult};
use crate::extract::ConceptExtractor;
use crate::graph::GraphRepo;
use crate::ids;
use crate::llm::LlmGateway;
use crate::models::{
    Chunk, Concept, Document, DocumentMetadata, DocumentType, IngestReport, IngestStatus, Relationship, UnitOutcome,
};
use crate::vector::VectorRepo;

pub struct Ingestor {
    graph: Arc<dyn GraphRepo>,
    vector: Arc<dyn VectorRepo>,
    extractor: ConceptExtractor,
    detector: DuplicateDetector,
    chunking: ChunkingConfig,
}

impl Ingestor {
    pub fn new(
        graph: Arc<dyn GraphRepo>,
        vector: Arc<dyn VectorRepo>,
        gateway: Arc<LlmGateway>,
        chunking: ChunkingConfig,
        fuzzy_dedup_threshold: u8,
    ) -> Self {
        Self {
            graph,
            vector: vector.clone(),
            extractor: ConceptExtractor::new(Some(gateway)),
            detector: DuplicateDetector::new(vector, fuzzy_dedup_threshold),
            chunking,
        }
    }

    /// Runs the full ingestion pipeline for `text`/`metadata` of the given
    /// `document_type` (§4.4 steps 1-7). Rejects empty or whitespace-only
    /// `text` with `BadRequest` — this is the shared entry point for both the
    /// HTTP `/documents` handler and every MCP tool that ingests text, so the
    /// check lives here rather than at either boundary alone.
    pub async fn ingest(&self, text: &str, metadata: DocumentMetadata, document_type: DocumentType) -> CoreResult<IngestReport> {
        if text.trim().is_empty() {
            return Err(CoreError::bad_request("text must not be empty"));
        }

        let verdict = self.detector.classify(text, &metadata).await;
        if verdict.is_duplicate {
            return Ok(IngestReport {
                status: IngestStatus::Duplicate,
                document_id: verdict.existing_id,
                entities_count: 0,
                relationships_count: 0,
                duplicate_detection_method: verdict.method,
                details: Vec::new(),
            });
        }

        let document_id = ids::new_document_id();
        let content_hash = DuplicateDetector::content_hash(text);
        let normalized = chunk::normalize_whitespace(text);
        let now = chrono::Utc::now();
        let document = Document {
            id: document_id.clone(),
            title: metadata.title.clone(),
            source: metadata.source.clone(),
            document_type: document_type.as_str().to_string(),
            content_hash: content_hash.clone(),
            word_count: normalized.split_whitespace().count(),
            char_count: normalized.chars().count(),
            author: metadata.author.clone(),
            category: metadata.category.clone(),
            publication_date: metadata.publication_date.clone(),
            url: metadata.url.clone(),
            filename: metadata.filename.clone(),
            created_at: now,
            updated_at: now,
        };

        if let Err(e) = self.graph.create_document(&document).await {
            return Ok(IngestReport {
                status: IngestStatus::Failure,
                document_id: Some(document_id),
                entities_count: 0,
                relationships_count: 0,
                duplicate_detection_method: None,
                details: vec![UnitOutcome {
                    unit_index: 0,
                    succeeded: false,
                    error: Some(e.to_string()),
                }],
            });
        }

        let should_chunk = matches!(document_type, DocumentType::Pdf) && self.chunking.use_chunking_for_pdf;

        let (mut concepts, relationships, mut details) = if should_chunk {
            let chunks = chunk::split(&document_id, text, self.chunking.chunk_size, self.chunking.overlap);
            let outcome = self.extractor.extract_two_pass(&chunks, text, &metadata).await;

            let mut details = Vec::with_capacity(chunks.len());
            for c in &chunks {
                let result = self.ingest_chunk_unit(&document_id, c, &metadata, &outcome.concepts).await;
                details.push(UnitOutcome {
                    unit_index: c.chunk_index,
                    succeeded: result.is_ok(),
                    error: result.err().map(|e| e.to_string()),
                });
            }
            (outcome.concepts, outcome.relationships, details)
        } else {
            let outcome = self.extractor.extract(text, &metadata, None).await;

            for concept in &outcome.concepts {
                if let Err(e) = self.graph.link_mentions(&document_id, &concept.id, None).await {
                    tracing::warn!(error = %e, concept = %concept.name, "failed to link document mention");
                }
            }

            let meta = document_vector_metadata(&document, &metadata, &content_hash);
            let result = self.vector.upsert(&document_id, text, &meta).await;
            let details = vec![UnitOutcome {
                unit_index: 0,
                succeeded: result.is_ok(),
                error: result.err().map(|e| e.to_string()),
            }];
            (outcome.concepts, outcome.relationships, details)
        };

        let entities_count = self.merge_concepts(&mut concepts).await;
        let relationships_count = self.merge_relationships(&concepts, relationships).await;

        let any_succeeded = details.iter().any(|d| d.succeeded) || entities_count > 0;
        let any_failed = details.iter().any(|d| !d.succeeded);
        let status = if !any_succeeded {
            IngestStatus::Failure
        } else if any_failed {
            IngestStatus::PartialFailure
        } else {
            IngestStatus::Success
        };

        details.retain(|d| !d.succeeded);

        Ok(IngestReport {
            status,
            document_id: Some(document_id),
            entities_count,
            relationships_count,
            duplicate_detection_method: None,
            details,
        })
    }

    async fn ingest_chunk_unit(
        &self,
        document_id: &str,
        chunk: &Chunk,
        metadata: &DocumentMetadata,
        concepts: &[Concept],
    ) -> anyhow::Result<()> {
        self.graph.create_chunk(chunk).await.map_err(anyhow::Error::from)?;

        let meta = chunk_vector_metadata(document_id, chunk, metadata);
        self.vector
            .upsert(&chunk.id, &chunk.text, &meta)
            .await
            .map_err(anyhow::Error::from)?;

        for concept in concepts.iter().filter(|c| c.chunk_index == Some(chunk.chunk_index)) {
            self.graph
                .link_mentions(&chunk.id, &concept.id, Some(chunk.chunk_index))
                .await
                .map_err(anyhow::Error::from)?;
        }
        Ok(())
    }

    /// Merges each concept into the graph per §4.5; a merge failure is
    /// fatal for that concept only (§7) and is logged, not propagated.
    async fn merge_concepts(&self, concepts: &mut [Concept]) -> usize {
        let mut count = 0;
        for concept in concepts.iter_mut() {
            match self.graph.upsert_concept(concept).await {
                Ok(()) => count += 1,
                Err(e) => tracing::warn!(error = %e, concept = %concept.name, "concept merge failed"),
            }
        }
        count
    }

    /// Merges each relationship into the graph; failures are logged and
    /// skipped (§7), never rolled back.
    async fn merge_relationships(&self, concepts: &[Concept], relationships: Vec<Relationship>) -> usize {
        let known_ids: std::collections::HashSet<&str> = concepts.iter().map(|c| c.id.as_str()).collect();
        let mut count = 0;
        for rel in relationships {
            if !known_ids.contains(rel.source_id.as_str()) || !known_ids.contains(rel.target_id.as_str()) {
                continue;
            }
            match self.graph.upsert_edge(&rel).await {
                Ok(()) => count += 1,
                Err(e) => tracing::warn!(error = %e, source = %rel.source_id, target = %rel.target_id, "relationship merge failed"),
            }
        }
        count
    }
}

fn document_vector_metadata(document: &Document, metadata: &DocumentMetadata, content_hash: &str) -> HashMap<String, Value> {
    let mut m = HashMap::new();
    m.insert("document_id".to_string(), Value::String(document.id.clone()));
    m.insert("hash".to_string(), Value::String(content_hash.to_string()));
    m.insert("document_type".to_string(), Value::String(document.document_type.clone()));
    if let Some(v) = &document.title {
        m.insert("title".to_string(), Value::String(v.clone()));
    }
    if let Some(v) = metadata.title_lower() {
        m.insert("title_lower".to_string(), Value::String(v));
    }
    if let Some(v) = &document.author {
        m.insert("author".to_string(), Value::String(v.clone()));
    }
    if let Some(v) = &document.source {
        m.insert("source".to_string(), Value::String(v.clone()));
    }
    if let Some(v) = &metadata.file_path {
        m.insert("file_path".to_string(), Value::String(v.clone()));
    }
    if let Some(v) = &document.category {
        m.insert("category".to_string(), Value::String(v.clone()));
    }
    if let Some(v) = &document.publication_date {
        m.insert("publication_date".to_string(), Value::String(v.clone()));
    }
    if let Some(v) = &document.url {
        m.insert("url".to_string(), Value::String(v.clone()));
    }
    if let Some(v) = &document.filename {
        m.insert("filename".to_string(), Value::String(v.clone()));
    }
    m
}

fn chunk_vector_metadata(document_id: &str, chunk: &Chunk, metadata: &DocumentMetadata) -> HashMap<String, Value> {
    let mut m = HashMap::new();
    m.insert("document_id".to_string(), Value::String(document_id.to_string()));
    m.insert("chunk_id".to_string(), Value::String(chunk.id.clone()));
    m.insert("chunk_index".to_string(), Value::from(chunk.chunk_index));
    if let Some(v) = &metadata.title {
        m.insert("title".to_string(), Value::String(v.clone()));
    }
    m
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::memory::InMemoryGraphRepo;
    use crate::vector::sqlite_store::SqliteVectorStore;

    async fn test_ingestor() -> (Ingestor, Arc<dyn GraphRepo>) {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let gateway = Arc::new(LlmGateway::new(None, None));
        let vector = Arc::new(SqliteVectorStore::new(pool, gateway.clone()).await.unwrap());
        let graph: Arc<dyn GraphRepo> = Arc::new(InMemoryGraphRepo::new());
        let chunking = ChunkingConfig {
            chunk_size: 200,
            overlap: 20,
            use_chunking_for_pdf: true,
        };
        let ingestor = Ingestor::new(graph.clone(), vector, gateway, chunking, 90);
        (ingestor, graph)
    }

    #[tokio::test]
    async fn ingest_text_document_creates_document_and_concepts() {
        let (ingestor, graph) = test_ingestor().await;
        let mut metadata = DocumentMetadata::default();
        metadata.title = Some("GraphRAG Overview".to_string());
        metadata.concepts = Some(serde_json::json!("GraphRAG, Neo4j"));

        let report = ingestor
            .ingest("GraphRAG combines a knowledge graph with vector search.", metadata, DocumentType::Text)
            .await
            .unwrap();

        assert_eq!(report.status, IngestStatus::Success);
        assert!(report.document_id.is_some());
        assert!(report.entities_count >= 2);
        let doc = graph.get_document(report.document_id.as_ref().unwrap()).await.unwrap();
        assert!(doc.is_some());
    }

    #[tokio::test]
    async fn ingest_duplicate_text_is_detected() {
        let (ingestor, _graph) = test_ingestor().await;
        let metadata = DocumentMetadata::default();
        let first = ingestor
            .ingest("Repeated content for dedup test.", metadata.clone(), DocumentType::Text)
            .await
            .unwrap();
        assert_eq!(first.status, IngestStatus::Success);

        let second = ingestor
            .ingest("Repeated content for dedup test.", metadata, DocumentType::Text)
            .await
            .unwrap();
        assert_eq!(second.status, IngestStatus::Duplicate);
        assert_eq!(second.document_id, first.document_id);
    }

    #[tokio::test]
    async fn ingest_rejects_empty_text() {
        let (ingestor, _graph) = test_ingestor().await;
        let err = ingestor.ingest("", DocumentMetadata::default(), DocumentType::Text).await.unwrap_err();
        assert!(matches!(err, CoreError::BadRequest(_)));
    }

    #[tokio::test]
    async fn ingest_rejects_whitespace_only_text() {
        let (ingestor, _graph) = test_ingestor().await;
        let err = ingestor
            .ingest("   \n\t  ", DocumentMetadata::default(), DocumentType::Text)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::BadRequest(_)));
    }

    #[tokio::test]
    async fn ingest_pdf_with_chunking_creates_chunks() {
        let (ingestor, graph) = test_ingestor().await;
        let mut metadata = DocumentMetadata::default();
        metadata.title = Some("Long PDF".to_string());
        let long_text = "GraphRAG is a retrieval technique. ".repeat(30);

        let report = ingestor.ingest(&long_text, metadata, DocumentType::Pdf).await.unwrap();
        assert_eq!(report.status, IngestStatus::Success);
        let chunks = graph.chunks_of_document(report.document_id.as_ref().unwrap()).await.unwrap();
        assert!(chunks.len() > 1);
    }
}
