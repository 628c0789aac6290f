//! Neo4j-backed [`GraphRepo`].
//!
//! MERGE-based upserts follow the `ON CREATE SET` / `ON MATCH SET` idiom;
//! unlike a plain accumulating merge, concept identity adoption and
//! max-strength edge merge (§4.5) are implemented explicitly rather than
//! left to Cypher's default MERGE semantics, since Neo4j has no built-in
//! "keep the larger of two properties" operator.

use async_trait::async_trait;
use neo4rs::{query, Graph};
use tracing::warn;

use super::{GraphRepo, TraversalHit};
use crate::error::{CoreError, CoreResult};
use crate::models::{Chunk, Concept, Document, Relationship};

pub struct Neo4jGraphRepo {
    graph: Graph,
}

impl Neo4jGraphRepo {
    pub async fn connect(uri: &str, user: &str, password: &str) -> CoreResult<Self> {
        let graph = Graph::new(uri, user, password)
            .await
            .map_err(|e| CoreError::upstream(format!("failed to connect to Neo4j: {e}")))?;
        Ok(Self { graph })
    }

    fn map_err(context: &str) -> impl Fn(neo4rs::Error) -> CoreError + '_ {
        move |e| CoreError::upstream(format!("{context}: {e}"))
    }
}

#[async_trait]
impl GraphRepo for Neo4jGraphRepo {
    async fn create_document(&self, d: &Document) -> CoreResult<()> {
        let q = query(
            "MERGE (n:Document {id: $id}) SET n.title = $title, n.source = $source, \
             n.document_type = $document_type, n.content_hash = $content_hash, \
             n.word_count = $word_count, n.char_count = $char_count, n.author = $author, \
             n.category = $category, n.publication_date = $publication_date, n.url = $url, \
             n.filename = $filename, n.created_at = $created_at, n.updated_at = $updated_at",
        )
        .param("id", d.id.clone())
        .param("title", d.title.clone().unwrap_or_default())
        .param("source", d.source.clone().unwrap_or_default())
        .param("document_type", d.document_type.clone())
        .param("content_hash", d.content_hash.clone())
        .param("word_count", d.word_count as i64)
        .param("char_count", d.char_count as i64)
        .param("author", d.author.clone().unwrap_or_default())
        .param("category", d.category.clone().unwrap_or_default())
        .param("publication_date", d.publication_date.clone().unwrap_or_default())
        .param("url", d.url.clone().unwrap_or_default())
        .param("filename", d.filename.clone().unwrap_or_default())
        .param("created_at", d.created_at.to_rfc3339())
        .param("updated_at", d.updated_at.to_rfc3339());

        self.graph.run(q).await.map_err(Self::map_err("create_document"))
    }

    async fn get_document(&self, document_id: &str) -> CoreResult<Option<Document>> {
        let mut result = self
            .graph
            .execute(query("MATCH (n:Document {id: $id}) RETURN n").param("id", document_id.to_string()))
            .await
            .map_err(Self::map_err("get_document"))?;

        if let Some(row) = result.next().await.map_err(Self::map_err("get_document"))? {
            Ok(Some(row_to_document(&row)?))
        } else {
            Ok(None)
        }
    }

    async fn create_chunk(&self, c: &Chunk) -> CoreResult<()> {
        let q = query(
            "MATCH (d:Document {id: $document_id}) \
             MERGE (c:Chunk {id: $id}) SET c.document_id = $document_id, c.chunk_index = $chunk_index, \
             c.text = $text, c.text_hash = $text_hash, c.char_count = $char_count, c.word_count = $word_count \
             MERGE (d)-[:HAS_CHUNK]->(c)",
        )
        .param("id", c.id.clone())
        .param("document_id", c.document_id.clone())
        .param("chunk_index", c.chunk_index)
        .param("text", c.text.clone())
        .param("text_hash", c.text_hash.clone())
        .param("char_count", c.char_count as i64)
        .param("word_count", c.word_count as i64);

        self.graph.run(q).await.map_err(Self::map_err("create_chunk"))
    }

    async fn chunks_of_document(&self, document_id: &str) -> CoreResult<Vec<Chunk>> {
        let mut result = self
            .graph
            .execute(
                query(
                    "MATCH (:Document {id: $id})-[:HAS_CHUNK]->(c:Chunk) RETURN c ORDER BY c.chunk_index",
                )
                .param("id", document_id.to_string()),
            )
            .await
            .map_err(Self::map_err("chunks_of_document"))?;

        let mut chunks = Vec::new();
        while let Some(row) = result.next().await.map_err(Self::map_err("chunks_of_document"))? {
            chunks.push(row_to_chunk(&row)?);
        }
        Ok(chunks)
    }

    async fn upsert_concept(&self, concept: &mut Concept) -> CoreResult<()> {
        // 1. Same id already present: plain attribute update.
        let mut by_id = self
            .graph
            .execute(query("MATCH (n {id: $id}) RETURN n.created_at AS created_at").param("id", concept.id.clone()))
            .await
            .map_err(Self::map_err("upsert_concept"))?;

        if let Some(row) = by_id.next().await.map_err(Self::map_err("upsert_concept"))? {
            let created_at: String = row.get("created_at").unwrap_or_default();
            if let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(&created_at) {
                concept.created_at = parsed.with_timezone(&chrono::Utc);
            }
            self.set_concept_attrs(concept).await?;
            return Ok(());
        }

        // 2. Existing node with same normalized_name: adopt its id.
        let mut by_name = self
            .graph
            .execute(
                query("MATCH (n {normalized_name: $nn}) RETURN n.id AS id, n.created_at AS created_at")
                    .param("nn", concept.normalized_name.clone()),
            )
            .await
            .map_err(Self::map_err("upsert_concept"))?;

        if let Some(row) = by_name.next().await.map_err(Self::map_err("upsert_concept"))? {
            let existing_id: String = row.get("id").unwrap_or_default();
            let created_at: String = row.get("created_at").unwrap_or_default();
            concept.id = existing_id;
            if let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(&created_at) {
                concept.created_at = parsed.with_timezone(&chrono::Utc);
            }
            self.set_concept_attrs(concept).await?;
            return Ok(());
        }

        // 3. New node, labelled with the sanitized type.
        let label = Concept::sanitize_type(&concept.concept_type);
        let cypher = format!(
            "CREATE (n:Concept{}{{id: $id, name: $name, normalized_name: $normalized_name, \
             type: $type, abbreviation: $abbreviation, description: $description, source: $source, \
             created_at: $created_at, updated_at: $updated_at, chunk_index: $chunk_index}})",
            if label == "Concept" { String::new() } else { format!(":{label}") }
        );
        let q = query(&cypher)
            .param("id", concept.id.clone())
            .param("name", concept.name.clone())
            .param("normalized_name", concept.normalized_name.clone())
            .param("type", concept.concept_type.clone())
            .param("abbreviation", concept.abbreviation.clone().unwrap_or_default())
            .param("description", concept.description.clone().unwrap_or_default())
            .param("source", concept.source.clone())
            .param("created_at", concept.created_at.to_rfc3339())
            .param("updated_at", concept.updated_at.to_rfc3339())
            .param("chunk_index", concept.chunk_index.unwrap_or(-1));

        self.graph.run(q).await.map_err(Self::map_err("upsert_concept"))
    }

    async fn get_concept(&self, concept_id: &str) -> CoreResult<Option<Concept>> {
        let mut result = self
            .graph
            .execute(query("MATCH (n {id: $id}) RETURN n").param("id", concept_id.to_string()))
            .await
            .map_err(Self::map_err("get_concept"))?;

        if let Some(row) = result.next().await.map_err(Self::map_err("get_concept"))? {
            Ok(Some(row_to_concept(&row)?))
        } else {
            Ok(None)
        }
    }

    async fn find_concept_by_name(&self, normalized_name: &str) -> CoreResult<Option<Concept>> {
        let mut result = self
            .graph
            .execute(
                query("MATCH (n {normalized_name: $nn}) RETURN n").param("nn", normalized_name.to_string()),
            )
            .await
            .map_err(Self::map_err("find_concept_by_name"))?;

        if let Some(row) = result.next().await.map_err(Self::map_err("find_concept_by_name"))? {
            Ok(Some(row_to_concept(&row)?))
        } else {
            Ok(None)
        }
    }

    async fn list_concepts(&self) -> CoreResult<Vec<Concept>> {
        let mut result = self
            .graph
            .execute(query("MATCH (n:Concept) RETURN n"))
            .await
            .map_err(Self::map_err("list_concepts"))?;

        let mut concepts = Vec::new();
        while let Some(row) = result.next().await.map_err(Self::map_err("list_concepts"))? {
            concepts.push(row_to_concept(&row)?);
        }
        Ok(concepts)
    }

    async fn upsert_edge(&self, rel: &Relationship) -> CoreResult<()> {
        let cypher = format!(
            "MATCH (a {{id: $source}}), (b {{id: $target}}) \
             MERGE (a)-[r:`{}`]->(b) \
             ON CREATE SET r.strength = $strength, r.description = $description, r.method = $method, \
             r.created_at = $created_at \
             ON MATCH SET r.strength = CASE WHEN r.strength > $strength THEN r.strength ELSE $strength END, \
             r.description = $description, r.method = $method, r.updated_at = $updated_at",
            rel.kind
        );
        let q = query(&cypher)
            .param("source", rel.source_id.clone())
            .param("target", rel.target_id.clone())
            .param("strength", rel.strength)
            .param("description", rel.description.clone().unwrap_or_default())
            .param("method", rel.method.clone())
            .param("created_at", rel.created_at.to_rfc3339())
            .param("updated_at", rel.updated_at.unwrap_or_else(chrono::Utc::now).to_rfc3339());

        self.graph.run(q).await.map_err(Self::map_err("upsert_edge"))
    }

    async fn link_mentions(&self, source_id: &str, concept_id: &str, chunk_index: Option<i64>) -> CoreResult<()> {
        let q = query(
            "MATCH (s {id: $source}), (c {id: $concept}) \
             MERGE (s)-[r:MENTIONS_CONCEPT]->(c) \
             SET r.chunk_index = $chunk_index",
        )
        .param("source", source_id.to_string())
        .param("concept", concept_id.to_string())
        .param("chunk_index", chunk_index.unwrap_or(-1));

        self.graph.run(q).await.map_err(Self::map_err("link_mentions"))
    }

    async fn traverse(&self, seed_ids: &[String], max_hops: usize) -> CoreResult<Vec<TraversalHit>> {
        if max_hops == 0 || seed_ids.is_empty() {
            return Ok(Vec::new());
        }

        let cypher = format!(
            "MATCH path = (seed)-[:RELATED_TO*1..{max_hops}]->(dest) \
             WHERE seed.id IN $seeds AND NOT dest.id IN $seeds \
             WITH dest, reduce(s = 0.0, r IN relationships(path) | s + r.strength) AS pathScore \
             RETURN dest.id AS id, dest.name AS name, max(pathScore) AS score \
             ORDER BY score DESC"
        );

        let mut result = self
            .graph
            .execute(query(&cypher).param("seeds", seed_ids.to_vec()))
            .await
            .map_err(Self::map_err("traverse"))?;

        let mut hits = Vec::new();
        while let Some(row) = result.next().await.map_err(Self::map_err("traverse"))? {
            hits.push(TraversalHit {
                concept_id: row.get("id").unwrap_or_default(),
                name: row.get("name").unwrap_or_default(),
                score: row.get("score").unwrap_or(0.0),
            });
        }
        Ok(hits)
    }

    async fn documents_mentioning(&self, normalized_name: &str, limit: usize) -> CoreResult<Vec<Document>> {
        let cypher = "MATCH (c {normalized_name: $nn}) \
             MATCH (d:Document)-[:MENTIONS_CONCEPT]->(c) \
             RETURN DISTINCT d LIMIT $limit \
             UNION \
             MATCH (c {normalized_name: $nn}) \
             MATCH (d:Document)-[:HAS_CHUNK]->(:Chunk)-[:MENTIONS_CONCEPT]->(c) \
             RETURN DISTINCT d LIMIT $limit";

        let mut result = self
            .graph
            .execute(
                query(cypher)
                    .param("nn", normalized_name.to_string())
                    .param("limit", limit as i64),
            )
            .await
            .map_err(Self::map_err("documents_mentioning"))?;

        let mut docs = Vec::new();
        while let Some(row) = result.next().await.map_err(Self::map_err("documents_mentioning"))? {
            docs.push(row_to_document(&row)?);
            if docs.len() >= limit {
                break;
            }
        }
        Ok(docs)
    }

    async fn ping(&self) -> bool {
        match self.graph.execute(query("RETURN 1")).await {
            Ok(mut stream) => stream.next().await.is_ok(),
            Err(e) => {
                warn!(error = %e, "neo4j ping failed");
                false
            }
        }
    }
}

impl Neo4jGraphRepo {
    async fn set_concept_attrs(&self, concept: &Concept) -> CoreResult<()> {
        let q = query(
            "MATCH (n {id: $id}) SET n.name = $name, n.normalized_name = $normalized_name, \
             n.type = $type, n.abbreviation = $abbreviation, n.description = $description, \
             n.source = $source, n.updated_at = $updated_at",
        )
        .param("id", concept.id.clone())
        .param("name", concept.name.clone())
        .param("normalized_name", concept.normalized_name.clone())
        .param("type", concept.concept_type.clone())
        .param("abbreviation", concept.abbreviation.clone().unwrap_or_default())
        .param("description", concept.description.clone().unwrap_or_default())
        .param("source", concept.source.clone())
        .param("updated_at", concept.updated_at.to_rfc3339());

        self.graph.run(q).await.map_err(Self::map_err("set_concept_attrs"))
    }
}

fn row_to_document(row: &neo4rs::Row) -> CoreResult<Document> {
    let node: neo4rs::Node = row
        .get("n")
        .map_err(|e| CoreError::Internal(format!("malformed document row: {e}")))?;
    Ok(Document {
        id: node.get("id").unwrap_or_default(),
        title: node.get("title").ok().filter(|s: &String| !s.is_empty()),
        source: node.get("source").ok().filter(|s: &String| !s.is_empty()),
        document_type: node.get("document_type").unwrap_or_default(),
        content_hash: node.get("content_hash").unwrap_or_default(),
        word_count: node.get::<i64>("word_count").unwrap_or(0) as usize,
        char_count: node.get::<i64>("char_count").unwrap_or(0) as usize,
        author: node.get("author").ok().filter(|s: &String| !s.is_empty()),
        category: node.get("category").ok().filter(|s: &String| !s.is_empty()),
        publication_date: node.get("publication_date").ok().filter(|s: &String| !s.is_empty()),
        url: node.get("url").ok().filter(|s: &String| !s.is_empty()),
        filename: node.get("filename").ok().filter(|s: &String| !s.is_empty()),
        created_at: parse_dt(node.get("created_at").ok()),
        updated_at: parse_dt(node.get("updated_at").ok()),
    })
}

fn row_to_chunk(row: &neo4rs::Row) -> CoreResult<Chunk> {
    let node: neo4rs::Node = row
        .get("c")
        .map_err(|e| CoreError::Internal(format!("malformed chunk row: {e}")))?;
    Ok(Chunk {
        id: node.get("id").unwrap_or_default(),
        document_id: node.get("document_id").unwrap_or_default(),
        chunk_index: node.get("chunk_index").unwrap_or(0),
        text: node.get("text").unwrap_or_default(),
        text_hash: node.get("text_hash").unwrap_or_default(),
        char_count: node.get::<i64>("char_count").unwrap_or(0) as usize,
        word_count: node.get::<i64>("word_count").unwrap_or(0) as usize,
    })
}

fn row_to_concept(row: &neo4rs::Row) -> CoreResult<Concept> {
    let node: neo4rs::Node = row
        .get("n")
        .map_err(|e| CoreError::Internal(format!("malformed concept row: {e}")))?;
    let chunk_index: i64 = node.get("chunk_index").unwrap_or(-1);
    Ok(Concept {
        id: node.get("id").unwrap_or_default(),
        name: node.get("name").unwrap_or_default(),
        normalized_name: node.get("normalized_name").unwrap_or_default(),
        concept_type: node.get("type").unwrap_or_else(|_| "Concept".to_string()),
        abbreviation: node.get("abbreviation").ok().filter(|s: &String| !s.is_empty()),
        description: node.get("description").ok().filter(|s: &String| !s.is_empty()),
        source: node.get("source").unwrap_or_default(),
        created_at: parse_dt(node.get("created_at").ok()),
        updated_at: parse_dt(node.get("updated_at").ok()),
        chunk_index: if chunk_index >= 0 { Some(chunk_index) } else { None },
    })
}

fn parse_dt(raw: Option<String>) -> chrono::DateTime<chrono::Utc> {
    raw.and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .unwrap_or_else(chrono::Utc::now)
}
