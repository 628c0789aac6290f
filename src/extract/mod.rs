//! Concept and relationship extraction (§4.3, C6).
//!
//! [`ConceptExtractor`] runs the four concept passes (LLM, prompt-engineering
//! keywords, domain keywords, metadata) in priority order and the three
//! relationship strategies (LLM, pattern-based, basic co-occurrence),
//! merging each per the identity/priority rules the graph store also
//! enforces on upsert. [`ConceptExtractor::extract_two_pass`] runs the
//! concept pass per chunk and unions results before a single relationship
//! pass over the whole original text, the cross-chunk aggregation the
//! Ingestor uses for chunked documents.

pub mod lexicon;
pub mod patterns;

use chrono::Utc;
use std::sync::Arc;

use crate::ids;
use crate::llm::parsing::{parse_concepts_json, parse_relationships_json, RawLlmConcept};
use crate::llm::LlmGateway;
use crate::models::{Chunk, Concept, ConceptSource, DocumentMetadata, Relationship, RelationshipMethod};

const CONCEPT_SYSTEM_PROMPT: &str = "You are a knowledge-extraction engine. \
Given a passage of text, identify the key concepts it discusses. \
Respond with a JSON array only, no prose, where each element has the shape \
{\"name\": string, \"type\": string, \"description\": string, \"related_concepts\": [string]}.";

const RELATIONSHIP_SYSTEM_PROMPT: &str = "You are a knowledge-graph relationship extractor. \
Given a passage of text and a list of concept names already identified in it, find the \
relationships the text states between those concepts. Respond with a JSON array only, no prose, \
where each element has the shape {\"source\": string, \"target\": string, \"type\": string, \
\"strength\": number between 0 and 1, \"description\": string}. `source` and `target` must be \
exact concept names from the provided list.";

/// A concept not yet assigned a final id, held during the merge passes.
#[derive(Debug, Clone)]
struct ConceptDraft {
    name: String,
    normalized_name: String,
    concept_type: String,
    abbreviation: Option<String>,
    description: Option<String>,
    source: ConceptSource,
    related_concepts: Vec<String>,
    chunk_index: Option<i64>,
}

impl ConceptDraft {
    fn new(name: String, concept_type: String, source: ConceptSource, chunk_index: Option<i64>) -> Self {
        let normalized_name = Concept::normalize(&name);
        Self {
            name,
            normalized_name,
            concept_type,
            abbreviation: None,
            description: None,
            source,
            related_concepts: Vec::new(),
            chunk_index,
        }
    }

    fn from_llm(raw: RawLlmConcept, chunk_index: Option<i64>) -> Self {
        let concept_type = raw
            .concept_type
            .map(|t| Concept::sanitize_type(&t))
            .unwrap_or_else(|| "Concept".to_string());
        let mut draft = Self::new(raw.name.trim().to_string(), concept_type, ConceptSource::Llm, chunk_index);
        draft.description = raw.description;
        draft.related_concepts = raw.related_concepts;
        draft
    }

    fn from_pe(term: &str, abbr: &str, chunk_index: Option<i64>) -> Self {
        let mut draft = Self::new(
            title_case(term),
            "PromptEngineeringConcept".to_string(),
            ConceptSource::KeywordPe,
            chunk_index,
        );
        draft.abbreviation = Some(abbr.to_string());
        draft
    }

    fn from_keyword_text(term: &str, abbr: &str, chunk_index: Option<i64>) -> Self {
        let mut draft = Self::new(title_case(term), "Concept".to_string(), ConceptSource::KeywordText, chunk_index);
        draft.abbreviation = Some(abbr.to_string());
        draft
    }

    fn from_metadata(name: &str, chunk_index: Option<i64>) -> Self {
        Self::new(name.trim().to_string(), "Concept".to_string(), ConceptSource::Metadata, chunk_index)
    }
}

/// `str::title()`-equivalent: capitalizes the first letter of each run of
/// alphabetic characters, lower-cases the rest.
fn title_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut start_of_word = true;
    for c in s.chars() {
        if c.is_alphabetic() {
            if start_of_word {
                result.extend(c.to_uppercase());
            } else {
                result.extend(c.to_lowercase());
            }
            start_of_word = false;
        } else {
            result.push(c);
            start_of_word = true;
        }
    }
    result
}

/// Unions `new` into `drafts` by `normalized_name`: the lowest-priority
/// source wins identity (name/type/abbreviation), the longer description
/// wins, `related_concepts` are unioned, and `chunk_index` keeps the
/// earliest value seen.
fn union_draft(drafts: &mut Vec<ConceptDraft>, new: ConceptDraft) {
    if let Some(existing) = drafts.iter_mut().find(|d| d.normalized_name == new.normalized_name) {
        if new.source.priority() < existing.source.priority() {
            existing.source = new.source;
            existing.concept_type = new.concept_type.clone();
            existing.name = new.name.clone();
            if new.abbreviation.is_some() {
                existing.abbreviation = new.abbreviation.clone();
            }
        } else if existing.abbreviation.is_none() {
            existing.abbreviation = new.abbreviation.clone();
        }

        existing.chunk_index = match (existing.chunk_index, new.chunk_index) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (Some(a), None) => Some(a),
            (None, b) => b,
        };

        let existing_len = existing.description.as_deref().map(str::len).unwrap_or(0);
        let new_len = new.description.as_deref().map(str::len).unwrap_or(0);
        if new_len > existing_len {
            existing.description = new.description;
        }

        for rc in new.related_concepts {
            if !existing.related_concepts.contains(&rc) {
                existing.related_concepts.push(rc);
            }
        }
    } else {
        drafts.push(new);
    }
}

fn finalize_concepts(drafts: Vec<ConceptDraft>) -> Vec<Concept> {
    let now = Utc::now();
    drafts
        .into_iter()
        .map(|d| {
            let id = ids::new_concept_id(d.source.as_str(), &d.name);
            Concept {
                id,
                name: d.name,
                normalized_name: d.normalized_name,
                concept_type: d.concept_type,
                abbreviation: d.abbreviation,
                description: d.description,
                source: d.source.as_str().to_string(),
                created_at: now,
                updated_at: now,
                chunk_index: d.chunk_index,
            }
        })
        .collect()
}

fn method_priority(method: &str) -> u8 {
    match method {
        "llm" => RelationshipMethod::Llm.priority(),
        "pattern_based" => RelationshipMethod::PatternBased.priority(),
        "basic_cooccurrence" => RelationshipMethod::BasicCooccurrence.priority(),
        _ => u8::MAX,
    }
}

/// Merges `new` into `edges` keyed by `(source_id, target_id, kind)`: the
/// lower-priority method wins; ties go to the higher strength.
fn merge_relationship(edges: &mut Vec<Relationship>, new: Relationship) {
    if let Some(existing) = edges
        .iter_mut()
        .find(|e| e.source_id == new.source_id && e.target_id == new.target_id && e.kind == new.kind)
    {
        let existing_priority = method_priority(&existing.method);
        let new_priority = method_priority(&new.method);
        if new_priority < existing_priority || (new_priority == existing_priority && new.strength > existing.strength) {
            *existing = new;
        }
    } else {
        edges.push(new);
    }
}

fn find_concept<'a>(concepts: &'a [Concept], name: &str) -> Option<&'a Concept> {
    concepts
        .iter()
        .find(|c| c.name == name)
        .or_else(|| concepts.iter().find(|c| c.name.eq_ignore_ascii_case(name)))
}

fn pattern_based_relationships(concepts: &[Concept], text_lower: &str) -> Vec<Relationship> {
    let now = Utc::now();
    let mut rels = Vec::new();
    for source in concepts {
        let source_lower = source.name.to_lowercase();
        for target in concepts {
            if source.id == target.id {
                continue;
            }
            let target_lower = target.name.to_lowercase();
            let found = patterns::RELATIONSHIP_PATTERNS.iter().find_map(|(kind, cues)| {
                cues.iter()
                    .any(|cue| text_lower.contains(&format!("{source_lower}{cue}{target_lower}")))
                    .then_some(*kind)
            });
            if let Some(kind) = found {
                rels.push(Relationship {
                    source_id: source.id.clone(),
                    target_id: target.id.clone(),
                    kind: kind.to_string(),
                    strength: 0.8,
                    description: Some(format!(
                        "{} is {} {}",
                        source.name,
                        kind.to_lowercase().replace('_', " "),
                        target.name
                    )),
                    method: RelationshipMethod::PatternBased.as_str().to_string(),
                    created_at: now,
                    updated_at: None,
                });
            }
        }
    }
    rels
}

fn basic_cooccurrence_relationships(concepts: &[Concept], text_lower: &str) -> Vec<Relationship> {
    let now = Utc::now();
    let mut rels = Vec::new();
    for i in 0..concepts.len() {
        for j in (i + 1)..concepts.len() {
            let a = &concepts[i];
            let b = &concepts[j];
            if text_lower.contains(&a.name.to_lowercase()) && text_lower.contains(&b.name.to_lowercase()) {
                rels.push(Relationship {
                    source_id: a.id.clone(),
                    target_id: b.id.clone(),
                    kind: "RELATED_TO".to_string(),
                    strength: 0.3,
                    description: Some(format!("{} co-occurs with {} in text (simplified)", a.name, b.name)),
                    method: RelationshipMethod::BasicCooccurrence.as_str().to_string(),
                    created_at: now,
                    updated_at: None,
                });
            }
        }
    }
    rels
}

fn concept_prompt(text: &str) -> String {
    format!("Extract the key concepts from the following text.\n\nText:\n{text}")
}

fn relationship_prompt(concepts: &[Concept], text: &str) -> String {
    let names: Vec<&str> = concepts.iter().map(|c| c.name.as_str()).collect();
    format!(
        "Concepts already identified: {}\n\nText:\n{text}",
        names.join(", ")
    )
}

/// Result of one [`ConceptExtractor`] run.
pub struct ExtractionOutcome {
    pub concepts: Vec<Concept>,
    pub relationships: Vec<Relationship>,
}

pub struct ConceptExtractor {
    gateway: Option<Arc<LlmGateway>>,
    max_tokens: u32,
    temperature: f32,
}

impl ConceptExtractor {
    pub fn new(gateway: Option<Arc<LlmGateway>>) -> Self {
        Self {
            gateway,
            max_tokens: 1024,
            temperature: 0.2,
        }
    }

    pub fn with_generation_params(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    /// Runs the four concept passes over `text` and unions their output by
    /// `normalized_name`.
    async fn concept_drafts(&self, text: &str, metadata: &DocumentMetadata, chunk_index: Option<i64>) -> Vec<ConceptDraft> {
        let mut drafts = Vec::new();
        let lower = text.to_lowercase();

        if let Some(gateway) = self.gateway.as_ref().filter(|g| g.is_configured()) {
            match gateway
                .generate(&concept_prompt(text), Some(CONCEPT_SYSTEM_PROMPT), Some(self.max_tokens), Some(self.temperature))
                .await
            {
                Ok(response) => {
                    for raw in parse_concepts_json(&response) {
                        union_draft(&mut drafts, ConceptDraft::from_llm(raw, chunk_index));
                    }
                }
                Err(e) => tracing::warn!(error = %e, "LLM concept pass failed"),
            }
        }

        for (term, abbr) in lexicon::PE_LEXICON {
            if lower.contains(term) {
                union_draft(&mut drafts, ConceptDraft::from_pe(term, abbr, chunk_index));
            }
        }

        for (term, abbr) in lexicon::COMMON_LEXICON {
            if lower.contains(term) {
                union_draft(&mut drafts, ConceptDraft::from_keyword_text(term, abbr, chunk_index));
            }
        }
        if let Some(table) = metadata.domain.as_deref().and_then(lexicon::domain_lexicon) {
            for (term, abbr) in table {
                if lower.contains(term) {
                    union_draft(&mut drafts, ConceptDraft::from_keyword_text(term, abbr, chunk_index));
                }
            }
        }

        for name in metadata.concept_names() {
            union_draft(&mut drafts, ConceptDraft::from_metadata(&name, chunk_index));
        }

        drafts
    }

    /// Runs the three relationship strategies over `concepts`/`text` and
    /// merges them per the `llm > pattern_based > basic_cooccurrence`
    /// priority rule. Co-occurrence only runs when neither of the other two
    /// strategies produced any edge.
    async fn extract_relationships(&self, concepts: &[Concept], text: &str) -> Vec<Relationship> {
        if concepts.len() < 2 {
            return Vec::new();
        }

        let text_lower = text.to_lowercase();
        let mut merged: Vec<Relationship> = Vec::new();

        if let Some(gateway) = self.gateway.as_ref().filter(|g| g.is_configured()) {
            let prompt = relationship_prompt(concepts, text);
            match gateway
                .generate(&prompt, Some(RELATIONSHIP_SYSTEM_PROMPT), Some(self.max_tokens), Some(self.temperature))
                .await
            {
                Ok(response) => {
                    let now = Utc::now();
                    for raw in parse_relationships_json(&response) {
                        let Some(source) = find_concept(concepts, &raw.source) else { continue };
                        let Some(target) = find_concept(concepts, &raw.target) else { continue };
                        if source.id == target.id {
                            continue;
                        }
                        merge_relationship(
                            &mut merged,
                            Relationship {
                                source_id: source.id.clone(),
                                target_id: target.id.clone(),
                                kind: raw.rel_type,
                                strength: raw.strength,
                                description: raw.description,
                                method: RelationshipMethod::Llm.as_str().to_string(),
                                created_at: now,
                                updated_at: None,
                            },
                        );
                    }
                }
                Err(e) => tracing::warn!(error = %e, "LLM relationship pass failed"),
            }
        }

        for rel in pattern_based_relationships(concepts, &text_lower) {
            merge_relationship(&mut merged, rel);
        }

        if merged.is_empty() {
            for rel in basic_cooccurrence_relationships(concepts, &text_lower) {
                merge_relationship(&mut merged, rel);
            }
        }

        merged
    }

    /// Extracts concepts and relationships from a single unit of text
    /// (§4.4 step 4a for the non-chunked/single-unit case).
    pub async fn extract(&self, text: &str, metadata: &DocumentMetadata, chunk_index: Option<i64>) -> ExtractionOutcome {
        let drafts = self.concept_drafts(text, metadata, chunk_index).await;
        let concepts = finalize_concepts(drafts);
        let relationships = self.extract_relationships(&concepts, text).await;
        ExtractionOutcome { concepts, relationships }
    }

    /// Two-pass cross-chunk aggregation (§4.3): runs the concept pass per
    /// chunk, unions the results by `normalized_name`, then runs the
    /// relationship passes once over the unioned concept set and the
    /// original (unchunked) text.
    pub async fn extract_two_pass(&self, chunks: &[Chunk], full_text: &str, metadata: &DocumentMetadata) -> ExtractionOutcome {
        let mut unioned: Vec<ConceptDraft> = Vec::new();
        for chunk in chunks {
            for draft in self.concept_drafts(&chunk.text, metadata, Some(chunk.chunk_index)).await {
                union_draft(&mut unioned, draft);
            }
        }
        let concepts = finalize_concepts(unioned);
        let relationships = self.extract_relationships(&concepts, full_text).await;
        ExtractionOutcome { concepts, relationships }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> DocumentMetadata {
        DocumentMetadata::default()
    }

    #[tokio::test]
    async fn pe_keyword_pass_detects_known_term() {
        let extractor = ConceptExtractor::new(None);
        let outcome = extractor
            .extract("We used chain of thought prompting to improve accuracy.", &metadata(), None)
            .await;
        let hit = outcome.concepts.iter().find(|c| c.normalized_name == "chain of thought");
        assert!(hit.is_some());
        assert_eq!(hit.unwrap().source, "keyword_pe");
        assert_eq!(hit.unwrap().concept_type, "PromptEngineeringConcept");
    }

    #[tokio::test]
    async fn domain_keyword_pass_uses_per_domain_table() {
        let mut md = metadata();
        md.domain = Some("Programming".to_string());
        let extractor = ConceptExtractor::new(None);
        let outcome = extractor.extract("We containerized the service with Docker.", &md, None).await;
        assert!(outcome.concepts.iter().any(|c| c.normalized_name == "docker"));
    }

    #[tokio::test]
    async fn metadata_pass_emits_listed_concepts() {
        let mut md = metadata();
        md.concepts = Some(serde_json::json!("Neo4j, ChromaDB"));
        let extractor = ConceptExtractor::new(None);
        let outcome = extractor.extract("unrelated filler text", &md, None).await;
        let names: Vec<&str> = outcome.concepts.iter().map(|c| c.name.as_str()).collect();
        assert!(names.contains(&"Neo4j"));
        assert!(names.contains(&"ChromaDB"));
    }

    #[tokio::test]
    async fn pattern_based_relationship_is_detected() {
        let mut md = metadata();
        md.concepts = Some(serde_json::json!("GraphRAG, knowledge graph"));
        let extractor = ConceptExtractor::new(None);
        let outcome = extractor
            .extract("GraphRAG is a knowledge graph retrieval technique.", &md, None)
            .await;
        let rel = outcome.relationships.iter().find(|r| r.kind == "IS_A");
        assert!(rel.is_some(), "expected an IS_A relationship, got {:?}", outcome.relationships);
        assert_eq!(rel.unwrap().method, "pattern_based");
    }

    #[tokio::test]
    async fn cooccurrence_fallback_only_runs_when_nothing_else_found() {
        let mut md = metadata();
        md.concepts = Some(serde_json::json!("GraphRAG, ChromaDB"));
        let extractor = ConceptExtractor::new(None);
        let outcome = extractor
            .extract("GraphRAG and ChromaDB appear in the same paragraph with no cue phrase.", &md, None)
            .await;
        assert_eq!(outcome.relationships.len(), 1);
        assert_eq!(outcome.relationships[0].method, "basic_cooccurrence");
        assert_eq!(outcome.relationships[0].kind, "RELATED_TO");
    }

    #[tokio::test]
    async fn two_pass_unions_concepts_across_chunks() {
        let chunk_a = Chunk {
            id: "chunk-1".to_string(),
            document_id: "doc-1".to_string(),
            chunk_index: 0,
            text: "Chain of thought prompting improves reasoning.".to_string(),
            text_hash: String::new(),
            char_count: 0,
            word_count: 0,
        };
        let chunk_b = Chunk {
            id: "chunk-2".to_string(),
            document_id: "doc-1".to_string(),
            chunk_index: 1,
            text: "Chain of thought prompting is widely used with large language model systems.".to_string(),
            text_hash: String::new(),
            char_count: 0,
            word_count: 0,
        };
        let full_text = format!("{} {}", chunk_a.text, chunk_b.text);
        let extractor = ConceptExtractor::new(None);
        let outcome = extractor
            .extract_two_pass(&[chunk_a, chunk_b], &full_text, &metadata())
            .await;

        let matches: Vec<_> = outcome
            .concepts
            .iter()
            .filter(|c| c.normalized_name == "chain of thought")
            .collect();
        assert_eq!(matches.len(), 1, "expected a single unioned concept, got {matches:?}");
        assert_eq!(matches[0].chunk_index, Some(0));
    }

    #[test]
    fn title_case_matches_python_semantics() {
        assert_eq!(title_case("chain of thought"), "Chain Of Thought");
        assert_eq!(title_case("few-shot learning"), "Few-Shot Learning");
    }
}
