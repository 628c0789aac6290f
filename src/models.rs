//! Core data models shared across the ingestion and retrieval pipeline.
//!
//! These types represent the documents, chunks, concepts, relationships, and
//! jobs that flow through the graph store and vector store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Closed set of document content types the ingestor accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Text,
    Pdf,
    Txt,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Text => "text",
            DocumentType::Pdf => "pdf",
            DocumentType::Txt => "txt",
        }
    }
}

impl Default for DocumentType {
    fn default() -> Self {
        DocumentType::Text
    }
}

/// Typed fields recognized on the metadata bag exchanged at the HTTP/MCP
/// boundary, plus an extension map for anything else callers send.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub source: Option<String>,
    #[serde(default)]
    pub document_type: Option<String>,
    pub category: Option<String>,
    pub publication_date: Option<String>,
    pub url: Option<String>,
    pub filename: Option<String>,
    pub hash: Option<String>,
    pub domain: Option<String>,
    #[serde(default)]
    pub force_rule_based: bool,
    /// Comma-separated string or a list; honored either way by the extractor.
    pub concepts: Option<Value>,
    pub file_path: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DocumentMetadata {
    pub fn title_lower(&self) -> Option<String> {
        self.title.as_ref().map(|t| t.trim().to_lowercase())
    }

    /// Splits `concepts` (a comma-separated string or a JSON array) into a
    /// plain list of concept names.
    pub fn concept_names(&self) -> Vec<String> {
        match &self.concepts {
            Some(Value::String(s)) => s
                .split(',')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// One ingested source document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: Option<String>,
    pub source: Option<String>,
    pub document_type: String,
    pub content_hash: String,
    pub word_count: usize,
    pub char_count: usize,
    pub author: Option<String>,
    pub category: Option<String>,
    pub publication_date: Option<String>,
    pub url: Option<String>,
    pub filename: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A contiguous text slice of a [`Document`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub text: String,
    pub text_hash: String,
    pub char_count: usize,
    pub word_count: usize,
}

/// Closed set of concept provenance tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConceptSource {
    Llm,
    KeywordText,
    KeywordPe,
    Metadata,
}

impl ConceptSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConceptSource::Llm => "llm",
            ConceptSource::KeywordText => "keyword_text",
            ConceptSource::KeywordPe => "keyword_pe",
            ConceptSource::Metadata => "metadata",
        }
    }

    /// Merge priority for concept identity: lower wins when the same
    /// `normalized_name` is produced by more than one pass in a single
    /// extraction run. The extractor still uses first-pass-wins per §4.3;
    /// this ordering matters only when passes are invoked out of the fixed
    /// sequence (e.g. tests exercising merge logic directly).
    pub fn priority(&self) -> u8 {
        match self {
            ConceptSource::Llm => 0,
            ConceptSource::KeywordPe => 1,
            ConceptSource::KeywordText => 2,
            ConceptSource::Metadata => 3,
        }
    }
}

/// A domain entity or topic extracted from document text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Concept {
    pub id: String,
    pub name: String,
    pub normalized_name: String,
    #[serde(rename = "type")]
    pub concept_type: String,
    pub abbreviation: Option<String>,
    pub description: Option<String>,
    pub source: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Chunk this concept was first observed in, for provenance (§9 note c).
    pub chunk_index: Option<i64>,
}

impl Concept {
    /// `name` lowercased and whitespace-trimmed: the deduplication key.
    pub fn normalize(name: &str) -> String {
        name.trim().to_lowercase()
    }

    /// A node label must match `^[A-Za-z_][A-Za-z0-9_]*$`; anything else
    /// falls back to the default `Concept` label.
    pub fn sanitize_type(raw: &str) -> String {
        let mut chars = raw.chars();
        let valid = match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                raw.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            _ => false,
        };
        if valid {
            raw.to_string()
        } else {
            "Concept".to_string()
        }
    }
}

/// Closed set of Concept→Concept relationship kinds.
pub const RELATIONSHIP_KINDS: &[&str] = &[
    "RELATED_TO",
    "DEFINES_CONCEPT",
    "IS_A",
    "HAS_PART",
    "USED_FOR",
    "IMPLEMENTS_METHOD",
    "HAS_ATTRIBUTE",
    "EXAMPLE_OF",
    "REQUIRES_INPUT",
    "STEP_IN_PROCESS",
    "COMPARES_WITH",
];

pub const MENTIONS_CONCEPT: &str = "MENTIONS_CONCEPT";
pub const HAS_CHUNK: &str = "HAS_CHUNK";

/// Closed set of relationship provenance methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipMethod {
    Llm,
    PatternBased,
    BasicCooccurrence,
}

impl RelationshipMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipMethod::Llm => "llm",
            RelationshipMethod::PatternBased => "pattern_based",
            RelationshipMethod::BasicCooccurrence => "basic_cooccurrence",
        }
    }

    /// Merge priority: lower value wins (`llm > pattern_based > basic_cooccurrence`).
    pub fn priority(&self) -> u8 {
        match self {
            RelationshipMethod::Llm => 0,
            RelationshipMethod::PatternBased => 1,
            RelationshipMethod::BasicCooccurrence => 2,
        }
    }
}

/// A directed, typed edge between two concepts (or a document/chunk and a concept).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub source_id: String,
    pub target_id: String,
    pub kind: String,
    pub strength: f64,
    pub description: Option<String>,
    pub method: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Job lifecycle states; transitions to exactly one terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

/// Closed set of background job types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    AddBug,
    AddFolder,
    ProcessDocument,
    ProcessFolder,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::AddBug => "add_bug",
            JobType::AddFolder => "add_folder",
            JobType::ProcessDocument => "process_document",
            JobType::ProcessFolder => "process_folder",
        }
    }
}

/// A unit of background work managed by the job manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    pub job_type: JobType,
    pub params: Value,
    pub status: JobStatus,
    pub progress: f64,
    pub processed_items: u64,
    pub total_items: u64,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub created_by: Option<String>,
}

impl Job {
    pub fn new(job_id: String, job_type: JobType, params: Value, created_by: Option<String>) -> Self {
        Self {
            job_id,
            job_type,
            params,
            status: JobStatus::Queued,
            progress: 0.0,
            processed_items: 0,
            total_items: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
            created_by,
        }
    }

    pub fn update_progress(&mut self, processed_items: u64, total_items: u64) {
        self.processed_items = processed_items;
        self.total_items = total_items;
        self.progress = if total_items > 0 {
            (processed_items as f64 / total_items as f64) * 100.0
        } else {
            0.0
        };
    }

    pub fn start(&mut self) {
        self.status = JobStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn complete(&mut self, result: Value) {
        self.status = JobStatus::Completed;
        self.progress = 100.0;
        self.result = Some(result);
        self.completed_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error: String) {
        self.status = JobStatus::Failed;
        self.error = Some(error);
        self.completed_at = Some(Utc::now());
    }

    pub fn cancel(&mut self) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = JobStatus::Cancelled;
        self.completed_at = Some(Utc::now());
        true
    }
}

/// Outcome status for one `ingest` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStatus {
    Success,
    PartialFailure,
    Duplicate,
    Failure,
}

/// Per-unit (chunk or whole-document) ingestion outcome, used in `details[]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitOutcome {
    pub unit_index: i64,
    pub succeeded: bool,
    pub error: Option<String>,
}

/// Result of one `Ingestor::ingest` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub status: IngestStatus,
    pub document_id: Option<String>,
    pub entities_count: usize,
    pub relationships_count: usize,
    pub duplicate_detection_method: Option<String>,
    #[serde(default)]
    pub details: Vec<UnitOutcome>,
}

/// A single vector-store record returned from a similarity query.
#[derive(Debug, Clone)]
pub struct VectorMatch {
    pub id: String,
    pub document: String,
    pub metadata: HashMap<String, String>,
    pub distance: f64,
}
