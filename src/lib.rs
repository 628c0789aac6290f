//! # graphrag-engine
//!
//! An ingestion and hybrid-retrieval engine over a property graph and a
//! vector store: documents are chunked, deduplicated, and mined for concepts
//! and typed relationships with LLM assistance; retrieval fuses vector
//! similarity with a bounded graph walk seeded from the hits. The engine is
//! exposed over an HTTP API and a Model Context Protocol tool server.
//!
//! ## Dataflow
//!
//! ```text
//! ingest: text → Chunker → DuplicateDetector → ConceptExtractor (+ LLMGateway)
//!         → GraphRepo + VectorRepo
//! search: query → VectorRepo.query → seed concepts → GraphRepo.traverse → fuse
//! ```
//!
//! ## Modules
//!
//! - [`config`] — TOML configuration parsing and validation
//! - [`models`] — Document, Chunk, Concept, Relationship, Job
//! - [`ids`] — stable identifier minting
//! - [`chunk`] — sentence-aware, overlap-preserving text chunking
//! - [`dedupe`] — path/metadata/content-hash duplicate detection
//! - [`extract`] — LLM + keyword + pattern concept/relationship extraction
//! - [`graph`] — property-graph repository facade (Neo4j, in-memory)
//! - [`vector`] — vector store facade (SQLite-backed cosine index)
//! - [`llm`] — LLM provider chain (OpenAI-compatible, Ollama, OpenRouter)
//! - [`pdf`] — PDF text extraction
//! - [`ingest`] — the ingestion pipeline orchestrator
//! - [`search`] — hybrid vector + graph retrieval
//! - [`jobs`] — persistent, crash-resilient background job manager
//! - [`server`] — HTTP service surface (Axum)
//! - [`mcp`] — Model Context Protocol tool server (JSON-RPC 2.0 over WebSocket)
//! - [`error`] — shared error taxonomy
//! - [`logging`] — tracing-subscriber bootstrap

pub mod chunk;
pub mod config;
pub mod dedupe;
pub mod error;
pub mod extract;
pub mod graph;
pub mod ids;
pub mod ingest;
pub mod jobs;
pub mod llm;
pub mod logging;
pub mod mcp;
pub mod models;
pub mod pdf;
pub mod search;
pub mod server;
pub mod vector;
