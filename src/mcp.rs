//! Model Context Protocol tool server (§4.10, C10): JSON-RPC 2.0 framed over
//! a WebSocket, protocol version `2024-11-05`.
//!
//! Mirrors the base crate's `Tool`/`ToolRegistry` trait pair: each of the
//! twelve closed-set tools is an [`McpTool`] impl with `name`,
//! `description`, `parameters_schema`, `execute`, registered once in a
//! [`ToolRegistry`] shared by every connection.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::CoreError;
use crate::models::{Concept, DocumentMetadata, DocumentType, IngestStatus, JobType};
use crate::server::{self, AppState};

const PROTOCOL_VERSION: &str = "2024-11-05";

/// One invocable tool. `execute` receives the already-JSON-decoded `params`
/// of a `tools/call` request and returns the tool's `result` payload, or a
/// [`CoreError`] translated into a JSON-RPC error response.
#[async_trait]
pub trait McpTool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> Value;
    async fn execute(&self, state: &AppState, args: Value) -> Result<Value, CoreError>;
}

/// The closed set of twelve tools, built once and shared across connections.
pub struct ToolRegistry {
    tools: Vec<Arc<dyn McpTool>>,
}

impl ToolRegistry {
    fn new() -> Self {
        let tools: Vec<Arc<dyn McpTool>> = vec![
            Arc::new(PingTool),
            Arc::new(SearchTool),
            Arc::new(ConceptTool),
            Arc::new(DocumentsTool),
            Arc::new(BooksByConceptTool),
            Arc::new(RelatedConceptsTool),
            Arc::new(PassagesAboutConceptTool),
            Arc::new(AddBugTool),
            Arc::new(AddFolderTool),
            Arc::new(JobStatusTool),
            Arc::new(ListJobsTool),
            Arc::new(CancelJobTool),
        ];
        Self { tools }
    }

    fn find(&self, name: &str) -> Option<Arc<dyn McpTool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    fn descriptors(&self) -> Vec<Value> {
        self.tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name(),
                    "description": t.description(),
                    "inputSchema": t.parameters_schema(),
                })
            })
            .collect()
    }
}

fn registry() -> &'static ToolRegistry {
    static REGISTRY: OnceLock<ToolRegistry> = OnceLock::new();
    REGISTRY.get_or_init(ToolRegistry::new)
}

// ============ JSON-RPC envelope ============

#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    #[serde(default)]
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Option<Value>,
}

#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcErrorBody>,
}

#[derive(Debug, Serialize)]
struct JsonRpcErrorBody {
    code: i64,
    message: String,
}

fn ok_response(id: Value, result: Value) -> JsonRpcResponse {
    JsonRpcResponse { jsonrpc: "2.0", id, result: Some(result), error: None }
}

fn err_response(id: Value, code: i64, message: impl Into<String>) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0",
        id,
        result: None,
        error: Some(JsonRpcErrorBody { code, message: message.into() }),
    }
}

const PARSE_ERROR: i64 = -32700;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;

pub async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    while let Some(Ok(msg)) = socket.recv().await {
        let Message::Text(text) = msg else { continue };

        let response = match serde_json::from_str::<JsonRpcRequest>(text.as_str()) {
            Ok(req) => dispatch(&state, req).await,
            Err(e) => err_response(Value::Null, PARSE_ERROR, format!("Parse error: {e}")),
        };

        let Ok(payload) = serde_json::to_string(&response) else { continue };
        if socket.send(Message::Text(payload.into())).await.is_err() {
            break;
        }
    }
}

async fn dispatch(state: &AppState, req: JsonRpcRequest) -> JsonRpcResponse {
    let id = req.id.unwrap_or(Value::Null);
    match req.method.as_str() {
        "initialize" => ok_response(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "serverInfo": {"name": "graphrag-engine", "version": env!("CARGO_PKG_VERSION")},
                "capabilities": {"tools": {}},
            }),
        ),
        "tools/list" | "getTools" => ok_response(id, json!({"tools": registry().descriptors()})),
        "tools/call" | "invokeTool" => handle_tool_call(state, id, req.params).await,
        other => err_response(id, METHOD_NOT_FOUND, format!("Unknown method: {other}")),
    }
}

/// Wraps `payload` as a `CallToolResult` — `{content: [{type:"text", text}],
/// isError}` — the shape every `tools/call` response uses regardless of
/// whether the tool itself succeeded (§6). Only malformed JSON-RPC envelopes
/// (missing params/name) are surfaced as top-level JSON-RPC errors; anything
/// tool-shaped, including an unknown tool name, is reported through this
/// envelope instead so that MCP clients only ever branch on `isError`.
fn call_tool_result(payload: Value, is_error: bool) -> Value {
    json!({"content": [{"type": "text", "text": payload.to_string()}], "isError": is_error})
}

async fn handle_tool_call(state: &AppState, id: Value, params: Option<Value>) -> JsonRpcResponse {
    let Some(params) = params else {
        return err_response(id, INVALID_PARAMS, "Missing params");
    };

    let name = params.get("name").and_then(Value::as_str).map(str::to_string).or_else(|| {
        params.get("tool").and_then(Value::as_str).map(str::to_string)
    });
    let Some(name) = name else {
        return err_response(id, INVALID_PARAMS, "Missing tool name");
    };

    let args = params
        .get("arguments")
        .or_else(|| params.get("params"))
        .cloned()
        .unwrap_or_else(|| json!({}));

    let Some(tool) = registry().find(&name) else {
        let available: Vec<&str> = registry().tools.iter().map(|t| t.name()).collect();
        let payload = json!({
            "error": {
                "code": METHOD_NOT_FOUND,
                "message": format!("Unknown tool: {name}"),
                "data": {"availableTools": available},
            },
        });
        return ok_response(id, call_tool_result(payload, true));
    };

    match tool.execute(state, args).await {
        Ok(result) => ok_response(id, call_tool_result(result, false)),
        Err(e) => ok_response(id, call_tool_result(e.to_error_payload(), true)),
    }
}

fn missing(field: &str) -> CoreError {
    CoreError::bad_request(format!("Missing required parameter: {field}"))
}

fn arg_str(args: &Value, field: &str) -> Result<String, CoreError> {
    args.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| missing(field))
}

// ============ ping ============

struct PingTool;

#[async_trait]
impl McpTool for PingTool {
    fn name(&self) -> &str {
        "ping"
    }
    fn description(&self) -> &str {
        "Liveness check; returns pong."
    }
    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }
    async fn execute(&self, _state: &AppState, _args: Value) -> Result<Value, CoreError> {
        Ok(json!({"status": "pong"}))
    }
}

// ============ search ============

struct SearchTool;

#[async_trait]
impl McpTool for SearchTool {
    fn name(&self) -> &str {
        "search"
    }
    fn description(&self) -> &str {
        "Hybrid vector + graph search over ingested documents."
    }
    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string"},
                "n_results": {"type": "integer", "default": 5},
                "max_hops": {"type": "integer", "default": 2},
            },
            "required": ["query"],
        })
    }
    async fn execute(&self, state: &AppState, args: Value) -> Result<Value, CoreError> {
        let query = arg_str(&args, "query")?;
        let n_results = args.get("n_results").and_then(Value::as_i64).unwrap_or(5).max(1) as usize;
        let max_hops = args.get("max_hops").and_then(Value::as_u64).unwrap_or(2) as usize;

        let result = crate::search::hybrid_search(state.vector.as_ref(), state.graph.as_ref(), &query, n_results, max_hops).await?;
        serde_json::to_value(result).map_err(|e| CoreError::Internal(e.to_string()))
    }
}

// ============ concept ============

struct ConceptTool;

#[async_trait]
impl McpTool for ConceptTool {
    fn name(&self) -> &str {
        "concept"
    }
    fn description(&self) -> &str {
        "Look up a single concept by name."
    }
    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {"name": {"type": "string"}}, "required": ["name"]})
    }
    async fn execute(&self, state: &AppState, args: Value) -> Result<Value, CoreError> {
        let name = arg_str(&args, "name")?;
        let normalized = Concept::normalize(&name);
        let concept = state
            .graph
            .find_concept_by_name(&normalized)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("Unknown concept: {name}")))?;
        serde_json::to_value(concept).map_err(|e| CoreError::Internal(e.to_string()))
    }
}

// ============ documents (ingest) ============

struct DocumentsTool;

#[async_trait]
impl McpTool for DocumentsTool {
    fn name(&self) -> &str {
        "documents"
    }
    fn description(&self) -> &str {
        "Ingest a text document: chunk, deduplicate, extract concepts/relationships."
    }
    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"text": {"type": "string"}, "metadata": {"type": "object"}},
            "required": ["text"],
        })
    }
    async fn execute(&self, state: &AppState, args: Value) -> Result<Value, CoreError> {
        let text = arg_str(&args, "text")?;
        let metadata: DocumentMetadata = match args.get("metadata").cloned() {
            Some(v) if !v.is_null() => serde_json::from_value(v).map_err(|e| CoreError::bad_request(e.to_string()))?,
            _ => DocumentMetadata::default(),
        };
        let document_type = match metadata.document_type.as_deref() {
            Some("pdf") => DocumentType::Pdf,
            Some("txt") => DocumentType::Txt,
            _ => DocumentType::Text,
        };

        let report = state.ingestor.ingest(&text, metadata, document_type).await?;
        match report.status {
            IngestStatus::Failure => Err(CoreError::Internal(
                report.details.first().and_then(|d| d.error.clone()).unwrap_or_else(|| "ingestion failed".to_string()),
            )),
            _ => serde_json::to_value(report).map_err(|e| CoreError::Internal(e.to_string())),
        }
    }
}

// ============ books-by-concept ============

struct BooksByConceptTool;

#[async_trait]
impl McpTool for BooksByConceptTool {
    fn name(&self) -> &str {
        "books-by-concept"
    }
    fn description(&self) -> &str {
        "Documents that mention a given concept."
    }
    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"concept": {"type": "string"}, "limit": {"type": "integer", "default": 20}},
            "required": ["concept"],
        })
    }
    async fn execute(&self, state: &AppState, args: Value) -> Result<Value, CoreError> {
        let concept = arg_str(&args, "concept")?;
        let limit = args.get("limit").and_then(Value::as_u64).unwrap_or(20) as usize;
        let normalized = Concept::normalize(&concept);
        let documents = state.graph.documents_mentioning(&normalized, limit).await?;
        Ok(json!({"documents": documents}))
    }
}

// ============ related-concepts ============

struct RelatedConceptsTool;

#[async_trait]
impl McpTool for RelatedConceptsTool {
    fn name(&self) -> &str {
        "related-concepts"
    }
    fn description(&self) -> &str {
        "Concepts reachable from a seed concept within a bounded number of hops."
    }
    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"concept": {"type": "string"}, "max_hops": {"type": "integer", "default": 2}},
            "required": ["concept"],
        })
    }
    async fn execute(&self, state: &AppState, args: Value) -> Result<Value, CoreError> {
        let concept = arg_str(&args, "concept")?;
        let max_hops = args.get("max_hops").and_then(Value::as_u64).unwrap_or(2) as usize;
        let normalized = Concept::normalize(&concept);
        let seed = state
            .graph
            .find_concept_by_name(&normalized)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("Unknown concept: {concept}")))?;
        let hits = state.graph.traverse(&[seed.id], max_hops).await?;
        Ok(json!({"related": hits.into_iter().map(|h| json!({"id": h.concept_id, "name": h.name, "score": h.score})).collect::<Vec<_>>()}))
    }
}

// ============ passages-about-concept ============

struct PassagesAboutConceptTool;

#[async_trait]
impl McpTool for PassagesAboutConceptTool {
    fn name(&self) -> &str {
        "passages-about-concept"
    }
    fn description(&self) -> &str {
        "Vector-store passages tagged with a given concept id."
    }
    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"concept": {"type": "string"}},
            "required": ["concept"],
        })
    }
    async fn execute(&self, state: &AppState, args: Value) -> Result<Value, CoreError> {
        let concept = arg_str(&args, "concept")?;
        let normalized = Concept::normalize(&concept);
        let seed = state
            .graph
            .find_concept_by_name(&normalized)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("Unknown concept: {concept}")))?;

        let mut filter = std::collections::HashMap::new();
        filter.insert("concept_id".to_string(), seed.id.clone());
        let matches = state.vector.get_by_metadata(&filter).await?;
        Ok(json!({"passages": matches.iter().map(|m| json!({"id": m.id, "text": m.document})).collect::<Vec<_>>()}))
    }
}

// ============ add_bug ============

struct AddBugTool;

#[async_trait]
impl McpTool for AddBugTool {
    fn name(&self) -> &str {
        "add_bug"
    }
    fn description(&self) -> &str {
        "Ingest a bug report (description + root cause) as a document."
    }
    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"description": {"type": "string"}, "cause": {"type": "string"}},
            "required": ["description", "cause"],
        })
    }
    async fn execute(&self, state: &AppState, args: Value) -> Result<Value, CoreError> {
        let description = arg_str(&args, "description")?;
        let cause = arg_str(&args, "cause")?;
        let text = server::bug_report_text(&description, &cause);

        let mut metadata = DocumentMetadata::default();
        metadata.category = Some("bug_report".to_string());
        metadata.document_type = Some("text".to_string());

        let report = state.ingestor.ingest(&text, metadata, DocumentType::Text).await?;
        match report.status {
            IngestStatus::Failure => Err(CoreError::Internal(
                report.details.first().and_then(|d| d.error.clone()).unwrap_or_else(|| "ingestion failed".to_string()),
            )),
            _ => serde_json::to_value(report).map_err(|e| CoreError::Internal(e.to_string())),
        }
    }
}

// ============ add-folder ============

struct AddFolderTool;

#[async_trait]
impl McpTool for AddFolderTool {
    fn name(&self) -> &str {
        "add-folder"
    }
    fn description(&self) -> &str {
        "Recursively ingest every matching file in a folder as a background job."
    }
    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "folder_path": {"type": "string"},
                "recursive": {"type": "boolean", "default": false},
                "file_types": {"type": "array", "items": {"type": "string"}},
            },
            "required": ["folder_path"],
        })
    }
    async fn execute(&self, state: &AppState, args: Value) -> Result<Value, CoreError> {
        let folder_path = arg_str(&args, "folder_path")?;
        let recursive = args.get("recursive").and_then(Value::as_bool).unwrap_or(false);
        let file_types: Vec<String> = args
            .get("file_types")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_else(|| vec![".pdf".to_string(), ".txt".to_string(), ".md".to_string()]);
        let default_metadata = args.get("default_metadata").cloned().unwrap_or(Value::Null);

        match server::start_folder_import_job(state, &folder_path, recursive, &file_types, default_metadata).await {
            Ok(started) => Ok(json!({"status": "accepted", "job_id": started.job_id, "total_files": started.total_files})),
            Err(server::FolderJobError::NoMatches) => Err(CoreError::not_found("No matching files found in folder")),
            Err(server::FolderJobError::Other(e)) => Err(CoreError::Internal(e.to_string())),
        }
    }
}

// ============ job-status ============

struct JobStatusTool;

#[async_trait]
impl McpTool for JobStatusTool {
    fn name(&self) -> &str {
        "job-status"
    }
    fn description(&self) -> &str {
        "Fetch a background job's current status and progress."
    }
    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {"job_id": {"type": "string"}}, "required": ["job_id"]})
    }
    async fn execute(&self, state: &AppState, args: Value) -> Result<Value, CoreError> {
        let job_id = arg_str(&args, "job_id")?;
        let job = state.jobs.get(&job_id).await.ok_or_else(|| CoreError::not_found(format!("Unknown job: {job_id}")))?;
        serde_json::to_value(job).map_err(|e| CoreError::Internal(e.to_string()))
    }
}

// ============ list-jobs ============

struct ListJobsTool;

#[async_trait]
impl McpTool for ListJobsTool {
    fn name(&self) -> &str {
        "list-jobs"
    }
    fn description(&self) -> &str {
        "List background jobs, optionally filtered by status or type."
    }
    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"status": {"type": "string"}, "type": {"type": "string"}},
        })
    }
    async fn execute(&self, state: &AppState, args: Value) -> Result<Value, CoreError> {
        let filter = crate::jobs::JobFilter {
            status: args.get("status").and_then(Value::as_str).and_then(parse_job_status),
            job_type: args.get("type").and_then(Value::as_str).and_then(parse_job_type),
            created_by: None,
        };
        let jobs = state.jobs.list(&filter).await;
        Ok(json!({"jobs": jobs}))
    }
}

// ============ cancel-job ============

struct CancelJobTool;

#[async_trait]
impl McpTool for CancelJobTool {
    fn name(&self) -> &str {
        "cancel-job"
    }
    fn description(&self) -> &str {
        "Request cancellation of a running or queued job."
    }
    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {"job_id": {"type": "string"}}, "required": ["job_id"]})
    }
    async fn execute(&self, state: &AppState, args: Value) -> Result<Value, CoreError> {
        let job_id = arg_str(&args, "job_id")?;
        let cancelled = state.jobs.cancel(&job_id).await.map_err(CoreError::from)?;
        Ok(json!({"cancelled": cancelled}))
    }
}

fn parse_job_status(s: &str) -> Option<crate::models::JobStatus> {
    use crate::models::JobStatus;
    match s {
        "queued" => Some(JobStatus::Queued),
        "running" => Some(JobStatus::Running),
        "completed" => Some(JobStatus::Completed),
        "failed" => Some(JobStatus::Failed),
        "cancelled" => Some(JobStatus::Cancelled),
        _ => None,
    }
}

fn parse_job_type(s: &str) -> Option<JobType> {
    match s {
        "add_bug" => Some(JobType::AddBug),
        "add_folder" => Some(JobType::AddFolder),
        "process_document" => Some(JobType::ProcessDocument),
        "process_folder" => Some(JobType::ProcessFolder),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChunkingConfig;
    use crate::graph::memory::InMemoryGraphRepo;
    use crate::ingest::Ingestor;
    use crate::jobs::JobManager;
    use crate::llm::LlmGateway;
    use crate::vector::sqlite_store::SqliteVectorStore;
    use std::sync::Arc;

    async fn test_state() -> AppState {
        let pool = sqlx::sqlite::SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
        let gateway = Arc::new(LlmGateway::new(None, None));
        let vector: Arc<dyn crate::vector::VectorRepo> = Arc::new(SqliteVectorStore::new(pool, gateway.clone()).await.unwrap());
        let graph: Arc<dyn crate::graph::GraphRepo> = Arc::new(InMemoryGraphRepo::new());
        let chunking = ChunkingConfig { chunk_size: 200, overlap: 20, use_chunking_for_pdf: true };
        let ingestor = Arc::new(Ingestor::new(graph.clone(), vector.clone(), gateway.clone(), chunking, 90));
        let dir = tempfile::tempdir().unwrap();

        AppState {
            config: Arc::new(crate::config::default_config()),
            graph,
            vector,
            llm: gateway,
            ingestor,
            jobs: Arc::new(JobManager::new(dir.path().to_path_buf())),
        }
    }

    #[tokio::test]
    async fn ping_tool_returns_pong() {
        let state = test_state().await;
        let result = PingTool.execute(&state, json!({})).await.unwrap();
        assert_eq!(result["status"], "pong");
    }

    #[tokio::test]
    async fn registry_contains_all_twelve_tools() {
        let names: Vec<&str> = registry().tools.iter().map(|t| t.name()).collect();
        for expected in [
            "ping",
            "search",
            "concept",
            "documents",
            "books-by-concept",
            "related-concepts",
            "passages-about-concept",
            "add_bug",
            "add-folder",
            "job-status",
            "list-jobs",
            "cancel-job",
        ] {
            assert!(names.contains(&expected), "missing tool: {expected}");
        }
        assert_eq!(names.len(), 12);
    }

    #[tokio::test]
    async fn documents_tool_ingests_text() {
        let state = test_state().await;
        let result = DocumentsTool
            .execute(&state, json!({"text": "GraphRAG fuses vector search with a knowledge graph."}))
            .await
            .unwrap();
        assert!(result["document_id"].is_string());
    }

    #[tokio::test]
    async fn documents_tool_rejects_whitespace_only_text() {
        let state = test_state().await;
        let err = DocumentsTool.execute(&state, json!({"text": "   "})).await.unwrap_err();
        assert!(matches!(err, CoreError::BadRequest(_)));
    }

    #[tokio::test]
    async fn concept_tool_reports_not_found() {
        let state = test_state().await;
        let err = ConceptTool.execute(&state, json!({"name": "nonexistent"})).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn dispatch_reports_unknown_tool_as_call_tool_result() {
        let state = test_state().await;
        let response = dispatch(
            &state,
            JsonRpcRequest {
                id: Some(json!(1)),
                method: "tools/call".to_string(),
                params: Some(json!({"name": "no-such-tool", "arguments": {}})),
            },
        )
        .await;

        assert!(response.error.is_none(), "unknown tool must not be a top-level JSON-RPC error");
        let result = response.result.expect("tools/call always returns a CallToolResult");
        assert_eq!(result["isError"], true);
        let payload: Value = serde_json::from_str(result["content"][0]["text"].as_str().unwrap()).unwrap();
        assert_eq!(payload["error"]["code"], METHOD_NOT_FOUND);
        assert!(payload["error"]["data"]["availableTools"].as_array().unwrap().contains(&json!("ping")));
    }

    #[tokio::test]
    async fn dispatch_reports_tool_execution_error_as_call_tool_result() {
        let state = test_state().await;
        let response = dispatch(
            &state,
            JsonRpcRequest {
                id: Some(json!(2)),
                method: "tools/call".to_string(),
                params: Some(json!({"name": "concept", "arguments": {"name": "nonexistent"}})),
            },
        )
        .await;

        assert!(response.error.is_none());
        let result = response.result.expect("tools/call always returns a CallToolResult");
        assert_eq!(result["isError"], true);
        let payload: Value = serde_json::from_str(result["content"][0]["text"].as_str().unwrap()).unwrap();
        assert_eq!(payload["code"], "not_found");
    }
}
