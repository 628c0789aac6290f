//! HTTP service surface (§4.10, §6, C10).
//!
//! Thin Axum handlers: validate input shape, invoke a component, serialize
//! the result or a well-formed error envelope. `document_id` (or the
//! equivalent primary identifier) is always present and explicitly `null` on
//! failure responses, never omitted — handlers use `Option<T>` fields without
//! `skip_serializing_if` for exactly that reason.

use axum::{
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::error::CoreError;
use crate::graph::GraphRepo;
use crate::ingest::Ingestor;
use crate::jobs::{JobFilter, JobManager};
use crate::llm::LlmGateway;
use crate::mcp;
use crate::models::{Concept, Document, DocumentMetadata, DocumentType, IngestStatus, JobStatus, JobType};
use crate::vector::VectorRepo;

/// Shared application state passed to every HTTP handler and every MCP tool.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub graph: Arc<dyn GraphRepo>,
    pub vector: Arc<dyn VectorRepo>,
    pub llm: Arc<LlmGateway>,
    pub ingestor: Arc<Ingestor>,
    pub jobs: Arc<JobManager>,
}

/// Builds the combined HTTP + MCP router and serves it on `config.server.http_bind`.
/// The caller is expected to have already run [`JobManager::recover`].
pub async fn run_http_server(state: AppState) -> anyhow::Result<()> {
    let bind_addr = state.config.server.http_bind.clone();
    let app = router(state);

    tracing::info!(addr = %bind_addr, "HTTP service surface listening");
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Builds the router without binding a listener; exposed for integration tests.
pub fn test_router(state: AppState) -> Router {
    router(state)
}

/// Serves the MCP WebSocket endpoint on `config.server.mcp_bind`.
pub async fn run_mcp_server(state: AppState) -> anyhow::Result<()> {
    let bind_addr = state.config.server.mcp_bind.clone();
    let app = Router::new()
        .route("/", get(mcp::ws_upgrade))
        .route("/mcp", get(mcp::ws_upgrade))
        .with_state(state);

    tracing::info!(addr = %bind_addr, "MCP service surface listening");
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/version", get(handle_version))
        .route("/search", post(handle_search))
        .route("/documents", post(handle_documents))
        .route("/folders", post(handle_folders))
        .route("/jobs/{job_id}", get(handle_job_get))
        .route("/jobs", get(handle_jobs_list))
        .route("/concepts", get(handle_concepts_list))
        .route("/concepts/{name}", get(handle_concept_get))
        .route("/documents/{concept_name}", get(handle_documents_by_concept))
        .route("/mcp", get(mcp::ws_upgrade))
        .layer(cors)
        .with_state(state)
}

// ============ Error envelope ============

pub struct AppError {
    pub status: StatusCode,
    pub body: Value,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        let status = match &err {
            CoreError::BadRequest(_) => StatusCode::BAD_REQUEST,
            CoreError::NotFound(_) => StatusCode::NOT_FOUND,
            CoreError::UpstreamUnavailable(_) | CoreError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        AppError {
            status,
            body: err.to_error_payload(),
        }
    }
}

fn unhandled(err: impl std::fmt::Display) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: serde_json::json!({
            "error": format!("Unhandled exception: {err}"),
            "document_id": Value::Null,
            "traceback": Value::Null,
        }),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    neo4j_connected: bool,
    vector_db_connected: bool,
    version: String,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let neo4j_connected = state.graph.ping().await;
    let (vector_db_connected, _) = state.vector.check_health().await;
    let status = if neo4j_connected && vector_db_connected { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        neo4j_connected,
        vector_db_connected,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /version ============

#[derive(Serialize)]
struct VersionResponse {
    version: String,
}

async fn handle_version() -> Json<VersionResponse> {
    Json(VersionResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /search ============

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default = "default_n_results")]
    n_results: i64,
    #[serde(default = "default_max_hops")]
    max_hops: usize,
    #[serde(default = "default_true")]
    repair_index: bool,
}

fn default_n_results() -> i64 {
    5
}
fn default_max_hops() -> usize {
    2
}
fn default_true() -> bool {
    true
}

#[derive(Serialize)]
struct VectorResultsColumnar {
    ids: Vec<String>,
    documents: Vec<String>,
    metadatas: Vec<HashMap<String, String>>,
    distances: Vec<f64>,
}

#[derive(Serialize)]
struct GraphResultItem {
    id: String,
    name: String,
    relevance_score: f64,
}

#[derive(Serialize)]
struct SearchResponse {
    vector_results: VectorResultsColumnar,
    graph_results: Vec<GraphResultItem>,
}

async fn handle_search(State(state): State<AppState>, Json(req): Json<SearchRequest>) -> Response {
    if req.repair_index {
        let (healthy, diagnostic) = state.vector.check_health().await;
        if !healthy {
            let (repaired, repair_diagnostic) = state.vector.repair().await;
            if !repaired {
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({
                        "error": format!("Vector index unhealthy and repair failed: {diagnostic} / {repair_diagnostic}"),
                        "vector_results": Value::Null,
                        "graph_results": Value::Null,
                    })),
                )
                    .into_response();
            }
        }
    }

    let result = crate::search::hybrid_search(
        state.vector.as_ref(),
        state.graph.as_ref(),
        &req.query,
        req.n_results.max(1) as usize,
        req.max_hops,
    )
    .await;

    match result {
        Ok(hits) => {
            let vector_results = VectorResultsColumnar {
                ids: hits.vector_results.iter().map(|m| m.id.clone()).collect(),
                documents: hits.vector_results.iter().map(|m| m.document.clone()).collect(),
                metadatas: hits.vector_results.iter().map(|m| m.metadata.clone()).collect(),
                distances: hits.vector_results.iter().map(|m| m.distance).collect(),
            };
            let graph_results = hits
                .graph_results
                .into_iter()
                .map(|h| GraphResultItem {
                    id: h.concept_id,
                    name: h.name,
                    relevance_score: h.score,
                })
                .collect();
            Json(SearchResponse { vector_results, graph_results }).into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({
                "error": e.to_string(),
                "vector_results": Value::Null,
                "graph_results": Value::Null,
            })),
        )
            .into_response(),
    }
}

// ============ POST /documents ============

#[derive(Deserialize)]
struct DocumentsRequest {
    text: Option<String>,
    #[serde(default)]
    metadata: Value,
}

async fn handle_documents(State(state): State<AppState>, Json(req): Json<DocumentsRequest>) -> Response {
    let Some(text) = req.text else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "Missing required parameter: text"})),
        )
            .into_response();
    };

    let metadata: DocumentMetadata = if req.metadata.is_null() {
        DocumentMetadata::default()
    } else {
        match serde_json::from_value(req.metadata) {
            Ok(m) => m,
            Err(e) => return unhandled(format!("invalid metadata: {e}")).into_response(),
        }
    };

    let document_type = match metadata.document_type.as_deref() {
        Some("pdf") => DocumentType::Pdf,
        Some("txt") => DocumentType::Txt,
        _ => DocumentType::Text,
    };

    let report = match state.ingestor.ingest(&text, metadata, document_type).await {
        Ok(report) => report,
        Err(e) => return AppError::from(e).into_response(),
    };

    match report.status {
        IngestStatus::Success => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "status": "success",
                "document_id": report.document_id,
                "entities": report.entities_count,
                "relationships": report.relationships_count,
            })),
        )
            .into_response(),
        IngestStatus::PartialFailure => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "partial_failure",
                "document_id": report.document_id,
                "entities": report.entities_count,
                "relationships": report.relationships_count,
                "details": report.details,
            })),
        )
            .into_response(),
        IngestStatus::Duplicate => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "duplicate",
                "document_id": report.document_id,
                "duplicate_detection_method": report.duplicate_detection_method,
            })),
        )
            .into_response(),
        IngestStatus::Failure => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({
                "status": "failure",
                "error": report
                    .details
                    .first()
                    .and_then(|d| d.error.clone())
                    .unwrap_or_else(|| "ingestion failed".to_string()),
                "document_id": Value::Null,
            })),
        )
            .into_response(),
    }
}

// ============ POST /folders ============

#[derive(Deserialize)]
struct FoldersRequest {
    folder_path: String,
    #[serde(default)]
    recursive: bool,
    #[serde(default = "default_file_types")]
    file_types: Vec<String>,
    #[serde(default)]
    default_metadata: Value,
}

fn default_file_types() -> Vec<String> {
    vec![".pdf".to_string(), ".txt".to_string(), ".md".to_string()]
}

async fn handle_folders(State(state): State<AppState>, Json(req): Json<FoldersRequest>) -> Response {
    match start_folder_import_job(&state, &req.folder_path, req.recursive, &req.file_types, req.default_metadata).await {
        Ok(FolderJobStarted { job_id, total_files }) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({"status": "accepted", "job_id": job_id, "total_files": total_files})),
        )
            .into_response(),
        Err(FolderJobError::NoMatches) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "No matching files found in folder"})),
        )
            .into_response(),
        Err(FolderJobError::Other(e)) => unhandled(e).into_response(),
    }
}

pub(crate) struct FolderJobStarted {
    pub job_id: String,
    pub total_files: usize,
}

pub(crate) enum FolderJobError {
    NoMatches,
    Other(anyhow::Error),
}

/// Walks `folder_path` and submits a background `add_folder` job over the
/// matching files, shared by `POST /folders` and the MCP `add-folder` tool.
pub(crate) async fn start_folder_import_job(
    state: &AppState,
    folder_path: &str,
    recursive: bool,
    file_types: &[String],
    default_metadata: Value,
) -> Result<FolderJobStarted, FolderJobError> {
    let files = collect_folder_files(folder_path, recursive, file_types).map_err(FolderJobError::Other)?;
    if files.is_empty() {
        return Err(FolderJobError::NoMatches);
    }

    let total_files = files.len();
    let params = serde_json::json!({
        "folder_path": folder_path,
        "recursive": recursive,
        "file_types": file_types,
        "total_files": total_files,
    });

    let job = state.jobs.create(JobType::AddFolder, params, None).await.map_err(FolderJobError::Other)?;
    let job_id = job.job_id.clone();

    let ingestor = state.ingestor.clone();
    state
        .jobs
        .submit(job, move |token, progress| {
            Box::pin(run_folder_import(ingestor, files, default_metadata, token, progress))
        })
        .await;

    Ok(FolderJobStarted { job_id, total_files })
}

/// Walks `folder_path`, returning every file whose extension matches
/// `file_types` (case-insensitive, dot included, e.g. `.pdf`).
fn collect_folder_files(folder_path: &str, recursive: bool, file_types: &[String]) -> anyhow::Result<Vec<std::path::PathBuf>> {
    let max_depth = if recursive { usize::MAX } else { 1 };
    let wanted: Vec<String> = file_types.iter().map(|e| e.to_lowercase()).collect();

    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(folder_path).max_depth(max_depth).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let ext = entry
            .path()
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
            .unwrap_or_default();
        if wanted.iter().any(|w| w == &ext) {
            files.push(entry.path().to_path_buf());
        }
    }
    Ok(files)
}

/// Background worker for `add-folder`/`POST /folders`: extracts text from
/// each file (PDF via [`crate::pdf`], everything else as UTF-8), ingests it,
/// and reports progress after every file. Per-file failures are recorded in
/// the job result but do not abort the remaining files.
async fn run_folder_import(
    ingestor: Arc<Ingestor>,
    files: Vec<std::path::PathBuf>,
    default_metadata: Value,
    token: tokio_util::sync::CancellationToken,
    progress: crate::jobs::ProgressHandle,
) -> anyhow::Result<Value> {
    let total = files.len() as u64;
    let mut outcomes = Vec::with_capacity(files.len());

    for (i, path) in files.into_iter().enumerate() {
        if token.is_cancelled() {
            break;
        }

        let outcome = ingest_one_file(&ingestor, &path, &default_metadata).await;
        outcomes.push(outcome);
        progress.update((i + 1) as u64, total).await;
    }

    Ok(serde_json::json!({"files": outcomes}))
}

async fn ingest_one_file(ingestor: &Ingestor, path: &std::path::Path, default_metadata: &Value) -> Value {
    let file_str = path.display().to_string();
    let is_pdf = path.extension().map(|e| e.eq_ignore_ascii_case("pdf")).unwrap_or(false);

    let text = if is_pdf {
        match std::fs::read(path).and_then(|b| crate::pdf::extract_text(&b).map_err(std::io::Error::other)) {
            Ok(t) => t,
            Err(e) => return serde_json::json!({"status": "failure", "file": file_str, "error": e.to_string()}),
        }
    } else {
        match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) => return serde_json::json!({"status": "failure", "file": file_str, "error": e.to_string()}),
        }
    };

    let mut metadata: DocumentMetadata = serde_json::from_value(default_metadata.clone()).unwrap_or_default();
    metadata.file_path = Some(file_str.clone());
    metadata.filename = path.file_name().map(|n| n.to_string_lossy().to_string());
    if is_pdf {
        metadata.document_type = Some("pdf".to_string());
    }
    let document_type = if is_pdf { DocumentType::Pdf } else { DocumentType::Text };

    let report = match ingestor.ingest(&text, metadata, document_type).await {
        Ok(report) => report,
        Err(e) => return serde_json::json!({"status": "failure", "file": file_str, "error": e.to_string()}),
    };
    match report.status {
        IngestStatus::Success | IngestStatus::PartialFailure => {
            serde_json::json!({"status": "success", "document_id": report.document_id, "file": file_str})
        }
        IngestStatus::Duplicate => {
            serde_json::json!({"status": "duplicate", "document_id": report.document_id, "file": file_str})
        }
        IngestStatus::Failure => serde_json::json!({
            "status": "failure",
            "file": file_str,
            "error": report.details.first().and_then(|d| d.error.clone()).unwrap_or_else(|| "ingestion failed".to_string()),
        }),
    }
}

// ============ GET /jobs/{job_id}, GET /jobs ============

async fn handle_job_get(State(state): State<AppState>, AxumPath(job_id): AxumPath<String>) -> Result<Json<Value>, AppError> {
    let job = state
        .jobs
        .get(&job_id)
        .await
        .ok_or_else(|| CoreError::not_found(format!("Unknown job: {job_id}")))?;
    Ok(Json(serde_json::to_value(job).map_err(|e| CoreError::Internal(e.to_string()))?))
}

#[derive(Deserialize)]
struct JobsListQuery {
    status: Option<String>,
    #[serde(rename = "type")]
    job_type: Option<String>,
}

async fn handle_jobs_list(State(state): State<AppState>, Query(q): Query<JobsListQuery>) -> Result<Json<Value>, AppError> {
    let filter = JobFilter {
        status: q.status.as_deref().and_then(parse_job_status),
        job_type: q.job_type.as_deref().and_then(parse_job_type),
        created_by: None,
    };
    let jobs = state.jobs.list(&filter).await;
    Ok(Json(serde_json::json!({"jobs": jobs})))
}

fn parse_job_status(s: &str) -> Option<JobStatus> {
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

// ============ GET /concepts, GET /concepts/{name} ============

async fn handle_concepts_list(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let concepts = state.graph.list_concepts().await?;
    Ok(Json(serde_json::json!({"concepts": dedupe_by_id(concepts)})))
}

async fn handle_concept_get(State(state): State<AppState>, AxumPath(name): AxumPath<String>) -> Result<Json<Concept>, AppError> {
    let normalized = Concept::normalize(&name);
    let concept = state
        .graph
        .find_concept_by_name(&normalized)
        .await?
        .ok_or_else(|| CoreError::not_found(format!("Unknown concept: {name}")))?;
    Ok(Json(concept))
}

// ============ GET /documents/{concept_name}?limit= ============

#[derive(Deserialize)]
struct DocumentsByConceptQuery {
    limit: Option<usize>,
}

async fn handle_documents_by_concept(
    State(state): State<AppState>,
    AxumPath(concept_name): AxumPath<String>,
    Query(q): Query<DocumentsByConceptQuery>,
) -> Result<Json<Value>, AppError> {
    let normalized = Concept::normalize(&concept_name);
    let documents = state.graph.documents_mentioning(&normalized, q.limit.unwrap_or(20)).await?;
    Ok(Json(serde_json::json!({"documents": dedupe_by_id(documents)})))
}

fn dedupe_by_id<T: HasId>(items: Vec<T>) -> Vec<T> {
    let mut seen = std::collections::HashSet::new();
    items.into_iter().filter(|item| seen.insert(item.id().to_string())).collect()
}

trait HasId {
    fn id(&self) -> &str;
}

impl HasId for Concept {
    fn id(&self) -> &str {
        &self.id
    }
}

impl HasId for Document {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Builds the two-line bug report document body, shared with the MCP
/// `add_bug` tool so both surfaces ingest the same text.
pub fn bug_report_text(description: &str, cause: &str) -> String {
    format!("Bug: {description}\nCause: {cause}")
}
