//! End-to-end HTTP surface tests: the real Axum router driven in-process
//! with `tower::ServiceExt`, backed by the in-memory graph repo and a
//! SQLite-backed vector store.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use graphrag_engine::config::{default_config, ChunkingConfig, Config};
use graphrag_engine::graph::memory::InMemoryGraphRepo;
use graphrag_engine::graph::GraphRepo;
use graphrag_engine::ingest::Ingestor;
use graphrag_engine::jobs::JobManager;
use graphrag_engine::llm::LlmGateway;
use graphrag_engine::server::{test_router, AppState};
use graphrag_engine::vector::sqlite_store::SqliteVectorStore;
use graphrag_engine::vector::VectorRepo;

async fn test_state() -> (AppState, tempfile::TempDir) {
    let pool = sqlx::sqlite::SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
    let gateway = Arc::new(LlmGateway::new(None, None));
    let vector: Arc<dyn VectorRepo> = Arc::new(SqliteVectorStore::new(pool, gateway.clone()).await.unwrap());
    let graph: Arc<dyn GraphRepo> = Arc::new(InMemoryGraphRepo::new());
    let chunking = ChunkingConfig { chunk_size: 200, overlap: 20, use_chunking_for_pdf: true };
    let ingestor = Arc::new(Ingestor::new(graph.clone(), vector.clone(), gateway.clone(), chunking, 90));

    let state_dir = tempfile::tempdir().unwrap();
    let jobs = Arc::new(JobManager::new(state_dir.path().to_path_buf()));

    let config: Config = default_config();
    let state = AppState { config: Arc::new(config), graph, vector, llm: gateway, ingestor, jobs };
    (state, state_dir)
}

async fn json_body(resp: axum::response::Response) -> serde_json::Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_reports_ok_when_both_stores_reachable() {
    let (state, _dir) = test_state().await;
    let app = test_router(state);
    let resp = app.oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["neo4j_connected"], true);
}

#[tokio::test]
async fn documents_then_search_round_trip() {
    let (state, _dir) = test_state().await;
    let app = test_router(state);

    let create_req = json_request(
        "POST",
        "/documents",
        serde_json::json!({
            "text": "GraphRAG combines a knowledge graph with vector search.",
            "metadata": {"title": "Overview", "concepts": "GraphRAG, Neo4j"},
        }),
    );
    let create_resp = app.clone().oneshot(create_req).await.unwrap();
    assert_eq!(create_resp.status(), StatusCode::CREATED);
    let created = json_body(create_resp).await;
    assert!(created["document_id"].is_string());

    let search_req = json_request("POST", "/search", serde_json::json!({"query": "knowledge graph", "repair_index": false}));
    let search_resp = app.oneshot(search_req).await.unwrap();
    assert_eq!(search_resp.status(), StatusCode::OK);
    let results = json_body(search_resp).await;
    assert!(!results["vector_results"]["ids"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn documents_rejects_missing_text() {
    let (state, _dir) = test_state().await;
    let app = test_router(state);
    let resp = app.oneshot(json_request("POST", "/documents", serde_json::json!({}))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn documents_rejects_whitespace_only_text() {
    let (state, _dir) = test_state().await;
    let app = test_router(state);
    let resp = app.oneshot(json_request("POST", "/documents", serde_json::json!({"text": "   "}))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn folders_returns_404_for_empty_folder() {
    let (state, _dir) = test_state().await;
    let app = test_router(state);
    let empty = tempfile::tempdir().unwrap();
    let resp = app
        .oneshot(json_request(
            "POST",
            "/folders",
            serde_json::json!({"folder_path": empty.path().to_string_lossy()}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn jobs_list_is_empty_before_any_folder_import() {
    let (state, _dir) = test_state().await;
    let app = test_router(state);
    let resp = app.oneshot(Request::builder().uri("/jobs").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["jobs"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn concept_lookup_returns_404_when_unknown() {
    let (state, _dir) = test_state().await;
    let app = test_router(state);
    let resp = app.oneshot(Request::builder().uri("/concepts/nonexistent").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn folder_import_ingests_matching_files_in_background() {
    let (state, _dir) = test_state().await;
    let folder = tempfile::tempdir().unwrap();
    std::fs::write(folder.path().join("a.txt"), "Vector search retrieves nearest neighbors.").unwrap();
    std::fs::write(folder.path().join("ignored.bin"), [0u8, 1, 2]).unwrap();

    let app = test_router(state.clone());
    let resp = app
        .oneshot(json_request(
            "POST",
            "/folders",
            serde_json::json!({"folder_path": folder.path().to_string_lossy(), "file_types": [".txt"]}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let body = json_body(resp).await;
    assert_eq!(body["total_files"], 1);
    let job_id = body["job_id"].as_str().unwrap().to_string();

    for _ in 0..50 {
        if let Some(job) = state.jobs.get(&job_id).await {
            if job.status.is_terminal() {
                assert_eq!(job.status, graphrag_engine::models::JobStatus::Completed);
                return;
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    panic!("folder import job did not complete in time");
}
