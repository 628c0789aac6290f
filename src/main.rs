//! `graphrag` binary entry point: loads configuration, recovers any jobs
//! left `running` by a prior crash, and serves the HTTP and MCP surfaces
//! concurrently until interrupted.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use graphrag_engine::config::{self, Config};
use graphrag_engine::graph::neo4j::Neo4jGraphRepo;
use graphrag_engine::graph::GraphRepo;
use graphrag_engine::ingest::Ingestor;
use graphrag_engine::jobs::JobManager;
use graphrag_engine::llm::LlmGateway;
use graphrag_engine::logging;
use graphrag_engine::server::{self, AppState};
use graphrag_engine::vector::sqlite_store::SqliteVectorStore;
use graphrag_engine::vector::VectorRepo;

/// GraphRAG ingestion and hybrid-retrieval engine.
#[derive(Parser, Debug)]
#[command(name = "graphrag", version, about)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "config/graphrag.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let cli = Cli::parse();

    let config = if cli.config.exists() {
        config::load_config(&cli.config)?
    } else {
        tracing::warn!(path = %cli.config.display(), "config file not found, using defaults");
        config::default_config()
    };

    let state = build_state(config).await?;
    state.jobs.recover().await?;

    let http_state = state.clone();
    let mcp_state = state.clone();

    tokio::select! {
        res = server::run_http_server(http_state) => res,
        res = server::run_mcp_server(mcp_state) => res,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
            Ok(())
        }
    }
}

async fn build_state(config: Config) -> anyhow::Result<AppState> {
    let graph: Arc<dyn GraphRepo> =
        Arc::new(Neo4jGraphRepo::connect(&config.graph.uri, &config.graph.user, &config.graph.password).await?);

    std::fs::create_dir_all(&config.vector.persist_directory)?;
    let connect_options = sqlx::sqlite::SqliteConnectOptions::new()
        .filename(config.vector.persist_directory.join("vectors.db"))
        .create_if_missing(true);
    let pool = sqlx::sqlite::SqlitePoolOptions::new().connect_with(connect_options).await?;
    let llm = Arc::new(LlmGateway::from_config(config.llm.primary.as_ref(), config.llm.fallback.as_ref())?);
    let vector: Arc<dyn VectorRepo> = Arc::new(SqliteVectorStore::new(pool, llm.clone()).await?);

    let ingestor = Arc::new(Ingestor::new(
        graph.clone(),
        vector.clone(),
        llm.clone(),
        config.chunking.clone(),
        config.retrieval.fuzzy_dedup_threshold,
    ));
    let jobs = Arc::new(JobManager::new(config.jobs.state_dir.clone()));

    Ok(AppState { config: Arc::new(config), graph, vector, llm, ingestor, jobs })
}
