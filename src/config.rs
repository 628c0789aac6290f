//! Configuration parsing and validation (§6).
//!
//! The engine is configured via a TOML file (default: `config/graphrag.toml`).
//! Recognized process environment variables override the corresponding
//! default, and an explicit value passed to a constructor wins over both —
//! precedence is explicit parameter > environment > default.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub vector: VectorConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GraphConfig {
    #[serde(default = "default_neo4j_uri")]
    pub uri: String,
    #[serde(default = "default_neo4j_user")]
    pub user: String,
    #[serde(default = "default_neo4j_password")]
    pub password: String,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: env_or("NEO4J_URI", default_neo4j_uri()),
            user: env_or("NEO4J_USER", default_neo4j_user()),
            password: env_or("NEO4J_PASSWORD", default_neo4j_password()),
        }
    }
}

fn default_neo4j_uri() -> String {
    "bolt://localhost:7687".to_string()
}
fn default_neo4j_user() -> String {
    "neo4j".to_string()
}
fn default_neo4j_password() -> String {
    "graphrag".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct VectorConfig {
    #[serde(default = "default_chroma_dir")]
    pub persist_directory: PathBuf,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            persist_directory: env_or("CHROMA_PERSIST_DIRECTORY", default_chroma_dir().display().to_string()).into(),
        }
    }
}

fn default_chroma_dir() -> PathBuf {
    PathBuf::from("./data/chromadb")
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmProviderConfig {
    pub provider: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_timeout_secs() -> u64 {
    60
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_retries() -> u32 {
    3
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LlmConfig {
    pub primary: Option<LlmProviderConfig>,
    pub fallback: Option<LlmProviderConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
    #[serde(default = "default_true")]
    pub use_chunking_for_pdf: bool,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
            use_chunking_for_pdf: true,
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_overlap() -> usize {
    100
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_k_vector")]
    pub k_vector: i64,
    #[serde(default = "default_max_hops")]
    pub max_hops: usize,
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_dedup_threshold: u8,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k_vector: default_k_vector(),
            max_hops: default_max_hops(),
            fuzzy_dedup_threshold: default_fuzzy_threshold(),
        }
    }
}

fn default_k_vector() -> i64 {
    5
}
fn default_max_hops() -> usize {
    2
}
fn default_fuzzy_threshold() -> u8 {
    90
}

#[derive(Debug, Deserialize, Clone)]
pub struct JobsConfig {
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
        }
    }
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("./data/state")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_http_bind")]
    pub http_bind: String,
    #[serde(default = "default_mcp_bind")]
    pub mcp_bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_bind: env_or("GRAPHRAG_PORT_API", default_http_bind()),
            mcp_bind: env_or("GRAPHRAG_PORT_MCP", default_mcp_bind()),
        }
    }
}

fn default_http_bind() -> String {
    "0.0.0.0:5001".to_string()
}
fn default_mcp_bind() -> String {
    "0.0.0.0:8767".to_string()
}

/// Resolves a port-like environment variable, substituting it into the
/// default bind string's port segment when the variable holds a bare port
/// number (matching the `GRAPHRAG_PORT_*` conventions of §6), otherwise
/// returning the default unchanged.
fn env_or(key: &str, default: String) -> String {
    match std::env::var(key) {
        Ok(val) if !val.is_empty() => {
            if let Ok(port) = val.parse::<u16>() {
                if let Some(host) = default.rsplit_once(':').map(|(h, _)| h) {
                    return format!("{host}:{port}");
                }
            }
            val
        }
        _ => default,
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Loads defaults (env-overridden) without requiring a config file on disk.
pub fn default_config() -> Config {
    toml::from_str("").expect("empty config parses to defaults")
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.overlap >= config.chunking.chunk_size {
        anyhow::bail!("chunking.overlap must be < chunking.chunk_size");
    }
    if config.retrieval.k_vector < 1 {
        anyhow::bail!("retrieval.k_vector must be >= 1");
    }
    if config.retrieval.fuzzy_dedup_threshold > 100 {
        anyhow::bail!("retrieval.fuzzy_dedup_threshold must be <= 100");
    }
    if let Some(primary) = &config.llm.primary {
        validate_provider(primary)?;
    }
    if let Some(fallback) = &config.llm.fallback {
        validate_provider(fallback)?;
    }
    Ok(())
}

fn validate_provider(provider: &LlmProviderConfig) -> Result<()> {
    match provider.provider.as_str() {
        "openai" | "ollama" | "openrouter" => Ok(()),
        other => anyhow::bail!(
            "Unknown LLM provider: '{}'. Must be openai, ollama, or openrouter.",
            other
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = default_config();
        validate(&config).unwrap();
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.retrieval.max_hops, 2);
    }

    #[test]
    fn rejects_overlap_at_or_above_chunk_size() {
        let mut config = default_config();
        config.chunking.overlap = config.chunking.chunk_size;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn rejects_unknown_llm_provider() {
        let mut config = default_config();
        config.llm.primary = Some(LlmProviderConfig {
            provider: "bogus".to_string(),
            base_url: None,
            api_key: None,
            model: None,
            timeout_secs: 60,
            max_tokens: 100,
            temperature: 0.0,
            max_retries: 1,
        });
        assert!(validate(&config).is_err());
    }
}
