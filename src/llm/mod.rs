//! LLM provider chain (§4.8, C3).
//!
//! [`LlmGateway`] wraps a primary and optional fallback [`LlmProvider`].
//! A provider invocation is *failed* if it errors, if its textual result
//! begins with a known sentinel, or if it contains an explicit rate-limit
//! marker; embeddings additionally fail when every returned vector is all
//! zeros. On failure the fallback is tried once.

pub mod ollama;
pub mod openai;
pub mod openrouter;
pub mod parsing;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::config::LlmProviderConfig;

/// One concrete backend (OpenAI-compatible, Ollama, OpenRouter, ...).
///
/// Provider-specific request/response framing lives entirely in the
/// `openai`/`ollama`/`openrouter` modules; this trait is the only surface
/// [`LlmGateway`] depends on.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(
        &self,
        prompt: &str,
        system: Option<&str>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<String>;

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Builds the concrete provider for a configured slot.
pub fn build_provider(config: &LlmProviderConfig) -> Result<Box<dyn LlmProvider>> {
    match config.provider.as_str() {
        "openai" => Ok(Box::new(openai::OpenAiProvider::new(config)?)),
        "ollama" => Ok(Box::new(ollama::OllamaProvider::new(config)?)),
        "openrouter" => Ok(Box::new(openrouter::OpenRouterProvider::new(config)?)),
        other => bail!("Unknown LLM provider: {}", other),
    }
}

/// Sentinel prefixes a provider uses in lieu of raising, mirroring how some
/// HTTP clients swallow transport errors into a string return value.
const ERROR_SENTINELS: &[&str] = &["Error:", "API Response:"];

const RATE_LIMIT_MARKERS: &[&str] = &["rate limit", "rate_limit", "429 too many requests"];

fn looks_like_failure(text: &str) -> bool {
    if ERROR_SENTINELS.iter().any(|s| text.starts_with(s)) {
        return true;
    }
    let lower = text.to_lowercase();
    RATE_LIMIT_MARKERS.iter().any(|m| lower.contains(m))
}

fn embedding_failed(vectors: &[Vec<f32>]) -> bool {
    !vectors.is_empty() && vectors.iter().all(|v| v.iter().all(|x| *x == 0.0))
}

/// Primary/fallback provider chain, the only LLM entry point the rest of
/// the crate calls through.
pub struct LlmGateway {
    primary: Option<Box<dyn LlmProvider>>,
    fallback: Option<Box<dyn LlmProvider>>,
}

impl LlmGateway {
    pub fn new(primary: Option<Box<dyn LlmProvider>>, fallback: Option<Box<dyn LlmProvider>>) -> Self {
        Self { primary, fallback }
    }

    /// Builds a gateway from config, skipping slots left unset.
    pub fn from_config(primary: Option<&LlmProviderConfig>, fallback: Option<&LlmProviderConfig>) -> Result<Self> {
        let primary = primary.map(build_provider).transpose()?;
        let fallback = fallback.map(build_provider).transpose()?;
        Ok(Self::new(primary, fallback))
    }

    pub fn is_configured(&self) -> bool {
        self.primary.is_some()
    }

    pub async fn generate(
        &self,
        prompt: &str,
        system: Option<&str>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<String> {
        let Some(primary) = &self.primary else {
            bail!("No LLM provider configured");
        };

        match primary.generate(prompt, system, max_tokens, temperature).await {
            Ok(text) if !looks_like_failure(&text) => return Ok(text),
            Ok(text) => {
                tracing::warn!(provider = primary.name(), "primary generate returned failure sentinel");
                if let Some(fallback) = &self.fallback {
                    return fallback.generate(prompt, system, max_tokens, temperature).await;
                }
                Ok(text)
            }
            Err(err) => {
                tracing::warn!(provider = primary.name(), error = %err, "primary generate failed");
                if let Some(fallback) = &self.fallback {
                    fallback.generate(prompt, system, max_tokens, temperature).await
                } else {
                    Err(err)
                }
            }
        }
    }

    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let Some(primary) = &self.primary else {
            bail!("No LLM provider configured");
        };

        match primary.embed(texts).await {
            Ok(vectors) if !embedding_failed(&vectors) => return Ok(vectors),
            Ok(vectors) => {
                tracing::warn!(provider = primary.name(), "primary embed returned all-zero vectors");
                if let Some(fallback) = &self.fallback {
                    return fallback.embed(texts).await;
                }
                Ok(vectors)
            }
            Err(err) => {
                tracing::warn!(provider = primary.name(), error = %err, "primary embed failed");
                if let Some(fallback) = &self.fallback {
                    fallback.embed(texts).await
                } else {
                    Err(err)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_error_sentinel() {
        assert!(looks_like_failure("Error: timeout"));
        assert!(looks_like_failure("API Response: 500"));
        assert!(!looks_like_failure("Deep learning is a subfield of ML."));
    }

    #[test]
    fn detects_rate_limit_marker() {
        assert!(looks_like_failure("Request failed: Rate Limit exceeded"));
    }

    #[test]
    fn all_zero_vectors_are_a_failure() {
        assert!(embedding_failed(&[vec![0.0, 0.0], vec![0.0, 0.0]]));
        assert!(!embedding_failed(&[vec![0.0, 0.1]]));
        assert!(!embedding_failed(&[]));
    }
}
