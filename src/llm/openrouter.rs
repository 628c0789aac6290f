//! OpenRouter provider: an OpenAI-compatible chat endpoint with a different
//! default base URL and no embeddings support.

use anyhow::Result;
use async_trait::async_trait;

use super::openai::post_with_retry;
use super::LlmProvider;
use crate::config::LlmProviderConfig;

pub struct OpenRouterProvider {
    api_key: String,
    base_url: String,
    model: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenRouterProvider {
    pub fn new(config: &LlmProviderConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENROUTER_API_KEY").ok())
            .ok_or_else(|| anyhow::anyhow!("llm.provider=openrouter requires api_key or OPENROUTER_API_KEY"))?;
        let model = config
            .model
            .clone()
            .unwrap_or_else(|| "openrouter/auto".to_string());
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| "https://openrouter.ai/api/v1".to_string());
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            api_key,
            base_url,
            model,
            max_retries: config.max_retries,
            client,
        })
    }
}

#[async_trait]
impl LlmProvider for OpenRouterProvider {
    fn name(&self) -> &str {
        "openrouter"
    }

    async fn generate(
        &self,
        prompt: &str,
        system: Option<&str>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<String> {
        let mut messages = Vec::new();
        if let Some(system) = system {
            messages.push(serde_json::json!({"role": "system", "content": system}));
        }
        messages.push(serde_json::json!({"role": "user", "content": prompt}));

        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": max_tokens.unwrap_or(1024),
            "temperature": temperature.unwrap_or(0.2),
        });

        let json = post_with_retry(
            &self.client,
            &format!("{}/chat/completions", self.base_url),
            &self.api_key,
            &body,
            self.max_retries,
        )
        .await?;

        json.get("choices")
            .and_then(|c| c.as_array())
            .and_then(|a| a.first())
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow::anyhow!("OpenRouter response missing choices[0].message.content"))
    }

    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        anyhow::bail!("Error: OpenRouter does not support embeddings")
    }
}
