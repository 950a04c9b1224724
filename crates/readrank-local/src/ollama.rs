use readrank_core::{EmbeddingBackend, Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Embedding endpoint settings, read once and carried as a value.
#[derive(Debug, Clone)]
pub struct EmbedConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_ms: u64,
}

impl EmbedConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: env("READRANK_EMBED_BASE_URL")
                .unwrap_or_else(|| "http://127.0.0.1:11434".to_string()),
            model: env("READRANK_EMBED_MODEL").unwrap_or_else(|| "nomic-embed-text".to_string()),
            timeout_ms: env("READRANK_EMBED_TIMEOUT_MS")
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(5_000),
        }
    }
}

/// Ollama embeddings client. One bounded HTTP call per `embed`.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl OllamaClient {
    pub fn new(client: reqwest::Client, cfg: &EmbedConfig) -> Self {
        Self {
            client,
            base_url: cfg.base_url.clone(),
            model: cfg.model.clone(),
            timeout: Duration::from_millis(cfg.timeout_ms.max(1)),
        }
    }

    fn endpoint_embeddings(&self) -> String {
        format!("{}/api/embeddings", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Clone, Serialize)]
struct EmbeddingsRequest {
    model: String,
    prompt: String,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingsResponse {
    #[serde(default)]
    embedding: Vec<f32>,
}

#[async_trait::async_trait]
impl EmbeddingBackend for OllamaClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn embed(&self, prompt: &str) -> Result<Vec<f32>> {
        let req = EmbeddingsRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
        };

        let resp = self
            .client
            .post(self.endpoint_embeddings())
            .timeout(self.timeout)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(&req)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(format!("embedding request: {e}"))
                } else {
                    Error::Embedding(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Embedding(format!("embeddings HTTP {status}")));
        }

        let parsed: EmbeddingsResponse =
            resp.json().await.map_err(|e| Error::Embedding(e.to_string()))?;
        if parsed.embedding.is_empty() {
            return Err(Error::Embedding("empty embedding vector".to_string()));
        }
        Ok(parsed.embedding)
    }
}
