//! Embedding provider implementations.
//!
//! - **[`DisabledEmbedder`]**: returns errors; used when embeddings are not configured.
//! - **[`OpenAIEmbedder`]**: calls the OpenAI embeddings API with batching, retry, and backoff.
//!
//! Use [`create_embedder`] to build the configured provider, wrapped in the
//! query embedding cache when `embedding.cache_ttl_secs > 0`.
//!
//! ```rust
//! # use groundwork::config::EmbeddingConfig;
//! # use groundwork::embedding::create_embedder;
//! let config = EmbeddingConfig::default(); // provider = "disabled"
//! let provider = create_embedder(&config).unwrap();
//! assert_eq!(provider.model_name(), "disabled");
//! ```

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;

use groundwork_core::cache::{CachedEmbedder, InMemoryEmbeddingCache};
use groundwork_core::embedding::EmbeddingProvider;

use crate::config::EmbeddingConfig;
use crate::openai;

// ============ Disabled Provider ============

/// Fails every call with a descriptive error.
pub struct DisabledEmbedder;

#[async_trait]
impl EmbeddingProvider for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }

    fn dims(&self) -> usize {
        0
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.")
    }

    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.")
    }
}

// ============ OpenAI Provider ============

/// Embedding provider using `POST {api_base}/embeddings`.
///
/// Inputs are cut to `max_input_chars`, sent in batches of `batch_size`,
/// and every returned vector is checked against `dims`.
pub struct OpenAIEmbedder {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
    dims: usize,
    batch_size: usize,
    max_retries: u32,
    max_input_chars: usize,
}

impl OpenAIEmbedder {
    /// Create a provider using `OPENAI_API_KEY`.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        Self::with_api_key(config, openai::api_key_from_env()?)
    }

    pub fn with_api_key(config: &EmbeddingConfig, api_key: String) -> Result<Self> {
        Ok(Self {
            client: openai::build_client(config.timeout_secs)?,
            api_key,
            api_base: config.api_base.clone(),
            model: config.model.clone(),
            dims: config.dims,
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries,
            max_input_chars: config.max_input_chars,
        })
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let input: Vec<String> = texts
            .iter()
            .map(|t| t.chars().take(self.max_input_chars).collect())
            .collect();
        let body = serde_json::json!({
            "model": self.model,
            "input": input,
            "dimensions": self.dims,
        });

        let json = openai::post_json(
            &self.client,
            &openai::endpoint(&self.api_base, "embeddings"),
            &self.api_key,
            &body,
            self.max_retries,
        )
        .await?;

        let vectors = parse_embedding_response(&json, texts.len())?;
        for v in &vectors {
            if v.len() != self.dims {
                bail!(
                    "OpenAI returned a {}-dimensional embedding, expected {}",
                    v.len(),
                    self.dims
                );
            }
        }
        Ok(vectors)
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.request(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            out.extend(self.request(batch).await?);
        }
        Ok(out)
    }
}

/// Extract `data[].embedding`, ordered by each item's `index`.
fn parse_embedding_response(json: &serde_json::Value, expected: usize) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing data array"))?;

    if data.len() != expected {
        bail!(
            "Invalid OpenAI response: {} embeddings for {} inputs",
            data.len(),
            expected
        );
    }

    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
    for (position, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing embedding"))?;

        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();

        match slots.get_mut(index) {
            Some(slot) if slot.is_none() => *slot = Some(vec),
            _ => bail!("Invalid OpenAI response: bad or repeated index {}", index),
        }
    }

    slots
        .into_iter()
        .map(|s| s.ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing index")))
        .collect()
}

/// Create the configured [`EmbeddingProvider`].
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledEmbedder`] |
/// | `"openai"` | [`OpenAIEmbedder`], cached unless `cache_ttl_secs = 0` |
///
/// # Errors
///
/// Unknown provider names, or `OPENAI_API_KEY` missing for `"openai"`.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledEmbedder)),
        "openai" => {
            let provider = OpenAIEmbedder::new(config)?;
            if config.cache_ttl_secs == 0 {
                return Ok(Arc::new(provider));
            }
            let cache = InMemoryEmbeddingCache::new(config.cache_ttl_secs, config.cache_capacity);
            Ok(Arc::new(CachedEmbedder::new(provider, Box::new(cache))))
        }
        other => bail!("Unknown embedding provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_reorders_by_index() {
        let resp = json!({
            "data": [
                {"index": 1, "embedding": [0.0, 1.0]},
                {"index": 0, "embedding": [1.0, 0.0]},
            ]
        });
        let v = parse_embedding_response(&resp, 2).unwrap();
        assert_eq!(v[0], vec![1.0, 0.0]);
        assert_eq!(v[1], vec![0.0, 1.0]);
    }

    #[test]
    fn test_parse_rejects_count_mismatch() {
        let resp = json!({"data": [{"index": 0, "embedding": [1.0]}]});
        assert!(parse_embedding_response(&resp, 2).is_err());
    }

    #[test]
    fn test_parse_rejects_repeated_index() {
        let resp = json!({
            "data": [
                {"index": 0, "embedding": [1.0]},
                {"index": 0, "embedding": [2.0]},
            ]
        });
        assert!(parse_embedding_response(&resp, 2).is_err());
    }

    #[tokio::test]
    async fn test_disabled_always_errors() {
        let e = DisabledEmbedder;
        assert!(e.embed("hello").await.is_err());
        assert!(e.embed_batch(&["a".to_string()]).await.is_err());
    }

    #[test]
    fn test_unknown_provider() {
        let config = EmbeddingConfig {
            provider: "ollama".to_string(),
            ..EmbeddingConfig::default()
        };
        assert!(create_embedder(&config).is_err());
    }
}
