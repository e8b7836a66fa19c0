//! Text generation providers.
//!
//! [`OpenAIGenerator`] calls `POST {api_base}/chat/completions` with the
//! same retry policy as the embedding client. [`DisabledGenerator`] fails
//! every call, which still lets `gw retrieve` run without generation
//! credentials.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;

use groundwork_core::answer::{GenerationOptions, Generator};

use crate::config::GenerationConfig;
use crate::openai;

pub struct DisabledGenerator;

#[async_trait]
impl Generator for DisabledGenerator {
    async fn complete(
        &self,
        _system_prompt: &str,
        _user_prompt: &str,
        _options: &GenerationOptions,
    ) -> Result<String> {
        bail!("Generation provider is disabled. Set [generation] provider in config.")
    }
}

pub struct OpenAIGenerator {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
    max_retries: u32,
}

impl OpenAIGenerator {
    /// Create a generator using `OPENAI_API_KEY`.
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        Self::with_api_key(config, openai::api_key_from_env()?)
    }

    pub fn with_api_key(config: &GenerationConfig, api_key: String) -> Result<Self> {
        Ok(Self {
            client: openai::build_client(config.timeout_secs)?,
            api_key,
            api_base: config.api_base.clone(),
            model: config.model.clone(),
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Generator for OpenAIGenerator {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt},
            ],
            "temperature": options.temperature,
            "max_tokens": options.max_tokens,
        });

        let json = openai::post_json(
            &self.client,
            &openai::endpoint(&self.api_base, "chat/completions"),
            &self.api_key,
            &body,
            self.max_retries,
        )
        .await?;

        parse_completion(&json)
    }
}

/// Extract `choices[0].message.content`. A `null` content is an empty answer.
fn parse_completion(json: &serde_json::Value) -> Result<String> {
    let message = json
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: no completion choices"))?;
    let content = message
        .get("content")
        .and_then(|c| c.as_str())
        .unwrap_or_default();
    Ok(content.to_string())
}

/// Create the configured [`Generator`].
pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn Generator>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledGenerator)),
        "openai" => Ok(Arc::new(OpenAIGenerator::new(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}
