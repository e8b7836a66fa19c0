//! Configuration parsing and validation.
//!
//! Groundwork is configured via a TOML file (default: `config/groundwork.toml`).
//! Every section and key has a default, so a minimal file only needs what
//! differs from them.
//!
//! # Example Configuration
//!
//! ```toml
//! [db]
//! url = "postgres://localhost/groundwork"
//!
//! [retrieval]
//! final_limit = 12
//! lexical_mode = "candidate"
//!
//! [embedding]
//! provider = "openai"
//! model = "text-embedding-3-small"
//! dims = 1536
//!
//! [generation]
//! provider = "openai"
//! model = "gpt-4o-mini"
//!
//! [server]
//! bind = "127.0.0.1:7331"
//! ```
//!
//! # Validation
//!
//! [`load_config`] rejects:
//! - reranking weights outside `[0, 1]` or not summing to 1
//! - `mmr_lambda` outside `[0, 1]`, a non-positive recency half-life
//! - `final_limit`, `shortlist_size` or `embedding.batch_size` of zero
//! - unknown provider, `lexical_mode` or `mmr_redundancy` names
//! - an enabled embedding provider without `model` or `dims`
//!
//! Credentials are never read from this file; see [`crate::context`].

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

use groundwork_core::answer::{GenerationOptions, SynthesisParams};
use groundwork_core::diversity::{MmrParams, Redundancy};
use groundwork_core::lexical::ShortlistParams;
use groundwork_core::rerank::{LexicalWeighting, RerankParams};
use groundwork_core::PipelineSettings;

const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Top-level configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    /// Postgres connection string. Falls back to `$DATABASE_URL`.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
        }
    }
}

fn default_max_connections() -> u32 {
    5
}

impl DbConfig {
    /// The configured URL, or `$DATABASE_URL`.
    pub fn database_url(&self) -> Result<String> {
        if let Some(url) = self.url.as_ref().filter(|u| !u.trim().is_empty()) {
            return Ok(url.clone());
        }
        std::env::var("DATABASE_URL")
            .context("db.url is not set and DATABASE_URL is not in the environment")
    }
}

/// Retrieval tuning. See [`Config::pipeline_settings`].
#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_shortlist_size")]
    pub shortlist_size: usize,
    #[serde(default = "default_final_limit")]
    pub final_limit: usize,
    #[serde(default = "default_lexical_floor")]
    pub lexical_floor: f64,
    #[serde(default = "default_substring_score")]
    pub substring_score: f64,
    #[serde(default = "default_vector_weight")]
    pub vector_weight: f64,
    #[serde(default = "default_lexical_weight")]
    pub lexical_weight: f64,
    #[serde(default = "default_recency_weight")]
    pub recency_weight: f64,
    /// `"candidate"` or `"fixed"`.
    #[serde(default = "default_lexical_mode")]
    pub lexical_mode: String,
    #[serde(default = "default_lexical_constant")]
    pub lexical_constant: f64,
    #[serde(default = "default_half_life")]
    pub recency_half_life_days: f64,
    #[serde(default = "default_mmr_lambda")]
    pub mmr_lambda: f64,
    /// `"document"` or `"embedding"`.
    #[serde(default = "default_mmr_redundancy")]
    pub mmr_redundancy: String,
    #[serde(default = "default_redundancy_penalty")]
    pub redundancy_penalty: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            shortlist_size: default_shortlist_size(),
            final_limit: default_final_limit(),
            lexical_floor: default_lexical_floor(),
            substring_score: default_substring_score(),
            vector_weight: default_vector_weight(),
            lexical_weight: default_lexical_weight(),
            recency_weight: default_recency_weight(),
            lexical_mode: default_lexical_mode(),
            lexical_constant: default_lexical_constant(),
            recency_half_life_days: default_half_life(),
            mmr_lambda: default_mmr_lambda(),
            mmr_redundancy: default_mmr_redundancy(),
            redundancy_penalty: default_redundancy_penalty(),
        }
    }
}

fn default_shortlist_size() -> usize {
    100
}
fn default_final_limit() -> usize {
    12
}
fn default_lexical_floor() -> f64 {
    0.1
}
fn default_substring_score() -> f64 {
    0.8
}
fn default_vector_weight() -> f64 {
    0.6
}
fn default_lexical_weight() -> f64 {
    0.3
}
fn default_recency_weight() -> f64 {
    0.1
}
fn default_lexical_mode() -> String {
    "candidate".to_string()
}
fn default_lexical_constant() -> f64 {
    0.3
}
fn default_half_life() -> f64 {
    30.0
}
fn default_mmr_lambda() -> f64 {
    0.5
}
fn default_mmr_redundancy() -> String {
    "document".to_string()
}
fn default_redundancy_penalty() -> f64 {
    0.9
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `"openai"` or `"disabled"`.
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_embedding_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
    /// Inputs longer than this are cut before being sent.
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
    /// Query embedding cache lifetime; `0` disables the cache.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            model: default_embedding_model(),
            dims: default_dims(),
            batch_size: default_batch_size(),
            max_retries: default_embedding_retries(),
            timeout_secs: default_embedding_timeout(),
            max_input_chars: default_max_input_chars(),
            cache_ttl_secs: default_cache_ttl(),
            cache_capacity: default_cache_capacity(),
            api_base: default_api_base(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_disabled() -> String {
    "disabled".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_dims() -> usize {
    1536
}
fn default_batch_size() -> usize {
    64
}
fn default_embedding_retries() -> u32 {
    5
}
fn default_embedding_timeout() -> u64 {
    30
}
fn default_max_input_chars() -> usize {
    8000
}
fn default_cache_ttl() -> u64 {
    86_400
}
fn default_cache_capacity() -> usize {
    10_000
}
fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    /// `"openai"` or `"disabled"`.
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Run the self-check pass unless a request says otherwise.
    #[serde(default = "default_self_check")]
    pub self_check: bool,
    #[serde(default = "default_self_check_max_tokens")]
    pub self_check_max_tokens: u32,
    /// Soften assertive wording when the self-check flags unsupported claims.
    #[serde(default = "default_hedge_answers")]
    pub hedge_answers: bool,
    #[serde(default = "default_excerpt_chars")]
    pub excerpt_chars: usize,
    #[serde(default = "default_generation_retries")]
    pub max_retries: u32,
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            model: default_generation_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            self_check: default_self_check(),
            self_check_max_tokens: default_self_check_max_tokens(),
            hedge_answers: default_hedge_answers(),
            excerpt_chars: default_excerpt_chars(),
            max_retries: default_generation_retries(),
            timeout_secs: default_generation_timeout(),
            api_base: default_api_base(),
        }
    }
}

impl GenerationConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_generation_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_max_tokens() -> u32 {
    300
}
fn default_self_check() -> bool {
    true
}
fn default_hedge_answers() -> bool {
    true
}
fn default_self_check_max_tokens() -> u32 {
    100
}
fn default_excerpt_chars() -> usize {
    500
}
fn default_generation_retries() -> u32 {
    3
}
fn default_generation_timeout() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7331".to_string()
}

impl Config {
    /// Stage parameters for [`groundwork_core::Pipeline`].
    ///
    /// Assumes the config went through [`validate`](Self::validate); unknown
    /// mode names fall back to the defaults.
    pub fn pipeline_settings(&self) -> PipelineSettings {
        let r = &self.retrieval;
        let g = &self.generation;

        let lexical = match r.lexical_mode.as_str() {
            "fixed" => LexicalWeighting::Fixed(r.lexical_constant),
            _ => LexicalWeighting::Candidate,
        };
        let redundancy = match r.mmr_redundancy.as_str() {
            "embedding" => Redundancy::EmbeddingSimilarity,
            _ => Redundancy::SameDocument {
                penalty: r.redundancy_penalty,
            },
        };

        PipelineSettings {
            shortlist: ShortlistParams {
                size: r.shortlist_size,
                floor: r.lexical_floor,
                substring_score: r.substring_score,
            },
            rerank: RerankParams {
                vector_weight: r.vector_weight,
                lexical_weight: r.lexical_weight,
                recency_weight: r.recency_weight,
                lexical,
                half_life_days: r.recency_half_life_days,
            },
            mmr: MmrParams {
                lambda: r.mmr_lambda,
                redundancy,
            },
            synthesis: SynthesisParams {
                excerpt_chars: g.excerpt_chars,
                answer: GenerationOptions {
                    temperature: g.temperature,
                    max_tokens: g.max_tokens,
                },
                self_check: GenerationOptions {
                    temperature: 0.0,
                    max_tokens: g.self_check_max_tokens,
                },
            },
        }
    }

    pub fn validate(&self) -> Result<()> {
        let r = &self.retrieval;

        if r.final_limit < 1 {
            bail!("retrieval.final_limit must be >= 1");
        }
        if r.shortlist_size < 1 {
            bail!("retrieval.shortlist_size must be >= 1");
        }
        for (name, w) in [
            ("vector_weight", r.vector_weight),
            ("lexical_weight", r.lexical_weight),
            ("recency_weight", r.recency_weight),
        ] {
            if !(0.0..=1.0).contains(&w) {
                bail!("retrieval.{} must be in [0.0, 1.0]", name);
            }
        }
        let sum = r.vector_weight + r.lexical_weight + r.recency_weight;
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            bail!(
                "retrieval weights must sum to 1.0 (vector + lexical + recency = {})",
                sum
            );
        }
        if !(0.0..=1.0).contains(&r.mmr_lambda) {
            bail!("retrieval.mmr_lambda must be in [0.0, 1.0]");
        }
        if r.recency_half_life_days <= 0.0 {
            bail!("retrieval.recency_half_life_days must be > 0");
        }
        for (name, v) in [
            ("lexical_floor", r.lexical_floor),
            ("lexical_constant", r.lexical_constant),
            ("redundancy_penalty", r.redundancy_penalty),
        ] {
            if !(0.0..=1.0).contains(&v) {
                bail!("retrieval.{} must be in [0.0, 1.0]", name);
            }
        }
        match r.lexical_mode.as_str() {
            "candidate" | "fixed" => {}
            other => bail!(
                "Unknown retrieval.lexical_mode: '{}'. Must be candidate or fixed.",
                other
            ),
        }
        match r.mmr_redundancy.as_str() {
            "document" | "embedding" => {}
            other => bail!(
                "Unknown retrieval.mmr_redundancy: '{}'. Must be document or embedding.",
                other
            ),
        }

        let e = &self.embedding;
        match e.provider.as_str() {
            "disabled" | "openai" => {}
            other => bail!(
                "Unknown embedding provider: '{}'. Must be disabled or openai.",
                other
            ),
        }
        if e.is_enabled() {
            if e.model.trim().is_empty() {
                bail!(
                    "embedding.model must be specified when provider is '{}'",
                    e.provider
                );
            }
            if e.dims == 0 {
                bail!("embedding.dims must be > 0 when provider is '{}'", e.provider);
            }
        }
        if e.batch_size == 0 {
            bail!("embedding.batch_size must be > 0");
        }

        let g = &self.generation;
        match g.provider.as_str() {
            "disabled" | "openai" => {}
            other => bail!(
                "Unknown generation provider: '{}'. Must be disabled or openai.",
                other
            ),
        }
        if g.is_enabled() && g.model.trim().is_empty() {
            bail!(
                "generation.model must be specified when provider is '{}'",
                g.provider
            );
        }

        Ok(())
    }
}

/// Read, parse and validate the configuration file at `path`.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}
