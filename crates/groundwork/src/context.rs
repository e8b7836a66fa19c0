//! Process-wide pipeline construction.
//!
//! The host builds one [`AppContext`] at start-up: providers first (so
//! missing credentials fail before any network I/O), then the single
//! Postgres pool, then the [`Pipeline`]. Request handlers share the
//! context; [`AppContext::close`] releases the pool on shutdown.

use anyhow::Result;
use sqlx::PgPool;
use std::sync::Arc;

use groundwork_core::answer::{Generator, NoopHedger};
use groundwork_core::embedding::EmbeddingProvider;
use groundwork_core::permissions::PermissionResolver;
use groundwork_core::store::Store;
use groundwork_core::Pipeline;

use crate::config::Config;
use crate::db;
use crate::embedding::create_embedder;
use crate::generation::create_generator;
use crate::pg_store::PgStore;

/// The external model clients a pipeline talks to.
pub struct Providers {
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub generator: Arc<dyn Generator>,
}

impl Providers {
    /// Build both providers from config.
    ///
    /// # Errors
    ///
    /// A configuration error when a provider is `openai` and
    /// `OPENAI_API_KEY` is not set.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            embedder: create_embedder(&config.embedding)?,
            generator: create_generator(&config.generation)?,
        })
    }
}

/// Assemble a [`Pipeline`] over `store` with the configured settings.
///
/// With `generation.hedge_answers = false` a flagged answer is returned
/// as generated.
pub fn build_pipeline<S>(config: &Config, store: Arc<S>, providers: Providers) -> Result<Pipeline>
where
    S: Store + PermissionResolver + 'static,
{
    let mut pipeline = Pipeline::new(
        store.clone(),
        store,
        providers.embedder,
        providers.generator,
        config.pipeline_settings(),
    )?;
    if !config.generation.hedge_answers {
        pipeline = pipeline.with_hedger(Arc::new(NoopHedger));
    }
    Ok(pipeline)
}

/// Everything a running process needs to serve queries.
pub struct AppContext {
    pub config: Config,
    pub pool: PgPool,
    pub pipeline: Arc<Pipeline>,
}

impl AppContext {
    pub async fn connect(config: &Config) -> Result<Self> {
        let providers = Providers::from_config(config)?;
        let pool = db::connect(config).await?;
        let store = Arc::new(PgStore::new(pool.clone()));
        let pipeline = build_pipeline(config, store, providers)?;
        Ok(Self {
            config: config.clone(),
            pool,
            pipeline: Arc::new(pipeline),
        })
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use groundwork_core::answer::GenerationOptions;
    use groundwork_core::models::Principal;
    use groundwork_core::store::memory::InMemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::load::{load_records, LoadRecord};

    struct UnitEmbedder;

    #[async_trait]
    impl EmbeddingProvider for UnitEmbedder {
        fn model_name(&self) -> &str {
            "unit"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }
    }

    /// Answers first, then flags every later (self-check) call.
    struct FlaggingGenerator {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Generator for FlaggingGenerator {
        async fn complete(&self, _s: &str, _u: &str, _o: &GenerationOptions) -> Result<String> {
            match self.calls.fetch_add(1, Ordering::SeqCst) {
                0 => Ok("Reconciliation is likely manual [1].".to_string()),
                1 => Ok("The claim that it is manual lacks support.".to_string()),
                _ => Err(anyhow!("unexpected call")),
            }
        }
    }

    async fn ask_with(config: &Config) -> String {
        let store = Arc::new(InMemoryStore::new());
        let records: Vec<LoadRecord> = serde_json::from_str(
            r##"[{
              "source": {"kind": "slack", "external_id": "C1", "name": "#sales"},
              "document": {
                "external_id": "m1",
                "title": "Commission sync",
                "url": "https://example.com/m1",
                "updated_at": "2024-05-01T12:00:00Z",
                "body": "Commission reconciliation is manual today."
              },
              "permissions": [{"principal_type": "team", "principal_id": "T1"}]
            }]"##,
        )
        .unwrap();
        load_records(store.as_ref(), &UnitEmbedder, &records)
            .await
            .unwrap();

        let providers = Providers {
            embedder: Arc::new(UnitEmbedder),
            generator: Arc::new(FlaggingGenerator {
                calls: AtomicUsize::new(0),
            }),
        };
        let pipeline = build_pipeline(config, store, providers).unwrap();
        pipeline
            .ask(
                "commission reconciliation",
                &Principal::new("T1", "U1"),
                12,
                true,
            )
            .await
            .unwrap()
            .answer_text
    }

    #[tokio::test]
    async fn test_flagged_answer_is_hedged_by_default() {
        let answer = ask_with(&Config::default()).await;
        assert_eq!(answer, "Reconciliation is may manual [1].");
    }

    #[tokio::test]
    async fn test_hedging_can_be_disabled() {
        let mut config = Config::default();
        config.generation.hedge_answers = false;
        let answer = ask_with(&config).await;
        assert_eq!(answer, "Reconciliation is likely manual [1].");
    }
}
