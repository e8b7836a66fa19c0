//! Retrieval and answer entry points.
//!
//! A [`Pipeline`] bundles the collaborators (storage, permissions,
//! embeddings, generation) with tuning parameters. The host process builds
//! one at start-up and shares it across requests; queries hold no mutable
//! state and may run concurrently.
//!
//! ```text
//! (query, principal)
//!   → PermissionResolver   visible document ids        (empty ⇒ [])
//!   → lexical::shortlist   ≤ N candidates              (empty ⇒ [])
//!   → EmbeddingProvider    query vector
//!   → rerank::rerank       vector + lexical + recency
//!   → diversity::select    MMR top-K
//!   → answer::synthesize   grounded answer + sources
//! ```
//!
//! Stages run strictly in sequence. An empty permitted set or shortlist
//! short-circuits before any embedding or generation call.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::answer::{self, Generator, Hedger, RegexHedger, SynthesisParams};
use crate::diversity::{self, MmrParams};
use crate::embedding::EmbeddingProvider;
use crate::error::{Error, Result, Stage, StageContext};
use crate::lexical::{self, ShortlistParams};
use crate::models::{Answer, GroundingChunk, Principal, RankedChunk};
use crate::permissions::PermissionResolver;
use crate::rerank::{self, RerankParams};
use crate::store::Store;

/// Answer returned by [`Pipeline::ask`] when nothing relevant is visible.
pub const NO_RESULTS_ANSWER: &str = "No relevant information found for your question.";

/// Tuning for every stage of the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub shortlist: ShortlistParams,
    pub rerank: RerankParams,
    pub mmr: MmrParams,
    pub synthesis: SynthesisParams,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            shortlist: ShortlistParams::default(),
            rerank: RerankParams::default(),
            mmr: MmrParams::default(),
            synthesis: SynthesisParams::default(),
        }
    }
}

impl PipelineSettings {
    pub fn validate(&self) -> Result<()> {
        self.rerank.validate()?;
        if !(0.0..=1.0).contains(&self.mmr.lambda) {
            return Err(Error::Configuration(
                "MMR lambda must be in [0.0, 1.0]".to_string(),
            ));
        }
        if self.shortlist.size == 0 {
            return Err(Error::Configuration(
                "shortlist size must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// The retrieval and synthesis pipeline with its collaborators.
pub struct Pipeline {
    store: Arc<dyn Store>,
    permissions: Arc<dyn PermissionResolver>,
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn Generator>,
    hedger: Arc<dyn Hedger>,
    settings: PipelineSettings,
}

impl Pipeline {
    /// Assemble a pipeline, rejecting invalid settings.
    ///
    /// The default hedger is [`RegexHedger`]; see [`with_hedger`](Self::with_hedger).
    pub fn new(
        store: Arc<dyn Store>,
        permissions: Arc<dyn PermissionResolver>,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn Generator>,
        settings: PipelineSettings,
    ) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            store,
            permissions,
            embedder,
            generator,
            hedger: Arc::new(RegexHedger::default()),
            settings,
        })
    }

    /// Replace the hedger applied when the self-check flags an answer.
    pub fn with_hedger(mut self, hedger: Arc<dyn Hedger>) -> Self {
        self.hedger = hedger;
        self
    }

    /// Retrieve up to `limit` ranked chunks visible to `principal`.
    pub async fn retrieve(
        &self,
        query: &str,
        principal: &Principal,
        limit: usize,
    ) -> Result<Vec<RankedChunk>> {
        self.retrieve_at(query, principal, limit, Utc::now()).await
    }

    /// [`retrieve`](Self::retrieve) with an explicit clock for recency scoring.
    pub async fn retrieve_at(
        &self,
        query: &str,
        principal: &Principal,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<RankedChunk>> {
        let permitted = self
            .permissions
            .permitted_document_ids(principal)
            .await
            .stage(Stage::Permissions)?;
        debug!(permitted = permitted.len(), "resolved permissions");
        if permitted.is_empty() {
            return Ok(Vec::new());
        }

        let shortlist =
            lexical::shortlist(self.store.as_ref(), query, &permitted, &self.settings.shortlist)
                .await?;
        if shortlist.is_empty() {
            return Ok(Vec::new());
        }

        let query_vec = self.embedder.embed(query).await.stage(Stage::Embedding)?;
        rerank::check_dimensions(&query_vec, &shortlist)?;

        let reranked = rerank::rerank(shortlist, &query_vec, &self.settings.rerank, now);
        let selected = diversity::select(reranked, limit, &self.settings.mmr);
        debug!(selected = selected.len(), limit, "retrieval complete");
        Ok(selected)
    }

    /// Write a grounded answer to `question` from `grounding`.
    pub async fn answer(
        &self,
        question: &str,
        grounding: &[GroundingChunk],
        self_check: bool,
    ) -> Result<Answer> {
        answer::synthesize(
            self.generator.as_ref(),
            self.hedger.as_ref(),
            question,
            grounding,
            self_check,
            &self.settings.synthesis,
        )
        .await
    }

    /// Retrieve, then answer from the retrieved chunks.
    ///
    /// Returns [`NO_RESULTS_ANSWER`] without calling the generator when
    /// nothing is retrieved.
    pub async fn ask(
        &self,
        question: &str,
        principal: &Principal,
        limit: usize,
        self_check: bool,
    ) -> Result<Answer> {
        let chunks = self.retrieve(question, principal, limit).await?;
        if chunks.is_empty() {
            return Ok(Answer {
                answer_text: NO_RESULTS_ANSWER.to_string(),
                sources: Vec::new(),
            });
        }
        let grounding: Vec<GroundingChunk> = chunks.iter().map(GroundingChunk::from).collect();
        self.answer(question, &grounding, self_check).await
    }
}
