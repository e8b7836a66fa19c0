//! Storage abstraction for Groundwork.
//!
//! The [`Store`] trait defines the storage operations the retrieval
//! pipeline and the loader need, enabling pluggable backends (Postgres,
//! in-memory). The pipeline only ever calls
//! [`query_lexical_candidates`](Store::query_lexical_candidates); connection
//! strings and pooling are the backend's business.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Chunk, DataSource, Document, Grant, RetrievalCandidate};

/// Parameters of one lexical candidate query.
///
/// Backends return chunks of permitted documents whose document-level
/// similarity exceeds `floor` or whose text contains `text`
/// case-insensitively, ordered by
/// `max(doc_similarity, substring_score if matched)` descending (chunk id
/// ascending for ties), at most `limit` rows.
#[derive(Debug, Clone)]
pub struct LexicalQuery<'a> {
    pub text: &'a str,
    pub permitted_ids: &'a [String],
    pub limit: usize,
    pub floor: f64,
    pub substring_score: f64,
}

/// Abstract storage backend for Groundwork.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert_data_source`](Store::upsert_data_source) | Insert or update an ingestion origin |
/// | [`upsert_document`](Store::upsert_document) | Insert or update a document by natural key |
/// | [`replace_chunks`](Store::replace_chunks) | Replace all chunks (with embeddings) of a document |
/// | [`set_document_permissions`](Store::set_document_permissions) | Replace a document's grants |
/// | [`query_lexical_candidates`](Store::query_lexical_candidates) | Permission-filtered lexical candidates |
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert or update a data source keyed by `(kind, external_id)`.
    ///
    /// Returns the stored id (existing or the one supplied).
    async fn upsert_data_source(&self, source: &DataSource) -> Result<String>;

    /// Insert or update a document keyed by `(source_id, external_id)`.
    ///
    /// Returns the stored id (existing or the one supplied).
    async fn upsert_document(&self, doc: &Document) -> Result<String>;

    /// Replace all chunks for a document.
    async fn replace_chunks(&self, doc_id: &str, chunks: &[Chunk]) -> Result<()>;

    /// Replace all permission rows for a document.
    async fn set_document_permissions(&self, doc_id: &str, grants: &[Grant]) -> Result<()>;

    /// Fetch lexical candidates from the permitted corpus.
    ///
    /// Returned candidates carry [`LexicalSignals`](crate::models::LexicalSignals);
    /// scores are left at zero for the pipeline to fill.
    async fn query_lexical_candidates(
        &self,
        query: &LexicalQuery<'_>,
    ) -> Result<Vec<RetrievalCandidate>>;
}
