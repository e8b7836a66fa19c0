//! JSON document loader (`gw load`).
//!
//! Reads a JSON array of records:
//!
//! ```json
//! [
//!   {
//!     "source": { "kind": "slack", "external_id": "C123", "name": "#sales" },
//!     "document": {
//!       "external_id": "1700000000.000100",
//!       "title": "Commission sync",
//!       "url": "https://example.slack.com/archives/C123/p1700000000000100",
//!       "updated_at": "2024-05-01T12:00:00Z",
//!       "body": "Commission reconciliation is manual today."
//!     },
//!     "permissions": [ { "principal_type": "team", "principal_id": "T1" } ]
//!   }
//! ]
//! ```
//!
//! Each body is split with [`chunk_text`], embedded with one
//! [`embed_batch`](EmbeddingProvider::embed_batch) call per document, and
//! written through the [`Store`] trait. Re-loading a record replaces its
//! chunks and permissions.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::Path;
use tracing::info;
use uuid::Uuid;

use groundwork_core::chunk::chunk_text;
use groundwork_core::embedding::EmbeddingProvider;
use groundwork_core::models::{DataSource, Document, Grant};
use groundwork_core::store::Store;

use crate::config::Config;
use crate::db;
use crate::embedding::create_embedder;
use crate::pg_store::PgStore;

/// Chunk size used at load time, in estimated tokens.
pub const CHUNK_MAX_TOKENS: usize = 700;

#[derive(Debug, Clone, Deserialize)]
pub struct LoadRecord {
    pub source: SourceRecord,
    pub document: DocumentRecord,
    #[serde(default)]
    pub permissions: Vec<Grant>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceRecord {
    pub kind: String,
    pub external_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentRecord {
    pub external_id: String,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub author: Option<String>,
    /// Defaults to `updated_at`.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub body: String,
    /// Text for document-level fuzzy matching. Defaults to title + body.
    #[serde(default)]
    pub searchable: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub documents: usize,
    pub chunks: usize,
}

pub fn read_records(path: &Path) -> Result<Vec<LoadRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read load file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse load file: {}", path.display()))
}

/// Write `records` to `store`, embedding every chunk with `embedder`.
pub async fn load_records(
    store: &dyn Store,
    embedder: &dyn EmbeddingProvider,
    records: &[LoadRecord],
) -> Result<LoadStats> {
    let mut stats = LoadStats::default();

    for record in records {
        let source_id = store
            .upsert_data_source(&DataSource {
                id: Uuid::new_v4().to_string(),
                kind: record.source.kind.clone(),
                external_id: record.source.external_id.clone(),
                name: record.source.name.clone(),
            })
            .await?;

        let doc = &record.document;
        let searchable = doc
            .searchable
            .clone()
            .unwrap_or_else(|| format!("{}\n\n{}", doc.title, doc.body));
        let doc_id = store
            .upsert_document(&Document {
                id: Uuid::new_v4().to_string(),
                source_id,
                external_id: doc.external_id.clone(),
                title: doc.title.clone(),
                url: doc.url.clone(),
                author: doc.author.clone(),
                created_at: doc.created_at.unwrap_or(doc.updated_at),
                updated_at: doc.updated_at,
                searchable,
            })
            .await?;

        let mut chunks = if doc.body.trim().is_empty() {
            Vec::new()
        } else {
            chunk_text(&doc_id, &doc.body, CHUNK_MAX_TOKENS)
        };
        if !chunks.is_empty() {
            let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
            let vectors = embedder
                .embed_batch(&texts)
                .await
                .with_context(|| format!("Failed to embed document {}", doc.external_id))?;
            if vectors.len() != chunks.len() {
                bail!(
                    "embedding provider returned {} vectors for {} chunks",
                    vectors.len(),
                    chunks.len()
                );
            }
            for (chunk, vector) in chunks.iter_mut().zip(vectors) {
                chunk.embedding = vector;
            }
        }

        store.replace_chunks(&doc_id, &chunks).await?;
        store
            .set_document_permissions(&doc_id, &record.permissions)
            .await?;

        stats.documents += 1;
        stats.chunks += chunks.len();
    }

    Ok(stats)
}

/// CLI entry point for `gw load <file>`.
pub async fn run_load(config: &Config, path: &Path) -> Result<()> {
    let records = read_records(path)?;
    let embedder = create_embedder(&config.embedding)?;
    let pool = db::connect(config).await?;
    let store = PgStore::new(pool.clone());

    let stats = load_records(&store, embedder.as_ref(), &records).await;
    pool.close().await;
    let stats = stats?;

    info!(documents = stats.documents, chunks = stats.chunks, "load complete");
    println!(
        "Loaded {} documents ({} chunks).",
        stats.documents, stats.chunks
    );
    Ok(())
}
