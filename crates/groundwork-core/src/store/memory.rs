//! In-memory [`Store`] and [`PermissionResolver`] for tests and embedding.
//!
//! Uses `HashMap` and `Vec` behind `std::sync::RwLock` for thread safety.
//! Lexical candidates are found by brute force: trigram similarity against
//! every permitted document plus a case-insensitive substring scan of its
//! chunks.

use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::lexical::{contains_ignore_case, lexical_score, trigram_similarity};
use crate::models::{
    Chunk, DataSource, Document, Grant, LexicalSignals, Permission, Principal,
    RetrievalCandidate,
};
use crate::permissions::PermissionResolver;

use super::{LexicalQuery, Store};

/// In-memory store for tests and single-process deployments.
pub struct InMemoryStore {
    sources: RwLock<HashMap<String, DataSource>>,
    docs: RwLock<HashMap<String, Document>>,
    chunks: RwLock<Vec<Chunk>>,
    permissions: RwLock<Vec<Permission>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            sources: RwLock::new(HashMap::new()),
            docs: RwLock::new(HashMap::new()),
            chunks: RwLock::new(Vec::new()),
            permissions: RwLock::new(Vec::new()),
        }
    }

    /// Number of stored chunks.
    pub fn chunk_count(&self) -> usize {
        self.chunks.read().map(|c| c.len()).unwrap_or(0)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

#[async_trait]
impl Store for InMemoryStore {
    async fn upsert_data_source(&self, source: &DataSource) -> Result<String> {
        let mut sources = write(&self.sources)?;
        let existing = sources
            .values()
            .find(|s| s.kind == source.kind && s.external_id == source.external_id)
            .map(|s| s.id.clone());
        let id = existing.unwrap_or_else(|| source.id.clone());
        sources.insert(
            id.clone(),
            DataSource {
                id: id.clone(),
                ..source.clone()
            },
        );
        Ok(id)
    }

    async fn upsert_document(&self, doc: &Document) -> Result<String> {
        let mut docs = write(&self.docs)?;
        let existing = docs
            .values()
            .find(|d| d.source_id == doc.source_id && d.external_id == doc.external_id)
            .map(|d| d.id.clone());
        let id = existing.unwrap_or_else(|| doc.id.clone());
        docs.insert(
            id.clone(),
            Document {
                id: id.clone(),
                ..doc.clone()
            },
        );
        Ok(id)
    }

    async fn replace_chunks(&self, doc_id: &str, chunks: &[Chunk]) -> Result<()> {
        let mut ordinals = HashSet::new();
        for c in chunks {
            if !ordinals.insert(c.ordinal) {
                return Err(anyhow!(
                    "duplicate chunk ordinal {} for document {}",
                    c.ordinal,
                    doc_id
                ));
            }
        }
        let mut stored = write(&self.chunks)?;
        stored.retain(|c| c.document_id != doc_id);
        for c in chunks {
            stored.push(Chunk {
                document_id: doc_id.to_string(),
                ..c.clone()
            });
        }
        Ok(())
    }

    async fn set_document_permissions(&self, doc_id: &str, grants: &[Grant]) -> Result<()> {
        let mut perms = write(&self.permissions)?;
        perms.retain(|p| p.document_id != doc_id);
        for g in grants {
            perms.push(Permission {
                document_id: doc_id.to_string(),
                principal_type: g.principal_type,
                principal_id: g.principal_id.clone(),
            });
        }
        Ok(())
    }

    async fn query_lexical_candidates(
        &self,
        query: &LexicalQuery<'_>,
    ) -> Result<Vec<RetrievalCandidate>> {
        let permitted: HashSet<&str> = query.permitted_ids.iter().map(String::as_str).collect();
        let docs = read(&self.docs)?;
        let chunks = read(&self.chunks)?;

        let mut doc_similarity: HashMap<&str, f64> = HashMap::new();
        let mut out = Vec::new();

        for chunk in chunks.iter() {
            if !permitted.contains(chunk.document_id.as_str()) {
                continue;
            }
            let Some(doc) = docs.get(&chunk.document_id) else {
                continue;
            };
            let similarity = *doc_similarity
                .entry(doc.id.as_str())
                .or_insert_with(|| trigram_similarity(query.text, &doc.searchable));
            let signals = LexicalSignals {
                doc_similarity: similarity,
                substring_match: contains_ignore_case(&chunk.text, query.text),
            };
            if !(signals.doc_similarity > query.floor || signals.substring_match) {
                continue;
            }
            out.push(RetrievalCandidate {
                chunk_id: chunk.id.clone(),
                document_id: doc.id.clone(),
                ordinal: chunk.ordinal,
                text: chunk.text.clone(),
                embedding: chunk.embedding.clone(),
                title: doc.title.clone(),
                url: doc.url.clone(),
                author: doc.author.clone(),
                updated_at: doc.updated_at,
                signals,
                lex_score: 0.0,
                vector_score: 0.0,
                final_score: 0.0,
            });
        }

        out.sort_by(|a, b| {
            let sa = lexical_score(&a.signals, query.substring_score);
            let sb = lexical_score(&b.signals, query.substring_score);
            sb.partial_cmp(&sa)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        out.truncate(query.limit);
        Ok(out)
    }
}

#[async_trait]
impl PermissionResolver for InMemoryStore {
    async fn permitted_document_ids(&self, principal: &Principal) -> Result<Vec<String>> {
        let perms = read(&self.permissions)?;
        let mut seen = HashSet::new();
        let mut ids = Vec::new();
        for p in perms.iter().filter(|p| p.matches(principal)) {
            if seen.insert(p.document_id.as_str()) {
                ids.push(p.document_id.clone());
            }
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PrincipalType;
    use chrono::Utc;

    fn doc(id: &str, external_id: &str, searchable: &str) -> Document {
        Document {
            id: id.to_string(),
            source_id: "s1".to_string(),
            external_id: external_id.to_string(),
            title: format!("Title {}", id),
            url: format!("https://example.com/{}", id),
            author: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            searchable: searchable.to_string(),
        }
    }

    fn chunk(id: &str, doc_id: &str, ordinal: i32, text: &str) -> Chunk {
        Chunk {
            id: id.to_string(),
            document_id: doc_id.to_string(),
            ordinal,
            text: text.to_string(),
            embedding: vec![1.0, 0.0],
            metadata: serde_json::json!({}),
        }
    }

    fn query<'a>(text: &'a str, permitted: &'a [String]) -> LexicalQuery<'a> {
        LexicalQuery {
            text,
            permitted_ids: permitted,
            limit: 100,
            floor: 0.1,
            substring_score: 0.8,
        }
    }

    #[tokio::test]
    async fn test_upsert_document_keeps_natural_key_id() {
        let store = InMemoryStore::new();
        let first = store.upsert_document(&doc("d1", "ext-1", "a")).await.unwrap();
        let second = store.upsert_document(&doc("d2", "ext-1", "b")).await.unwrap();
        assert_eq!(first, "d1");
        assert_eq!(second, "d1");
    }

    #[tokio::test]
    async fn test_replace_chunks_rejects_duplicate_ordinals() {
        let store = InMemoryStore::new();
        let err = store
            .replace_chunks("d1", &[chunk("c1", "d1", 0, "a"), chunk("c2", "d1", 0, "b")])
            .await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn test_lexical_respects_permitted_set() {
        let store = InMemoryStore::new();
        store.upsert_document(&doc("d1", "e1", "alpha")).await.unwrap();
        store.upsert_document(&doc("d2", "e2", "alpha")).await.unwrap();
        store
            .replace_chunks("d1", &[chunk("c1", "d1", 0, "alpha beta")])
            .await
            .unwrap();
        store
            .replace_chunks("d2", &[chunk("c2", "d2", 0, "alpha beta")])
            .await
            .unwrap();

        let permitted = vec!["d2".to_string()];
        let hits = store
            .query_lexical_candidates(&query("alpha", &permitted))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, "c2");
    }

    #[tokio::test]
    async fn test_substring_match_survives_low_similarity() {
        let store = InMemoryStore::new();
        store
            .upsert_document(&doc("d1", "e1", "zzz unrelated searchable text"))
            .await
            .unwrap();
        store
            .replace_chunks("d1", &[chunk("c1", "d1", 0, "We said Commission Reconciliation Is Manual.")])
            .await
            .unwrap();
        let permitted = vec!["d1".to_string()];
        let hits = store
            .query_lexical_candidates(&query("commission reconciliation is manual", &permitted))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].signals.substring_match);
    }

    #[tokio::test]
    async fn test_permissions_wildcard_and_distinct() {
        let store = InMemoryStore::new();
        store
            .set_document_permissions(
                "d1",
                &[
                    Grant {
                        principal_type: PrincipalType::Team,
                        principal_id: "*".to_string(),
                    },
                    Grant {
                        principal_type: PrincipalType::User,
                        principal_id: "U1".to_string(),
                    },
                ],
            )
            .await
            .unwrap();
        store
            .set_document_permissions(
                "d2",
                &[Grant {
                    principal_type: PrincipalType::Channel,
                    principal_id: "C1".to_string(),
                }],
            )
            .await
            .unwrap();

        let ids = store
            .permitted_document_ids(&Principal::new("T1", "U1"))
            .await
            .unwrap();
        assert_eq!(ids, vec!["d1".to_string()]);

        let mut ids = store
            .permitted_document_ids(&Principal::new("T1", "U2").with_channel("C1"))
            .await
            .unwrap();
        ids.sort();
        assert_eq!(ids, vec!["d1".to_string(), "d2".to_string()]);
    }

    #[tokio::test]
    async fn test_set_permissions_replaces() {
        let store = InMemoryStore::new();
        let grant = |id: &str| Grant {
            principal_type: PrincipalType::User,
            principal_id: id.to_string(),
        };
        store.set_document_permissions("d1", &[grant("U1")]).await.unwrap();
        store.set_document_permissions("d1", &[grant("U2")]).await.unwrap();
        let ids = store
            .permitted_document_ids(&Principal::new("T1", "U1"))
            .await
            .unwrap();
        assert!(ids.is_empty());
    }
}
