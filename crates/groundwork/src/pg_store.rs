//! Postgres-backed [`Store`] and [`PermissionResolver`].
//!
//! Fuzzy matching uses `pg_trgm`'s `similarity()` over `documents.searchable`
//! and `ILIKE` over chunk text. Embeddings are stored in a pgvector
//! `vector` column: written from a bound `real[]` and read back as
//! `real[]`. Every user- or data-derived value is a bound parameter.

use std::collections::HashSet;

use anyhow::{bail, Result};
use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{PgPool, Row};

use groundwork_core::models::{
    Chunk, DataSource, Document, Grant, LexicalSignals, Principal, RetrievalCandidate,
};
use groundwork_core::permissions::PermissionResolver;
use groundwork_core::store::{LexicalQuery, Store};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Escape `LIKE` metacharacters so `text` matches literally under `ESCAPE '\'`.
pub fn escape_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[async_trait]
impl Store for PgStore {
    async fn upsert_data_source(&self, source: &DataSource) -> Result<String> {
        let id: String = sqlx::query_scalar(
            r#"
            INSERT INTO data_sources (id, kind, external_id, name)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (kind, external_id) DO UPDATE SET name = EXCLUDED.name
            RETURNING id
            "#,
        )
        .bind(&source.id)
        .bind(&source.kind)
        .bind(&source.external_id)
        .bind(&source.name)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn upsert_document(&self, doc: &Document) -> Result<String> {
        let id: String = sqlx::query_scalar(
            r#"
            INSERT INTO documents (id, source_id, external_id, title, url, author,
                                   created_at, updated_at, searchable)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (source_id, external_id) DO UPDATE SET
                title = EXCLUDED.title,
                url = EXCLUDED.url,
                author = EXCLUDED.author,
                updated_at = EXCLUDED.updated_at,
                searchable = EXCLUDED.searchable
            RETURNING id
            "#,
        )
        .bind(&doc.id)
        .bind(&doc.source_id)
        .bind(&doc.external_id)
        .bind(&doc.title)
        .bind(&doc.url)
        .bind(&doc.author)
        .bind(doc.created_at)
        .bind(doc.updated_at)
        .bind(&doc.searchable)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn replace_chunks(&self, doc_id: &str, chunks: &[Chunk]) -> Result<()> {
        let mut ordinals = HashSet::new();
        for c in chunks {
            if !ordinals.insert(c.ordinal) {
                bail!("duplicate chunk ordinal {} for document {}", c.ordinal, doc_id);
            }
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chunks WHERE document_id = $1")
            .bind(doc_id)
            .execute(&mut *tx)
            .await?;

        for chunk in chunks {
            sqlx::query(
                r#"
                INSERT INTO chunks (id, document_id, ordinal, text, embedding, metadata)
                VALUES ($1, $2, $3, $4, $5::real[]::vector, $6)
                "#,
            )
            .bind(&chunk.id)
            .bind(doc_id)
            .bind(chunk.ordinal)
            .bind(&chunk.text)
            .bind(chunk.embedding.as_slice())
            .bind(Json(&chunk.metadata))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn set_document_permissions(&self, doc_id: &str, grants: &[Grant]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM permissions WHERE document_id = $1")
            .bind(doc_id)
            .execute(&mut *tx)
            .await?;

        for grant in grants {
            sqlx::query(
                r#"
                INSERT INTO permissions (document_id, principal_type, principal_id)
                VALUES ($1, $2, $3)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(doc_id)
            .bind(grant.principal_type.as_str())
            .bind(&grant.principal_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn query_lexical_candidates(
        &self,
        query: &LexicalQuery<'_>,
    ) -> Result<Vec<RetrievalCandidate>> {
        let pattern = format!("%{}%", escape_like(query.text));
        let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);

        let rows = sqlx::query(
            r#"
            SELECT c.id, c.document_id, c.ordinal, c.text,
                   c.embedding::real[] AS embedding,
                   d.title, d.url, d.author, d.updated_at,
                   similarity(d.searchable, $1)::float8 AS doc_similarity,
                   (c.text ILIKE $2 ESCAPE '\') AS substring_match
            FROM chunks c
            JOIN documents d ON d.id = c.document_id
            WHERE d.id = ANY($3)
              AND (similarity(d.searchable, $1) > $4 OR c.text ILIKE $2 ESCAPE '\')
            ORDER BY GREATEST(
                        similarity(d.searchable, $1)::float8,
                        CASE WHEN c.text ILIKE $2 ESCAPE '\' THEN $5 ELSE 0 END
                     ) DESC,
                     c.id ASC
            LIMIT $6
            "#,
        )
        .bind(query.text)
        .bind(&pattern)
        .bind(query.permitted_ids)
        .bind(query.floor as f32)
        .bind(query.substring_score)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(RetrievalCandidate {
                chunk_id: row.try_get("id")?,
                document_id: row.try_get("document_id")?,
                ordinal: row.try_get("ordinal")?,
                text: row.try_get("text")?,
                embedding: row.try_get("embedding")?,
                title: row.try_get("title")?,
                url: row.try_get("url")?,
                author: row.try_get("author")?,
                updated_at: row.try_get("updated_at")?,
                signals: LexicalSignals {
                    doc_similarity: row.try_get("doc_similarity")?,
                    substring_match: row.try_get("substring_match")?,
                },
                lex_score: 0.0,
                vector_score: 0.0,
                final_score: 0.0,
            });
        }
        Ok(out)
    }
}

#[async_trait]
impl PermissionResolver for PgStore {
    async fn permitted_document_ids(&self, principal: &Principal) -> Result<Vec<String>> {
        let (types, ids): (Vec<String>, Vec<String>) = principal
            .grant_keys()
            .into_iter()
            .map(|(t, id)| (t.as_str().to_string(), id))
            .unzip();

        let rows: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT p.document_id
            FROM permissions p
            JOIN UNNEST($1::text[], $2::text[]) AS k(principal_type, principal_id)
              ON p.principal_type = k.principal_type AND p.principal_id = k.principal_id
            "#,
        )
        .bind(&types)
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like_metacharacters() {
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("snake_case"), "snake\\_case");
        assert_eq!(escape_like(r"C:\temp"), r"C:\\temp");
    }

    #[test]
    fn test_escape_like_plain_text_unchanged() {
        assert_eq!(escape_like("commission reconciliation"), "commission reconciliation");
    }
}
