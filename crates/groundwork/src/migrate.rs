//! Database schema migrations.
//!
//! Every statement is idempotent, so `gw init` can run on every deploy.
//!
//! | Table | Key |
//! |-------|-----|
//! | `data_sources` | `(kind, external_id)` |
//! | `documents` | `(source_id, external_id)`, trigram GIN index on `searchable` |
//! | `chunks` | `(document_id, ordinal)`, `embedding vector` |
//! | `permissions` | `(document_id, principal_type, principal_id)` |

use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::config::Config;
use crate::db;

const STATEMENTS: &[&str] = &[
    "CREATE EXTENSION IF NOT EXISTS pg_trgm",
    "CREATE EXTENSION IF NOT EXISTS vector",
    r#"
    CREATE TABLE IF NOT EXISTS data_sources (
        id TEXT PRIMARY KEY,
        kind TEXT NOT NULL,
        external_id TEXT NOT NULL,
        name TEXT NOT NULL,
        UNIQUE(kind, external_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS documents (
        id TEXT PRIMARY KEY,
        source_id TEXT NOT NULL REFERENCES data_sources(id) ON DELETE CASCADE,
        external_id TEXT NOT NULL,
        title TEXT NOT NULL,
        url TEXT NOT NULL,
        author TEXT,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL,
        searchable TEXT NOT NULL DEFAULT '',
        UNIQUE(source_id, external_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS chunks (
        id TEXT PRIMARY KEY,
        document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
        ordinal INTEGER NOT NULL,
        text TEXT NOT NULL,
        embedding vector NOT NULL,
        metadata JSONB NOT NULL DEFAULT '{}',
        UNIQUE(document_id, ordinal)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS permissions (
        document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
        principal_type TEXT NOT NULL CHECK (principal_type IN ('team', 'user', 'channel')),
        principal_id TEXT NOT NULL,
        PRIMARY KEY (document_id, principal_type, principal_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_documents_searchable_trgm ON documents USING GIN (searchable gin_trgm_ops)",
    "CREATE INDEX IF NOT EXISTS idx_chunks_document_id ON chunks(document_id)",
    "CREATE INDEX IF NOT EXISTS idx_permissions_principal ON permissions(principal_type, principal_id)",
];

/// Apply the schema on an existing pool.
pub async fn apply(pool: &PgPool) -> Result<()> {
    for statement in STATEMENTS {
        sqlx::query(statement)
            .execute(pool)
            .await
            .with_context(|| format!("migration failed: {}", statement.trim()))?;
    }
    Ok(())
}

/// Connect, apply the schema, and close the pool.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}
