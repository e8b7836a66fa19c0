//! Postgres connection management.
//!
//! One pool is created per process and shared by every request. Callers
//! close it on shutdown with [`sqlx::PgPool::close`].

use anyhow::{Context, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::Config;

/// Create a connection pool to the configured database.
///
/// # Errors
///
/// Returns an error if no URL is configured or the server is unreachable.
pub async fn connect(config: &Config) -> Result<PgPool> {
    let url = config.db.database_url()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.db.max_connections)
        .connect(&url)
        .await
        .context("Failed to connect to Postgres")?;

    Ok(pool)
}
