//! # Groundwork
//!
//! **Permission-scoped hybrid retrieval and citation-grounded answers over
//! a team's documents.**
//!
//! This crate is the application around [`groundwork_core`]: configuration,
//! the Postgres store, OpenAI clients, the JSON loader, the `gw` CLI and
//! the HTTP server.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────────────────────┐   ┌──────────────┐
//! │  gw load   │──▶│          Postgres            │◀──│   PgStore    │
//! │ chunk+embed│   │ pg_trgm + pgvector + grants  │   │ (Store impl) │
//! └────────────┘   └──────────────────────────────┘   └──────┬───────┘
//!                                                             │
//!                       ┌─────────────────────────────────────┤
//!                       ▼                                     ▼
//!                ┌─────────────┐                       ┌─────────────┐
//!                │ CLI (gw)    │                       │ HTTP server │
//!                │ retrieve/ask│                       │ /retrieve   │
//!                └─────────────┘                       │ /ask        │
//!                                                      └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! gw init                                   # create schema
//! gw load ./demos/seed.json                 # load documents
//! gw retrieve "commission reconciliation" --team T1 --user U1
//! gw ask "How do teams reconcile commissions today?" --team T1 --user U1
//! gw serve                                  # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`db`] | Postgres pool |
//! | [`migrate`] | Idempotent schema migrations |
//! | [`pg_store`] | `Store` + `PermissionResolver` over Postgres |
//! | [`openai`] | Shared HTTP retry loop |
//! | [`embedding`] | OpenAI and disabled embedding providers |
//! | [`generation`] | OpenAI and disabled generators |
//! | [`context`] | Process-wide pipeline construction |
//! | [`load`] | JSON document loader |
//! | [`query`] | `gw retrieve` / `gw ask` output |
//! | [`server`] | Axum HTTP server |

pub mod config;
pub mod context;
pub mod db;
pub mod embedding;
pub mod generation;
pub mod load;
pub mod migrate;
pub mod openai;
pub mod pg_store;
pub mod query;
pub mod server;
