//! # Groundwork Core
//!
//! Runtime-free logic for Groundwork: data models, the permission, store,
//! embedding and generator traits, and the retrieval + answer pipeline.
//!
//! This crate contains no tokio, sqlx, HTTP clients, or filesystem I/O.
//! Hosts supply collaborators through the traits and drive everything via
//! [`pipeline::Pipeline`].
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | Documents, chunks, permissions, principals, candidates, answers |
//! | [`error`] | Pipeline error type |
//! | [`permissions`] | `PermissionResolver` trait |
//! | [`store`] | `Store` trait and in-memory backend |
//! | [`lexical`] | Trigram similarity and the lexical shortlist |
//! | [`embedding`] | `EmbeddingProvider` trait, cosine similarity |
//! | [`cache`] | Embedding cache decorator |
//! | [`rerank`] | Vector + lexical + recency scoring |
//! | [`diversity`] | MMR selection |
//! | [`answer`] | Grounded prompt, self-check, hedging, citations |
//! | [`chunk`] | Paragraph chunker used at load time |
//! | [`pipeline`] | `retrieve`, `answer`, `ask` |

pub mod answer;
pub mod cache;
pub mod chunk;
pub mod diversity;
pub mod embedding;
pub mod error;
pub mod lexical;
pub mod models;
pub mod permissions;
pub mod pipeline;
pub mod rerank;
pub mod store;

pub use error::{Error, Result};
pub use pipeline::{Pipeline, PipelineSettings};
