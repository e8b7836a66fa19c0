//! Error type for the retrieval and synthesis pipeline.
//!
//! Collaborators (storage, permission resolution, embedding, generation)
//! report failures as [`anyhow::Error`]; the pipeline tags them with the
//! [`Stage`] that failed. An empty corpus or an empty shortlist is not an
//! error and never surfaces here.

use std::fmt;

/// Pipeline stage that talks to an external collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Permissions,
    Shortlist,
    Embedding,
    Generation,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Permissions => "permission lookup",
            Stage::Shortlist => "lexical shortlist",
            Stage::Embedding => "query embedding",
            Stage::Generation => "answer generation",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing credentials or invalid settings. Not retryable.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A storage or provider call failed. Retry policy belongs to the caller.
    #[error("{stage} failed: {source:#}")]
    Upstream {
        stage: Stage,
        #[source]
        source: anyhow::Error,
    },

    /// The query embedding does not share the corpus dimensionality.
    #[error("embedding dimension mismatch: corpus has {expected}, query has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl Error {
    pub fn upstream(stage: Stage, source: anyhow::Error) -> Self {
        Error::Upstream { stage, source }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Attach a [`Stage`] to collaborator failures.
pub(crate) trait StageContext<T> {
    fn stage(self, stage: Stage) -> Result<T>;
}

impl<T> StageContext<T> for anyhow::Result<T> {
    fn stage(self, stage: Stage) -> Result<T> {
        self.map_err(|source| Error::upstream(stage, source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_message_names_stage() {
        let err: Result<()> = Err(anyhow::anyhow!("connection reset")).stage(Stage::Embedding);
        let msg = err.unwrap_err().to_string();
        assert!(msg.contains("query embedding"));
        assert!(msg.contains("connection reset"));
    }
}
