//! Core data models used throughout Groundwork.
//!
//! Persistent records ([`DataSource`], [`Document`], [`Chunk`], [`Permission`])
//! describe the permitted corpus. Query-scoped types ([`Principal`],
//! [`RetrievalCandidate`], [`GroundingChunk`], [`Source`], [`Answer`]) live
//! for a single request and are never persisted by the core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ingestion origin that owns documents (a Slack channel, a research project, …).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSource {
    pub id: String,
    /// Connector kind, e.g. `"slack"` or `"dovetail"`.
    pub kind: String,
    /// Stable identifier within the upstream system.
    pub external_id: String,
    pub name: String,
}

/// A document in the corpus.
///
/// `(source_id, external_id)` is the natural key; `external_id` never changes
/// once assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub source_id: String,
    pub external_id: String,
    pub title: String,
    pub url: String,
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Aggregated text used for document-level fuzzy matching.
    pub searchable: String,
}

/// A slice of a document's text with its embedding.
///
/// `ordinal` is unique within the owning document. Every chunk in the corpus
/// carries an embedding of the same dimensionality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub ordinal: i32,
    pub text: String,
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// The kind of identity a permission row grants access to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalType {
    Team,
    User,
    Channel,
}

impl PrincipalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrincipalType::Team => "team",
            PrincipalType::User => "user",
            PrincipalType::Channel => "channel",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "team" => Some(PrincipalType::Team),
            "user" => Some(PrincipalType::User),
            "channel" => Some(PrincipalType::Channel),
            _ => None,
        }
    }
}

impl std::fmt::Display for PrincipalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Principal id that matches every principal of the row's type.
pub const WILDCARD_PRINCIPAL: &str = "*";

/// A grant on a document, as supplied at ingestion time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Grant {
    pub principal_type: PrincipalType,
    pub principal_id: String,
}

/// A stored permission row: `(document, principal type, principal id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
    pub document_id: String,
    pub principal_type: PrincipalType,
    pub principal_id: String,
}

impl Permission {
    /// Whether this row makes its document visible to `principal`.
    pub fn matches(&self, principal: &Principal) -> bool {
        let wanted = match self.principal_type {
            PrincipalType::Team => Some(principal.team_id.as_str()),
            PrincipalType::User => Some(principal.user_id.as_str()),
            PrincipalType::Channel => principal.channel_id.as_deref(),
        };
        match wanted {
            Some(id) => self.principal_id == WILDCARD_PRINCIPAL || self.principal_id == id,
            None => false,
        }
    }
}

/// The identity a query runs as. Supplied per request, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub team_id: String,
    pub user_id: String,
    #[serde(default)]
    pub channel_id: Option<String>,
}

impl Principal {
    pub fn new(team_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            team_id: team_id.into(),
            user_id: user_id.into(),
            channel_id: None,
        }
    }

    pub fn with_channel(mut self, channel_id: impl Into<String>) -> Self {
        self.channel_id = Some(channel_id.into());
        self
    }

    /// `(type, id)` pairs a permission row may carry to match this principal,
    /// wildcards included.
    pub fn grant_keys(&self) -> Vec<(PrincipalType, String)> {
        let mut keys = vec![
            (PrincipalType::Team, self.team_id.clone()),
            (PrincipalType::Team, WILDCARD_PRINCIPAL.to_string()),
            (PrincipalType::User, self.user_id.clone()),
            (PrincipalType::User, WILDCARD_PRINCIPAL.to_string()),
        ];
        if let Some(channel) = &self.channel_id {
            keys.push((PrincipalType::Channel, channel.clone()));
            keys.push((PrincipalType::Channel, WILDCARD_PRINCIPAL.to_string()));
        }
        keys
    }
}

/// Raw lexical evidence for a chunk, as reported by storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LexicalSignals {
    /// Fuzzy similarity between the query and the document's searchable text.
    pub doc_similarity: f64,
    /// Whether the raw query occurs (case-insensitively) in the chunk text.
    pub substring_match: bool,
}

/// A chunk joined with its document, scored during one query.
///
/// Scores are filled in stage by stage: `lex_score` by the shortlister,
/// `vector_score` and `final_score` by the reranker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalCandidate {
    pub chunk_id: String,
    pub document_id: String,
    pub ordinal: i32,
    pub text: String,
    #[serde(skip)]
    pub embedding: Vec<f32>,
    pub title: String,
    pub url: String,
    pub author: Option<String>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub signals: LexicalSignals,
    pub lex_score: f64,
    pub vector_score: f64,
    pub final_score: f64,
}

/// A retrieval result handed back to callers.
pub type RankedChunk = RetrievalCandidate;

/// Evidence handed to the answer synthesizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundingChunk {
    pub title: String,
    pub url: String,
    pub text: String,
}

impl From<&RetrievalCandidate> for GroundingChunk {
    fn from(c: &RetrievalCandidate) -> Self {
        Self {
            title: c.title.clone(),
            url: c.url.clone(),
            text: c.text.clone(),
        }
    }
}

/// A numbered snippet as presented to the generator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snippet {
    /// 1-based citation index.
    pub index: usize,
    pub source: String,
    pub url: String,
    pub excerpt: String,
}

/// A citation returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// The `[n]` index this source is cited as in the answer text.
    pub citation: usize,
    pub title: String,
    pub url: String,
    pub excerpt: String,
}

/// A grounded answer and the sources it cites, in first-citation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    #[serde(rename = "answer")]
    pub answer_text: String,
    pub sources: Vec<Source>,
}
