//! Lexical shortlisting.
//!
//! The shortlist is the cheap first stage of retrieval: a bounded set of
//! chunks from the permitted corpus that look textually related to the
//! query. Two signals are combined per chunk:
//!
//! - **document similarity**: trigram similarity between the query and the
//!   document's aggregated searchable text (the same measure as Postgres
//!   `pg_trgm`'s `similarity()`), shared by every chunk of the document;
//! - **substring match**: the raw query occurs in the chunk text,
//!   ignoring case. This counts as a fixed strong score.
//!
//! ```text
//! lex_score = max(doc_similarity, substring_score if matched else 0)
//! ```
//!
//! Chunks are kept when `lex_score > floor` or they substring-matched.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::error::{Result, Stage, StageContext};
use crate::models::{LexicalSignals, RetrievalCandidate};
use crate::store::{LexicalQuery, Store};

/// Tuning for the shortlist stage.
#[derive(Debug, Clone, PartialEq)]
pub struct ShortlistParams {
    /// Maximum number of candidates passed on (N).
    pub size: usize,
    /// Similarity a non-substring match must exceed to be kept.
    pub floor: f64,
    /// Score assigned to a case-insensitive substring match.
    pub substring_score: f64,
}

impl Default for ShortlistParams {
    fn default() -> Self {
        Self {
            size: 100,
            floor: 0.1,
            substring_score: 0.8,
        }
    }
}

/// Combine the two lexical signals into one score.
pub fn lexical_score(signals: &LexicalSignals, substring_score: f64) -> f64 {
    let substring = if signals.substring_match {
        substring_score
    } else {
        0.0
    };
    signals.doc_similarity.max(substring)
}

/// Produce the lexical shortlist for `query` over `permitted_ids`.
///
/// Returns an empty list without touching storage when nothing is
/// permitted or the query is blank. Candidates reachable more than once
/// keep their best score; ties keep storage order.
pub async fn shortlist(
    store: &dyn Store,
    query: &str,
    permitted_ids: &[String],
    params: &ShortlistParams,
) -> Result<Vec<RetrievalCandidate>> {
    if permitted_ids.is_empty() || query.trim().is_empty() {
        return Ok(Vec::new());
    }

    let raw = store
        .query_lexical_candidates(&LexicalQuery {
            text: query,
            permitted_ids,
            limit: params.size,
            floor: params.floor,
            substring_score: params.substring_score,
        })
        .await
        .stage(Stage::Shortlist)?;
    let fetched = raw.len();

    let mut out: Vec<RetrievalCandidate> = Vec::with_capacity(raw.len());
    let mut seen: HashMap<String, usize> = HashMap::new();

    for mut cand in raw {
        cand.lex_score = lexical_score(&cand.signals, params.substring_score);
        if !(cand.lex_score > params.floor || cand.signals.substring_match) {
            continue;
        }
        match seen.get(&cand.chunk_id) {
            Some(&at) => {
                if cand.lex_score > out[at].lex_score {
                    out[at] = cand;
                }
            }
            None => {
                seen.insert(cand.chunk_id.clone(), out.len());
                out.push(cand);
            }
        }
    }

    out.sort_by(|a, b| {
        b.lex_score
            .partial_cmp(&a.lex_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    out.truncate(params.size);

    debug!(fetched, kept = out.len(), "lexical shortlist");
    Ok(out)
}

/// Case-insensitive substring test used for the substring signal.
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Trigram set of `text`, following `pg_trgm`.
///
/// Text is split into words on non-alphanumeric characters, each word is
/// lowercased and padded with two leading and one trailing space, and every
/// three-character window becomes a trigram.
pub fn trigrams(text: &str) -> HashSet<[char; 3]> {
    let mut out = HashSet::new();
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let padded: Vec<char> = "  "
            .chars()
            .chain(word.chars().flat_map(char::to_lowercase))
            .chain(std::iter::once(' '))
            .collect();
        for w in padded.windows(3) {
            out.insert([w[0], w[1], w[2]]);
        }
    }
    out
}

/// Trigram similarity in `[0, 1]`: shared trigrams over the union.
///
/// Returns `0.0` when either text has no words.
pub fn trigram_similarity(a: &str, b: &str) -> f64 {
    let ta = trigrams(a);
    let tb = trigrams(b);
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let shared = ta.intersection(&tb).count();
    let union = ta.len() + tb.len() - shared;
    shared as f64 / union as f64
}
