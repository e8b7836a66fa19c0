//! Vector reranking with recency weighting.
//!
//! Each shortlisted candidate receives
//!
//! ```text
//! final = w_v × cos(query, chunk) + w_l × lexical + w_r × exp(-age_days / half_life)
//! ```
//!
//! where `lexical` is either the candidate's own shortlist score
//! ([`LexicalWeighting::Candidate`]) or a fixed constant
//! ([`LexicalWeighting::Fixed`]). The fixed mode treats the shortlist purely
//! as a filter: every candidate gets the same lexical contribution, so the
//! term never changes the order.

use chrono::{DateTime, Utc};

use crate::embedding::cosine_similarity;
use crate::error::{Error, Result};
use crate::models::RetrievalCandidate;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// What the lexical term of the final score is fed with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LexicalWeighting {
    /// The candidate's shortlist score.
    Candidate,
    /// The same value for every candidate.
    Fixed(f64),
}

/// Reranking weights and recency half-life.
#[derive(Debug, Clone, PartialEq)]
pub struct RerankParams {
    pub vector_weight: f64,
    pub lexical_weight: f64,
    pub recency_weight: f64,
    pub lexical: LexicalWeighting,
    /// Decay constant in days: a document this old scores `1/e` on recency.
    pub half_life_days: f64,
}

impl Default for RerankParams {
    fn default() -> Self {
        Self {
            vector_weight: 0.6,
            lexical_weight: 0.3,
            recency_weight: 0.1,
            lexical: LexicalWeighting::Candidate,
            half_life_days: 30.0,
        }
    }
}

impl RerankParams {
    /// Check that weights are non-negative and sum to 1, and the half-life is positive.
    pub fn validate(&self) -> Result<()> {
        let weights = [self.vector_weight, self.lexical_weight, self.recency_weight];
        if weights.iter().any(|w| !(0.0..=1.0).contains(w)) {
            return Err(Error::Configuration(
                "rerank weights must each be in [0.0, 1.0]".to_string(),
            ));
        }
        let sum: f64 = weights.iter().sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(Error::Configuration(format!(
                "rerank weights must sum to 1.0 (got {:.4})",
                sum
            )));
        }
        if !(self.half_life_days > 0.0) {
            return Err(Error::Configuration(
                "recency half-life must be > 0 days".to_string(),
            ));
        }
        Ok(())
    }
}

/// Exponential recency decay: `1.0` at age zero, `≈0.368` at one half-life.
///
/// Negative ages (documents dated in the future) count as zero.
pub fn recency_score(age_days: f64, half_life_days: f64) -> f64 {
    (-age_days.max(0.0) / half_life_days).exp()
}

/// Age of a document in fractional days at `now`.
pub fn age_in_days(updated_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    (now - updated_at).num_milliseconds() as f64 / 1000.0 / SECONDS_PER_DAY
}

/// Fail unless every candidate embedding has the query's dimensionality.
pub fn check_dimensions(query_vec: &[f32], candidates: &[RetrievalCandidate]) -> Result<()> {
    match candidates
        .iter()
        .find(|c| c.embedding.len() != query_vec.len())
    {
        Some(c) => Err(Error::DimensionMismatch {
            expected: c.embedding.len(),
            actual: query_vec.len(),
        }),
        None => Ok(()),
    }
}

/// Score every candidate and sort by `final_score` descending.
///
/// Sorting is stable, so equal scores keep shortlist order.
pub fn rerank(
    mut candidates: Vec<RetrievalCandidate>,
    query_vec: &[f32],
    params: &RerankParams,
    now: DateTime<Utc>,
) -> Vec<RetrievalCandidate> {
    for c in candidates.iter_mut() {
        c.vector_score = cosine_similarity(query_vec, &c.embedding);
        let lexical = match params.lexical {
            LexicalWeighting::Candidate => c.lex_score,
            LexicalWeighting::Fixed(v) => v,
        };
        let recency = recency_score(age_in_days(c.updated_at, now), params.half_life_days);
        c.final_score = params.vector_weight * c.vector_score
            + params.lexical_weight * lexical
            + params.recency_weight * recency;
    }

    candidates.sort_by(|a, b| {
        b.final_score
            .partial_cmp(&a.final_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates
}
