//! Maximal-marginal-relevance (MMR) selection.
//!
//! Greedy selection of the final top-K from the reranked list. The best
//! candidate is always taken first; every later pick maximizes
//!
//! ```text
//! λ × relevance(c) − (1 − λ) × redundancy(c, selected)
//! ```
//!
//! Redundancy only discourages repeats: when the pool holds a single
//! document, its chunks still fill all K slots.

use crate::embedding::cosine_similarity;
use crate::models::RetrievalCandidate;

/// How redundancy against the already-selected set is measured.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Redundancy {
    /// Fixed `penalty` when a selected chunk shares the candidate's document.
    SameDocument { penalty: f64 },
    /// Highest cosine similarity to any selected chunk (negative counts as 0).
    EmbeddingSimilarity,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MmrParams {
    /// Relevance/diversity tradeoff λ in `[0, 1]`; 1 ignores redundancy.
    pub lambda: f64,
    pub redundancy: Redundancy,
}

impl Default for MmrParams {
    fn default() -> Self {
        Self {
            lambda: 0.5,
            redundancy: Redundancy::SameDocument { penalty: 0.9 },
        }
    }
}

fn redundancy(
    candidate: &RetrievalCandidate,
    selected: &[RetrievalCandidate],
    mode: Redundancy,
) -> f64 {
    match mode {
        Redundancy::SameDocument { penalty } => {
            if selected.iter().any(|s| s.document_id == candidate.document_id) {
                penalty
            } else {
                0.0
            }
        }
        Redundancy::EmbeddingSimilarity => selected
            .iter()
            .map(|s| cosine_similarity(&s.embedding, &candidate.embedding))
            .fold(0.0, f64::max),
    }
}

/// Select up to `k` candidates by MMR, using `final_score` as relevance.
///
/// Output length is `min(k, candidates.len())`. The first element is the
/// highest-scoring input (earliest wins ties); later elements follow
/// diversity-adjusted preference.
pub fn select(
    candidates: Vec<RetrievalCandidate>,
    k: usize,
    params: &MmrParams,
) -> Vec<RetrievalCandidate> {
    if candidates.is_empty() || k == 0 {
        return Vec::new();
    }

    let mut pool = candidates;
    let mut selected: Vec<RetrievalCandidate> = Vec::with_capacity(k.min(pool.len()));

    let mut best = 0;
    for (i, c) in pool.iter().enumerate().skip(1) {
        if c.final_score > pool[best].final_score {
            best = i;
        }
    }
    selected.push(pool.remove(best));

    while selected.len() < k && !pool.is_empty() {
        let mut best_idx = 0;
        let mut best_score = f64::NEG_INFINITY;
        for (i, c) in pool.iter().enumerate() {
            let score = params.lambda * c.final_score
                - (1.0 - params.lambda) * redundancy(c, &selected, params.redundancy);
            if score > best_score {
                best_score = score;
                best_idx = i;
            }
        }
        selected.push(pool.remove(best_idx));
    }

    selected
}
