//! Citation extraction.
//!
//! Answers cite snippets as `[n]`. Extraction never fails: anything that is
//! not a valid 1-based index into the snippet list is dropped.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

fn citation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[(\d+)\]").expect("citation regex is valid"))
}

/// Distinct cited indices in order of first appearance, restricted to
/// `1..=snippet_count`.
pub fn extract_citations(answer: &str, snippet_count: usize) -> Vec<usize> {
    let mut seen = HashSet::new();
    citation_re()
        .captures_iter(answer)
        .filter_map(|cap| cap.get(1)?.as_str().parse::<usize>().ok())
        .filter(|&i| i >= 1 && i <= snippet_count)
        .filter(|&i| seen.insert(i))
        .collect()
}
