//! Citation-constrained answer synthesis.
//!
//! 1. Number the grounding chunks `1..=n` and truncate each to an excerpt.
//! 2. One low-temperature, token-bounded generation call with the grounded prompt.
//! 3. Optionally, a second call asks the generator to list unsupported
//!    claims; if it reports any, the answer is passed through a [`Hedger`].
//!    This pass is best-effort: its failure leaves the answer unchanged.
//! 4. Cited indices are extracted in first-appearance order and mapped back
//!    to their snippets to build the source list.
//!
//! Every returned [`Source`] therefore corresponds to an `[i]` present in
//! the answer text.

pub mod citations;
pub mod hedging;
pub mod prompts;

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{Result, Stage, StageContext};
use crate::models::{Answer, GroundingChunk, Snippet, Source};

pub use citations::extract_citations;
pub use hedging::{Hedger, NoopHedger, RegexHedger};

/// Sampling controls for one generation call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Text generator (chat-completion style).
#[async_trait]
pub trait Generator: Send + Sync {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &GenerationOptions,
    ) -> AnyResult<String>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisParams {
    /// Characters of each chunk shown to the generator and returned as excerpt.
    pub excerpt_chars: usize,
    pub answer: GenerationOptions,
    pub self_check: GenerationOptions,
}

impl Default for SynthesisParams {
    fn default() -> Self {
        Self {
            excerpt_chars: 500,
            answer: GenerationOptions {
                temperature: 0.3,
                max_tokens: 300,
            },
            self_check: GenerationOptions {
                temperature: 0.0,
                max_tokens: 100,
            },
        }
    }
}

/// Shortest self-check reply treated as a real list of issues.
const MIN_ISSUE_CHARS: usize = 10;

/// Number the chunks from 1 and cut each to `excerpt_chars` characters.
pub fn build_snippets(chunks: &[GroundingChunk], excerpt_chars: usize) -> Vec<Snippet> {
    chunks
        .iter()
        .enumerate()
        .map(|(i, c)| Snippet {
            index: i + 1,
            source: c.title.clone(),
            url: c.url.clone(),
            excerpt: c.text.chars().take(excerpt_chars).collect(),
        })
        .collect()
}

/// Whether a self-check reply reports something worth hedging.
pub fn reports_issues(reply: &str) -> bool {
    let trimmed = reply.trim();
    let bare = trimmed.trim_end_matches('.');
    !bare.eq_ignore_ascii_case("none") && trimmed.chars().count() > MIN_ISSUE_CHARS
}

/// Generate a grounded answer for `question` from `chunks`.
///
/// Issues exactly one generation call, or two when `self_check` is set.
/// A failure of the main call is returned as [`Error::Upstream`](crate::Error::Upstream);
/// a failure of the self-check call is logged and ignored.
pub async fn synthesize(
    generator: &dyn Generator,
    hedger: &dyn Hedger,
    question: &str,
    chunks: &[GroundingChunk],
    self_check: bool,
    params: &SynthesisParams,
) -> Result<Answer> {
    let snippets = build_snippets(chunks, params.excerpt_chars);

    let mut answer = generator
        .complete(
            &prompts::answer_system_prompt(),
            &prompts::answer_user_prompt(question, &snippets),
            &params.answer,
        )
        .await
        .stage(Stage::Generation)?;

    if self_check {
        match generator
            .complete(
                prompts::SELF_CHECK_SYSTEM_PROMPT,
                &prompts::self_check_user_prompt(&answer, &snippets),
                &params.self_check,
            )
            .await
        {
            Ok(reply) if reports_issues(&reply) => {
                debug!("self-check reported unsupported claims; hedging answer");
                answer = hedger.hedge(&answer);
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "self-check failed; keeping unchecked answer"),
        }
    }

    let sources = extract_citations(&answer, snippets.len())
        .into_iter()
        .map(|i| {
            let s = &snippets[i - 1];
            Source {
                citation: i,
                title: s.source.clone(),
                url: s.url.clone(),
                excerpt: s.excerpt.clone(),
            }
        })
        .collect();

    Ok(Answer {
        answer_text: answer,
        sources,
    })
}
