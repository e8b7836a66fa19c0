//! Prompt text for answer generation and the self-check pass.

use crate::models::Snippet;

/// Lower and upper bound on answer length, in words.
pub const ANSWER_WORDS: (usize, usize) = (120, 180);

pub fn answer_system_prompt() -> String {
    let (min, max) = ANSWER_WORDS;
    format!(
        "You are a research assistant. Only write facts supported by the provided snippets. \
Cite every key claim with its snippet number in brackets, like [1] or [2]. \
If the snippets do not contain enough evidence, say so and state what is missing. \
Answer in {min}-{max} words."
    )
}

pub fn answer_user_prompt(question: &str, snippets: &[Snippet]) -> String {
    let blocks = snippets
        .iter()
        .map(|s| {
            format!(
                "[{}] {}\nURL: {}\nContent: {}",
                s.index, s.source, s.url, s.excerpt
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Question: {question}\n\nAvailable snippets:\n{blocks}\n\n\
Write a comprehensive answer using **bold** for key phrases. Cite all claims."
    )
}

pub const SELF_CHECK_SYSTEM_PROMPT: &str = "Check if any statements lack citations or are \
unsupported by the snippets. Return only the unsupported claims, or \"None\" if there are none.";

pub fn self_check_user_prompt(answer: &str, snippets: &[Snippet]) -> String {
    let snippets_json = serde_json::to_string(snippets).unwrap_or_else(|_| "[]".to_string());
    format!("Answer: {answer}\n\nSnippets: {snippets_json}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snippet(index: usize) -> Snippet {
        Snippet {
            index,
            source: format!("Doc {}", index),
            url: format!("https://example.com/{}", index),
            excerpt: "excerpt text".to_string(),
        }
    }

    #[test]
    fn test_system_prompt_states_rules() {
        let p = answer_system_prompt();
        assert!(p.contains("Only write facts supported"));
        assert!(p.contains("[1]"));
        assert!(p.contains("120-180 words"));
        assert!(p.contains("what is missing"));
    }

    #[test]
    fn test_user_prompt_lists_numbered_snippets() {
        let p = answer_user_prompt("why?", &[snippet(1), snippet(2)]);
        assert!(p.starts_with("Question: why?"));
        assert!(p.contains("[1] Doc 1\nURL: https://example.com/1\nContent: excerpt text"));
        assert!(p.contains("[2] Doc 2"));
        assert!(p.contains("**bold**"));
    }

    #[test]
    fn test_self_check_prompt_embeds_snippets_json() {
        let p = self_check_user_prompt("An answer [1].", &[snippet(1)]);
        assert!(p.contains("Answer: An answer [1]."));
        assert!(p.contains("\"index\":1"));
    }
}
