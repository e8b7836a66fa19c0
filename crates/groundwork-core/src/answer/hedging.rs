//! Post-hoc hedging of assertive language.
//!
//! Applied when the self-check reports unsupported claims. It is a blunt,
//! context-free rewrite kept behind the [`Hedger`] trait so it can be
//! replaced without touching generation.

use regex::{Captures, Regex};

pub trait Hedger: Send + Sync {
    fn hedge(&self, text: &str) -> String;
}

/// Rewrites inference words (`likely`, `probably`, `suggests`,
/// `indicates`) to `may`, whole words only, keeping a leading capital.
pub struct RegexHedger {
    pattern: Regex,
    replacement: String,
}

impl RegexHedger {
    pub fn new(words: &[&str], replacement: &str) -> Result<Self, regex::Error> {
        let alternation = words
            .iter()
            .map(|w| regex::escape(w))
            .collect::<Vec<_>>()
            .join("|");
        Ok(Self {
            pattern: Regex::new(&format!(r"(?i)\b(?:{})\b", alternation))?,
            replacement: replacement.to_string(),
        })
    }
}

impl Default for RegexHedger {
    fn default() -> Self {
        Self::new(&["likely", "probably", "suggests", "indicates"], "may")
            .expect("default hedging pattern is valid")
    }
}

impl Hedger for RegexHedger {
    fn hedge(&self, text: &str) -> String {
        self.pattern
            .replace_all(text, |caps: &Captures| {
                let starts_upper = caps[0].chars().next().is_some_and(char::is_uppercase);
                if starts_upper {
                    let mut chars = self.replacement.chars();
                    match chars.next() {
                        Some(first) => first.to_uppercase().chain(chars).collect(),
                        None => String::new(),
                    }
                } else {
                    self.replacement.clone()
                }
            })
            .into_owned()
    }
}

/// Leaves text untouched.
pub struct NoopHedger;

impl Hedger for NoopHedger {
    fn hedge(&self, text: &str) -> String {
        text.to_string()
    }
}
