//! CLI entry points for `gw retrieve` and `gw ask`.
//!
//! Both build an [`AppContext`], run one pipeline operation, print the
//! result to stdout, and close the pool.

use anyhow::Result;

use groundwork_core::models::{Answer, Principal, RankedChunk, Source};

use crate::config::Config;
use crate::context::AppContext;

/// Build a principal from CLI flags.
pub fn principal(team: &str, user: &str, channel: Option<&str>) -> Principal {
    let p = Principal::new(team, user);
    match channel {
        Some(c) => p.with_channel(c),
        None => p,
    }
}

pub async fn run_retrieve(
    config: &Config,
    query: &str,
    principal: &Principal,
    limit: Option<usize>,
) -> Result<()> {
    let ctx = AppContext::connect(config).await?;
    let limit = limit.unwrap_or(config.retrieval.final_limit);
    let results = ctx.pipeline.retrieve(query, principal, limit).await;
    ctx.close().await;

    print_results(&results?);
    Ok(())
}

pub async fn run_ask(
    config: &Config,
    question: &str,
    principal: &Principal,
    limit: Option<usize>,
    self_check: bool,
) -> Result<()> {
    let ctx = AppContext::connect(config).await?;
    let limit = limit.unwrap_or(config.retrieval.final_limit);
    let answer = ctx.pipeline.ask(question, principal, limit, self_check).await;
    ctx.close().await;

    print_answer(&answer?);
    Ok(())
}

fn print_results(results: &[RankedChunk]) {
    if results.is_empty() {
        println!("No results.");
        return;
    }

    for (i, r) in results.iter().enumerate() {
        println!("{}. [{:.3}] {}", i + 1, r.final_score, r.title);
        println!(
            "    scoring: vector={:.3}  lexical={:.3}",
            r.vector_score, r.lex_score
        );
        println!("    updated: {}", r.updated_at.format("%Y-%m-%d"));
        println!("    url: {}", r.url);
        let excerpt: String = r.text.chars().take(200).collect();
        println!("    excerpt: \"{}\"", excerpt.replace('\n', " ").trim());
        println!("    chunk: {}#{}", r.document_id, r.ordinal);
        println!();
    }
}

fn print_answer(answer: &Answer) {
    println!("{}", answer.answer_text);
    if answer.sources.is_empty() {
        return;
    }
    println!();
    println!("Sources:");
    for line in source_lines(&answer.sources) {
        println!("{}", line);
    }
}

/// One line per source, numbered by the `[n]` it is cited as.
fn source_lines(sources: &[Source]) -> Vec<String> {
    sources
        .iter()
        .map(|s| format!("  [{}] {} ({})", s.citation, s.title, s.url))
        .collect()
}
