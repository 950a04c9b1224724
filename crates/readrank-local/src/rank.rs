//! Query relevance ranking.
//!
//! Two interchangeable strategies, tried in order:
//! 1. semantic: embedding vectors from a backend, cosine similarity
//! 2. lexical: deterministic prefix-match term frequency, no I/O
//!
//! The semantic strategy is all-or-nothing: any failure (timeout, HTTP
//! error, empty vector) discards partial scores and re-ranks everything
//! lexically, so a result never mixes scores from different strategies.

use readrank_core::{EmbeddingBackend, RankedItem, Result};
use std::collections::HashMap;

pub const METHOD_EMPTY: &str = "empty";
pub const METHOD_LEXICAL: &str = "lexical-fallback";
pub const METHOD_OLLAMA: &str = "ollama-embedding";

/// Warning token for the deployment-policy skip (no network attempted).
pub const WARN_SERVERLESS_SKIP: &str = "embeddings_disabled_serverless";

/// Deployment reachability policy, not a ranking decision: sandboxed or
/// serverless runtimes have no local embedding service, so the semantic
/// strategy is skipped there unless explicitly forced.
#[derive(Debug, Clone, Copy)]
pub struct RankPolicy {
    pub serverless: bool,
    pub force_embeddings: bool,
}

impl RankPolicy {
    pub fn embeddings_allowed(&self) -> bool {
        !self.serverless || self.force_embeddings
    }
}

#[derive(Debug, Clone)]
pub struct RankOutcome {
    pub method: String,
    pub model: Option<String>,
    pub warning: Option<String>,
    pub ranked: Vec<RankedItem>,
}

impl RankOutcome {
    fn empty() -> Self {
        Self {
            method: METHOD_EMPTY.to_string(),
            model: None,
            warning: None,
            ranked: Vec::new(),
        }
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|t| t.len() >= 2)
        .map(|t| t.to_string())
        .collect()
}

/// Crude prefix-match frequency score. Deliberately not IDF-weighted: the
/// point is determinism and zero external dependency, not retrieval quality.
fn term_frequency_score(query: &str, text: &str) -> f32 {
    let q_tokens = tokenize(query);
    if q_tokens.is_empty() {
        return 0.0;
    }
    let words = tokenize(text);
    if words.is_empty() {
        return 0.0;
    }

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for w in &words {
        *counts.entry(w.as_str()).or_insert(0) += 1;
    }

    let mut score = 0usize;
    for qt in &q_tokens {
        for (w, c) in &counts {
            if w.starts_with(qt.as_str()) {
                score += c;
            }
        }
    }
    score as f32 / words.len().max(1) as f32
}

/// Cosine similarity over the shared prefix of the two vectors.
/// Zero-length or zero-norm input scores 0.
fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let len = a.len().min(b.len());
    if len == 0 {
        return 0.0;
    }
    let mut dot = 0f64;
    let mut na = 0f64;
    let mut nb = 0f64;
    for i in 0..len {
        dot += f64::from(a[i]) * f64::from(b[i]);
        na += f64::from(a[i]) * f64::from(a[i]);
        nb += f64::from(b[i]) * f64::from(b[i]);
    }
    if na <= 0.0 || nb <= 0.0 {
        return 0.0;
    }
    (dot / (na.sqrt() * nb.sqrt())) as f32
}

/// Stable sort, score descending; ties keep original candidate order.
fn sort_and_truncate(mut scored: Vec<RankedItem>, keep: usize) -> Vec<RankedItem> {
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(keep);
    scored
}

fn lexical_outcome(
    query: &str,
    items: &[String],
    keep: usize,
    warning: Option<String>,
) -> RankOutcome {
    let scored = items
        .iter()
        .enumerate()
        .map(|(index, text)| RankedItem {
            index,
            text: text.clone(),
            score: term_frequency_score(query, text),
        })
        .collect();
    RankOutcome {
        method: METHOD_LEXICAL.to_string(),
        model: None,
        warning,
        ranked: sort_and_truncate(scored, keep),
    }
}

async fn semantic_outcome(
    query: &str,
    items: &[String],
    keep: usize,
    backend: &dyn EmbeddingBackend,
) -> Result<RankOutcome> {
    let query_vec = backend.embed(query).await?;
    let mut scored = Vec::with_capacity(items.len());
    // One in-flight call at a time bounds peak load on the embedding
    // service; ordering by original index is preserved before sorting.
    for (index, text) in items.iter().enumerate() {
        let vec = backend.embed(text).await?;
        scored.push(RankedItem {
            index,
            text: text.clone(),
            score: cosine(&query_vec, &vec),
        });
    }
    Ok(RankOutcome {
        method: METHOD_OLLAMA.to_string(),
        model: Some(backend.model().to_string()),
        warning: None,
        ranked: sort_and_truncate(scored, keep),
    })
}

/// Rank candidate texts against a query.
///
/// Always returns an outcome: empty inputs yield `method = "empty"`, and
/// semantic failures degrade to the lexical strategy with the failure
/// recorded in `warning`.
pub async fn rank_by_relevance(
    query: &str,
    candidates: &[String],
    top_k: usize,
    policy: &RankPolicy,
    backend: Option<&dyn EmbeddingBackend>,
) -> RankOutcome {
    let q = query.trim();
    let items: Vec<String> = candidates
        .iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    if q.is_empty() || items.is_empty() {
        return RankOutcome::empty();
    }

    let keep = top_k.max(1);

    if !policy.embeddings_allowed() {
        return lexical_outcome(q, &items, keep, Some(WARN_SERVERLESS_SKIP.to_string()));
    }
    let Some(backend) = backend else {
        return lexical_outcome(
            q,
            &items,
            keep,
            Some("embedding_backend_unavailable".to_string()),
        );
    };

    match semantic_outcome(q, &items, keep, backend).await {
        Ok(outcome) => outcome,
        Err(e) => lexical_outcome(q, &items, keep, Some(e.to_string())),
    }
}
