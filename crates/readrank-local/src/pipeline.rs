//! The extraction pipeline.
//!
//! One request is one linear pass: resolve the input, branch on whether the
//! body is markup, build a relevance query, rank, compose passages, and
//! re-check the winner for access-block markers. The request fails only
//! when there is literally no text to analyze; every other degradation is
//! recorded in the result instead of propagated.

use crate::candidates::{self, CandidateSet};
use crate::ollama::{EmbedConfig, OllamaClient};
use crate::rank::{self, RankOutcome, RankPolicy};
use crate::resolve::Resolver;
use crate::{blockpage, resolve, textprep};
use readrank_core::{
    looks_like_html, Error, ExtractRequest, ExtractionResult, FetchedDocument, InputKind, Passage,
    RankedItem, RankingInfo, Result, SourceType,
};
use std::collections::HashSet;

/// Passage-composition needle: the head of a ranked candidate's text.
const CONTAINMENT_PREFIX_CHARS: usize = 80;
/// Passage dedup fingerprint length.
const PASSAGE_DEDUP_CHARS: usize = 180;
/// The markup branch always ranks at least this many candidates so passage
/// composition has material to work with.
const MIN_RANKED_CANDIDATES: usize = 6;

const BLOCK_WARNING: &str = "Remote site returned an anti-bot/access-block page. \
Paste the raw article HTML/text to extract the real content.";
const SERVERLESS_BLOCK_WARNING: &str = "Remote site returned an anti-bot/access-block page. \
This host may block datacenter traffic; paste raw article HTML/text for full extraction.";

fn env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Serverless runtimes get no local embedding service and no python
/// subprocesses; both the ranker and the fetch chain consult this.
pub fn serverless_runtime_detected() -> bool {
    ["VERCEL", "VERCEL_ENV", "NOW_REGION"]
        .iter()
        .any(|k| env(k).is_some())
}

/// Everything environmental, read once and passed in explicitly so a run is
/// a pure function of (request, config).
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub serverless: bool,
    pub force_embeddings: bool,
    pub embed: EmbedConfig,
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        Self {
            serverless: serverless_runtime_detected(),
            force_embeddings: env("READRANK_FORCE_EMBED").as_deref() == Some("1"),
            embed: EmbedConfig::from_env(),
        }
    }

    fn rank_policy(&self) -> RankPolicy {
        RankPolicy {
            serverless: self.serverless,
            force_embeddings: self.force_embeddings,
        }
    }
}

fn compose_query(explicit: Option<&str>, title: &str, excerpt: &str, source: &str) -> String {
    if let Some(q) = explicit {
        let q = q.trim();
        if !q.is_empty() {
            return q.to_string();
        }
    }
    [title, excerpt, source]
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn ranking_info(outcome: &RankOutcome) -> RankingInfo {
    RankingInfo {
        method: outcome.method.clone(),
        model: outcome.model.clone(),
        warning: outcome.warning.clone(),
    }
}

fn prefix_chars(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

/// Map ranked candidates back onto the article's own paragraphs.
///
/// A paragraph is selected when it contains the head of a ranked
/// candidate's text; already-selected paragraphs are skipped. Containment
/// can miss entirely when extraction paths disagree on boundaries, so zero
/// matches falls back to document order at score 0 rather than erroring.
fn compose_passages(
    article_text: &str,
    ranked: &[RankedItem],
    max_passages: usize,
) -> Vec<Passage> {
    let paragraphs = textprep::split_paragraphs(article_text);
    if paragraphs.is_empty() {
        return Vec::new();
    }

    let mut used: HashSet<String> = HashSet::new();
    let mut out: Vec<Passage> = Vec::new();
    for item in ranked {
        let needle = prefix_chars(item.text.trim(), CONTAINMENT_PREFIX_CHARS);
        if needle.is_empty() {
            continue;
        }
        for p in &paragraphs {
            if !p.contains(&needle) {
                continue;
            }
            let key = prefix_chars(p, PASSAGE_DEDUP_CHARS);
            if used.contains(&key) {
                continue;
            }
            used.insert(key);
            out.push(Passage {
                score: item.score,
                text: p.clone(),
            });
            break;
        }
        if out.len() >= max_passages {
            break;
        }
    }

    if !out.is_empty() {
        return out;
    }
    paragraphs
        .into_iter()
        .take(max_passages)
        .map(|p| Passage {
            score: 0.0,
            text: p,
        })
        .collect()
}

async fn plain_text_result(
    req: &ExtractRequest,
    doc: &FetchedDocument,
    policy: &RankPolicy,
    backend: &OllamaClient,
) -> ExtractionResult {
    let text = textprep::normalize_whitespace(&doc.body);
    let paragraphs = textprep::split_paragraphs(&text);
    // Plain text has no title/excerpt/source to compose from: the query is
    // the explicit one or empty, and an empty query ranks nothing.
    let query = compose_query(req.query.as_deref(), "", "", "");

    let outcome = rank::rank_by_relevance(&query, &paragraphs, req.top_k, policy, Some(backend)).await;
    let relevant_passages = outcome
        .ranked
        .iter()
        .map(|r| Passage {
            score: r.score,
            text: r.text.clone(),
        })
        .collect();

    ExtractionResult {
        ok: true,
        source_type: doc.source_type,
        source: doc.source.clone(),
        normalized_source: None,
        title: String::new(),
        byline: String::new(),
        excerpt: String::new(),
        paragraph_count: paragraphs.len(),
        article_text: text,
        relevant_passages,
        candidates_analyzed: None,
        blocked: false,
        warning: None,
        ranking: ranking_info(&outcome),
    }
}

async fn markup_result(
    req: &ExtractRequest,
    doc: &FetchedDocument,
    policy: &RankPolicy,
    backend: &OllamaClient,
    serverless: bool,
) -> ExtractionResult {
    let base_url = match doc.source_type {
        SourceType::Url => doc.source.clone(),
        _ => "https://local.article.reader/".to_string(),
    };
    let set: CandidateSet = candidates::extract_candidates(&doc.body, &base_url);

    let rv = set.reading_view.as_ref();
    let title = rv
        .map(|r| r.title.clone())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| set.dom_title.clone());
    let byline = rv.map(|r| r.byline.clone()).unwrap_or_default();
    let excerpt = rv.map(|r| r.excerpt.clone()).unwrap_or_default();

    let query = compose_query(req.query.as_deref(), &title, &excerpt, &doc.source);
    let outcome = rank::rank_by_relevance(
        &query,
        &set.candidates,
        req.top_k.max(MIN_RANKED_CANDIDATES),
        policy,
        Some(backend),
    )
    .await;

    let best_text = outcome
        .ranked
        .first()
        .map(|r| r.text.clone())
        .or_else(|| set.candidates.first().cloned())
        .unwrap_or_default();
    let article_text = textprep::normalize_whitespace(&best_text);
    let paragraph_count = textprep::split_paragraphs(&article_text).len();

    let max_passages = req.top_k.clamp(3, 8);
    let relevant_passages = compose_passages(&article_text, &outcome.ranked, max_passages);

    // A blocked page can still parse into a short plausible candidate, so
    // the winner gets re-checked at the content level.
    let blocked = blockpage::content_looks_blocked(&title, &article_text);
    let warning = blocked.then(|| {
        if serverless {
            SERVERLESS_BLOCK_WARNING.to_string()
        } else {
            BLOCK_WARNING.to_string()
        }
    });

    ExtractionResult {
        ok: true,
        source_type: doc.source_type,
        source: doc.source.clone(),
        normalized_source: (doc.source_type == SourceType::Url).then(|| doc.source.clone()),
        title,
        byline,
        excerpt,
        paragraph_count,
        article_text,
        relevant_passages,
        candidates_analyzed: Some(set.candidates.len()),
        blocked,
        warning,
        ranking: ranking_info(&outcome),
    }
}

/// Run one extraction request end to end.
pub async fn extract_relevant_article(
    req: &ExtractRequest,
    cfg: &PipelineConfig,
) -> Result<ExtractionResult> {
    let spec = resolve::classify(&req.input);
    let resolver = Resolver::new(cfg.serverless)?;
    let doc = resolver.resolve(&spec).await?;
    if doc.body.trim().is_empty() {
        return Err(Error::EmptyInput);
    }

    let policy = cfg.rank_policy();
    let backend = OllamaClient::new(reqwest::Client::new(), &cfg.embed);

    let plain_text = matches!(spec.kind, InputKind::InlineText)
        || (matches!(spec.kind, InputKind::Url | InputKind::File) && !looks_like_html(&doc.body));
    if plain_text {
        Ok(plain_text_result(req, &doc, &policy, &backend).await)
    } else {
        Ok(markup_result(req, &doc, &policy, &backend, cfg.serverless).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::get, Router};
    use std::net::SocketAddr;

    /// Lexical-only config: no embedding service is contacted.
    fn offline_cfg() -> PipelineConfig {
        PipelineConfig {
            serverless: true,
            force_embeddings: false,
            embed: EmbedConfig {
                base_url: "http://127.0.0.1:1".to_string(),
                model: "unused".to_string(),
                timeout_ms: 50,
            },
        }
    }

    fn request(input: &str, query: Option<&str>, top_k: usize) -> ExtractRequest {
        ExtractRequest {
            input: input.to_string(),
            query: query.map(|s| s.to_string()),
            top_k,
        }
    }

    fn fraud_article_html() -> String {
        let p1 = "Financial institutions have spent the last decade building layered \
controls that score every transaction for risk before it settles.";
        let p2 = "Banks increasingly pair biometric identity checks, from fingerprint \
matching to passive liveness detection, with velocity rules on high value transfers.";
        let p3 = "Analysts caution that fraud rings adapt quickly, recycling stolen \
credentials across merchants until a weak control lets them through.";
        format!(
            "<html><head><title>Sample - Fraud Detection</title></head><body>\n\
             <article>\n<p>{p1}</p>\n\n<p>{p2}</p>\n\n<p>{p3}</p>\n</article>\n\
             </body></html>"
        )
    }

    #[tokio::test]
    async fn end_to_end_markup_extraction_ranks_relevant_passages() {
        let req = request(&fraud_article_html(), Some("fraud biometric identity"), 6);
        let res = extract_relevant_article(&req, &offline_cfg()).await.unwrap();
        assert!(res.ok);
        assert_eq!(res.source_type, SourceType::Html);
        assert!(res.title.contains("Fraud"));
        assert!(res.article_text.contains("biometric"));
        assert!(!res.relevant_passages.is_empty());
        assert_eq!(res.ranking.method, rank::METHOD_LEXICAL);
        assert_eq!(
            res.ranking.warning.as_deref(),
            Some(rank::WARN_SERVERLESS_SKIP)
        );
        assert!(!res.blocked);
        // Every passage is a substring of the article body.
        for p in &res.relevant_passages {
            assert!(res.article_text.contains(&p.text));
        }
    }

    #[tokio::test]
    async fn empty_input_is_the_only_terminal_failure() {
        let err = extract_relevant_article(&request("", None, 6), &offline_cfg())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EmptyInput));
        assert_eq!(err.code(), "empty_input");

        let err = extract_relevant_article(&request("   \n  ", None, 6), &offline_cfg())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EmptyInput));
    }

    #[tokio::test]
    async fn plain_text_branch_segments_and_ranks_paragraphs() {
        let text = format!(
            "{}\n\n{}\n\n{}",
            "The quarterly report covers revenue growth across all regions in detail.",
            "Fraud losses declined after the rollout of device fingerprinting controls.",
            "Headcount stayed flat while infrastructure spending rose modestly this year."
        );
        let req = request(&text, Some("fraud controls"), 6);
        let res = extract_relevant_article(&req, &offline_cfg()).await.unwrap();
        assert!(res.ok);
        assert_eq!(res.source_type, SourceType::Text);
        assert!(res.title.is_empty());
        assert_eq!(
            res.paragraph_count,
            textprep::split_paragraphs(&res.article_text).len()
        );
        assert_eq!(res.paragraph_count, 3);
        for p in &res.relevant_passages {
            assert!(res.article_text.contains(&p.text));
        }
        // The fraud paragraph outranks the others lexically.
        assert!(res.relevant_passages[0].text.contains("Fraud losses"));
    }

    #[tokio::test]
    async fn plain_text_without_a_query_ranks_nothing() {
        let text = format!(
            "{}\n\n{}",
            "The quarterly report covers revenue growth across all regions in detail.",
            "Headcount stayed flat while infrastructure spending rose modestly this year."
        );
        let res = extract_relevant_article(&request(&text, None, 6), &offline_cfg())
            .await
            .unwrap();
        assert!(res.ok);
        assert_eq!(res.ranking.method, rank::METHOD_EMPTY);
        assert!(res.relevant_passages.is_empty());
        assert_eq!(res.paragraph_count, 2);
    }

    #[tokio::test]
    async fn blocked_content_is_flagged_not_failed() {
        let filler = "This site is protected against automated traffic and scrapers. "
            .repeat(8);
        let html = format!(
            "<html><head><title>Attention Required!</title></head><body>\n\
             <article>\n<p>Sign in to continue. Please enable JavaScript and cookies \
to continue browsing this website. {filler}</p>\n\
             <form><input name=\"user\"><input name=\"pass\"></form>\n</article>\n\
             </body></html>"
        );
        let req = request(&html, Some("article content"), 6);
        let res = extract_relevant_article(&req, &offline_cfg()).await.unwrap();
        assert!(res.ok);
        assert!(res.blocked);
        let warning = res.warning.expect("blocked results carry a warning");
        assert!(warning.contains("access-block"));
    }

    #[tokio::test]
    async fn url_inputs_flow_through_the_resolver() {
        let html = fraud_article_html();
        let app = Router::new().route("/story", get(move || async move { axum::response::Html(html) }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let url = format!("http://{addr}/story");
        let req = request(&url, Some("fraud biometric identity"), 4);
        let res = extract_relevant_article(&req, &offline_cfg()).await.unwrap();
        assert!(res.ok);
        assert_eq!(res.source_type, SourceType::Url);
        assert_eq!(res.source, url);
        assert_eq!(res.normalized_source.as_deref(), Some(url.as_str()));
        assert!(res.title.contains("Fraud"));
    }

    #[tokio::test]
    async fn view_source_prefix_is_stripped_before_classification() {
        let html = "<html><body><p>plain short page</p></body></html>".to_string();
        let app = Router::new().route("/", get(move || async move { axum::response::Html(html) }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let req = request(&format!("view-source:http://{addr}/"), None, 6);
        let res = extract_relevant_article(&req, &offline_cfg()).await.unwrap();
        assert_eq!(res.source_type, SourceType::Url);
        assert!(res.article_text.contains("plain short page"));
    }

    #[tokio::test]
    async fn passage_count_respects_the_clamp() {
        // top_k = 1 still composes up to 3 passages; top_k = 20 caps at 8.
        let paras: Vec<String> = (0..12)
            .map(|i| {
                format!(
                    "Paragraph number {i} talks about fraud detection pipelines in \
considerable and repetitive detail for testing purposes."
                )
            })
            .collect();
        let html = format!(
            "<html><body><article>\n<p>{}</p>\n</article></body></html>",
            paras.join("</p>\n\n<p>")
        );

        let res = extract_relevant_article(&request(&html, Some("fraud"), 1), &offline_cfg())
            .await
            .unwrap();
        assert!(res.relevant_passages.len() <= 3);

        let res = extract_relevant_article(&request(&html, Some("fraud"), 20), &offline_cfg())
            .await
            .unwrap();
        assert!(res.relevant_passages.len() <= 8);
    }

    #[test]
    fn compose_passages_falls_back_to_document_order() {
        let article = format!(
            "{}\n\n{}",
            "First paragraph of the article body with enough length to keep.",
            "Second paragraph of the article body, also long enough to keep."
        );
        // Ranked texts that match no paragraph prefix.
        let ranked = vec![RankedItem {
            index: 0,
            text: "completely different candidate text that matches nothing here".to_string(),
            score: 0.9,
        }];
        let out = compose_passages(&article, &ranked, 5);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|p| p.score == 0.0));
        assert!(out[0].text.starts_with("First paragraph"));
    }

    #[test]
    fn compose_passages_dedups_and_matches_by_containment() {
        let para = "A ranked candidate whose first eighty characters appear verbatim \
inside this exact paragraph of the article body.";
        let article = format!("{para}\n\nAnother long paragraph that is not referenced by any candidate at all.");
        let ranked = vec![
            RankedItem {
                index: 0,
                text: para.to_string(),
                score: 0.8,
            },
            // Same text again: containment hits the same paragraph, dedup skips it.
            RankedItem {
                index: 1,
                text: para.to_string(),
                score: 0.7,
            },
        ];
        let out = compose_passages(&article, &ranked, 5);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].score, 0.8);
        assert_eq!(out[0].text, para);
    }

    #[test]
    fn query_composition_prefers_the_explicit_query() {
        assert_eq!(
            compose_query(Some("explicit terms"), "Title", "Excerpt", "src"),
            "explicit terms"
        );
        assert_eq!(
            compose_query(Some("   "), "Title", "Excerpt", "src"),
            "Title Excerpt src"
        );
        assert_eq!(compose_query(None, "", "", ""), "");
    }
}
