//! Input classification and resolution.
//!
//! Non-URL inputs resolve directly (file read, inline passthrough). URL
//! inputs go through an escalating fetch chain with explicit, auditable
//! guards between tiers:
//!
//! 1. direct GET (browser-like user agent, HTML accept header)
//! 2. `curl` fallback when tier 1 fails (more tolerant of TLS/anti-bot quirks)
//! 3. challenge-solver subprocess, only when the body looks blocked and the
//!    runtime allows subprocesses; its failure keeps the blocked body and is
//!    surfaced downstream as a warning, never a hard error.

use crate::{blockpage, cloudscrape, shellout};
use futures_util::StreamExt;
use readrank_core::{
    classify_input, Error, FetchedDocument, InputKind, InputSpec, Result, SourceType,
};
use std::time::Duration;

pub const BROWSER_UA: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0 Safari/537.36";
const ACCEPT_HTML: &str = "text/html,application/xhtml+xml";
/// Hard cap on bytes read from any tier.
const MAX_BODY_BYTES: usize = 15 * 1024 * 1024;
/// curl's own budget; the runner gets a little slack on top.
const CURL_MAX_TIME_S: u64 = 40;

/// Classify a raw input string against the real filesystem.
pub fn classify(raw: &str) -> InputSpec {
    classify_input(raw, |p| std::path::Path::new(p).is_file())
}

/// Escalation guard for the challenge-solver tier, kept separate so tier
/// order and guards stay testable in isolation.
pub fn should_try_challenge_solver(body: &str, serverless: bool) -> bool {
    blockpage::body_looks_blocked(body) && !serverless
}

pub(crate) fn curl_command(url: &str) -> std::process::Command {
    let mut cmd = std::process::Command::new("curl");
    cmd.args([
        "-L",
        "--compressed",
        "--max-time",
        &CURL_MAX_TIME_S.to_string(),
        "-A",
        BROWSER_UA,
    ])
    .arg(url);
    cmd
}

fn curl_fetch(url: &str) -> Result<String> {
    let out = shellout::run_stdout_bounded(
        curl_command(url),
        Duration::from_secs(CURL_MAX_TIME_S + 5),
        MAX_BODY_BYTES,
    )
    .map_err(|code| Error::Fetch(format!("curl fallback: {code}")))?;
    let body = String::from_utf8_lossy(&out).to_string();
    if body.trim().is_empty() {
        return Err(Error::Fetch("curl fallback: empty body".to_string()));
    }
    Ok(body)
}

#[derive(Debug, Clone)]
pub struct Resolver {
    client: reqwest::Client,
    serverless: bool,
}

impl Resolver {
    pub fn new(serverless: bool) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(BROWSER_UA)
            .redirect(reqwest::redirect::Policy::limited(10))
            // Safety defaults: never hang forever on DNS/TLS/body stalls.
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Fetch(e.to_string()))?;
        Ok(Self { client, serverless })
    }

    /// Resolve a classified input into a document. Fails only when no
    /// content could be obtained at all.
    pub async fn resolve(&self, spec: &InputSpec) -> Result<FetchedDocument> {
        match spec.kind {
            InputKind::Url => self.resolve_url(&spec.raw).await,
            InputKind::File => {
                let path = spec.raw.clone();
                let source = std::fs::canonicalize(&path)
                    .map(|p| p.to_string_lossy().to_string())
                    .unwrap_or_else(|_| path.clone());
                let body = tokio::task::spawn_blocking(move || std::fs::read_to_string(&path))
                    .await
                    .map_err(|e| Error::Io(format!("file read join failed: {e}")))?
                    .map_err(|e| Error::Io(e.to_string()))?;
                Ok(FetchedDocument {
                    source_type: SourceType::File,
                    source,
                    body,
                })
            }
            InputKind::InlineHtml => Ok(FetchedDocument {
                source_type: SourceType::Html,
                source: "inline".to_string(),
                body: spec.raw.clone(),
            }),
            InputKind::InlineText => Ok(FetchedDocument {
                source_type: SourceType::Text,
                source: "inline".to_string(),
                body: spec.raw.clone(),
            }),
        }
    }

    async fn direct_fetch(&self, url_s: &str) -> Result<String> {
        let resp = self
            .client
            .get(url_s)
            .header(reqwest::header::ACCEPT, ACCEPT_HTML)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(format!("direct fetch: {e}"))
                } else {
                    Error::Fetch(e.to_string())
                }
            })?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Fetch(format!("http status {status}")));
        }

        let mut bytes: Vec<u8> = Vec::new();
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Error::Fetch(e.to_string()))?;
            if bytes.len().saturating_add(chunk.len()) > MAX_BODY_BYTES {
                let can_take = MAX_BODY_BYTES.saturating_sub(bytes.len());
                bytes.extend_from_slice(&chunk[..can_take]);
                break;
            }
            bytes.extend_from_slice(&chunk);
        }
        Ok(String::from_utf8_lossy(&bytes).to_string())
    }

    async fn resolve_url(&self, url_s: &str) -> Result<FetchedDocument> {
        url::Url::parse(url_s).map_err(|e| Error::InvalidUrl(e.to_string()))?;

        // Tier 1 → tier 2: curl runs only when the direct fetch failed
        // (transport error, timeout, or non-success status).
        let mut body = match self.direct_fetch(url_s).await {
            Ok(body) => body,
            Err(tier1) => {
                let url2 = url_s.to_string();
                tokio::task::spawn_blocking(move || curl_fetch(&url2))
                    .await
                    .map_err(|e| Error::Fetch(format!("curl join failed: {e}")))?
                    .map_err(|tier2| {
                        Error::Fetch(format!("direct fetch failed ({tier1}); {tier2}"))
                    })?
            }
        };

        // Tier 3: challenge solver, guarded. A failure here keeps the
        // blocked body; the pipeline turns that into a warning.
        if should_try_challenge_solver(&body, self.serverless) {
            let url2 = url_s.to_string();
            let solved =
                tokio::task::spawn_blocking(move || cloudscrape::Cloudscrape::from_env().fetch(&url2))
                    .await;
            if let Ok(Ok(cf_body)) = solved {
                if !cf_body.trim().is_empty() {
                    body = cf_body;
                }
            }
        }

        Ok(FetchedDocument {
            source_type: SourceType::Url,
            source: url_s.to_string(),
            body,
        })
    }
}
