use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("empty input")]
    EmptyInput,
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("embedding failed: {0}")]
    Embedding(String),
    #[error("io error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Stable machine-readable code for collaborator-facing error records.
    pub fn code(&self) -> &'static str {
        match self {
            Error::EmptyInput => "empty_input",
            Error::InvalidUrl(_) => "invalid_url",
            Error::Fetch(_) => "failed_to_fetch_url",
            Error::Timeout(_) => "timeout",
            Error::Embedding(_) => "embedding_failed",
            Error::Io(_) => "io_error",
        }
    }
}

/// How the raw input string was classified, before any I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InputKind {
    Url,
    File,
    InlineHtml,
    InlineText,
}

/// Classified input, derived once per request. `raw` is the trimmed input
/// with any `view-source:` prefix already stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSpec {
    pub kind: InputKind,
    pub raw: String,
}

/// Strip the `view-source:` prefix and surrounding whitespace.
pub fn normalize_input(raw: &str) -> String {
    let text = raw.trim();
    match text.strip_prefix("view-source:") {
        Some(rest) => rest.trim().to_string(),
        None => text.to_string(),
    }
}

/// Markup sniff over the structural tokens that matter for extraction.
pub fn looks_like_html(s: &str) -> bool {
    let s = s.to_lowercase();
    if s.is_empty() {
        return false;
    }
    s.contains("<html")
        || s.contains("<body")
        || s.contains("<article")
        || s.contains("<main")
        || s.contains("<p>")
}

fn is_http_url(s: &str) -> bool {
    match url::Url::parse(s) {
        Ok(u) => matches!(u.scheme(), "http" | "https"),
        Err(_) => false,
    }
}

/// Classify a raw input string.
///
/// `file_exists` is injected so classification stays a pure function of its
/// arguments (the resolver passes a real filesystem probe).
pub fn classify_input(raw: &str, file_exists: impl Fn(&str) -> bool) -> InputSpec {
    let normalized = normalize_input(raw);
    let kind = if is_http_url(&normalized) {
        InputKind::Url
    } else if !normalized.is_empty() && file_exists(&normalized) {
        InputKind::File
    } else if looks_like_html(&normalized) {
        InputKind::InlineHtml
    } else {
        InputKind::InlineText
    };
    InputSpec {
        kind,
        raw: normalized,
    }
}

/// Where the resolved body came from, as recorded in the result artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Url,
    File,
    Html,
    Text,
}

/// Resolved input: the body the pipeline analyzes plus provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchedDocument {
    pub source_type: SourceType,
    pub source: String,
    pub body: String,
}

/// One ranked candidate or paragraph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedItem {
    /// Position in the original candidate list, before sorting.
    pub index: usize,
    pub text: String,
    pub score: f32,
}

/// One selected passage in the final result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passage {
    pub score: f32,
    pub text: String,
}

/// How the ranking was produced (and whether it degraded).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingInfo {
    pub method: String,
    pub model: Option<String>,
    pub warning: Option<String>,
}

/// The unit persisted and returned by the pipeline. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub ok: bool,
    pub source_type: SourceType,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized_source: Option<String>,
    pub title: String,
    pub byline: String,
    pub excerpt: String,
    pub article_text: String,
    pub paragraph_count: usize,
    pub relevant_passages: Vec<Passage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidates_analyzed: Option<usize>,
    pub blocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    pub ranking: RankingInfo,
}

/// One extraction request, as handed over by CLI/API collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractRequest {
    pub input: String,
    pub query: Option<String>,
    pub top_k: usize,
}

impl ExtractRequest {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            query: None,
            top_k: 6,
        }
    }
}

/// A remote (or mocked) embedding capability.
///
/// Implementations must return a non-empty vector or an error; the ranker
/// treats any failure as a signal to fall back to lexical scoring.
#[async_trait::async_trait]
pub trait EmbeddingBackend: Send + Sync {
    fn model(&self) -> &str;
    async fn embed(&self, prompt: &str) -> Result<Vec<f32>>;
}
