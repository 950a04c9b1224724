//! Candidate "main content" extraction from markup.
//!
//! Two complementary techniques feed one deduplicated, priority-ordered
//! list: a structural reading-view pass (best content container by
//! text-density score, plus title/byline/excerpt harvesting) and a sweep
//! over well-known content-region selectors. If nothing survives, the
//! whole-document text becomes the sole candidate, so the extractor never
//! returns an empty list for non-empty input.

use crate::textprep;
use std::collections::HashSet;
use std::io::Cursor;

/// Floor for a block to count as article material rather than chrome.
pub const MIN_CANDIDATE_CHARS: usize = 350;
/// Raw candidate cap for the selector sweep.
const MAX_RAW_CANDIDATES: usize = 30;
/// Prefix length of the dedup fingerprint.
const DEDUP_PREFIX_CHARS: usize = 240;

/// Priority-ordered content-region selectors: semantic containers first,
/// then microdata markers, then common CMS class/id patterns.
const CANDIDATE_SELECTORS: [&str; 11] = [
    "article",
    "[itemprop='articleBody']",
    "main article",
    "main",
    ".article-body",
    ".article-content",
    ".story-body",
    ".post-content",
    ".entry-content",
    "#article-body",
    "#content",
];

/// Structured reading view of a document.
#[derive(Debug, Clone)]
pub struct ReadingView {
    pub title: String,
    pub byline: String,
    pub excerpt: String,
    pub text: String,
}

/// Everything the markup branch of the pipeline needs from one parse.
#[derive(Debug, Clone)]
pub struct CandidateSet {
    /// Deduplicated candidate texts, extraction-method priority order.
    pub candidates: Vec<String>,
    pub reading_view: Option<ReadingView>,
    /// Title straight from the DOM (h1, then `<title>`), as a fallback when
    /// the reading view has none.
    pub dom_title: String,
}

fn single_line(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Concatenated descendant text, keeping the document's own whitespace so
/// paragraph boundaries in the source survive normalization.
fn element_text(el: &html_scraper::ElementRef) -> String {
    el.text().collect::<String>()
}

fn element_text_chars(el: &html_scraper::ElementRef) -> usize {
    el.text().map(|t| t.chars().count()).sum()
}

fn element_link_text_chars(el: &html_scraper::ElementRef) -> usize {
    let sel = html_scraper::Selector::parse("a").ok();
    let Some(sel) = sel else { return 0 };
    el.select(&sel)
        .map(|a| a.text().map(|t| t.chars().count()).sum::<usize>())
        .sum()
}

fn class_or_id_lc(el: &html_scraper::ElementRef) -> String {
    let mut out = String::new();
    if let Some(c) = el.value().attr("class") {
        out.push_str(c);
        out.push(' ');
    }
    if let Some(i) = el.value().attr("id") {
        out.push_str(i);
    }
    out.to_ascii_lowercase()
}

fn is_generic_boilerplate_container(el: &html_scraper::ElementRef) -> bool {
    // Keep this generic: structural UI words only, no site heuristics.
    let s = class_or_id_lc(el);
    if s.is_empty() {
        return false;
    }
    for bad in [
        "nav",
        "navbar",
        "menu",
        "sidebar",
        "footer",
        "header",
        "banner",
        "cookie",
        "consent",
        "ads",
        "advert",
        "promo",
        "subscribe",
        "newsletter",
    ] {
        if s.contains(bad) {
            return true;
        }
    }
    false
}

fn first_text(doc: &html_scraper::Html, selector: &str) -> Option<String> {
    let sel = html_scraper::Selector::parse(selector).ok()?;
    let el = doc.select(&sel).next()?;
    let t = single_line(&element_text(&el));
    (!t.is_empty()).then_some(t)
}

fn first_attr(doc: &html_scraper::Html, selector: &str, attr: &str) -> Option<String> {
    let sel = html_scraper::Selector::parse(selector).ok()?;
    let el = doc.select(&sel).next()?;
    let v = el.value().attr(attr)?.trim().to_string();
    (!v.is_empty()).then_some(v)
}

/// Best content container by score: dense non-link text wins, semantic
/// article/main tags get a bonus, link-heavy blocks get pushed down.
fn best_content_text(doc: &html_scraper::Html, max_elems: usize) -> Option<String> {
    let sel = html_scraper::Selector::parse("article, main, section, div").ok()?;
    let mut seen = 0usize;
    let mut best_score: i64 = 0;
    let mut best_text: Option<String> = None;

    for el in doc.select(&sel) {
        seen += 1;
        if seen > max_elems {
            break;
        }
        if is_generic_boilerplate_container(&el) {
            continue;
        }
        let txt = element_text_chars(&el);
        if txt < 20 {
            continue;
        }
        let link_txt = element_link_text_chars(&el);
        let mut score = txt as i64 - 2 * (link_txt as i64);
        let tag = el.value().name();
        if tag == "article" {
            score += 500;
        } else if tag == "main" {
            score += 300;
        }
        if link_txt > txt / 2 {
            score -= 500;
        }
        if score > best_score {
            best_score = score;
            best_text = Some(textprep::normalize_whitespace(&element_text(&el)));
        }
    }

    best_text
}

fn reading_view_from_doc(doc: &html_scraper::Html) -> Option<ReadingView> {
    let text = best_content_text(doc, 20_000)?;
    if text.chars().count() < MIN_CANDIDATE_CHARS {
        return None;
    }
    let title = first_text(doc, "h1")
        .or_else(|| first_text(doc, "title"))
        .or_else(|| first_attr(doc, "meta[property='og:title']", "content"))
        .unwrap_or_default();
    let byline = first_attr(doc, "meta[name='author']", "content")
        .or_else(|| first_text(doc, "[rel='author']"))
        .or_else(|| first_text(doc, ".byline"))
        .unwrap_or_default();
    let excerpt = first_attr(doc, "meta[name='description']", "content")
        .or_else(|| first_attr(doc, "meta[property='og:description']", "content"))
        .unwrap_or_default();
    Some(ReadingView {
        title: single_line(&title),
        byline: single_line(&byline),
        excerpt: single_line(&excerpt),
        text,
    })
}

fn dom_title_from_doc(doc: &html_scraper::Html) -> String {
    first_text(doc, "h1")
        .or_else(|| first_text(doc, "title"))
        .unwrap_or_default()
}

fn fingerprint(text: &str) -> String {
    text.chars().take(DEDUP_PREFIX_CHARS).collect()
}

pub(crate) fn meets_candidate_floor(text: &str) -> bool {
    text.chars().count() >= MIN_CANDIDATE_CHARS
}

/// Selector sweep: normalize each match, keep long blocks, stop at the raw
/// cap. Dedups within the sweep; the cross-technique dedup happens later.
fn collect_selector_candidates(doc: &html_scraper::Html) -> Vec<String> {
    let mut out = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for selector in CANDIDATE_SELECTORS {
        let Ok(sel) = html_scraper::Selector::parse(selector) else {
            continue;
        };
        for el in doc.select(&sel) {
            let text = textprep::normalize_whitespace(&element_text(&el));
            if !meets_candidate_floor(&text) {
                continue;
            }
            let key = fingerprint(&text);
            if seen.contains(&key) {
                continue;
            }
            seen.insert(key);
            out.push(text);
            if out.len() >= MAX_RAW_CANDIDATES {
                return out;
            }
        }
    }
    out
}

fn dedup_by_prefix(raw: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();
    for c in raw {
        let key = fingerprint(&c);
        if seen.contains(&key) {
            continue;
        }
        seen.insert(key);
        out.push(c);
    }
    out
}

/// Whole-document text, for when no structured candidate survives.
fn full_body_fallback(html: &str) -> String {
    let rendered = html2text::from_read(Cursor::new(html.as_bytes()), 100)
        .unwrap_or_else(|_| html.to_string());
    let text = textprep::normalize_whitespace(&rendered);
    if text.is_empty() {
        textprep::normalize_whitespace(html)
    } else {
        text
    }
}

/// Extract the candidate set from a document.
pub fn extract_candidates(html: &str, base_url: &str) -> CandidateSet {
    let _ = base_url; // reserved for extractors that resolve relative content
    let doc = html_scraper::Html::parse_document(html);

    let reading_view = reading_view_from_doc(&doc);
    let dom_title = dom_title_from_doc(&doc);

    // Reading-view text first: it is the highest-trust extraction, and the
    // prefix dedup keeps the first occurrence.
    let mut raw = Vec::new();
    if let Some(rv) = &reading_view {
        raw.push(rv.text.clone());
    }
    raw.extend(collect_selector_candidates(&doc));

    let mut candidates = dedup_by_prefix(raw);
    if candidates.is_empty() {
        candidates.push(full_body_fallback(html));
    }

    CandidateSet {
        candidates,
        reading_view,
        dom_title,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article_page(body: &str) -> String {
        format!(
            "<html><head><title>Page Title</title>\
             <meta name=\"description\" content=\"A short excerpt.\">\
             <meta name=\"author\" content=\"Ada Writer\">\
             </head><body><article>{body}</article></body></html>"
        )
    }

    #[test]
    fn candidate_floor_is_exactly_350_chars() {
        assert!(!meets_candidate_floor(&"x".repeat(349)));
        assert!(meets_candidate_floor(&"x".repeat(350)));
    }

    #[test]
    fn identical_article_blocks_dedup_to_one_candidate() {
        let block = "w".repeat(400);
        let html = format!(
            "<html><body><article>{block}</article><article>{block}</article></body></html>"
        );
        let set = extract_candidates(&html, "");
        let hits = set
            .candidates
            .iter()
            .filter(|c| c.starts_with("www"))
            .count();
        assert_eq!(hits, 1);
    }

    #[test]
    fn reading_view_text_comes_first() {
        let long = "sentence of article prose repeated over and over. ".repeat(12);
        let html = article_page(&long);
        let set = extract_candidates(&html, "");
        let rv = set.reading_view.expect("reading view");
        assert_eq!(set.candidates[0], rv.text);
        assert_eq!(rv.title, "Page Title");
        assert_eq!(rv.byline, "Ada Writer");
        assert_eq!(rv.excerpt, "A short excerpt.");
    }

    #[test]
    fn short_articles_are_rejected_and_fall_back_to_full_body() {
        let html = "<html><body><p>tiny</p></body></html>";
        let set = extract_candidates(html, "");
        assert!(set.reading_view.is_none());
        assert_eq!(set.candidates.len(), 1);
        assert!(set.candidates[0].contains("tiny"));
    }

    #[test]
    fn boundary_349_block_is_not_a_selector_candidate() {
        let short = "s".repeat(349);
        let long = format!("{} {}", "long article prose".repeat(20), "marker");
        let html = format!(
            "<html><body><article class=\"a\">{short}</article>\
             <article class=\"b\">{long}</article></body></html>"
        );
        let set = extract_candidates(&html, "");
        assert!(set.candidates.iter().any(|c| c.contains("marker")));
        assert!(!set.candidates.iter().any(|c| c.starts_with("sss")));
    }

    #[test]
    fn dom_title_prefers_h1_over_title_tag() {
        let html = "<html><head><title>Tab Title</title></head>\
                    <body><h1>Headline</h1><p>text</p></body></html>";
        let doc = html_scraper::Html::parse_document(html);
        assert_eq!(dom_title_from_doc(&doc), "Headline");

        let html = "<html><head><title>Tab Title</title></head><body><p>x</p></body></html>";
        let doc = html_scraper::Html::parse_document(html);
        assert_eq!(dom_title_from_doc(&doc), "Tab Title");
    }

    #[test]
    fn boilerplate_containers_do_not_win_the_reading_view() {
        let nav_soup = "<a href=\"/a\">link one</a> ".repeat(60);
        let prose = "calm readable paragraph text with no links at all. ".repeat(12);
        let html = format!(
            "<html><body><div class=\"sidebar\">{nav_soup}</div>\
             <article>{prose}</article></body></html>"
        );
        let set = extract_candidates(&html, "");
        let rv = set.reading_view.expect("reading view");
        assert!(rv.text.contains("calm readable"));
        assert!(!rv.text.contains("link one"));
    }

    #[test]
    fn selector_sweep_respects_priority_order() {
        let article = format!("{} article-first", "alpha prose text ".repeat(30));
        let cms = format!("{} cms-second", "beta prose text ".repeat(30));
        let html = format!(
            "<html><body><div class=\"entry-content\">{cms}</div>\
             <article>{article}</article></body></html>"
        );
        let doc = html_scraper::Html::parse_document(&html);
        let swept = collect_selector_candidates(&doc);
        assert!(swept.len() >= 2);
        assert!(swept[0].contains("article-first"));
    }
}
