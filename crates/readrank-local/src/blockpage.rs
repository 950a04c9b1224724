//! Fixed access-block heuristics.
//!
//! A small set of case-insensitive substring checks for bot-challenge and
//! access-denial pages. This is a best-effort signal, not a security
//! boundary: it gates the challenge-solver fetch tier and sets the
//! `blocked`/`warning` fields on results, and nothing else.

/// Does a raw fetched body look like a challenge/denial page?
pub fn body_looks_blocked(html: &str) -> bool {
    let s = html.to_lowercase();
    if s.is_empty() {
        return false;
    }
    if s.contains("attention required") && s.contains("cloudflare") {
        return true;
    }
    if s.contains("just a moment...") && s.contains("cloudflare") {
        return true;
    }
    if s.contains("why have i been blocked") {
        return true;
    }
    s.contains("enable javascript and cookies")
}

/// Re-check at the content level: a blocked page can still parse into a
/// short plausible "article", so the composed title/text get a second look.
pub fn content_looks_blocked(title: &str, text: &str) -> bool {
    let t = title.to_lowercase();
    let b = text.to_lowercase();
    if t.contains("attention required") && b.contains("cloudflare") {
        return true;
    }
    if b.contains("why have i been blocked") && b.contains("security service") {
        return true;
    }
    b.contains("enable javascript and cookies")
}
