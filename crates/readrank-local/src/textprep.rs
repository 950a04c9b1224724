//! Minimal, deterministic text normalization helpers.
//!
//! Every downstream stage (candidate extraction, ranking, passage
//! composition) goes through these, so normalization must be stable:
//! same input, same output, no locale or environment dependence.

/// Collapse noisy whitespace while keeping paragraph structure.
///
/// - carriage returns are dropped
/// - runs of spaces/tabs collapse to one space
/// - runs of 3+ newlines collapse to exactly two
/// - the ends are trimmed
pub fn normalize_whitespace(s: &str) -> String {
    let mut collapsed = String::with_capacity(s.len());
    let mut in_gap = false;
    for ch in s.chars() {
        match ch {
            '\r' => {}
            ' ' | '\t' => {
                if !in_gap {
                    collapsed.push(' ');
                    in_gap = true;
                }
            }
            _ => {
                collapsed.push(ch);
                in_gap = false;
            }
        }
    }

    let mut out = String::with_capacity(collapsed.len());
    let mut newline_run = 0usize;
    for ch in collapsed.chars() {
        if ch == '\n' {
            newline_run += 1;
            if newline_run <= 2 {
                out.push(ch);
            }
        } else {
            newline_run = 0;
            out.push(ch);
        }
    }
    out.trim().to_string()
}

/// Paragraph floor: anything shorter is nav/caption noise, not prose.
const MIN_PARAGRAPH_CHARS: usize = 40;

/// Split normalized text on blank-line boundaries into trimmed paragraphs.
///
/// Segments under 40 characters are discarded. Bounded by input size and
/// restartable (plain `Vec`, nothing lazy).
pub fn split_paragraphs(s: &str) -> Vec<String> {
    normalize_whitespace(s)
        .split("\n\n")
        .map(|p| p.trim())
        .filter(|p| p.chars().count() >= MIN_PARAGRAPH_CHARS)
        .map(|p| p.to_string())
        .collect()
}
