//! Artifact persistence for the CLI: every successful extraction writes a
//! JSON record and a plain-text rendition next to each other.

use readrank_core::ExtractionResult;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

const MAX_SLUG_CHARS: usize = 72;

#[derive(Debug, Clone)]
pub struct SavedArtifacts {
    pub json_path: PathBuf,
    pub text_path: PathBuf,
    pub text_payload: String,
}

/// Filesystem-safe slug: lowercase, non-alphanumeric runs become one dash.
fn safe_slug(raw: &str, fallback: &str) -> String {
    let mut out = String::new();
    let mut pending_dash = false;
    for ch in raw.chars() {
        if out.len() >= MAX_SLUG_CHARS {
            break;
        }
        let c = ch.to_ascii_lowercase();
        if c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c);
        } else {
            pending_dash = true;
        }
    }
    if out.is_empty() {
        fallback.to_string()
    } else {
        out
    }
}

fn epoch_s() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

pub fn save_extraction_result(
    result: &ExtractionResult,
    out_dir: &Path,
) -> std::io::Result<SavedArtifacts> {
    std::fs::create_dir_all(out_dir)?;

    let base = format!("{}__{}", epoch_s(), safe_slug(&result.title, "article"));
    let json_path = out_dir.join(format!("{base}.json"));
    let text_path = out_dir.join(format!("{base}.txt"));
    let text_payload = format!("{}\n\n{}\n", result.title, result.article_text);

    let json = serde_json::to_vec_pretty(result).map_err(std::io::Error::from)?;
    std::fs::write(&json_path, json)?;
    std::fs::write(&text_path, &text_payload)?;

    Ok(SavedArtifacts {
        json_path,
        text_path,
        text_payload,
    })
}
