use anyhow::Result;
use clap::Parser;
use readrank_core::ExtractRequest;
use readrank_local::pipeline::{self, PipelineConfig};
use std::io::{IsTerminal, Read};
use std::path::PathBuf;

mod save;

#[derive(Parser, Debug)]
#[command(name = "readrank")]
#[command(
    about = "Extract the main article from a URL/HTML/text and rank the most relevant passages",
    long_about = None
)]
struct Cli {
    /// URL, view-source URL, raw HTML, plain text, or local file path.
    /// Read from stdin when omitted.
    #[arg(long, short = 'i')]
    input: Option<String>,

    /// Relevance query (auto-composed from title/excerpt/source if omitted).
    #[arg(long, short = 'q')]
    query: Option<String>,

    /// Number of relevant passages to keep (clamped to 1..=12).
    #[arg(long, default_value_t = 6)]
    top: usize,

    /// Optional additional JSON output file path.
    #[arg(long)]
    json_out: Option<PathBuf>,

    /// Optional additional text output file path.
    #[arg(long)]
    text_out: Option<PathBuf>,

    /// Artifact directory; both a .json and a .txt file are always written.
    #[arg(long, env = "READRANK_OUT_DIR", default_value = "extracted-articles")]
    out_dir: PathBuf,
}

fn read_stdin() -> String {
    if std::io::stdin().is_terminal() {
        return String::new();
    }
    let mut buf = String::new();
    let _ = std::io::stdin().read_to_string(&mut buf);
    buf
}

fn compact_text(s: &str, max_chars: usize) -> String {
    let t = s.split_whitespace().collect::<Vec<_>>().join(" ");
    if t.chars().count() <= max_chars {
        return t;
    }
    let head: String = t.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{head}...")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let input = match cli.input {
        Some(s) if !s.trim().is_empty() => s,
        _ => read_stdin(),
    };
    if input.trim().is_empty() {
        eprintln!("no input given; pass --input or pipe content on stdin");
        std::process::exit(1);
    }

    let req = ExtractRequest {
        input,
        query: cli.query,
        top_k: cli.top.clamp(1, 12),
    };
    let cfg = PipelineConfig::from_env();

    let result = match pipeline::extract_relevant_article(&req, &cfg).await {
        Ok(r) => r,
        Err(e) => {
            eprintln!("extraction failed: {}", e.code());
            std::process::exit(1);
        }
    };

    let saved = save::save_extraction_result(&result, &cli.out_dir)?;

    if let Some(path) = &cli.json_out {
        std::fs::write(path, serde_json::to_vec_pretty(&result)?)?;
    }
    if let Some(path) = &cli.text_out {
        std::fs::write(path, &saved.text_payload)?;
    }

    let mut lines: Vec<String> = Vec::new();
    lines.push(format!(
        "Title: {}",
        if result.title.is_empty() { "(none)" } else { result.title.as_str() }
    ));
    lines.push(format!(
        "Byline: {}",
        if result.byline.is_empty() { "(none)" } else { result.byline.as_str() }
    ));
    lines.push(format!(
        "Source: {}",
        result
            .normalized_source
            .as_deref()
            .unwrap_or(&result.source)
    ));
    let model_suffix = result
        .ranking
        .model
        .as_deref()
        .map(|m| format!(" ({m})"))
        .unwrap_or_default();
    lines.push(format!("Ranking: {}{model_suffix}", result.ranking.method));
    if let Some(w) = &result.warning {
        lines.push(format!("Warning: {w}"));
    }
    lines.push(format!("Paragraphs: {}", result.paragraph_count));
    lines.push(String::new());
    lines.push("Top relevant passages:".to_string());
    for (idx, p) in result.relevant_passages.iter().enumerate() {
        lines.push(format!(
            "{}. [{:.4}] {}",
            idx + 1,
            p.score,
            compact_text(&p.text, 280)
        ));
    }
    lines.push(String::new());
    lines.push("Saved files:".to_string());
    lines.push(format!("- {}", saved.json_path.display()));
    lines.push(format!("- {}", saved.text_path.display()));
    lines.push(String::new());
    lines.push("Extracted article preview:".to_string());
    lines.push(compact_text(&result.article_text, 1200));
    println!("{}", lines.join("\n"));

    Ok(())
}
