pub mod blockpage;
pub mod candidates;
pub mod cloudscrape;
pub mod ollama;
pub mod pipeline;
pub mod rank;
pub mod resolve;
pub mod shellout;
pub mod textprep;

pub use pipeline::{extract_relevant_article, PipelineConfig};
