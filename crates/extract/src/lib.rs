//! Extractor implementations for Memline.
//!
//! Both implement the `memline_core::Extractor` trait; the engine never
//! branches on which one it holds. Selection happens here, from config.

pub mod heuristic;
pub mod llm;

pub use heuristic::HeuristicExtractor;
pub use llm::LlmExtractor;

use memline_config::ExtractorConfig;
use memline_core::Extractor;
use std::sync::Arc;

/// Build the configured extractor.
///
/// Callers should have run `AppConfig::validate()` first; an "llm" backend
/// without a key falls back to the heuristic extractor with a warning
/// rather than panicking.
pub fn from_config(config: &ExtractorConfig) -> Arc<dyn Extractor> {
    match config.backend.as_str() {
        "llm" => match &config.api_key {
            Some(key) => Arc::new(
                LlmExtractor::new(key.clone())
                    .with_base_url(&config.api_url)
                    .with_model(&config.model)
                    .with_timeout_secs(config.timeout_secs),
            ),
            None => {
                tracing::warn!("LLM extractor selected but no API key set, using heuristic");
                Arc::new(HeuristicExtractor::new())
            }
        },
        _ => Arc::new(HeuristicExtractor::new()),
    }
}
