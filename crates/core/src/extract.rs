//! Extractor trait — the external fact-extraction / summarization seam.
//!
//! The engine never branches on which extractor it holds: LLM-backed and
//! heuristic implementations are interchangeable behind this trait and are
//! selected by configuration. Both operations may fail or time out; callers
//! treat failure as "no facts produced" / "compaction aborted", never as
//! fatal to their own operation.

use crate::error::ExtractError;
use crate::fact::FactCategory;
use crate::scope::StreamScope;
use crate::turn::Turn;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A fact candidate proposed by an extractor, before the confidence filter
/// and conflict resolution have run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateFact {
    /// The claim text
    pub text: String,

    /// What kind of claim this is
    pub category: FactCategory,

    /// Extractor confidence in [0.0, 1.0]
    pub confidence: f32,

    /// Identity of the mutable attribute this describes, if any
    /// (e.g. `person:marcus:role`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict_key: Option<String>,
}

/// The fact extractor / summarizer capability.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// The extractor name (e.g., "llm", "heuristic", "manual").
    fn name(&self) -> &str;

    /// Detect candidate hard facts in a piece of dialogue.
    async fn extract_facts(
        &self,
        text: &str,
        scope: &StreamScope,
    ) -> std::result::Result<Vec<CandidateFact>, ExtractError>;

    /// Produce a narrative summary of a run of turns, preserving
    /// operationally relevant content (ownership changes, decisions,
    /// deadlines).
    async fn summarize(&self, turns: &[Turn]) -> std::result::Result<String, ExtractError>;
}
