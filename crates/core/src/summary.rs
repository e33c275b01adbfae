//! Compacted summaries — rolled-up narratives over closed turn ranges.
//!
//! Created only by the compaction engine, append-only. Within a stream the
//! ranges are contiguous and non-overlapping over time, so the union of all
//! summary ranges plus the current window covers every turn exactly once.

use crate::scope::StreamScope;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A narrative covering turns `[turn_range_start, turn_range_end]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactedSummary {
    /// Unique summary ID
    pub id: String,

    /// Owning stream scope
    pub scope: StreamScope,

    /// The summary text produced by the summarizer
    pub text: String,

    /// First turn number covered (inclusive)
    pub turn_range_start: u64,

    /// Last turn number covered (inclusive)
    pub turn_range_end: u64,

    /// When compaction produced this summary
    pub created_at: DateTime<Utc>,
}

impl CompactedSummary {
    pub fn new(
        scope: StreamScope,
        text: impl Into<String>,
        turn_range_start: u64,
        turn_range_end: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            scope,
            text: text.into(),
            turn_range_start,
            turn_range_end,
            created_at: Utc::now(),
        }
    }

    /// Number of turns this summary covers.
    pub fn span(&self) -> u64 {
        self.turn_range_end - self.turn_range_start + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_is_inclusive() {
        let s = CompactedSummary::new(StreamScope::Global, "early history", 1, 20);
        assert_eq!(s.span(), 20);
    }
}
