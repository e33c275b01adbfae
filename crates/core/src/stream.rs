//! Stream index record — the per-scope pointer structure.
//!
//! A stream owns its turn-number space and its recent-turns window (a
//! bounded suffix of turn references). Facts and compacted summaries are
//! referenced by id, never embedded, so supersession and compaction don't
//! rewrite the stream record beyond index updates.

use crate::scope::StreamScope;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A lightweight reference from the stream index into the turn store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnRef {
    /// The referenced turn's id
    pub turn_id: String,
    /// The referenced turn's number within the stream
    pub number: u64,
}

/// Per-stream index: recent turn refs, rolling summary, fact ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamRecord {
    /// Unique stream ID
    pub id: String,

    /// The scope this stream serves
    pub scope: StreamScope,

    /// References to recent, not-yet-compacted turns, oldest first.
    /// Never contains a number already covered by a compacted summary.
    pub recent_turns: Vec<TurnRef>,

    /// Rolling summary text (empty until the first compaction)
    #[serde(default)]
    pub summary: String,

    /// Ids of hard facts belonging to this stream, in creation order
    #[serde(default)]
    pub fact_ids: Vec<String>,

    /// When the last compaction completed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_compaction: Option<DateTime<Utc>>,

    /// The number the next appended turn will receive (starts at 1)
    pub next_turn: u64,

    /// When this stream was lazily created
    pub created_at: DateTime<Utc>,
}

impl StreamRecord {
    /// Create a fresh stream record for a scope. Called lazily by stores
    /// on the first turn in that scope.
    pub fn new(scope: StreamScope) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            scope,
            recent_turns: Vec::new(),
            summary: String::new(),
            fact_ids: Vec::new(),
            last_compaction: None,
            next_turn: 1,
            created_at: Utc::now(),
        }
    }

    /// Current size of the recent-turns window.
    pub fn window_size(&self) -> usize {
        self.recent_turns.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_stream_starts_at_turn_one() {
        let s = StreamRecord::new(StreamScope::Global);
        assert_eq!(s.next_turn, 1);
        assert_eq!(s.window_size(), 0);
        assert!(s.summary.is_empty());
        assert!(s.last_compaction.is_none());
    }

    #[test]
    fn serialization_roundtrip() {
        let mut s = StreamRecord::new(StreamScope::project("p9"));
        s.recent_turns.push(TurnRef { turn_id: "t1".into(), number: 1 });
        s.summary = "earlier discussion about rollout".into();

        let json = serde_json::to_string(&s).unwrap();
        let back: StreamRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.recent_turns.len(), 1);
        assert_eq!(back.summary, s.summary);
    }
}
