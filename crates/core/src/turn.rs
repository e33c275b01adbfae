//! Turn domain types.
//!
//! A turn is one utterance in a stream. Turns are immutable once created:
//! the only lifecycle event is creation, and compaction later *references*
//! turns by number, never mutates them.

use crate::scope::StreamScope;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    /// The end user
    User,
    /// The AI assistant
    Assistant,
}

impl std::fmt::Display for TurnRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// A data-source citation attached to a turn. Informational only — never
/// consulted by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    /// Kind of source (e.g. "report", "dashboard", "ticket").
    pub source_type: String,

    /// How many items from that source were used.
    pub item_count: u32,

    /// Human-readable date range the items cover, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<String>,
}

/// One utterance in a stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Unique turn ID
    pub id: String,

    /// The stream this turn belongs to
    pub scope: StreamScope,

    /// Who sent it
    pub role: TurnRole,

    /// The text content
    pub content: String,

    /// Turn number, strictly increasing from 1 within the stream, no gaps
    pub number: u64,

    /// Wall-clock timestamp
    pub created_at: DateTime<Utc>,

    /// Citations used to produce this turn
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub citations: Vec<Citation>,
}

impl Turn {
    /// Create a new turn with a fresh id and the current timestamp.
    /// The store assigns `number` before persisting.
    pub fn new(
        scope: StreamScope,
        role: TurnRole,
        content: impl Into<String>,
        number: u64,
        citations: Vec<Citation>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            scope,
            role,
            content: content.into(),
            number,
            created_at: Utc::now(),
            citations,
        }
    }
}
