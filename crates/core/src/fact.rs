//! Hard facts — permanent, supersedable atomic claims.
//!
//! A hard fact is never edited or deleted. Correcting one means inserting a
//! successor with `supersedes` pointing at the old fact and flipping the old
//! fact's `active` flag in the same mutation. Query access is filtered to
//! `active = true` unless explicitly auditing history.

use crate::scope::StreamScope;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Category of a hard fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactCategory {
    /// Someone's role was stated or corrected
    RoleCorrection,
    /// Work was assigned to someone
    Assignment,
    /// A deadline was set or moved
    Deadline,
    /// A decision was made
    Decision,
    /// Org structure (teams, reporting lines)
    Organizational,
    /// A durable fact about the project itself
    ProjectFact,
    /// A user preference
    Preference,
    /// Something is blocked
    Blocker,
}

impl FactCategory {
    /// Stable string form used in storage and the CLI.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoleCorrection => "role_correction",
            Self::Assignment => "assignment",
            Self::Deadline => "deadline",
            Self::Decision => "decision",
            Self::Organizational => "organizational",
            Self::ProjectFact => "project_fact",
            Self::Preference => "preference",
            Self::Blocker => "blocker",
        }
    }

    /// Parse the `as_str()` form.
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "role_correction" => Self::RoleCorrection,
            "assignment" => Self::Assignment,
            "deadline" => Self::Deadline,
            "decision" => Self::Decision,
            "organizational" => Self::Organizational,
            "project_fact" => Self::ProjectFact,
            "preference" => Self::Preference,
            "blocker" => Self::Blocker,
            _ => return None,
        })
    }
}

/// Where a fact came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provenance {
    /// The turn that produced this fact, if extracted from conversation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_id: Option<String>,

    /// Extraction confidence (1.0 for human corrections)
    pub confidence: f32,

    /// Which extractor produced it ("llm", "heuristic", "manual")
    pub extractor: String,
}

/// An atomic, permanent claim scoped to one stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HardFact {
    /// Unique fact ID
    pub id: String,

    /// Owning stream scope
    pub scope: StreamScope,

    /// The claim itself
    pub text: String,

    /// What kind of claim this is
    pub category: FactCategory,

    /// Identity of the mutable attribute this fact describes, e.g.
    /// `person:marcus:role`. Facts without a key never conflict.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict_key: Option<String>,

    /// Origin of the fact
    pub provenance: Provenance,

    /// Whether this fact is the current truth for its conflict key
    pub active: bool,

    /// The fact this one replaced, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supersedes: Option<String>,

    /// When this fact was created
    pub created_at: DateTime<Utc>,
}

impl HardFact {
    /// Create a fresh, active fact with no predecessor.
    pub fn new(
        scope: StreamScope,
        text: impl Into<String>,
        category: FactCategory,
        conflict_key: Option<String>,
        provenance: Provenance,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            scope,
            text: text.into(),
            category,
            conflict_key,
            provenance,
            active: true,
            supersedes: None,
            created_at: Utc::now(),
        }
    }

    /// Create the successor to `old`: same scope and conflict key, new text,
    /// `supersedes` pointing back. The caller is responsible for persisting
    /// both halves of the swap atomically.
    pub fn superseding(
        old: &HardFact,
        text: impl Into<String>,
        category: FactCategory,
        provenance: Provenance,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            scope: old.scope.clone(),
            text: text.into(),
            category,
            conflict_key: old.conflict_key.clone(),
            provenance,
            active: true,
            supersedes: Some(old.id.clone()),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provenance(confidence: f32) -> Provenance {
        Provenance {
            turn_id: Some("turn-1".into()),
            confidence,
            extractor: "heuristic".into(),
        }
    }

    #[test]
    fn new_fact_is_active_with_no_predecessor() {
        let f = HardFact::new(
            StreamScope::Global,
            "Marcus Rivera role = Senior Backend Developer",
            FactCategory::RoleCorrection,
            Some("person:marcus:role".into()),
            provenance(0.8),
        );
        assert!(f.active);
        assert!(f.supersedes.is_none());
    }

    #[test]
    fn superseding_links_back_and_keeps_key() {
        let old = HardFact::new(
            StreamScope::project("p1"),
            "Deadline: Friday",
            FactCategory::Deadline,
            Some("project:p1:deadline".into()),
            provenance(0.7),
        );
        let new = HardFact::superseding(&old, "Deadline: Monday", FactCategory::Deadline, provenance(0.9));

        assert_eq!(new.supersedes.as_deref(), Some(old.id.as_str()));
        assert_eq!(new.conflict_key, old.conflict_key);
        assert_eq!(new.scope, old.scope);
        assert!(new.active);
    }

    #[test]
    fn category_string_roundtrip() {
        for cat in [
            FactCategory::RoleCorrection,
            FactCategory::Assignment,
            FactCategory::Deadline,
            FactCategory::Decision,
            FactCategory::Organizational,
            FactCategory::ProjectFact,
            FactCategory::Preference,
            FactCategory::Blocker,
        ] {
            assert_eq!(FactCategory::parse(cat.as_str()), Some(cat));
        }
        assert_eq!(FactCategory::parse("nonsense"), None);
    }
}
