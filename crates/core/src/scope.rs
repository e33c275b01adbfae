//! Stream scope — the unit of isolation for all memory state.
//!
//! Every turn, hard fact, and compacted summary belongs to exactly one
//! scope: either the global conversation or a project-bound one. Scopes
//! key the per-stream lock map, so mutation is serialized within a scope
//! and fully parallel across scopes.

use serde::{Deserialize, Serialize};

/// A conversational scope: global, or bound to one project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "project")]
pub enum StreamScope {
    /// No project — the assistant's global stream.
    Global,
    /// Bound to a single project by id.
    Project(String),
}

impl StreamScope {
    /// Create a project scope.
    pub fn project(id: impl Into<String>) -> Self {
        Self::Project(id.into())
    }

    /// The project id, if this is a project scope.
    pub fn project_id(&self) -> Option<&str> {
        match self {
            Self::Global => None,
            Self::Project(id) => Some(id),
        }
    }

    /// Stable string key used by storage backends as a secondary index.
    pub fn key(&self) -> String {
        match self {
            Self::Global => "global".into(),
            Self::Project(id) => format!("project:{id}"),
        }
    }

    /// Parse the `key()` form back into a scope.
    pub fn parse(s: &str) -> Option<Self> {
        if s == "global" {
            return Some(Self::Global);
        }
        s.strip_prefix("project:").map(|id| Self::Project(id.to_string()))
    }
}

impl std::fmt::Display for StreamScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_roundtrip() {
        let global = StreamScope::Global;
        let proj = StreamScope::project("alpha-42");

        assert_eq!(StreamScope::parse(&global.key()), Some(global));
        assert_eq!(StreamScope::parse(&proj.key()), Some(proj));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(StreamScope::parse("projectalpha"), None);
        assert_eq!(StreamScope::parse(""), None);
    }

    #[test]
    fn display_matches_key() {
        let scope = StreamScope::project("beta");
        assert_eq!(scope.to_string(), "project:beta");
        assert_eq!(StreamScope::Global.to_string(), "global");
    }
}
