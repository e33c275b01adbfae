//! In-memory store — useful for testing and ephemeral sessions.

use async_trait::async_trait;
use chrono::Utc;
use memline_core::error::StoreError;
use memline_core::fact::HardFact;
use memline_core::scope::StreamScope;
use memline_core::store::StateStore;
use memline_core::stream::{StreamRecord, TurnRef};
use memline_core::summary::CompactedSummary;
use memline_core::turn::{Citation, Turn, TurnRole};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    /// scope key -> stream record
    streams: HashMap<String, StreamRecord>,
    /// scope key -> turns in append order
    turns: HashMap<String, Vec<Turn>>,
    /// fact id -> fact
    facts: HashMap<String, HardFact>,
    /// scope key -> summaries in creation order
    summaries: HashMap<String, Vec<CompactedSummary>>,
}

impl Inner {
    fn stream_or_create(&mut self, scope: &StreamScope) -> &mut StreamRecord {
        self.streams
            .entry(scope.key())
            .or_insert_with(|| StreamRecord::new(scope.clone()))
    }

    fn stream_mut(&mut self, scope: &StreamScope) -> Result<&mut StreamRecord, StoreError> {
        self.streams
            .get_mut(&scope.key())
            .ok_or_else(|| StoreError::NotFound(format!("stream {scope}")))
    }
}

/// A store that keeps everything in process memory behind an RwLock.
/// Useful for tests and sessions where persistence isn't needed.
pub struct InMemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn append_turn(
        &self,
        scope: &StreamScope,
        role: TurnRole,
        content: &str,
        citations: Vec<Citation>,
    ) -> Result<Turn, StoreError> {
        let mut inner = self.inner.write().await;
        let stream = inner.stream_or_create(scope);
        let number = stream.next_turn;
        stream.next_turn += 1;

        let turn = Turn::new(scope.clone(), role, content, number, citations);
        inner
            .turns
            .entry(scope.key())
            .or_default()
            .push(turn.clone());
        Ok(turn)
    }

    async fn list_turns(
        &self,
        scope: &StreamScope,
        from: u64,
        to: u64,
    ) -> Result<Vec<Turn>, StoreError> {
        let inner = self.inner.read().await;
        if !inner.streams.contains_key(&scope.key()) {
            return Err(StoreError::NotFound(format!("stream {scope}")));
        }
        let mut turns: Vec<Turn> = inner
            .turns
            .get(&scope.key())
            .map(|v| {
                v.iter()
                    .filter(|t| t.number >= from && t.number <= to)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        turns.sort_by_key(|t| t.number);
        Ok(turns)
    }

    async fn get_stream(&self, scope: &StreamScope) -> Result<Option<StreamRecord>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.streams.get(&scope.key()).cloned())
    }

    async fn push_recent(
        &self,
        scope: &StreamScope,
        turn_ref: TurnRef,
    ) -> Result<usize, StoreError> {
        let mut inner = self.inner.write().await;
        let stream = inner.stream_mut(scope)?;
        stream.recent_turns.push(turn_ref);
        Ok(stream.recent_turns.len())
    }

    async fn set_summary(
        &self,
        scope: &StreamScope,
        text: &str,
        clear_through: u64,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let stream = inner.stream_mut(scope)?;
        stream.summary = text.to_string();
        stream.recent_turns.retain(|r| r.number > clear_through);
        stream.last_compaction = Some(Utc::now());
        Ok(())
    }

    async fn insert_fact(&self, fact: HardFact) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let scope = fact.scope.clone();
        let id = fact.id.clone();
        inner.facts.insert(id.clone(), fact);
        // Corrections may arrive before any turn in a scope
        inner.stream_or_create(&scope).fact_ids.push(id);
        Ok(())
    }

    async fn supersede_fact(&self, new_fact: HardFact, old_id: &str) -> Result<(), StoreError> {
        // One write-lock critical section: no reader sees both facts active.
        let mut inner = self.inner.write().await;
        let old = inner
            .facts
            .get_mut(old_id)
            .ok_or_else(|| StoreError::NotFound(format!("fact {old_id}")))?;
        old.active = false;

        let scope = new_fact.scope.clone();
        let id = new_fact.id.clone();
        inner.facts.insert(id.clone(), new_fact);
        inner.stream_or_create(&scope).fact_ids.push(id);
        Ok(())
    }

    async fn active_facts(&self, scope: &StreamScope) -> Result<Vec<HardFact>, StoreError> {
        let inner = self.inner.read().await;
        let Some(stream) = inner.streams.get(&scope.key()) else {
            return Ok(Vec::new());
        };
        // fact_ids is creation order; newest first means walking it backwards
        let facts = stream
            .fact_ids
            .iter()
            .rev()
            .filter_map(|id| inner.facts.get(id))
            .filter(|f| f.active)
            .cloned()
            .collect();
        Ok(facts)
    }

    async fn active_fact_by_key(
        &self,
        scope: &StreamScope,
        conflict_key: &str,
    ) -> Result<Option<HardFact>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .facts
            .values()
            .find(|f| {
                f.active && f.scope == *scope && f.conflict_key.as_deref() == Some(conflict_key)
            })
            .cloned())
    }

    async fn get_fact(&self, id: &str) -> Result<HardFact, StoreError> {
        let inner = self.inner.read().await;
        inner
            .facts
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("fact {id}")))
    }

    async fn insert_summary(&self, summary: CompactedSummary) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner
            .summaries
            .entry(summary.scope.key())
            .or_default()
            .push(summary);
        Ok(())
    }

    async fn commit_compaction(
        &self,
        summary: CompactedSummary,
        folded_summary: &str,
    ) -> Result<(), StoreError> {
        // One write-lock critical section: summary, rolling text, and
        // window shrink land together or not at all.
        let mut inner = self.inner.write().await;
        let scope = summary.scope.clone();
        let clear_through = summary.turn_range_end;

        let stream = inner.stream_mut(&scope)?;
        stream.summary = folded_summary.to_string();
        stream.recent_turns.retain(|r| r.number > clear_through);
        stream.last_compaction = Some(Utc::now());

        inner
            .summaries
            .entry(scope.key())
            .or_default()
            .push(summary);
        Ok(())
    }

    async fn summaries(&self, scope: &StreamScope) -> Result<Vec<CompactedSummary>, StoreError> {
        let inner = self.inner.read().await;
        let mut out = inner
            .summaries
            .get(&scope.key())
            .cloned()
            .unwrap_or_default();
        out.sort_by_key(|s| s.turn_range_start);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memline_core::fact::{FactCategory, Provenance};

    fn provenance() -> Provenance {
        Provenance {
            turn_id: None,
            confidence: 0.9,
            extractor: "heuristic".into(),
        }
    }

    #[tokio::test]
    async fn turn_numbers_are_gap_free_per_stream() {
        let store = InMemoryStore::new();
        let scope = StreamScope::Global;

        for i in 0..5 {
            let content = format!("turn {i}");
            let turn = store
                .append_turn(&scope, TurnRole::User, &content, vec![])
                .await
                .unwrap();
            assert_eq!(turn.number, i + 1);
        }

        // A second scope owns its own number space
        let other = StreamScope::project("other");
        let turn = store
            .append_turn(&other, TurnRole::User, "first", vec![])
            .await
            .unwrap();
        assert_eq!(turn.number, 1);
    }

    #[tokio::test]
    async fn list_turns_unknown_stream_is_not_found() {
        let store = InMemoryStore::new();
        let err = store
            .list_turns(&StreamScope::project("ghost"), 1, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_turns_respects_range_and_order() {
        let store = InMemoryStore::new();
        let scope = StreamScope::Global;
        for i in 1..=10 {
            store
                .append_turn(&scope, TurnRole::User, &format!("t{i}"), vec![])
                .await
                .unwrap();
        }

        let turns = store.list_turns(&scope, 3, 7).await.unwrap();
        let numbers: Vec<u64> = turns.iter().map(|t| t.number).collect();
        assert_eq!(numbers, vec![3, 4, 5, 6, 7]);
    }

    #[tokio::test]
    async fn set_summary_shrinks_window() {
        let store = InMemoryStore::new();
        let scope = StreamScope::Global;
        for i in 1..=8u64 {
            let turn = store
                .append_turn(&scope, TurnRole::User, "x", vec![])
                .await
                .unwrap();
            store
                .push_recent(&scope, TurnRef { turn_id: turn.id, number: i })
                .await
                .unwrap();
        }

        store.set_summary(&scope, "summary of 1..5", 5).await.unwrap();

        let stream = store.get_stream(&scope).await.unwrap().unwrap();
        assert_eq!(stream.summary, "summary of 1..5");
        let numbers: Vec<u64> = stream.recent_turns.iter().map(|r| r.number).collect();
        assert_eq!(numbers, vec![6, 7, 8]);
        assert!(stream.last_compaction.is_some());
    }

    #[tokio::test]
    async fn supersede_flips_old_inactive_atomically() {
        let store = InMemoryStore::new();
        let scope = StreamScope::Global;

        let old = HardFact::new(
            scope.clone(),
            "role = Senior Backend Developer",
            FactCategory::RoleCorrection,
            Some("person:marcus:role".into()),
            provenance(),
        );
        let old_id = old.id.clone();
        store.insert_fact(old.clone()).await.unwrap();

        let new = HardFact::superseding(&old, "role = Staff Engineer", FactCategory::RoleCorrection, provenance());
        store.supersede_fact(new.clone(), &old_id).await.unwrap();

        let active = store
            .active_fact_by_key(&scope, "person:marcus:role")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(active.text, "role = Staff Engineer");
        assert_eq!(active.supersedes.as_deref(), Some(old_id.as_str()));

        let old_now = store.get_fact(&old_id).await.unwrap();
        assert!(!old_now.active);
    }

    #[tokio::test]
    async fn active_facts_newest_first() {
        let store = InMemoryStore::new();
        let scope = StreamScope::Global;
        for i in 0..3 {
            store
                .insert_fact(HardFact::new(
                    scope.clone(),
                    format!("fact {i}"),
                    FactCategory::ProjectFact,
                    None,
                    provenance(),
                ))
                .await
                .unwrap();
        }

        let facts = store.active_facts(&scope).await.unwrap();
        let texts: Vec<&str> = facts.iter().map(|f| f.text.as_str()).collect();
        assert_eq!(texts, vec!["fact 2", "fact 1", "fact 0"]);
    }

    #[tokio::test]
    async fn commit_compaction_lands_as_one_mutation() {
        let store = InMemoryStore::new();
        let scope = StreamScope::Global;
        for i in 1..=7u64 {
            let turn = store
                .append_turn(&scope, TurnRole::User, "x", vec![])
                .await
                .unwrap();
            store
                .push_recent(&scope, TurnRef { turn_id: turn.id, number: i })
                .await
                .unwrap();
        }

        store
            .commit_compaction(
                CompactedSummary::new(scope.clone(), "turns 1-4", 1, 4),
                "turns 1-4",
            )
            .await
            .unwrap();

        let stream = store.get_stream(&scope).await.unwrap().unwrap();
        assert_eq!(stream.summary, "turns 1-4");
        let numbers: Vec<u64> = stream.recent_turns.iter().map(|r| r.number).collect();
        assert_eq!(numbers, vec![5, 6, 7]);
        assert!(stream.last_compaction.is_some());
        assert_eq!(store.summaries(&scope).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn commit_compaction_unknown_stream_persists_nothing() {
        let store = InMemoryStore::new();
        let scope = StreamScope::project("ghost");
        let err = store
            .commit_compaction(CompactedSummary::new(scope.clone(), "s", 1, 4), "s")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert!(store.summaries(&scope).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn summaries_ordered_by_range_start() {
        let store = InMemoryStore::new();
        let scope = StreamScope::Global;
        store
            .insert_summary(CompactedSummary::new(scope.clone(), "later", 21, 40))
            .await
            .unwrap();
        store
            .insert_summary(CompactedSummary::new(scope.clone(), "earlier", 1, 20))
            .await
            .unwrap();

        let summaries = store.summaries(&scope).await.unwrap();
        assert_eq!(summaries[0].text, "earlier");
        assert_eq!(summaries[1].text, "later");
    }
}
