//! Compaction — folding old turns into a rolling summary.
//!
//! Once a stream's window holds at least `threshold` turns beyond the
//! protected tail, the oldest run is summarized into one
//! `CompactedSummary` and cleared from the window. Turn bodies stay in
//! the turn log; only the index's fast-path list shrinks. Nothing is
//! written until the summarizer succeeds, and the summary row, rolling
//! text, and window shrink commit as one store mutation, so an aborted
//! cycle leaves no partial state.

use memline_config::CompactionConfig;
use memline_core::error::Error;
use memline_core::extract::Extractor;
use memline_core::scope::StreamScope;
use memline_core::store::StateStore;
use memline_core::stream::StreamRecord;
use memline_core::summary::CompactedSummary;
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome of one successful compaction cycle.
#[derive(Debug, Clone)]
pub struct CompactionReport {
    pub summary: CompactedSummary,
    /// Turns folded into the summary
    pub compacted: usize,
    /// Window size after the fold
    pub window_after: usize,
}

pub struct CompactionEngine {
    store: Arc<dyn StateStore>,
    extractor: Arc<dyn Extractor>,
    config: CompactionConfig,
}

impl CompactionEngine {
    pub fn new(
        store: Arc<dyn StateStore>,
        extractor: Arc<dyn Extractor>,
        config: CompactionConfig,
    ) -> Self {
        Self {
            store,
            extractor,
            config,
        }
    }

    /// Whether a cycle should fire for this stream: at least `threshold`
    /// turns sit in the window beyond the protected `keep_tail`.
    pub fn needs_compaction(&self, stream: &StreamRecord) -> bool {
        stream.window_size() >= self.config.threshold + self.config.keep_tail
    }

    /// Run one compaction cycle for a scope if it is due.
    ///
    /// Returns `Ok(None)` when the stream does not exist or is below the
    /// trigger. On summarizer failure the cycle aborts with the window
    /// untouched; the caller logs and retries on a later crossing. The
    /// caller is responsible for serializing cycles per scope.
    pub async fn run(&self, scope: &StreamScope) -> Result<Option<CompactionReport>, Error> {
        let Some(stream) = self.store.get_stream(scope).await? else {
            return Ok(None);
        };
        if !self.needs_compaction(&stream) {
            debug!(
                scope = %scope,
                window = stream.window_size(),
                threshold = self.config.threshold,
                "Window below compaction trigger"
            );
            return Ok(None);
        }
        self.compact(scope, &stream).await.map(Some)
    }

    /// Force a cycle over whatever the window holds beyond the tail,
    /// regardless of the threshold. Operator path (CLI `compact`).
    pub async fn force(&self, scope: &StreamScope) -> Result<Option<CompactionReport>, Error> {
        let Some(stream) = self.store.get_stream(scope).await? else {
            return Ok(None);
        };
        if stream.window_size() <= self.config.keep_tail {
            return Ok(None);
        }
        self.compact(scope, &stream).await.map(Some)
    }

    async fn compact(
        &self,
        scope: &StreamScope,
        stream: &StreamRecord,
    ) -> Result<CompactionReport, Error> {
        let cut = stream.window_size() - self.config.keep_tail;
        let run = &stream.recent_turns[..cut];
        let (start, end) = match (run.first(), run.last()) {
            (Some(first), Some(last)) => (first.number, last.number),
            _ => return Err(Error::Internal("compaction run is empty".into())),
        };

        let turns = self.store.list_turns(scope, start, end).await?;
        let text = self.extractor.summarize(&turns).await?;

        let folded = if stream.summary.is_empty() {
            text.clone()
        } else {
            format!("{}\n\n{}", stream.summary, text)
        };

        // Summary row, rolling text, and window shrink land in one store
        // mutation; an interrupted cycle persists nothing.
        let summary = CompactedSummary::new(scope.clone(), &text, start, end);
        self.store.commit_compaction(summary.clone(), &folded).await?;

        info!(
            scope = %scope,
            range_start = start,
            range_end = end,
            window_after = self.config.keep_tail,
            "Compacted turn range into summary"
        );

        Ok(CompactionReport {
            summary,
            compacted: cut,
            window_after: self.config.keep_tail,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use memline_core::error::{ExtractError, StoreError};
    use memline_core::extract::CandidateFact;
    use memline_core::turn::{Turn, TurnRole};
    use memline_store::InMemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Summarizer that either describes the range it saw or fails.
    struct ScriptedSummarizer {
        fail: bool,
    }

    #[async_trait]
    impl Extractor for ScriptedSummarizer {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn extract_facts(
            &self,
            _text: &str,
            _scope: &StreamScope,
        ) -> Result<Vec<CandidateFact>, ExtractError> {
            Ok(Vec::new())
        }

        async fn summarize(&self, turns: &[Turn]) -> Result<String, ExtractError> {
            if self.fail {
                return Err(ExtractError::Timeout { timeout_secs: 30 });
            }
            Ok(format!(
                "summary of turns {}..{}",
                turns[0].number,
                turns[turns.len() - 1].number
            ))
        }
    }

    /// Store whose compaction commit fails a set number of times before
    /// behaving normally.
    struct FlakyCommitStore {
        inner: InMemoryStore,
        failures_left: AtomicUsize,
    }

    impl FlakyCommitStore {
        fn new(failures: usize) -> Self {
            Self {
                inner: InMemoryStore::new(),
                failures_left: AtomicUsize::new(failures),
            }
        }
    }

    #[async_trait]
    impl StateStore for FlakyCommitStore {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn append_turn(
            &self,
            scope: &StreamScope,
            role: TurnRole,
            content: &str,
            citations: Vec<memline_core::turn::Citation>,
        ) -> Result<Turn, StoreError> {
            self.inner.append_turn(scope, role, content, citations).await
        }

        async fn list_turns(
            &self,
            scope: &StreamScope,
            from: u64,
            to: u64,
        ) -> Result<Vec<Turn>, StoreError> {
            self.inner.list_turns(scope, from, to).await
        }

        async fn get_stream(
            &self,
            scope: &StreamScope,
        ) -> Result<Option<StreamRecord>, StoreError> {
            self.inner.get_stream(scope).await
        }

        async fn push_recent(
            &self,
            scope: &StreamScope,
            turn_ref: memline_core::stream::TurnRef,
        ) -> Result<usize, StoreError> {
            self.inner.push_recent(scope, turn_ref).await
        }

        async fn set_summary(
            &self,
            scope: &StreamScope,
            text: &str,
            clear_through: u64,
        ) -> Result<(), StoreError> {
            self.inner.set_summary(scope, text, clear_through).await
        }

        async fn insert_fact(&self, fact: memline_core::fact::HardFact) -> Result<(), StoreError> {
            self.inner.insert_fact(fact).await
        }

        async fn supersede_fact(
            &self,
            new_fact: memline_core::fact::HardFact,
            old_id: &str,
        ) -> Result<(), StoreError> {
            self.inner.supersede_fact(new_fact, old_id).await
        }

        async fn active_facts(
            &self,
            scope: &StreamScope,
        ) -> Result<Vec<memline_core::fact::HardFact>, StoreError> {
            self.inner.active_facts(scope).await
        }

        async fn active_fact_by_key(
            &self,
            scope: &StreamScope,
            conflict_key: &str,
        ) -> Result<Option<memline_core::fact::HardFact>, StoreError> {
            self.inner.active_fact_by_key(scope, conflict_key).await
        }

        async fn get_fact(&self, id: &str) -> Result<memline_core::fact::HardFact, StoreError> {
            self.inner.get_fact(id).await
        }

        async fn insert_summary(&self, summary: CompactedSummary) -> Result<(), StoreError> {
            self.inner.insert_summary(summary).await
        }

        async fn commit_compaction(
            &self,
            summary: CompactedSummary,
            folded_summary: &str,
        ) -> Result<(), StoreError> {
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(StoreError::Storage("commit interrupted".into()));
            }
            self.inner.commit_compaction(summary, folded_summary).await
        }

        async fn summaries(
            &self,
            scope: &StreamScope,
        ) -> Result<Vec<CompactedSummary>, StoreError> {
            self.inner.summaries(scope).await
        }
    }

    fn engine(store: Arc<dyn StateStore>, fail: bool) -> CompactionEngine {
        CompactionEngine::new(
            store,
            Arc::new(ScriptedSummarizer { fail }),
            CompactionConfig {
                threshold: 20,
                keep_tail: 5,
            },
        )
    }

    async fn feed_turns(store: &Arc<dyn StateStore>, scope: &StreamScope, count: usize) {
        for i in 0..count {
            let turn = store
                .append_turn(scope, TurnRole::User, &format!("message {i}"), vec![])
                .await
                .unwrap();
            store
                .push_recent(
                    scope,
                    memline_core::stream::TurnRef {
                        turn_id: turn.id.clone(),
                        number: turn.number,
                    },
                )
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn below_trigger_does_nothing() {
        let store: Arc<dyn StateStore> = Arc::new(InMemoryStore::new());
        let scope = StreamScope::Global;
        feed_turns(&store, &scope, 24).await;

        let report = engine(store.clone(), false).run(&scope).await.unwrap();
        assert!(report.is_none());
        let stream = store.get_stream(&scope).await.unwrap().unwrap();
        assert_eq!(stream.window_size(), 24);
    }

    #[tokio::test]
    async fn twenty_five_turns_fold_exactly_one_to_twenty() {
        let store: Arc<dyn StateStore> = Arc::new(InMemoryStore::new());
        let scope = StreamScope::Global;
        feed_turns(&store, &scope, 25).await;

        let report = engine(store.clone(), false)
            .run(&scope)
            .await
            .unwrap()
            .expect("cycle should fire");

        assert_eq!(report.summary.turn_range_start, 1);
        assert_eq!(report.summary.turn_range_end, 20);
        assert_eq!(report.compacted, 20);

        let stream = store.get_stream(&scope).await.unwrap().unwrap();
        assert_eq!(stream.window_size(), 5);
        assert_eq!(stream.recent_turns[0].number, 21);
        assert_eq!(stream.recent_turns[4].number, 25);
        assert_eq!(stream.summary, "summary of turns 1..20");
        assert!(stream.last_compaction.is_some());

        let summaries = store.summaries(&scope).await.unwrap();
        assert_eq!(summaries.len(), 1);

        // Turn bodies for the compacted range stay retrievable.
        let turns = store.list_turns(&scope, 1, 20).await.unwrap();
        assert_eq!(turns.len(), 20);
    }

    #[tokio::test]
    async fn summarizer_failure_aborts_with_window_untouched() {
        let store: Arc<dyn StateStore> = Arc::new(InMemoryStore::new());
        let scope = StreamScope::Global;
        feed_turns(&store, &scope, 25).await;

        let result = engine(store.clone(), true).run(&scope).await;
        assert!(result.is_err());

        let stream = store.get_stream(&scope).await.unwrap().unwrap();
        assert_eq!(stream.window_size(), 25);
        assert!(stream.summary.is_empty());
        assert!(store.summaries(&scope).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn successive_cycles_produce_contiguous_ranges() {
        let store: Arc<dyn StateStore> = Arc::new(InMemoryStore::new());
        let scope = StreamScope::project("p1");
        let engine = engine(store.clone(), false);

        feed_turns(&store, &scope, 25).await;
        engine.run(&scope).await.unwrap().unwrap();

        feed_turns(&store, &scope, 20).await; // window back to 25
        let second = engine.run(&scope).await.unwrap().unwrap();

        assert_eq!(second.summary.turn_range_start, 21);
        assert_eq!(second.summary.turn_range_end, 40);

        let summaries = store.summaries(&scope).await.unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].turn_range_end + 1, summaries[1].turn_range_start);

        // Rolling summary folds the new text onto the old.
        let stream = store.get_stream(&scope).await.unwrap().unwrap();
        assert_eq!(
            stream.summary,
            "summary of turns 1..20\n\nsummary of turns 21..40"
        );
        assert_eq!(stream.recent_turns[0].number, 41);
    }

    #[tokio::test]
    async fn force_compacts_below_threshold() {
        let store: Arc<dyn StateStore> = Arc::new(InMemoryStore::new());
        let scope = StreamScope::Global;
        feed_turns(&store, &scope, 12).await;
        let engine = engine(store.clone(), false);

        assert!(engine.run(&scope).await.unwrap().is_none());
        let report = engine.force(&scope).await.unwrap().unwrap();
        assert_eq!(report.summary.turn_range_start, 1);
        assert_eq!(report.summary.turn_range_end, 7);

        // Nothing left beyond the tail: force is a no-op.
        assert!(engine.force(&scope).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn interrupted_commit_persists_nothing_and_retry_does_not_overlap() {
        let store: Arc<dyn StateStore> = Arc::new(FlakyCommitStore::new(1));
        let scope = StreamScope::Global;
        feed_turns(&store, &scope, 25).await;
        let engine = engine(store.clone(), false);

        // First cycle dies at the commit: no summary row, window intact,
        // rolling summary untouched.
        assert!(engine.run(&scope).await.is_err());
        assert!(store.summaries(&scope).await.unwrap().is_empty());
        let stream = store.get_stream(&scope).await.unwrap().unwrap();
        assert_eq!(stream.window_size(), 25);
        assert!(stream.summary.is_empty());
        assert!(stream.last_compaction.is_none());

        // Retry folds the same run exactly once.
        let report = engine.run(&scope).await.unwrap().expect("retry should fire");
        assert_eq!(report.summary.turn_range_start, 1);
        assert_eq!(report.summary.turn_range_end, 20);

        let summaries = store.summaries(&scope).await.unwrap();
        assert_eq!(summaries.len(), 1);
        let stream = store.get_stream(&scope).await.unwrap().unwrap();
        assert_eq!(stream.window_size(), 5);
        assert_eq!(stream.recent_turns[0].number, 21);
    }

    #[tokio::test]
    async fn unknown_scope_is_a_noop() {
        let store: Arc<dyn StateStore> = Arc::new(InMemoryStore::new());
        let engine = engine(store, false);
        assert!(engine.run(&StreamScope::Global).await.unwrap().is_none());
    }
}
