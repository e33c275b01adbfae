//! MemoryService — the facade the conversation orchestrator talks to.
//!
//! Explicitly constructed and dependency-injected; no ambient globals.
//! Mutation is serialized per stream scope through a lock map and runs
//! fully parallel across scopes. A global lock here would stall every
//! project on one stream's compaction.

use crate::assemble::{AssembledContext, assemble};
use crate::compaction::{CompactionEngine, CompactionReport};
use crate::index::StreamIndex;
use crate::ledger::{FactLedger, MANUAL_EXTRACTOR, ProposeReport};
use crate::turns::TurnLog;
use memline_config::AppConfig;
use memline_core::error::Error;
use memline_core::extract::{CandidateFact, Extractor};
use memline_core::fact::{FactCategory, HardFact};
use memline_core::scope::StreamScope;
use memline_core::store::StateStore;
use memline_core::turn::{Citation, Turn, TurnRole};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::warn;

/// What one `record_turn` call did.
#[derive(Debug)]
pub struct TurnReceipt {
    /// The persisted turn, number assigned
    pub turn: Turn,
    /// Window size after the whole cycle (append + any compaction)
    pub window_size: usize,
    /// Fact extraction outcome, present on assistant turns
    pub extraction: Option<ProposeReport>,
    /// Compaction outcome, present when a cycle fired
    pub compaction: Option<CompactionReport>,
}

pub struct MemoryService {
    extractor: Arc<dyn Extractor>,
    turns: TurnLog,
    index: StreamIndex,
    ledger: FactLedger,
    compactor: CompactionEngine,
    locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl MemoryService {
    pub fn new(store: Arc<dyn StateStore>, extractor: Arc<dyn Extractor>, config: &AppConfig) -> Self {
        Self {
            turns: TurnLog::new(store.clone()),
            index: StreamIndex::new(store.clone()),
            ledger: FactLedger::new(store.clone(), config.facts.clone()),
            compactor: CompactionEngine::new(store, extractor.clone(), config.compaction.clone()),
            extractor,
            locks: RwLock::new(HashMap::new()),
        }
    }

    /// The per-scope mutation lock, created lazily.
    async fn scope_lock(&self, scope: &StreamScope) -> Arc<Mutex<()>> {
        let key = scope.key();
        {
            let map = self.locks.read().await;
            if let Some(lock) = map.get(&key) {
                return lock.clone();
            }
        }
        let mut map = self.locks.write().await;
        map.entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Ingest one turn: append, index, extract facts (assistant turns),
    /// compact if due. Extraction and compaction failures degrade to a
    /// warn; the turn itself is already durable by then.
    pub async fn record_turn(
        &self,
        scope: &StreamScope,
        role: TurnRole,
        content: &str,
        citations: Vec<Citation>,
    ) -> Result<TurnReceipt, Error> {
        let lock = self.scope_lock(scope).await;
        let _guard = lock.lock().await;

        let turn = self.turns.append(scope, role, content, citations).await?;
        let mut window_size = self.index.touch(scope, &turn).await?;

        let extraction = match role {
            TurnRole::Assistant => Some(self.extract_for(scope, &turn).await),
            TurnRole::User => None,
        };

        let compaction = match self.compactor.run(scope).await {
            Ok(report) => report,
            Err(e) => {
                warn!(scope = %scope, error = %e, "Compaction cycle aborted");
                None
            }
        };
        if let Some(report) = &compaction {
            window_size = report.window_after;
        }

        Ok(TurnReceipt {
            turn,
            window_size,
            extraction,
            compaction,
        })
    }

    /// Run extraction over the user+assistant pair ending at `turn`.
    /// Any extractor failure means zero facts for this turn, never an
    /// ingestion failure.
    async fn extract_for(&self, scope: &StreamScope, turn: &Turn) -> ProposeReport {
        let mut text = String::new();
        if turn.number >= 2 {
            if let Ok(prev) = self.turns.list(scope, turn.number - 1, turn.number - 1).await {
                if let Some(prev) = prev.first().filter(|t| t.role == TurnRole::User) {
                    text = format!("{}: {}\n", prev.role, prev.content);
                }
            }
        }
        text.push_str(&format!("{}: {}", turn.role, turn.content));

        let candidates = match self.extractor.extract_facts(&text, scope).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(scope = %scope, turn = turn.number, error = %e,
                      "Fact extraction failed; no facts for this turn");
                return ProposeReport::default();
            }
        };

        self.ledger
            .propose(scope, candidates, Some(&turn.id), self.extractor.name())
            .await
    }

    /// Assemble a bounded context from persisted state. Lock-free, never
    /// suspends on external services; a never-touched scope yields an
    /// empty context.
    pub async fn get_context(
        &self,
        scope: &StreamScope,
        budget_chars: usize,
    ) -> Result<AssembledContext, Error> {
        let Some(stream) = self.index.get(scope).await? else {
            return Ok(assemble(&[], &[], None, budget_chars));
        };

        let facts = self.ledger.active_facts(scope).await?;
        let recent = match (stream.recent_turns.first(), stream.recent_turns.last()) {
            (Some(first), Some(last)) => {
                self.turns.list(scope, first.number, last.number).await?
            }
            _ => Vec::new(),
        };
        let summary = (!stream.summary.is_empty()).then_some(stream.summary.as_str());

        Ok(assemble(&facts, &recent, summary, budget_chars))
    }

    /// Human correction path: confidence pinned to 1.0, extractor
    /// "manual", always wins over AI-sourced facts with the same key.
    pub async fn propose_fact(
        &self,
        scope: &StreamScope,
        conflict_key: Option<String>,
        text: &str,
        category: FactCategory,
    ) -> Result<HardFact, Error> {
        let lock = self.scope_lock(scope).await;
        let _guard = lock.lock().await;

        let candidate = CandidateFact {
            text: text.to_string(),
            category,
            confidence: 1.0,
            conflict_key,
        };
        let mut report = self
            .ledger
            .propose(scope, vec![candidate], None, MANUAL_EXTRACTOR)
            .await;

        match report.merged.pop() {
            Some(fact) => Ok(fact),
            None => {
                let detail = report
                    .failures
                    .pop()
                    .map(|f| f.error)
                    .unwrap_or_else(|| "correction was not merged".to_string());
                Err(Error::Internal(detail))
            }
        }
    }

    /// Operator-triggered compaction, regardless of the threshold.
    pub async fn compact(&self, scope: &StreamScope) -> Result<Option<CompactionReport>, Error> {
        let lock = self.scope_lock(scope).await;
        let _guard = lock.lock().await;
        self.compactor.force(scope).await
    }

    /// Active facts for a scope, newest first.
    pub async fn active_facts(&self, scope: &StreamScope) -> Result<Vec<HardFact>, Error> {
        Ok(self.ledger.active_facts(scope).await?)
    }

    /// The supersession chain for one fact, newest to oldest.
    pub async fn history(&self, fact_id: &str) -> Result<Vec<HardFact>, Error> {
        Ok(self.ledger.history(fact_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use memline_core::error::ExtractError;
    use memline_store::InMemoryStore;

    struct SilentExtractor;

    #[async_trait]
    impl Extractor for SilentExtractor {
        fn name(&self) -> &str {
            "silent"
        }

        async fn extract_facts(
            &self,
            _text: &str,
            _scope: &StreamScope,
        ) -> Result<Vec<CandidateFact>, ExtractError> {
            Ok(Vec::new())
        }

        async fn summarize(&self, _turns: &[Turn]) -> Result<String, ExtractError> {
            Ok("summary".into())
        }
    }

    fn service() -> MemoryService {
        MemoryService::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(SilentExtractor),
            &AppConfig::default(),
        )
    }

    #[tokio::test]
    async fn untouched_scope_yields_empty_context() {
        let service = service();
        let ctx = service.get_context(&StreamScope::Global, 4000).await.unwrap();
        assert!(ctx.is_empty());
    }

    #[tokio::test]
    async fn user_turns_skip_extraction() {
        let service = service();
        let receipt = service
            .record_turn(&StreamScope::Global, TurnRole::User, "hello", vec![])
            .await
            .unwrap();
        assert!(receipt.extraction.is_none());
        assert_eq!(receipt.turn.number, 1);
        assert_eq!(receipt.window_size, 1);
    }

    #[tokio::test]
    async fn scope_locks_are_reused_per_key() {
        let service = service();
        let a = service.scope_lock(&StreamScope::project("p1")).await;
        let b = service.scope_lock(&StreamScope::project("p1")).await;
        let c = service.scope_lock(&StreamScope::project("p2")).await;
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[tokio::test]
    async fn correction_returns_the_merged_fact() {
        let service = service();
        let fact = service
            .propose_fact(
                &StreamScope::Global,
                Some("person:marcus:role".into()),
                "Marcus Rivera role = Staff Engineer",
                FactCategory::RoleCorrection,
            )
            .await
            .unwrap();
        assert!((fact.provenance.confidence - 1.0).abs() < f32::EPSILON);
        assert_eq!(fact.provenance.extractor, "manual");
        assert!(fact.active);
    }
}
