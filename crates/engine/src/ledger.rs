//! Fact ledger — versioned hard facts with supersession chains.
//!
//! Exposes only currently-active facts; history stays queryable per fact.
//! Merging is per-candidate independent: a failure on one candidate is
//! reported in the aggregate result and never blocks the others.

use memline_config::{ConflictPolicy, FactsConfig};
use memline_core::error::StoreError;
use memline_core::extract::CandidateFact;
use memline_core::fact::{HardFact, Provenance};
use memline_core::scope::StreamScope;
use memline_core::store::StateStore;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Extractor name used by the human correction path. Facts carrying it are
/// only ever superseded by other corrections.
pub const MANUAL_EXTRACTOR: &str = "manual";

/// Aggregate result of one propose batch.
#[derive(Debug, Default)]
pub struct ProposeReport {
    /// Facts inserted (fresh or superseding), in merge order
    pub merged: Vec<HardFact>,
    /// Candidates dropped by the confidence filter
    pub discarded_low_confidence: usize,
    /// Same-key collisions within this batch (resolved per policy)
    pub batch_conflicts: usize,
    /// AI candidates skipped because a human correction holds the key
    pub skipped_protected: usize,
    /// Per-candidate store failures that did not block the rest
    pub failures: Vec<ProposeFailure>,
}

/// One candidate that could not be merged.
#[derive(Debug, Clone)]
pub struct ProposeFailure {
    /// Index of the candidate in the batch
    pub index: usize,
    /// The candidate's text, for the operator log
    pub text: String,
    /// Why the merge failed
    pub error: String,
}

/// The fact ledger.
#[derive(Clone)]
pub struct FactLedger {
    store: Arc<dyn StateStore>,
    config: FactsConfig,
}

impl FactLedger {
    pub fn new(store: Arc<dyn StateStore>, config: FactsConfig) -> Self {
        Self { store, config }
    }

    /// Merge a batch of candidates into the ledger.
    ///
    /// For each candidate: confidence-filter, then conflict-detect against
    /// the active fact holding the same key. A conflict deactivates the old
    /// fact and inserts the successor in one atomic store mutation; no
    /// conflict means a fresh insert. Candidates below the confidence
    /// threshold are discarded outright — a hard filter, not a preference.
    pub async fn propose(
        &self,
        scope: &StreamScope,
        candidates: Vec<CandidateFact>,
        origin_turn: Option<&str>,
        extractor: &str,
    ) -> ProposeReport {
        let mut report = ProposeReport::default();
        let mut seen_keys: HashSet<String> = HashSet::new();

        for (index, candidate) in candidates.into_iter().enumerate() {
            if candidate.confidence < self.config.min_confidence {
                debug!(
                    confidence = candidate.confidence,
                    threshold = self.config.min_confidence,
                    text = %candidate.text,
                    "Discarding low-confidence candidate"
                );
                report.discarded_low_confidence += 1;
                continue;
            }

            if let Some(key) = &candidate.conflict_key {
                if !seen_keys.insert(key.clone()) {
                    report.batch_conflicts += 1;
                    match self.config.conflict_policy {
                        ConflictPolicy::FirstWins => {
                            warn!(key = %key, text = %candidate.text,
                                  "Batch conflict: keeping first candidate, discarding later one");
                            continue;
                        }
                        ConflictPolicy::LastWins => {
                            warn!(key = %key, text = %candidate.text,
                                  "Batch conflict: later candidate supersedes the intermediate");
                        }
                    }
                }
            }

            let provenance = Provenance {
                turn_id: origin_turn.map(str::to_string),
                confidence: candidate.confidence,
                extractor: extractor.to_string(),
            };

            match self.merge_one(scope, &candidate, provenance).await {
                Ok(Some(fact)) => report.merged.push(fact),
                Ok(None) => report.skipped_protected += 1,
                Err(e) => {
                    warn!(error = %e, text = %candidate.text, "Candidate merge failed");
                    report.failures.push(ProposeFailure {
                        index,
                        text: candidate.text,
                        error: e.to_string(),
                    });
                }
            }
        }

        report
    }

    /// Merge a single candidate. `Ok(None)` means it was skipped because a
    /// human correction holds the conflict key.
    async fn merge_one(
        &self,
        scope: &StreamScope,
        candidate: &CandidateFact,
        provenance: Provenance,
    ) -> Result<Option<HardFact>, StoreError> {
        let existing = match &candidate.conflict_key {
            Some(key) => self.store.active_fact_by_key(scope, key).await?,
            None => None,
        };

        match existing {
            Some(old) => {
                // Corrections always win over AI-sourced facts; the reverse
                // does not hold.
                if old.provenance.extractor == MANUAL_EXTRACTOR
                    && provenance.extractor != MANUAL_EXTRACTOR
                {
                    debug!(key = ?candidate.conflict_key, text = %candidate.text,
                           "Keeping human correction over AI candidate");
                    return Ok(None);
                }

                let new = HardFact::superseding(&old, &candidate.text, candidate.category, provenance);
                self.store.supersede_fact(new.clone(), &old.id).await?;
                Ok(Some(new))
            }
            None => {
                let fact = HardFact::new(
                    scope.clone(),
                    &candidate.text,
                    candidate.category,
                    candidate.conflict_key.clone(),
                    provenance,
                );
                self.store.insert_fact(fact.clone()).await?;
                Ok(Some(fact))
            }
        }
    }

    /// Active facts for a scope, newest first.
    pub async fn active_facts(&self, scope: &StreamScope) -> Result<Vec<HardFact>, StoreError> {
        self.store.active_facts(scope).await
    }

    /// Walk the supersedes chain starting at `fact_id`, newest to oldest.
    pub async fn history(&self, fact_id: &str) -> Result<Vec<HardFact>, StoreError> {
        let mut chain = Vec::new();
        let mut cursor = Some(fact_id.to_string());
        while let Some(id) = cursor {
            let fact = self.store.get_fact(&id).await?;
            cursor = fact.supersedes.clone();
            chain.push(fact);
        }
        Ok(chain)
    }
}
