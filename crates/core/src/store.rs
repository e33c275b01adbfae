//! StateStore trait — persistent state behind the memory engine.
//!
//! Four append/near-append-only collections — turns, streams, hard_facts,
//! compacted_summaries — each keyed by id, with the stream scope as a
//! secondary index on all four. Turns are never updated or deleted; facts
//! are only ever inserted or flipped inactive as half of a supersession;
//! summaries are insert-only. The stream record is the one mutable index.
//!
//! Implementations: SQLite, in-memory (for testing).

use crate::error::StoreError;
use crate::fact::HardFact;
use crate::scope::StreamScope;
use crate::stream::{StreamRecord, TurnRef};
use crate::summary::CompactedSummary;
use crate::turn::{Citation, Turn, TurnRole};
use async_trait::async_trait;

/// The persistent store contract.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "in_memory").
    fn name(&self) -> &str;

    // --- Turns ---

    /// Append a turn to a stream. Lazily creates the stream record on the
    /// first turn in a scope, assigns the next turn number (strictly
    /// increasing from 1), and persists the turn before returning it.
    /// Does NOT touch the recent-turns window.
    async fn append_turn(
        &self,
        scope: &StreamScope,
        role: TurnRole,
        content: &str,
        citations: Vec<Citation>,
    ) -> std::result::Result<Turn, StoreError>;

    /// List turns of a stream with numbers in `[from, to]`, ordered by
    /// number. Fails with `NotFound` if the scope has never been created.
    async fn list_turns(
        &self,
        scope: &StreamScope,
        from: u64,
        to: u64,
    ) -> std::result::Result<Vec<Turn>, StoreError>;

    // --- Stream index ---

    /// Fetch the stream record for a scope, if it exists.
    async fn get_stream(
        &self,
        scope: &StreamScope,
    ) -> std::result::Result<Option<StreamRecord>, StoreError>;

    /// Append a turn reference to the recent-turns window. Returns the new
    /// window size. `NotFound` if the scope has never been created.
    async fn push_recent(
        &self,
        scope: &StreamScope,
        turn_ref: TurnRef,
    ) -> std::result::Result<usize, StoreError>;

    /// Atomically replace the rolling summary and drop window refs with
    /// `number <= clear_through`, stamping `last_compaction`.
    async fn set_summary(
        &self,
        scope: &StreamScope,
        text: &str,
        clear_through: u64,
    ) -> std::result::Result<(), StoreError>;

    // --- Hard facts ---

    /// Insert a fresh fact (no predecessor) and link it to its stream.
    async fn insert_fact(&self, fact: HardFact) -> std::result::Result<(), StoreError>;

    /// Atomic two-part mutation: insert `new_fact` (whose `supersedes`
    /// points at `old_id`) and flip the old fact inactive. No reader may
    /// observe both facts active.
    async fn supersede_fact(
        &self,
        new_fact: HardFact,
        old_id: &str,
    ) -> std::result::Result<(), StoreError>;

    /// Active facts for a scope, ordered by creation time descending
    /// (newest first).
    async fn active_facts(
        &self,
        scope: &StreamScope,
    ) -> std::result::Result<Vec<HardFact>, StoreError>;

    /// The single active fact for a conflict key in a scope, if any.
    async fn active_fact_by_key(
        &self,
        scope: &StreamScope,
        conflict_key: &str,
    ) -> std::result::Result<Option<HardFact>, StoreError>;

    /// Fetch one fact by id (active or not). `NotFound` if unknown.
    async fn get_fact(&self, id: &str) -> std::result::Result<HardFact, StoreError>;

    // --- Compacted summaries ---

    /// Append a compacted summary.
    async fn insert_summary(
        &self,
        summary: CompactedSummary,
    ) -> std::result::Result<(), StoreError>;

    /// Commit one compaction cycle atomically: append `summary`, replace
    /// the stream's rolling summary with `folded_summary`, and drop window
    /// refs with `number <= summary.turn_range_end`, stamping
    /// `last_compaction`. No reader may observe the summary without the
    /// shrunken window, and a failure persists nothing.
    async fn commit_compaction(
        &self,
        summary: CompactedSummary,
        folded_summary: &str,
    ) -> std::result::Result<(), StoreError>;

    /// All compacted summaries for a scope, ordered by range start.
    async fn summaries(
        &self,
        scope: &StreamScope,
    ) -> std::result::Result<Vec<CompactedSummary>, StoreError>;
}
