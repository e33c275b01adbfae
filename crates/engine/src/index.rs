//! Stream index — the per-stream pointer structure.
//!
//! Ties together the recent-turns window, active fact references, and the
//! rolling summary. Invariant: the window never contains a turn number
//! already covered by a compacted summary range (`set_summary` clears the
//! compacted prefix in the same mutation that installs the new summary).

use memline_core::error::StoreError;
use memline_core::scope::StreamScope;
use memline_core::store::StateStore;
use memline_core::stream::{StreamRecord, TurnRef};
use memline_core::turn::Turn;
use std::sync::Arc;

/// Thin component over the store's stream records.
#[derive(Clone)]
pub struct StreamIndex {
    store: Arc<dyn StateStore>,
}

impl StreamIndex {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    /// Append a turn reference to the recent-turns window.
    /// Returns the new window size.
    pub async fn touch(&self, scope: &StreamScope, turn: &Turn) -> Result<usize, StoreError> {
        self.store
            .push_recent(
                scope,
                TurnRef {
                    turn_id: turn.id.clone(),
                    number: turn.number,
                },
            )
            .await
    }

    /// Current count of recent, not-yet-compacted turns.
    pub async fn window_size(&self, scope: &StreamScope) -> Result<usize, StoreError> {
        Ok(self
            .store
            .get_stream(scope)
            .await?
            .map(|s| s.window_size())
            .unwrap_or(0))
    }

    /// Atomically replace the rolling summary and clear the compacted
    /// range from the window. Turn bodies stay retrievable from the turn
    /// log by number; only this fast-path list shrinks.
    pub async fn set_summary(
        &self,
        scope: &StreamScope,
        text: &str,
        clear_through: u64,
    ) -> Result<(), StoreError> {
        self.store.set_summary(scope, text, clear_through).await
    }

    /// The full stream record, if the scope has ever been touched.
    pub async fn get(&self, scope: &StreamScope) -> Result<Option<StreamRecord>, StoreError> {
        self.store.get_stream(scope).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memline_core::turn::TurnRole;
    use memline_store::InMemoryStore;

    #[tokio::test]
    async fn touch_grows_the_window() {
        let store: Arc<dyn StateStore> = Arc::new(InMemoryStore::new());
        let index = StreamIndex::new(store.clone());
        let scope = StreamScope::Global;

        assert_eq!(index.window_size(&scope).await.unwrap(), 0);

        for expected in 1..=3usize {
            let turn = store
                .append_turn(&scope, TurnRole::User, "hi", vec![])
                .await
                .unwrap();
            let size = index.touch(&scope, &turn).await.unwrap();
            assert_eq!(size, expected);
        }
        assert_eq!(index.window_size(&scope).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn set_summary_clears_the_compacted_prefix() {
        let store: Arc<dyn StateStore> = Arc::new(InMemoryStore::new());
        let index = StreamIndex::new(store.clone());
        let scope = StreamScope::project("p1");

        for _ in 0..5 {
            let turn = store
                .append_turn(&scope, TurnRole::User, "x", vec![])
                .await
                .unwrap();
            index.touch(&scope, &turn).await.unwrap();
        }

        index.set_summary(&scope, "turns 1-3 condensed", 3).await.unwrap();

        let stream = index.get(&scope).await.unwrap().unwrap();
        assert_eq!(stream.summary, "turns 1-3 condensed");
        let numbers: Vec<u64> = stream.recent_turns.iter().map(|r| r.number).collect();
        assert_eq!(numbers, vec![4, 5]);
    }
}
