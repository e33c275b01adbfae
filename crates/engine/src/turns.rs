//! Turn log — append-only access to the dialogue ledger.
//!
//! No update or delete exists. A failed append is surfaced to the caller
//! and the turn is not part of the stream.

use memline_core::error::StoreError;
use memline_core::scope::StreamScope;
use memline_core::store::StateStore;
use memline_core::turn::{Citation, Turn, TurnRole};
use std::sync::Arc;

/// Thin component over the store's turn collection.
#[derive(Clone)]
pub struct TurnLog {
    store: Arc<dyn StateStore>,
}

impl TurnLog {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    /// Append a turn; the store assigns the next number and persists
    /// before returning.
    pub async fn append(
        &self,
        scope: &StreamScope,
        role: TurnRole,
        content: &str,
        citations: Vec<Citation>,
    ) -> Result<Turn, StoreError> {
        self.store.append_turn(scope, role, content, citations).await
    }

    /// Turns with numbers in `[from, to]`, ordered by number.
    pub async fn list(
        &self,
        scope: &StreamScope,
        from: u64,
        to: u64,
    ) -> Result<Vec<Turn>, StoreError> {
        self.store.list_turns(scope, from, to).await
    }
}
