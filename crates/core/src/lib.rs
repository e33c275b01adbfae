//! # Memline Core
//!
//! Domain types, traits, and error definitions for the Memline operational
//! memory engine. This crate has **zero framework dependencies** — it defines
//! the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! The two seams of the system are defined as traits here:
//! - [`StateStore`] — the persistent store for turns, streams, hard facts,
//!   and compacted summaries
//! - [`Extractor`] — the external fact-extraction / summarization service
//!
//! Implementations live in their respective crates. This enables swapping
//! backends via configuration and testing the engine with scripted stubs.

pub mod error;
pub mod extract;
pub mod fact;
pub mod scope;
pub mod store;
pub mod stream;
pub mod summary;
pub mod turn;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ExtractError, Result, StoreError};
pub use extract::{CandidateFact, Extractor};
pub use fact::{FactCategory, HardFact, Provenance};
pub use scope::StreamScope;
pub use store::StateStore;
pub use stream::{StreamRecord, TurnRef};
pub use summary::CompactedSummary;
pub use turn::{Citation, Turn, TurnRole};
