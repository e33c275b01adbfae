//! The Memline engine — durable, bounded, internally-consistent recall.
//!
//! Every inbound dialogue turn flows through one cycle:
//!
//! 1. **Append** to the turn log and the stream's recent-turns window
//! 2. **Extract** candidate facts from the user+assistant pair and merge
//!    them into the fact ledger (supersession, not mutation)
//! 3. **Compact** the oldest window run into a rolling summary once the
//!    window crosses the threshold
//! 4. **Assemble** a bounded context for the next LLM call, deterministic
//!    under a strict character budget
//!
//! Mutation is serialized per stream scope and fully parallel across
//! scopes. Extraction and compaction failures degrade (warn-level), they
//! never fail the turn.

pub mod assemble;
pub mod compaction;
pub mod index;
pub mod ledger;
pub mod service;
pub mod turns;

pub use assemble::{AssembledContext, SectionStats, assemble};
pub use compaction::{CompactionEngine, CompactionReport};
pub use index::StreamIndex;
pub use ledger::{FactLedger, MANUAL_EXTRACTOR, ProposeFailure, ProposeReport};
pub use service::{MemoryService, TurnReceipt};
pub use turns::TurnLog;
