//! Context assembly — deterministic, budget-bounded.
//!
//! Pure function over already-persisted state. Never suspends, never
//! calls out, so it is safe on a hot request path. Three priority
//! tiers, each consuming only what the higher tiers left:
//!
//! 1. active facts, newest first (never skipped while budget remains)
//! 2. recent turns, most-recent-first, verbatim `role: content`
//! 3. rolling summary, truncated to the remainder
//!
//! Items that would overflow the remaining budget are truncated by
//! character count, not dropped wholesale.

use memline_core::fact::HardFact;
use memline_core::turn::Turn;

const FACTS_HEADER: &str = "Known facts:\n";
const TURNS_HEADER: &str = "Recent turns:\n";
const SUMMARY_HEADER: &str = "Earlier conversation summary:\n";

/// Per-tier accounting for the assembled output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SectionStats {
    /// Characters this tier contributed, headers included
    pub chars: usize,
    /// Items that landed, fully or truncated
    pub included: usize,
    /// Items that were available
    pub total: usize,
}

/// The bounded context for the next model call.
#[derive(Debug, Clone)]
pub struct AssembledContext {
    pub text: String,
    pub budget_chars: usize,
    pub facts: SectionStats,
    pub turns: SectionStats,
    pub summary: SectionStats,
}

impl AssembledContext {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn chars_used(&self) -> usize {
        self.facts.chars + self.turns.chars + self.summary.chars
    }
}

/// Character-counting writer that refuses to exceed its allowance.
struct BudgetWriter {
    out: String,
    remaining: usize,
}

impl BudgetWriter {
    fn new(budget: usize) -> Self {
        Self {
            out: String::new(),
            remaining: budget,
        }
    }

    /// Append up to `remaining` characters of `s`; returns how many landed.
    fn push(&mut self, s: &str) -> usize {
        let mut written = 0;
        for c in s.chars() {
            if self.remaining == 0 {
                break;
            }
            self.out.push(c);
            self.remaining -= 1;
            written += 1;
        }
        written
    }

    fn fits_header(&self, header: &str) -> bool {
        // A header only earns its keep if at least one content char
        // can follow it.
        self.remaining > header.chars().count()
    }
}

/// Assemble a context from stream state. `facts` is expected newest
/// first (ledger order); `recent_turns` in stream order, rendered
/// most-recent-first. Output never exceeds `budget_chars`; a zero
/// budget yields an empty context.
pub fn assemble(
    facts: &[HardFact],
    recent_turns: &[Turn],
    summary: Option<&str>,
    budget_chars: usize,
) -> AssembledContext {
    let mut writer = BudgetWriter::new(budget_chars);

    let mut fact_stats = SectionStats {
        total: facts.len(),
        ..Default::default()
    };
    if !facts.is_empty() && writer.remaining > 0 {
        if writer.fits_header(FACTS_HEADER) {
            fact_stats.chars += writer.push(FACTS_HEADER);
        }
        for fact in facts {
            if writer.remaining == 0 {
                break;
            }
            fact_stats.chars += writer.push(&format!("- {}\n", fact.text));
            fact_stats.included += 1;
        }
    }

    let mut turn_stats = SectionStats {
        total: recent_turns.len(),
        ..Default::default()
    };
    if !recent_turns.is_empty() && writer.remaining > 0 {
        if writer.fits_header(TURNS_HEADER) {
            turn_stats.chars += writer.push(TURNS_HEADER);
        }
        for turn in recent_turns.iter().rev() {
            if writer.remaining == 0 {
                break;
            }
            turn_stats.chars += writer.push(&format!("{}: {}\n", turn.role, turn.content));
            turn_stats.included += 1;
        }
    }

    let mut summary_stats = SectionStats::default();
    if let Some(text) = summary.filter(|t| !t.is_empty()) {
        summary_stats.total = 1;
        if writer.remaining > 0 {
            if writer.fits_header(SUMMARY_HEADER) {
                summary_stats.chars += writer.push(SUMMARY_HEADER);
            }
            if writer.remaining > 0 {
                summary_stats.chars += writer.push(text);
                summary_stats.included = 1;
            }
        }
    }

    AssembledContext {
        text: writer.out,
        budget_chars,
        facts: fact_stats,
        turns: turn_stats,
        summary: summary_stats,
    }
}
