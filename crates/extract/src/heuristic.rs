//! Heuristic extractor — deterministic keyword rules, no I/O.
//!
//! The fallback when no LLM is configured, and the workhorse for tests.
//! Confidences are fixed per rule and deliberately lower than what an LLM
//! backend reports, so the ledger's confidence filter stays meaningful.

use async_trait::async_trait;
use memline_core::error::ExtractError;
use memline_core::extract::{CandidateFact, Extractor};
use memline_core::fact::FactCategory;
use memline_core::scope::StreamScope;
use memline_core::turn::Turn;

/// Per-turn cap so a rambling message can't flood the ledger.
const MAX_FACTS_PER_CALL: usize = 8;

/// Cap on the summarizer's output, in chars.
const MAX_SUMMARY_CHARS: usize = 1200;

/// A rule-based extractor: scans sentences for operational phrasing.
pub struct HeuristicExtractor;

impl HeuristicExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Lowercase alphanumeric slug for conflict keys ("Marcus Rivera" -> "marcus-rivera").
    fn slug(text: &str) -> String {
        let mut out = String::new();
        let mut last_dash = true;
        for c in text.chars() {
            if c.is_alphanumeric() {
                out.extend(c.to_lowercase());
                last_dash = false;
            } else if !last_dash {
                out.push('-');
                last_dash = true;
            }
        }
        out.trim_end_matches('-').to_string()
    }

    /// Classify one sentence, if it matches a rule.
    fn classify(sentence: &str) -> Option<CandidateFact> {
        let trimmed = sentence.trim();
        if trimmed.len() < 8 {
            return None;
        }
        let lower = trimmed.to_lowercase();

        // Role statements carry a conflict key: a person has one role.
        if let Some(idx) = lower.find(" is now ") {
            let subject = &lower[..idx];
            if !subject.is_empty() && subject.split_whitespace().count() <= 5 {
                return Some(CandidateFact {
                    text: trimmed.to_string(),
                    category: FactCategory::RoleCorrection,
                    confidence: 0.75,
                    conflict_key: Some(format!("person:{}:role", Self::slug(subject))),
                });
            }
        }

        if lower.contains("assigned to") || lower.contains("will own") || lower.contains("takes over")
        {
            return Some(CandidateFact {
                text: trimmed.to_string(),
                category: FactCategory::Assignment,
                confidence: 0.65,
                conflict_key: None,
            });
        }

        if lower.contains("deadline") || lower.contains("due by") || lower.contains("due on") {
            return Some(CandidateFact {
                text: trimmed.to_string(),
                category: FactCategory::Deadline,
                confidence: 0.7,
                conflict_key: None,
            });
        }

        if lower.contains("decided") || lower.contains("we will go with") || lower.starts_with("decision:")
        {
            return Some(CandidateFact {
                text: trimmed.to_string(),
                category: FactCategory::Decision,
                confidence: 0.65,
                conflict_key: None,
            });
        }

        if lower.contains("blocked") || lower.contains("blocker") {
            return Some(CandidateFact {
                text: trimmed.to_string(),
                category: FactCategory::Blocker,
                confidence: 0.6,
                conflict_key: None,
            });
        }

        if lower.contains("prefer") {
            return Some(CandidateFact {
                text: trimmed.to_string(),
                category: FactCategory::Preference,
                confidence: 0.6,
                conflict_key: None,
            });
        }

        None
    }

    /// First sentence of a turn, capped.
    fn lead_sentence(content: &str) -> &str {
        let end = content
            .char_indices()
            .find(|(_, c)| *c == '.' || *c == '\n')
            .map(|(i, _)| i)
            .unwrap_or(content.len());
        let end = end.min(160);
        // back off to a char boundary if the cap split a codepoint
        let mut end = end;
        while !content.is_char_boundary(end) {
            end -= 1;
        }
        content[..end].trim_end()
    }
}

impl Default for HeuristicExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Extractor for HeuristicExtractor {
    fn name(&self) -> &str {
        "heuristic"
    }

    async fn extract_facts(
        &self,
        text: &str,
        _scope: &StreamScope,
    ) -> Result<Vec<CandidateFact>, ExtractError> {
        let mut facts = Vec::new();
        for sentence in text.split(['.', '\n', '!']) {
            if let Some(fact) = Self::classify(sentence) {
                facts.push(fact);
                if facts.len() >= MAX_FACTS_PER_CALL {
                    break;
                }
            }
        }
        Ok(facts)
    }

    async fn summarize(&self, turns: &[Turn]) -> Result<String, ExtractError> {
        if turns.is_empty() {
            return Err(ExtractError::UnusableOutput("no turns to summarize".into()));
        }

        let mut out = String::new();
        for turn in turns {
            let lead = Self::lead_sentence(&turn.content);
            if lead.is_empty() {
                continue;
            }
            if !out.is_empty() {
                out.push_str("; ");
            }
            out.push_str(&format!("{}: {}", turn.role, lead));
            if out.chars().count() >= MAX_SUMMARY_CHARS {
                break;
            }
        }

        if out.chars().count() > MAX_SUMMARY_CHARS {
            out = out.chars().take(MAX_SUMMARY_CHARS).collect();
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memline_core::turn::TurnRole;

    async fn extract(text: &str) -> Vec<CandidateFact> {
        HeuristicExtractor::new()
            .extract_facts(text, &StreamScope::Global)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn role_statement_gets_conflict_key() {
        let facts = extract("Marcus Rivera is now the Staff Engineer on this project.").await;
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].category, FactCategory::RoleCorrection);
        assert_eq!(facts[0].conflict_key.as_deref(), Some("person:marcus-rivera:role"));
    }

    #[tokio::test]
    async fn deadline_and_decision_detected() {
        let facts = extract(
            "We decided to ship the beta early. The deadline for QA signoff is next Friday.",
        )
        .await;
        let categories: Vec<FactCategory> = facts.iter().map(|f| f.category).collect();
        assert!(categories.contains(&FactCategory::Decision));
        assert!(categories.contains(&FactCategory::Deadline));
    }

    #[tokio::test]
    async fn small_talk_produces_nothing() {
        let facts = extract("Good morning! How was your weekend?").await;
        assert!(facts.is_empty());
    }

    #[tokio::test]
    async fn fact_count_is_capped() {
        let text = "Alpha is blocked on infra. Beta is blocked on review. Gamma is blocked too. \
                    Delta is blocked. Epsilon is blocked. Zeta is blocked. Eta is blocked. \
                    Theta is blocked. Iota is blocked. Kappa is blocked on QA.";
        let facts = extract(text).await;
        assert_eq!(facts.len(), MAX_FACTS_PER_CALL);
    }

    #[tokio::test]
    async fn summarize_is_deterministic_and_bounded() {
        let turns: Vec<Turn> = (1..=30)
            .map(|i| {
                Turn::new(
                    StreamScope::Global,
                    if i % 2 == 1 { TurnRole::User } else { TurnRole::Assistant },
                    format!("Message number {i} talking about rollout status in some detail."),
                    i,
                    vec![],
                )
            })
            .collect();

        let extractor = HeuristicExtractor::new();
        let a = extractor.summarize(&turns).await.unwrap();
        let b = extractor.summarize(&turns).await.unwrap();
        assert_eq!(a, b);
        assert!(a.chars().count() <= MAX_SUMMARY_CHARS);
        assert!(a.starts_with("user: Message number 1"));
    }

    #[tokio::test]
    async fn summarize_empty_is_unusable() {
        let err = HeuristicExtractor::new().summarize(&[]).await.unwrap_err();
        assert!(matches!(err, ExtractError::UnusableOutput(_)));
    }

    #[test]
    fn slug_normalizes() {
        assert_eq!(HeuristicExtractor::slug("Marcus Rivera"), "marcus-rivera");
        assert_eq!(HeuristicExtractor::slug("  J. Doe  "), "j-doe");
    }
}
