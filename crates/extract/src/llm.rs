//! LLM-backed extractor.
//!
//! Talks to an Anthropic-style Messages API:
//! - `x-api-key` header authentication
//! - `anthropic-version` header
//! - system prompt as a top-level field
//!
//! Every call is wrapped in a bounded timeout; on expiry the caller gets
//! `ExtractError::Timeout` and treats the operation as failed (no facts /
//! compaction aborted). Prompt content asks for strict JSON so the reply
//! can be parsed without scraping.

use async_trait::async_trait;
use memline_core::error::ExtractError;
use memline_core::extract::{CandidateFact, Extractor};
use memline_core::fact::FactCategory;
use memline_core::scope::StreamScope;
use memline_core::turn::Turn;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_TOKENS: u32 = 1024;

const FACT_SYSTEM_PROMPT: &str = "You extract permanent operational facts from project dialogue: \
role changes, assignments, deadlines, decisions, org structure, project facts, preferences, blockers. \
Reply with ONLY a JSON array, no prose. Each element: \
{\"text\": string, \"category\": one of role_correction|assignment|deadline|decision|organizational|project_fact|preference|blocker, \
\"confidence\": number in [0,1], \"conflict_key\": string or null (identity of the mutable attribute, \
e.g. person:marcus:role, when the fact can be superseded later)}. \
Reply [] if the dialogue contains no durable facts.";

const SUMMARY_SYSTEM_PROMPT: &str = "You compact project dialogue into a short narrative. \
Preserve operationally relevant content: ownership changes, decisions, deadlines, open blockers. \
Drop pleasantries and phrasing detail. Reply with the narrative only.";

/// Anthropic-style Messages API extractor.
pub struct LlmExtractor {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl LlmExtractor {
    /// Create a new LLM extractor.
    pub fn new(api_key: impl Into<String>) -> Self {
        let timeout = Duration::from_secs(DEFAULT_TIMEOUT_SECS);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            name: "llm".into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.into(),
            timeout,
            client,
        }
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    /// One bounded completion call. Returns the concatenated text blocks.
    async fn complete(&self, system: &str, user: String) -> Result<String, ExtractError> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "system": system,
            "messages": [{"role": "user", "content": user}],
            "max_tokens": MAX_TOKENS,
            "temperature": 0.0,
        });

        debug!(model = %self.model, "Sending extractor request");

        let request = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send();

        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| ExtractError::Timeout {
                timeout_secs: self.timeout.as_secs(),
            })?
            .map_err(|e| {
                if e.is_timeout() {
                    ExtractError::Timeout {
                        timeout_secs: self.timeout.as_secs(),
                    }
                } else {
                    ExtractError::Failed(format!("network error: {e}"))
                }
            })?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Extractor API error");
            return Err(ExtractError::Failed(format!(
                "API returned {status}: {error_body}"
            )));
        }

        let api_resp: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ExtractError::UnusableOutput(format!("bad response body: {e}")))?;

        let text: String = api_resp
            .content
            .iter()
            .filter_map(|block| match block {
                ResponseContentBlock::Text { text } => Some(text.as_str()),
                ResponseContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        if text.is_empty() {
            return Err(ExtractError::UnusableOutput("empty completion".into()));
        }
        Ok(text)
    }

    /// Parse the model's reply into candidates. Tolerates code fences and
    /// surrounding prose by slicing the outermost JSON array.
    fn parse_candidates(reply: &str) -> Result<Vec<CandidateFact>, ExtractError> {
        let start = reply.find('[');
        let end = reply.rfind(']');
        let (Some(start), Some(end)) = (start, end) else {
            return Err(ExtractError::UnusableOutput(
                "no JSON array in extractor reply".into(),
            ));
        };
        if end < start {
            return Err(ExtractError::UnusableOutput(
                "malformed JSON array in extractor reply".into(),
            ));
        }

        let wire: Vec<WireCandidate> = serde_json::from_str(&reply[start..=end])
            .map_err(|e| ExtractError::UnusableOutput(format!("bad candidate JSON: {e}")))?;

        let mut candidates = Vec::with_capacity(wire.len());
        for w in wire {
            let Some(category) = FactCategory::parse(&w.category) else {
                warn!(category = %w.category, "Skipping candidate with unknown category");
                continue;
            };
            candidates.push(CandidateFact {
                text: w.text,
                category,
                confidence: w.confidence.clamp(0.0, 1.0),
                conflict_key: w.conflict_key,
            });
        }
        Ok(candidates)
    }

    fn render_turns(turns: &[Turn]) -> String {
        let mut out = String::new();
        for turn in turns {
            out.push_str(&format!("[{}] {}: {}\n", turn.number, turn.role, turn.content));
        }
        out
    }
}

#[async_trait]
impl Extractor for LlmExtractor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn extract_facts(
        &self,
        text: &str,
        scope: &StreamScope,
    ) -> Result<Vec<CandidateFact>, ExtractError> {
        let user = format!("Stream: {scope}\n\nDialogue:\n{text}");
        let reply = self.complete(FACT_SYSTEM_PROMPT, user).await?;
        Self::parse_candidates(&reply)
    }

    async fn summarize(&self, turns: &[Turn]) -> Result<String, ExtractError> {
        if turns.is_empty() {
            return Err(ExtractError::UnusableOutput("no turns to summarize".into()));
        }
        let user = format!(
            "Summarize turns {}..{}:\n\n{}",
            turns[0].number,
            turns[turns.len() - 1].number,
            Self::render_turns(turns)
        );
        let reply = self.complete(SUMMARY_SYSTEM_PROMPT, user).await?;
        Ok(reply.trim().to_string())
    }
}

// --- API types ---

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ResponseContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct WireCandidate {
    text: String,
    category: String,
    #[serde(default)]
    confidence: f32,
    #[serde(default)]
    conflict_key: Option<String>,
}
