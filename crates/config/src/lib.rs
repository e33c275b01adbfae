//! Configuration loading, validation, and management for Memline.
//!
//! Loads configuration from `~/.memline/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use memline_core::error::Error;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.memline/config.toml`.
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Storage backend settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Compaction thresholds
    #[serde(default)]
    pub compaction: CompactionConfig,

    /// Fact-ledger policy
    #[serde(default)]
    pub facts: FactsConfig,

    /// Extractor backend settings
    #[serde(default)]
    pub extractor: ExtractorConfig,
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("store", &self.store)
            .field("compaction", &self.compaction)
            .field("facts", &self.facts)
            .field("extractor", &self.extractor)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Backend name: "sqlite" or "memory"
    #[serde(default = "default_store_backend")]
    pub backend: String,

    /// SQLite database path (ignored by the in-memory backend)
    #[serde(default = "default_store_path")]
    pub path: String,
}

fn default_store_backend() -> String {
    "sqlite".into()
}
fn default_store_path() -> String {
    "~/.memline/memline.db".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            path: default_store_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactionConfig {
    /// Window size above which a compaction cycle fires
    #[serde(default = "default_threshold")]
    pub threshold: usize,

    /// How many of the most recent turns stay verbatim in the window
    #[serde(default = "default_keep_tail")]
    pub keep_tail: usize,
}

fn default_threshold() -> usize {
    20
}
fn default_keep_tail() -> usize {
    5
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            keep_tail: default_keep_tail(),
        }
    }
}

/// How two candidates targeting the same conflict key within one extraction
/// batch are resolved. The upstream behavior is insertion order, so
/// `LastWins` is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Apply candidates in order received; the later one supersedes.
    #[default]
    LastWins,
    /// Keep the first candidate; later same-key candidates in the batch
    /// are discarded and logged.
    FirstWins,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactsConfig {
    /// Candidates below this confidence are discarded, not stored
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,

    /// Same-key tie-break within one propose batch
    #[serde(default)]
    pub conflict_policy: ConflictPolicy,
}

fn default_min_confidence() -> f32 {
    0.55
}

impl Default for FactsConfig {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
            conflict_policy: ConflictPolicy::default(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Backend name: "llm" or "heuristic"
    #[serde(default = "default_extractor_backend")]
    pub backend: String,

    /// API key for the LLM backend (env `MEMLINE_API_KEY` overrides)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the completion endpoint
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Model identifier
    #[serde(default = "default_model")]
    pub model: String,

    /// Bounded timeout for every extractor call, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_extractor_backend() -> String {
    "heuristic".into()
}
fn default_api_url() -> String {
    "https://api.anthropic.com".into()
}
fn default_model() -> String {
    "claude-sonnet-4-20250514".into()
}
fn default_timeout_secs() -> u64 {
    30
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            backend: default_extractor_backend(),
            api_key: None,
            api_url: default_api_url(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl std::fmt::Debug for ExtractorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractorConfig")
            .field("backend", &self.backend)
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl AppConfig {
    /// The default config file location: `~/.memline/config.toml`.
    pub fn default_path() -> PathBuf {
        dirs_home()
            .join(".memline")
            .join("config.toml")
    }

    /// Load config from a TOML file, apply environment overrides, and
    /// validate. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let mut config: AppConfig = if path.exists() {
            let raw = std::fs::read_to_string(path).map_err(|e| Error::Config {
                message: format!("failed to read {}: {e}", path.display()),
            })?;
            toml::from_str(&raw).map_err(|e| Error::Config {
                message: format!("invalid TOML in {}: {e}", path.display()),
            })?
        } else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            AppConfig::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Environment variables win over file values.
    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("MEMLINE_API_KEY") {
            if !key.is_empty() {
                self.extractor.api_key = Some(key);
            }
        }
        if let Ok(path) = std::env::var("MEMLINE_DB_PATH") {
            if !path.is_empty() {
                self.store.path = path;
            }
        }
    }

    /// Validate settings. Run once at startup.
    pub fn validate(&self) -> Result<(), Error> {
        match self.store.backend.as_str() {
            "sqlite" | "memory" => {}
            other => {
                return Err(Error::Config {
                    message: format!("unknown store backend '{other}' (expected sqlite|memory)"),
                });
            }
        }
        match self.extractor.backend.as_str() {
            "llm" | "heuristic" => {}
            other => {
                return Err(Error::Config {
                    message: format!("unknown extractor backend '{other}' (expected llm|heuristic)"),
                });
            }
        }
        if self.extractor.backend == "llm" && self.extractor.api_key.is_none() {
            return Err(Error::Config {
                message: "extractor backend 'llm' requires an API key \
                          (set extractor.api_key or MEMLINE_API_KEY)"
                    .into(),
            });
        }
        if !(0.0..=1.0).contains(&self.facts.min_confidence) {
            return Err(Error::Config {
                message: format!(
                    "facts.min_confidence must be in [0.0, 1.0], got {}",
                    self.facts.min_confidence
                ),
            });
        }
        if self.compaction.keep_tail >= self.compaction.threshold {
            return Err(Error::Config {
                message: format!(
                    "compaction.keep_tail ({}) must be smaller than compaction.threshold ({})",
                    self.compaction.keep_tail, self.compaction.threshold
                ),
            });
        }
        if self.extractor.timeout_secs == 0 {
            return Err(Error::Config {
                message: "extractor.timeout_secs must be nonzero".into(),
            });
        }
        Ok(())
    }
}

fn dirs_home() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}
