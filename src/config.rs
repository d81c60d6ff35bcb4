// src/config.rs
//! Typed user preferences and engine tunables.
//!
//! Preferences arrive from the persistence layer as JSON; every field has a
//! documented default so a partially filled profile still deserializes.
//! `validate()` rejects out-of-range values instead of silently coercing;
//! callers that cannot surface a `Validation` error use
//! `validated_or_default()` to fall back to the documented defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{PipelineError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "config/linkpilot.toml";
pub const ENV_CONFIG_PATH: &str = "LINKPILOT_CONFIG_PATH";

/// How often the user wants to post. Drives the daily/weekly frequency caps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PostingFrequency {
    MultipleDaily,
    #[default]
    Daily,
    FewTimesWeek,
    Weekly,
}

impl PostingFrequency {
    /// (max_posts_per_day, max_posts_per_week)
    pub fn frequency_caps(self) -> (u32, u32) {
        match self {
            PostingFrequency::MultipleDaily => (3, 15),
            PostingFrequency::Daily => (1, 7),
            PostingFrequency::FewTimesWeek => (1, 4),
            PostingFrequency::Weekly => (1, 2),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UserPreferences {
    pub posting_frequency: PostingFrequency,
    pub auto_posting_enabled: bool,
    /// Relevance gate threshold in [0,1].
    pub min_relevance_score: f64,
    pub primary_interests: Vec<String>,
    pub expertise_keywords: Vec<String>,
    pub topics_to_avoid: Vec<String>,
    pub min_word_count: usize,
    pub content_freshness_hours: i64,
    pub min_hours_between_posts: i64,
    pub avoid_weekends: bool,
    pub business_hours_only: bool,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            posting_frequency: PostingFrequency::Daily,
            auto_posting_enabled: false,
            min_relevance_score: 0.7,
            primary_interests: Vec::new(),
            expertise_keywords: Vec::new(),
            topics_to_avoid: Vec::new(),
            min_word_count: 200,
            content_freshness_hours: 72,
            min_hours_between_posts: 4,
            avoid_weekends: false,
            business_hours_only: false,
        }
    }
}

impl UserPreferences {
    /// Reject out-of-range values. No coercion.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_relevance_score) {
            return Err(PipelineError::Validation(format!(
                "min_relevance_score must be in [0,1], got {}",
                self.min_relevance_score
            )));
        }
        if self.min_word_count == 0 {
            return Err(PipelineError::Validation(
                "min_word_count must be positive".into(),
            ));
        }
        if self.content_freshness_hours <= 0 {
            return Err(PipelineError::Validation(format!(
                "content_freshness_hours must be positive, got {}",
                self.content_freshness_hours
            )));
        }
        if self.min_hours_between_posts < 0 {
            return Err(PipelineError::Validation(format!(
                "min_hours_between_posts must be non-negative, got {}",
                self.min_hours_between_posts
            )));
        }
        Ok(())
    }

    /// Documented fallback: invalid preferences are replaced wholesale by the
    /// defaults (logged by the caller), never partially patched.
    pub fn validated_or_default(self) -> Self {
        match self.validate() {
            Ok(()) => self,
            Err(e) => {
                tracing::warn!(target: "config", error = %e, "invalid preferences, using defaults");
                Self::default()
            }
        }
    }

    /// Interest context handed to the relevance oracle.
    pub fn interest_context(&self) -> String {
        let mut parts: Vec<&str> = self
            .primary_interests
            .iter()
            .chain(self.expertise_keywords.iter())
            .map(String::as_str)
            .collect();
        parts.dedup();
        parts.join(", ")
    }
}

/// Relevance stage tunables. Batch size and delay exist to respect oracle
/// rate limits; the delay between batches is mandatory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RelevanceConfig {
    pub batch_size: usize,
    pub batch_delay_ms: u64,
    pub call_timeout_secs: u64,
    /// Articles are truncated to this many chars before the oracle call.
    pub max_content_chars: usize,
}

impl Default for RelevanceConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            batch_delay_ms: 2_000,
            call_timeout_secs: 30,
            max_content_chars: 4_000,
        }
    }
}

impl RelevanceConfig {
    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

/// Root of `config/linkpilot.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub relevance: RelevanceConfig,
    /// Pipeline tick interval for the background scheduler, in seconds.
    pub run_interval_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            relevance: RelevanceConfig::default(),
            run_interval_secs: 900,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: EngineConfig =
            toml::from_str(s).map_err(|e| PipelineError::Validation(e.to_string()))?;
        Ok(cfg)
    }

    /// Load from `$LINKPILOT_CONFIG_PATH` or `config/linkpilot.toml`;
    /// missing file means defaults.
    pub fn load_default() -> Self {
        let path = std::env::var(ENV_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(s) => Self::from_toml_str(&s).unwrap_or_else(|e| {
                tracing::warn!(target: "config", error = %e, path = %path.display(), "bad engine config, using defaults");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }
}
