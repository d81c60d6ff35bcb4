// src/ingest/filter.rs
//! Per-user keyword/freshness/length filtering.
//!
//! Checks run in a fixed order: length → freshness → avoid-list → interest
//! allow-list. The first failing check rejects the article; rejected items
//! are never scored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::UserPreferences;
use crate::model::Article;

/// Why an article was rejected by the filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum RejectReason {
    TooShort { words: usize, min: usize },
    Stale { age_hours: i64, max_hours: i64 },
    AvoidedTopic { keyword: String },
    NoInterestMatch,
}

/// Filter rules for one source, normally derived from user preferences.
/// Sources may carry an explicit override (`ContentSource::filters`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FilterRules {
    pub min_word_count: usize,
    pub max_age_hours: i64,
    /// "topics_to_avoid": any substring hit rejects.
    pub exclude_keywords: Vec<String>,
    /// "primary_interests": when non-empty, at least one must match.
    pub include_keywords: Vec<String>,
}

impl Default for FilterRules {
    fn default() -> Self {
        let p = UserPreferences::default();
        Self {
            min_word_count: p.min_word_count,
            max_age_hours: p.content_freshness_hours,
            exclude_keywords: Vec::new(),
            include_keywords: Vec::new(),
        }
    }
}

impl FilterRules {
    pub fn from_preferences(prefs: &UserPreferences) -> Self {
        Self {
            min_word_count: prefs.min_word_count,
            max_age_hours: prefs.content_freshness_hours,
            exclude_keywords: prefs.topics_to_avoid.clone(),
            include_keywords: prefs.primary_interests.clone(),
        }
    }
}

/// Evaluate one article. `Ok(())` means the article advances to scoring.
pub fn evaluate(article: &Article, rules: &FilterRules, now: DateTime<Utc>) -> Result<(), RejectReason> {
    // 1) Length
    let words = article.word_count();
    if words < rules.min_word_count {
        return Err(RejectReason::TooShort {
            words,
            min: rules.min_word_count,
        });
    }

    // 2) Freshness
    let age_hours = (now - article.published_at).num_hours();
    if age_hours > rules.max_age_hours {
        return Err(RejectReason::Stale {
            age_hours,
            max_hours: rules.max_age_hours,
        });
    }

    // 3) Avoid-list (substring, case-insensitive, over title+content)
    let haystack = format!("{} {}", article.title, article.content).to_lowercase();
    for kw in &rules.exclude_keywords {
        let needle = kw.to_lowercase();
        if !needle.is_empty() && haystack.contains(&needle) {
            return Err(RejectReason::AvoidedTopic { keyword: kw.clone() });
        }
    }

    // 4) Interest allow-list (only when the user declared interests)
    if !rules.include_keywords.is_empty() {
        let any_hit = rules
            .include_keywords
            .iter()
            .map(|kw| kw.to_lowercase())
            .any(|needle| !needle.is_empty() && haystack.contains(&needle));
        if !any_hit {
            return Err(RejectReason::NoInterestMatch);
        }
    }

    Ok(())
}

/// Per-run tally of filter decisions; feeds PipelineStats and metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterOutcome {
    pub accepted: usize,
    pub too_short: usize,
    pub stale: usize,
    pub avoided_topic: usize,
    pub no_interest: usize,
}

impl FilterOutcome {
    pub fn record(&mut self, result: &Result<(), RejectReason>) {
        match result {
            Ok(()) => self.accepted += 1,
            Err(RejectReason::TooShort { .. }) => self.too_short += 1,
            Err(RejectReason::Stale { .. }) => self.stale += 1,
            Err(RejectReason::AvoidedTopic { .. }) => self.avoided_topic += 1,
            Err(RejectReason::NoInterestMatch) => self.no_interest += 1,
        }
    }

    pub fn rejected(&self) -> usize {
        self.too_short + self.stale + self.avoided_topic + self.no_interest
    }
}
