// src/model.rs
//! Domain types shared across the pipeline and the recommendation engine.
//!
//! `Article` is the ephemeral fetch-stage unit; `ContentItem` is what
//! survives triage and gets persisted; `PostDraft` is a generated LinkedIn
//! post candidate awaiting scheduling or publication.

use chrono::{DateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::config::UserPreferences;
use crate::ingest::filter::FilterRules;

/// Ephemeral fetched content unit before the persistence decision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Article {
    pub title: String,
    pub url: String,
    pub content: String,
    pub author: Option<String>,
    pub published_at: DateTime<Utc>,
    pub source_id: u64,
    pub source_name: String,
}

impl Article {
    pub fn word_count(&self) -> usize {
        self.content.split_whitespace().count()
    }
}

/// Verdict attached by the relevance oracle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AiAnalysis {
    pub reasoning: String,
    pub topic_category: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentStatus {
    Pending,
    Processing,
    Processed,
    Failed,
    Skipped,
}

/// Persisted, scored content unit eligible for draft generation.
/// The URL is globally unique (store-enforced); `relevance_score` is only
/// set after the scoring stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentItem {
    pub id: u64,
    pub source_id: u64,
    pub title: String,
    pub url: String,
    pub content: String,
    pub author: Option<String>,
    pub published_at: DateTime<Utc>,
    /// 0..=100, `round(oracle_score * 100)`.
    pub relevance_score: Option<u8>,
    pub ai_analysis: Option<AiAnalysis>,
    pub status: ContentStatus,
    pub word_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    RssFeed,
    Website,
    Newsletter,
    Manual,
    LinkedIn,
}

impl SourceKind {
    /// Fixed per-source-type credibility base score.
    pub fn base_credibility(self) -> f64 {
        match self {
            SourceKind::RssFeed => 0.8,
            SourceKind::Website => 0.7,
            SourceKind::Newsletter => 0.9,
            SourceKind::Manual => 0.8,
            SourceKind::LinkedIn => 0.6,
        }
    }
}

/// A user-owned content source with rolling ingestion counters.
/// Updated by every ingestion pass, success or failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentSource {
    pub id: u64,
    pub user_id: u64,
    pub name: String,
    pub url: String,
    pub kind: SourceKind,
    pub check_interval_hours: u32,
    pub is_active: bool,
    /// Optional per-source override of the user-level filter rules.
    pub filters: Option<FilterRules>,
    pub items_found: u64,
    pub items_processed: u64,
    pub consecutive_failures: u32,
    pub last_checked_at: Option<DateTime<Utc>>,
}

impl ContentSource {
    /// Whether this source is due for a check at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_checked_at {
            None => true,
            Some(last) => now - last >= chrono::Duration::hours(self.check_interval_hours as i64),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftStatus {
    Draft,
    Ready,
    Scheduled,
    Published,
    Failed,
    Archived,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngagementMetrics {
    pub likes: u32,
    pub comments: u32,
    pub shares: u32,
    pub views: u32,
    pub clicks: u32,
    pub last_updated_unix: u64,
}

impl EngagementMetrics {
    pub fn total_interactions(&self) -> u32 {
        self.likes + self.comments + self.shares
    }

    /// `(likes+comments+shares)/views`; `None` when views is zero.
    pub fn engagement_rate(&self) -> Option<f64> {
        if self.views == 0 {
            return None;
        }
        Some(f64::from(self.total_interactions()) / f64::from(self.views))
    }

    /// Slot-building weight: likes ×1, comments ×2, shares ×3.
    pub fn weighted_engagement(&self) -> f64 {
        f64::from(self.likes) + 2.0 * f64::from(self.comments) + 3.0 * f64::from(self.shares)
    }
}

/// A generated LinkedIn post candidate.
/// Invariants: `scheduled_for` is set only when status is `Scheduled`;
/// `published_at` only when status is `Published`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostDraft {
    pub id: u64,
    pub user_id: u64,
    pub content_item_id: Option<u64>,
    pub content: String,
    pub hashtags: Vec<String>,
    pub status: DraftStatus,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    pub engagement: Option<EngagementMetrics>,
    pub publication_attempts: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: u64,
    pub preferences: UserPreferences,
}

/// A recommended posting window with expected performance.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TimeSlot {
    pub day_of_week: Weekday,
    pub hour: u32,
    pub minute: u32,
    /// Relative expected engagement in [0,1].
    pub expected_engagement: f64,
    pub confidence: f64,
    pub reasoning: String,
}

/// Aggregate result of one pipeline run. Per-item failures land in `errors`
/// instead of aborting the run.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct PipelineStats {
    pub users_processed: u64,
    pub sources_processed: u64,
    pub articles_fetched: u64,
    /// Articles that survived dedup + keyword filtering.
    pub articles_filtered: u64,
    /// Articles that received an oracle verdict and passed the gate.
    pub articles_scored: u64,
    pub articles_persisted: u64,
    pub drafts_enqueued: u64,
    pub errors: Vec<String>,
}

impl PipelineStats {
    pub fn merge(&mut self, other: PipelineStats) {
        self.users_processed += other.users_processed;
        self.sources_processed += other.sources_processed;
        self.articles_fetched += other.articles_fetched;
        self.articles_filtered += other.articles_filtered;
        self.articles_scored += other.articles_scored;
        self.articles_persisted += other.articles_persisted;
        self.drafts_enqueued += other.drafts_enqueued;
        self.errors.extend(other.errors);
    }
}
