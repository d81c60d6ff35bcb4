// src/scoring/mod.rs
//! Multi-factor content scoring: four sub-scores in [0,1], a weighted
//! composite, and a ranked action recommendation per draft.

pub mod weights;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::model::{PostDraft, User};
use crate::predict::EngagementPredictor;
use crate::store::ContentStore;

pub use weights::{update_scoring_weights, FeedbackAggregates, ScoringWeights, WeightsCache};

/// Sub-score used for drafts with no linked source (manual creation).
const NO_SOURCE_CREDIBILITY: f64 = 0.8;
/// Sub-score used when the source lookup fails.
const LOOKUP_FAILURE_CREDIBILITY: f64 = 0.5;
/// Topic relevance for users with no declared interests or expertise.
const NO_INTERESTS_RELEVANCE: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    PostNow,
    ReadyToPost,
    ScheduleOptimal,
    ScheduleLater,
    ReviewAndEdit,
    Skip,
}

impl RecommendedAction {
    pub fn as_str(self) -> &'static str {
        match self {
            RecommendedAction::PostNow => "post_now",
            RecommendedAction::ReadyToPost => "ready_to_post",
            RecommendedAction::ScheduleOptimal => "schedule_optimal",
            RecommendedAction::ScheduleLater => "schedule_later",
            RecommendedAction::ReviewAndEdit => "review_and_edit",
            RecommendedAction::Skip => "skip",
        }
    }
}

/// The four factor scores, each in [0,1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SubScores {
    pub source_credibility: f64,
    pub topic_relevance: f64,
    pub timeliness: f64,
    pub engagement_potential: f64,
}

impl SubScores {
    pub fn composite(&self, w: &ScoringWeights) -> f64 {
        (self.source_credibility * w.source_credibility
            + self.topic_relevance * w.topic_relevance
            + self.timeliness * w.timeliness
            + self.engagement_potential * w.engagement_potential)
            .clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredRecommendation {
    pub draft_id: u64,
    pub composite: f64,
    pub sub_scores: SubScores,
    pub action: RecommendedAction,
    pub explanation: String,
    /// Confidence of the engagement prediction that fed the composite.
    pub engagement_confidence: f64,
}

/// Map a composite score to an action, honoring the auto-posting flag.
pub fn action_for(composite: f64, auto_posting_enabled: bool) -> RecommendedAction {
    if composite >= 0.8 {
        if auto_posting_enabled {
            RecommendedAction::PostNow
        } else {
            RecommendedAction::ReadyToPost
        }
    } else if composite >= 0.6 {
        if auto_posting_enabled {
            RecommendedAction::ScheduleOptimal
        } else {
            RecommendedAction::ScheduleLater
        }
    } else if composite >= 0.4 {
        RecommendedAction::ReviewAndEdit
    } else {
        RecommendedAction::Skip
    }
}

/// Fraction of the user's interest+expertise keywords found in the draft,
/// scaled `min(1, matches/total + 0.3)`.
pub fn topic_relevance(draft_content: &str, user: &User) -> f64 {
    let mut categories: Vec<&str> = user
        .preferences
        .primary_interests
        .iter()
        .chain(user.preferences.expertise_keywords.iter())
        .map(String::as_str)
        .collect();
    categories.sort_unstable();
    categories.dedup();

    if categories.is_empty() {
        return NO_INTERESTS_RELEVANCE;
    }

    let haystack = draft_content.to_lowercase();
    let matches = categories
        .iter()
        .filter(|kw| !kw.is_empty() && haystack.contains(&kw.to_lowercase()))
        .count();

    (matches as f64 / categories.len() as f64 + 0.3).min(1.0)
}

/// Step function of content age: ≤24h → 1.0, ≤48h → 0.8, ≤72h → 0.6,
/// ≤168h → 0.4, else 0.2.
pub fn timeliness(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let age_hours = (now - created_at).num_hours();
    match age_hours {
        h if h <= 24 => 1.0,
        h if h <= 48 => 0.8,
        h if h <= 72 => 0.6,
        h if h <= 168 => 0.4,
        _ => 0.2,
    }
}

fn band(score: f64) -> &'static str {
    if score >= 0.8 {
        "excellent"
    } else if score >= 0.6 {
        "good"
    } else if score >= 0.4 {
        "moderate"
    } else {
        "weak"
    }
}

fn explanation(subs: &SubScores, composite: f64, action: RecommendedAction) -> String {
    let action_text = match action {
        RecommendedAction::PostNow => "post it now",
        RecommendedAction::ReadyToPost => "it is ready to post",
        RecommendedAction::ScheduleOptimal => "schedule it for an optimal slot",
        RecommendedAction::ScheduleLater => "schedule it for later",
        RecommendedAction::ReviewAndEdit => "review and edit before posting",
        RecommendedAction::Skip => "skip it",
    };
    format!(
        "Source credibility is {} ({:.2}), topic relevance is {} ({:.2}), \
         timeliness is {} ({:.2}), engagement potential is {} ({:.2}). \
         Overall score {:.2}: {}.",
        band(subs.source_credibility),
        subs.source_credibility,
        band(subs.topic_relevance),
        subs.topic_relevance,
        band(subs.timeliness),
        subs.timeliness,
        band(subs.engagement_potential),
        subs.engagement_potential,
        composite,
        action_text
    )
}

/// Scores drafts against a user's weights, with engagement prediction as one
/// of the four factors.
pub struct ScoringEngine {
    weights: Arc<WeightsCache>,
    predictor: Arc<EngagementPredictor>,
}

impl ScoringEngine {
    pub fn new(weights: Arc<WeightsCache>, predictor: Arc<EngagementPredictor>) -> Self {
        Self { weights, predictor }
    }

    pub fn weights_cache(&self) -> &WeightsCache {
        &self.weights
    }

    /// Average of the source's processed/found ratio, its failure penalty,
    /// and the per-kind base score. Drafts without a source score 0.8; any
    /// lookup failure scores 0.5.
    async fn source_credibility(&self, store: &dyn ContentStore, draft: &PostDraft) -> f64 {
        let Some(item_id) = draft.content_item_id else {
            return NO_SOURCE_CREDIBILITY;
        };

        let item = match store.get_content(item_id).await {
            Ok(Some(item)) => item,
            _ => return LOOKUP_FAILURE_CREDIBILITY,
        };
        let source = match store.get_source(item.source_id).await {
            Ok(Some(source)) => source,
            _ => return LOOKUP_FAILURE_CREDIBILITY,
        };

        let processed_ratio = if source.items_found > 0 {
            (source.items_processed as f64 / source.items_found as f64).clamp(0.0, 1.0)
        } else {
            0.5
        };
        let reliability = 1.0 - (f64::from(source.consecutive_failures) * 0.1).min(0.5);
        let base = source.kind.base_credibility();

        (processed_ratio + reliability + base) / 3.0
    }

    /// Timeliness is measured from the linked content item's publication
    /// when available, else from the draft's creation.
    async fn content_created_at(
        &self,
        store: &dyn ContentStore,
        draft: &PostDraft,
    ) -> DateTime<Utc> {
        if let Some(item_id) = draft.content_item_id {
            if let Ok(Some(item)) = store.get_content(item_id).await {
                return item.published_at;
            }
        }
        draft.created_at
    }

    pub async fn score_content(
        &self,
        store: &dyn ContentStore,
        draft: &PostDraft,
        user: &User,
        now: DateTime<Utc>,
    ) -> ScoredRecommendation {
        let prediction = self.predictor.predict(store, draft, user, now).await;
        let subs = SubScores {
            source_credibility: self.source_credibility(store, draft).await,
            topic_relevance: topic_relevance(&draft.content, user),
            timeliness: timeliness(self.content_created_at(store, draft).await, now),
            engagement_potential: prediction.rate.clamp(0.0, 1.0),
        };

        let w = self.weights.get_or_default(user.id);
        let composite = subs.composite(&w);
        let action = action_for(composite, user.preferences.auto_posting_enabled);

        debug!(
            target: "scoring",
            draft_id = draft.id,
            composite,
            action = action.as_str(),
            "scored draft"
        );

        ScoredRecommendation {
            draft_id: draft.id,
            composite,
            sub_scores: subs,
            action,
            explanation: explanation(&subs, composite, action),
            engagement_confidence: prediction.confidence,
        }
    }
}
