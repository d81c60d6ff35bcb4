// src/predict/mod.rs
//! Engagement prediction: a fixed 10-dimensional feature vector over post
//! text plus timing, a per-user ridge model with a global baseline fallback,
//! and a hard-coded default when neither can be trained.

pub mod cache;
pub mod ridge;

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::model::{PostDraft, User};
use crate::store::ContentStore;

pub use cache::{ModelCache, ModelKey, ModelKind, TrainedModel};
pub use ridge::{DEFAULT_LAMBDA, FEATURE_DIM};

/// Call-to-action phrases checked case-insensitively.
const CTA_PHRASES: &[&str] = &[
    "what do you think",
    "share your thoughts",
    "let me know",
    "comment below",
    "join the conversation",
    "check out",
    "learn more",
    "sign up",
    "dm me",
];

fn has_emoji(content: &str) -> bool {
    content.chars().any(|c| {
        matches!(u32::from(c),
            0x1F300..=0x1FAFF   // symbols, pictographs, supplemental
            | 0x2600..=0x27BF   // misc symbols, dingbats
            | 0x1F1E6..=0x1F1FF // regional indicators
        )
    })
}

/// The fixed feature vector: content_length, hashtag_count, has_question,
/// has_call_to_action, has_emoji, has_url, word_count, sentence_count,
/// hour_of_day, day_of_week.
pub fn extract_features(content: &str, hashtag_count: usize, at: DateTime<Utc>) -> [f64; FEATURE_DIM] {
    let lower = content.to_lowercase();
    let has_cta = CTA_PHRASES.iter().any(|p| lower.contains(p));
    let sentence_count = content
        .split(['.', '!', '?'])
        .filter(|s| !s.trim().is_empty())
        .count();

    let flag = |b: bool| if b { 1.0 } else { 0.0 };
    let has_url =
        lower.contains("http://") || lower.contains("https://") || lower.contains("www.");

    [
        content.chars().count() as f64,
        hashtag_count as f64,
        flag(content.contains('?')),
        flag(has_cta),
        flag(has_emoji(content)),
        flag(has_url),
        content.split_whitespace().count() as f64,
        sentence_count as f64,
        f64::from(at.hour()),
        f64::from(at.weekday().num_days_from_monday()),
    ]
}

fn draft_features(draft: &PostDraft, at: DateTime<Utc>) -> [f64; FEATURE_DIM] {
    let hashtag_count = draft
        .hashtags
        .len()
        .max(draft.content.matches('#').count());
    extract_features(&draft.content, hashtag_count, at)
}

/// Where a prediction came from; fixes the reported confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictionSource {
    UserModel,
    Baseline,
    Default,
}

impl PredictionSource {
    pub fn confidence(self) -> f64 {
        match self {
            PredictionSource::UserModel => 0.8,
            PredictionSource::Baseline => 0.5,
            PredictionSource::Default => 0.3,
        }
    }
}

/// Concrete metrics derived from the predicted rate and historical reach:
/// 70% likes, 20% comments, 10% shares of total predicted engagement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictedMetrics {
    pub likes: u32,
    pub comments: u32,
    pub shares: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngagementPrediction {
    /// Predicted engagement rate, always ≥ 0.
    pub rate: f64,
    pub confidence: f64,
    pub source: PredictionSource,
    pub metrics: PredictedMetrics,
}

#[derive(Debug, Clone)]
pub struct PredictorConfig {
    pub min_user_samples: usize,
    pub min_baseline_samples: usize,
    pub baseline_sample_limit: usize,
    pub user_ttl: Duration,
    pub baseline_ttl: Duration,
    pub history_window: Duration,
    pub lambda: f64,
    /// Rate used by the hard default fallback.
    pub default_rate: f64,
    /// Reach assumed when the user has no published history.
    pub default_reach: f64,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            min_user_samples: 5,
            min_baseline_samples: 20,
            baseline_sample_limit: 200,
            user_ttl: Duration::days(7),
            baseline_ttl: Duration::days(30),
            history_window: Duration::days(90),
            lambda: DEFAULT_LAMBDA,
            default_rate: 0.1,
            default_reach: 200.0,
        }
    }
}

/// Lazily retrained engagement predictor. Never errors: any failure path
/// degrades to the baseline and finally to the hard default.
#[derive(Debug, Default)]
pub struct EngagementPredictor {
    cache: ModelCache,
    cfg: PredictorConfig,
}

impl EngagementPredictor {
    pub fn new() -> Self {
        Self::with_config(PredictorConfig::default())
    }

    pub fn with_config(cfg: PredictorConfig) -> Self {
        Self {
            cache: ModelCache::new(),
            cfg,
        }
    }

    pub fn invalidate_user(&self, user_id: u64) {
        self.cache.invalidate(ModelKey::User(user_id));
    }

    /// Predict the engagement rate and concrete metrics for `draft`.
    /// Timing features come from `scheduled_for` when set, else `now`.
    pub async fn predict(
        &self,
        store: &dyn ContentStore,
        draft: &PostDraft,
        user: &User,
        now: DateTime<Utc>,
    ) -> EngagementPrediction {
        let at = draft.scheduled_for.unwrap_or(now);
        let features = draft_features(draft, at);

        let (rate, source) = match self.user_model(store, user.id, now).await {
            Some(model) => (ridge::predict(&model.weights, &features), PredictionSource::UserModel),
            None => match self.baseline_model(store, now).await {
                Some(model) => (
                    ridge::predict(&model.weights, &features),
                    PredictionSource::Baseline,
                ),
                None => (self.cfg.default_rate, PredictionSource::Default),
            },
        };

        let reach = self.average_reach(store, user.id).await;
        EngagementPrediction {
            rate,
            confidence: source.confidence(),
            source,
            metrics: split_metrics(rate, reach),
        }
    }

    async fn user_model(
        &self,
        store: &dyn ContentStore,
        user_id: u64,
        now: DateTime<Utc>,
    ) -> Option<std::sync::Arc<TrainedModel>> {
        let key = ModelKey::User(user_id);
        if let Some(model) = self.cache.get_fresh(key, self.cfg.user_ttl, now) {
            return Some(model);
        }

        let posts = match store.recent_published_posts(user_id, self.cfg.history_window).await {
            Ok(p) => p,
            Err(e) => {
                warn!(target: "predict", error = %e, user_id, "history fetch failed");
                return None;
            }
        };

        match train(&posts, self.cfg.min_user_samples, ModelKind::User, self.cfg.lambda, now) {
            Ok(model) => Some(self.cache.insert(key, model)),
            Err(e) => {
                debug!(target: "predict", error = %e, user_id, "per-user training unavailable");
                None
            }
        }
    }

    async fn baseline_model(
        &self,
        store: &dyn ContentStore,
        now: DateTime<Utc>,
    ) -> Option<std::sync::Arc<TrainedModel>> {
        if let Some(model) = self.cache.get_fresh(ModelKey::Baseline, self.cfg.baseline_ttl, now) {
            return Some(model);
        }

        let posts = match store
            .recent_published_posts_all(self.cfg.baseline_sample_limit)
            .await
        {
            Ok(p) => p,
            Err(e) => {
                warn!(target: "predict", error = %e, "baseline history fetch failed");
                return None;
            }
        };

        match train(
            &posts,
            self.cfg.min_baseline_samples,
            ModelKind::Baseline,
            self.cfg.lambda,
            now,
        ) {
            Ok(model) => Some(self.cache.insert(ModelKey::Baseline, model)),
            Err(e) => {
                debug!(target: "predict", error = %e, "baseline training unavailable");
                None
            }
        }
    }

    async fn average_reach(&self, store: &dyn ContentStore, user_id: u64) -> f64 {
        let posts = match store.recent_published_posts(user_id, self.cfg.history_window).await {
            Ok(p) => p,
            Err(_) => return self.cfg.default_reach,
        };
        let views: Vec<f64> = posts
            .iter()
            .filter_map(|p| p.engagement)
            .filter(|m| m.views > 0)
            .map(|m| f64::from(m.views))
            .collect();
        if views.is_empty() {
            self.cfg.default_reach
        } else {
            views.iter().sum::<f64>() / views.len() as f64
        }
    }
}

/// Build training samples from published posts with recorded views and fit
/// the ridge model. Fails (for the caller to degrade) when fewer than
/// `min_samples` valid samples exist.
fn train(
    posts: &[PostDraft],
    min_samples: usize,
    kind: ModelKind,
    lambda: f64,
    now: DateTime<Utc>,
) -> crate::error::Result<TrainedModel> {
    let mut features = Vec::new();
    let mut targets = Vec::new();

    for post in posts {
        let Some(published_at) = post.published_at else {
            continue;
        };
        let Some(rate) = post.engagement.and_then(|m| m.engagement_rate()) else {
            continue;
        };
        features.push(draft_features(post, published_at));
        targets.push(rate);
    }

    if features.len() < min_samples {
        return Err(PipelineError::ModelTraining(format!(
            "{} valid samples, need {min_samples}",
            features.len()
        )));
    }

    let weights = ridge::fit(&features, &targets, lambda)?;
    Ok(TrainedModel {
        weights,
        trained_at: now,
        sample_count: features.len(),
        kind,
    })
}

fn split_metrics(rate: f64, reach: f64) -> PredictedMetrics {
    let total = (rate * reach).max(0.0);
    PredictedMetrics {
        likes: (total * 0.7).round() as u32,
        comments: (total * 0.2).round() as u32,
        shares: (total * 0.1).round() as u32,
    }
}
