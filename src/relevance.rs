// src/relevance.rs
//! Relevance gate: batched oracle scoring with a numeric threshold.
//!
//! Articles are scored in batches of `batch_size` with a mandatory delay
//! between batches to respect oracle rate limits. Per-article failures are
//! logged and the article is dropped; the pipeline continues.

use metrics::counter;
use tracing::{debug, warn};

use crate::config::RelevanceConfig;
use crate::error::PipelineError;
use crate::model::{AiAnalysis, Article, User};
use crate::oracle::{OracleRequest, RelevanceOracle};

/// An article that passed the gate, with its persisted-form score.
#[derive(Debug, Clone)]
pub struct ScoredArticle {
    pub article: Article,
    /// `round(oracle_score * 100)`, 0..=100.
    pub score: u8,
    pub analysis: AiAnalysis,
}

/// Tally of one batch-scoring pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelevanceOutcome {
    pub scored: usize,
    pub below_threshold: usize,
    pub oracle_failures: usize,
}

/// Truncate to at most `max_chars` characters on a char boundary.
fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Convert an oracle score in [0,1] to the persisted 0..=100 integer.
pub fn to_persisted_score(score: f64) -> u8 {
    (score.clamp(0.0, 1.0) * 100.0).round() as u8
}

/// Score `articles` for `user`, keeping those at or above the user's
/// `min_relevance_score`. Input order is preserved within the output, but
/// callers must not rely on rank order before the explicit scoring sort.
pub async fn score_articles(
    oracle: &dyn RelevanceOracle,
    user: &User,
    articles: Vec<Article>,
    cfg: &RelevanceConfig,
) -> (Vec<ScoredArticle>, RelevanceOutcome) {
    let mut kept = Vec::with_capacity(articles.len());
    let mut outcome = RelevanceOutcome::default();

    let context = user.preferences.interest_context();
    let threshold = user.preferences.min_relevance_score;
    let total_batches = articles.len().div_ceil(cfg.batch_size.max(1));

    for (batch_idx, batch) in articles.chunks(cfg.batch_size.max(1)).enumerate() {
        for article in batch {
            let content = truncate_chars(&article.content, cfg.max_content_chars);
            let req = OracleRequest {
                title: &article.title,
                content,
                user_context: &context,
                preferences: &user.preferences,
            };

            let verdict = match tokio::time::timeout(cfg.call_timeout(), oracle.score(req)).await {
                Ok(Ok(v)) => v,
                Ok(Err(e)) => {
                    counter!("triage_oracle_errors_total").increment(1);
                    warn!(target: "oracle", error = %e, url = %article.url, "oracle call failed, dropping article");
                    outcome.oracle_failures += 1;
                    continue;
                }
                Err(_) => {
                    counter!("triage_oracle_errors_total").increment(1);
                    let e = PipelineError::Oracle("call timed out".into());
                    warn!(target: "oracle", error = %e, url = %article.url, "oracle call failed, dropping article");
                    outcome.oracle_failures += 1;
                    continue;
                }
            };

            if verdict.relevance_score < threshold {
                debug!(
                    target: "oracle",
                    score = verdict.relevance_score,
                    threshold,
                    url = %article.url,
                    "below relevance threshold"
                );
                outcome.below_threshold += 1;
                continue;
            }

            outcome.scored += 1;
            kept.push(ScoredArticle {
                article: article.clone(),
                score: to_persisted_score(verdict.relevance_score),
                analysis: AiAnalysis {
                    reasoning: verdict.reasoning,
                    topic_category: verdict.topic_category,
                    confidence: verdict.confidence,
                },
            });
        }

        // Mandatory inter-batch delay; skipped after the last batch.
        if batch_idx + 1 < total_batches {
            tokio::time::sleep(cfg.batch_delay()).await;
        }
    }

    counter!("triage_articles_scored_total").increment(outcome.scored as u64);
    (kept, outcome)
}
