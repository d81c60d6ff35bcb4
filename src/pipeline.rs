// src/pipeline.rs
//! Triage pipeline orchestrator: fetch → dedup → filter → score → persist →
//! enqueue, sequenced per user with aggregate statistics.
//!
//! Per-item failures never abort a run; they are logged, counted, and
//! reported in `PipelineStats::errors`. Only store errors are fatal for the
//! affected user's run (the job layer retries those with backoff). Consumers
//! must tolerate at-least-once re-delivery: an aborted run does not roll
//! back items persisted before the abort.

use std::sync::Arc;

use chrono::Utc;
use metrics::{counter, gauge};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::RelevanceConfig;
use crate::dedup::Deduplicator;
use crate::error::Result;
use crate::ingest::filter::{self, FilterOutcome, FilterRules};
use crate::ingest;
use crate::ingest::types::FetchService;
use crate::model::{Article, ContentItem, ContentSource, ContentStatus, PipelineStats, User};
use crate::oracle::DynOracle;
use crate::relevance::score_articles;
use crate::store::{ContentStore, DraftEnqueue, SaveResult};

pub struct Pipeline {
    store: Arc<dyn ContentStore>,
    fetcher: Arc<dyn FetchService>,
    oracle: DynOracle,
    enqueue: Arc<dyn DraftEnqueue>,
    relevance_cfg: RelevanceConfig,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn ContentStore>,
        fetcher: Arc<dyn FetchService>,
        oracle: DynOracle,
        enqueue: Arc<dyn DraftEnqueue>,
        relevance_cfg: RelevanceConfig,
    ) -> Self {
        Self {
            store,
            fetcher,
            oracle,
            enqueue,
            relevance_cfg,
        }
    }

    /// Run the triage pipeline for one user, or for every known user when
    /// `user_id` is `None`. Never panics or errors for per-item failures.
    pub async fn run(&self, user_id: Option<u64>) -> PipelineStats {
        ingest::ensure_metrics_described();
        let mut stats = PipelineStats::default();

        let user_ids = match user_id {
            Some(id) => vec![id],
            None => match self.store.list_user_ids().await {
                Ok(ids) => ids,
                Err(e) => {
                    stats.errors.push(format!("listing users: {e}"));
                    return stats;
                }
            },
        };

        for id in user_ids {
            let user_stats = self.run_for_user(id).await;
            stats.merge(user_stats);
        }

        gauge!("triage_pipeline_last_run_ts").set(Utc::now().timestamp() as f64);
        info!(
            target: "pipeline",
            users = stats.users_processed,
            fetched = stats.articles_fetched,
            persisted = stats.articles_persisted,
            enqueued = stats.drafts_enqueued,
            errors = stats.errors.len(),
            "pipeline run finished"
        );
        stats
    }

    /// One user's sequential run. Independent of (and abortable without
    /// affecting) other users' runs.
    async fn run_for_user(&self, user_id: u64) -> PipelineStats {
        let mut stats = PipelineStats::default();

        let mut user = match self.store.get_user(user_id).await {
            Ok(u) => u,
            Err(e) => {
                warn!(target: "pipeline", user_id, error = %e, "skipping user");
                stats.errors.push(format!("user {user_id}: {e}"));
                return stats;
            }
        };
        user.preferences = user.preferences.clone().validated_or_default();

        let sources = match self.store.sources_for_user(user_id).await {
            Ok(s) => s,
            Err(e) => {
                stats.errors.push(format!("user {user_id} sources: {e}"));
                return stats;
            }
        };

        let now = Utc::now();
        let mut dedup = Deduplicator::new();

        for source in sources {
            if !source.is_active || !source.is_due(now) {
                debug!(target: "pipeline", source = %source.name, "source inactive or not due");
                continue;
            }
            stats.sources_processed += 1;
            if let Err(e) = self
                .process_source(&user, source, &mut dedup, &mut stats)
                .await
            {
                stats.errors.push(format!("user {user_id}: {e}"));
                if e.is_fatal() {
                    // Already-persisted items stay persisted; the job layer
                    // retries the whole run.
                    warn!(target: "pipeline", user_id, error = %e, "fatal store error, aborting user run");
                    break;
                }
            }
        }

        stats.users_processed = 1;
        stats
    }

    async fn process_source(
        &self,
        user: &User,
        mut source: ContentSource,
        dedup: &mut Deduplicator,
        stats: &mut PipelineStats,
    ) -> Result<()> {
        let now = Utc::now();
        source.last_checked_at = Some(now);

        let articles = match self.fetcher.fetch(&source).await {
            Ok(a) => a,
            Err(e) => {
                counter!("triage_fetch_errors_total").increment(1);
                warn!(target: "pipeline", source = %source.name, error = %e, "fetch failed");
                source.consecutive_failures += 1;
                self.store.update_source(source).await?;
                return Err(e);
            }
        };

        stats.articles_fetched += articles.len() as u64;
        source.items_found += articles.len() as u64;
        counter!("triage_articles_fetched_total").increment(articles.len() as u64);

        // Dedup: in-memory fast path first, then the store's authoritative
        // URL check.
        let mut unique: Vec<Article> = Vec::with_capacity(articles.len());
        let mut deduped = 0usize;
        for article in articles {
            if dedup.check_and_add_url(&article.url)
                || self.store.url_exists(&article.url).await?
                || dedup.is_duplicate_content(&article.content)
            {
                deduped += 1;
                continue;
            }
            dedup.add_content(&article.content);
            unique.push(article);
        }
        counter!("triage_articles_deduped_total").increment(deduped as u64);

        // Keyword filter.
        let rules = source
            .filters
            .clone()
            .unwrap_or_else(|| FilterRules::from_preferences(&user.preferences));
        let mut outcome = FilterOutcome::default();
        let survivors: Vec<Article> = unique
            .into_iter()
            .filter(|a| {
                let res = filter::evaluate(a, &rules, now);
                outcome.record(&res);
                if let Err(reason) = &res {
                    debug!(target: "pipeline", url = %a.url, ?reason, "filtered out");
                }
                res.is_ok()
            })
            .collect();
        counter!("triage_articles_rejected_total").increment(outcome.rejected() as u64);
        stats.articles_filtered += survivors.len() as u64;

        // Relevance gate (batched, rate limited).
        let (scored, rel_outcome) =
            score_articles(self.oracle.as_ref(), user, survivors, &self.relevance_cfg).await;
        stats.articles_scored += rel_outcome.scored as u64;
        if rel_outcome.oracle_failures > 0 {
            stats.errors.push(format!(
                "source {}: {} oracle failures",
                source.name, rel_outcome.oracle_failures
            ));
        }

        // Persist + enqueue.
        for s in scored {
            let word_count = s.article.word_count();
            let item = ContentItem {
                id: 0,
                source_id: source.id,
                title: s.article.title,
                url: s.article.url,
                content: s.article.content,
                author: s.article.author,
                published_at: s.article.published_at,
                relevance_score: Some(s.score),
                ai_analysis: Some(s.analysis),
                status: ContentStatus::Processed,
                word_count,
            };

            match self.store.save_content(item).await? {
                SaveResult::Inserted(id) => {
                    stats.articles_persisted += 1;
                    source.items_processed += 1;
                    counter!("triage_articles_persisted_total").increment(1);

                    // Fire-and-forget: a failed enqueue never fails the run.
                    match self.enqueue.enqueue(id, user.id).await {
                        Ok(()) => stats.drafts_enqueued += 1,
                        Err(e) => {
                            warn!(target: "pipeline", item_id = id, error = %e, "enqueue failed");
                            stats.errors.push(format!("enqueue item {id}: {e}"));
                        }
                    }
                }
                SaveResult::DuplicateUrl => {
                    // The unique constraint is the authoritative guard; a
                    // concurrent worker got there first.
                    counter!("triage_articles_deduped_total").increment(1);
                    debug!(target: "pipeline", "duplicate url at persistence");
                }
            }
        }

        source.consecutive_failures = 0;
        self.store.update_source(source).await?;
        Ok(())
    }
}

/// Run the pipeline for all users on a fixed interval as a background task.
/// Aborting the handle cancels future ticks without affecting other tasks.
pub fn spawn_pipeline_scheduler(pipeline: Arc<Pipeline>, interval_secs: u64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        loop {
            ticker.tick().await;
            let stats = pipeline.run(None).await;
            counter!("triage_runs_total").increment(1);
            info!(
                target: "pipeline",
                users = stats.users_processed,
                persisted = stats.articles_persisted,
                errors = stats.errors.len(),
                "scheduled pipeline tick"
            );
        }
    })
}
