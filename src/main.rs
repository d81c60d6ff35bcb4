//! linkpilot — demo binary.
//! Wires an in-memory store, a fixture RSS source, and a mock oracle, runs
//! one triage pass, then prints posting-time recommendations.
//!
//! Production deployments embed the library instead; see `README.md`.

use std::sync::Arc;

use chrono::Utc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use linkpilot::config::{EngineConfig, UserPreferences};
use linkpilot::ingest::providers::RssFetcher;
use linkpilot::model::{ContentSource, SourceKind, User};
use linkpilot::oracle::{build_oracle_from_config, load_oracle_config, DynOracle, MockOracle};
use linkpilot::pipeline::Pipeline;
use linkpilot::schedule::SchedulingOptimizer;
use linkpilot::store::{ContentStore, MemoryStore, RecordingEnqueue};

const DEMO_FEED: &str = include_str!("../tests/fixtures/tech_rss.xml");

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

fn init_metrics() {
    if let Err(e) = metrics_exporter_prometheus::PrometheusBuilder::new().install() {
        tracing::warn!(error = %e, "prometheus exporter not installed");
    }
}

fn demo_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.add_user(User {
        id: 1,
        preferences: UserPreferences {
            primary_interests: vec!["rust".into(), "async".into(), "database".into()],
            min_word_count: 5,
            ..Default::default()
        },
    });
    store.add_source(ContentSource {
        id: 1,
        user_id: 1,
        name: "Tech Feed".into(),
        url: "https://example.com/rss".into(),
        kind: SourceKind::RssFeed,
        check_interval_hours: 6,
        is_active: true,
        filters: None,
        items_found: 0,
        items_processed: 0,
        consecutive_failures: 0,
        last_checked_at: None,
    });
    store
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    init_metrics();

    let engine_cfg = EngineConfig::load_default();
    let store = demo_store();
    let enqueue = Arc::new(RecordingEnqueue::new());

    // Real deployments configure the HTTP oracle via config/oracle.json;
    // the demo falls back to a deterministic mock when it is disabled.
    let oracle_cfg = load_oracle_config();
    let oracle: DynOracle = if oracle_cfg.enabled {
        build_oracle_from_config(&oracle_cfg)
    } else {
        Arc::new(MockOracle::fixed(0.82, "demo verdict"))
    };

    let pipeline = Pipeline::new(
        store.clone(),
        Arc::new(RssFetcher::from_fixture_str(DEMO_FEED)),
        oracle,
        enqueue.clone(),
        engine_cfg.relevance.clone(),
    );

    let stats = pipeline.run(Some(1)).await;
    tracing::info!(
        fetched = stats.articles_fetched,
        filtered = stats.articles_filtered,
        scored = stats.articles_scored,
        persisted = stats.articles_persisted,
        enqueued = stats.drafts_enqueued,
        "triage pass complete"
    );
    for err in &stats.errors {
        tracing::warn!(%err, "pipeline error");
    }

    let user = store.get_user(1).await?;
    let optimizer = SchedulingOptimizer::new();
    let slots = optimizer.optimal_posting_times(store.as_ref(), &user).await?;
    for slot in &slots {
        tracing::info!(
            day = %slot.day_of_week,
            hour = slot.hour,
            confidence = slot.confidence,
            "optimal posting slot"
        );
    }

    let next = optimizer
        .find_next_optimal_time(store.as_ref(), &user, Utc::now())
        .await;
    tracing::info!(at = %next.at, confidence = next.confidence, "next posting time");

    Ok(())
}
