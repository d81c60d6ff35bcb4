// tests/rss_provider.rs
use linkpilot::ingest::providers::RssFetcher;
use linkpilot::ingest::types::FetchService;
use linkpilot::model::{ContentSource, SourceKind};

const FEED: &str = include_str!("fixtures/tech_rss.xml");

fn source() -> ContentSource {
    ContentSource {
        id: 3,
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
    }
}

#[tokio::test]
async fn fixture_feed_parses_with_clean_text() {
    let fetcher = RssFetcher::from_fixture_str(FEED);
    let articles = fetcher.fetch(&source()).await.unwrap();

    assert_eq!(articles.len(), 4);
    for a in &articles {
        assert!(!a.url.is_empty());
        assert_eq!(a.source_id, 3);
        assert_eq!(a.source_name, "Tech Feed");
        // HTML was decoded and stripped by normalization.
        assert!(!a.content.contains('<'), "tags left in: {}", a.content);
        assert!(!a.content.contains("&lt;"));
    }

    let first = &articles[0];
    assert!(first.title.starts_with("Async Rust in production"));
    assert!(first.url.starts_with("https://example.com/articles/async-rust-production"));
    assert_eq!(first.author.as_deref(), Some("jane@example.com"));
}

#[tokio::test]
async fn items_without_pub_date_default_to_now() {
    let fetcher = RssFetcher::from_fixture_str(FEED);
    let articles = fetcher.fetch(&source()).await.unwrap();
    let now = chrono::Utc::now();
    for a in &articles {
        let age = now - a.published_at;
        assert!(age.num_minutes() < 5, "unexpectedly old: {}", a.published_at);
    }
}
