// tests/filter_gate.rs
use chrono::{Duration, Utc};
use linkpilot::config::UserPreferences;
use linkpilot::ingest::filter::{evaluate, FilterRules, RejectReason};
use linkpilot::model::Article;

fn article_with_words(words: usize, title: &str) -> Article {
    Article {
        title: title.to_string(),
        url: "https://example.com/a".into(),
        content: vec!["token"; words].join(" "),
        author: None,
        published_at: Utc::now() - Duration::hours(2),
        source_id: 1,
        source_name: "feed".into(),
    }
}

#[test]
fn fifty_word_article_is_rejected_regardless_of_relevance() {
    // Default min_word_count is 200; a 50-word article never reaches scoring.
    let rules = FilterRules::from_preferences(&UserPreferences::default());
    let article = article_with_words(50, "An otherwise perfect match");
    assert_eq!(
        evaluate(&article, &rules, Utc::now()),
        Err(RejectReason::TooShort { words: 50, min: 200 })
    );
}

#[test]
fn checks_short_circuit_in_documented_order() {
    let prefs = UserPreferences {
        topics_to_avoid: vec!["token".into()],
        primary_interests: vec!["nothing-matches".into()],
        ..Default::default()
    };
    let rules = FilterRules::from_preferences(&prefs);

    // Too short and stale and on the avoid list: length wins.
    let mut a = article_with_words(10, "t");
    a.published_at = Utc::now() - Duration::hours(500);
    assert!(matches!(
        evaluate(&a, &rules, Utc::now()),
        Err(RejectReason::TooShort { .. })
    ));

    // Long enough but stale and avoided: freshness wins.
    let mut b = article_with_words(300, "t");
    b.published_at = Utc::now() - Duration::hours(500);
    assert!(matches!(
        evaluate(&b, &rules, Utc::now()),
        Err(RejectReason::Stale { .. })
    ));

    // Long enough and fresh: avoid list wins over the interest miss.
    let c = article_with_words(300, "t");
    assert!(matches!(
        evaluate(&c, &rules, Utc::now()),
        Err(RejectReason::AvoidedTopic { .. })
    ));
}

#[test]
fn interest_allow_list_rejects_only_nonmatching() {
    let prefs = UserPreferences {
        primary_interests: vec!["postgres".into()],
        ..Default::default()
    };
    let rules = FilterRules::from_preferences(&prefs);

    let miss = article_with_words(300, "A story about gardening");
    assert_eq!(evaluate(&miss, &rules, Utc::now()), Err(RejectReason::NoInterestMatch));

    let hit = article_with_words(300, "Tuning Postgres autovacuum");
    assert_eq!(evaluate(&hit, &rules, Utc::now()), Ok(()));
}

#[test]
fn per_source_rules_override_user_preferences() {
    // A source may relax the length floor below the user default.
    let rules = FilterRules {
        min_word_count: 20,
        ..FilterRules::default()
    };
    let a = article_with_words(50, "short-form source");
    assert_eq!(evaluate(&a, &rules, Utc::now()), Ok(()));
}
