// tests/schedule_validate.rs
use chrono::{Duration, TimeZone, Utc};

use linkpilot::config::{PostingFrequency, UserPreferences};
use linkpilot::schedule::{SchedulingOptimizer, ViolationKind};

fn count(v: &linkpilot::schedule::ScheduleValidation, kind: ViolationKind) -> usize {
    v.violations.iter().filter(|x| x.kind == kind).count()
}

#[test]
fn three_posts_one_day_with_daily_cap_one_scores_point_six() {
    let optimizer = SchedulingOptimizer::new();
    let prefs = UserPreferences::default(); // daily → 1/day, 7/week

    let at = |h, m| Utc.with_ymd_and_hms(2025, 6, 3, h, m, 0).unwrap();
    // Spaced ≥ 4h apart so only frequency violations fire.
    let times = [at(8, 0), at(12, 30), at(17, 0)];

    let v = optimizer.validate_posting_schedule(&prefs, &times);
    assert_eq!(count(&v, ViolationKind::Frequency), 2);
    assert_eq!(count(&v, ViolationKind::Spacing), 0);
    assert_eq!(count(&v, ViolationKind::Preference), 0);
    assert!((v.schedule_score - 0.6).abs() < 1e-9);
}

#[test]
fn weekly_cap_counts_excess_across_days() {
    let optimizer = SchedulingOptimizer::new();
    let prefs = UserPreferences {
        posting_frequency: PostingFrequency::Weekly, // 1/day, 2/week
        ..Default::default()
    };
    // Four posts on four separate days of one ISO week.
    let at = |d| Utc.with_ymd_and_hms(2025, 6, d, 10, 0, 0).unwrap();
    let times = [at(2), at(3), at(4), at(5)];

    let v = optimizer.validate_posting_schedule(&prefs, &times);
    // No daily violations, two posts over the weekly cap.
    assert_eq!(count(&v, ViolationKind::Frequency), 2);
    assert!((v.schedule_score - 0.6).abs() < 1e-9);
}

#[test]
fn spacing_violations_use_the_minimum_gap() {
    let optimizer = SchedulingOptimizer::new();
    let prefs = UserPreferences {
        posting_frequency: PostingFrequency::MultipleDaily,
        min_hours_between_posts: 6,
        ..Default::default()
    };
    let base = Utc.with_ymd_and_hms(2025, 6, 3, 8, 0, 0).unwrap();
    let times = [base, base + Duration::hours(3), base + Duration::hours(10)];

    let v = optimizer.validate_posting_schedule(&prefs, &times);
    assert_eq!(count(&v, ViolationKind::Spacing), 1);
    assert!((v.schedule_score - 0.85).abs() < 1e-9);
    assert!(v.suggestions.iter().any(|s| s.contains("6h")));
}

#[test]
fn suggestions_are_keyed_by_violation_category() {
    let optimizer = SchedulingOptimizer::new();
    let prefs = UserPreferences {
        avoid_weekends: true,
        ..Default::default()
    };
    // Saturday post + two same-day posts 1h apart.
    let times = [
        Utc.with_ymd_and_hms(2025, 6, 7, 10, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2025, 6, 9, 10, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2025, 6, 9, 11, 0, 0).unwrap(),
    ];
    let v = optimizer.validate_posting_schedule(&prefs, &times);
    assert!(count(&v, ViolationKind::Frequency) > 0);
    assert!(count(&v, ViolationKind::Spacing) > 0);
    assert!(count(&v, ViolationKind::Preference) > 0);
    // One suggestion per category, not per violation.
    assert_eq!(v.suggestions.len(), 3);
}

#[test]
fn clean_schedule_scores_one() {
    let optimizer = SchedulingOptimizer::new();
    let prefs = UserPreferences::default();
    let times = [
        Utc.with_ymd_and_hms(2025, 6, 3, 9, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2025, 6, 4, 9, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2025, 6, 5, 9, 0, 0).unwrap(),
    ];
    let v = optimizer.validate_posting_schedule(&prefs, &times);
    assert!(v.violations.is_empty());
    assert_eq!(v.schedule_score, 1.0);
    assert!(v.suggestions.is_empty());
}
