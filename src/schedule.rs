// src/schedule.rs
//! Posting-time optimization under per-user constraints.
//!
//! Optimal slots come from historical engagement when there is enough data
//! (day×hour buckets over published posts) and from a fixed set of
//! best-practice slots otherwise. Slot search, greedy schedule assignment,
//! and schedule validation all honor the same `PostingConstraints`.

use chrono::{DateTime, Datelike, Days, Duration, Timelike, Utc, Weekday};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::config::UserPreferences;
use crate::error::Result;
use crate::model::{TimeSlot, User};
use crate::store::ContentStore;

/// How far ahead candidate datetimes are generated.
const SEARCH_HORIZON_DAYS: u64 = 30;
/// Business hours window (inclusive start, exclusive end).
const BUSINESS_HOURS: std::ops::Range<u32> = 9..17;

/// Frequency/spacing/day constraints derived from user preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostingConstraints {
    pub max_posts_per_day: u32,
    pub max_posts_per_week: u32,
    pub min_hours_between_posts: i64,
    pub avoid_weekends: bool,
    pub business_hours_only: bool,
}

impl PostingConstraints {
    pub fn from_preferences(prefs: &UserPreferences) -> Self {
        let (per_day, per_week) = prefs.posting_frequency.frequency_caps();
        Self {
            max_posts_per_day: per_day,
            max_posts_per_week: per_week,
            min_hours_between_posts: prefs.min_hours_between_posts,
            avoid_weekends: prefs.avoid_weekends,
            business_hours_only: prefs.business_hours_only,
        }
    }

    fn allows(&self, at: DateTime<Utc>) -> bool {
        if self.avoid_weekends && matches!(at.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }
        if self.business_hours_only && !BUSINESS_HOURS.contains(&at.hour()) {
            return false;
        }
        true
    }

    fn spacing(&self) -> Duration {
        Duration::hours(self.min_hours_between_posts)
    }
}

/// A concrete proposed posting datetime.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProposedTime {
    pub at: DateTime<Utc>,
    pub confidence: f64,
    pub reasoning: String,
    /// True when no optimal slot satisfied the constraints and a generic
    /// fallback was returned instead.
    pub fallback: bool,
}

/// One draft to place, highest priority first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulableDraft {
    pub draft_id: u64,
    pub priority: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedPost {
    pub draft_id: u64,
    pub at: DateTime<Utc>,
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScheduleAssignment {
    pub planned: Vec<PlannedPost>,
    /// Drafts that could not be placed within the window.
    pub skipped: Vec<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    Frequency,
    Spacing,
    Preference,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleViolation {
    pub kind: ViolationKind,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleValidation {
    pub violations: Vec<ScheduleViolation>,
    /// 1.0 minus per-violation penalties, floored at 0.
    pub schedule_score: f64,
    pub suggestions: Vec<String>,
}

/// The five fixed LinkedIn best-practice slots used when history is thin.
pub fn default_best_practice_slots() -> Vec<TimeSlot> {
    const REASON: &str = "LinkedIn best practice: weekday mornings perform well";
    let slot = |day, hour, minute, expected| TimeSlot {
        day_of_week: day,
        hour,
        minute,
        expected_engagement: expected,
        confidence: 0.3,
        reasoning: REASON.to_string(),
    };
    vec![
        slot(Weekday::Tue, 8, 0, 0.62),
        slot(Weekday::Tue, 10, 0, 0.58),
        slot(Weekday::Wed, 9, 0, 0.60),
        slot(Weekday::Thu, 8, 0, 0.57),
        slot(Weekday::Fri, 9, 0, 0.55),
    ]
}

#[derive(Debug, Clone)]
pub struct SchedulingOptimizer {
    /// Window of history considered for slot building.
    pub history_window: Duration,
    /// Minimum posts with engagement data before history is trusted.
    pub min_history_posts: usize,
    /// Minimum posts per day×hour bucket for statistical reliability.
    pub min_bucket_posts: usize,
}

impl Default for SchedulingOptimizer {
    fn default() -> Self {
        Self {
            history_window: Duration::days(90),
            min_history_posts: 10,
            min_bucket_posts: 2,
        }
    }
}

impl SchedulingOptimizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Per-user optimal slots: historical day×hour buckets when enough data
    /// exists, else the fixed best-practice set.
    pub async fn optimal_posting_times(
        &self,
        store: &dyn ContentStore,
        user: &User,
    ) -> Result<Vec<TimeSlot>> {
        let posts = store
            .recent_published_posts(user.id, self.history_window)
            .await?;

        let with_engagement: Vec<_> = posts
            .iter()
            .filter_map(|p| {
                let at = p.published_at?;
                let m = p.engagement?;
                Some((at, m.weighted_engagement()))
            })
            .collect();

        if with_engagement.len() < self.min_history_posts {
            debug!(
                target: "schedule",
                user_id = user.id,
                posts = with_engagement.len(),
                "insufficient history, using best-practice slots"
            );
            return Ok(default_best_practice_slots());
        }

        let mut buckets: HashMap<(Weekday, u32), Vec<f64>> = HashMap::new();
        for (at, weight) in &with_engagement {
            buckets
                .entry((at.weekday(), at.hour()))
                .or_default()
                .push(*weight);
        }

        let mut scored: Vec<(Weekday, u32, f64, usize)> = buckets
            .into_iter()
            .filter(|(_, v)| v.len() >= self.min_bucket_posts)
            .map(|((day, hour), v)| {
                let avg = v.iter().sum::<f64>() / v.len() as f64;
                (day, hour, avg, v.len())
            })
            .collect();

        if scored.is_empty() {
            return Ok(default_best_practice_slots());
        }

        scored.sort_by(|a, b| b.2.total_cmp(&a.2).then(a.1.cmp(&b.1)));
        let max_avg = scored[0].2.max(f64::EPSILON);

        Ok(scored
            .into_iter()
            .take(5)
            .map(|(day, hour, avg, n)| TimeSlot {
                day_of_week: day,
                hour,
                minute: 0,
                expected_engagement: avg / max_avg,
                confidence: (n as f64 / 10.0).min(1.0),
                reasoning: format!(
                    "Averaged engagement of {n} posts published {day} around {hour:02}:00"
                ),
            })
            .collect())
    }

    /// Earliest constraint-satisfying datetime strictly after `after`,
    /// combining each optimal slot's (hour, minute) with each future
    /// calendar date up to 30 days out. Falls back to `after + 24h` with
    /// low confidence when nothing qualifies, and to an error-flagged
    /// fallback when slot building itself fails.
    pub async fn find_next_optimal_time(
        &self,
        store: &dyn ContentStore,
        user: &User,
        after: DateTime<Utc>,
    ) -> ProposedTime {
        let slots = match self.optimal_posting_times(store, user).await {
            Ok(s) => s,
            Err(e) => {
                warn!(target: "schedule", error = %e, user_id = user.id, "slot building failed");
                return ProposedTime {
                    at: after + Duration::hours(24),
                    confidence: 0.2,
                    reasoning: "internal error while building slots; generic fallback".into(),
                    fallback: true,
                };
            }
        };

        let constraints = PostingConstraints::from_preferences(&user.preferences);
        let mut best: Option<(DateTime<Utc>, &TimeSlot)> = None;

        for offset in 0..=SEARCH_HORIZON_DAYS {
            let Some(date) = after.date_naive().checked_add_days(Days::new(offset)) else {
                continue;
            };
            for slot in &slots {
                let Some(naive) = date.and_hms_opt(slot.hour, slot.minute, 0) else {
                    continue;
                };
                let candidate = naive.and_utc();
                if candidate <= after || !constraints.allows(candidate) {
                    continue;
                }
                match best {
                    Some((t, _)) if t <= candidate => {}
                    _ => best = Some((candidate, slot)),
                }
            }
        }

        match best {
            Some((at, slot)) => ProposedTime {
                at,
                confidence: slot.confidence,
                reasoning: slot.reasoning.clone(),
                fallback: false,
            },
            None => ProposedTime {
                at: after + Duration::hours(24),
                confidence: 0.3,
                reasoning: "no optimal slot satisfied the constraints within 30 days".into(),
                fallback: true,
            },
        }
    }

    /// Greedily place drafts (highest priority first) into optimal slots
    /// within `[start, end)`, avoiding conflicts with already-scheduled
    /// posts and with assignments made earlier in this batch. Conflict means
    /// within `min_hours_between_posts` of another posting time.
    pub async fn get_optimal_posting_schedule(
        &self,
        store: &dyn ContentStore,
        user: &User,
        drafts: &[SchedulableDraft],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<ScheduleAssignment> {
        let constraints = PostingConstraints::from_preferences(&user.preferences);
        let spacing = constraints.spacing();

        let mut taken: Vec<DateTime<Utc>> = store
            .scheduled_posts(user.id)
            .await?
            .iter()
            .filter_map(|d| d.scheduled_for)
            .collect();

        let slots = self.optimal_posting_times(store, user).await?;

        let mut ordered: Vec<SchedulableDraft> = drafts.to_vec();
        ordered.sort_by(|a, b| b.priority.total_cmp(&a.priority).then(a.draft_id.cmp(&b.draft_id)));

        let mut out = ScheduleAssignment::default();
        let mut cursor = start;

        for draft in ordered {
            let found = next_free_candidate(&slots, &constraints, &taken, spacing, cursor, end);
            match found {
                Some((at, confidence)) => {
                    taken.push(at);
                    cursor = at + spacing;
                    out.planned.push(PlannedPost {
                        draft_id: draft.draft_id,
                        at,
                        confidence,
                    });
                }
                None => {
                    warn!(
                        target: "schedule",
                        draft_id = draft.draft_id,
                        user_id = user.id,
                        "no free slot within window, skipping draft"
                    );
                    out.skipped.push(draft.draft_id);
                }
            }
        }

        Ok(out)
    }

    /// Check a proposed list of posting datetimes against frequency caps,
    /// spacing, and day/hour preference constraints.
    pub fn validate_posting_schedule(
        &self,
        prefs: &UserPreferences,
        times: &[DateTime<Utc>],
    ) -> ScheduleValidation {
        let constraints = PostingConstraints::from_preferences(prefs);
        let mut violations = Vec::new();

        // Frequency: one violation per post beyond the daily/weekly cap.
        let mut per_day: HashMap<chrono::NaiveDate, u32> = HashMap::new();
        let mut per_week: HashMap<(i32, u32), u32> = HashMap::new();
        for t in times {
            *per_day.entry(t.date_naive()).or_insert(0) += 1;
            let week = t.iso_week();
            *per_week.entry((week.year(), week.week())).or_insert(0) += 1;
        }
        let mut days: Vec<_> = per_day.into_iter().collect();
        days.sort_by_key(|(d, _)| *d);
        for (day, count) in days {
            for _ in constraints.max_posts_per_day..count {
                violations.push(ScheduleViolation {
                    kind: ViolationKind::Frequency,
                    detail: format!(
                        "{count} posts on {day}, daily cap is {}",
                        constraints.max_posts_per_day
                    ),
                });
            }
        }
        let mut weeks: Vec<_> = per_week.into_iter().collect();
        weeks.sort_by_key(|(w, _)| *w);
        for ((year, week), count) in weeks {
            for _ in constraints.max_posts_per_week..count {
                violations.push(ScheduleViolation {
                    kind: ViolationKind::Frequency,
                    detail: format!(
                        "{count} posts in week {week} of {year}, weekly cap is {}",
                        constraints.max_posts_per_week
                    ),
                });
            }
        }

        // Spacing: adjacent posts closer than the minimum gap.
        let mut sorted = times.to_vec();
        sorted.sort();
        for pair in sorted.windows(2) {
            let gap = pair[1] - pair[0];
            if gap < constraints.spacing() {
                violations.push(ScheduleViolation {
                    kind: ViolationKind::Spacing,
                    detail: format!(
                        "posts at {} and {} are {}h apart, minimum is {}h",
                        pair[0],
                        pair[1],
                        gap.num_hours(),
                        constraints.min_hours_between_posts
                    ),
                });
            }
        }

        // Preferences: weekend/business-hours constraints.
        for t in &sorted {
            if constraints.avoid_weekends && matches!(t.weekday(), Weekday::Sat | Weekday::Sun) {
                violations.push(ScheduleViolation {
                    kind: ViolationKind::Preference,
                    detail: format!("{t} falls on a weekend"),
                });
            }
            if constraints.business_hours_only && !BUSINESS_HOURS.contains(&t.hour()) {
                violations.push(ScheduleViolation {
                    kind: ViolationKind::Preference,
                    detail: format!("{t} is outside business hours (9-17)"),
                });
            }
        }

        let freq = violations
            .iter()
            .filter(|v| v.kind == ViolationKind::Frequency)
            .count() as f64;
        let spacing = violations
            .iter()
            .filter(|v| v.kind == ViolationKind::Spacing)
            .count() as f64;
        let pref = violations
            .iter()
            .filter(|v| v.kind == ViolationKind::Preference)
            .count() as f64;
        let schedule_score = (1.0 - 0.2 * freq - 0.15 * spacing - 0.1 * pref).max(0.0);

        let mut suggestions = Vec::new();
        if freq > 0.0 {
            suggestions.push(format!(
                "Spread posts out: at most {} per day and {} per week.",
                constraints.max_posts_per_day, constraints.max_posts_per_week
            ));
        }
        if spacing > 0.0 {
            suggestions.push(format!(
                "Leave at least {}h between posts.",
                constraints.min_hours_between_posts
            ));
        }
        if pref > 0.0 {
            suggestions.push("Move posts to preferred days and hours.".to_string());
        }

        ScheduleValidation {
            violations,
            schedule_score,
            suggestions,
        }
    }
}

/// Earliest candidate in `[cursor, end)` built from the slots' (hour,
/// minute) across future dates, skipping conflicts with `taken`.
fn next_free_candidate(
    slots: &[TimeSlot],
    constraints: &PostingConstraints,
    taken: &[DateTime<Utc>],
    spacing: Duration,
    cursor: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Option<(DateTime<Utc>, f64)> {
    let mut best: Option<(DateTime<Utc>, f64)> = None;

    for offset in 0..=SEARCH_HORIZON_DAYS {
        let date = cursor.date_naive().checked_add_days(Days::new(offset))?;
        for slot in slots {
            let Some(naive) = date.and_hms_opt(slot.hour, slot.minute, 0) else {
                continue;
            };
            let candidate = naive.and_utc();
            if candidate < cursor || candidate >= end || !constraints.allows(candidate) {
                continue;
            }
            let conflict = taken.iter().any(|t| {
                let gap = if *t > candidate { *t - candidate } else { candidate - *t };
                gap < spacing
            });
            if conflict {
                continue;
            }
            match best {
                Some((t, _)) if t <= candidate => {}
                _ => best = Some((candidate, slot.confidence)),
            }
        }
        // Dates are scanned in order; once a candidate exists no later date
        // can beat it.
        if best.is_some() {
            break;
        }
    }
    best
}
