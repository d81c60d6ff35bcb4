// src/scoring/weights.rs
//! Per-user scoring weights with the deterministic adaptation rule.
//!
//! The four weights always sum to 1.0 after any adjustment and no single
//! weight exceeds 0.5. Adaptation is a pure function of (current weights,
//! feedback aggregates); the long-run drift toward favored factors is an
//! accepted property of the rule, not a bug.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Step applied to a weight whose factor separates accepted from rejected
/// recommendations.
const ADJUST_STEP: f64 = 0.1;
/// No single factor may dominate the composite beyond this share.
const WEIGHT_CAP: f64 = 0.5;
/// Minimum separation between accepted/rejected averages to count as signal.
const SIGNAL_EPS: f64 = 1e-3;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoringWeights {
    pub source_credibility: f64,
    pub topic_relevance: f64,
    pub timeliness: f64,
    pub engagement_potential: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            source_credibility: 0.25,
            topic_relevance: 0.30,
            timeliness: 0.20,
            engagement_potential: 0.25,
        }
    }
}

impl ScoringWeights {
    pub fn as_array(&self) -> [f64; 4] {
        [
            self.source_credibility,
            self.topic_relevance,
            self.timeliness,
            self.engagement_potential,
        ]
    }

    pub fn from_array(w: [f64; 4]) -> Self {
        Self {
            source_credibility: w[0],
            topic_relevance: w[1],
            timeliness: w[2],
            engagement_potential: w[3],
        }
    }

    pub fn sum(&self) -> f64 {
        self.as_array().iter().sum()
    }
}

/// Per-factor averages of sub-scores over historical recommendations the
/// user accepted vs rejected. Order matches `ScoringWeights::as_array`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FeedbackAggregates {
    pub accepted_avg: [f64; 4],
    pub rejected_avg: [f64; 4],
}

/// Nudge each weight by ±0.1 toward the factors that correlate with
/// accepted recommendations, then renormalize to sum 1.0 under the 0.5 cap.
pub fn update_scoring_weights(
    current: ScoringWeights,
    feedback: &FeedbackAggregates,
) -> ScoringWeights {
    let mut w = current.as_array();
    for i in 0..4 {
        let delta = feedback.accepted_avg[i] - feedback.rejected_avg[i];
        if delta > SIGNAL_EPS {
            w[i] += ADJUST_STEP;
        } else if delta < -SIGNAL_EPS {
            w[i] -= ADJUST_STEP;
        }
    }
    ScoringWeights::from_array(renormalize_capped(w))
}

/// Clamp to [0, 0.5] and rescale so the weights sum to 1.0 exactly. Weights
/// that would exceed the cap are pinned at 0.5 and their excess is
/// redistributed among the remaining weights; each pass pins at least one
/// more weight, so this terminates in at most four passes.
fn renormalize_capped(mut w: [f64; 4]) -> [f64; 4] {
    for x in &mut w {
        *x = x.clamp(0.0, WEIGHT_CAP);
    }
    let sum: f64 = w.iter().sum();
    if sum <= f64::EPSILON {
        return ScoringWeights::default().as_array();
    }
    // Already normalized: leave the values untouched rather than churning
    // the low bits through a rescale.
    if (sum - 1.0).abs() < 1e-9 {
        return w;
    }

    let mut pinned = [false; 4];
    loop {
        let pinned_mass = pinned.iter().filter(|&&p| p).count() as f64 * WEIGHT_CAP;
        let free_target = (1.0 - pinned_mass).max(0.0);
        let free_sum: f64 = w
            .iter()
            .zip(&pinned)
            .filter(|(_, &p)| !p)
            .map(|(x, _)| *x)
            .sum();

        if free_sum <= f64::EPSILON {
            // All remaining mass sits in pinned weights; split the leftover
            // target evenly (never exceeds the cap with four weights).
            let n_free = pinned.iter().filter(|&&p| !p).count();
            if n_free > 0 {
                for (x, &p) in w.iter_mut().zip(&pinned) {
                    if !p {
                        *x = free_target / n_free as f64;
                    }
                }
            }
            break;
        }

        let scale = free_target / free_sum;
        let mut newly_pinned = false;
        for (x, p) in w.iter_mut().zip(pinned.iter_mut()) {
            if *p {
                continue;
            }
            *x *= scale;
            if *x >= WEIGHT_CAP {
                *x = WEIGHT_CAP;
                *p = true;
                newly_pinned = true;
            }
        }
        if !newly_pinned {
            break;
        }
    }
    w
}

/// Process-wide weights cache. Updates replace the stored `Arc` wholesale,
/// so readers never observe a partially adjusted set, and the old entry is
/// invalidated immediately.
#[derive(Debug, Default)]
pub struct WeightsCache {
    inner: RwLock<HashMap<u64, Arc<ScoringWeights>>>,
}

impl WeightsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_default(&self, user_id: u64) -> Arc<ScoringWeights> {
        if let Some(w) = self
            .inner
            .read()
            .expect("weights cache poisoned")
            .get(&user_id)
        {
            return Arc::clone(w);
        }
        Arc::new(ScoringWeights::default())
    }

    /// Apply the adaptation rule and publish the result atomically.
    pub fn update(&self, user_id: u64, feedback: &FeedbackAggregates) -> Arc<ScoringWeights> {
        let current = *self.get_or_default(user_id);
        let updated = Arc::new(update_scoring_weights(current, feedback));
        self.inner
            .write()
            .expect("weights cache poisoned")
            .insert(user_id, Arc::clone(&updated));
        updated
    }

    pub fn invalidate(&self, user_id: u64) {
        self.inner
            .write()
            .expect("weights cache poisoned")
            .remove(&user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feedback_favoring(idx: usize) -> FeedbackAggregates {
        let mut f = FeedbackAggregates::default();
        f.accepted_avg[idx] = 0.9;
        f.rejected_avg[idx] = 0.3;
        f
    }

    #[test]
    fn defaults_sum_to_one() {
        let w = ScoringWeights::default();
        assert!((w.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn update_keeps_sum_and_cap_invariants() {
        let mut w = ScoringWeights::default();
        // Hammer one factor for many rounds; invariants must hold throughout.
        for _ in 0..50 {
            w = update_scoring_weights(w, &feedback_favoring(1));
            assert!((w.sum() - 1.0).abs() < 1e-6, "sum drifted: {:?}", w);
            for x in w.as_array() {
                assert!((0.0..=0.5 + 1e-9).contains(&x), "weight out of range: {:?}", w);
            }
        }
        // The favored factor drifts up toward the cap.
        assert!(w.topic_relevance > ScoringWeights::default().topic_relevance);
    }

    #[test]
    fn downward_nudge_applies_on_negative_signal() {
        let mut f = FeedbackAggregates::default();
        f.accepted_avg[2] = 0.2;
        f.rejected_avg[2] = 0.8;
        let w = update_scoring_weights(ScoringWeights::default(), &f);
        assert!(w.timeliness < ScoringWeights::default().timeliness);
        assert!((w.sum() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn no_signal_means_no_change() {
        let w = update_scoring_weights(ScoringWeights::default(), &FeedbackAggregates::default());
        assert_eq!(w, ScoringWeights::default());
    }

    #[test]
    fn renormalize_redistributes_above_cap() {
        // One weight would exceed the cap after plain renormalization.
        let w = renormalize_capped([0.5, 0.1, 0.1, 0.1]);
        let sum: f64 = w.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        for x in w {
            assert!(x <= 0.5 + 1e-9);
        }
    }

    #[test]
    fn cache_update_invalidates_old_entry() {
        let cache = WeightsCache::new();
        let before = cache.get_or_default(1);
        let after = cache.update(1, &feedback_favoring(0));
        assert_ne!(*before, *after);
        assert_eq!(*cache.get_or_default(1), *after);
        cache.invalidate(1);
        assert_eq!(*cache.get_or_default(1), ScoringWeights::default());
    }
}
