// src/predict/cache.rs
//! Copy-on-write model cache.
//!
//! Retraining publishes a fresh `Arc<TrainedModel>`; readers holding the old
//! Arc keep a consistent model and never observe a partial update.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKey {
    User(u64),
    Baseline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    User,
    Baseline,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainedModel {
    /// Bias-first weight vector from the ridge fit.
    pub weights: Vec<f64>,
    pub trained_at: DateTime<Utc>,
    pub sample_count: usize,
    pub kind: ModelKind,
}

#[derive(Debug, Default)]
pub struct ModelCache {
    inner: RwLock<HashMap<ModelKey, Arc<TrainedModel>>>,
}

impl ModelCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A model no older than `ttl` at `now`, if present.
    pub fn get_fresh(&self, key: ModelKey, ttl: Duration, now: DateTime<Utc>) -> Option<Arc<TrainedModel>> {
        let guard = self.inner.read().expect("model cache poisoned");
        guard
            .get(&key)
            .filter(|m| now - m.trained_at <= ttl)
            .map(Arc::clone)
    }

    /// Publish a freshly trained model, replacing any previous entry whole.
    pub fn insert(&self, key: ModelKey, model: TrainedModel) -> Arc<TrainedModel> {
        let model = Arc::new(model);
        self.inner
            .write()
            .expect("model cache poisoned")
            .insert(key, Arc::clone(&model));
        model
    }

    pub fn invalidate(&self, key: ModelKey) {
        self.inner
            .write()
            .expect("model cache poisoned")
            .remove(&key);
    }
}
