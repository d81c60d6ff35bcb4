// src/error.rs
//! Error taxonomy for the triage pipeline and recommendation engine.
//!
//! Per-item failures (fetch, oracle, scheduling) are recoverable: callers log
//! them, bump counters, and continue. Only `Store` errors are treated as
//! fatal by the pipeline; the job-scheduling layer retries those.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Source unreachable or unparseable. Increments the source failure
    /// counter; the run continues with the next source.
    #[error("fetch failed for source `{source_name}`: {reason}")]
    Fetch { source_name: String, reason: String },

    /// Relevance/LLM call failed or timed out. The article is dropped.
    #[error("relevance oracle error: {0}")]
    Oracle(String),

    /// Malformed user preferences or constraints. Callers fall back to
    /// documented defaults.
    #[error("invalid configuration: {0}")]
    Validation(String),

    /// Insufficient or malformed training data. Callers fall back to the
    /// baseline or the fixed default prediction.
    #[error("model training failed: {0}")]
    ModelTraining(String),

    /// No posting slot found within the requested window. The draft stays
    /// unscheduled and is reported in aggregate results.
    #[error("no posting slot available: {0}")]
    SchedulingConflict(String),

    /// Persistence layer unavailable or violated an invariant. Fatal to the
    /// current run.
    #[error("store error: {0}")]
    Store(String),
}

impl PipelineError {
    pub fn fetch(source: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Fetch {
            source_name: source.into(),
            reason: reason.to_string(),
        }
    }

    /// True for errors that abort the whole run instead of one item.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_store_errors_are_fatal() {
        assert!(PipelineError::Store("down".into()).is_fatal());
        assert!(!PipelineError::fetch("feed", "timeout").is_fatal());
        assert!(!PipelineError::Oracle("429".into()).is_fatal());
        assert!(!PipelineError::SchedulingConflict("window full".into()).is_fatal());
    }

    #[test]
    fn fetch_error_includes_source() {
        let e = PipelineError::fetch("TechCrunch", "connection refused");
        assert!(e.to_string().contains("TechCrunch"));
    }
}
