// src/ingest/types.rs
use crate::error::Result;
use crate::model::{Article, ContentSource};

/// Fetch collaborator: turns a source descriptor into raw articles.
/// Failures are non-fatal to the overall run; the pipeline increments the
/// source failure counter and moves on.
#[async_trait::async_trait]
pub trait FetchService: Send + Sync {
    async fn fetch(&self, source: &ContentSource) -> Result<Vec<Article>>;
    fn name(&self) -> &'static str;
}
