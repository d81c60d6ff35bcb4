// src/store.rs
//! Persistence and enqueue collaborators, plus the in-memory reference
//! implementation used by tests and the demo binary.
//!
//! The store is assumed strongly consistent per single user. The unique-URL
//! constraint lives here and is the authoritative duplicate guard; the
//! in-memory `Deduplicator` set is only a fast path.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use crate::dedup::normalize_url;
use crate::error::{PipelineError, Result};
use crate::model::{ContentItem, ContentSource, DraftStatus, PostDraft, User};

/// Result of a content save under the unique-URL constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveResult {
    Inserted(u64),
    DuplicateUrl,
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn get_user(&self, user_id: u64) -> Result<User>;
    async fn list_user_ids(&self) -> Result<Vec<u64>>;

    async fn sources_for_user(&self, user_id: u64) -> Result<Vec<ContentSource>>;
    async fn get_source(&self, source_id: u64) -> Result<Option<ContentSource>>;
    async fn update_source(&self, source: ContentSource) -> Result<()>;

    /// Fast-path duplicate check against normalized URLs.
    async fn url_exists(&self, url: &str) -> Result<bool>;
    /// Insert under the unique-URL constraint.
    async fn save_content(&self, item: ContentItem) -> Result<SaveResult>;
    async fn get_content(&self, id: u64) -> Result<Option<ContentItem>>;

    /// Published posts for one user within `window`, newest first.
    async fn recent_published_posts(&self, user_id: u64, window: Duration) -> Result<Vec<PostDraft>>;
    /// Cross-user sample of recent published posts, newest first.
    async fn recent_published_posts_all(&self, limit: usize) -> Result<Vec<PostDraft>>;
    async fn scheduled_posts(&self, user_id: u64) -> Result<Vec<PostDraft>>;
}

/// Downstream draft-generation queue. Fire-and-forget: the pipeline does not
/// await completion of the generated work.
#[async_trait]
pub trait DraftEnqueue: Send + Sync {
    async fn enqueue(&self, content_item_id: u64, user_id: u64) -> Result<()>;
}

// ------------------------------------------------------------
// In-memory implementation
// ------------------------------------------------------------

#[derive(Debug, Default)]
struct MemoryInner {
    users: HashMap<u64, User>,
    sources: HashMap<u64, ContentSource>,
    content: HashMap<u64, ContentItem>,
    urls: HashMap<String, u64>,
    drafts: Vec<PostDraft>,
    next_content_id: u64,
}

/// Mutex-guarded in-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, user: User) {
        self.inner.lock().expect("store poisoned").users.insert(user.id, user);
    }

    pub fn add_source(&self, source: ContentSource) {
        self.inner
            .lock()
            .expect("store poisoned")
            .sources
            .insert(source.id, source);
    }

    pub fn add_draft(&self, draft: PostDraft) {
        self.inner.lock().expect("store poisoned").drafts.push(draft);
    }

    pub fn content_count(&self) -> usize {
        self.inner.lock().expect("store poisoned").content.len()
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn get_user(&self, user_id: u64) -> Result<User> {
        self.inner
            .lock()
            .expect("store poisoned")
            .users
            .get(&user_id)
            .cloned()
            .ok_or_else(|| PipelineError::Store(format!("unknown user {user_id}")))
    }

    async fn list_user_ids(&self) -> Result<Vec<u64>> {
        let mut ids: Vec<u64> = self
            .inner
            .lock()
            .expect("store poisoned")
            .users
            .keys()
            .copied()
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn sources_for_user(&self, user_id: u64) -> Result<Vec<ContentSource>> {
        let mut out: Vec<ContentSource> = self
            .inner
            .lock()
            .expect("store poisoned")
            .sources
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        out.sort_by_key(|s| s.id);
        Ok(out)
    }

    async fn get_source(&self, source_id: u64) -> Result<Option<ContentSource>> {
        Ok(self
            .inner
            .lock()
            .expect("store poisoned")
            .sources
            .get(&source_id)
            .cloned())
    }

    async fn update_source(&self, source: ContentSource) -> Result<()> {
        self.inner
            .lock()
            .expect("store poisoned")
            .sources
            .insert(source.id, source);
        Ok(())
    }

    async fn url_exists(&self, url: &str) -> Result<bool> {
        Ok(self
            .inner
            .lock()
            .expect("store poisoned")
            .urls
            .contains_key(&normalize_url(url)))
    }

    async fn save_content(&self, mut item: ContentItem) -> Result<SaveResult> {
        let mut g = self.inner.lock().expect("store poisoned");
        let key = normalize_url(&item.url);
        if g.urls.contains_key(&key) {
            return Ok(SaveResult::DuplicateUrl);
        }
        g.next_content_id += 1;
        item.id = g.next_content_id;
        let id = item.id;
        g.urls.insert(key, id);
        g.content.insert(id, item);
        Ok(SaveResult::Inserted(id))
    }

    async fn get_content(&self, id: u64) -> Result<Option<ContentItem>> {
        Ok(self
            .inner
            .lock()
            .expect("store poisoned")
            .content
            .get(&id)
            .cloned())
    }

    async fn recent_published_posts(&self, user_id: u64, window: Duration) -> Result<Vec<PostDraft>> {
        let cutoff = Utc::now() - window;
        let mut out: Vec<PostDraft> = self
            .inner
            .lock()
            .expect("store poisoned")
            .drafts
            .iter()
            .filter(|d| {
                d.user_id == user_id
                    && d.status == DraftStatus::Published
                    && d.published_at.is_some_and(|t| t >= cutoff)
            })
            .cloned()
            .collect();
        out.sort_by_key(|d| std::cmp::Reverse(d.published_at));
        Ok(out)
    }

    async fn recent_published_posts_all(&self, limit: usize) -> Result<Vec<PostDraft>> {
        let mut out: Vec<PostDraft> = self
            .inner
            .lock()
            .expect("store poisoned")
            .drafts
            .iter()
            .filter(|d| d.status == DraftStatus::Published && d.published_at.is_some())
            .cloned()
            .collect();
        out.sort_by_key(|d| std::cmp::Reverse(d.published_at));
        out.truncate(limit);
        Ok(out)
    }

    async fn scheduled_posts(&self, user_id: u64) -> Result<Vec<PostDraft>> {
        let mut out: Vec<PostDraft> = self
            .inner
            .lock()
            .expect("store poisoned")
            .drafts
            .iter()
            .filter(|d| d.user_id == user_id && d.status == DraftStatus::Scheduled)
            .cloned()
            .collect();
        out.sort_by_key(|d| d.scheduled_for);
        Ok(out)
    }
}

/// Records enqueued (content_item_id, user_id) pairs; tests assert on them.
#[derive(Debug, Default)]
pub struct RecordingEnqueue {
    queued: Mutex<Vec<(u64, u64)>>,
}

impl RecordingEnqueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queued(&self) -> Vec<(u64, u64)> {
        self.queued.lock().expect("queue poisoned").clone()
    }
}

#[async_trait]
impl DraftEnqueue for RecordingEnqueue {
    async fn enqueue(&self, content_item_id: u64, user_id: u64) -> Result<()> {
        self.queued
            .lock()
            .expect("queue poisoned")
            .push((content_item_id, user_id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UserPreferences;
    use crate::model::ContentStatus;

    fn item(url: &str) -> ContentItem {
        ContentItem {
            id: 0,
            source_id: 1,
            title: "t".into(),
            url: url.into(),
            content: "c".into(),
            author: None,
            published_at: Utc::now(),
            relevance_score: None,
            ai_analysis: None,
            status: ContentStatus::Pending,
            word_count: 1,
        }
    }

    #[tokio::test]
    async fn unique_url_constraint_spans_tracking_params() {
        let store = MemoryStore::new();
        let first = store
            .save_content(item("https://example.com/a?utm_source=rss"))
            .await
            .unwrap();
        assert!(matches!(first, SaveResult::Inserted(_)));

        let second = store
            .save_content(item("https://example.com/a?utm_medium=mail"))
            .await
            .unwrap();
        assert_eq!(second, SaveResult::DuplicateUrl);
        assert!(store.url_exists("https://example.com/a").await.unwrap());
        assert_eq!(store.content_count(), 1);
    }

    #[tokio::test]
    async fn unknown_user_is_a_store_error() {
        let store = MemoryStore::new();
        store.add_user(User {
            id: 1,
            preferences: UserPreferences::default(),
        });
        assert!(store.get_user(1).await.is_ok());
        assert!(matches!(
            store.get_user(99).await,
            Err(PipelineError::Store(_))
        ));
    }
}
