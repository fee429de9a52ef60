use std::time::Duration;

use moka::future::Cache;
use tracing::debug;
use uuid::Uuid;

/// Rendered pages kept for a short time-to-live.
///
/// Entries are never invalidated by writes: a new post shows up on a cached
/// page only after the entry expires or [`PageCache::clear`] is called.
#[derive(Clone)]
pub struct PageCache {
    prefix: &'static str,
    pages: Cache<String, String>,
}

impl PageCache {
    pub fn new(prefix: &'static str, ttl: Duration) -> Self {
        Self {
            prefix,
            pages: Cache::builder()
                .max_capacity(10_000)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Pages differ per viewer (navigation shows the current user).
    pub fn key(&self, viewer: Option<Uuid>, path_and_query: &str) -> String {
        match viewer {
            Some(id) => format!("{}:{}:{}", self.prefix, id, path_and_query),
            None => format!("{}:anonymous:{}", self.prefix, path_and_query),
        }
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        let hit = self.pages.get(key).await;
        debug!(key, hit = hit.is_some(), "page cache lookup");
        hit
    }

    pub async fn insert(&self, key: String, body: String) {
        self.pages.insert(key, body).await;
    }

    pub fn clear(&self) {
        self.pages.invalidate_all();
    }
}
