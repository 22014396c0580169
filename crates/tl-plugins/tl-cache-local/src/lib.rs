//! # tl-cache-local
//!
//! In-process implementations of `PageRevalidator`.
//! `LocalPageCache` remembers which page paths went stale so a renderer can
//! rebuild them on next access; `NoopRevalidator` only logs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tl_core::traits::PageRevalidator;
use tracing::debug;

/// Tracks stale page paths and when they were invalidated.
#[derive(Debug, Default)]
pub struct LocalPageCache {
    stale: DashMap<String, DateTime<Utc>>,
}

impl LocalPageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_stale(&self, path: &str) -> bool {
        self.stale.contains_key(normalize(path))
    }

    /// When `path` was last invalidated, if it is still stale.
    pub fn stale_since(&self, path: &str) -> Option<DateTime<Utc>> {
        self.stale.get(normalize(path)).map(|entry| *entry.value())
    }

    /// Called by the renderer after rebuilding `path`. Returns whether the
    /// path was stale.
    pub fn mark_fresh(&self, path: &str) -> bool {
        self.stale.remove(normalize(path)).is_some()
    }

    /// Every stale path, sorted.
    pub fn stale_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.stale.iter().map(|entry| entry.key().clone()).collect();
        paths.sort();
        paths
    }
}

#[async_trait]
impl PageRevalidator for LocalPageCache {
    async fn revalidate_path(&self, path: &str) {
        let path = normalize(path);
        debug!(path, "page marked stale");
        self.stale.insert(path.to_owned(), Utc::now());
    }
}

/// Revalidator for hosts with no page cache.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRevalidator;

#[async_trait]
impl PageRevalidator for NoopRevalidator {
    async fn revalidate_path(&self, path: &str) {
        debug!(path, "revalidation requested; no page cache configured");
    }
}

// "/thread/1/" and "/thread/1" name the same page.
fn normalize(path: &str) -> &str {
    match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}
