//! # Core Traits (Ports)
//!
//! Any plugin must implement these traits to be used by the actions layer.

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Author, Thread, User, UserProfile};

/// Lazily establishes the shared store connection.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait Connector: Send + Sync {
    /// Idempotent. Never fails: problems are logged and surface on the next
    /// store call instead.
    async fn ensure_connected(&self);
}

/// Persistence contract for threads and replies.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ThreadStore: Send + Sync {
    /// Inserts `thread` and appends its id to the author's thread list.
    async fn create_thread(&self, thread: Thread) -> anyhow::Result<()>;

    /// Inserts `reply` and appends its id to the children of `parent`.
    async fn add_reply(&self, parent: Uuid, reply: Thread) -> anyhow::Result<()>;

    async fn find_thread(&self, id: Uuid) -> anyhow::Result<Option<Thread>>;

    /// Loads every thread in `ids` that exists, in no particular order.
    async fn find_threads(&self, ids: &[Uuid]) -> anyhow::Result<Vec<Thread>>;

    /// Top-level threads, newest first.
    async fn list_top_level(&self, limit: i64, offset: i64) -> anyhow::Result<Vec<Thread>>;

    async fn count_top_level(&self) -> anyhow::Result<i64>;
}

/// Persistence contract for user profiles.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Creates or updates the user keyed by `profile.id` and marks it onboarded.
    async fn upsert_user(&self, profile: UserProfile) -> anyhow::Result<User>;

    /// Looks a user up by external id.
    async fn find_user(&self, id: &str) -> anyhow::Result<Option<User>>;

    /// Loads the author view of every user in `record_ids` that exists.
    async fn find_authors(&self, record_ids: &[Uuid]) -> anyhow::Result<Vec<Author>>;
}

/// Page-cache invalidation hook of the hosting framework.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PageRevalidator: Send + Sync {
    /// Marks any cached rendering of `path` for recomputation. Fire-and-forget.
    async fn revalidate_path(&self, path: &str);
}
