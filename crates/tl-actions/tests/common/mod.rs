#![allow(dead_code)]

use std::sync::Arc;

use tl_actions::{Actions, UpdateUserParams};
use tl_cache_local::LocalPageCache;
use tl_core::models::User;
use tl_core::traits::Connector;
use tl_db_sqlite::{Database, SqliteStore};

pub struct Harness {
    pub actions: Actions,
    pub store: Arc<SqliteStore>,
    pub pages: Arc<LocalPageCache>,
}

/// Fresh in-memory store, already connected.
pub async fn harness() -> Harness {
    let store = Arc::new(SqliteStore::new(Database::from_url("sqlite::memory:")));
    store.ensure_connected().await;
    let pages = Arc::new(LocalPageCache::new());
    let actions = Actions::with_store(store.clone(), pages.clone());
    Harness { actions, store, pages }
}

pub async fn onboard(actions: &Actions, id: &str, username: &str) -> User {
    actions
        .update_user(UpdateUserParams {
            user_id: id.into(),
            username: username.into(),
            name: format!("{username} (test)"),
            bio: "just here for the threads".into(),
            image: format!("https://img.example/{username}.png"),
            path: "/onboarding".into(),
        })
        .await
        .expect("onboard user")
}

pub async fn count_rows(store: &SqliteStore, table: &str) -> i64 {
    let pool = store.database().pool().expect("connected");
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .expect("count rows")
}
