//! # Threadline Binary
//!
//! Assembles the store, page cache and actions from configuration, seeds a
//! small demo conversation and prints the front page as JSON.

use std::sync::Arc;

use tl_actions::{
    Actions, AddCommentParams, CreateThreadParams, PageRequest, UpdateUserParams, PROFILE_EDIT_PATH,
};
use tl_cache_local::LocalPageCache;
use tl_config::AppConfig;
use tl_db_sqlite::{Database, DatabaseOptions, SqliteStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load()?;

    // 1. Store: connects lazily on the first action
    let db = Database::new(
        config.database_url,
        DatabaseOptions {
            max_connections: config.max_connections,
            acquire_timeout: config.acquire_timeout,
        },
    );
    let store = Arc::new(SqliteStore::new(db));

    // 2. Page cache
    let pages = Arc::new(LocalPageCache::new());

    // 3. One context for every action
    let actions = Actions::with_store(store, pages.clone());

    let ada = actions
        .update_user(UpdateUserParams {
            user_id: "demo_ada".into(),
            username: "Ada".into(),
            name: "Ada Lovelace".into(),
            bio: "Poetical science enthusiast".into(),
            image: "https://img.example/ada.png".into(),
            path: PROFILE_EDIT_PATH.into(),
        })
        .await?;

    let thread = actions
        .create_thread(CreateThreadParams {
            text: "Hello from Threadline!".into(),
            author: ada.record_id,
            community_id: None,
            path: "/".into(),
        })
        .await?;

    actions
        .add_comment_to_thread(AddCommentParams {
            thread_id: thread.id,
            comment_text: "Replying to myself, as one does.".into(),
            user_id: ada.record_id,
            path: format!("/thread/{}", thread.id),
        })
        .await?;

    let page = actions.fetch_threads(PageRequest::default()).await?;
    println!("{}", serde_json::to_string_pretty(&page)?);

    info!(stale = ?pages.stale_paths(), "pages awaiting revalidation");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
