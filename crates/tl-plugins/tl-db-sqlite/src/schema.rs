//! Table layout.
//!
//! Reference collections (a user's threads, a thread's children, a
//! community's threads and members) live in their own tables with an
//! explicit `position`, so append order survives round trips.

use anyhow::Context;
use sqlx::SqlitePool;
use tracing::debug;

const STATEMENTS: &[(&str, &str)] = &[
    (
        "users",
        r#"
        CREATE TABLE IF NOT EXISTS users (
            record_id BLOB PRIMARY KEY,
            id TEXT NOT NULL UNIQUE,
            username TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            bio TEXT,
            image TEXT,
            onboarded INTEGER NOT NULL DEFAULT 0
        );
        "#,
    ),
    (
        "threads",
        r#"
        CREATE TABLE IF NOT EXISTS threads (
            id BLOB PRIMARY KEY,
            text TEXT NOT NULL,
            author BLOB NOT NULL,
            community BLOB,
            created_at TEXT NOT NULL,
            parent_id TEXT
        );
        "#,
    ),
    (
        "threads_top_level",
        "CREATE INDEX IF NOT EXISTS threads_top_level ON threads (created_at DESC) WHERE parent_id IS NULL;",
    ),
    (
        "thread_children",
        r#"
        CREATE TABLE IF NOT EXISTS thread_children (
            thread_id BLOB NOT NULL REFERENCES threads(id),
            position INTEGER NOT NULL,
            child_id BLOB NOT NULL,
            PRIMARY KEY (thread_id, position)
        );
        "#,
    ),
    (
        "user_threads",
        r#"
        CREATE TABLE IF NOT EXISTS user_threads (
            user_record_id BLOB NOT NULL REFERENCES users(record_id),
            position INTEGER NOT NULL,
            thread_id BLOB NOT NULL,
            PRIMARY KEY (user_record_id, position)
        );
        "#,
    ),
    (
        "communities",
        r#"
        CREATE TABLE IF NOT EXISTS communities (
            record_id BLOB PRIMARY KEY,
            id TEXT NOT NULL,
            username TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            image TEXT,
            bio TEXT,
            created_by BLOB
        );
        "#,
    ),
    (
        "community_threads",
        r#"
        CREATE TABLE IF NOT EXISTS community_threads (
            community_record_id BLOB NOT NULL REFERENCES communities(record_id),
            position INTEGER NOT NULL,
            thread_id BLOB NOT NULL,
            PRIMARY KEY (community_record_id, position)
        );
        "#,
    ),
    (
        "community_members",
        r#"
        CREATE TABLE IF NOT EXISTS community_members (
            community_record_id BLOB NOT NULL REFERENCES communities(record_id),
            position INTEGER NOT NULL,
            user_record_id BLOB NOT NULL,
            PRIMARY KEY (community_record_id, position)
        );
        "#,
    ),
];

/// Creates every table and index. Safe to run repeatedly.
pub async fn create_schema(pool: &SqlitePool) -> anyhow::Result<()> {
    for (name, sql) in STATEMENTS {
        sqlx::query(sql)
            .execute(pool)
            .await
            .with_context(|| format!("failed to create {name}"))?;
    }
    debug!(objects = STATEMENTS.len(), "schema ready");
    Ok(())
}
