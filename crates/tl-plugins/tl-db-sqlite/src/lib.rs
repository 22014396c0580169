//! # tl-db-sqlite Implementation
//!
//! This module implements the data mapping between the SQLite relational model
//! and the `tl-core` domain models.

mod community;
mod connection;
mod schema;

pub use community::NewCommunity;
pub use connection::{Database, DatabaseOptions};
pub use schema::create_schema;

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnection, SqlitePool, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};
use tl_core::error::AppError;
use tl_core::models::{Author, Thread, User, UserProfile};
use tl_core::traits::{Connector, ThreadStore, UserStore};
use tracing::warn;
use uuid::Uuid;

const THREAD_COLUMNS: &str = "id, text, author, community, created_at, parent_id";
const USER_COLUMNS: &str = "record_id, id, username, name, bio, image, onboarded";

pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    fn pool(&self) -> anyhow::Result<&SqlitePool> {
        Ok(self.db.pool()?)
    }
}

// Helper for UUID conversion
fn uuid_to_blob(id: Uuid) -> Vec<u8> {
    id.as_bytes().to_vec()
}

fn blob_to_uuid(blob: &[u8]) -> anyhow::Result<Uuid> {
    Ok(Uuid::from_slice(blob)?)
}

fn uuid_column(row: &SqliteRow, column: &str) -> anyhow::Result<Uuid> {
    blob_to_uuid(&row.try_get::<Vec<u8>, _>(column)?)
}

fn optional_uuid_column(row: &SqliteRow, column: &str) -> anyhow::Result<Option<Uuid>> {
    row.try_get::<Option<Vec<u8>>, _>(column)?
        .as_deref()
        .map(blob_to_uuid)
        .transpose()
}

fn thread_from_row(row: &SqliteRow) -> anyhow::Result<Thread> {
    Ok(Thread {
        id: uuid_column(row, "id")?,
        text: row.try_get("text")?,
        author: uuid_column(row, "author")?,
        community: optional_uuid_column(row, "community")?,
        created_at: row.try_get("created_at")?,
        parent_id: row.try_get("parent_id")?,
        children: Vec::new(),
    })
}

fn user_from_row(row: &SqliteRow) -> anyhow::Result<User> {
    Ok(User {
        record_id: uuid_column(row, "record_id")?,
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        name: row.try_get("name")?,
        bio: row.try_get("bio")?,
        image: row.try_get("image")?,
        onboarded: row.try_get("onboarded")?,
        threads: Vec::new(),
    })
}

/// Ids bound per `IN (...)` list; SQLite caps the number of bound variables.
const ID_CHUNK: usize = 500;

/// Appends `SELECT <columns> FROM <table> WHERE <key> IN (...)`.
fn select_in<'a>(columns: &str, table: &str, key: &str, ids: &[Uuid]) -> QueryBuilder<'a, Sqlite> {
    let mut qb = QueryBuilder::new(format!("SELECT {columns} FROM {table} WHERE {key} IN ("));
    let mut separated = qb.separated(", ");
    for id in ids {
        separated.push_bind(uuid_to_blob(*id));
    }
    separated.push_unseparated(")");
    qb
}

/// Runs `select_in` over `ids` in chunks of [`ID_CHUNK`] and concatenates
/// the rows. `order_by` applies within each chunk.
async fn fetch_by_ids(
    pool: &SqlitePool,
    columns: &str,
    table: &str,
    key: &str,
    ids: &[Uuid],
    order_by: Option<&str>,
) -> anyhow::Result<Vec<SqliteRow>> {
    let mut rows = Vec::new();
    for chunk in ids.chunks(ID_CHUNK) {
        let mut qb = select_in(columns, table, key, chunk);
        if let Some(order_by) = order_by {
            qb.push(" ORDER BY ").push(order_by);
        }
        rows.extend(qb.build().fetch_all(pool).await?);
    }
    Ok(rows)
}

/// Fills `children` for every thread with one query.
async fn attach_children(pool: &SqlitePool, threads: &mut [Thread]) -> anyhow::Result<()> {
    if threads.is_empty() {
        return Ok(());
    }

    let ids: Vec<Uuid> = threads.iter().map(|t| t.id).collect();
    // Every child of a parent lands in the parent's chunk, so per-chunk
    // ordering keeps each children list in position order.
    let rows = fetch_by_ids(
        pool,
        "thread_id, child_id",
        "thread_children",
        "thread_id",
        &ids,
        Some("thread_id, position"),
    )
    .await?;

    let mut by_parent: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for row in &rows {
        by_parent
            .entry(uuid_column(row, "thread_id")?)
            .or_default()
            .push(uuid_column(row, "child_id")?);
    }
    for thread in threads.iter_mut() {
        if let Some(children) = by_parent.remove(&thread.id) {
            thread.children = children;
        }
    }
    Ok(())
}

async fn insert_thread(conn: &mut SqliteConnection, thread: &Thread) -> anyhow::Result<()> {
    sqlx::query("INSERT INTO threads (id, text, author, community, created_at, parent_id) VALUES (?, ?, ?, ?, ?, ?)")
        .bind(uuid_to_blob(thread.id))
        .bind(&thread.text)
        .bind(uuid_to_blob(thread.author))
        .bind(thread.community.map(uuid_to_blob))
        .bind(thread.created_at)
        .bind(&thread.parent_id)
        .execute(&mut *conn)
        .await?;

    for (position, child) in thread.children.iter().enumerate() {
        sqlx::query("INSERT INTO thread_children (thread_id, position, child_id) VALUES (?, ?, ?)")
            .bind(uuid_to_blob(thread.id))
            .bind(position as i64)
            .bind(uuid_to_blob(*child))
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

#[async_trait]
impl Connector for SqliteStore {
    async fn ensure_connected(&self) {
        self.db.ensure_connected().await;
    }
}

#[async_trait]
impl ThreadStore for SqliteStore {
    /// Inserts the thread and links it to its author in one transaction.
    ///
    /// An unknown author is not an error: the thread is kept and nothing is
    /// linked, the same as a push against a missing document.
    async fn create_thread(&self, thread: Thread) -> anyhow::Result<()> {
        let mut tx = self.pool()?.begin().await?;

        insert_thread(&mut tx, &thread).await?;

        let linked = sqlx::query(
            r#"
            INSERT INTO user_threads (user_record_id, position, thread_id)
            SELECT u.record_id,
                   (SELECT COALESCE(MAX(position), -1) + 1 FROM user_threads WHERE user_record_id = u.record_id),
                   ?
            FROM users u
            WHERE u.record_id = ?
            "#,
        )
        .bind(uuid_to_blob(thread.id))
        .bind(uuid_to_blob(thread.author))
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if linked == 0 {
            warn!(thread = %thread.id, author = %thread.author, "author not found; thread left unlinked");
        }

        tx.commit().await?;
        Ok(())
    }

    /// Inserts the reply and appends it to the parent's children. Both
    /// writes commit together or not at all.
    async fn add_reply(&self, parent: Uuid, reply: Thread) -> anyhow::Result<()> {
        let mut tx = self.pool()?.begin().await?;

        insert_thread(&mut tx, &reply).await?;

        let linked = sqlx::query(
            r#"
            INSERT INTO thread_children (thread_id, position, child_id)
            SELECT t.id,
                   (SELECT COALESCE(MAX(c.position), -1) + 1 FROM thread_children c WHERE c.thread_id = t.id),
                   ?
            FROM threads t
            WHERE t.id = ?
            "#,
        )
        .bind(uuid_to_blob(reply.id))
        .bind(uuid_to_blob(parent))
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if linked == 0 {
            // Dropping `tx` rolls the reply back.
            return Err(AppError::NotFound("Thread").into());
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find_thread(&self, id: Uuid) -> anyhow::Result<Option<Thread>> {
        let pool = self.pool()?;
        let row = sqlx::query(&format!("SELECT {THREAD_COLUMNS} FROM threads WHERE id = ?"))
            .bind(uuid_to_blob(id))
            .fetch_optional(pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut threads = [thread_from_row(&row)?];
        attach_children(pool, &mut threads).await?;
        let [thread] = threads;
        Ok(Some(thread))
    }

    async fn find_threads(&self, ids: &[Uuid]) -> anyhow::Result<Vec<Thread>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let pool = self.pool()?;
        let rows = fetch_by_ids(pool, THREAD_COLUMNS, "threads", "id", ids, None).await?;

        let mut threads = rows.iter().map(thread_from_row).collect::<anyhow::Result<Vec<_>>>()?;
        attach_children(pool, &mut threads).await?;
        Ok(threads)
    }

    async fn list_top_level(&self, limit: i64, offset: i64) -> anyhow::Result<Vec<Thread>> {
        let pool = self.pool()?;
        // Replies carry a parent_id; only roots are listed.
        let rows = sqlx::query(&format!(
            "SELECT {THREAD_COLUMNS} FROM threads WHERE parent_id IS NULL ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        let mut threads = rows.iter().map(thread_from_row).collect::<anyhow::Result<Vec<_>>>()?;
        attach_children(pool, &mut threads).await?;
        Ok(threads)
    }

    async fn count_top_level(&self) -> anyhow::Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM threads WHERE parent_id IS NULL")
            .fetch_one(self.pool()?)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl UserStore for SqliteStore {
    async fn upsert_user(&self, profile: UserProfile) -> anyhow::Result<User> {
        sqlx::query(
            r#"
            INSERT INTO users (record_id, id, username, name, bio, image, onboarded)
            VALUES (?, ?, ?, ?, ?, ?, 1)
            ON CONFLICT (id) DO UPDATE SET
                username = excluded.username,
                name = excluded.name,
                bio = excluded.bio,
                image = excluded.image,
                onboarded = 1
            "#,
        )
        .bind(uuid_to_blob(Uuid::now_v7()))
        .bind(&profile.id)
        .bind(&profile.username)
        .bind(&profile.name)
        .bind(&profile.bio)
        .bind(&profile.image)
        .execute(self.pool()?)
        .await?;

        self.find_user(&profile.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("user {} missing right after upsert", profile.id))
    }

    async fn find_user(&self, id: &str) -> anyhow::Result<Option<User>> {
        let pool = self.pool()?;
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id)
            .fetch_optional(pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut user = user_from_row(&row)?;

        user.threads = sqlx::query("SELECT thread_id FROM user_threads WHERE user_record_id = ? ORDER BY position")
            .bind(uuid_to_blob(user.record_id))
            .fetch_all(pool)
            .await?
            .iter()
            .map(|row| uuid_column(row, "thread_id"))
            .collect::<anyhow::Result<_>>()?;

        Ok(Some(user))
    }

    async fn find_authors(&self, record_ids: &[Uuid]) -> anyhow::Result<Vec<Author>> {
        if record_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = fetch_by_ids(self.pool()?, USER_COLUMNS, "users", "record_id", record_ids, None).await?;

        rows.iter()
            .map(|row| user_from_row(row).map(Author::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    async fn store() -> SqliteStore {
        let store = SqliteStore::new(Database::from_url("sqlite::memory:"));
        store.ensure_connected().await;
        store
    }

    fn profile(id: &str, username: &str) -> UserProfile {
        UserProfile {
            id: id.into(),
            username: username.into(),
            name: "Test User".into(),
            bio: "hello".into(),
            image: "https://img.example/a.png".into(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get_thread() {
        let repo = store().await;
        let user = repo.upsert_user(profile("user_1", "ada")).await.unwrap();

        let thread = Thread::new("OP", user.record_id);
        repo.create_thread(thread.clone()).await.expect("Failed to create thread");

        let stored = repo.find_thread(thread.id).await.unwrap().unwrap();
        assert_eq!(stored.text, "OP");
        assert_eq!(stored.author, user.record_id);
        assert!(stored.is_top_level());

        let user = repo.find_user("user_1").await.unwrap().unwrap();
        assert_eq!(user.threads, vec![thread.id]);
    }

    #[tokio::test]
    async fn test_unknown_author_keeps_thread() {
        let repo = store().await;
        let thread = Thread::new("orphan", Uuid::now_v7());
        repo.create_thread(thread.clone()).await.unwrap();
        assert!(repo.find_thread(thread.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_replies_keep_append_order() {
        let repo = store().await;
        let author = Uuid::now_v7();
        let op = Thread::new("OP", author);
        repo.create_thread(op.clone()).await.unwrap();

        let first = Thread::reply_to(op.id, "first", author);
        let second = Thread::reply_to(op.id, "second", author);
        repo.add_reply(op.id, first.clone()).await.unwrap();
        repo.add_reply(op.id, second.clone()).await.unwrap();

        let op = repo.find_thread(op.id).await.unwrap().unwrap();
        assert_eq!(op.children, vec![first.id, second.id]);
        assert_eq!(repo.count_top_level().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_reply_to_missing_parent_rolls_back() {
        let repo = store().await;
        let parent = Uuid::now_v7();
        let reply = Thread::reply_to(parent, "lost", Uuid::now_v7());

        let err = repo.add_reply(parent, reply.clone()).await.unwrap_err();
        assert_eq!(err.to_string(), "Thread not found");
        assert!(repo.find_thread(reply.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lookups_span_more_ids_than_one_chunk() {
        let repo = store().await;
        let author = repo.upsert_user(profile("user_1", "ada")).await.unwrap().record_id;
        let op = Thread::new("OP", author);
        repo.create_thread(op.clone()).await.unwrap();

        let mut replies = Vec::new();
        for i in 0..ID_CHUNK + 20 {
            let reply = Thread::reply_to(op.id, format!("reply {i}"), author);
            repo.add_reply(op.id, reply.clone()).await.unwrap();
            replies.push(reply.id);
        }

        let stored = repo.find_thread(op.id).await.unwrap().unwrap();
        assert_eq!(stored.children, replies);

        let loaded = repo.find_threads(&replies).await.unwrap();
        assert_eq!(loaded.len(), replies.len());
        assert_eq!(repo.list_top_level(20, 0).await.unwrap()[0].children.len(), replies.len());

        let mut record_ids = vec![author];
        record_ids.extend((0..ID_CHUNK).map(|_| Uuid::now_v7()));
        assert_eq!(repo.find_authors(&record_ids).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_replies_are_not_listed_as_top_level() {
        let repo = store().await;
        let author = Uuid::now_v7();
        let op = Thread::new("OP", author);
        repo.create_thread(op.clone()).await.unwrap();
        repo.add_reply(op.id, Thread::reply_to(op.id, "reply", author))
            .await
            .unwrap();

        let listed = repo.list_top_level(20, 0).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, op.id);
    }

    #[tokio::test]
    async fn test_top_level_listing_is_newest_first() {
        let repo = store().await;
        let author = Uuid::now_v7();
        let base = Utc::now();
        for i in 0..3 {
            let mut thread = Thread::new(format!("t{i}"), author);
            thread.created_at = base + Duration::seconds(i);
            repo.create_thread(thread).await.unwrap();
        }

        let page = repo.list_top_level(2, 0).await.unwrap();
        let texts: Vec<_> = page.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, ["t2", "t1"]);
        assert_eq!(repo.list_top_level(2, 2).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_updates_in_place() {
        let repo = store().await;
        let first = repo.upsert_user(profile("user_1", "ada")).await.unwrap();
        let mut changed = profile("user_1", "ada");
        changed.bio = "updated".into();
        let second = repo.upsert_user(changed).await.unwrap();

        assert_eq!(first.record_id, second.record_id);
        assert_eq!(second.bio.as_deref(), Some("updated"));
        assert!(second.onboarded);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(repo.pool().unwrap())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_find_authors_skips_unknown_ids() {
        let repo = store().await;
        let user = repo.upsert_user(profile("user_1", "ada")).await.unwrap();
        let authors = repo.find_authors(&[user.record_id, Uuid::now_v7()]).await.unwrap();
        assert_eq!(authors.len(), 1);
        assert_eq!(authors[0].id, "user_1");
    }

    #[tokio::test]
    async fn test_calls_fail_when_not_connected() {
        let repo = SqliteStore::new(Database::new(None, DatabaseOptions::default()));
        repo.ensure_connected().await;
        let err = repo.find_user("user_1").await.unwrap_err();
        assert_eq!(err.to_string(), "not connected to the database");
    }
}
