//! Community records. Nothing in the thread or user flows writes here yet;
//! these calls keep the table usable from tooling and tests.

use sqlx::Row;
use tl_core::models::Community;
use uuid::Uuid;

use crate::{optional_uuid_column, uuid_column, uuid_to_blob, SqliteStore};

#[derive(Debug, Clone)]
pub struct NewCommunity {
    pub id: String,
    pub username: String,
    pub name: String,
    pub image: Option<String>,
    pub bio: Option<String>,
    pub created_by: Option<Uuid>,
}

impl SqliteStore {
    pub async fn create_community(&self, community: NewCommunity) -> anyhow::Result<Community> {
        let record_id = Uuid::now_v7();
        sqlx::query("INSERT INTO communities (record_id, id, username, name, image, bio, created_by) VALUES (?, ?, ?, ?, ?, ?, ?)")
            .bind(uuid_to_blob(record_id))
            .bind(&community.id)
            .bind(&community.username)
            .bind(&community.name)
            .bind(&community.image)
            .bind(&community.bio)
            .bind(community.created_by.map(uuid_to_blob))
            .execute(self.pool()?)
            .await?;

        Ok(Community {
            record_id,
            id: community.id,
            username: community.username,
            name: community.name,
            image: community.image,
            bio: community.bio,
            created_by: community.created_by,
            threads: Vec::new(),
            members: Vec::new(),
        })
    }

    /// Appends a user to the member list.
    pub async fn add_community_member(&self, community: Uuid, user: Uuid) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO community_members (community_record_id, position, user_record_id)
            SELECT c.record_id,
                   (SELECT COALESCE(MAX(m.position), -1) + 1 FROM community_members m WHERE m.community_record_id = c.record_id),
                   ?
            FROM communities c
            WHERE c.record_id = ?
            "#,
        )
        .bind(uuid_to_blob(user))
        .bind(uuid_to_blob(community))
        .execute(self.pool()?)
        .await?;
        Ok(())
    }

    /// Looks a community up by external id.
    pub async fn fetch_community(&self, id: &str) -> anyhow::Result<Option<Community>> {
        let pool = self.pool()?;
        let row = sqlx::query("SELECT record_id, id, username, name, image, bio, created_by FROM communities WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let record_id = uuid_column(&row, "record_id")?;

        let threads = sqlx::query("SELECT thread_id FROM community_threads WHERE community_record_id = ? ORDER BY position")
            .bind(uuid_to_blob(record_id))
            .fetch_all(pool)
            .await?
            .iter()
            .map(|r| uuid_column(r, "thread_id"))
            .collect::<anyhow::Result<Vec<_>>>()?;

        let members = sqlx::query("SELECT user_record_id FROM community_members WHERE community_record_id = ? ORDER BY position")
            .bind(uuid_to_blob(record_id))
            .fetch_all(pool)
            .await?
            .iter()
            .map(|r| uuid_column(r, "user_record_id"))
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Some(Community {
            record_id,
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            name: row.try_get("name")?,
            image: row.try_get("image")?,
            bio: row.try_get("bio")?,
            created_by: optional_uuid_column(&row, "created_by")?,
            threads,
            members,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use tl_core::traits::Connector;

    #[tokio::test]
    async fn test_community_members_round_trip() {
        let store = SqliteStore::new(Database::from_url("sqlite::memory:"));
        store.ensure_connected().await;

        let owner = Uuid::now_v7();
        let created = store
            .create_community(NewCommunity {
                id: "org_1".into(),
                username: "rustaceans".into(),
                name: "Rustaceans".into(),
                image: None,
                bio: Some("All things Rust".into()),
                created_by: Some(owner),
            })
            .await
            .unwrap();
        store.add_community_member(created.record_id, owner).await.unwrap();

        let fetched = store.fetch_community("org_1").await.unwrap().unwrap();
        assert_eq!(fetched.record_id, created.record_id);
        assert_eq!(fetched.created_by, Some(owner));
        assert_eq!(fetched.members, vec![owner]);
        assert!(fetched.threads.is_empty());
        assert!(store.fetch_community("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_community_username_is_unique() {
        let store = SqliteStore::new(Database::from_url("sqlite::memory:"));
        store.ensure_connected().await;

        let new = NewCommunity {
            id: "org_1".into(),
            username: "rustaceans".into(),
            name: "Rustaceans".into(),
            image: None,
            bio: None,
            created_by: None,
        };
        store.create_community(new.clone()).await.unwrap();
        assert!(store.create_community(NewCommunity { id: "org_2".into(), ..new }).await.is_err());
    }
}
