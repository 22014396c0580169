//! # Domain Models
//!
//! Stored record shapes for Threadline plus the expanded views handed back
//! by read operations. Records reference each other by internal UUID v7,
//! which keeps ids time-ordered.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Internal storage identifier, assigned on first upsert.
    pub record_id: Uuid,
    /// External identifier handed in by the identity provider.
    pub id: String,
    /// Always stored lowercase.
    pub username: String,
    pub name: String,
    pub bio: Option<String>,
    /// Avatar URL
    pub image: Option<String>,
    pub onboarded: bool,
    /// Threads authored by this user, in creation order.
    pub threads: Vec<Uuid>,
}

/// A post. Top-level threads and replies share this shape; a reply carries
/// `parent_id` and is listed in its parent's `children`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    pub id: Uuid,
    pub text: String,
    /// Record id of the authoring user. Not checked for existence.
    pub author: Uuid,
    pub community: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    /// Parent thread id kept as plain text, not as a checked reference.
    pub parent_id: Option<String>,
    pub children: Vec<Uuid>,
}

impl Thread {
    /// A new, unsaved top-level thread stamped with the current time.
    pub fn new(text: impl Into<String>, author: Uuid) -> Self {
        Self {
            id: Uuid::now_v7(),
            text: text.into(),
            author,
            community: None,
            created_at: Utc::now(),
            parent_id: None,
            children: Vec::new(),
        }
    }

    /// A new, unsaved reply to `parent`.
    pub fn reply_to(parent: Uuid, text: impl Into<String>, author: Uuid) -> Self {
        Self {
            parent_id: Some(parent.to_string()),
            ..Self::new(text, author)
        }
    }

    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// A community. Only the record shape exists; no thread or user operation
/// writes to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Community {
    pub record_id: Uuid,
    pub id: String,
    pub username: String,
    pub name: String,
    pub image: Option<String>,
    pub bio: Option<String>,
    pub created_by: Option<Uuid>,
    pub threads: Vec<Uuid>,
    pub members: Vec<Uuid>,
}

/// Fields written by a profile upsert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    pub name: String,
    pub bio: String,
    pub image: String,
}

/// The subset of a user exposed when it is expanded as an author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub record_id: Uuid,
    pub id: String,
    pub name: String,
    pub image: Option<String>,
}

impl From<User> for Author {
    fn from(user: User) -> Self {
        Self {
            record_id: user.record_id,
            id: user.id,
            name: user.name,
            image: user.image,
        }
    }
}

/// A reference that is either left as a bare id or replaced by the record
/// it points to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Ref<T> {
    Id(Uuid),
    Expanded(Box<T>),
}

impl<T> Ref<T> {
    pub fn expanded(&self) -> Option<&T> {
        match self {
            Ref::Expanded(inner) => Some(inner),
            Ref::Id(_) => None,
        }
    }

    pub fn is_expanded(&self) -> bool {
        matches!(self, Ref::Expanded(_))
    }
}

/// A thread as returned by read operations, with some references expanded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadNode {
    pub id: Uuid,
    pub text: String,
    pub author: Ref<Author>,
    pub community: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub parent_id: Option<String>,
    pub children: Vec<Ref<ThreadNode>>,
}

impl ThreadNode {
    /// Expanded children, skipping any left as bare ids.
    pub fn expanded_children(&self) -> impl Iterator<Item = &ThreadNode> {
        self.children.iter().filter_map(Ref::expanded)
    }
}

/// One page of top-level threads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadPage {
    pub threads: Vec<ThreadNode>,
    pub has_next: bool,
}

/// A user together with their expanded threads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserThreads {
    pub user: User,
    pub threads: Vec<ThreadNode>,
}
