//! Thread operations.

use serde::Deserialize;
use tl_core::error::{AppError, Result};
use tl_core::models::{Thread, ThreadNode, ThreadPage};
use tracing::{info, instrument, trace};
use uuid::Uuid;

use crate::populate::{expand, DETAIL, LISTING};
use crate::{wrap, Actions};

const CREATE_THREAD: &str = "Error creating thread";
const FETCH_THREADS: &str = "Error fetching threads";
const FETCH_THREAD: &str = "Error fetching thread";
const ADD_COMMENT: &str = "Error adding comment";

#[derive(Debug, Clone, Deserialize)]
pub struct CreateThreadParams {
    pub text: String,
    /// Record id of the author.
    pub author: Uuid,
    /// Accepted but not stored; new threads never belong to a community.
    pub community_id: Option<String>,
    /// Page to revalidate once the thread exists.
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddCommentParams {
    pub thread_id: Uuid,
    pub comment_text: String,
    /// Record id of the commenting user.
    pub user_id: Uuid,
    pub path: String,
}

/// 1-based page selector for thread listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PageRequest {
    pub page_number: u32,
    pub page_size: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page_number: 1,
            page_size: 20,
        }
    }
}

impl PageRequest {
    pub fn new(page_number: u32, page_size: u32) -> Self {
        Self {
            page_number,
            page_size,
        }
    }

    /// Page 0 is treated as page 1. Saturates instead of overflowing.
    pub fn offset(&self) -> i64 {
        i64::from(self.page_number.saturating_sub(1)).saturating_mul(self.limit())
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }
}

impl Actions {
    /// Creates a top-level thread and links it to its author.
    #[instrument(skip(self, params), fields(author = %params.author, path = %params.path))]
    pub async fn create_thread(&self, params: CreateThreadParams) -> Result<Thread> {
        let thread = async {
            self.connection.ensure_connected().await;

            if let Some(community) = params.community_id.as_deref() {
                trace!(community, "community id ignored on thread creation");
            }
            let thread = Thread::new(params.text.clone(), params.author);
            self.threads.create_thread(thread.clone()).await?;

            info!(thread = %thread.id, "thread created");
            Ok::<_, anyhow::Error>(thread)
        }
        .await
        .map_err(wrap(CREATE_THREAD))?;

        self.pages.revalidate_path(&params.path).await;
        Ok(thread)
    }

    /// Top-level threads, newest first, with authors and direct replies
    /// expanded.
    #[instrument(skip(self))]
    pub async fn fetch_threads(&self, page: PageRequest) -> Result<ThreadPage> {
        async {
            self.connection.ensure_connected().await;

            let offset = page.offset();
            let threads = self.threads.list_top_level(page.limit(), offset).await?;
            let total = self.threads.count_top_level().await?;
            let has_next = total > offset.saturating_add(threads.len() as i64);

            let threads = expand(self.threads.as_ref(), self.users.as_ref(), threads, &LISTING).await?;
            Ok::<_, anyhow::Error>(ThreadPage { threads, has_next })
        }
        .await
        .map_err(wrap(FETCH_THREADS))
    }

    /// One thread with three levels of replies and their authors.
    #[instrument(skip(self))]
    pub async fn fetch_thread_by_id(&self, id: Uuid) -> Result<Option<ThreadNode>> {
        async {
            self.connection.ensure_connected().await;

            let Some(thread) = self.threads.find_thread(id).await? else {
                return Ok(None);
            };
            let mut nodes = expand(self.threads.as_ref(), self.users.as_ref(), vec![thread], &DETAIL).await?;
            Ok::<_, anyhow::Error>(nodes.pop())
        }
        .await
        .map_err(wrap(FETCH_THREAD))
    }

    /// Posts a reply under `params.thread_id` and appends it to the parent's
    /// children.
    #[instrument(skip(self, params), fields(thread = %params.thread_id, path = %params.path))]
    pub async fn add_comment_to_thread(&self, params: AddCommentParams) -> Result<Thread> {
        async {
            self.connection.ensure_connected().await;

            let original = self
                .threads
                .find_thread(params.thread_id)
                .await?
                .ok_or(AppError::NotFound("Thread"))?;

            let comment = Thread::reply_to(original.id, params.comment_text.clone(), params.user_id);
            self.threads.add_reply(original.id, comment.clone()).await?;
            info!(comment = %comment.id, "comment added");

            self.pages.revalidate_path(&params.path).await;
            Ok::<_, anyhow::Error>(comment)
        }
        .await
        .map_err(wrap(ADD_COMMENT))
    }
}
