//! User profile operations.

use std::collections::HashMap;

use serde::Deserialize;
use tl_core::error::Result;
use tl_core::models::{Thread, User, UserProfile, UserThreads};
use tracing::{debug, instrument};

use crate::populate::{expand, USER_THREADS};
use crate::{wrap, Actions};

/// The only page revalidated after a profile update.
pub const PROFILE_EDIT_PATH: &str = "/profile/edit";

const UPDATE_USER: &str = "Failed to create/update user";
const FETCH_USER: &str = "Failed to fetch user";
const FETCH_USER_THREADS: &str = "Failed to fetch user threads";

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateUserParams {
    /// External user id.
    pub user_id: String,
    pub username: String,
    pub name: String,
    pub bio: String,
    pub image: String,
    pub path: String,
}

impl Actions {
    /// Creates or updates the profile for `params.user_id` and marks the
    /// user onboarded. The username is stored lowercase.
    #[instrument(skip(self, params), fields(user = %params.user_id, path = %params.path))]
    pub async fn update_user(&self, params: UpdateUserParams) -> Result<User> {
        let UpdateUserParams {
            user_id,
            username,
            name,
            bio,
            image,
            path,
        } = params;

        async move {
            self.connection.ensure_connected().await;

            let profile = UserProfile {
                id: user_id,
                username: username.to_lowercase(),
                name,
                bio,
                image,
            };
            let user = self.users.upsert_user(profile).await?;

            if path == PROFILE_EDIT_PATH {
                self.pages.revalidate_path(&path).await;
            } else {
                debug!("no revalidation outside the profile editor");
            }
            Ok::<_, anyhow::Error>(user)
        }
        .await
        .map_err(wrap(UPDATE_USER))
    }

    /// The user with external id `user_id`, if any.
    #[instrument(skip(self))]
    pub async fn fetch_user(&self, user_id: &str) -> Result<Option<User>> {
        async {
            self.connection.ensure_connected().await;
            self.users.find_user(user_id).await
        }
        .await
        .map_err(wrap(FETCH_USER))
    }

    /// The user with their threads, each thread's replies and the replies'
    /// authors expanded.
    #[instrument(skip(self))]
    pub async fn fetch_user_threads(&self, user_id: &str) -> Result<Option<UserThreads>> {
        async {
            self.connection.ensure_connected().await;

            let Some(user) = self.users.find_user(user_id).await? else {
                return Ok(None);
            };

            let mut loaded: HashMap<_, Thread> = self
                .threads
                .find_threads(&user.threads)
                .await?
                .into_iter()
                .map(|t| (t.id, t))
                .collect();
            let owned: Vec<Thread> = user.threads.iter().filter_map(|id| loaded.remove(id)).collect();

            let threads = expand(self.threads.as_ref(), self.users.as_ref(), owned, &USER_THREADS).await?;
            Ok::<_, anyhow::Error>(Some(UserThreads { user, threads }))
        }
        .await
        .map_err(wrap(FETCH_USER_THREADS))
    }
}
