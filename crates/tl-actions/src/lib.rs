//! # tl-actions
//!
//! The operations invoked by the request layer: thread creation and
//! listing, reply trees, comments and user profiles.
//!
//! Every operation ensures the store connection, talks to the store ports,
//! and for mutations asks the host to revalidate the affected page. Any
//! failure comes back as an [`AppError::Action`] whose message starts with
//! the operation's prefix.

pub mod populate;
pub mod thread_actions;
pub mod user_actions;

use std::sync::Arc;

use tl_core::error::AppError;
use tl_core::traits::{Connector, PageRevalidator, ThreadStore, UserStore};

pub use thread_actions::{AddCommentParams, CreateThreadParams, PageRequest};
pub use user_actions::{UpdateUserParams, PROFILE_EDIT_PATH};

/// Long-lived context shared by every operation. Created once at startup;
/// cloning is cheap.
#[derive(Clone)]
pub struct Actions {
    connection: Arc<dyn Connector>,
    threads: Arc<dyn ThreadStore>,
    users: Arc<dyn UserStore>,
    pages: Arc<dyn PageRevalidator>,
}

impl Actions {
    pub fn new(
        connection: Arc<dyn Connector>,
        threads: Arc<dyn ThreadStore>,
        users: Arc<dyn UserStore>,
        pages: Arc<dyn PageRevalidator>,
    ) -> Self {
        Self {
            connection,
            threads,
            users,
            pages,
        }
    }

    /// Wires every store port to a single backend.
    pub fn with_store<S>(store: Arc<S>, pages: Arc<dyn PageRevalidator>) -> Self
    where
        S: Connector + ThreadStore + UserStore + 'static,
    {
        Self::new(store.clone(), store.clone(), store, pages)
    }
}

/// Maps an inner failure to an `AppError::Action` under `prefix`.
fn wrap(prefix: &'static str) -> impl FnOnce(anyhow::Error) -> AppError {
    move |err| AppError::wrap(prefix, &*err)
}
