//! # AppError
//!
//! Centralized error handling for Threadline.
//! Every public operation reports failure as an `AppError::Action` whose
//! message starts with an operation-specific prefix.

use thiserror::Error;

/// Used when a failure renders to an empty message.
pub const UNKNOWN_FAILURE: &str = "unknown error";

/// The primary error type for all Threadline operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Record not found (e.g., Thread)
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A store call was made before a connection could be established.
    #[error("not connected to the database")]
    NotConnected,

    /// A failure wrapped with the prefix of the operation that hit it.
    #[error("{prefix}: {message}")]
    Action {
        prefix: &'static str,
        message: String,
        /// Set when the wrapped failure was itself `NotFound`.
        not_found: bool,
    },
}

impl AppError {
    /// Wraps any failure under an operation prefix.
    pub fn wrap(prefix: &'static str, err: &(dyn std::error::Error + 'static)) -> Self {
        let not_found = err
            .downcast_ref::<AppError>()
            .is_some_and(AppError::is_not_found);
        AppError::Action {
            prefix,
            message: failure_message(err),
            not_found,
        }
    }

    /// True when the failure was a missing record, before or after wrapping.
    pub fn is_not_found(&self) -> bool {
        match self {
            AppError::NotFound(_) => true,
            AppError::Action { not_found, .. } => *not_found,
            AppError::NotConnected => false,
        }
    }
}

/// Best-effort human-readable message for any failure value.
pub fn failure_message(err: &(dyn std::error::Error + 'static)) -> String {
    let message = err.to_string();
    if message.trim().is_empty() {
        UNKNOWN_FAILURE.to_string()
    } else {
        message
    }
}

/// A specialized Result type for Threadline operations.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("")]
    struct Silent;

    #[test]
    fn wrap_prefixes_the_original_message() {
        let err = AppError::wrap("Error adding comment", &AppError::NotFound("Thread"));
        assert_eq!(err.to_string(), "Error adding comment: Thread not found");
        assert!(err.is_not_found());
    }

    #[test]
    fn only_wrapped_not_found_is_classified_as_such() {
        let err = anyhow::anyhow!("index row not found");
        let wrapped = AppError::wrap("Error fetching thread", &*err);
        assert_eq!(wrapped.to_string(), "Error fetching thread: index row not found");
        assert!(!wrapped.is_not_found());

        let err: anyhow::Error = AppError::NotFound("Thread").into();
        assert!(AppError::wrap("Error adding comment", &*err).is_not_found());
        assert!(!AppError::wrap("Error adding comment", &AppError::NotConnected).is_not_found());
    }

    #[test]
    fn empty_messages_fall_back() {
        assert_eq!(failure_message(&Silent), UNKNOWN_FAILURE);
        let err = AppError::wrap("Failed to fetch user", &Silent);
        assert_eq!(err.to_string(), "Failed to fetch user: unknown error");
    }

    #[test]
    fn anyhow_errors_keep_their_top_message() {
        let err = anyhow::anyhow!("disk full").context("insert failed");
        assert_eq!(failure_message(&*err), "insert failed");
    }
}
