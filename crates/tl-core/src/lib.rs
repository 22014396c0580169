//! threadline/crates/tl-core/src/lib.rs
//!
//! The domain models and interface definitions for Threadline.

pub mod error;
pub mod models;
pub mod traits;

// Re-exporting for easier access in other crates
pub use error::*;
pub use models::*;
pub use traits::*;
