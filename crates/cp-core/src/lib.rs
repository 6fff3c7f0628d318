//! civic-pulse/crates/cp-core/src/lib.rs
//!
//! The central domain logic and interface definitions for the
//! trust-weighted voting integrity & moderation engine.

pub mod config;
pub mod error;
pub mod models;
pub mod traits;

// Re-exporting for easier access in other crates
pub use config::*;
pub use error::*;
pub use models::*;
pub use traits::*;
