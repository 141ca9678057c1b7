//! parley/crates/pl-core/src/lib.rs
//!
//! The central domain logic and interface definitions for parley:
//! tenants, their allowed domains, page comments, and the ports every
//! storage or delivery plugin implements.

pub mod error;
pub mod identity;
pub mod memory;
pub mod models;
pub mod origin;
pub mod service;
pub mod traits;

// Re-exporting for easier access in other crates
pub use error::*;
pub use models::*;
pub use service::CommentService;
pub use traits::*;
