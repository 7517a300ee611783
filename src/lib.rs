//! # Tracker Authorization Engine
//!
//! Permission resolution engine for a multi-tenant issue tracker.
//!
//! ## Features
//!
//! - **Scheme-based project permissions** with bounded, cycle-safe
//!   inheritance chains
//! - **Holder matching** across anyone / project-role / group / user grants
//! - **Global (organization-level) permissions** with an ADMINISTER override
//!   that takes precedence over project ACLs
//! - **Issue security levels** for per-issue visibility, including reporter
//!   and assignee holders
//! - **TTL-bound caching** of resolved permission sets with wildcard
//!   invalidation hooks
//! - **Async-first design** using the Tokio runtime; store and cache are
//!   injected trait objects
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tracker_authz::{
//!     keys, InMemoryPermissionStore, MemoryPermissionCache, PermissionEngine,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(InMemoryPermissionStore::new());
//!     let cache = Arc::new(MemoryPermissionCache::new());
//!     let engine = PermissionEngine::new(store, cache);
//!
//!     let allowed = engine
//!         .check_permission("user-1", "proj-1", "org-1", keys::BROWSE_PROJECTS)
//!         .await?;
//!
//!     // No schemes or grants exist yet, so nothing is allowed
//!     assert!(!allowed);
//!
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod engine;
pub mod error;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use cache::{CacheStats, MemoryPermissionCache, PermissionCache};
pub use engine::{EngineConfig, PermissionEngine};
pub use error::{AuthzError, Result};
pub use store::{InMemoryPermissionStore, PermissionStore};
pub use types::{
    keys, GlobalHolder, GlobalPermission, GrantHolder, Issue, IssueSecurityLevelMember, OrgId,
    PermissionGrant, PermissionKey, PermissionScheme, Project, ProjectMember, SchemeId,
    SecurityHolder,
};

#[cfg(feature = "postgres")]
pub use store::PostgresPermissionStore;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
