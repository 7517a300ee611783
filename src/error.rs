//! Error types for the permission resolution engine

use thiserror::Error;

/// Permission engine errors
///
/// Absent domain data (missing schemes, roles, issues) is never an error:
/// those cases degrade to an empty permission set or a `false` visibility
/// answer. Errors are reserved for invalid caller input and backend failures,
/// which propagate fail-fast rather than being masked as a deny or an allow.
#[derive(Debug, Error)]
pub enum AuthzError {
    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Permission store failure
    #[error("Store error: {0}")]
    StoreError(String),

    /// Cache backend failure
    #[error("Cache error: {0}")]
    CacheError(String),

    /// Database error
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for permission operations
pub type Result<T> = std::result::Result<T, AuthzError>;
