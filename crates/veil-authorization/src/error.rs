//! Error types for the authorization engine.

use thiserror::Error;
use veil_core::TenantId;

/// Errors that can occur in the policy engine.
///
/// Evaluation itself never surfaces these to callers: degraded paths fall
/// back to the default deny-by-default document or bypass the cache. They
/// are returned from the administrative surface (`update_document`) and
/// from the collaborator traits.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// A document update targeted a tenant that does not exist.
    #[error("tenant not found: {0}")]
    TenantNotFound(TenantId),

    /// The stored document carries a version this engine cannot interpret.
    #[error("unsupported policy document version: {0}")]
    UnsupportedVersion(u32),

    /// A cache read/write/delete failed.
    #[error("cache unavailable: {0}")]
    CacheUnavailable(String),

    /// The policy document store failed.
    #[error("policy store unavailable: {0}")]
    StoreUnavailable(String),

    /// The audit sink rejected a record.
    #[error("audit sink unavailable: {0}")]
    AuditUnavailable(String),
}

/// Convenience Result type for the policy engine.
pub type Result<T> = std::result::Result<T, PolicyError>;
