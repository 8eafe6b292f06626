//! veil core library.
//!
//! Shared types for the veil platform.
//!
//! # Modules
//!
//! - [`ids`] - Strongly typed identifiers (`TenantId`, `WorkspaceId`)

pub mod ids;

pub use ids::{ParseIdError, TenantId, WorkspaceId};
