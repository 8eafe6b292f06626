//! Authorization policy engine for the veil platform.
//!
//! Decides, for every privileged action, whether an actor may perform it
//! on a resource. Role-based rules (RBAC) are layered over attribute-based
//! rules (ABAC) with explicit precedence — RBAC deny, RBAC allow, ABAC
//! deny, ABAC allow, then the document's default fallback — backed by a
//! two-tier cache (policy documents, evaluation results) and mandatory
//! audit logging of every denial.

pub mod abac;
pub mod audit;
pub mod cache;
pub mod config;
pub mod documents;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod rbac;
pub mod store;
pub mod types;

pub use audit::{AdminActionRecord, AuditQuery, AuditSink, DenialRecord, InMemoryAuditSink};
pub use cache::{DocumentCache, EvaluationCache, InMemoryKvCache, KvCache};
pub use config::{ConfigError, EngineConfig};
pub use documents::PolicyDocumentService;
pub use engine::{in_memory_engine, PolicyEngine};
pub use error::{PolicyError, Result};
pub use store::{InMemoryPolicyStore, PolicyStore};
pub use types::*;
