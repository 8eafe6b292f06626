//! Policy document access.
//!
//! Cache-first read-through over the document store, with the strict
//! schema-validated decode at the store boundary. Reads never fail the
//! caller: anything untrusted (missing tenant, unsupported version,
//! malformed blob, store outage) degrades to the hard-coded
//! deny-by-default document. Writes are the opposite — an update that
//! cannot be stored, invalidated, or audited surfaces a hard error to the
//! administrative caller.

use std::sync::Arc;

use serde_json::json;
use veil_core::TenantId;

use crate::audit::{AdminActionRecord, AuditSink};
use crate::cache::DocumentCache;
use crate::error::{PolicyError, Result};
use crate::store::PolicyStore;
use crate::types::{PolicyDocument, SUPPORTED_DOCUMENT_VERSION};

pub struct PolicyDocumentService {
    store: Arc<dyn PolicyStore>,
    cache: DocumentCache,
    audit: Arc<dyn AuditSink>,
}

impl PolicyDocumentService {
    pub fn new(store: Arc<dyn PolicyStore>, cache: DocumentCache, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, cache, audit }
    }

    /// Fetch the tenant's policy document. Infallible by design: an
    /// authorization gate must always have a document to evaluate against.
    pub async fn get_document(&self, tenant_id: TenantId) -> PolicyDocument {
        match self.cache.get(tenant_id).await {
            Ok(Some(document)) => return document,
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(
                    target: "policy_engine",
                    tenant_id = %tenant_id,
                    error = %e,
                    "document cache read failed; loading from store"
                );
            }
        }

        let raw = match self.store.load_document(tenant_id).await {
            Ok(raw) => raw,
            Err(e) => {
                // Fail-restrictive: an unreachable store yields the
                // deny-by-default document, uncached so recovery is
                // observed on the next call.
                tracing::warn!(
                    target: "policy_engine",
                    tenant_id = %tenant_id,
                    error = %e,
                    "policy store unavailable; using default document"
                );
                return PolicyDocument::default_deny();
            }
        };

        let document = match raw {
            None => PolicyDocument::default_deny(),
            Some(raw) => Self::decode_document(tenant_id, raw),
        };

        if let Err(e) = self.cache.set(tenant_id, &document).await {
            tracing::warn!(
                target: "policy_engine",
                tenant_id = %tenant_id,
                error = %e,
                "document cache write failed"
            );
        }

        document
    }

    /// Strict decode of the stored configuration blob. Loosely typed data
    /// stops here; the evaluators only ever see a validated document.
    fn decode_document(tenant_id: TenantId, raw: serde_json::Value) -> PolicyDocument {
        let document: PolicyDocument = match serde_json::from_value(raw) {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!(
                    target: "policy_engine",
                    tenant_id = %tenant_id,
                    error = %e,
                    "stored policy document failed validation; using default document"
                );
                return PolicyDocument::default_deny();
            }
        };

        if document.version != SUPPORTED_DOCUMENT_VERSION {
            tracing::warn!(
                target: "policy_engine",
                tenant_id = %tenant_id,
                version = document.version,
                "unsupported policy document version; using default document"
            );
            return PolicyDocument::default_deny();
        }

        document
    }

    /// Drop the cached document so the next read observes the store.
    pub async fn invalidate_document(&self, tenant_id: TenantId) -> Result<()> {
        self.cache.delete(tenant_id).await
    }

    /// Replace the tenant's policy document wholesale.
    ///
    /// Invalidates the document cache before reporting success, so the
    /// next cache-miss read observes the new document, and writes an
    /// administrative audit record.
    pub async fn update_document(
        &self,
        tenant_id: TenantId,
        document: PolicyDocument,
        actor_id: &str,
    ) -> Result<()> {
        if document.version != SUPPORTED_DOCUMENT_VERSION {
            return Err(PolicyError::UnsupportedVersion(document.version));
        }

        self.store.save_document(tenant_id, &document).await?;
        self.invalidate_document(tenant_id).await?;

        self.audit
            .log_action(AdminActionRecord {
                id: uuid::Uuid::new_v4(),
                tenant_id,
                actor_id: Some(actor_id.to_string()),
                action: "policy_document.updated".to_string(),
                resource: "policy_document".to_string(),
                payload: json!({
                    "version": document.version,
                    "roleCount": document.roles.len(),
                    "ruleCount": document.rules.len(),
                    "denyByDefault": document.deny_by_default,
                }),
                timestamp: chrono::Utc::now(),
            })
            .await?;

        Ok(())
    }
}
