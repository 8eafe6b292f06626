//! Policy document store boundary.
//!
//! Durable storage of policy documents is a collaborator; this crate
//! defines the trait and ships an in-memory implementation for tests and
//! embedding. The load side hands back the raw JSON blob exactly as
//! stored — the strict schema-validated decode happens in
//! [`crate::documents`], at the boundary, so loosely typed data never
//! reaches the evaluators.

use std::collections::HashMap;

use tokio::sync::RwLock;
use veil_core::TenantId;

use crate::error::PolicyError;
use crate::types::PolicyDocument;

#[async_trait::async_trait]
pub trait PolicyStore: Send + Sync {
    /// Load the raw policy section of a tenant's configuration.
    ///
    /// `Ok(None)` means the tenant is unknown or has no policy configured;
    /// the caller substitutes the default document.
    async fn load_document(&self, tenant_id: TenantId)
        -> Result<Option<serde_json::Value>, PolicyError>;

    /// Replace a tenant's policy section wholesale.
    ///
    /// Fails with [`PolicyError::TenantNotFound`] when the tenant does not
    /// exist; policy changes must not silently no-op.
    async fn save_document(
        &self,
        tenant_id: TenantId,
        document: &PolicyDocument,
    ) -> Result<(), PolicyError>;
}

/// In-memory [`PolicyStore`].
pub struct InMemoryPolicyStore {
    tenants: RwLock<HashMap<TenantId, Option<serde_json::Value>>>,
}

impl Default for InMemoryPolicyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryPolicyStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tenants: RwLock::new(HashMap::new()),
        }
    }

    /// Register a tenant with no policy configured.
    pub async fn create_tenant(&self, tenant_id: TenantId) {
        let mut tenants = self.tenants.write().await;
        tenants.entry(tenant_id).or_insert(None);
    }

    /// Seed a raw configuration blob, bypassing validation. Lets tests
    /// exercise the decode-or-default path with malformed data.
    pub async fn seed_raw_document(&self, tenant_id: TenantId, raw: serde_json::Value) {
        let mut tenants = self.tenants.write().await;
        tenants.insert(tenant_id, Some(raw));
    }
}

#[async_trait::async_trait]
impl PolicyStore for InMemoryPolicyStore {
    async fn load_document(
        &self,
        tenant_id: TenantId,
    ) -> Result<Option<serde_json::Value>, PolicyError> {
        let tenants = self.tenants.read().await;
        Ok(tenants.get(&tenant_id).cloned().flatten())
    }

    async fn save_document(
        &self,
        tenant_id: TenantId,
        document: &PolicyDocument,
    ) -> Result<(), PolicyError> {
        let mut tenants = self.tenants.write().await;
        let slot = tenants
            .get_mut(&tenant_id)
            .ok_or(PolicyError::TenantNotFound(tenant_id))?;
        let raw = serde_json::to_value(document)
            .map_err(|e| PolicyError::StoreUnavailable(e.to_string()))?;
        *slot = Some(raw);
        Ok(())
    }
}

/// Always-failing store used to exercise the fail-restrictive paths.
#[cfg(test)]
pub(crate) struct FailingPolicyStore;

#[cfg(test)]
#[async_trait::async_trait]
impl PolicyStore for FailingPolicyStore {
    async fn load_document(
        &self,
        _tenant_id: TenantId,
    ) -> Result<Option<serde_json::Value>, PolicyError> {
        Err(PolicyError::StoreUnavailable("connection reset".into()))
    }

    async fn save_document(
        &self,
        _tenant_id: TenantId,
        _document: &PolicyDocument,
    ) -> Result<(), PolicyError> {
        Err(PolicyError::StoreUnavailable("connection reset".into()))
    }
}
