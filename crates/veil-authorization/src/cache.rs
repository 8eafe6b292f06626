//! Cache contract and the typed caches built on it.
//!
//! The engine talks to a process-external key/value store through the
//! [`KvCache`] trait: untyped string blobs with a per-entry TTL. Two typed
//! wrappers sit on top — [`DocumentCache`] for serialized policy documents
//! (multi-minute TTL) and [`EvaluationCache`] for serialized decisions
//! (short TTL, so a fixed policy is not shadowed by a stale cached denial
//! for long). Both are injected dependencies with explicit lifecycle, so
//! tests run against [`InMemoryKvCache`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use veil_core::TenantId;

use crate::error::PolicyError;
use crate::types::{PolicyDocument, PolicyResult};

/// Generic get / set-with-TTL / delete over string blobs.
///
/// Implementations are expected to serialize concurrent writes to the same
/// key; last-write-wins is acceptable because cached values are pure
/// functions of their key at a given document version.
#[async_trait::async_trait]
pub trait KvCache: Send + Sync {
    /// Fetch a value. Expired entries are absent.
    async fn get(&self, key: &str) -> Result<Option<String>, PolicyError>;

    /// Store a value that expires after `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), PolicyError>;

    /// Remove a value. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), PolicyError>;
}

struct CacheEntry {
    value: String,
    expires_at: Instant,
}

/// In-memory [`KvCache`] for tests and single-process deployments.
pub struct InMemoryKvCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl Default for InMemoryKvCache {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryKvCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait::async_trait]
impl KvCache for InMemoryKvCache {
    async fn get(&self, key: &str) -> Result<Option<String>, PolicyError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|e| e.expires_at > Instant::now())
            .map(|e| e.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), PolicyError> {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            CacheEntry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), PolicyError> {
        let mut entries = self.entries.write().await;
        entries.remove(key);
        Ok(())
    }
}

/// Cache of serialized policy documents, one entry per tenant.
pub struct DocumentCache {
    kv: Arc<dyn KvCache>,
    ttl: Duration,
}

impl DocumentCache {
    pub fn new(kv: Arc<dyn KvCache>, ttl: Duration) -> Self {
        Self { kv, ttl }
    }

    fn key(tenant_id: TenantId) -> String {
        format!("authz:doc:{tenant_id}")
    }

    /// Fetch the cached document for a tenant.
    ///
    /// Cached blobs were validated before being written, so they decode
    /// as-is; a blob that no longer decodes is treated as a miss.
    pub async fn get(&self, tenant_id: TenantId) -> Result<Option<PolicyDocument>, PolicyError> {
        let Some(blob) = self.kv.get(&Self::key(tenant_id)).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&blob) {
            Ok(doc) => Ok(Some(doc)),
            Err(e) => {
                tracing::warn!(
                    target: "policy_engine",
                    tenant_id = %tenant_id,
                    error = %e,
                    "cached policy document no longer decodes; treating as miss"
                );
                Ok(None)
            }
        }
    }

    pub async fn set(&self, tenant_id: TenantId, document: &PolicyDocument) -> Result<(), PolicyError> {
        let blob = serde_json::to_string(document)
            .map_err(|e| PolicyError::CacheUnavailable(e.to_string()))?;
        self.kv.set(&Self::key(tenant_id), &blob, self.ttl).await
    }

    pub async fn delete(&self, tenant_id: TenantId) -> Result<(), PolicyError> {
        self.kv.delete(&Self::key(tenant_id)).await
    }
}

/// Cache of serialized evaluation results keyed by request fingerprint.
pub struct EvaluationCache {
    kv: Arc<dyn KvCache>,
    ttl: Duration,
}

impl EvaluationCache {
    pub fn new(kv: Arc<dyn KvCache>, ttl: Duration) -> Self {
        Self { kv, ttl }
    }

    pub async fn get(&self, key: &str) -> Result<Option<PolicyResult>, PolicyError> {
        let Some(blob) = self.kv.get(key).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&blob) {
            Ok(result) => Ok(Some(result)),
            Err(e) => {
                tracing::warn!(
                    target: "policy_engine",
                    key,
                    error = %e,
                    "cached evaluation result no longer decodes; treating as miss"
                );
                Ok(None)
            }
        }
    }

    pub async fn set(&self, key: &str, result: &PolicyResult) -> Result<(), PolicyError> {
        let blob = serde_json::to_string(result)
            .map_err(|e| PolicyError::CacheUnavailable(e.to_string()))?;
        self.kv.set(key, &blob, self.ttl).await
    }
}

/// Always-failing cache used to exercise the degraded paths.
#[cfg(test)]
pub(crate) struct FailingKvCache;

#[cfg(test)]
#[async_trait::async_trait]
impl KvCache for FailingKvCache {
    async fn get(&self, _key: &str) -> Result<Option<String>, PolicyError> {
        Err(PolicyError::CacheUnavailable("connection refused".into()))
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), PolicyError> {
        Err(PolicyError::CacheUnavailable("connection refused".into()))
    }

    async fn delete(&self, _key: &str) -> Result<(), PolicyError> {
        Err(PolicyError::CacheUnavailable("connection refused".into()))
    }
}
