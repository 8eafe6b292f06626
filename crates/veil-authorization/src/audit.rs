//! Audit sink boundary.
//!
//! The engine is a producer only. Two record shapes exist: administrative
//! actions (policy document updates) and denials. Every denial the engine
//! returns is logged here for compliance review; allows are not.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;
use veil_core::TenantId;

use crate::error::PolicyError;
use crate::types::{PolicyContext, Subject, SubjectMatch};

/// Record of an administrative change (not a denial).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminActionRecord {
    pub id: Uuid,
    pub tenant_id: TenantId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
    pub action: String,
    pub resource: String,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// Record of a denied evaluation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DenialRecord {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub subject: SubjectMatch,
    pub action: String,
    pub resource: String,
    pub context: PolicyContext,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_rule_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl DenialRecord {
    pub(crate) fn new(
        subject: &Subject,
        action: &str,
        resource: &str,
        context: &PolicyContext,
        reason: &str,
        matched_rule_id: Option<&str>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id: context.tenant_id,
            subject: SubjectMatch {
                kind: subject.kind(),
                id: subject.id().to_string(),
            },
            action: action.to_string(),
            resource: resource.to_string(),
            context: context.clone(),
            reason: reason.to_string(),
            matched_rule_id: matched_rule_id.map(str::to_string),
            timestamp: Utc::now(),
        }
    }
}

/// Filter for querying recorded administrative actions.
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    pub action: Option<String>,
    pub actor_id: Option<String>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Append-only sink for audit records. Storage and retention live behind
/// this trait, outside the engine.
#[async_trait::async_trait]
pub trait AuditSink: Send + Sync {
    async fn log_action(&self, record: AdminActionRecord) -> Result<(), PolicyError>;
    async fn log_denial(&self, record: DenialRecord) -> Result<(), PolicyError>;
}

/// In-memory audit sink for tests, with query support.
pub struct InMemoryAuditSink {
    actions: RwLock<Vec<AdminActionRecord>>,
    denials: RwLock<Vec<DenialRecord>>,
}

impl Default for InMemoryAuditSink {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryAuditSink {
    #[must_use]
    pub fn new() -> Self {
        Self {
            actions: RwLock::new(Vec::new()),
            denials: RwLock::new(Vec::new()),
        }
    }

    /// Recorded denials for a tenant, oldest first.
    pub async fn denials_for(&self, tenant_id: TenantId) -> Vec<DenialRecord> {
        let denials = self.denials.read().await;
        denials
            .iter()
            .filter(|d| d.tenant_id == tenant_id)
            .cloned()
            .collect()
    }

    /// Recorded administrative actions for a tenant, newest first.
    pub async fn query_actions(
        &self,
        tenant_id: TenantId,
        query: AuditQuery,
    ) -> Vec<AdminActionRecord> {
        let actions = self.actions.read().await;
        let mut results: Vec<_> = actions
            .iter()
            .filter(|a| a.tenant_id == tenant_id)
            .filter(|a| query.action.as_ref().is_none_or(|v| &a.action == v))
            .filter(|a| query.actor_id.as_ref().is_none_or(|v| a.actor_id.as_ref() == Some(v)))
            .filter(|a| query.from_date.is_none_or(|d| a.timestamp >= d))
            .filter(|a| query.to_date.is_none_or(|d| a.timestamp <= d))
            .cloned()
            .collect();

        results.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(100);
        results.into_iter().skip(offset).take(limit).collect()
    }
}

#[async_trait::async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn log_action(&self, record: AdminActionRecord) -> Result<(), PolicyError> {
        info!(
            target: "policy_engine",
            tenant_id = %record.tenant_id,
            action = %record.action,
            actor_id = ?record.actor_id,
            "administrative action recorded"
        );
        let mut actions = self.actions.write().await;
        actions.push(record);
        Ok(())
    }

    async fn log_denial(&self, record: DenialRecord) -> Result<(), PolicyError> {
        info!(
            target: "policy_engine",
            tenant_id = %record.tenant_id,
            subject_id = %record.subject.id,
            action = %record.action,
            resource = %record.resource,
            reason = %record.reason,
            matched_rule_id = ?record.matched_rule_id,
            "denial recorded"
        );
        let mut denials = self.denials.write().await;
        denials.push(record);
        Ok(())
    }
}
