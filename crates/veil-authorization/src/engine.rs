//! The policy engine orchestrator.
//!
//! Sequences the layers with explicit precedence: RBAC deny > RBAC allow >
//! ABAC deny > ABAC allow > default fallback. Every denial is written to
//! the audit sink. Cache traffic is best-effort — a cache outage makes
//! evaluation slower, never wrong, and never fatal.
//!
//! Evaluation is stateless per call: no lock is held across awaits, so
//! unbounded parallel invocation is safe and a caller-side deadline
//! (`tokio::time::timeout`) can drop the future at any suspension point.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;

use crate::abac::{AbacEvaluator, NO_RULES_MATCHED};
use crate::audit::{AuditSink, DenialRecord};
use crate::cache::{DocumentCache, EvaluationCache, KvCache};
use crate::config::EngineConfig;
use crate::documents::PolicyDocumentService;
use crate::fingerprint;
use crate::rbac::{RbacEvaluator, RbacVerdict};
use crate::store::PolicyStore;
use crate::types::{Effect, PolicyContext, PolicyResult, Subject};

pub struct PolicyEngine {
    documents: PolicyDocumentService,
    evaluation_cache: EvaluationCache,
    audit: Arc<dyn AuditSink>,
}

impl PolicyEngine {
    /// Wire up an engine from its injected collaborators. Constructed once
    /// at process start and shared by handle.
    pub fn new(
        store: Arc<dyn PolicyStore>,
        kv: Arc<dyn KvCache>,
        audit: Arc<dyn AuditSink>,
        config: &EngineConfig,
    ) -> Self {
        let documents = PolicyDocumentService::new(
            store,
            DocumentCache::new(kv.clone(), config.document_cache_ttl),
            audit.clone(),
        );
        Self {
            documents,
            evaluation_cache: EvaluationCache::new(kv, config.evaluation_cache_ttl),
            audit,
        }
    }

    /// The administrative document surface (get/update/invalidate).
    #[must_use]
    pub fn documents(&self) -> &PolicyDocumentService {
        &self.documents
    }

    /// Decide whether `subject` may perform `action` on `resource`.
    ///
    /// Always returns a terminal allow or deny; configuration problems
    /// degrade to the deny-by-default document instead of erroring.
    pub async fn evaluate(
        &self,
        subject: impl Into<Subject>,
        action: &str,
        resource: &str,
        context: &PolicyContext,
    ) -> PolicyResult {
        let start = Instant::now();
        let subject = subject.into();
        let key = fingerprint::evaluation_key(&subject, action, resource, context);

        match self.evaluation_cache.get(&key).await {
            Ok(Some(result)) => {
                tracing::debug!(
                    target: "policy_engine",
                    tenant_id = %context.tenant_id,
                    request_id = %context.request_id,
                    allowed = result.allowed,
                    "evaluation cache hit"
                );
                return result;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(
                    target: "policy_engine",
                    tenant_id = %context.tenant_id,
                    error = %e,
                    "evaluation cache read failed; evaluating uncached"
                );
            }
        }

        let document = self.documents.get_document(context.tenant_id).await;

        let result = match RbacEvaluator::evaluate(&subject, action, resource, context, &document) {
            RbacVerdict::Deny { reason } => PolicyResult::deny(reason),
            RbacVerdict::Allow { reason } => PolicyResult::allow(reason),
            RbacVerdict::NoOpinion => {
                match AbacEvaluator::evaluate(
                    &subject,
                    action,
                    resource,
                    context,
                    Utc::now(),
                    &document.rules,
                ) {
                    Some((Effect::Deny, rule_id)) => {
                        PolicyResult::deny(format!("denied by policy rule '{rule_id}'"))
                            .with_rule(rule_id)
                    }
                    Some((Effect::Allow, rule_id)) => {
                        PolicyResult::allow(format!("allowed by policy rule '{rule_id}'"))
                            .with_rule(rule_id)
                    }
                    None => {
                        tracing::debug!(
                            target: "policy_engine",
                            tenant_id = %context.tenant_id,
                            request_id = %context.request_id,
                            "{NO_RULES_MATCHED}; applying document fallback"
                        );
                        if document.deny_by_default {
                            PolicyResult::deny("denied by default")
                        } else {
                            PolicyResult::allow("allowed by default")
                        }
                    }
                }
            }
        };

        if let Err(e) = self.evaluation_cache.set(&key, &result).await {
            tracing::warn!(
                target: "policy_engine",
                tenant_id = %context.tenant_id,
                error = %e,
                "evaluation cache write failed"
            );
        }

        if result.denied {
            self.audit_denial(&subject, action, resource, context, &result).await;
        }

        tracing::debug!(
            target: "policy_engine",
            tenant_id = %context.tenant_id,
            request_id = %context.request_id,
            allowed = result.allowed,
            matched_rule_id = ?result.matched_rule_id,
            latency_ms = start.elapsed().as_secs_f64() * 1000.0,
            "authorization decision"
        );

        result
    }

    async fn audit_denial(
        &self,
        subject: &Subject,
        action: &str,
        resource: &str,
        context: &PolicyContext,
        result: &PolicyResult,
    ) {
        let record = DenialRecord::new(
            subject,
            action,
            resource,
            context,
            &result.reason,
            result.matched_rule_id.as_deref(),
        );
        if let Err(e) = self.audit.log_denial(record).await {
            // The decision still stands; a sink outage must not turn a
            // deny into an error for the caller.
            tracing::error!(
                target: "policy_engine",
                tenant_id = %context.tenant_id,
                request_id = %context.request_id,
                error = %e,
                "failed to record denial audit event"
            );
        }
    }
}

/// Convenience used by tests and single-process embedders: an engine with
/// in-memory collaborators.
pub fn in_memory_engine(
    store: Arc<crate::store::InMemoryPolicyStore>,
    audit: Arc<crate::audit::InMemoryAuditSink>,
) -> PolicyEngine {
    PolicyEngine::new(
        store,
        Arc::new(crate::cache::InMemoryKvCache::new()),
        audit,
        &EngineConfig::default(),
    )
}
