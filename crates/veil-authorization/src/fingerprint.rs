//! Evaluation-cache key derivation.
//!
//! The fingerprint is a deterministic function of (tenant, subject type,
//! subject id, action, resource, workspace-or-global scope). Identical
//! requests against the same document version hash to the same key, so a
//! cached decision can be returned verbatim.

use sha2::{Digest, Sha256};

use crate::types::{PolicyContext, Subject, SubjectKind};

/// Key prefix shared by all evaluation-cache entries.
const EVAL_KEY_PREFIX: &str = "authz:eval";

/// Derive the evaluation-cache key for one request.
///
/// Fields are hashed with a length/field separator that cannot occur inside
/// a field boundary, so `("ab", "c")` and `("a", "bc")` never collide. The
/// tenant id stays visible in the key for operability; the rest is a
/// SHA-256 hex digest.
#[must_use]
pub fn evaluation_key(subject: &Subject, action: &str, resource: &str, context: &PolicyContext) -> String {
    let subject_type = match subject.kind() {
        SubjectKind::Role => "role",
        SubjectKind::User => "user",
    };
    let scope = context
        .workspace_id
        .map(|w| w.to_string())
        .unwrap_or_else(|| "global".to_string());

    let mut hasher = Sha256::new();
    for field in [
        context.tenant_id.to_string().as_str(),
        subject_type,
        subject.id(),
        action,
        resource,
        scope.as_str(),
    ] {
        hasher.update((field.len() as u64).to_be_bytes());
        hasher.update(field.as_bytes());
    }
    let digest = hex::encode(hasher.finalize());

    format!("{EVAL_KEY_PREFIX}:{}:{digest}", context.tenant_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use veil_core::{TenantId, WorkspaceId};

    fn context(tenant: TenantId) -> PolicyContext {
        PolicyContext::new(tenant, "req-1")
    }

    #[test]
    fn test_identical_inputs_produce_identical_keys() {
        let tenant = TenantId::new();
        let a = evaluation_key(&Subject::role("VIEWER"), "read", "Article", &context(tenant));
        let b = evaluation_key(&Subject::role("VIEWER"), "read", "Article", &context(tenant));
        assert_eq!(a, b);
    }

    #[test]
    fn test_key_is_tenant_scoped() {
        let a = evaluation_key(
            &Subject::role("VIEWER"),
            "read",
            "Article",
            &context(TenantId::new()),
        );
        let b = evaluation_key(
            &Subject::role("VIEWER"),
            "read",
            "Article",
            &context(TenantId::new()),
        );
        assert_ne!(a, b);
    }

    #[test]
    fn test_subject_type_distinguishes_keys() {
        let tenant = TenantId::new();
        let role = evaluation_key(&Subject::role("42"), "read", "Article", &context(tenant));
        let user = evaluation_key(&Subject::user("42"), "read", "Article", &context(tenant));
        assert_ne!(role, user);
    }

    #[test]
    fn test_workspace_scope_distinguishes_keys() {
        let tenant = TenantId::new();
        let global = evaluation_key(&Subject::user("42"), "read", "Article", &context(tenant));

        let mut scoped_ctx = context(tenant);
        scoped_ctx.workspace_id = Some(WorkspaceId::new());
        let scoped = evaluation_key(&Subject::user("42"), "read", "Article", &scoped_ctx);
        assert_ne!(global, scoped);
    }

    #[test]
    fn test_field_boundaries_do_not_collide() {
        let tenant = TenantId::new();
        let a = evaluation_key(&Subject::user("ab"), "c", "Article", &context(tenant));
        let b = evaluation_key(&Subject::user("a"), "bc", "Article", &context(tenant));
        assert_ne!(a, b);
    }

    #[test]
    fn test_request_metadata_does_not_affect_key() {
        let tenant = TenantId::new();
        let a = evaluation_key(&Subject::user("42"), "read", "Article", &context(tenant));

        let mut noisy = context(tenant);
        noisy.request_id = "req-other".to_string();
        noisy.user_agent = Some("curl/8".to_string());
        let b = evaluation_key(&Subject::user("42"), "read", "Article", &noisy);
        assert_eq!(a, b);
    }
}
