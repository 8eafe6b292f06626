//! Attribute-based evaluation layer.
//!
//! Scans the document's rule list for matches on action, resource type,
//! subject, and conditions. The tie-break among matching rules is an
//! explicit two-pass partition: every matching deny is considered before
//! any matching allow, and document order is preserved within each pass.
//! The winning rule's effect and id are returned; `None` means no rule
//! matched and the layer has no opinion.

use chrono::{DateTime, Utc};

use crate::types::{Effect, PolicyContext, PolicyRule, RuleConditions, Subject};

/// Reason attached to the internal no-opinion verdict of this layer.
pub const NO_RULES_MATCHED: &str = "no ABAC rules matched";

pub struct AbacEvaluator;

impl AbacEvaluator {
    /// Evaluate the rule list. `now` is passed in so time-window matching
    /// stays a pure function.
    #[must_use]
    pub fn evaluate(
        subject: &Subject,
        action: &str,
        resource: &str,
        context: &PolicyContext,
        now: DateTime<Utc>,
        rules: &[PolicyRule],
    ) -> Option<(Effect, String)> {
        let candidates: Vec<&PolicyRule> = rules
            .iter()
            .filter(|rule| Self::rule_matches(rule, subject, action, resource, context, now))
            .collect();

        // Denies first, allows second. The partition makes the
        // deny-before-allow rule a visible property instead of a sort
        // comparator side effect.
        for rule in candidates.iter().filter(|r| r.effect == Effect::Deny) {
            return Some((Effect::Deny, rule.id.clone()));
        }
        for rule in candidates.iter().filter(|r| r.effect == Effect::Allow) {
            return Some((Effect::Allow, rule.id.clone()));
        }

        None
    }

    fn rule_matches(
        rule: &PolicyRule,
        subject: &Subject,
        action: &str,
        resource: &str,
        context: &PolicyContext,
        now: DateTime<Utc>,
    ) -> bool {
        if rule.action != action || rule.resource != resource {
            return false;
        }

        if rule.subject.kind != subject.kind() || rule.subject.id != subject.id() {
            return false;
        }

        match &rule.conditions {
            None => true,
            Some(conditions) => Self::conditions_hold(conditions, context, now),
        }
    }

    /// All present conditions must hold; any failed condition excludes the
    /// rule from the candidate set.
    fn conditions_hold(conditions: &RuleConditions, context: &PolicyContext, now: DateTime<Utc>) -> bool {
        if let Some(tenant_id) = conditions.tenant_id {
            if tenant_id != context.tenant_id {
                return false;
            }
        }

        if let Some(workspace_id) = conditions.workspace_id {
            if context.workspace_id != Some(workspace_id) {
                return false;
            }
        }

        if let Some(user_ids) = &conditions.user_ids {
            if !user_ids.is_empty() {
                let Some(user_id) = &context.user_id else {
                    return false;
                };
                if !user_ids.contains(user_id) {
                    return false;
                }
            }
        }

        if let Some(window) = &conditions.time {
            if let Some(start) = window.start {
                if now < start {
                    return false;
                }
            }
            if let Some(end) = window.end {
                if now > end {
                    return false;
                }
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use veil_core::{TenantId, WorkspaceId};

    fn rule(id: &str, effect: &str) -> PolicyRule {
        serde_json::from_value(json!({
            "id": id,
            "effect": effect,
            "subject": {"type": "user", "id": "42"},
            "action": "delete",
            "resource": "Article",
        }))
        .unwrap()
    }

    fn rule_with_conditions(id: &str, effect: &str, conditions: serde_json::Value) -> PolicyRule {
        serde_json::from_value(json!({
            "id": id,
            "effect": effect,
            "subject": {"type": "user", "id": "42"},
            "action": "delete",
            "resource": "Article",
            "conditions": conditions,
        }))
        .unwrap()
    }

    fn context() -> PolicyContext {
        PolicyContext::new(TenantId::new(), "req-1")
    }

    fn evaluate(rules: &[PolicyRule], ctx: &PolicyContext) -> Option<(Effect, String)> {
        AbacEvaluator::evaluate(&Subject::user("42"), "delete", "Article", ctx, Utc::now(), rules)
    }

    #[test]
    fn test_empty_rule_list_has_no_opinion() {
        assert_eq!(evaluate(&[], &context()), None);
    }

    #[test]
    fn test_matching_rule_returns_effect_and_id() {
        let rules = vec![rule("rule-1", "deny")];
        assert_eq!(evaluate(&rules, &context()), Some((Effect::Deny, "rule-1".to_string())));
    }

    #[test]
    fn test_action_mismatch_excludes_rule() {
        let rules = vec![rule("rule-1", "allow")];
        let result = AbacEvaluator::evaluate(
            &Subject::user("42"),
            "read",
            "Article",
            &context(),
            Utc::now(),
            &rules,
        );
        assert_eq!(result, None);
    }

    #[test]
    fn test_resource_mismatch_excludes_rule() {
        let rules = vec![rule("rule-1", "allow")];
        let result = AbacEvaluator::evaluate(
            &Subject::user("42"),
            "delete",
            "Invoice",
            &context(),
            Utc::now(),
            &rules,
        );
        assert_eq!(result, None);
    }

    #[test]
    fn test_subject_kind_mismatch_excludes_rule() {
        let rules = vec![rule("rule-1", "allow")];
        // Same id, but a role subject rather than a user subject.
        let result = AbacEvaluator::evaluate(
            &Subject::role("42"),
            "delete",
            "Article",
            &context(),
            Utc::now(),
            &rules,
        );
        assert_eq!(result, None);
    }

    #[test]
    fn test_deny_wins_regardless_of_document_order() {
        let allow_first = vec![rule("rule-allow", "allow"), rule("rule-deny", "deny")];
        assert_eq!(
            evaluate(&allow_first, &context()),
            Some((Effect::Deny, "rule-deny".to_string()))
        );

        let deny_first = vec![rule("rule-deny", "deny"), rule("rule-allow", "allow")];
        assert_eq!(
            evaluate(&deny_first, &context()),
            Some((Effect::Deny, "rule-deny".to_string()))
        );
    }

    #[test]
    fn test_document_order_preserved_within_same_effect() {
        let rules = vec![rule("rule-a", "allow"), rule("rule-b", "allow")];
        assert_eq!(
            evaluate(&rules, &context()),
            Some((Effect::Allow, "rule-a".to_string()))
        );
    }

    #[test]
    fn test_tenant_condition_must_match() {
        let tenant = TenantId::new();
        let rules = vec![rule_with_conditions(
            "rule-1",
            "allow",
            json!({"tenantId": tenant}),
        )];

        let mut ctx = PolicyContext::new(tenant, "req-1");
        assert!(evaluate(&rules, &ctx).is_some());

        ctx.tenant_id = TenantId::new();
        assert!(evaluate(&rules, &ctx).is_none());
    }

    #[test]
    fn test_workspace_condition_must_match() {
        let workspace = WorkspaceId::new();
        let rules = vec![rule_with_conditions(
            "rule-1",
            "allow",
            json!({"workspaceId": workspace}),
        )];

        let mut ctx = context();
        assert!(evaluate(&rules, &ctx).is_none(), "no workspace in context");

        ctx.workspace_id = Some(WorkspaceId::new());
        assert!(evaluate(&rules, &ctx).is_none(), "different workspace");

        ctx.workspace_id = Some(workspace);
        assert!(evaluate(&rules, &ctx).is_some());
    }

    #[test]
    fn test_user_ids_condition() {
        let rules = vec![rule_with_conditions(
            "rule-1",
            "allow",
            json!({"userIds": ["42", "43"]}),
        )];

        let mut ctx = context();
        assert!(evaluate(&rules, &ctx).is_none(), "no user in context");

        ctx.user_id = Some("44".to_string());
        assert!(evaluate(&rules, &ctx).is_none(), "user not in set");

        ctx.user_id = Some("42".to_string());
        assert!(evaluate(&rules, &ctx).is_some());
    }

    #[test]
    fn test_empty_user_ids_condition_holds() {
        let rules = vec![rule_with_conditions("rule-1", "allow", json!({"userIds": []}))];
        assert!(evaluate(&rules, &context()).is_some());
    }

    #[test]
    fn test_time_window_condition() {
        let now = Utc::now();
        let inside = vec![rule_with_conditions(
            "rule-1",
            "allow",
            json!({"time": {
                "start": now - chrono::Duration::hours(1),
                "end": now + chrono::Duration::hours(1),
            }}),
        )];
        assert!(evaluate(&inside, &context()).is_some());

        let expired = vec![rule_with_conditions(
            "rule-1",
            "allow",
            json!({"time": {"end": now - chrono::Duration::hours(1)}}),
        )];
        assert!(evaluate(&expired, &context()).is_none());

        let not_yet = vec![rule_with_conditions(
            "rule-1",
            "allow",
            json!({"time": {"start": now + chrono::Duration::hours(1)}}),
        )];
        assert!(evaluate(&not_yet, &context()).is_none());
    }

    #[test]
    fn test_unbounded_time_window_holds() {
        let rules = vec![rule_with_conditions("rule-1", "allow", json!({"time": {}}))];
        assert!(evaluate(&rules, &context()).is_some());
    }

    #[test]
    fn test_all_conditions_are_and_combined() {
        let tenant = TenantId::new();
        let rules = vec![rule_with_conditions(
            "rule-1",
            "allow",
            json!({"tenantId": tenant, "userIds": ["42"]}),
        )];

        // Tenant matches but user does not.
        let mut ctx = PolicyContext::new(tenant, "req-1");
        ctx.user_id = Some("99".to_string());
        assert!(evaluate(&rules, &ctx).is_none());

        ctx.user_id = Some("42".to_string());
        assert!(evaluate(&rules, &ctx).is_some());
    }
}
