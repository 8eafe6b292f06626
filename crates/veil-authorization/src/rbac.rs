//! Role-based evaluation layer.
//!
//! Pure function of (subject, action, resource, context, document). Only
//! role subjects are evaluated here; everything else is a no-opinion and
//! falls through to the ABAC layer. An explicit role deny short-circuits
//! the whole decision — ABAC is never consulted after it.

use crate::types::{Effect, PermissionScope, PolicyContext, PolicyDocument, Subject};

/// Intermediate verdict of one evaluation layer. Internal to the engine;
/// the public result is always a terminal allow or deny.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RbacVerdict {
    Allow { reason: String },
    Deny { reason: String },
    NoOpinion,
}

pub struct RbacEvaluator;

impl RbacEvaluator {
    /// Evaluate the role permission layer.
    ///
    /// No-opinion when: the subject is not a role, the role is unknown,
    /// the role has no entry for the resource type, the action is not in
    /// the permission's action set, or the permission carries an
    /// unrecognized scope.
    #[must_use]
    pub fn evaluate(
        subject: &Subject,
        action: &str,
        resource: &str,
        context: &PolicyContext,
        document: &PolicyDocument,
    ) -> RbacVerdict {
        let Subject::Role(role) = subject else {
            return RbacVerdict::NoOpinion;
        };

        let Some(permission_set) = document.roles.get(role) else {
            return RbacVerdict::NoOpinion;
        };

        let Some(permission) = permission_set.permission_for(resource) else {
            return RbacVerdict::NoOpinion;
        };

        if !permission.actions.contains(action) {
            return RbacVerdict::NoOpinion;
        }

        if permission.effect == Effect::Deny {
            return RbacVerdict::Deny {
                reason: format!("denied by role '{role}' permission on '{resource}'"),
            };
        }

        match permission.scope {
            // Observed behavior preserved: `own` is a workspace-presence
            // check, not a resource-ownership check.
            PermissionScope::Own | PermissionScope::Workspace => {
                if context.workspace_id.is_some() {
                    RbacVerdict::Allow {
                        reason: format!("allowed by role '{role}' permission on '{resource}'"),
                    }
                } else {
                    RbacVerdict::Deny {
                        reason: format!(
                            "scope mismatch: '{}' scope requires a workspace context",
                            permission.scope
                        ),
                    }
                }
            }
            PermissionScope::All => RbacVerdict::Allow {
                reason: format!("allowed by role '{role}' permission on '{resource}'"),
            },
            PermissionScope::Unknown => RbacVerdict::NoOpinion,
        }
    }
}
