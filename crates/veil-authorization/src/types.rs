//! Data model for the authorization policy engine.
//!
//! A tenant owns exactly one [`PolicyDocument`]: a role→permission map
//! consumed by the RBAC evaluator and an ordered rule list consumed by the
//! ABAC evaluator. Documents are replaced wholesale on update, never
//! mutated in place. Wire names are camelCase so documents stored by older
//! services decode unchanged.

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use veil_core::{TenantId, WorkspaceId};

/// The only document version this engine can interpret.
pub const SUPPORTED_DOCUMENT_VERSION: u32 = 1;

fn default_deny_flag() -> bool {
    true
}

/// A tenant's complete authorization configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDocument {
    pub version: u32,
    /// Role name → permission set, consumed by the RBAC layer.
    #[serde(default)]
    pub roles: HashMap<String, RolePermissionSet>,
    /// Ordered rule list, consumed by the ABAC layer.
    #[serde(default)]
    pub rules: Vec<PolicyRule>,
    /// Controls the fallback verdict when neither layer has an opinion.
    #[serde(default = "default_deny_flag")]
    pub deny_by_default: bool,
}

impl PolicyDocument {
    /// The hard-coded document used when a tenant has no configuration or
    /// the stored one cannot be trusted: deny everything.
    #[must_use]
    pub fn default_deny() -> Self {
        Self {
            version: SUPPORTED_DOCUMENT_VERSION,
            roles: HashMap::new(),
            rules: Vec::new(),
            deny_by_default: true,
        }
    }
}

impl Default for PolicyDocument {
    fn default() -> Self {
        Self::default_deny()
    }
}

/// Permissions declared for a single role, keyed by resource type.
///
/// Stored on the wire as a permission list; duplicate resource types
/// collapse last-write-wins during construction, which gives the
/// at-most-one-entry-per-resource invariant for free.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Permission>", into = "Vec<Permission>")]
pub struct RolePermissionSet {
    permissions: HashMap<String, Permission>,
}

impl RolePermissionSet {
    /// Look up the permission entry for a resource type.
    #[must_use]
    pub fn permission_for(&self, resource: &str) -> Option<&Permission> {
        self.permissions.get(resource)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }
}

impl From<Vec<Permission>> for RolePermissionSet {
    fn from(perms: Vec<Permission>) -> Self {
        let mut permissions = HashMap::new();
        for perm in perms {
            permissions.insert(perm.resource.clone(), perm);
        }
        Self { permissions }
    }
}

impl From<RolePermissionSet> for Vec<Permission> {
    fn from(set: RolePermissionSet) -> Self {
        set.permissions.into_values().collect()
    }
}

impl FromIterator<Permission> for RolePermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        iter.into_iter().collect::<Vec<_>>().into()
    }
}

/// A single role permission: which actions on a resource type, with what
/// effect, over what scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub resource: String,
    pub actions: HashSet<String>,
    pub effect: Effect,
    pub scope: PermissionScope,
}

/// Allow or deny. Strict on the wire: any other value fails the decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    Allow,
    Deny,
}

/// Breadth over which a role permission applies.
///
/// Decoding tolerates unrecognized values (`Unknown`) so one bad scope in a
/// stored document degrades to a no-opinion for that entry instead of
/// invalidating the whole document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionScope {
    Own,
    Workspace,
    All,
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for PermissionScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PermissionScope::Own => write!(f, "own"),
            PermissionScope::Workspace => write!(f, "workspace"),
            PermissionScope::All => write!(f, "all"),
            PermissionScope::Unknown => write!(f, "unknown"),
        }
    }
}

/// One ABAC rule. The `id` is stable within a document and reported on
/// every matched decision for audit traceability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRule {
    pub id: String,
    pub effect: Effect,
    pub subject: SubjectMatch,
    pub action: String,
    pub resource: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<RuleConditions>,
    /// Carried for document fidelity; evaluation order is the
    /// deny-before-allow partition over document order.
    #[serde(default)]
    pub priority: i32,
}

/// Which subjects a rule applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectMatch {
    #[serde(rename = "type")]
    pub kind: SubjectKind,
    pub id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectKind {
    Role,
    User,
}

/// Optional conditions attached to a rule; all present conditions must
/// hold for the rule to match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleConditions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<TenantId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<WorkspaceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<TimeWindow>,
}

/// Inclusive time window; a missing bound is unbounded on that side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeWindow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
}

/// The actor being evaluated: a role (RBAC + ABAC) or a concrete user
/// (ABAC only).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Subject {
    Role(String),
    User(String),
}

impl Subject {
    pub fn role(id: impl Into<String>) -> Self {
        Subject::Role(id.into())
    }

    pub fn user(id: impl Into<String>) -> Self {
        Subject::User(id.into())
    }

    #[must_use]
    pub fn kind(&self) -> SubjectKind {
        match self {
            Subject::Role(_) => SubjectKind::Role,
            Subject::User(_) => SubjectKind::User,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Subject::Role(id) | Subject::User(id) => id,
        }
    }
}

/// Bare strings are role shorthand: `"VIEWER".into()` is the role subject.
impl From<&str> for Subject {
    fn from(role: &str) -> Self {
        Subject::Role(role.to_string())
    }
}

impl From<String> for Subject {
    fn from(role: String) -> Self {
        Subject::Role(role)
    }
}

/// Per-request evaluation context assembled by the enforcement layer.
/// Never persisted; serialized only into audit payloads.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyContext {
    pub tenant_id: TenantId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<WorkspaceId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<IpAddr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geo: Option<String>,
}

impl PolicyContext {
    /// Minimal context: tenant plus a request correlation id.
    pub fn new(tenant_id: TenantId, request_id: impl Into<String>) -> Self {
        Self {
            tenant_id,
            workspace_id: None,
            user_id: None,
            request_id: request_id.into(),
            ip: None,
            user_agent: None,
            device_id: None,
            geo: None,
        }
    }
}

/// Terminal decision returned from `evaluate`. Exactly one of
/// `allowed`/`denied` is true; the internal no-opinion state never leaves
/// the engine. Constructed only through the smart constructors below.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyResult {
    pub allowed: bool,
    pub denied: bool,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_rule_id: Option<String>,
}

impl PolicyResult {
    #[must_use]
    pub fn allow(reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            denied: false,
            reason: reason.into(),
            matched_rule_id: None,
        }
    }

    #[must_use]
    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            denied: true,
            reason: reason.into(),
            matched_rule_id: None,
        }
    }

    #[must_use]
    pub fn with_rule(mut self, rule_id: impl Into<String>) -> Self {
        self.matched_rule_id = Some(rule_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_wire_names_are_camel_case() {
        let doc = PolicyDocument::default_deny();
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["denyByDefault"], json!(true));
        assert_eq!(json["version"], json!(1));
    }

    #[test]
    fn test_document_decode_with_defaults() {
        let doc: PolicyDocument = serde_json::from_value(json!({"version": 1})).unwrap();
        assert!(doc.roles.is_empty());
        assert!(doc.rules.is_empty());
        assert!(doc.deny_by_default);
    }

    #[test]
    fn test_role_permission_set_last_write_wins() {
        let set: RolePermissionSet = serde_json::from_value(json!([
            {"resource": "Article", "actions": ["read"], "effect": "allow", "scope": "all"},
            {"resource": "Article", "actions": ["read", "write"], "effect": "deny", "scope": "all"}
        ]))
        .unwrap();

        let perm = set.permission_for("Article").unwrap();
        assert_eq!(perm.effect, Effect::Deny);
        assert!(perm.actions.contains("write"));
    }

    #[test]
    fn test_unrecognized_scope_decodes_as_unknown() {
        let perm: Permission = serde_json::from_value(json!({
            "resource": "Article",
            "actions": ["read"],
            "effect": "allow",
            "scope": "galaxy"
        }))
        .unwrap();
        assert_eq!(perm.scope, PermissionScope::Unknown);
    }

    #[test]
    fn test_unrecognized_effect_fails_decode() {
        let result: std::result::Result<Effect, _> = serde_json::from_value(json!("maybe"));
        assert!(result.is_err());
    }

    #[test]
    fn test_rule_decode_with_conditions() {
        let rule: PolicyRule = serde_json::from_value(json!({
            "id": "rule-1",
            "effect": "deny",
            "subject": {"type": "user", "id": "42"},
            "action": "delete",
            "resource": "Article",
            "conditions": {"userIds": ["42", "43"]}
        }))
        .unwrap();

        assert_eq!(rule.subject.kind, SubjectKind::User);
        assert_eq!(rule.priority, 0);
        assert_eq!(
            rule.conditions.unwrap().user_ids.unwrap(),
            vec!["42".to_string(), "43".to_string()]
        );
    }

    #[test]
    fn test_subject_string_shorthand_is_role() {
        let subject: Subject = "VIEWER".into();
        assert_eq!(subject, Subject::Role("VIEWER".to_string()));
        assert_eq!(subject.kind(), SubjectKind::Role);
        assert_eq!(subject.id(), "VIEWER");
    }

    #[test]
    fn test_result_flags_never_both_true() {
        let allow = PolicyResult::allow("ok");
        assert!(allow.allowed && !allow.denied);

        let deny = PolicyResult::deny("no").with_rule("rule-9");
        assert!(deny.denied && !deny.allowed);
        assert_eq!(deny.matched_rule_id.as_deref(), Some("rule-9"));
    }

    #[test]
    fn test_result_cache_roundtrip() {
        let result = PolicyResult::deny("denied by policy rule").with_rule("rule-2");
        let blob = serde_json::to_string(&result).unwrap();
        assert!(blob.contains("matchedRuleId"));
        let back: PolicyResult = serde_json::from_str(&blob).unwrap();
        assert_eq!(result, back);
    }
}
