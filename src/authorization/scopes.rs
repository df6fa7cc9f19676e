use crate::{
    api::{ClusterRoleScopeRestriction, ScopeRestriction},
    error::OAuthError,
};
use lazy_regex::regex_captures;

const WILDCARD: &str = "*";

/// A scope requesting a cluster role within a namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RoleScope {
    pub(crate) role_name: String,
    pub(crate) namespace: String,
    /// Whether the scope asks for the escalating parts of the role too
    pub(crate) escalating: bool,
}

/// Decodes the scope strings cluster role restrictions bind to
pub(crate) trait ScopeGrammar: Send + Sync {
    /// None when the scope is not a role scope at all
    fn parse_role_scope(&self, scope: &str) -> Option<RoleScope>;
}

/// `role:<role name>:<namespace>`, with a trailing `:!` requesting escalation. `*` as the namespace
/// means all namespaces.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct RoleScopeGrammar;

impl ScopeGrammar for RoleScopeGrammar {
    fn parse_role_scope(&self, scope: &str) -> Option<RoleScope> {
        let (_, role_name, namespace, escalating) = regex_captures!(r"^role:([^:]+):([^:]+)(:!)?$", scope)?;

        Some(RoleScope {
            role_name: role_name.to_string(),
            namespace: namespace.to_string(),
            escalating: !escalating.is_empty(),
        })
    }
}

fn contains_or_wildcard(values: &[String], value: &str) -> bool {
    values.iter().any(|candidate| candidate == WILDCARD || candidate == value)
}

fn cluster_role_matches(restriction: &ClusterRoleScopeRestriction, scope: &str, grammar: &dyn ScopeGrammar) -> bool {
    let Some(role_scope) = grammar.parse_role_scope(scope) else {
        return false;
    };

    contains_or_wildcard(&restriction.role_names, &role_scope.role_name)
        && contains_or_wildcard(&restriction.namespaces, &role_scope.namespace)
        && (!role_scope.escalating || restriction.allow_escalation)
}

pub(crate) fn restriction_matches(restriction: &ScopeRestriction, scope: &str, grammar: &dyn ScopeGrammar) -> bool {
    match restriction {
        ScopeRestriction::ExactValues(literals) => literals.iter().any(|literal| literal == scope),
        ScopeRestriction::ClusterRole(cluster_role) => cluster_role_matches(cluster_role, scope, grammar),
        ScopeRestriction::Malformed(_) => false,
    }
}

/// Restrictions form a pure allow-list: a scope is allowed when any of them matches it
pub(crate) fn scope_allowed(restrictions: &[ScopeRestriction], scope: &str, grammar: &dyn ScopeGrammar) -> bool {
    restrictions
        .iter()
        .any(|restriction| restriction_matches(restriction, scope, grammar))
}

/// Fails on the first requested scope no restriction allows
pub(crate) fn check_scopes(restrictions: &[ScopeRestriction], scopes: &[String], grammar: &dyn ScopeGrammar) -> Result<(), OAuthError> {
    match scopes
        .iter()
        .find(|scope| !scope_allowed(restrictions, scope, grammar))
    {
        Some(denied) => Err(OAuthError::ScopeDenied(denied.clone())),
        None => Ok(()),
    }
}
