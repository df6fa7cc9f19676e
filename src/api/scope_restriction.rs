use crate::error::OAuthError;
use serde::{Deserialize, Serialize};

/// Restrictions on the cluster role scopes a client may request. A `*` in either list matches
/// anything, including a requested `*`.
#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ClusterRoleScopeRestriction {
    #[serde(default)]
    pub(crate) role_names: Vec<String>,
    #[serde(default)]
    pub(crate) namespaces: Vec<String>,
    #[serde(default)]
    pub(crate) allow_escalation: bool,
}

/// The shape a scope restriction has on the wire, where exactly one of the two options must be
/// populated
#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ScopeRestrictionFields {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) literals: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) cluster_role: Option<ClusterRoleScopeRestriction>,
}

/// One rule in a client's scope allow-list
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(from = "ScopeRestrictionFields", into = "ScopeRestrictionFields")]
pub(crate) enum ScopeRestriction {
    /// The scope must be literally one of these strings
    ExactValues(Vec<String>),
    ClusterRole(ClusterRoleScopeRestriction),
    /// A persisted restriction with zero or both options populated. Kept so the record still
    /// round-trips, but it never matches anything.
    Malformed(ScopeRestrictionFields),
}

impl ScopeRestriction {
    /// Strict construction, rejecting restrictions with zero or both options populated
    #[cfg(test)]
    pub(crate) fn new(fields: ScopeRestrictionFields) -> Result<Self, OAuthError> {
        match Self::from(fields) {
            Self::Malformed(fields) => Err(OAuthError::invalid_configuration(describe_malformed(&fields))),
            restriction => Ok(restriction),
        }
    }

    #[cfg(test)]
    pub(crate) fn exact_values<I, S>(values: I) -> Result<Self, OAuthError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(ScopeRestrictionFields {
            literals: values.into_iter().map(Into::into).collect(),
            cluster_role: None,
        })
    }

    pub(crate) fn validate(&self) -> Result<(), OAuthError> {
        match self {
            Self::Malformed(fields) => Err(OAuthError::invalid_configuration(describe_malformed(fields))),
            _ => Ok(()),
        }
    }
}

fn describe_malformed(fields: &ScopeRestrictionFields) -> String {
    if fields.literals.is_empty() && fields.cluster_role.is_none() {
        "scope restriction must set one of literals or clusterRole".to_string()
    } else {
        "scope restriction must set only one of literals or clusterRole".to_string()
    }
}

impl From<ScopeRestrictionFields> for ScopeRestriction {
    fn from(fields: ScopeRestrictionFields) -> Self {
        match (fields.literals.is_empty(), fields.cluster_role) {
            (false, None) => Self::ExactValues(fields.literals),
            (true, Some(cluster_role)) => Self::ClusterRole(cluster_role),
            (_, cluster_role) => Self::Malformed(ScopeRestrictionFields {
                literals: fields.literals,
                cluster_role,
            }),
        }
    }
}

impl From<ScopeRestriction> for ScopeRestrictionFields {
    fn from(restriction: ScopeRestriction) -> Self {
        match restriction {
            ScopeRestriction::ExactValues(literals) => Self {
                literals,
                cluster_role: None,
            },
            ScopeRestriction::ClusterRole(cluster_role) => Self {
                literals: vec![],
                cluster_role: Some(cluster_role),
            },
            ScopeRestriction::Malformed(fields) => fields,
        }
    }
}
