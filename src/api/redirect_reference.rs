use super::ObjectMeta;
use serde::{Deserialize, Serialize};

/// Clients carry references as annotations with this prefix, the value being a JSON
/// OAuthRedirectReference
pub(crate) const REDIRECT_REFERENCE_ANNOTATION_PREFIX: &str = "serviceaccounts.openshift.io/oauth-redirectreference.";

pub(crate) const ROUTE_GROUP: &str = "route.openshift.io";
pub(crate) const ROUTE_KIND: &str = "Route";

/// Points at an object whose externally visible address resolves into a redirect URI. Only the
/// `Route` kind is currently allowed.
#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RedirectReference {
    #[serde(default)]
    pub(crate) group: String,
    #[serde(default)]
    pub(crate) kind: String,
    #[serde(default)]
    pub(crate) name: String,
}

impl RedirectReference {
    pub(crate) fn is_route(&self) -> bool {
        self.kind == ROUTE_KIND && (self.group.is_empty() || self.group == ROUTE_GROUP)
    }
}

#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OAuthRedirectReference {
    #[serde(default)]
    pub(crate) metadata: ObjectMeta,
    #[serde(default)]
    pub(crate) reference: RedirectReference,
}
