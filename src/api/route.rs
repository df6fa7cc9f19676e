use super::ObjectMeta;
use serde::{Deserialize, Serialize};

/// The slice of a Route that redirect references resolve against
#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Route {
    #[serde(default)]
    pub(crate) metadata: ObjectMeta,
    #[serde(default)]
    pub(crate) spec: RouteSpec,
}

#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RouteSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub(crate) host: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub(crate) path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) tls: Option<TlsConfig>,
}

#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TlsConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub(crate) termination: String,
}

impl Route {
    /// The externally visible address of the route, None until a host has been admitted
    pub(crate) fn external_uri(&self) -> Option<String> {
        if self.spec.host.is_empty() {
            return None;
        }

        let scheme = if self.spec.tls.is_some() { "https" } else { "http" };
        let path = if self.spec.path.is_empty() || self.spec.path.starts_with('/') {
            self.spec.path.clone()
        } else {
            format!("/{}", self.spec.path)
        };

        Some(format!("{}://{}{}", scheme, self.spec.host, path))
    }
}
