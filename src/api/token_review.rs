use super::ObjectMeta;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A multi-valued extra attribute of an authenticated user
#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq, Eq)]
#[serde(transparent)]
pub(crate) struct ExtraValue(pub(crate) Vec<String>);

impl std::fmt::Display for ExtraValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.0.join(" "))
    }
}

impl<S: Into<String>> FromIterator<S> for ExtraValue {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UserInfo {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub(crate) username: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub(crate) uid: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) groups: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub(crate) extra: BTreeMap<String, ExtraValue>,
}

#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TokenReviewSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub(crate) token: String,
    /// Audiences the caller identifies as. Empty means the default audience.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) audiences: Vec<String>,
}

#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TokenReviewStatus {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub(crate) authenticated: bool,
    #[serde(default)]
    pub(crate) user: UserInfo,
    /// The requested audiences the token is valid for. Empty with `authenticated` set means the
    /// default audience.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) audiences: Vec<String>,
    /// Set when the token could not be checked at all, which is different from not authenticated
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub(crate) error: String,
}

/// A synchronous token authentication request and its result. Never persisted.
#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OAuthTokenReview {
    #[serde(default)]
    pub(crate) metadata: ObjectMeta,
    #[serde(default)]
    pub(crate) spec: TokenReviewSpec,
    #[serde(default)]
    pub(crate) status: TokenReviewStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extra_value_renders_like_a_list() {
        assert_eq!(ExtraValue::from_iter(["user:info", "user:check-access"]).to_string(), "[user:info user:check-access]");
        assert_eq!(ExtraValue::default().to_string(), "[]");
    }

    #[test]
    fn extra_value_is_a_plain_json_list() -> anyhow::Result<()> {
        let mut user = UserInfo::default();
        user.extra.insert("scopes.authorization.openshift.io".to_string(), ExtraValue::from_iter(["user:full"]));

        let value = serde_json::to_value(&user)?;
        assert_eq!(value["extra"]["scopes.authorization.openshift.io"], serde_json::json!(["user:full"]));

        Ok(())
    }
}
