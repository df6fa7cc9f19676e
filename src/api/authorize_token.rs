use super::{is_zero_i64, ObjectMeta};
use serde::{Deserialize, Serialize};

/// A short-lived, single-use authorization code
#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OAuthAuthorizeToken {
    #[serde(default)]
    pub(crate) metadata: ObjectMeta,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub(crate) client_name: String,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub(crate) expires_in: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) scopes: Vec<String>,
    #[serde(default, rename = "redirectURI", skip_serializing_if = "String::is_empty")]
    pub(crate) redirect_uri: String,
    /// Opaque state from the authorization request
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub(crate) state: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub(crate) user_name: String,
    /// Must still be the UID of `user_name` when the code is exchanged
    #[serde(default, rename = "userUID", skip_serializing_if = "String::is_empty")]
    pub(crate) user_uid: String,
    /// RFC 7636 code_challenge, empty when the client did not use PKCE
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub(crate) code_challenge: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub(crate) code_challenge_method: String,
}
