use super::{is_zero_i32, is_zero_i64, ObjectMeta};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Annotation holding the RFC 3339 time of the most recent successful use of an access token
pub(crate) const LAST_USED_ANNOTATION: &str = "oauth.openshift.io/last-used";

/// A bearer credential granting API access on behalf of a user. The object name is derived from the
/// bearer token, see [`crate::authorization::token_name`].
#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OAuthAccessToken {
    #[serde(default)]
    pub(crate) metadata: ObjectMeta,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub(crate) client_name: String,
    /// Seconds from creation before this token expires, 0 means never
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub(crate) expires_in: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) scopes: Vec<String>,
    #[serde(default, rename = "redirectURI", skip_serializing_if = "String::is_empty")]
    pub(crate) redirect_uri: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub(crate) user_name: String,
    #[serde(default, rename = "userUID", skip_serializing_if = "String::is_empty")]
    pub(crate) user_uid: String,
    /// Name of the authorization code this token was exchanged from
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub(crate) authorize_token: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub(crate) refresh_token: String,
    /// Maximum gap in seconds between consecutive uses, 0 disables the check
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub(crate) inactivity_timeout_seconds: i32,
}

impl OAuthAccessToken {
    /// When the token was last used successfully. Tokens that were never used count from creation.
    pub(crate) fn last_used(&self) -> Option<DateTime<Utc>> {
        self.metadata
            .annotations
            .get(LAST_USED_ANNOTATION)
            .and_then(|value| DateTime::parse_from_rfc3339(value).ok())
            .map(|value| value.with_timezone(&Utc))
            .or(self.metadata.creation_timestamp)
    }

    pub(crate) fn mark_used(&mut self, now: DateTime<Utc>) {
        self.metadata
            .annotations
            .insert(LAST_USED_ANNOTATION.to_string(), now.to_rfc3339());
    }
}
