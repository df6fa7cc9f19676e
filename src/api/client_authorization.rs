use super::ObjectMeta;
use serde::{Deserialize, Serialize};

/// Records that a user already granted a client a set of scopes, so requests within that set need
/// no consent prompt
#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OAuthClientAuthorization {
    #[serde(default)]
    pub(crate) metadata: ObjectMeta,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub(crate) client_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub(crate) user_name: String,
    #[serde(default, rename = "userUID", skip_serializing_if = "String::is_empty")]
    pub(crate) user_uid: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) scopes: Vec<String>,
}

impl OAuthClientAuthorization {
    /// Authorizations are keyed by the user/client pair
    pub(crate) fn name_for(user_name: &str, client_name: &str) -> String {
        format!("{}:{}", user_name, client_name)
    }

    pub(crate) fn new(user_name: &str, user_uid: &str, client_name: &str, scopes: &[String]) -> Self {
        Self {
            metadata: ObjectMeta::named(&Self::name_for(user_name, client_name)),
            client_name: client_name.to_string(),
            user_name: user_name.to_string(),
            user_uid: user_uid.to_string(),
            scopes: scopes.to_vec(),
        }
    }

    /// Whether every requested scope was already granted
    pub(crate) fn covers(&self, requested: &[String]) -> bool {
        requested.iter().all(|scope| self.scopes.contains(scope))
    }

    /// Folds a new grant into this record. A changed UID means a different user now owns the name,
    /// so the old grants are discarded rather than merged.
    pub(crate) fn merge_grant(&mut self, user_uid: &str, scopes: &[String]) {
        if self.user_uid != user_uid {
            self.user_uid = user_uid.to_string();
            self.scopes = vec![];
        }

        for scope in scopes {
            if !self.scopes.contains(scope) {
                self.scopes.push(scope.clone());
            }
        }
    }
}
