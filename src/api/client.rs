use super::{ObjectMeta, ScopeRestriction};
use crate::error::OAuthError;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

/// Lowest non-zero inactivity timeout a client may configure
pub(crate) const MIN_INACTIVITY_TIMEOUT_SECONDS: i32 = 300;

/// How authorization requests are handled when the user has not yet granted the requested scopes
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum_macros::EnumString, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub(crate) enum GrantMethod {
    /// Approve silently, for trusted clients
    Auto,
    /// Ask the user, for third-party clients
    Prompt,
    /// Refuse without ever showing a consent screen
    Deny,
}

#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OAuthClient {
    #[serde(default)]
    pub(crate) metadata: ObjectMeta,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub(crate) secret: String,
    /// Other accepted secrets, so a new secret can be rolled out before the old one is removed
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) additional_secrets: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub(crate) respond_with_challenges: bool,
    #[serde(default, rename = "redirectURIs", skip_serializing_if = "Vec::is_empty")]
    pub(crate) redirect_uris: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) grant_method: Option<GrantMethod>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) scope_restrictions: Vec<ScopeRestriction>,
    /// Unset uses the server default, 0 means tokens never expire
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) access_token_max_age_seconds: Option<i32>,
    /// Unset uses the server default, 0 disables the inactivity check
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) access_token_inactivity_timeout_seconds: Option<i32>,
}

impl OAuthClient {
    /// Clients with no secrets at all are public clients
    pub(crate) fn is_public(&self) -> bool {
        self.secret.is_empty() && self.additional_secrets.is_empty()
    }

    /// Accepts the primary secret and every additional secret, nothing else
    pub(crate) fn secret_matches(&self, presented: &str) -> bool {
        std::iter::once(&self.secret)
            .chain(self.additional_secrets.iter())
            .filter(|secret| !secret.is_empty())
            .fold(false, |matched, secret| {
                matched | bool::from(secret.as_bytes().ct_eq(presented.as_bytes()))
            })
    }

    /// ExpiresIn for new access tokens of this client
    pub(crate) fn effective_max_age_seconds(&self, server_default: i64) -> i64 {
        match self.access_token_max_age_seconds {
            Some(max_age) => i64::from(max_age),
            None => server_default,
        }
    }

    /// InactivityTimeoutSeconds for new access tokens of this client
    pub(crate) fn effective_inactivity_timeout_seconds(&self, server_default: Option<i32>) -> i32 {
        self.access_token_inactivity_timeout_seconds
            .or(server_default)
            .unwrap_or(0)
    }

    pub(crate) fn validate(&self) -> Result<(), OAuthError> {
        if self.metadata.name.is_empty() {
            return Err(OAuthError::invalid_configuration("client must have a name"));
        }

        if self.grant_method.is_none() {
            return Err(OAuthError::invalid_configuration("grantMethod is required"));
        }

        for restriction in &self.scope_restrictions {
            restriction.validate()?;
        }

        self.validate_token_overrides()?;

        for redirect_uri in &self.redirect_uris {
            url::Url::parse(redirect_uri).map_err(|err| {
                OAuthError::invalid_configuration(format!("redirect URI {:?} is not an absolute URL: {}", redirect_uri, err))
            })?;
        }

        Ok(())
    }

    /// The access token lifetime overrides. Tokens are never minted from a client failing this.
    pub(crate) fn validate_token_overrides(&self) -> Result<(), OAuthError> {
        if let Some(max_age) = self.access_token_max_age_seconds {
            if max_age < 0 {
                return Err(OAuthError::invalid_configuration(format!(
                    "accessTokenMaxAgeSeconds must not be negative, got {}",
                    max_age
                )));
            }
        }

        if let Some(timeout) = self.access_token_inactivity_timeout_seconds {
            validate_inactivity_timeout(timeout).map_err(|message| {
                OAuthError::invalid_configuration(format!("accessTokenInactivityTimeoutSeconds {}", message))
            })?;
        }

        Ok(())
    }
}

/// 0 disables the timeout, anything else must be at least the floor
pub(crate) fn validate_inactivity_timeout(timeout: i32) -> Result<(), String> {
    if timeout == 0 || timeout >= MIN_INACTIVITY_TIMEOUT_SECONDS {
        Ok(())
    } else {
        Err(format!(
            "must be 0 or at least {}, got {}",
            MIN_INACTIVITY_TIMEOUT_SECONDS, timeout
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ClusterRoleScopeRestriction, ScopeRestrictionFields};
    use serde_json::json;
    use std::str::FromStr;

    fn client() -> OAuthClient {
        OAuthClient {
            metadata: ObjectMeta::named("console"),
            secret: "primary".to_string(),
            additional_secrets: vec!["next".to_string(), "older".to_string()],
            redirect_uris: vec!["https://console.example.com/auth/callback".to_string()],
            grant_method: Some(GrantMethod::Auto),
            ..Default::default()
        }
    }

    #[test]
    fn secret_check_accepts_all_configured_secrets_only() {
        let client = client();

        assert!(client.secret_matches("primary"));
        assert!(client.secret_matches("next"));
        assert!(client.secret_matches("older"));
        assert!(!client.secret_matches("prim"));
        assert!(!client.secret_matches(""));
        assert!(!client.secret_matches("Primary"));
        assert!(!client.is_public());
    }

    #[test]
    fn public_client_matches_no_secret() {
        let client = OAuthClient {
            secret: String::new(),
            additional_secrets: vec![],
            ..client()
        };

        assert!(client.is_public());
        assert!(!client.secret_matches(""));
    }

    #[test]
    fn overrides() {
        let mut client = client();
        assert_eq!(client.effective_max_age_seconds(86400), 86400);
        assert_eq!(client.effective_inactivity_timeout_seconds(None), 0);
        assert_eq!(client.effective_inactivity_timeout_seconds(Some(600)), 600);

        client.access_token_max_age_seconds = Some(0);
        client.access_token_inactivity_timeout_seconds = Some(0);
        assert_eq!(client.effective_max_age_seconds(86400), 0);
        assert_eq!(client.effective_inactivity_timeout_seconds(Some(600)), 0);

        client.access_token_max_age_seconds = Some(3600);
        client.access_token_inactivity_timeout_seconds = Some(900);
        assert_eq!(client.effective_max_age_seconds(86400), 3600);
        assert_eq!(client.effective_inactivity_timeout_seconds(Some(600)), 900);
    }

    #[test]
    fn validation() {
        assert!(client().validate().is_ok());

        let mut missing_grant = client();
        missing_grant.grant_method = None;
        assert!(matches!(missing_grant.validate(), Err(OAuthError::InvalidConfiguration(_))));

        let mut short_timeout = client();
        short_timeout.access_token_inactivity_timeout_seconds = Some(299);
        assert!(matches!(short_timeout.validate(), Err(OAuthError::InvalidConfiguration(_))));
        short_timeout.access_token_inactivity_timeout_seconds = Some(300);
        assert!(short_timeout.validate().is_ok());
        short_timeout.access_token_inactivity_timeout_seconds = Some(0);
        assert!(short_timeout.validate().is_ok());

        let mut negative_age = client();
        negative_age.access_token_max_age_seconds = Some(-1);
        assert!(negative_age.validate().is_err());

        let mut relative_redirect = client();
        relative_redirect.redirect_uris.push("/callback".to_string());
        assert!(relative_redirect.validate().is_err());

        let mut malformed = client();
        malformed.scope_restrictions = vec![ScopeRestriction::from(ScopeRestrictionFields {
            literals: vec!["user:info".to_string()],
            cluster_role: Some(ClusterRoleScopeRestriction::default()),
        })];
        assert!(matches!(malformed.validate(), Err(OAuthError::InvalidConfiguration(_))));
    }

    #[test]
    fn grant_method_strings() -> anyhow::Result<()> {
        assert_eq!(GrantMethod::from_str("prompt")?, GrantMethod::Prompt);
        assert_eq!(GrantMethod::Deny.to_string(), "deny");
        assert!(GrantMethod::from_str("maybe").is_err());

        let client: OAuthClient = serde_json::from_value(json!({
            "metadata": {"name": "cli"},
            "grantMethod": "auto",
            "redirectURIs": ["https://localhost/callback"],
            "accessTokenInactivityTimeoutSeconds": 0
        }))?;
        assert_eq!(client.grant_method, Some(GrantMethod::Auto));
        assert_eq!(client.redirect_uris, vec!["https://localhost/callback".to_string()]);
        assert_eq!(client.access_token_inactivity_timeout_seconds, Some(0));

        Ok(())
    }
}
