use crate::{
    api::{GrantMethod, OAuthClientAuthorization},
    error::OAuthError,
};

/// What to do with an authorization request that passed the client and scope checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "kebab-case")]
pub(crate) enum GrantDecision {
    /// The user already granted every requested scope, issue a code right away
    AlreadyGranted,
    /// Record the grant without asking and issue a code
    AutoApprove,
    /// Ask the user for consent first
    PromptUser,
    Deny,
}

impl From<GrantMethod> for GrantDecision {
    fn from(grant_method: GrantMethod) -> Self {
        match grant_method {
            GrantMethod::Auto => Self::AutoApprove,
            GrantMethod::Prompt => Self::PromptUser,
            GrantMethod::Deny => Self::Deny,
        }
    }
}

/// An existing authorization short-circuits the grant method, but only when it was given by the
/// same user (UID) and covers everything requested
pub(crate) fn decide(
    grant_method: Option<GrantMethod>,
    existing: Option<&OAuthClientAuthorization>,
    user_uid: &str,
    requested: &[String],
) -> Result<GrantDecision, OAuthError> {
    if let Some(existing) = existing {
        if existing.user_uid == user_uid && existing.covers(requested) {
            return Ok(GrantDecision::AlreadyGranted);
        }
    }

    grant_method
        .map(GrantDecision::from)
        .ok_or_else(|| OAuthError::invalid_configuration("client has no grantMethod"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scopes(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn grant_method_alone() {
        let requested = scopes(&["user:info"]);

        assert_eq!(decide(Some(GrantMethod::Auto), None, "u1", &requested), Ok(GrantDecision::AutoApprove));
        assert_eq!(decide(Some(GrantMethod::Prompt), None, "u1", &requested), Ok(GrantDecision::PromptUser));
        assert_eq!(decide(Some(GrantMethod::Deny), None, "u1", &requested), Ok(GrantDecision::Deny));
        assert!(matches!(
            decide(None, None, "u1", &requested),
            Err(OAuthError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn covering_authorization_skips_the_decision() {
        let existing = OAuthClientAuthorization::new("alice", "u1", "console", &scopes(&["user:info", "user:check-access"]));

        for grant_method in [GrantMethod::Auto, GrantMethod::Prompt, GrantMethod::Deny] {
            assert_eq!(
                decide(Some(grant_method), Some(&existing), "u1", &scopes(&["user:info"])),
                Ok(GrantDecision::AlreadyGranted)
            );
        }
    }

    #[test]
    fn partial_or_stale_authorization_does_not() {
        let existing = OAuthClientAuthorization::new("alice", "u1", "console", &scopes(&["user:info"]));

        assert_eq!(
            decide(Some(GrantMethod::Prompt), Some(&existing), "u1", &scopes(&["user:info", "user:full"])),
            Ok(GrantDecision::PromptUser)
        );
        assert_eq!(
            decide(Some(GrantMethod::Prompt), Some(&existing), "u2", &scopes(&["user:info"])),
            Ok(GrantDecision::PromptUser)
        );
    }
}
