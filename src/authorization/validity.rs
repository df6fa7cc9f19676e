use crate::{
    api::{OAuthAccessToken, OAuthAuthorizeToken, User},
    error::{ExpiryReason, OAuthError},
};
use chrono::{DateTime, Duration, Utc};

/// Absolute expiry. A non-positive `expires_in` never expires. The token is still valid at the
/// exact deadline.
pub(crate) fn check_absolute_expiry(
    created: Option<DateTime<Utc>>,
    expires_in: i64,
    now: DateTime<Utc>,
) -> Result<(), OAuthError> {
    if expires_in <= 0 {
        return Ok(());
    }

    let created = created.ok_or_else(|| OAuthError::Unevaluable("token has no creation timestamp".to_string()))?;
    let deadline = Duration::try_seconds(expires_in)
        .and_then(|expires_in| created.checked_add_signed(expires_in))
        .ok_or_else(|| OAuthError::Unevaluable(format!("expiresIn {} is out of range", expires_in)))?;

    if now > deadline {
        return Err(OAuthError::Expired(ExpiryReason::Absolute { deadline }));
    }

    Ok(())
}

/// Inactivity expiry. A non-positive timeout disables the check.
pub(crate) fn check_inactivity(
    last_used: Option<DateTime<Utc>>,
    inactivity_timeout_seconds: i32,
    now: DateTime<Utc>,
) -> Result<(), OAuthError> {
    if inactivity_timeout_seconds <= 0 {
        return Ok(());
    }

    let last_used = last_used.ok_or_else(|| OAuthError::Unevaluable("token has no last-use time".to_string()))?;

    let timeout = Duration::try_seconds(i64::from(inactivity_timeout_seconds))
        .ok_or_else(|| OAuthError::Unevaluable(format!("inactivity timeout {} is out of range", inactivity_timeout_seconds)))?;

    if now - last_used > timeout {
        return Err(OAuthError::Expired(ExpiryReason::Inactivity {
            last_used,
            timeout_seconds: inactivity_timeout_seconds,
        }));
    }

    Ok(())
}

/// Both expiry checks of an access token at `now`, with no side effects
pub(crate) fn check_access_token_expiry(token: &OAuthAccessToken, now: DateTime<Utc>) -> Result<(), OAuthError> {
    check_absolute_expiry(token.metadata.creation_timestamp, token.expires_in, now)?;
    check_inactivity(token.last_used(), token.inactivity_timeout_seconds, now)
}

pub(crate) fn check_authorize_token_expiry(token: &OAuthAuthorizeToken, now: DateTime<Utc>) -> Result<(), OAuthError> {
    check_absolute_expiry(token.metadata.creation_timestamp, token.expires_in, now)
}

/// The user a token was issued to must still be the same user, not a new one under the same name
pub(crate) fn check_user_uid(recorded_uid: &str, user: &User) -> Result<(), OAuthError> {
    if recorded_uid != user.metadata.uid {
        return Err(OAuthError::IdentityMismatch {
            user_name: user.metadata.name.clone(),
            recorded_uid: recorded_uid.to_string(),
            current_uid: user.metadata.uid.clone(),
        });
    }

    Ok(())
}
