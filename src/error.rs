use crate::store::StoreError;
use chrono::{DateTime, Utc};

/// Why a token stopped being usable
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ExpiryReason {
    /// ExpiresIn seconds have passed since creation
    Absolute { deadline: DateTime<Utc> },
    /// The token went unused for longer than its inactivity timeout
    Inactivity { last_used: DateTime<Utc>, timeout_seconds: i32 },
}

impl std::fmt::Display for ExpiryReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Absolute { deadline } => write!(f, "expired at {}", deadline.to_rfc3339()),
            Self::Inactivity {
                last_used,
                timeout_seconds,
            } => write!(
                f,
                "unused for more than {}s since {}",
                timeout_seconds,
                last_used.to_rfc3339()
            ),
        }
    }
}

/// Every way an OAuth check can fail. These are results handed back to the authentication gateway
/// or console, never process-fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub(crate) enum OAuthError {
    #[error("{kind} {name:?} not found")]
    NotFound { kind: String, name: String },

    #[error("token {0}")]
    Expired(ExpiryReason),

    #[error("user {user_name:?} is now UID {current_uid:?}, not {recorded_uid:?}")]
    IdentityMismatch {
        user_name: String,
        recorded_uid: String,
        current_uid: String,
    },

    #[error("scope {0:?} is not permitted for this client")]
    ScopeDenied(String),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("code_verifier does not match the stored code_challenge")]
    ChallengeMismatch,

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("token could not be evaluated: {0}")]
    Unevaluable(String),
}

impl OAuthError {
    pub(crate) fn not_found(kind: &str, name: &str) -> Self {
        Self::NotFound {
            kind: kind.to_string(),
            name: name.to_string(),
        }
    }

    pub(crate) fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }

    pub(crate) fn access_denied(message: impl Into<String>) -> Self {
        Self::AccessDenied(message.into())
    }
}

impl From<StoreError> for OAuthError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound { kind, name } => Self::NotFound { kind, name },
            other => Self::Unevaluable(format!("{:#}", anyhow::Error::from(other))),
        }
    }
}
