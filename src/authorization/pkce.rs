use crate::{api::OAuthAuthorizeToken, error::OAuthError};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD as base64_url_no_pad, Engine as _};
use sha2::{Digest, Sha256};
use std::str::FromStr;
use subtle::ConstantTimeEq;

/// RFC 7636 code challenge methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::EnumString, strum_macros::Display)]
pub(crate) enum CodeChallengeMethod {
    #[strum(serialize = "plain")]
    Plain,
    #[strum(serialize = "S256")]
    S256,
}

impl CodeChallengeMethod {
    /// An empty method means plain, as in the RFC
    pub(crate) fn parse(method: &str) -> Result<Self, OAuthError> {
        if method.is_empty() {
            return Ok(Self::Plain);
        }

        Self::from_str(method)
            .map_err(|_| OAuthError::invalid_configuration(format!("unsupported code challenge method {:?}", method)))
    }

    pub(crate) fn challenge(self, verifier: &str) -> String {
        match self {
            Self::Plain => verifier.to_string(),
            Self::S256 => base64_url_no_pad.encode(Sha256::digest(verifier.as_bytes())),
        }
    }
}

/// Checks the verifier presented at exchange against the challenge stored with the code. Codes
/// issued without a challenge need no verifier.
pub(crate) fn verify(code: &OAuthAuthorizeToken, verifier: Option<&str>) -> Result<(), OAuthError> {
    if code.code_challenge.is_empty() {
        return Ok(());
    }

    let method = CodeChallengeMethod::parse(&code.code_challenge_method)?;
    let verifier = verifier.ok_or(OAuthError::ChallengeMismatch)?;

    let derived = method.challenge(verifier);
    if bool::from(derived.as_bytes().ct_eq(code.code_challenge.as_bytes())) {
        Ok(())
    } else {
        Err(OAuthError::ChallengeMismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(challenge: &str, method: &str) -> OAuthAuthorizeToken {
        OAuthAuthorizeToken {
            code_challenge: challenge.to_string(),
            code_challenge_method: method.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn plain() {
        let code = code("abc123", "plain");

        assert_eq!(verify(&code, Some("abc123")), Ok(()));
        assert_eq!(verify(&code, Some("xyz")), Err(OAuthError::ChallengeMismatch));
        assert_eq!(verify(&code, None), Err(OAuthError::ChallengeMismatch));
    }

    #[test]
    fn s256_rfc_example() {
        // RFC 7636 appendix B
        let code = code("E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM", "S256");

        assert_eq!(verify(&code, Some("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk")), Ok(()));
        assert_eq!(
            verify(&code, Some("E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM")),
            Err(OAuthError::ChallengeMismatch)
        );
    }

    #[test]
    fn empty_method_is_plain() {
        assert_eq!(verify(&code("abc123", ""), Some("abc123")), Ok(()));
    }

    #[test]
    fn unknown_method() {
        assert!(matches!(
            verify(&code("abc123", "S512"), Some("abc123")),
            Err(OAuthError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn no_challenge_no_check() {
        assert_eq!(verify(&code("", ""), None), Ok(()));
        assert_eq!(verify(&code("", ""), Some("anything")), Ok(()));
    }

    #[test]
    fn method_names() {
        assert_eq!(CodeChallengeMethod::S256.to_string(), "S256");
        assert_eq!(CodeChallengeMethod::parse("plain"), Ok(CodeChallengeMethod::Plain));
    }
}
