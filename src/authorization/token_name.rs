use crate::error::OAuthError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD as base64_url_no_pad, Engine as _};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Prefix of every bearer token and of every stored token name
pub(crate) const SHA256_PREFIX: &str = "sha256~";

const MIN_TOKEN_NAME_LENGTH: usize = 32;

/// A fresh bearer token. Only its hash ever reaches the store.
pub(crate) fn generate() -> String {
    let mut random = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut random);
    format!("{}{}", SHA256_PREFIX, base64_url_no_pad.encode(random))
}

/// The name of the stored object for a bearer token, None for tokens without the sha256~ prefix
pub(crate) fn object_name(token: &str) -> Option<String> {
    let secret = token.strip_prefix(SHA256_PREFIX)?;
    if secret.is_empty() {
        return None;
    }

    Some(format!(
        "{}{}",
        SHA256_PREFIX,
        base64_url_no_pad.encode(Sha256::digest(secret.as_bytes()))
    ))
}

pub(crate) fn validate_object_name(name: &str) -> Result<(), OAuthError> {
    if !name.starts_with(SHA256_PREFIX) {
        return Err(OAuthError::invalid_configuration(format!(
            "token name {:?} must start with {}",
            name, SHA256_PREFIX
        )));
    }

    if name.len() < MIN_TOKEN_NAME_LENGTH {
        return Err(OAuthError::invalid_configuration(format!(
            "token name {:?} must be at least {} characters long",
            name, MIN_TOKEN_NAME_LENGTH
        )));
    }

    if name.contains('/') || name.contains('%') {
        return Err(OAuthError::invalid_configuration(format!(
            "token name {:?} may not contain / or %",
            name
        )));
    }

    Ok(())
}
