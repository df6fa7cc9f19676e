//! Protobuf messages for the storage encoding. Field tags are part of the stored format and must
//! never be renumbered.

mod meta;
mod oauth;

pub(crate) use meta::{TypeMeta, Unknown};
pub(crate) use oauth::{OAuthAccessToken, OAuthAuthorizeToken, OAuthClient, OAuthClientAuthorization, OAuthRedirectReference, OAuthTokenReview};
