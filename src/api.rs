use crate::wire;
use anyhow::{bail, Context, Result};
use prost::Message;
use serde::{de::DeserializeOwned, Serialize};

mod access_token;
mod authorize_token;
mod client;
mod client_authorization;
mod meta;
mod redirect_reference;
mod route;
mod scope_restriction;
mod token_review;
mod user;

pub(crate) use access_token::OAuthAccessToken;
pub(crate) use authorize_token::OAuthAuthorizeToken;
pub(crate) use client::{validate_inactivity_timeout, GrantMethod, OAuthClient};
pub(crate) use client_authorization::OAuthClientAuthorization;
pub(crate) use meta::{ObjectMeta, TypeMeta, WithTypeMeta};
pub(crate) use redirect_reference::{OAuthRedirectReference, RedirectReference, REDIRECT_REFERENCE_ANNOTATION_PREFIX};
pub(crate) use route::Route;
#[cfg(test)]
pub(crate) use route::{RouteSpec, TlsConfig};
pub(crate) use scope_restriction::{ClusterRoleScopeRestriction, ScopeRestriction, ScopeRestrictionFields};
pub(crate) use token_review::{ExtraValue, OAuthTokenReview, TokenReviewSpec, TokenReviewStatus, UserInfo};
pub(crate) use user::User;

pub(crate) const OAUTH_API_VERSION: &str = "oauth.openshift.io/v1";

/// A kind the object store can hold. Kinds with a protobuf form override the protobuf hooks, the
/// rest are only ever stored as JSON.
pub(crate) trait Resource: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const API_VERSION: &'static str;
    const KIND: &'static str;
    const NAMESPACED: bool;

    fn metadata(&self) -> &ObjectMeta;
    fn metadata_mut(&mut self) -> &mut ObjectMeta;

    fn to_protobuf(&self) -> Option<Vec<u8>> {
        None
    }

    fn from_protobuf(_raw: &[u8]) -> Result<Self> {
        bail!("{} has no protobuf encoding", Self::KIND)
    }
}

macro_rules! resource {
    ($type:ident, $api_version:expr, $kind:literal, $namespaced:literal) => {
        impl Resource for $type {
            const API_VERSION: &'static str = $api_version;
            const KIND: &'static str = $kind;
            const NAMESPACED: bool = $namespaced;

            fn metadata(&self) -> &ObjectMeta {
                &self.metadata
            }

            fn metadata_mut(&mut self) -> &mut ObjectMeta {
                &mut self.metadata
            }
        }
    };
    ($type:ident, $api_version:expr, $kind:literal, $namespaced:literal, $wire:ty) => {
        impl Resource for $type {
            const API_VERSION: &'static str = $api_version;
            const KIND: &'static str = $kind;
            const NAMESPACED: bool = $namespaced;

            fn metadata(&self) -> &ObjectMeta {
                &self.metadata
            }

            fn metadata_mut(&mut self) -> &mut ObjectMeta {
                &mut self.metadata
            }

            fn to_protobuf(&self) -> Option<Vec<u8>> {
                Some(<$wire>::from(self).encode_to_vec())
            }

            fn from_protobuf(raw: &[u8]) -> Result<Self> {
                Self::try_from(<$wire>::decode(raw).context(concat!("decoding ", $kind, " protobuf"))?)
            }
        }
    };
}

resource!(OAuthAccessToken, OAUTH_API_VERSION, "OAuthAccessToken", false, wire::OAuthAccessToken);
resource!(OAuthAuthorizeToken, OAUTH_API_VERSION, "OAuthAuthorizeToken", false, wire::OAuthAuthorizeToken);
resource!(OAuthClient, OAUTH_API_VERSION, "OAuthClient", false, wire::OAuthClient);
resource!(
    OAuthClientAuthorization,
    OAUTH_API_VERSION,
    "OAuthClientAuthorization",
    false,
    wire::OAuthClientAuthorization
);
resource!(OAuthRedirectReference, OAUTH_API_VERSION, "OAuthRedirectReference", true, wire::OAuthRedirectReference);
resource!(OAuthTokenReview, OAUTH_API_VERSION, "OAuthTokenReview", false, wire::OAuthTokenReview);
resource!(User, "user.openshift.io/v1", "User", false);
resource!(Route, "route.openshift.io/v1", "Route", true);

pub(crate) fn is_zero_i64(value: &i64) -> bool {
    *value == 0
}

pub(crate) fn is_zero_i32(value: &i32) -> bool {
    *value == 0
}
