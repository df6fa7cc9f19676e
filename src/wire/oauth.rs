use super::meta::{metadata_from_wire, ObjectMeta};
use crate::api;
use anyhow::{Context, Result};
use std::{collections::BTreeMap, str::FromStr};

#[derive(Clone, PartialEq, ::prost::Message)]
pub(crate) struct OAuthAccessToken {
    #[prost(message, optional, tag = "1")]
    pub(crate) metadata: Option<ObjectMeta>,
    #[prost(string, optional, tag = "2")]
    pub(crate) client_name: Option<String>,
    #[prost(int64, optional, tag = "3")]
    pub(crate) expires_in: Option<i64>,
    #[prost(string, repeated, tag = "4")]
    pub(crate) scopes: Vec<String>,
    #[prost(string, optional, tag = "5")]
    pub(crate) redirect_uri: Option<String>,
    #[prost(string, optional, tag = "6")]
    pub(crate) user_name: Option<String>,
    #[prost(string, optional, tag = "7")]
    pub(crate) user_uid: Option<String>,
    #[prost(string, optional, tag = "8")]
    pub(crate) authorize_token: Option<String>,
    #[prost(string, optional, tag = "9")]
    pub(crate) refresh_token: Option<String>,
    #[prost(int32, optional, tag = "10")]
    pub(crate) inactivity_timeout_seconds: Option<i32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub(crate) struct OAuthAuthorizeToken {
    #[prost(message, optional, tag = "1")]
    pub(crate) metadata: Option<ObjectMeta>,
    #[prost(string, optional, tag = "2")]
    pub(crate) client_name: Option<String>,
    #[prost(int64, optional, tag = "3")]
    pub(crate) expires_in: Option<i64>,
    #[prost(string, repeated, tag = "4")]
    pub(crate) scopes: Vec<String>,
    #[prost(string, optional, tag = "5")]
    pub(crate) redirect_uri: Option<String>,
    #[prost(string, optional, tag = "6")]
    pub(crate) state: Option<String>,
    #[prost(string, optional, tag = "7")]
    pub(crate) user_name: Option<String>,
    #[prost(string, optional, tag = "8")]
    pub(crate) user_uid: Option<String>,
    #[prost(string, optional, tag = "9")]
    pub(crate) code_challenge: Option<String>,
    #[prost(string, optional, tag = "10")]
    pub(crate) code_challenge_method: Option<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub(crate) struct ClusterRoleScopeRestriction {
    #[prost(string, repeated, tag = "1")]
    pub(crate) role_names: Vec<String>,
    #[prost(string, repeated, tag = "2")]
    pub(crate) namespaces: Vec<String>,
    #[prost(bool, optional, tag = "3")]
    pub(crate) allow_escalation: Option<bool>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub(crate) struct ScopeRestriction {
    #[prost(string, repeated, tag = "1")]
    pub(crate) literals: Vec<String>,
    #[prost(message, optional, tag = "2")]
    pub(crate) cluster_role: Option<ClusterRoleScopeRestriction>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub(crate) struct OAuthClient {
    #[prost(message, optional, tag = "1")]
    pub(crate) metadata: Option<ObjectMeta>,
    #[prost(string, optional, tag = "2")]
    pub(crate) secret: Option<String>,
    #[prost(string, repeated, tag = "3")]
    pub(crate) additional_secrets: Vec<String>,
    #[prost(bool, optional, tag = "4")]
    pub(crate) respond_with_challenges: Option<bool>,
    #[prost(string, repeated, tag = "5")]
    pub(crate) redirect_uris: Vec<String>,
    #[prost(string, optional, tag = "6")]
    pub(crate) grant_method: Option<String>,
    #[prost(message, repeated, tag = "7")]
    pub(crate) scope_restrictions: Vec<ScopeRestriction>,
    #[prost(int32, optional, tag = "8")]
    pub(crate) access_token_max_age_seconds: Option<i32>,
    #[prost(int32, optional, tag = "9")]
    pub(crate) access_token_inactivity_timeout_seconds: Option<i32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub(crate) struct OAuthClientAuthorization {
    #[prost(message, optional, tag = "1")]
    pub(crate) metadata: Option<ObjectMeta>,
    #[prost(string, optional, tag = "2")]
    pub(crate) client_name: Option<String>,
    #[prost(string, optional, tag = "3")]
    pub(crate) user_name: Option<String>,
    #[prost(string, optional, tag = "4")]
    pub(crate) user_uid: Option<String>,
    #[prost(string, repeated, tag = "5")]
    pub(crate) scopes: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub(crate) struct RedirectReference {
    #[prost(string, optional, tag = "1")]
    pub(crate) group: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub(crate) kind: Option<String>,
    #[prost(string, optional, tag = "3")]
    pub(crate) name: Option<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub(crate) struct OAuthRedirectReference {
    #[prost(message, optional, tag = "1")]
    pub(crate) metadata: Option<ObjectMeta>,
    #[prost(message, optional, tag = "2")]
    pub(crate) reference: Option<RedirectReference>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub(crate) struct ExtraValue {
    #[prost(string, repeated, tag = "1")]
    pub(crate) items: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub(crate) struct UserInfo {
    #[prost(string, optional, tag = "1")]
    pub(crate) username: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub(crate) uid: Option<String>,
    #[prost(string, repeated, tag = "3")]
    pub(crate) groups: Vec<String>,
    #[prost(btree_map = "string, message", tag = "4")]
    pub(crate) extra: BTreeMap<String, ExtraValue>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub(crate) struct TokenReviewSpec {
    #[prost(string, optional, tag = "1")]
    pub(crate) token: Option<String>,
    #[prost(string, repeated, tag = "2")]
    pub(crate) audiences: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub(crate) struct TokenReviewStatus {
    #[prost(bool, optional, tag = "1")]
    pub(crate) authenticated: Option<bool>,
    #[prost(message, optional, tag = "2")]
    pub(crate) user: Option<UserInfo>,
    #[prost(string, optional, tag = "3")]
    pub(crate) error: Option<String>,
    #[prost(string, repeated, tag = "4")]
    pub(crate) audiences: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub(crate) struct OAuthTokenReview {
    #[prost(message, optional, tag = "1")]
    pub(crate) metadata: Option<ObjectMeta>,
    #[prost(message, optional, tag = "2")]
    pub(crate) spec: Option<TokenReviewSpec>,
    #[prost(message, optional, tag = "3")]
    pub(crate) status: Option<TokenReviewStatus>,
}

// Scalars are always written, the way the cluster's own encoder does for non-pointer fields

impl From<&api::OAuthAccessToken> for OAuthAccessToken {
    fn from(token: &api::OAuthAccessToken) -> Self {
        Self {
            metadata: Some(ObjectMeta::from(&token.metadata)),
            client_name: Some(token.client_name.clone()),
            expires_in: Some(token.expires_in),
            scopes: token.scopes.clone(),
            redirect_uri: Some(token.redirect_uri.clone()),
            user_name: Some(token.user_name.clone()),
            user_uid: Some(token.user_uid.clone()),
            authorize_token: Some(token.authorize_token.clone()),
            refresh_token: Some(token.refresh_token.clone()),
            inactivity_timeout_seconds: Some(token.inactivity_timeout_seconds),
        }
    }
}

impl TryFrom<OAuthAccessToken> for api::OAuthAccessToken {
    type Error = anyhow::Error;

    fn try_from(token: OAuthAccessToken) -> Result<Self> {
        Ok(Self {
            metadata: metadata_from_wire(token.metadata)?,
            client_name: token.client_name.unwrap_or_default(),
            expires_in: token.expires_in.unwrap_or_default(),
            scopes: token.scopes,
            redirect_uri: token.redirect_uri.unwrap_or_default(),
            user_name: token.user_name.unwrap_or_default(),
            user_uid: token.user_uid.unwrap_or_default(),
            authorize_token: token.authorize_token.unwrap_or_default(),
            refresh_token: token.refresh_token.unwrap_or_default(),
            inactivity_timeout_seconds: token.inactivity_timeout_seconds.unwrap_or_default(),
        })
    }
}

impl From<&api::OAuthAuthorizeToken> for OAuthAuthorizeToken {
    fn from(token: &api::OAuthAuthorizeToken) -> Self {
        Self {
            metadata: Some(ObjectMeta::from(&token.metadata)),
            client_name: Some(token.client_name.clone()),
            expires_in: Some(token.expires_in),
            scopes: token.scopes.clone(),
            redirect_uri: Some(token.redirect_uri.clone()),
            state: Some(token.state.clone()),
            user_name: Some(token.user_name.clone()),
            user_uid: Some(token.user_uid.clone()),
            code_challenge: Some(token.code_challenge.clone()),
            code_challenge_method: Some(token.code_challenge_method.clone()),
        }
    }
}

impl TryFrom<OAuthAuthorizeToken> for api::OAuthAuthorizeToken {
    type Error = anyhow::Error;

    fn try_from(token: OAuthAuthorizeToken) -> Result<Self> {
        Ok(Self {
            metadata: metadata_from_wire(token.metadata)?,
            client_name: token.client_name.unwrap_or_default(),
            expires_in: token.expires_in.unwrap_or_default(),
            scopes: token.scopes,
            redirect_uri: token.redirect_uri.unwrap_or_default(),
            state: token.state.unwrap_or_default(),
            user_name: token.user_name.unwrap_or_default(),
            user_uid: token.user_uid.unwrap_or_default(),
            code_challenge: token.code_challenge.unwrap_or_default(),
            code_challenge_method: token.code_challenge_method.unwrap_or_default(),
        })
    }
}

impl From<&api::ScopeRestriction> for ScopeRestriction {
    fn from(restriction: &api::ScopeRestriction) -> Self {
        let fields = api::ScopeRestrictionFields::from(restriction.clone());
        Self {
            literals: fields.literals,
            cluster_role: fields.cluster_role.map(|cluster_role| ClusterRoleScopeRestriction {
                role_names: cluster_role.role_names,
                namespaces: cluster_role.namespaces,
                allow_escalation: Some(cluster_role.allow_escalation),
            }),
        }
    }
}

impl From<ScopeRestriction> for api::ScopeRestriction {
    fn from(restriction: ScopeRestriction) -> Self {
        api::ScopeRestriction::from(api::ScopeRestrictionFields {
            literals: restriction.literals,
            cluster_role: restriction
                .cluster_role
                .map(|cluster_role| api::ClusterRoleScopeRestriction {
                    role_names: cluster_role.role_names,
                    namespaces: cluster_role.namespaces,
                    allow_escalation: cluster_role.allow_escalation.unwrap_or_default(),
                }),
        })
    }
}

impl From<&api::OAuthClient> for OAuthClient {
    fn from(client: &api::OAuthClient) -> Self {
        Self {
            metadata: Some(ObjectMeta::from(&client.metadata)),
            secret: Some(client.secret.clone()),
            additional_secrets: client.additional_secrets.clone(),
            respond_with_challenges: Some(client.respond_with_challenges),
            redirect_uris: client.redirect_uris.clone(),
            grant_method: Some(
                client
                    .grant_method
                    .map(|grant_method| grant_method.to_string())
                    .unwrap_or_default(),
            ),
            scope_restrictions: client.scope_restrictions.iter().map(ScopeRestriction::from).collect(),
            access_token_max_age_seconds: client.access_token_max_age_seconds,
            access_token_inactivity_timeout_seconds: client.access_token_inactivity_timeout_seconds,
        }
    }
}

impl TryFrom<OAuthClient> for api::OAuthClient {
    type Error = anyhow::Error;

    fn try_from(client: OAuthClient) -> Result<Self> {
        let grant_method = match client.grant_method.as_deref() {
            None | Some("") => None,
            Some(grant_method) => Some(
                api::GrantMethod::from_str(grant_method).context(format!("unknown grantMethod {:?}", grant_method))?,
            ),
        };

        Ok(Self {
            metadata: metadata_from_wire(client.metadata)?,
            secret: client.secret.unwrap_or_default(),
            additional_secrets: client.additional_secrets,
            respond_with_challenges: client.respond_with_challenges.unwrap_or_default(),
            redirect_uris: client.redirect_uris,
            grant_method,
            scope_restrictions: client.scope_restrictions.into_iter().map(api::ScopeRestriction::from).collect(),
            access_token_max_age_seconds: client.access_token_max_age_seconds,
            access_token_inactivity_timeout_seconds: client.access_token_inactivity_timeout_seconds,
        })
    }
}

impl From<&api::OAuthClientAuthorization> for OAuthClientAuthorization {
    fn from(authorization: &api::OAuthClientAuthorization) -> Self {
        Self {
            metadata: Some(ObjectMeta::from(&authorization.metadata)),
            client_name: Some(authorization.client_name.clone()),
            user_name: Some(authorization.user_name.clone()),
            user_uid: Some(authorization.user_uid.clone()),
            scopes: authorization.scopes.clone(),
        }
    }
}

impl TryFrom<OAuthClientAuthorization> for api::OAuthClientAuthorization {
    type Error = anyhow::Error;

    fn try_from(authorization: OAuthClientAuthorization) -> Result<Self> {
        Ok(Self {
            metadata: metadata_from_wire(authorization.metadata)?,
            client_name: authorization.client_name.unwrap_or_default(),
            user_name: authorization.user_name.unwrap_or_default(),
            user_uid: authorization.user_uid.unwrap_or_default(),
            scopes: authorization.scopes,
        })
    }
}

impl From<&api::OAuthRedirectReference> for OAuthRedirectReference {
    fn from(redirect_reference: &api::OAuthRedirectReference) -> Self {
        Self {
            metadata: Some(ObjectMeta::from(&redirect_reference.metadata)),
            reference: Some(RedirectReference {
                group: Some(redirect_reference.reference.group.clone()),
                kind: Some(redirect_reference.reference.kind.clone()),
                name: Some(redirect_reference.reference.name.clone()),
            }),
        }
    }
}

impl TryFrom<OAuthRedirectReference> for api::OAuthRedirectReference {
    type Error = anyhow::Error;

    fn try_from(redirect_reference: OAuthRedirectReference) -> Result<Self> {
        let reference = redirect_reference.reference.unwrap_or_default();

        Ok(Self {
            metadata: metadata_from_wire(redirect_reference.metadata)?,
            reference: api::RedirectReference {
                group: reference.group.unwrap_or_default(),
                kind: reference.kind.unwrap_or_default(),
                name: reference.name.unwrap_or_default(),
            },
        })
    }
}

impl From<&api::OAuthTokenReview> for OAuthTokenReview {
    fn from(review: &api::OAuthTokenReview) -> Self {
        let user = &review.status.user;

        Self {
            metadata: Some(ObjectMeta::from(&review.metadata)),
            spec: Some(TokenReviewSpec {
                token: Some(review.spec.token.clone()),
                audiences: review.spec.audiences.clone(),
            }),
            status: Some(TokenReviewStatus {
                authenticated: Some(review.status.authenticated),
                user: Some(UserInfo {
                    username: Some(user.username.clone()),
                    uid: Some(user.uid.clone()),
                    groups: user.groups.clone(),
                    extra: user
                        .extra
                        .iter()
                        .map(|(key, value)| (key.clone(), ExtraValue { items: value.0.clone() }))
                        .collect(),
                }),
                error: Some(review.status.error.clone()),
                audiences: review.status.audiences.clone(),
            }),
        }
    }
}

impl TryFrom<OAuthTokenReview> for api::OAuthTokenReview {
    type Error = anyhow::Error;

    fn try_from(review: OAuthTokenReview) -> Result<Self> {
        let spec = review.spec.unwrap_or_default();
        let status = review.status.unwrap_or_default();
        let user = status.user.unwrap_or_default();

        Ok(Self {
            metadata: metadata_from_wire(review.metadata)?,
            spec: api::TokenReviewSpec {
                token: spec.token.unwrap_or_default(),
                audiences: spec.audiences,
            },
            status: api::TokenReviewStatus {
                authenticated: status.authenticated.unwrap_or_default(),
                user: api::UserInfo {
                    username: user.username.unwrap_or_default(),
                    uid: user.uid.unwrap_or_default(),
                    groups: user.groups,
                    extra: user
                        .extra
                        .into_iter()
                        .map(|(key, value)| (key, api::ExtraValue(value.items)))
                        .collect(),
                },
                audiences: status.audiences,
                error: status.error.unwrap_or_default(),
            },
        })
    }
}
