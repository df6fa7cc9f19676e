use super::server::AuthorizationServer;
use crate::{
    api::{ExtraValue, OAuthAccessToken, OAuthTokenReview, TokenReviewStatus, User, UserInfo},
    error::OAuthError,
    store::ObjectStore,
};
use std::collections::BTreeMap;

/// Extra attribute carrying the scopes of the reviewed token
pub(crate) const SCOPES_EXTRA_KEY: &str = "scopes.authorization.openshift.io";

/// Every user authenticated through an OAuth access token is in this group
pub(crate) const OAUTH_AUTHENTICATED_GROUP: &str = "system:authenticated:oauth";

/// The audiences a review is answered for. An empty request means the default audience, which
/// shows up as an empty list. None when the token is valid for none of the requested audiences.
pub(crate) fn matching_audiences(requested: &[String], token_audiences: &[String]) -> Option<Vec<String>> {
    if requested.is_empty() {
        return Some(vec![]);
    }

    let matching: Vec<String> = requested
        .iter()
        .filter(|audience| token_audiences.contains(audience))
        .cloned()
        .collect();

    (!matching.is_empty()).then_some(matching)
}

fn user_info(access_token: &OAuthAccessToken, user: &User) -> UserInfo {
    let mut groups = user.groups.clone();
    if !groups.iter().any(|group| group == OAUTH_AUTHENTICATED_GROUP) {
        groups.push(OAUTH_AUTHENTICATED_GROUP.to_string());
    }

    let mut extra = BTreeMap::new();
    if !access_token.scopes.is_empty() {
        extra.insert(SCOPES_EXTRA_KEY.to_string(), ExtraValue(access_token.scopes.clone()));
    }

    UserInfo {
        username: user.metadata.name.clone(),
        uid: user.metadata.uid.clone(),
        groups,
        extra,
    }
}

impl<S: ObjectStore> AuthorizationServer<S> {
    /// Answers a token review. Rejected tokens come back unauthenticated, only a token that could
    /// not be checked at all sets the error.
    pub(crate) async fn review_token(&self, mut review: OAuthTokenReview) -> OAuthTokenReview {
        review.status = self.review_status(&review.spec.token, &review.spec.audiences).await;
        review
    }

    async fn review_status(&self, token: &str, requested_audiences: &[String]) -> TokenReviewStatus {
        let Some(audiences) = matching_audiences(requested_audiences, &self.settings.token_audiences) else {
            log::debug!("token review for audiences {:?} matches none of ours", requested_audiences);
            return TokenReviewStatus::default();
        };

        match self.validate_access_token(token).await {
            Ok((access_token, user)) => {
                log::debug!(
                    "token review authenticated user {} through access token {}",
                    user.metadata.name,
                    access_token.metadata.name
                );

                TokenReviewStatus {
                    authenticated: true,
                    user: user_info(&access_token, &user),
                    audiences,
                    error: String::new(),
                }
            }
            Err(OAuthError::Unevaluable(message)) => {
                log::warn!("token review could not be evaluated: {}", message);

                TokenReviewStatus {
                    error: message,
                    ..Default::default()
                }
            }
            Err(err) => {
                log::debug!("token review rejected token: {}", err);
                TokenReviewStatus::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::{ObjectMeta, TokenReviewSpec},
        authorization::server::{
            tests::{login, scopes, server},
            ServerSettings, DEFAULT_TOKEN_AUDIENCE,
        },
        etcd_encoding,
        store::{etcd_key, ObjectKey},
    };

    fn review(token: &str, audiences: &[&str]) -> OAuthTokenReview {
        OAuthTokenReview {
            metadata: ObjectMeta::default(),
            spec: TokenReviewSpec {
                token: token.to_string(),
                audiences: scopes(audiences),
            },
            ..Default::default()
        }
    }

    #[test]
    fn audiences() {
        let ours = scopes(&[DEFAULT_TOKEN_AUDIENCE, "https://oauth.example.com"]);

        assert_eq!(matching_audiences(&[], &ours), Some(vec![]));
        assert_eq!(
            matching_audiences(&scopes(&["https://other.example.com", "https://oauth.example.com"]), &ours),
            Some(scopes(&["https://oauth.example.com"]))
        );
        assert_eq!(matching_audiences(&scopes(&["https://other.example.com"]), &ours), None);
    }

    #[tokio::test]
    async fn valid_token() -> anyhow::Result<()> {
        let (server, _) = server(ServerSettings::default()).await?;
        let token = login(&server).await?;

        let reviewed = server.review_token(review(&token.token, &[])).await;
        assert_eq!(
            reviewed.status,
            TokenReviewStatus {
                authenticated: true,
                user: UserInfo {
                    username: "alice".to_string(),
                    uid: "u1".to_string(),
                    groups: scopes(&["developers", OAUTH_AUTHENTICATED_GROUP]),
                    extra: BTreeMap::from([(SCOPES_EXTRA_KEY.to_string(), ExtraValue(scopes(&["user:info"])))]),
                },
                audiences: vec![],
                error: String::new(),
            }
        );
        assert_eq!(reviewed.spec.token, token.token);

        let reviewed = server.review_token(review(&token.token, &[DEFAULT_TOKEN_AUDIENCE])).await;
        assert!(reviewed.status.authenticated);
        assert_eq!(reviewed.status.audiences, scopes(&[DEFAULT_TOKEN_AUDIENCE]));
        Ok(())
    }

    #[tokio::test]
    async fn foreign_audience() -> anyhow::Result<()> {
        let (server, _) = server(ServerSettings::default()).await?;
        let token = login(&server).await?;

        let reviewed = server.review_token(review(&token.token, &["https://other.example.com"])).await;
        assert_eq!(reviewed.status, TokenReviewStatus::default());
        Ok(())
    }

    #[tokio::test]
    async fn rejected_tokens_are_not_errors() -> anyhow::Result<()> {
        let (server, clock) = server(ServerSettings::default()).await?;
        let token = login(&server).await?;

        let reviewed = server.review_token(review("sha256~not-a-real-token", &[])).await;
        assert!(!reviewed.status.authenticated);
        assert!(reviewed.status.error.is_empty());

        clock.advance(86401);
        let reviewed = server.review_token(review(&token.token, &[])).await;
        assert!(!reviewed.status.authenticated);
        assert!(reviewed.status.error.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn unevaluable_tokens_report_an_error() -> anyhow::Result<()> {
        let (server, _) = server(ServerSettings::default()).await?;
        let token = login(&server).await?;

        // A record without a creation timestamp cannot be checked for expiry. The store stamps
        // new objects, so the record is written underneath it.
        let key = ObjectKey::cluster(&token.access_token.metadata.name);
        let mut access_token: OAuthAccessToken = server.store.get(&key).await?;
        server.store.delete::<OAuthAccessToken>(&key, None).await?;

        access_token.metadata.resource_version.clear();
        access_token.metadata.creation_timestamp = None;
        server
            .store
            .create_raw(
                &etcd_key::<OAuthAccessToken>(&key),
                etcd_encoding::encode(&access_token, server.store.encoding())?,
            )
            .await?;

        let reviewed = server.review_token(review(&token.token, &[])).await;
        assert!(!reviewed.status.authenticated);
        assert!(!reviewed.status.error.is_empty());
        Ok(())
    }
}
