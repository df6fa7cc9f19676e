use super::{
    grant::{self, GrantDecision},
    pkce::{self, CodeChallengeMethod},
    redirect,
    scopes::{self, RoleScopeGrammar, ScopeGrammar},
    token_name, validity,
};
use crate::{
    api::{ObjectMeta, OAuthAccessToken, OAuthAuthorizeToken, OAuthClient, OAuthClientAuthorization, Resource, User},
    error::OAuthError,
    store::{self, ObjectKey, ObjectStore, StoreError},
};
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub(crate) const DEFAULT_TOKEN_AUDIENCE: &str = "https://kubernetes.default.svc";

/// Server-wide token policy. Clients may override the access token lifetimes.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub(crate) struct ServerSettings {
    /// 0 means access tokens never expire
    pub(crate) access_token_max_age_seconds: i64,
    /// None or 0 disables the inactivity check
    pub(crate) access_token_inactivity_timeout_seconds: Option<i32>,
    pub(crate) authorize_token_max_age_seconds: i64,
    pub(crate) token_audiences: Vec<String>,
    /// Attempts of each read-modify-write loop against the store
    pub(crate) conflict_retries: u32,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            access_token_max_age_seconds: 86400,
            access_token_inactivity_timeout_seconds: None,
            authorize_token_max_age_seconds: 300,
            token_audiences: vec![DEFAULT_TOKEN_AUDIENCE.to_string()],
            conflict_retries: 5,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct AuthorizeRequest {
    pub(crate) client_id: String,
    /// The already authenticated user making the request
    pub(crate) user_name: String,
    /// May be omitted when the client has exactly one permitted redirect URI
    pub(crate) redirect_uri: String,
    pub(crate) scopes: Vec<String>,
    pub(crate) state: String,
    pub(crate) code_challenge: String,
    pub(crate) code_challenge_method: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct IssuedCode {
    /// The code handed to the client. Only its hash is stored.
    pub(crate) code: String,
    pub(crate) authorize_token: OAuthAuthorizeToken,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AuthorizeOutcome {
    Issued(IssuedCode),
    /// The user has to approve the request, see [`AuthorizationServer::complete_consent`]
    ConsentRequired { client_name: String, scopes: Vec<String> },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ExchangeRequest {
    pub(crate) client_id: String,
    pub(crate) client_secret: String,
    pub(crate) code: String,
    pub(crate) redirect_uri: String,
    pub(crate) code_verifier: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct IssuedAccessToken {
    /// The bearer token handed to the client. Only its hash is stored.
    pub(crate) token: String,
    pub(crate) access_token: OAuthAccessToken,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub(crate) struct PruneReport {
    pub(crate) access_tokens: Vec<String>,
    pub(crate) authorize_tokens: Vec<String>,
}

/// An authorization request that passed every check not involving the grant decision
struct ValidatedRequest {
    client: OAuthClient,
    user: User,
    redirect_uri: String,
}

/// The authorization server logic, composed over an object store
pub(crate) struct AuthorizationServer<S> {
    pub(super) store: Arc<S>,
    pub(super) settings: ServerSettings,
    grammar: Box<dyn ScopeGrammar>,
    clock: Box<dyn Fn() -> DateTime<Utc> + Send + Sync>,
}

impl<S: ObjectStore> AuthorizationServer<S> {
    pub(crate) fn new(store: Arc<S>, settings: ServerSettings) -> Self {
        Self {
            store,
            settings,
            grammar: Box::new(RoleScopeGrammar),
            clock: Box::new(Utc::now),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub(super) fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Handles an authorization request of an authenticated user. Issues a code right away unless
    /// the user has to consent first.
    pub(crate) async fn authorize(&self, request: &AuthorizeRequest) -> Result<AuthorizeOutcome, OAuthError> {
        let validated = self.validate_request(request).await?;
        let existing = self.existing_authorization(&validated).await?;

        let decision = grant::decide(
            validated.client.grant_method,
            existing.as_ref(),
            &validated.user.metadata.uid,
            &request.scopes,
        )?;

        log::info!(
            "grant decision for user {} and client {} with scopes {:?}: {}",
            validated.user.metadata.name,
            validated.client.metadata.name,
            request.scopes,
            decision
        );

        match decision {
            GrantDecision::AlreadyGranted => Ok(AuthorizeOutcome::Issued(self.issue_code(request, &validated).await?)),
            GrantDecision::AutoApprove => {
                self.record_grant(&validated, &request.scopes).await?;
                Ok(AuthorizeOutcome::Issued(self.issue_code(request, &validated).await?))
            }
            GrantDecision::PromptUser => Ok(AuthorizeOutcome::ConsentRequired {
                client_name: validated.client.metadata.name,
                scopes: request.scopes.clone(),
            }),
            GrantDecision::Deny => Err(OAuthError::access_denied(format!(
                "client {} does not accept new grants",
                validated.client.metadata.name
            ))),
        }
    }

    /// The user's answer to a consent prompt. The request is checked again in full, the client or
    /// the user may have changed in the meantime.
    pub(crate) async fn complete_consent(&self, request: &AuthorizeRequest, approved: bool) -> Result<IssuedCode, OAuthError> {
        let validated = self.validate_request(request).await?;

        if !approved {
            log::info!(
                "user {} rejected client {}",
                validated.user.metadata.name,
                validated.client.metadata.name
            );
            return Err(OAuthError::access_denied("the user rejected the request"));
        }

        if grant::decide(validated.client.grant_method, None, &validated.user.metadata.uid, &request.scopes)? == GrantDecision::Deny {
            return Err(OAuthError::access_denied(format!(
                "client {} does not accept new grants",
                validated.client.metadata.name
            )));
        }

        self.record_grant(&validated, &request.scopes).await?;
        self.issue_code(request, &validated).await
    }

    async fn validate_request(&self, request: &AuthorizeRequest) -> Result<ValidatedRequest, OAuthError> {
        let client: OAuthClient = self.store.get(&ObjectKey::cluster(&request.client_id)).await?;
        client.validate_token_overrides()?;

        let permitted = redirect::permitted_redirect_uris(self.store.as_ref(), &client).await;
        let redirect_uri = if request.redirect_uri.is_empty() {
            match permitted.as_slice() {
                [only] => only.clone(),
                _ => return Err(OAuthError::access_denied("redirect_uri is required")),
            }
        } else if redirect::redirect_uri_permitted(&permitted, &request.redirect_uri) {
            request.redirect_uri.clone()
        } else {
            return Err(OAuthError::access_denied(format!(
                "redirect_uri {:?} is not permitted for client {}",
                request.redirect_uri, client.metadata.name
            )));
        };

        if request.scopes.is_empty() {
            return Err(OAuthError::access_denied("no scopes requested"));
        }
        scopes::check_scopes(&client.scope_restrictions, &request.scopes, self.grammar.as_ref())?;

        if !request.code_challenge.is_empty() {
            CodeChallengeMethod::parse(&request.code_challenge_method)?;
        }

        let user: User = self.store.get(&ObjectKey::cluster(&request.user_name)).await?;

        Ok(ValidatedRequest {
            client,
            user,
            redirect_uri,
        })
    }

    async fn existing_authorization(&self, validated: &ValidatedRequest) -> Result<Option<OAuthClientAuthorization>, OAuthError> {
        let name = OAuthClientAuthorization::name_for(&validated.user.metadata.name, &validated.client.metadata.name);

        match self.store.get(&ObjectKey::cluster(&name)).await {
            Ok(authorization) => Ok(Some(authorization)),
            Err(StoreError::NotFound { .. }) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Creates the user's authorization of the client, or merges the scopes into the existing one
    async fn record_grant(&self, validated: &ValidatedRequest, scopes: &[String]) -> Result<OAuthClientAuthorization, OAuthError> {
        let user_name = validated.user.metadata.name.as_str();
        let user_uid = validated.user.metadata.uid.as_str();
        let client_name = validated.client.metadata.name.as_str();

        let authorization = store::upsert_with_retry(
            self.store.as_ref(),
            &ObjectKey::cluster(&OAuthClientAuthorization::name_for(user_name, client_name)),
            self.settings.conflict_retries,
            || OAuthClientAuthorization::new(user_name, user_uid, client_name, scopes),
            |authorization: &mut OAuthClientAuthorization| authorization.merge_grant(user_uid, scopes),
        )
        .await?;

        log::info!(
            "user {} granted client {} scopes {:?}",
            user_name,
            client_name,
            authorization.scopes
        );

        Ok(authorization)
    }

    async fn issue_code(&self, request: &AuthorizeRequest, validated: &ValidatedRequest) -> Result<IssuedCode, OAuthError> {
        let code = token_name::generate();
        let name = token_name::object_name(&code).ok_or_else(|| OAuthError::Unevaluable("generated a malformed code".to_string()))?;

        let mut metadata = ObjectMeta::named(&name);
        metadata.creation_timestamp = Some(self.now());

        let authorize_token = self
            .store
            .create(OAuthAuthorizeToken {
                metadata,
                client_name: validated.client.metadata.name.clone(),
                expires_in: self.settings.authorize_token_max_age_seconds,
                scopes: request.scopes.clone(),
                redirect_uri: validated.redirect_uri.clone(),
                state: request.state.clone(),
                user_name: validated.user.metadata.name.clone(),
                user_uid: validated.user.metadata.uid.clone(),
                code_challenge: request.code_challenge.clone(),
                code_challenge_method: request.code_challenge_method.clone(),
            })
            .await?;

        Ok(IssuedCode { code, authorize_token })
    }

    /// Trades an authorization code for an access token. The code is consumed, a second exchange
    /// of the same code is denied.
    pub(crate) async fn exchange_code(&self, request: &ExchangeRequest) -> Result<IssuedAccessToken, OAuthError> {
        let client: OAuthClient = self.store.get(&ObjectKey::cluster(&request.client_id)).await?;
        client.validate_token_overrides()?;

        if !client.is_public() && !client.secret_matches(&request.client_secret) {
            return Err(OAuthError::access_denied(format!(
                "invalid secret for client {}",
                client.metadata.name
            )));
        }

        let name = token_name::object_name(&request.code).ok_or_else(|| OAuthError::not_found(OAuthAuthorizeToken::KIND, ""))?;
        let key = ObjectKey::cluster(&name);
        let code: OAuthAuthorizeToken = self.store.get(&key).await?;

        if code.client_name != client.metadata.name {
            return Err(OAuthError::access_denied("the code was issued to another client"));
        }

        if code.redirect_uri != request.redirect_uri {
            return Err(OAuthError::access_denied("redirect_uri does not match the authorization request"));
        }

        let now = self.now();
        validity::check_authorize_token_expiry(&code, now)?;

        let user: User = self.store.get(&ObjectKey::cluster(&code.user_name)).await?;
        validity::check_user_uid(&code.user_uid, &user)?;

        pkce::verify(&code, request.code_verifier.as_deref())?;

        match self
            .store
            .delete::<OAuthAuthorizeToken>(&key, Some(&code.metadata.resource_version))
            .await
        {
            Ok(()) => {}
            Err(StoreError::NotFound { .. } | StoreError::Conflict { .. }) => {
                return Err(OAuthError::access_denied("the code was already used"));
            }
            Err(err) => return Err(err.into()),
        }

        log::info!(
            "consumed authorization code {} of client {} for user {}",
            name,
            client.metadata.name,
            code.user_name
        );

        self.mint_access_token(&client, code, now).await
    }

    async fn mint_access_token(
        &self,
        client: &OAuthClient,
        code: OAuthAuthorizeToken,
        now: DateTime<Utc>,
    ) -> Result<IssuedAccessToken, OAuthError> {
        let token = token_name::generate();
        let name = token_name::object_name(&token).ok_or_else(|| OAuthError::Unevaluable("generated a malformed token".to_string()))?;

        let mut metadata = ObjectMeta::named(&name);
        metadata.creation_timestamp = Some(now);

        let access_token = self
            .store
            .create(OAuthAccessToken {
                metadata,
                client_name: client.metadata.name.clone(),
                expires_in: client.effective_max_age_seconds(self.settings.access_token_max_age_seconds),
                scopes: code.scopes,
                redirect_uri: code.redirect_uri,
                user_name: code.user_name,
                user_uid: code.user_uid,
                authorize_token: code.metadata.name,
                refresh_token: String::new(),
                inactivity_timeout_seconds: client
                    .effective_inactivity_timeout_seconds(self.settings.access_token_inactivity_timeout_seconds),
            })
            .await?;

        log::info!(
            "issued access token {} to client {} for user {}",
            access_token.metadata.name,
            access_token.client_name,
            access_token.user_name
        );

        Ok(IssuedAccessToken { token, access_token })
    }

    /// Checks a presented bearer token. A successful use of a token with an inactivity timeout
    /// moves its last-use time to now.
    pub(crate) async fn check_access_token(&self, token: &str) -> Result<OAuthAccessToken, OAuthError> {
        self.validate_access_token(token)
            .await
            .map(|(access_token, _)| access_token)
    }

    pub(super) async fn validate_access_token(&self, token: &str) -> Result<(OAuthAccessToken, User), OAuthError> {
        let name = token_name::object_name(token).ok_or_else(|| OAuthError::not_found(OAuthAccessToken::KIND, ""))?;
        let access_token: OAuthAccessToken = self.store.get(&ObjectKey::cluster(&name)).await?;

        // Tokens of deleted clients die with them
        let _: OAuthClient = self.store.get(&ObjectKey::cluster(&access_token.client_name)).await?;

        let now = self.now();
        validity::check_access_token_expiry(&access_token, now)?;

        let user: User = self.store.get(&ObjectKey::cluster(&access_token.user_name)).await?;
        validity::check_user_uid(&access_token.user_uid, &user)?;

        if access_token.inactivity_timeout_seconds <= 0
            || access_token.last_used().is_some_and(|last_used| last_used >= now)
        {
            return Ok((access_token, user));
        }

        let access_token = store::update_with_retry(
            self.store.as_ref(),
            &ObjectKey::cluster(&name),
            self.settings.conflict_retries,
            |access_token: &mut OAuthAccessToken| {
                if access_token.last_used().map_or(true, |last_used| last_used < now) {
                    access_token.mark_used(now);
                }
            },
        )
        .await?;

        log::debug!("refreshed last use of access token {} to {}", name, now.to_rfc3339());

        Ok((access_token, user))
    }

    /// The access tokens issued to a user
    pub(crate) async fn user_tokens(&self, user_name: &str) -> Result<Vec<OAuthAccessToken>, OAuthError> {
        Ok(self
            .store
            .list::<OAuthAccessToken>(None)
            .await?
            .into_iter()
            .filter(|access_token| access_token.user_name == user_name)
            .collect())
    }

    /// Deletes access and authorization tokens that have expired. Expiry is enforced on every use
    /// regardless, this only reclaims storage.
    pub(crate) async fn prune_expired(&self, dry_run: bool) -> Result<PruneReport, OAuthError> {
        let now = self.now();

        Ok(PruneReport {
            access_tokens: self
                .prune_kind(dry_run, |access_token: &OAuthAccessToken| {
                    validity::check_access_token_expiry(access_token, now)
                })
                .await?,
            authorize_tokens: self
                .prune_kind(dry_run, |code: &OAuthAuthorizeToken| {
                    validity::check_authorize_token_expiry(code, now)
                })
                .await?,
        })
    }

    async fn prune_kind<R, F>(&self, dry_run: bool, check: F) -> Result<Vec<String>, OAuthError>
    where
        R: Resource,
        F: Fn(&R) -> Result<(), OAuthError> + Send + Sync,
    {
        let mut pruned = vec![];

        for resource in self.store.list::<R>(None).await? {
            let name = resource.metadata().name.clone();

            match check(&resource) {
                Ok(()) => continue,
                Err(OAuthError::Expired(reason)) => {
                    if !dry_run {
                        match self
                            .store
                            .delete::<R>(&ObjectKey::cluster(&name), Some(&resource.metadata().resource_version))
                            .await
                        {
                            Ok(()) => {}
                            Err(StoreError::NotFound { .. } | StoreError::Conflict { .. }) => {
                                log::debug!("{} {} changed while pruning, skipping", R::KIND, name);
                                continue;
                            }
                            Err(err) => return Err(err.into()),
                        }
                    }

                    log::info!("pruned {} {}: {}", R::KIND, name, reason);
                    pruned.push(name);
                }
                Err(err) => log::warn!("cannot tell whether {} {} expired: {}", R::KIND, name, err),
            }
        }

        Ok(pruned)
    }
}
