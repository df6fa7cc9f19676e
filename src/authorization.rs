//! OAuth authorization logic over the resource model: the pure checks (scopes, expiry, PKCE,
//! grant decisions) and the server operations composing them with the object store.

mod grant;
mod pkce;
mod redirect;
mod scopes;
mod server;
mod token_name;
mod token_review;
mod validity;

pub(crate) use scopes::{scope_allowed, RoleScopeGrammar};
pub(crate) use server::{
    AuthorizationServer, AuthorizeOutcome, AuthorizeRequest, ExchangeRequest, ServerSettings, DEFAULT_TOKEN_AUDIENCE,
};
pub(crate) use token_name::validate_object_name;
