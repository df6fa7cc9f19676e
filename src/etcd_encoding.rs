use crate::{
    api::{
        OAuthAccessToken, OAuthAuthorizeToken, OAuthClient, OAuthClientAuthorization, OAuthRedirectReference, OAuthTokenReview,
        Resource, Route, TypeMeta, User, WithTypeMeta,
    },
    wire,
};
use anyhow::{bail, ensure, Context, Result};
use fn_error_context::context;
use prost::Message;
use serde_json::Value;

/// Every protobuf-encoded value stored in etcd starts with these bytes
const PROTOBUF_MAGIC: &[u8] = b"k8s\x00";

const PROTOBUF_CONTENT_TYPE: &str = "application/vnd.kubernetes.protobuf";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, strum_macros::EnumString, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub(crate) enum StorageEncoding {
    #[default]
    Protobuf,
    Json,
}

pub(crate) fn is_protobuf(data: &[u8]) -> bool {
    data.starts_with(PROTOBUF_MAGIC)
}

/// Kinds without a protobuf form are written as JSON even when protobuf is requested
#[context("encoding {} {:?}", R::KIND, resource.metadata().name)]
pub(crate) fn encode<R: Resource>(resource: &R, encoding: StorageEncoding) -> Result<Vec<u8>> {
    let type_meta = TypeMeta {
        api_version: R::API_VERSION.to_string(),
        kind: R::KIND.to_string(),
    };

    if encoding == StorageEncoding::Protobuf {
        if let Some(raw) = resource.to_protobuf() {
            let unknown = wire::Unknown {
                type_meta: Some(wire::TypeMeta {
                    api_version: Some(type_meta.api_version),
                    kind: Some(type_meta.kind),
                }),
                raw: Some(raw),
                content_encoding: Some(String::new()),
                content_type: Some(String::new()),
            };

            let mut result = PROTOBUF_MAGIC.to_vec();
            result.extend(unknown.encode_to_vec());
            return Ok(result);
        }
    }

    serde_json::to_vec(&WithTypeMeta {
        type_meta,
        inner: resource,
    })
    .context("serializing json")
}

/// Accepts either encoding, regardless of what the store is configured to write
#[context("decoding {}", R::KIND)]
pub(crate) fn decode<R: Resource>(data: &[u8]) -> Result<R> {
    if is_protobuf(data) {
        let unknown = wire::Unknown::decode(&data[PROTOBUF_MAGIC.len()..]).context("decoding runtime.Unknown envelope")?;
        let type_meta = unknown.type_meta.as_ref().context("envelope has no typeMeta")?;
        check_type_meta::<R>(type_meta.api_version(), type_meta.kind())?;

        if let Some(content_type) = unknown.content_type.as_deref() {
            ensure!(
                content_type.is_empty() || content_type == PROTOBUF_CONTENT_TYPE,
                "unsupported content type {:?}",
                content_type
            );
        }

        return R::from_protobuf(unknown.raw());
    }

    let with_type_meta: WithTypeMeta<R> = serde_json::from_slice(data).context("parsing json")?;
    check_type_meta::<R>(&with_type_meta.type_meta.api_version, &with_type_meta.type_meta.kind)?;

    Ok(with_type_meta.inner)
}

fn check_type_meta<R: Resource>(api_version: &str, kind: &str) -> Result<()> {
    ensure!(kind == R::KIND, "expected kind {} but found {:?}", R::KIND, kind);
    ensure!(
        api_version.is_empty() || api_version == R::API_VERSION,
        "expected apiVersion {} but found {:?}",
        R::API_VERSION,
        api_version
    );
    Ok(())
}

/// The kind of an encoded value, without decoding the whole object
pub(crate) fn peek_kind(data: &[u8]) -> Result<String> {
    if is_protobuf(data) {
        let unknown = wire::Unknown::decode(&data[PROTOBUF_MAGIC.len()..]).context("decoding runtime.Unknown envelope")?;
        return Ok(unknown.type_meta.context("envelope has no typeMeta")?.kind().to_string());
    }

    let value: Value = serde_json::from_slice(data).context("parsing json")?;
    Ok(value
        .pointer("/kind")
        .context("missing kind")?
        .as_str()
        .context("kind is not a string")?
        .to_string())
}

/// Any kind this crate knows about, for the places that handle documents of mixed kinds
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum AnyResource {
    AccessToken(OAuthAccessToken),
    AuthorizeToken(OAuthAuthorizeToken),
    Client(OAuthClient),
    ClientAuthorization(OAuthClientAuthorization),
    RedirectReference(OAuthRedirectReference),
    TokenReview(OAuthTokenReview),
    User(User),
    Route(Route),
}

macro_rules! for_each_kind {
    ($any:expr, $resource:ident => $body:expr) => {
        match $any {
            AnyResource::AccessToken($resource) => $body,
            AnyResource::AuthorizeToken($resource) => $body,
            AnyResource::Client($resource) => $body,
            AnyResource::ClientAuthorization($resource) => $body,
            AnyResource::RedirectReference($resource) => $body,
            AnyResource::TokenReview($resource) => $body,
            AnyResource::User($resource) => $body,
            AnyResource::Route($resource) => $body,
        }
    };
}

impl AnyResource {
    pub(crate) fn kind(&self) -> &'static str {
        fn kind_of<R: Resource>(_: &R) -> &'static str {
            R::KIND
        }
        for_each_kind!(self, resource => kind_of(resource))
    }

    pub(crate) fn name(&self) -> &str {
        for_each_kind!(self, resource => resource.metadata().name.as_str())
    }

    pub(crate) fn to_json(&self) -> Result<Value> {
        fn with_type_meta<R: Resource>(resource: &R) -> Result<Value> {
            serde_json::to_value(WithTypeMeta {
                type_meta: TypeMeta {
                    api_version: R::API_VERSION.to_string(),
                    kind: R::KIND.to_string(),
                },
                inner: resource,
            })
            .context("serializing json")
        }
        for_each_kind!(self, resource => with_type_meta(resource))
    }
}

pub(crate) fn encode_any(resource: &AnyResource, encoding: StorageEncoding) -> Result<Vec<u8>> {
    for_each_kind!(resource, resource => encode(resource, encoding))
}

pub(crate) fn decode_any(data: &[u8]) -> Result<AnyResource> {
    let kind = peek_kind(data).context("determining kind")?;

    Ok(match kind.as_str() {
        "OAuthAccessToken" => AnyResource::AccessToken(decode(data)?),
        "OAuthAuthorizeToken" => AnyResource::AuthorizeToken(decode(data)?),
        "OAuthClient" => AnyResource::Client(decode(data)?),
        "OAuthClientAuthorization" => AnyResource::ClientAuthorization(decode(data)?),
        "OAuthRedirectReference" => AnyResource::RedirectReference(decode(data)?),
        "OAuthTokenReview" => AnyResource::TokenReview(decode(data)?),
        "User" => AnyResource::User(decode(data)?),
        "Route" => AnyResource::Route(decode(data)?),
        _ => bail!("unknown kind {}", kind),
    })
}

/// Reads a document from disk: YAML, JSON or an already storage-encoded protobuf value
pub(crate) fn decode_document(data: &[u8]) -> Result<AnyResource> {
    if is_protobuf(data) {
        return decode_any(data);
    }

    let value: Value = serde_yaml::from_slice(data).context("parsing yaml")?;
    decode_any(&serde_json::to_vec(&value).context("serializing json")?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{
        ClusterRoleScopeRestriction, ExtraValue, GrantMethod, ObjectMeta, RedirectReference, RouteSpec, ScopeRestriction,
        TlsConfig, TokenReviewSpec, TokenReviewStatus, UserInfo,
    };
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn metadata(name: &str) -> ObjectMeta {
        ObjectMeta {
            name: name.to_string(),
            namespace: None,
            uid: "0b8f5c7e-5a2d-4d43-9d3a-3f0c3c1c0a11".to_string(),
            resource_version: "42".to_string(),
            creation_timestamp: Utc.timestamp_opt(1_700_000_000, 0).single(),
            labels: BTreeMap::from([("app".to_string(), "console".to_string())]),
            annotations: BTreeMap::from([(
                "oauth.openshift.io/last-used".to_string(),
                "2023-11-14T22:13:20+00:00".to_string(),
            )]),
        }
    }

    fn access_token() -> OAuthAccessToken {
        OAuthAccessToken {
            metadata: metadata("sha256~q5o0XgRY1SWKOHZtIs4bXOcoQs0BcD09TRD9Tl5LE1E"),
            client_name: "console".to_string(),
            expires_in: 86400,
            scopes: vec!["user:full".to_string()],
            redirect_uri: "https://console.apps.example.com/auth/callback".to_string(),
            user_name: "alice".to_string(),
            user_uid: "u1".to_string(),
            authorize_token: "sha256~code".to_string(),
            refresh_token: "".to_string(),
            inactivity_timeout_seconds: 600,
        }
    }

    fn client() -> OAuthClient {
        OAuthClient {
            metadata: metadata("console"),
            secret: "s3cret".to_string(),
            additional_secrets: vec!["next".to_string()],
            respond_with_challenges: true,
            redirect_uris: vec!["https://console.apps.example.com/auth/callback".to_string()],
            grant_method: Some(GrantMethod::Prompt),
            scope_restrictions: vec![
                ScopeRestriction::ExactValues(vec!["user:info".to_string()]),
                ScopeRestriction::ClusterRole(ClusterRoleScopeRestriction {
                    role_names: vec!["*".to_string()],
                    namespaces: vec!["default".to_string()],
                    allow_escalation: false,
                }),
            ],
            access_token_max_age_seconds: Some(0),
            access_token_inactivity_timeout_seconds: None,
        }
    }

    #[test]
    fn protobuf_envelope() -> Result<()> {
        let encoded = encode(&access_token(), StorageEncoding::Protobuf)?;
        assert!(encoded.starts_with(b"k8s\x00"));
        assert_eq!(peek_kind(&encoded)?, "OAuthAccessToken");

        let unknown = wire::Unknown::decode(&encoded[4..])?;
        assert_eq!(unknown.type_meta.as_ref().map(|type_meta| type_meta.api_version()), Some("oauth.openshift.io/v1"));

        assert_eq!(decode::<OAuthAccessToken>(&encoded)?, access_token());
        Ok(())
    }

    #[test]
    fn json_field_names() -> Result<()> {
        let encoded = encode(&access_token(), StorageEncoding::Json)?;
        let value: Value = serde_json::from_slice(&encoded)?;

        assert_eq!(value["kind"], "OAuthAccessToken");
        assert_eq!(value["apiVersion"], "oauth.openshift.io/v1");
        assert_eq!(value["redirectURI"], "https://console.apps.example.com/auth/callback");
        assert_eq!(value["userUID"], "u1");
        assert_eq!(value["inactivityTimeoutSeconds"], 600);
        assert!(value.get("refreshToken").is_none());

        assert_eq!(decode::<OAuthAccessToken>(&encoded)?, access_token());
        Ok(())
    }

    #[test]
    fn client_keeps_override_presence() -> Result<()> {
        for encoding in [StorageEncoding::Protobuf, StorageEncoding::Json] {
            let decoded = decode::<OAuthClient>(&encode(&client(), encoding)?)?;
            assert_eq!(decoded, client());
            assert_eq!(decoded.access_token_max_age_seconds, Some(0));
            assert_eq!(decoded.access_token_inactivity_timeout_seconds, None);
        }
        Ok(())
    }

    #[test]
    fn token_review_extra_survives() -> Result<()> {
        let review = OAuthTokenReview {
            metadata: ObjectMeta::default(),
            spec: TokenReviewSpec {
                token: "sha256~abc".to_string(),
                audiences: vec!["https://kubernetes.default.svc".to_string()],
            },
            status: TokenReviewStatus {
                authenticated: true,
                user: UserInfo {
                    username: "alice".to_string(),
                    uid: "u1".to_string(),
                    groups: vec!["system:authenticated:oauth".to_string()],
                    extra: BTreeMap::from([(
                        "scopes.authorization.openshift.io".to_string(),
                        ExtraValue(vec!["user:info".to_string(), "user:check-access".to_string()]),
                    )]),
                },
                audiences: vec![],
                error: String::new(),
            },
        };

        for encoding in [StorageEncoding::Protobuf, StorageEncoding::Json] {
            assert_eq!(decode::<OAuthTokenReview>(&encode(&review, encoding)?)?, review);
        }
        Ok(())
    }

    #[test]
    fn redirect_reference_and_authorization() -> Result<()> {
        let reference = OAuthRedirectReference {
            metadata: ObjectMeta::default(),
            reference: RedirectReference {
                group: "route.openshift.io".to_string(),
                kind: "Route".to_string(),
                name: "grafana".to_string(),
            },
        };
        assert_eq!(
            decode::<OAuthRedirectReference>(&encode(&reference, StorageEncoding::Protobuf)?)?,
            reference
        );

        let authorization = OAuthClientAuthorization::new("alice", "u1", "console", &["user:info".to_string()]);
        assert_eq!(
            decode::<OAuthClientAuthorization>(&encode(&authorization, StorageEncoding::Protobuf)?)?,
            authorization
        );
        Ok(())
    }

    /// One object of every kind with every field populated
    fn every_kind() -> Vec<AnyResource> {
        let namespaced = |namespace: &str, name: &str| ObjectMeta {
            namespace: Some(namespace.to_string()),
            ..metadata(name)
        };

        vec![
            AnyResource::AccessToken(OAuthAccessToken {
                refresh_token: "sha256~refresh".to_string(),
                ..access_token()
            }),
            AnyResource::AuthorizeToken(OAuthAuthorizeToken {
                metadata: metadata("sha256~code"),
                client_name: "console".to_string(),
                expires_in: 300,
                scopes: vec!["user:info".to_string(), "role:view:default".to_string()],
                redirect_uri: "https://console.apps.example.com/auth/callback".to_string(),
                state: "xyzzy".to_string(),
                user_name: "alice".to_string(),
                user_uid: "u1".to_string(),
                code_challenge: "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM".to_string(),
                code_challenge_method: "S256".to_string(),
            }),
            AnyResource::Client(OAuthClient {
                access_token_inactivity_timeout_seconds: Some(600),
                ..client()
            }),
            AnyResource::ClientAuthorization(OAuthClientAuthorization {
                metadata: metadata("alice:console"),
                ..OAuthClientAuthorization::new("alice", "u1", "console", &["user:info".to_string(), "user:check-access".to_string()])
            }),
            AnyResource::RedirectReference(OAuthRedirectReference {
                metadata: namespaced("monitoring", "grafana"),
                reference: RedirectReference {
                    group: "route.openshift.io".to_string(),
                    kind: "Route".to_string(),
                    name: "grafana".to_string(),
                },
            }),
            AnyResource::TokenReview(OAuthTokenReview {
                metadata: metadata("review"),
                spec: TokenReviewSpec {
                    token: "sha256~abc".to_string(),
                    audiences: vec!["https://kubernetes.default.svc".to_string()],
                },
                status: TokenReviewStatus {
                    authenticated: true,
                    user: UserInfo {
                        username: "alice".to_string(),
                        uid: "u1".to_string(),
                        groups: vec!["system:authenticated:oauth".to_string()],
                        extra: BTreeMap::from([(
                            "scopes.authorization.openshift.io".to_string(),
                            ExtraValue(vec!["user:info".to_string()]),
                        )]),
                    },
                    audiences: vec!["https://kubernetes.default.svc".to_string()],
                    error: "backend unavailable".to_string(),
                },
            }),
            AnyResource::User(User {
                metadata: metadata("alice"),
                full_name: Some("Alice".to_string()),
                groups: vec!["admins".to_string()],
            }),
            AnyResource::Route(Route {
                metadata: namespaced("monitoring", "grafana"),
                spec: RouteSpec {
                    host: "grafana.apps.example.com".to_string(),
                    path: "/login".to_string(),
                    tls: Some(TlsConfig {
                        termination: "edge".to_string(),
                    }),
                },
            }),
        ]
    }

    #[test]
    fn every_kind_round_trips() -> Result<()> {
        for encoding in [StorageEncoding::Protobuf, StorageEncoding::Json] {
            for resource in every_kind() {
                let decoded = decode_any(&encode_any(&resource, encoding)?)?;
                assert_eq!(decoded, resource, "{} as {}", resource.kind(), encoding);
            }
        }
        Ok(())
    }

    #[test]
    fn kinds_without_protobuf_fall_back_to_json() -> Result<()> {
        let user = User {
            metadata: metadata("alice"),
            full_name: Some("Alice".to_string()),
            groups: vec!["admins".to_string()],
        };

        let encoded = encode(&user, StorageEncoding::Protobuf)?;
        assert!(!is_protobuf(&encoded));
        assert_eq!(decode::<User>(&encoded)?, user);
        Ok(())
    }

    #[test]
    fn wrong_kind_is_rejected() -> Result<()> {
        let encoded = encode(&access_token(), StorageEncoding::Protobuf)?;
        assert!(decode::<OAuthAuthorizeToken>(&encoded).is_err());

        let encoded = encode(&access_token(), StorageEncoding::Json)?;
        assert!(decode::<OAuthClient>(&encoded).is_err());
        Ok(())
    }

    #[test]
    fn yaml_documents() -> Result<()> {
        let document = br#"
apiVersion: oauth.openshift.io/v1
kind: OAuthClient
metadata:
  name: grafana
grantMethod: auto
redirectURIs:
  - https://grafana.apps.example.com/login
scopeRestrictions:
  - literals: ["user:info"]
"#;

        let AnyResource::Client(client) = decode_document(document)? else {
            panic!("expected a client");
        };

        assert_eq!(client.metadata.name, "grafana");
        assert_eq!(client.grant_method, Some(GrantMethod::Auto));
        assert_eq!(client.scope_restrictions, vec![ScopeRestriction::ExactValues(vec!["user:info".to_string()])]);

        let any = AnyResource::Client(client);
        assert_eq!(any.kind(), "OAuthClient");
        assert_eq!(any.name(), "grafana");
        assert_eq!(decode_any(&encode_any(&any, StorageEncoding::Protobuf)?)?, any);
        Ok(())
    }

    #[test]
    fn unknown_kind() {
        assert!(decode_document(b"kind: ConfigMap\napiVersion: v1\n").is_err());
        assert!(decode_document(b"metadata: {}\n").is_err());
    }
}
