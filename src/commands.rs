use crate::{
    api::{OAuthClientAuthorization, OAuthTokenReview, TokenReviewSpec},
    authorization::{
        scope_allowed, validate_object_name, AuthorizationServer, AuthorizeOutcome, AuthorizeRequest, ExchangeRequest,
        RoleScopeGrammar,
    },
    config::{Command, OAuthModelConfig},
    error::OAuthError,
    etcd_encoding::{self, AnyResource, StorageEncoding},
    store::{EtcdStore, InMemoryStore, ObjectStore},
};
use anyhow::{bail, ensure, Context, Result};
use clio::ClioPath;
use std::{path::Path, sync::Arc};

pub(crate) async fn run(config: &OAuthModelConfig) -> Result<()> {
    match &config.command {
        Command::Validate { files } => validate(files),
        Command::Scopes { client, scopes } => print_scopes(client, scopes),
        Command::Encode { file } => encode(file, config.storage_encoding),
        Command::Decode { file } => decode(file),
        command => match &config.etcd_endpoint {
            Some(etcd_endpoint) => {
                let store = EtcdStore::connect(etcd_endpoint, config.storage_encoding)
                    .await
                    .context("connecting to etcd")?;
                run_against_store(config, command, store).await
            }
            None => {
                let store = seeded_store(&config.seed_files, config.storage_encoding)
                    .await
                    .context("seeding in-memory store")?;
                run_against_store(config, command, store).await
            }
        },
    }
}

fn read_document(path: &Path) -> Result<AnyResource> {
    let data = std::fs::read(path).context(format!("reading {}", path.display()))?;
    etcd_encoding::decode_document(&data).context(format!("decoding {}", path.display()))
}

fn print_yaml<T: serde::Serialize>(value: &T) -> Result<()> {
    print!("{}", serde_yaml::to_string(value).context("serializing yaml")?);
    Ok(())
}

/// Configuration errors of a single document
pub(crate) fn check_document(resource: &AnyResource) -> Result<(), OAuthError> {
    match resource {
        AnyResource::Client(client) => client.validate(),
        AnyResource::AccessToken(access_token) => validate_object_name(&access_token.metadata.name),
        AnyResource::AuthorizeToken(authorize_token) => validate_object_name(&authorize_token.metadata.name),
        AnyResource::ClientAuthorization(authorization) => {
            let expected = OAuthClientAuthorization::name_for(&authorization.user_name, &authorization.client_name);
            if authorization.metadata.name != expected {
                return Err(OAuthError::invalid_configuration(format!(
                    "OAuthClientAuthorization must be named {:?}",
                    expected
                )));
            }
            Ok(())
        }
        AnyResource::RedirectReference(_) | AnyResource::TokenReview(_) | AnyResource::User(_) | AnyResource::Route(_) => Ok(()),
    }
}

fn validate(files: &[ClioPath]) -> Result<()> {
    let mut failed = 0;

    for file in files {
        let outcome = read_document(file.path()).and_then(|resource| {
            check_document(&resource)?;
            Ok(resource)
        });

        match outcome {
            Ok(resource) => println!("{}: {} {} is valid", file, resource.kind(), resource.name()),
            Err(err) => {
                failed += 1;
                println!("{}: {:#}", file, err);
            }
        }
    }

    ensure!(failed == 0, "{} of {} documents are invalid", failed, files.len());
    Ok(())
}

/// Whether each scope is allowed by the scope restrictions of the client in `client`
pub(crate) fn scope_report(client: &AnyResource, scopes: &[String]) -> Result<Vec<(String, bool)>> {
    let AnyResource::Client(client) = client else {
        bail!("expected an OAuthClient, got a {}", client.kind());
    };

    Ok(scopes
        .iter()
        .map(|scope| {
            (
                scope.clone(),
                scope_allowed(&client.scope_restrictions, scope, &RoleScopeGrammar),
            )
        })
        .collect())
}

fn print_scopes(client: &ClioPath, scopes: &[String]) -> Result<()> {
    let report = scope_report(&read_document(client.path())?, scopes)?;

    for (scope, allowed) in &report {
        println!("{}: {}", scope, if *allowed { "allowed" } else { "denied" });
    }

    ensure!(
        report.iter().all(|(_, allowed)| *allowed),
        "some scopes are denied"
    );
    Ok(())
}

fn encode(file: &ClioPath, encoding: StorageEncoding) -> Result<()> {
    let encoded = etcd_encoding::encode_any(&read_document(file.path())?, encoding)?;

    if etcd_encoding::is_protobuf(&encoded) {
        println!("{}", hex::encode(encoded));
    } else {
        println!("{}", String::from_utf8(encoded).context("json is not utf-8")?);
    }

    Ok(())
}

/// Raw protobuf or JSON values pass through, anything else is taken as hex
pub(crate) fn decode_stored_value(data: Vec<u8>) -> Result<AnyResource> {
    let looks_like_json = data.iter().find(|byte| !byte.is_ascii_whitespace()) == Some(&b'{');

    let data = if etcd_encoding::is_protobuf(&data) || looks_like_json {
        data
    } else {
        hex::decode(String::from_utf8_lossy(&data).trim()).context("value is neither protobuf, json nor hex")?
    };

    etcd_encoding::decode_any(&data)
}

fn decode(file: &ClioPath) -> Result<()> {
    let data = std::fs::read(file.path()).context(format!("reading {}", file))?;
    print_yaml(&decode_stored_value(data)?.to_json()?)
}

async fn create_any<S: ObjectStore>(store: &S, resource: AnyResource) -> Result<()> {
    match resource {
        AnyResource::AccessToken(resource) => store.create(resource).await.map(drop),
        AnyResource::AuthorizeToken(resource) => store.create(resource).await.map(drop),
        AnyResource::Client(resource) => store.create(resource).await.map(drop),
        AnyResource::ClientAuthorization(resource) => store.create(resource).await.map(drop),
        AnyResource::RedirectReference(resource) => store.create(resource).await.map(drop),
        AnyResource::User(resource) => store.create(resource).await.map(drop),
        AnyResource::Route(resource) => store.create(resource).await.map(drop),
        AnyResource::TokenReview(_) => bail!("OAuthTokenReview is never stored"),
    }
    .context("creating object")
}

pub(crate) async fn seeded_store<P: AsRef<Path>>(seed_files: &[P], encoding: StorageEncoding) -> Result<InMemoryStore> {
    let store = InMemoryStore::new(encoding);

    for seed_file in seed_files {
        let seed_file = seed_file.as_ref();
        let resource = read_document(seed_file)?;

        log::info!("seeding {} {} from {}", resource.kind(), resource.name(), seed_file.display());
        create_any(&store, resource)
            .await
            .context(format!("seeding {}", seed_file.display()))?;
    }

    Ok(store)
}

async fn run_against_store<S: ObjectStore>(config: &OAuthModelConfig, command: &Command, store: S) -> Result<()> {
    let server = AuthorizationServer::new(Arc::new(store), config.server.clone());

    match command {
        Command::Authorize {
            client,
            user,
            redirect_uri,
            scopes,
            state,
            code_challenge,
            code_challenge_method,
            approve,
        } => {
            let request = AuthorizeRequest {
                client_id: client.clone(),
                user_name: user.clone(),
                redirect_uri: redirect_uri.clone(),
                scopes: scopes.clone(),
                state: state.clone(),
                code_challenge: code_challenge.clone(),
                code_challenge_method: code_challenge_method.clone(),
            };

            let issued = match server.authorize(&request).await? {
                AuthorizeOutcome::Issued(issued) => issued,
                AuthorizeOutcome::ConsentRequired { client_name, scopes } if !approve => {
                    bail!(
                        "user {} has to consent to client {} getting scopes {:?}, pass --approve to consent",
                        user,
                        client_name,
                        scopes
                    )
                }
                AuthorizeOutcome::ConsentRequired { .. } => server.complete_consent(&request, true).await?,
            };

            println!("{}", issued.code);
        }
        Command::Exchange {
            client,
            client_secret,
            code,
            redirect_uri,
            code_verifier,
        } => {
            let issued = server
                .exchange_code(&ExchangeRequest {
                    client_id: client.clone(),
                    client_secret: client_secret.clone(),
                    code: code.clone(),
                    redirect_uri: redirect_uri.clone(),
                    code_verifier: code_verifier.clone(),
                })
                .await?;

            println!("{}", issued.token);
        }
        Command::Check { token } => {
            let access_token = server.check_access_token(token).await?;
            print_yaml(&AnyResource::AccessToken(access_token).to_json()?)?;
        }
        Command::Review { token, audiences } => {
            let reviewed = server
                .review_token(OAuthTokenReview {
                    spec: TokenReviewSpec {
                        token: token.clone(),
                        audiences: audiences.clone(),
                    },
                    ..Default::default()
                })
                .await;

            print_yaml(&AnyResource::TokenReview(reviewed).to_json()?)?;
        }
        Command::Tokens { user } => {
            for access_token in server.user_tokens(user).await? {
                print_yaml(&AnyResource::AccessToken(access_token).to_json()?)?;
                println!("---");
            }
        }
        Command::Prune { dry_run } => print_yaml(&server.prune_expired(*dry_run).await?)?,
        Command::Validate { .. } | Command::Scopes { .. } | Command::Encode { .. } | Command::Decode { .. } => {
            bail!("command does not need a store")
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::{OAuthAccessToken, OAuthClient, User},
        store::ObjectKey,
    };
    use std::io::Write;

    fn document(contents: &str) -> Result<tempfile::NamedTempFile> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(contents.as_bytes())?;
        Ok(file)
    }

    const CLIENT: &str = r#"
apiVersion: oauth.openshift.io/v1
kind: OAuthClient
metadata:
  name: console
secret: s3cret
redirectURIs:
  - https://console.apps.example.com/auth/callback
grantMethod: auto
scopeRestrictions:
  - literals: ["user:info"]
  - clusterRole:
      roleNames: ["*"]
      namespaces: ["default"]
      allowEscalation: false
"#;

    const USER: &str = r#"
apiVersion: user.openshift.io/v1
kind: User
metadata:
  name: alice
  uid: u1
groups: ["developers"]
"#;

    #[tokio::test]
    async fn seeding() -> Result<()> {
        let client = document(CLIENT)?;
        let user = document(USER)?;

        let store = seeded_store(&[client.path(), user.path()], StorageEncoding::Protobuf).await?;

        let console: OAuthClient = store.get(&ObjectKey::cluster("console")).await?;
        assert_eq!(console.secret, "s3cret");
        assert!(!console.metadata.uid.is_empty());

        let alice: User = store.get(&ObjectKey::cluster("alice")).await?;
        assert_eq!(alice.metadata.uid, "u1");
        Ok(())
    }

    #[tokio::test]
    async fn seeding_rejects_duplicates_and_reviews() -> Result<()> {
        let user = document(USER)?;
        assert!(seeded_store(&[user.path(), user.path()], StorageEncoding::Json).await.is_err());

        let review = document("apiVersion: oauth.openshift.io/v1\nkind: OAuthTokenReview\nspec:\n  token: sha256~abc\n")?;
        assert!(seeded_store(&[review.path()], StorageEncoding::Json).await.is_err());
        Ok(())
    }

    #[test]
    fn scopes_of_a_client() -> Result<()> {
        let client = etcd_encoding::decode_document(CLIENT.as_bytes())?;

        assert_eq!(
            scope_report(
                &client,
                &[
                    "user:info".to_string(),
                    "role:edit:default".to_string(),
                    "role:edit:default:!".to_string(),
                    "role:edit:kube-system".to_string(),
                ]
            )?,
            vec![
                ("user:info".to_string(), true),
                ("role:edit:default".to_string(), true),
                ("role:edit:default:!".to_string(), false),
                ("role:edit:kube-system".to_string(), false),
            ]
        );

        assert!(scope_report(&etcd_encoding::decode_document(USER.as_bytes())?, &[]).is_err());
        Ok(())
    }

    #[test]
    fn document_checks() -> Result<()> {
        assert_eq!(check_document(&etcd_encoding::decode_document(CLIENT.as_bytes())?), Ok(()));
        assert_eq!(check_document(&etcd_encoding::decode_document(USER.as_bytes())?), Ok(()));

        let no_grant_method = CLIENT.replace("grantMethod: auto\n", "");
        assert!(matches!(
            check_document(&etcd_encoding::decode_document(no_grant_method.as_bytes())?),
            Err(OAuthError::InvalidConfiguration(_))
        ));

        let badly_named_token = AnyResource::AccessToken(OAuthAccessToken {
            metadata: crate::api::ObjectMeta::named("plaintext-token"),
            ..Default::default()
        });
        assert!(check_document(&badly_named_token).is_err());

        let mut authorization = OAuthClientAuthorization::new("alice", "u1", "console", &["user:info".to_string()]);
        assert_eq!(
            check_document(&AnyResource::ClientAuthorization(authorization.clone())),
            Ok(())
        );
        authorization.metadata.name = "console:alice".to_string();
        assert!(check_document(&AnyResource::ClientAuthorization(authorization)).is_err());
        Ok(())
    }

    #[test]
    fn stored_values_in_any_form() -> Result<()> {
        let client = etcd_encoding::decode_document(CLIENT.as_bytes())?;

        let protobuf = etcd_encoding::encode_any(&client, StorageEncoding::Protobuf)?;
        assert_eq!(decode_stored_value(protobuf.clone())?, client);
        assert_eq!(decode_stored_value(format!("{}\n", hex::encode(&protobuf)).into_bytes())?, client);

        let json = etcd_encoding::encode_any(&client, StorageEncoding::Json)?;
        assert_eq!(decode_stored_value(json)?, client);

        assert!(decode_stored_value(b"not hex at all".to_vec()).is_err());
        Ok(())
    }
}
