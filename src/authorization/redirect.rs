use crate::{
    api::{OAuthClient, OAuthRedirectReference, Route, REDIRECT_REFERENCE_ANNOTATION_PREFIX},
    store::{ObjectKey, ObjectStore},
};
use anyhow::{bail, Context, Result};

/// The redirect URIs a client may use right now: its static list followed by whatever its
/// redirect references currently resolve to. References that cannot be resolved are left out.
pub(crate) async fn permitted_redirect_uris<S: ObjectStore>(store: &S, client: &OAuthClient) -> Vec<String> {
    let mut permitted = client.redirect_uris.clone();

    for (annotation, value) in &client.metadata.annotations {
        let Some(reference_id) = annotation.strip_prefix(REDIRECT_REFERENCE_ANNOTATION_PREFIX) else {
            continue;
        };

        match resolve_reference(store, client, value).await {
            Ok(redirect_uri) => {
                log::debug!(
                    "client {} redirect reference {} resolved to {}",
                    client.metadata.name,
                    reference_id,
                    redirect_uri
                );
                permitted.push(redirect_uri);
            }
            Err(err) => log::warn!(
                "ignoring redirect reference {} of client {}: {:#}",
                reference_id,
                client.metadata.name,
                err
            ),
        }
    }

    permitted
}

async fn resolve_reference<S: ObjectStore>(store: &S, client: &OAuthClient, value: &str) -> Result<String> {
    let redirect_reference: OAuthRedirectReference = serde_json::from_str(value).context("parsing OAuthRedirectReference")?;
    let reference = &redirect_reference.reference;

    if !reference.is_route() {
        bail!("unsupported reference to {} {:?}", reference.kind, reference.group);
    }

    let namespace = redirect_reference
        .metadata
        .namespace
        .as_deref()
        .or(client.metadata.namespace.as_deref())
        .context("no namespace to look the route up in")?;

    let route: Route = store
        .get(&ObjectKey::namespaced(namespace, &reference.name))
        .await
        .context(format!("getting route {}/{}", namespace, reference.name))?;

    route
        .external_uri()
        .context(format!("route {}/{} has no host", namespace, reference.name))
}

/// Redirect URIs must match a permitted one exactly
pub(crate) fn redirect_uri_permitted(permitted: &[String], requested: &str) -> bool {
    permitted.iter().any(|redirect_uri| redirect_uri == requested)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::{ObjectMeta, RouteSpec, TlsConfig},
        etcd_encoding::StorageEncoding,
        store::InMemoryStore,
    };
    use serde_json::json;

    fn reference_annotation(namespace: Option<&str>, kind: &str, name: &str) -> String {
        let mut metadata = json!({});
        if let Some(namespace) = namespace {
            metadata["namespace"] = json!(namespace);
        }

        json!({
            "kind": "OAuthRedirectReference",
            "apiVersion": "v1",
            "metadata": metadata,
            "reference": { "group": "route.openshift.io", "kind": kind, "name": name },
        })
        .to_string()
    }

    async fn store_with_routes() -> anyhow::Result<InMemoryStore> {
        let store = InMemoryStore::new(StorageEncoding::Protobuf);

        store
            .create(Route {
                metadata: ObjectMeta::namespaced("monitoring", "grafana"),
                spec: RouteSpec {
                    host: "grafana.apps.example.com".to_string(),
                    path: "/login".to_string(),
                    tls: Some(TlsConfig {
                        termination: "edge".to_string(),
                    }),
                },
            })
            .await?;

        store
            .create(Route {
                metadata: ObjectMeta::namespaced("monitoring", "pending"),
                spec: RouteSpec::default(),
            })
            .await?;

        Ok(store)
    }

    #[tokio::test]
    async fn references_resolve_through_routes() -> anyhow::Result<()> {
        let store = store_with_routes().await?;

        let mut client = OAuthClient {
            metadata: ObjectMeta::named("system:serviceaccount:monitoring:grafana"),
            redirect_uris: vec!["https://static.example.com/callback".to_string()],
            ..Default::default()
        };
        client.metadata.annotations.insert(
            format!("{}first", REDIRECT_REFERENCE_ANNOTATION_PREFIX),
            reference_annotation(Some("monitoring"), "Route", "grafana"),
        );

        assert_eq!(
            permitted_redirect_uris(&store, &client).await,
            vec![
                "https://static.example.com/callback".to_string(),
                "https://grafana.apps.example.com/login".to_string(),
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn unresolvable_references_are_dropped() -> anyhow::Result<()> {
        let store = store_with_routes().await?;

        let mut client = OAuthClient {
            metadata: ObjectMeta::named("grafana"),
            ..Default::default()
        };
        for (id, value) in [
            ("missing", reference_annotation(Some("monitoring"), "Route", "gone")),
            ("no-host", reference_annotation(Some("monitoring"), "Route", "pending")),
            ("wrong-kind", reference_annotation(Some("monitoring"), "Ingress", "grafana")),
            ("no-namespace", reference_annotation(None, "Route", "grafana")),
            ("garbage", "{not json".to_string()),
        ] {
            client
                .metadata
                .annotations
                .insert(format!("{}{}", REDIRECT_REFERENCE_ANNOTATION_PREFIX, id), value);
        }
        client
            .metadata
            .annotations
            .insert("unrelated.example.com/annotation".to_string(), "x".to_string());

        assert!(permitted_redirect_uris(&store, &client).await.is_empty());
        Ok(())
    }

    #[test]
    fn exact_match_only() {
        let permitted = vec!["https://console.apps.example.com/auth/callback".to_string()];

        assert!(redirect_uri_permitted(&permitted, "https://console.apps.example.com/auth/callback"));
        assert!(!redirect_uri_permitted(&permitted, "https://console.apps.example.com/auth/callback/"));
        assert!(!redirect_uri_permitted(&permitted, "https://console.apps.example.com/auth"));
        assert!(!redirect_uri_permitted(&permitted, "https://console.apps.example.com/auth/callback?x=1"));
    }
}
