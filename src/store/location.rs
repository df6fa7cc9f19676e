use super::ObjectKey;
use crate::api::Resource;
use lazy_static::lazy_static;
use std::collections::HashMap;

lazy_static! {
    // The OAuth kinds are stored under oauth/ with the "OAuth" dropped from the resource name,
    // e.g. /openshift.io/oauth/clients/openshift-challenging-client
    static ref SINGULAR_PLURAL_MAP: HashMap<&'static str, &'static str> = {
        HashMap::from([
            ("oauthaccesstoken", "oauth/accesstokens"),
            ("oauthauthorizetoken", "oauth/authorizetokens"),
            ("oauthclient", "oauth/clients"),
            ("oauthclientauthorization", "oauth/clientauthorizations"),
            ("oauthredirectreference", "oauth/redirectreferences"),
            ("oauthtokenreview", "oauth/tokenreviews"),
        ])
    };
}

fn resource_root<R: Resource>() -> String {
    let is_openshift = R::API_VERSION.ends_with(".openshift.io/v1");
    let kind = R::KIND.to_lowercase();

    format!(
        "/{}/{}",
        if is_openshift { "openshift.io" } else { "kubernetes.io" },
        match SINGULAR_PLURAL_MAP.get(kind.as_str()) {
            Some(plural) => plural.to_string(),
            None => format!("{}s", kind),
        }
    )
}

pub(crate) fn etcd_key<R: Resource>(key: &ObjectKey) -> String {
    format!(
        "{}/{}{}",
        resource_root::<R>(),
        match &key.namespace {
            Some(namespace) => format!("{}/", namespace),
            None => "".to_string(),
        },
        key.name
    )
}

/// Prefix of every key of the kind, or of the kind within one namespace
pub(crate) fn etcd_prefix<R: Resource>(namespace: Option<&str>) -> String {
    match namespace {
        Some(namespace) => format!("{}/{}/", resource_root::<R>(), namespace),
        None => format!("{}/", resource_root::<R>()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{OAuthAccessToken, OAuthClient, OAuthClientAuthorization, Route, User};

    #[test]
    fn cluster_layout() {
        assert_eq!(
            etcd_key::<OAuthAccessToken>(&ObjectKey::cluster("sha256~abc")),
            "/openshift.io/oauth/accesstokens/sha256~abc"
        );
        assert_eq!(
            etcd_key::<OAuthClient>(&ObjectKey::cluster("openshift-challenging-client")),
            "/openshift.io/oauth/clients/openshift-challenging-client"
        );
        assert_eq!(
            etcd_key::<OAuthClientAuthorization>(&ObjectKey::cluster("alice:console")),
            "/openshift.io/oauth/clientauthorizations/alice:console"
        );
        assert_eq!(etcd_key::<User>(&ObjectKey::cluster("alice")), "/openshift.io/users/alice");
        assert_eq!(
            etcd_key::<Route>(&ObjectKey::namespaced("monitoring", "grafana")),
            "/openshift.io/routes/monitoring/grafana"
        );
    }

    #[test]
    fn prefixes() {
        assert_eq!(etcd_prefix::<OAuthAccessToken>(None), "/openshift.io/oauth/accesstokens/");
        assert_eq!(etcd_prefix::<Route>(Some("monitoring")), "/openshift.io/routes/monitoring/");
    }
}
