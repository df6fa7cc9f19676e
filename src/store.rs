use crate::{
    api::Resource,
    etcd_encoding::{self, StorageEncoding},
};
use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;

mod etcd;
mod location;
mod memory;
mod retry;

pub(crate) use etcd::EtcdStore;
pub(crate) use location::{etcd_key, etcd_prefix};
pub(crate) use memory::InMemoryStore;
pub(crate) use retry::{update_with_retry, upsert_with_retry};

#[derive(Debug, thiserror::Error)]
pub(crate) enum StoreError {
    #[error("{kind} {name:?} not found")]
    NotFound { kind: String, name: String },

    #[error("{kind} {name:?} already exists")]
    AlreadyExists { kind: String, name: String },

    #[error("{kind} {name:?} was modified concurrently")]
    Conflict { kind: String, name: String },

    #[error("{kind} {name:?} does not fit the scope of its kind, namespaced: {namespaced}")]
    WrongScope { kind: String, name: String, namespaced: bool },

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl StoreError {
    fn not_found<R: Resource>(key: &ObjectKey) -> Self {
        Self::NotFound {
            kind: R::KIND.to_string(),
            name: key.to_string(),
        }
    }

    fn already_exists<R: Resource>(key: &ObjectKey) -> Self {
        Self::AlreadyExists {
            kind: R::KIND.to_string(),
            name: key.to_string(),
        }
    }

    fn conflict<R: Resource>(key: &ObjectKey) -> Self {
        Self::Conflict {
            kind: R::KIND.to_string(),
            name: key.to_string(),
        }
    }
}

/// Identifies one object of a given kind
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct ObjectKey {
    pub(crate) namespace: Option<String>,
    pub(crate) name: String,
}

impl ObjectKey {
    pub(crate) fn cluster(name: &str) -> Self {
        Self {
            namespace: None,
            name: name.to_string(),
        }
    }

    pub(crate) fn namespaced(namespace: &str, name: &str) -> Self {
        Self {
            namespace: Some(namespace.to_string()),
            name: name.to_string(),
        }
    }

    pub(crate) fn of<R: Resource>(resource: &R) -> Self {
        Self {
            namespace: resource.metadata().namespace.clone(),
            name: resource.metadata().name.clone(),
        }
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{}/{}", namespace, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// An encoded value as the backend holds it, along with the revision it was last modified at
#[derive(Debug, Clone)]
pub(crate) struct RawObject {
    pub(crate) key: String,
    pub(crate) value: Vec<u8>,
    pub(crate) revision: i64,
}

/// The object store the OAuth kinds live in. Backends only move encoded bytes around under
/// revision checks, identity and versioning on top of that are shared.
///
/// The resource version of an object is the backend revision of its last write. It is never part
/// of the encoded value, it gets filled in on every read.
#[async_trait]
pub(crate) trait ObjectStore: Send + Sync {
    fn encoding(&self) -> StorageEncoding;

    async fn read_raw(&self, key: &str) -> anyhow::Result<Option<RawObject>>;

    async fn list_raw(&self, prefix: &str) -> anyhow::Result<Vec<RawObject>>;

    /// None when the key already exists
    async fn create_raw(&self, key: &str, value: Vec<u8>) -> anyhow::Result<Option<i64>>;

    /// None when the key is missing or was modified after `revision`
    async fn update_raw(&self, key: &str, revision: i64, value: Vec<u8>) -> anyhow::Result<Option<i64>>;

    /// false when the key is missing or, with a revision given, was modified after it
    async fn delete_raw(&self, key: &str, revision: Option<i64>) -> anyhow::Result<bool>;

    async fn get<R: Resource>(&self, key: &ObjectKey) -> Result<R, StoreError> {
        let raw = self
            .read_raw(&etcd_key::<R>(key))
            .await?
            .ok_or_else(|| StoreError::not_found::<R>(key))?;

        from_raw(&raw).map_err(StoreError::from)
    }

    /// Every object of the kind, restricted to one namespace when given
    async fn list<R: Resource>(&self, namespace: Option<&str>) -> Result<Vec<R>, StoreError> {
        self.list_raw(&etcd_prefix::<R>(namespace))
            .await?
            .iter()
            .map(|raw| from_raw(raw).map_err(StoreError::from))
            .collect()
    }

    /// Stores a new object. A missing UID or creation timestamp is assigned here, objects loaded
    /// from elsewhere keep theirs.
    async fn create<R: Resource>(&self, mut resource: R) -> Result<R, StoreError> {
        let key = ObjectKey::of(&resource);
        if key.namespace.is_some() != R::NAMESPACED {
            return Err(StoreError::WrongScope {
                kind: R::KIND.to_string(),
                name: key.to_string(),
                namespaced: R::NAMESPACED,
            });
        }

        let metadata = resource.metadata_mut();
        if metadata.uid.is_empty() {
            metadata.uid = uuid::Uuid::new_v4().to_string();
        }
        if metadata.creation_timestamp.is_none() {
            metadata.creation_timestamp = Some(Utc::now());
        }
        metadata.resource_version.clear();

        let value = etcd_encoding::encode(&resource, self.encoding())?;
        let revision = self
            .create_raw(&etcd_key::<R>(&key), value)
            .await?
            .ok_or_else(|| StoreError::already_exists::<R>(&key))?;

        resource.metadata_mut().resource_version = revision.to_string();
        Ok(resource)
    }

    /// Compare-and-swap on the resource version the object was read at
    async fn update<R: Resource>(&self, mut resource: R) -> Result<R, StoreError> {
        let key = ObjectKey::of(&resource);
        let etcd_key = etcd_key::<R>(&key);
        let revision = parse_resource_version(&resource.metadata().resource_version)?;

        resource.metadata_mut().resource_version.clear();
        let value = etcd_encoding::encode(&resource, self.encoding())?;

        match self.update_raw(&etcd_key, revision, value).await? {
            Some(revision) => {
                resource.metadata_mut().resource_version = revision.to_string();
                Ok(resource)
            }
            None => Err(missing_or_conflict::<Self, R>(self, &etcd_key, &key).await),
        }
    }

    /// Deletes an object, only if it is still at `resource_version` when one is given
    async fn delete<R: Resource>(&self, key: &ObjectKey, resource_version: Option<&str>) -> Result<(), StoreError> {
        let etcd_key = etcd_key::<R>(key);
        let revision = resource_version.map(parse_resource_version).transpose()?;

        if self.delete_raw(&etcd_key, revision).await? {
            Ok(())
        } else {
            Err(missing_or_conflict::<Self, R>(self, &etcd_key, key).await)
        }
    }
}

/// Tells apart the two reasons a guarded write can fail
async fn missing_or_conflict<S: ObjectStore + ?Sized, R: Resource>(store: &S, etcd_key: &str, key: &ObjectKey) -> StoreError {
    match store.read_raw(etcd_key).await {
        Ok(Some(_)) => StoreError::conflict::<R>(key),
        Ok(None) => StoreError::not_found::<R>(key),
        Err(err) => StoreError::Backend(err),
    }
}

fn from_raw<R: Resource>(raw: &RawObject) -> anyhow::Result<R> {
    let mut resource: R = etcd_encoding::decode(&raw.value).context(format!("decoding {}", raw.key))?;
    resource.metadata_mut().resource_version = raw.revision.to_string();
    Ok(resource)
}

fn parse_resource_version(resource_version: &str) -> Result<i64, StoreError> {
    resource_version
        .parse::<i64>()
        .context(format!("invalid resourceVersion {:?}", resource_version))
        .map_err(StoreError::from)
}
