use super::{ObjectStore, RawObject};
use crate::etcd_encoding::StorageEncoding;
use anyhow::Result;
use async_trait::async_trait;
use itertools::Itertools;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// An object store held entirely in memory, with etcd-like revisions. Values are kept encoded
/// exactly as they would be in etcd.
pub(crate) struct InMemoryStore {
    encoding: StorageEncoding,
    internal: Mutex<InMemoryStoreInternal>,
}

#[derive(Default)]
struct InMemoryStoreInternal {
    /// The revision of the most recent write, shared by all keys
    revision: i64,
    objects: HashMap<String, (Vec<u8>, i64)>,
}

impl InMemoryStoreInternal {
    fn next_revision(&mut self) -> i64 {
        self.revision += 1;
        self.revision
    }
}

impl InMemoryStore {
    pub(crate) fn new(encoding: StorageEncoding) -> Self {
        Self {
            encoding,
            internal: Mutex::new(InMemoryStoreInternal::default()),
        }
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    fn encoding(&self) -> StorageEncoding {
        self.encoding
    }

    async fn read_raw(&self, key: &str) -> Result<Option<RawObject>> {
        Ok(self.internal.lock().await.objects.get(key).map(|(value, revision)| RawObject {
            key: key.to_string(),
            value: value.clone(),
            revision: *revision,
        }))
    }

    async fn list_raw(&self, prefix: &str) -> Result<Vec<RawObject>> {
        Ok(self
            .internal
            .lock()
            .await
            .objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .sorted_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(key, (value, revision))| RawObject {
                key: key.clone(),
                value: value.clone(),
                revision: *revision,
            })
            .collect())
    }

    async fn create_raw(&self, key: &str, value: Vec<u8>) -> Result<Option<i64>> {
        let mut internal = self.internal.lock().await;
        if internal.objects.contains_key(key) {
            return Ok(None);
        }

        let revision = internal.next_revision();
        internal.objects.insert(key.to_string(), (value, revision));
        Ok(Some(revision))
    }

    async fn update_raw(&self, key: &str, revision: i64, value: Vec<u8>) -> Result<Option<i64>> {
        let mut internal = self.internal.lock().await;
        match internal.objects.get(key) {
            Some((_, current)) if *current == revision => {}
            _ => return Ok(None),
        }

        let new_revision = internal.next_revision();
        internal.objects.insert(key.to_string(), (value, new_revision));
        Ok(Some(new_revision))
    }

    async fn delete_raw(&self, key: &str, revision: Option<i64>) -> Result<bool> {
        let mut internal = self.internal.lock().await;
        match (internal.objects.get(key), revision) {
            (None, _) => return Ok(false),
            (Some((_, current)), Some(revision)) if *current != revision => return Ok(false),
            _ => {}
        }

        internal.next_revision();
        internal.objects.remove(key);
        Ok(true)
    }
}
