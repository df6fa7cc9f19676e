use super::{ObjectStore, RawObject};
use crate::etcd_encoding::StorageEncoding;
use anyhow::{Context, Result};
use async_trait::async_trait;
use etcd_client::{Client as EtcdClient, Compare, CompareOp, GetOptions, KeyValue, Txn, TxnOp, TxnResponse};
use tokio::sync::Mutex;

/// An object store backed by the cluster's etcd. Every guarded write is a single transaction
/// comparing the key's create or mod revision.
pub(crate) struct EtcdStore {
    encoding: StorageEncoding,
    etcd_client: Mutex<EtcdClient>,
}

impl EtcdStore {
    pub(crate) async fn connect(etcd_endpoint: &str, encoding: StorageEncoding) -> Result<Self> {
        let etcd_client = EtcdClient::connect([etcd_endpoint], None)
            .await
            .context(format!("connecting to etcd at {}", etcd_endpoint))?;

        Ok(Self {
            encoding,
            etcd_client: Mutex::new(etcd_client),
        })
    }

    async fn txn(&self, txn: Txn) -> Result<TxnResponse> {
        self.etcd_client.lock().await.txn(txn).await.context("running etcd transaction")
    }
}

fn raw_object(kv: &KeyValue) -> Result<RawObject> {
    Ok(RawObject {
        key: kv.key_str().context("non-utf8 etcd key")?.to_string(),
        value: kv.value().to_vec(),
        revision: kv.mod_revision(),
    })
}

fn written_revision(response: &TxnResponse) -> Result<Option<i64>> {
    if !response.succeeded() {
        return Ok(None);
    }

    Ok(Some(response.header().context("etcd response without header")?.revision()))
}

#[async_trait]
impl ObjectStore for EtcdStore {
    fn encoding(&self) -> StorageEncoding {
        self.encoding
    }

    async fn read_raw(&self, key: &str) -> Result<Option<RawObject>> {
        let response = self
            .etcd_client
            .lock()
            .await
            .get(key, None)
            .await
            .context(format!("getting {} from etcd", key))?;

        response.kvs().first().map(raw_object).transpose()
    }

    async fn list_raw(&self, prefix: &str) -> Result<Vec<RawObject>> {
        let response = self
            .etcd_client
            .lock()
            .await
            .get(prefix, Some(GetOptions::new().with_prefix()))
            .await
            .context(format!("listing {} from etcd", prefix))?;

        response.kvs().iter().map(raw_object).collect()
    }

    async fn create_raw(&self, key: &str, value: Vec<u8>) -> Result<Option<i64>> {
        let txn = Txn::new()
            .when(vec![Compare::create_revision(key, CompareOp::Equal, 0)])
            .and_then(vec![TxnOp::put(key, value, None)]);

        written_revision(&self.txn(txn).await.context(format!("creating {}", key))?)
    }

    async fn update_raw(&self, key: &str, revision: i64, value: Vec<u8>) -> Result<Option<i64>> {
        let txn = Txn::new()
            .when(vec![Compare::mod_revision(key, CompareOp::Equal, revision)])
            .and_then(vec![TxnOp::put(key, value, None)]);

        written_revision(&self.txn(txn).await.context(format!("updating {}", key))?)
    }

    async fn delete_raw(&self, key: &str, revision: Option<i64>) -> Result<bool> {
        let guard = match revision {
            Some(revision) => Compare::mod_revision(key, CompareOp::Equal, revision),
            None => Compare::create_revision(key, CompareOp::Greater, 0),
        };

        let txn = Txn::new().when(vec![guard]).and_then(vec![TxnOp::delete(key, None)]);

        Ok(self.txn(txn).await.context(format!("deleting {}", key))?.succeeded())
    }
}
