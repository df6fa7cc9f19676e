use super::{ObjectKey, ObjectStore, StoreError};
use crate::api::Resource;
use std::time::Duration;

/// 10ms, 20ms, 40ms, ...
fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(10 * (1 << attempt.min(10)))
}

/// Read-modify-write of an existing object, re-reading and re-applying `mutate` whenever a
/// concurrent writer got there first. Gives up with the last conflict after `attempts` tries.
pub(crate) async fn update_with_retry<S, R, F>(store: &S, key: &ObjectKey, attempts: u32, mut mutate: F) -> Result<R, StoreError>
where
    S: ObjectStore,
    R: Resource,
    F: FnMut(&mut R) + Send,
{
    let mut attempt = 0;
    loop {
        let mut resource: R = store.get(key).await?;
        mutate(&mut resource);

        match store.update(resource).await {
            Err(StoreError::Conflict { .. }) if attempt + 1 < attempts => {
                log::warn!(
                    "conflict updating {} {}, retrying (attempt {}/{})",
                    R::KIND,
                    key,
                    attempt + 1,
                    attempts
                );
                tokio::time::sleep(backoff(attempt)).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}

/// Like [`update_with_retry`], but creates the object with `create` when it does not exist yet. A
/// concurrent create counts as a conflict.
pub(crate) async fn upsert_with_retry<S, R, C, F>(
    store: &S,
    key: &ObjectKey,
    attempts: u32,
    create: C,
    mut mutate: F,
) -> Result<R, StoreError>
where
    S: ObjectStore,
    R: Resource,
    C: Fn() -> R + Send,
    F: FnMut(&mut R) + Send,
{
    let mut attempt = 0;
    loop {
        let result = match store.get::<R>(key).await {
            Ok(mut resource) => {
                mutate(&mut resource);
                store.update(resource).await
            }
            Err(StoreError::NotFound { .. }) => store.create(create()).await,
            Err(err) => return Err(err),
        };

        match result {
            Err(StoreError::Conflict { .. } | StoreError::AlreadyExists { .. }) if attempt + 1 < attempts => {
                log::warn!(
                    "conflict upserting {} {}, retrying (attempt {}/{})",
                    R::KIND,
                    key,
                    attempt + 1,
                    attempts
                );
                tokio::time::sleep(backoff(attempt)).await;
                attempt += 1;
            }
            Err(StoreError::AlreadyExists { kind, name }) => return Err(StoreError::Conflict { kind, name }),
            result => return result,
        }
    }
}
