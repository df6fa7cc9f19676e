use crate::api;
use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use std::collections::BTreeMap;

/// metav1.Time
#[derive(Clone, PartialEq, ::prost::Message)]
pub(crate) struct Time {
    #[prost(int64, optional, tag = "1")]
    pub(crate) seconds: Option<i64>,
    #[prost(int32, optional, tag = "2")]
    pub(crate) nanos: Option<i32>,
}

/// metav1.ObjectMeta, restricted to the fields the OAuth kinds use. Tags are those of the full
/// message so the encoding stays compatible.
#[derive(Clone, PartialEq, ::prost::Message)]
pub(crate) struct ObjectMeta {
    #[prost(string, optional, tag = "1")]
    pub(crate) name: Option<String>,
    #[prost(string, optional, tag = "3")]
    pub(crate) namespace: Option<String>,
    #[prost(string, optional, tag = "5")]
    pub(crate) uid: Option<String>,
    #[prost(string, optional, tag = "6")]
    pub(crate) resource_version: Option<String>,
    #[prost(message, optional, tag = "8")]
    pub(crate) creation_timestamp: Option<Time>,
    #[prost(btree_map = "string, string", tag = "11")]
    pub(crate) labels: BTreeMap<String, String>,
    #[prost(btree_map = "string, string", tag = "12")]
    pub(crate) annotations: BTreeMap<String, String>,
}

/// runtime.TypeMeta
#[derive(Clone, PartialEq, ::prost::Message)]
pub(crate) struct TypeMeta {
    #[prost(string, optional, tag = "1")]
    pub(crate) api_version: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub(crate) kind: Option<String>,
}

/// runtime.Unknown, the envelope every protobuf-encoded object is stored in
#[derive(Clone, PartialEq, ::prost::Message)]
pub(crate) struct Unknown {
    #[prost(message, optional, tag = "1")]
    pub(crate) type_meta: Option<TypeMeta>,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub(crate) raw: Option<Vec<u8>>,
    #[prost(string, optional, tag = "3")]
    pub(crate) content_encoding: Option<String>,
    #[prost(string, optional, tag = "4")]
    pub(crate) content_type: Option<String>,
}

impl From<&DateTime<Utc>> for Time {
    fn from(time: &DateTime<Utc>) -> Self {
        Self {
            seconds: Some(time.timestamp()),
            nanos: Some(time.timestamp_subsec_nanos() as i32),
        }
    }
}

impl TryFrom<Time> for DateTime<Utc> {
    type Error = anyhow::Error;

    fn try_from(time: Time) -> Result<Self> {
        let seconds = time.seconds.unwrap_or_default();
        let nanos = u32::try_from(time.nanos.unwrap_or_default()).context("negative nanos")?;
        Utc.timestamp_opt(seconds, nanos)
            .single()
            .context(format!("timestamp {}s {}ns out of range", seconds, nanos))
    }
}

impl From<&api::ObjectMeta> for ObjectMeta {
    fn from(meta: &api::ObjectMeta) -> Self {
        Self {
            name: Some(meta.name.clone()),
            namespace: meta.namespace.clone(),
            uid: Some(meta.uid.clone()),
            resource_version: Some(meta.resource_version.clone()),
            creation_timestamp: meta.creation_timestamp.as_ref().map(Time::from),
            labels: meta.labels.clone(),
            annotations: meta.annotations.clone(),
        }
    }
}

impl TryFrom<ObjectMeta> for api::ObjectMeta {
    type Error = anyhow::Error;

    fn try_from(meta: ObjectMeta) -> Result<Self> {
        Ok(Self {
            name: meta.name.unwrap_or_default(),
            namespace: meta.namespace,
            uid: meta.uid.unwrap_or_default(),
            resource_version: meta.resource_version.unwrap_or_default(),
            creation_timestamp: meta
                .creation_timestamp
                .map(DateTime::<Utc>::try_from)
                .transpose()
                .context("creationTimestamp")?,
            labels: meta.labels,
            annotations: meta.annotations,
        })
    }
}

/// Metadata is optional on the wire, an absent message decodes to empty metadata
pub(crate) fn metadata_from_wire(meta: Option<ObjectMeta>) -> Result<api::ObjectMeta> {
    meta.map(api::ObjectMeta::try_from)
        .transpose()
        .map(Option::unwrap_or_default)
}
