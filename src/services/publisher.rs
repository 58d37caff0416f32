//! Derivative publisher: stores the thumbnail under `media/<id>/<size>` and
//! builds the envelope that carries it back to the caller.

use crate::{
    errors::{PipelineError, PipelineResult},
    models::{
        envelope::ResponseEnvelope,
        payload::{DerivedObject, ImageClass, JPEG_CONTENT_TYPE, SVG_CONTENT_TYPE},
        reference::ObjectReference,
    },
    store::{Acl, ObjectStore, PutOptions},
};
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

pub const DEFAULT_CACHE_CONTROL: &str = "max-age=64800";
/// Tag the bucket lifecycle rules key on to expire derivatives.
pub const TEMPORARY_TAG: &str = "temp";

/// How derivatives are written.
#[derive(Debug, Clone)]
pub struct PublishPolicy {
    pub acl: Acl,
    pub cache_control: String,
    pub tagging: String,
    pub timeout: Duration,
}

impl Default for PublishPolicy {
    fn default() -> Self {
        Self {
            acl: Acl::PublicRead,
            cache_control: DEFAULT_CACHE_CONTROL.into(),
            tagging: TEMPORARY_TAG.into(),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    pub key: String,
    pub size_bytes: usize,
}

/// Write `derived` to the store. The caller decides whether a failure matters.
pub async fn publish(
    store: &dyn ObjectStore,
    bucket: &str,
    reference: &ObjectReference,
    derived: &DerivedObject,
    policy: &PublishPolicy,
) -> PipelineResult<PublishReceipt> {
    let key = reference.derived_key();
    let options = PutOptions {
        content_type: derived.content_type.clone(),
        acl: policy.acl,
        cache_control: Some(policy.cache_control.clone()),
        tagging: Some(policy.tagging.clone()),
    };

    debug!(bucket, key = %key, size = derived.bytes.len(), "putting derivative into store");
    match timeout(
        policy.timeout,
        store.put(bucket, &key, derived.bytes.clone(), &options),
    )
    .await
    {
        Ok(Ok(())) => Ok(PublishReceipt {
            key,
            size_bytes: derived.bytes.len(),
        }),
        Ok(Err(err)) => Err(PipelineError::Publish(err.to_string())),
        Err(_) => Err(PipelineError::Publish(format!(
            "timed out after {:?} writing `{}`",
            policy.timeout, key
        ))),
    }
}

/// The 200 envelope for a derivative: base64 JPEG for rasters, the SVG
/// text itself for vectors.
pub fn respond(derived: &DerivedObject, policy: &PublishPolicy) -> ResponseEnvelope {
    let envelope = match derived.class {
        ImageClass::Raster => ResponseEnvelope::binary(&derived.bytes, JPEG_CONTENT_TYPE),
        ImageClass::Vector => ResponseEnvelope::text(&derived.bytes, SVG_CONTENT_TYPE),
    };
    envelope.with_header("Cache-Control", policy.cache_control.as_str())
}
