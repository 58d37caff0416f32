//! Origin fetcher: reads `media/<id>` into memory, bounded by a byte cap and
//! a timeout.

use crate::{
    errors::{FetchErrorKind, PipelineError, PipelineResult},
    models::{payload::OriginObject, reference::ObjectReference},
    services::diagnostics::Diagnostics,
    store::{ObjectBody, ObjectStore, StoreError},
};
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone, Copy)]
pub struct FetchLimits {
    pub max_bytes: u64,
    pub timeout: Duration,
}

/// Retrieve the origin for `reference`.
///
/// Objects larger than `limits.max_bytes` are rejected, whether the store
/// declares the size up front or it only shows while reading the body.
pub async fn fetch(
    store: &dyn ObjectStore,
    bucket: &str,
    reference: &ObjectReference,
    limits: FetchLimits,
    diag: &mut Diagnostics,
) -> PipelineResult<OriginObject> {
    let key = reference.origin_key();
    debug!(bucket, key = %key, "getting object from store");

    let origin = match timeout(limits.timeout, read_origin(store, bucket, &key, limits.max_bytes))
        .await
    {
        Ok(result) => result?,
        Err(_) => {
            return Err(PipelineError::fetch(
                FetchErrorKind::Timeout,
                format!("timed out after {:?} reading `{}`", limits.timeout, key),
            ));
        }
    };

    debug!(
        content_type = %origin.content_type,
        received_content_size = origin.content_length,
        "origin received"
    );
    diag.record("received_content_size", origin.content_length);
    diag.record("content_type", origin.content_type.as_str());
    Ok(origin)
}

async fn read_origin(
    store: &dyn ObjectStore,
    bucket: &str,
    key: &str,
    max_bytes: u64,
) -> PipelineResult<OriginObject> {
    let object = store.get(bucket, key).await.map_err(store_failure)?;

    if let Some(declared) = object.content_length {
        if declared > max_bytes {
            return Err(too_large(declared, max_bytes));
        }
    }

    let capacity = object.content_length.unwrap_or(0).min(max_bytes) as usize;
    let bytes = collect_capped(object.body, max_bytes, capacity).await?;

    Ok(OriginObject {
        content_length: bytes.len() as u64,
        bytes,
        content_type: object
            .content_type
            .filter(|ct| !ct.trim().is_empty())
            .unwrap_or_else(|| FALLBACK_CONTENT_TYPE.to_string()),
    })
}

/// Drain `body` into one buffer, failing as soon as it would exceed `max_bytes`.
async fn collect_capped(mut body: ObjectBody, max_bytes: u64, capacity: usize) -> PipelineResult<Bytes> {
    let mut buf = BytesMut::with_capacity(capacity);
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|err| {
            PipelineError::fetch(FetchErrorKind::Store, format!("reading object body: {}", err))
        })?;
        let total = (buf.len() + chunk.len()) as u64;
        if total > max_bytes {
            return Err(too_large(total, max_bytes));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}

fn too_large(seen: u64, max_bytes: u64) -> PipelineError {
    PipelineError::fetch(
        FetchErrorKind::TooLarge,
        format!("object too large: at least {} bytes, limit is {}", seen, max_bytes),
    )
}

fn store_failure(err: StoreError) -> PipelineError {
    let kind = match err {
        StoreError::NotFound { .. } => FetchErrorKind::NotFound,
        _ => FetchErrorKind::Store,
    };
    PipelineError::fetch(kind, err.to_string())
}
