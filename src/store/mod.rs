//! The narrow object-store contract the pipeline depends on, and its
//! backends.
//!
//! - [`s3::S3Store`] talks to S3 (or any S3-compatible endpoint).
//! - [`local::LocalStore`] keeps payloads on disk and metadata in SQLite,
//!   for development and tests.

pub mod local;
pub mod s3;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, stream::BoxStream};
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object `{key}` not found in bucket `{bucket}`")]
    NotFound { bucket: String, key: String },
    #[error("bucket `{name}` invalid: {reason}")]
    InvalidBucketName { name: String, reason: String },
    #[error("invalid object key")]
    InvalidObjectKey,
    #[error("{0}")]
    Backend(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Object payload as a stream of chunks, so callers decide how much to buffer.
pub type ObjectBody = BoxStream<'static, io::Result<Bytes>>;

/// An object returned by [`ObjectStore::get`].
pub struct StoredObject {
    pub content_type: Option<String>,
    /// Length reported by the store, if it reported one.
    pub content_length: Option<u64>,
    pub body: ObjectBody,
}

impl StoredObject {
    /// Wrap an in-memory payload.
    pub fn from_bytes(bytes: Bytes, content_type: Option<String>) -> Self {
        let content_length = Some(bytes.len() as u64);
        Self {
            content_type,
            content_length,
            body: futures::stream::once(async move { Ok(bytes) }).boxed(),
        }
    }
}

impl std::fmt::Debug for StoredObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredObject")
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Canned access policy applied on write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acl {
    Private,
    PublicRead,
}

impl Acl {
    pub fn as_str(&self) -> &'static str {
        match self {
            Acl::Private => "private",
            Acl::PublicRead => "public-read",
        }
    }
}

/// Metadata attached to an object on [`ObjectStore::put`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutOptions {
    pub content_type: String,
    pub acl: Acl,
    pub cache_control: Option<String>,
    /// Tag set in S3 query-string form, e.g. `temp` or `class=temp`.
    pub tagging: Option<String>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, bucket: &str, key: &str) -> StoreResult<StoredObject>;

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        bytes: Bytes,
        options: &PutOptions,
    ) -> StoreResult<()>;

    /// Cheap reachability check used by readiness probes.
    async fn probe(&self, bucket: &str) -> StoreResult<()>;
}
