//! S3 backend built on `aws-sdk-s3`.

use super::{Acl, ObjectStore, PutOptions, StoreError, StoreResult, StoredObject};
use crate::config::AppConfig;
use async_trait::async_trait;
use aws_config::{BehaviorVersion, meta::region::RegionProviderChain};
use aws_sdk_s3::{
    Client,
    config::Region,
    error::{DisplayErrorContext, SdkError},
    operation::get_object::GetObjectError,
    primitives::ByteStream,
    types::ObjectCannedAcl,
};
use bytes::Bytes;
use futures::StreamExt;
use tokio_util::io::ReaderStream;
use tracing::debug;

#[derive(Clone, Debug)]
pub struct S3Store {
    client: Client,
}

impl S3Store {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the default credential chain, honouring an
    /// explicit region and endpoint when configured. A custom endpoint
    /// (MinIO, localstack) switches to path-style addressing.
    pub async fn from_config(cfg: &AppConfig) -> Self {
        let region = RegionProviderChain::first_try(cfg.region.clone().map(Region::new))
            .or_default_provider()
            .or_else("us-east-1");
        let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(region);
        if let Some(endpoint) = &cfg.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let shared = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(cfg.endpoint.is_some())
            .build();
        Self::new(Client::from_conf(s3_config))
    }
}

fn canned_acl(acl: Acl) -> ObjectCannedAcl {
    match acl {
        Acl::Private => ObjectCannedAcl::Private,
        Acl::PublicRead => ObjectCannedAcl::PublicRead,
    }
}

fn get_error<R>(bucket: &str, key: &str, err: SdkError<GetObjectError, R>) -> StoreError
where
    R: std::fmt::Debug,
{
    if err
        .as_service_error()
        .is_some_and(GetObjectError::is_no_such_key)
    {
        return StoreError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        };
    }
    StoreError::Backend(DisplayErrorContext(&err).to_string())
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn get(&self, bucket: &str, key: &str) -> StoreResult<StoredObject> {
        debug!("s3 get_object s3://{}/{}", bucket, key);
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| get_error(bucket, key, err))?;

        let content_length = output
            .content_length()
            .and_then(|len| u64::try_from(len).ok());
        let content_type = output.content_type().map(str::to_string);
        let body = ReaderStream::new(output.body.into_async_read()).boxed();

        Ok(StoredObject {
            content_type,
            content_length,
            body,
        })
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        bytes: Bytes,
        options: &PutOptions,
    ) -> StoreResult<()> {
        debug!(
            "s3 put_object s3://{}/{} ({} bytes, {})",
            bucket,
            key,
            bytes.len(),
            options.content_type
        );
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_length(bytes.len() as i64)
            .body(ByteStream::from(bytes))
            .content_type(&options.content_type)
            .acl(canned_acl(options.acl))
            .set_cache_control(options.cache_control.clone())
            .set_tagging(options.tagging.clone())
            .send()
            .await
            .map_err(|err| StoreError::Backend(DisplayErrorContext(&err).to_string()))?;
        Ok(())
    }

    async fn probe(&self, bucket: &str) -> StoreResult<()> {
        self.client
            .head_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|err| StoreError::Backend(DisplayErrorContext(&err).to_string()))?;
        Ok(())
    }
}
