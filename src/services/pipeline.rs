//! ThumbnailService runs parse → fetch → scale → publish for one request
//! and always ends in a [`ResponseEnvelope`].

use crate::{
    config::{AppConfig, SizeBounds},
    errors::{PipelineError, PipelineResult},
    models::{envelope::ResponseEnvelope, payload::ImageClass},
    services::{
        diagnostics::Diagnostics,
        fetcher::{self, FetchLimits},
        parser,
        publisher::{self, PublishPolicy},
        scale_engine::ScaleEngine,
    },
    store::{ObjectStore, StoreResult},
};
use std::{sync::Arc, time::Instant};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Shared, read-only state for every request: the store handle and the
/// settings loaded at startup.
#[derive(Clone)]
pub struct ThumbnailService {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    sizes: SizeBounds,
    limits: FetchLimits,
    engine: ScaleEngine,
    policy: PublishPolicy,
    debug_output: bool,
}

impl ThumbnailService {
    pub fn new(cfg: &AppConfig, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            bucket: cfg.bucket.clone(),
            sizes: cfg.sizes,
            limits: FetchLimits {
                max_bytes: cfg.max_origin_bytes,
                timeout: cfg.store_timeout,
            },
            engine: ScaleEngine::new(cfg.jpeg_quality),
            policy: PublishPolicy {
                timeout: cfg.store_timeout,
                ..PublishPolicy::default()
            },
            debug_output: cfg.debug_output,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Readiness check against the configured bucket.
    pub async fn probe(&self) -> StoreResult<()> {
        match timeout(self.limits.timeout, self.store.probe(&self.bucket)).await {
            Ok(result) => result,
            Err(_) => Err(crate::store::StoreError::Backend(format!(
                "probe timed out after {:?}",
                self.limits.timeout
            ))),
        }
    }

    /// Serve one request. `raw_key` is the `key` query value, if any.
    ///
    /// In debug mode the envelope is replaced by a `222` diagnostics report,
    /// except for rejected input, which is always answered with its `422`.
    /// Otherwise diagnostics are discarded.
    pub async fn handle(&self, raw_key: Option<&str>) -> ResponseEnvelope {
        let started = Instant::now();
        info!(key = raw_key.unwrap_or_default(), "thumbnail requested");
        let mut diag = Diagnostics::new(self.debug_output);
        diag.record("build", env!("CARGO_PKG_VERSION"));
        diag.record("bucket", self.bucket.as_str());

        let envelope = match self.run(raw_key, &mut diag).await {
            Ok(envelope) => {
                info!(
                    key = raw_key.unwrap_or_default(),
                    status = envelope.status_code(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "thumbnail served"
                );
                envelope
            }
            Err(err) => {
                if err.status_code() >= 500 {
                    error!(key = raw_key.unwrap_or_default(), kind = err.kind_name(), "{}", err);
                } else {
                    info!(key = raw_key.unwrap_or_default(), kind = err.kind_name(), "{}", err);
                }
                if matches!(err, PipelineError::BadRequest(_)) {
                    return err.to_envelope();
                }
                diag.record(err.kind_name(), err.to_string());
                err.to_envelope()
            }
        };

        if diag.is_enabled() {
            diag.record("status_code", envelope.status_code());
            diag.record("done", true);
            return ResponseEnvelope::diagnostics(&diag.into_report());
        }
        envelope
    }

    async fn run(
        &self,
        raw_key: Option<&str>,
        diag: &mut Diagnostics,
    ) -> PipelineResult<ResponseEnvelope> {
        let raw_key =
            raw_key.ok_or_else(|| PipelineError::BadRequest("'key' not specified".into()))?;
        diag.record("key", raw_key);
        diag.record(
            "key_parts",
            raw_key.split('/').filter(|part| !part.is_empty()).count(),
        );

        let reference = parser::parse(raw_key, self.sizes)?;
        debug!(object_id = reference.id(), requested_size = reference.requested_size(), "parsed key");
        diag.record("object_id", reference.id());
        diag.record("requested_size", reference.requested_size());

        let origin =
            fetcher::fetch(self.store.as_ref(), &self.bucket, &reference, self.limits, diag)
                .await?;
        let class = origin.class();
        diag.record("is_svg", class == ImageClass::Vector);

        let derived = self
            .engine
            .scale_async(origin, reference.requested_size())
            .await?;
        diag.record("out_data_size", derived.bytes.len());
        if let Some((width, height)) = derived.dimensions {
            diag.record("out_width", width);
            diag.record("out_height", height);
        }

        // Losing the cached copy only costs a regeneration next time; the
        // caller still gets the thumbnail.
        match publisher::publish(
            self.store.as_ref(),
            &self.bucket,
            &reference,
            &derived,
            &self.policy,
        )
        .await
        {
            Ok(receipt) => {
                debug!(key = %receipt.key, size = receipt.size_bytes, "derivative published");
                diag.record("published_key", receipt.key);
            }
            Err(err) => {
                warn!(key = %reference.derived_key(), "serving unpublished derivative: {}", err);
                diag.record(err.kind_name(), err.to_string());
            }
        }

        let envelope = publisher::respond(&derived, &self.policy);
        let payload_name = match derived.class {
            ImageClass::Raster => "scaled_image",
            ImageClass::Vector => "svg_image_original_as_is",
        };
        diag.record_with(payload_name, || envelope.body().to_string());
        Ok(envelope)
    }
}
