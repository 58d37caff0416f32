#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::{
    collections::HashMap,
    io::Cursor,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use thumbd::{
    config::{AppConfig, Backend, SizeBounds},
    services::pipeline::ThumbnailService,
    store::{ObjectStore, PutOptions, StoreError, StoreResult, StoredObject},
};

/// In-memory store that records writes and can be told to fail.
#[derive(Default)]
pub struct MemoryStore {
    pub objects: Mutex<HashMap<String, (Bytes, String)>>,
    pub puts: Mutex<Vec<(String, PutOptions)>>,
    pub gets: AtomicUsize,
    pub fail_get: bool,
    pub fail_put: bool,
    /// `put` never completes.
    pub stall_put: bool,
}

impl MemoryStore {
    pub fn with_object(self, key: &str, bytes: impl Into<Bytes>, content_type: &str) -> Self {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (bytes.into(), content_type.to_string()));
        self
    }

    pub fn object(&self, key: &str) -> Option<(Bytes, String)> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn put_count(&self) -> usize {
        self.puts.lock().unwrap().len()
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get(&self, bucket: &str, key: &str) -> StoreResult<StoredObject> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.fail_get {
            return Err(StoreError::Backend("connection reset by peer".into()));
        }
        match self.object(key) {
            Some((bytes, content_type)) => Ok(StoredObject::from_bytes(bytes, Some(content_type))),
            None => Err(StoreError::NotFound {
                bucket: bucket.into(),
                key: key.into(),
            }),
        }
    }

    async fn put(
        &self,
        _bucket: &str,
        key: &str,
        bytes: Bytes,
        options: &PutOptions,
    ) -> StoreResult<()> {
        self.puts
            .lock()
            .unwrap()
            .push((key.to_string(), options.clone()));
        if self.stall_put {
            return futures::future::pending().await;
        }
        if self.fail_put {
            return Err(StoreError::Backend("AccessDenied: put forbidden".into()));
        }
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (bytes, options.content_type.clone()));
        Ok(())
    }

    async fn probe(&self, _bucket: &str) -> StoreResult<()> {
        if self.fail_get {
            return Err(StoreError::Backend("bucket unreachable".into()));
        }
        Ok(())
    }
}

pub fn config() -> AppConfig {
    AppConfig {
        host: "127.0.0.1".into(),
        port: 0,
        bucket: "media-test".into(),
        backend: Backend::Local,
        region: None,
        endpoint: None,
        storage_dir: "unused".into(),
        database_url: "sqlite::memory:".into(),
        sizes: SizeBounds { min: 20, max: 2560 },
        max_origin_bytes: 25 * 1024 * 1024,
        jpeg_quality: 85,
        store_timeout: Duration::from_secs(5),
        debug_output: false,
    }
}

pub fn service(store: Arc<MemoryStore>, cfg: &AppConfig) -> ThumbnailService {
    ThumbnailService::new(cfg, store)
}

pub fn png(width: u32, height: u32) -> Bytes {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([120, 60, 30])));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    Bytes::from(buf.into_inner())
}

pub const SVG: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10"><rect width="10" height="10" fill="red"/></svg>"#;
