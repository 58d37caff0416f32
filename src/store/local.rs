//! LocalStore: a filesystem object store with SQLite metadata.
//!
//! Payloads are sharded beneath `base_path/{bucket}/{shard}/{shard}/{digest}`
//! where the shards and file name come from MD5(bucket/key). Metadata
//! (content type, ACL, cache control, tags) lives in the `objects` table.

use super::{ObjectStore, PutOptions, StoreError, StoreResult, StoredObject};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use sqlx::{
    FromRow, SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tokio_util::io::ReaderStream;
use tracing::debug;
use uuid::Uuid;

const MAX_OBJECT_KEY_LEN: usize = 1024;
const BUCKET_NAME_MIN_LEN: usize = 3;
const BUCKET_NAME_MAX_LEN: usize = 63;
const MIGRATION_SQL: &str = include_str!("../../migrations/0001_init.sql");

/// Metadata row for one stored object.
#[derive(Debug, Clone, FromRow)]
pub struct ObjectRecord {
    pub key: String,
    pub content_type: Option<String>,
    pub size_bytes: i64,
    pub etag: Option<String>,
    pub cache_control: Option<String>,
    pub acl: String,
    pub tagging: Option<String>,
    pub last_modified: DateTime<Utc>,
}

#[derive(Clone)]
pub struct LocalStore {
    /// Shared SQLite connection pool used for metadata operations.
    pub db: Arc<SqlitePool>,

    /// Base directory on disk where object payloads are stored.
    pub base_path: PathBuf,
}

impl LocalStore {
    pub fn new(db: Arc<SqlitePool>, base_path: impl Into<PathBuf>) -> Self {
        Self {
            db,
            base_path: base_path.into(),
        }
    }

    /// Open (creating if needed) the SQLite database at `database_url`.
    pub async fn connect(database_url: &str, base_path: impl Into<PathBuf>) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        if let Some(parent) = options.get_filename().parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await?;
                debug!("created missing directory {:?}", parent);
            }
        }
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        Ok(Self::new(Arc::new(pool), base_path))
    }

    /// Apply the embedded schema statement by statement.
    pub async fn migrate(&self) -> StoreResult<()> {
        let statements = MIGRATION_SQL
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        tracing::info!("Running {} migration statements...", statements.len());
        for stmt in statements {
            debug!("Executing migration SQL: {}", stmt);
            sqlx::query(stmt).execute(&*self.db).await?;
        }
        Ok(())
    }

    /// Metadata for `bucket/key`, without touching the payload.
    pub async fn head(&self, bucket: &str, key: &str) -> StoreResult<ObjectRecord> {
        ensure_bucket_name_safe(bucket)?;
        ensure_key_safe(key)?;
        sqlx::query_as::<_, ObjectRecord>(
            "SELECT key, content_type, size_bytes, etag, cache_control, acl, tagging, last_modified
             FROM objects WHERE bucket = ? AND key = ?",
        )
        .bind(bucket)
        .bind(key)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => StoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            },
            other => StoreError::Sqlx(other),
        })
    }

    fn bucket_root(&self, bucket: &str) -> PathBuf {
        self.base_path.join(bucket)
    }

    /// `base_path/bucket/{aa}/{bb}/{digest}`. The key itself never becomes
    /// part of the path, so `media/x` and `media/x/120` cannot collide.
    fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        let digest = format!("{:x}", md5::compute(format!("{}/{}", bucket, key)));
        let mut path = self.bucket_root(bucket);
        path.push(&digest[0..2]);
        path.push(&digest[2..4]);
        path.push(&digest);
        path
    }

    /// Write `bytes` beside the final location, fsync, then rename over it.
    async fn write_payload(&self, file_path: &Path, bytes: &[u8]) -> StoreResult<()> {
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            StoreError::Io(io::Error::new(
                ErrorKind::Other,
                "object path missing parent directory",
            ))
        })?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));

        let written = async {
            let mut file = File::create(&tmp_path).await?;
            file.write_all(bytes).await?;
            file.flush().await?;
            file.sync_all().await?;
            fs::rename(&tmp_path, file_path).await
        }
        .await;

        if let Err(err) = written {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(err));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn get(&self, bucket: &str, key: &str) -> StoreResult<StoredObject> {
        let record = self.head(bucket, key).await?;
        let file_path = self.object_path(bucket, key);
        let file = File::open(&file_path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StoreError::NotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                }
            } else {
                StoreError::Io(err)
            }
        })?;

        Ok(StoredObject {
            content_type: record.content_type,
            content_length: u64::try_from(record.size_bytes).ok(),
            body: ReaderStream::new(file).boxed(),
        })
    }

    /// Overwrites any existing object at `bucket/key` (S3 semantics).
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        bytes: Bytes,
        options: &PutOptions,
    ) -> StoreResult<()> {
        ensure_bucket_name_safe(bucket)?;
        ensure_key_safe(key)?;

        let file_path = self.object_path(bucket, key);
        self.write_payload(&file_path, &bytes).await?;

        let etag = format!("{:x}", md5::compute(&bytes));
        let result = sqlx::query(
            r#"
            INSERT INTO objects (
                id, bucket, key, content_type, size_bytes, etag,
                cache_control, acl, tagging, last_modified
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(bucket, key) DO UPDATE SET
                content_type = excluded.content_type,
                size_bytes = excluded.size_bytes,
                etag = excluded.etag,
                cache_control = excluded.cache_control,
                acl = excluded.acl,
                tagging = excluded.tagging,
                last_modified = excluded.last_modified
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(bucket)
        .bind(key)
        .bind(&options.content_type)
        .bind(bytes.len() as i64)
        .bind(&etag)
        .bind(options.cache_control.as_deref())
        .bind(options.acl.as_str())
        .bind(options.tagging.as_deref())
        .bind(Utc::now())
        .execute(&*self.db)
        .await;

        match result {
            Ok(_) => {
                debug!("stored {}/{} ({} bytes)", bucket, key, bytes.len());
                Ok(())
            }
            Err(err) => {
                let _ = fs::remove_file(&file_path).await;
                Err(StoreError::Sqlx(err))
            }
        }
    }

    async fn probe(&self, bucket: &str) -> StoreResult<()> {
        ensure_bucket_name_safe(bucket)?;
        let one = sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await?;
        if one != 1 {
            return Err(StoreError::Backend(format!("unexpected result: {}", one)));
        }
        fs::create_dir_all(self.bucket_root(bucket)).await?;
        Ok(())
    }
}

/// Rejects keys that are empty, too long, absolute, contain `..`, or carry
/// control characters.
fn ensure_key_safe(key: &str) -> StoreResult<()> {
    if key.is_empty() || key.len() > MAX_OBJECT_KEY_LEN {
        return Err(StoreError::InvalidObjectKey);
    }
    if key.starts_with('/') || key.contains("..") {
        return Err(StoreError::InvalidObjectKey);
    }
    if key
        .bytes()
        .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
    {
        return Err(StoreError::InvalidObjectKey);
    }
    Ok(())
}

/// S3-like bucket naming: 3 to 63 chars of lowercase letters, digits, dots and
/// hyphens, alphanumeric at both ends, no `..`, not shaped like an IPv4
/// address.
fn ensure_bucket_name_safe(name: &str) -> StoreResult<()> {
    let invalid = |reason: &str| StoreError::InvalidBucketName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.len() < BUCKET_NAME_MIN_LEN || name.len() > BUCKET_NAME_MAX_LEN {
        return Err(invalid("must be between 3 and 63 characters"));
    }
    if !name
        .chars()
        .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '.' | '-'))
    {
        return Err(invalid(
            "allowed characters are lowercase letters, digits, dots, and hyphens",
        ));
    }
    if name.starts_with(['.', '-']) || name.ends_with(['.', '-']) {
        return Err(invalid("must start and end with a lowercase letter or digit"));
    }
    if name.contains("..") || name.contains("-.") || name.contains(".-") {
        return Err(invalid(
            "cannot contain consecutive dots or dot-hyphen combinations",
        ));
    }
    if is_ipv4_like(name) {
        return Err(invalid("must not be formatted like an IP address"));
    }
    Ok(())
}

fn is_ipv4_like(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() == 4
        && parts.iter().all(|segment| {
            !segment.is_empty()
                && segment.len() <= 3
                && segment.chars().all(|c| c.is_ascii_digit())
                && segment.parse::<u8>().is_ok()
        })
}
