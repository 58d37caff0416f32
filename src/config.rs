use clap::{Parser, ValueEnum};
use std::{env, fmt, str::FromStr, time::Duration};
use thiserror::Error;

pub const DEFAULT_MIN_SIZE: u32 = 20;
pub const DEFAULT_MAX_SIZE: u32 = 2560;
/// 25 MiB, the largest origin the fetcher will buffer.
pub const DEFAULT_MAX_ORIGIN_BYTES: u64 = 25 * 1024 * 1024;
pub const DEFAULT_JPEG_QUALITY: u8 = 85;
pub const DEFAULT_STORE_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting `{0}`")]
    Missing(&'static str),
    #[error("invalid value `{value}` for `{name}`: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Which object store the service talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    S3,
    Local,
}

impl FromStr for Backend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "s3" => Ok(Backend::S3),
            "local" => Ok(Backend::Local),
            other => Err(ConfigError::Invalid {
                name: "THUMBD_BACKEND",
                value: other.to_string(),
                reason: "expected `s3` or `local`".into(),
            }),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::S3 => f.write_str("s3"),
            Backend::Local => f.write_str("local"),
        }
    }
}

/// Inclusive bounds on the requested thumbnail height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeBounds {
    pub min: u32,
    pub max: u32,
}

impl Default for SizeBounds {
    fn default() -> Self {
        Self {
            min: DEFAULT_MIN_SIZE,
            max: DEFAULT_MAX_SIZE,
        }
    }
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments; read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub bucket: String,
    pub backend: Backend,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub storage_dir: String,
    pub database_url: String,
    pub sizes: SizeBounds,
    pub max_origin_bytes: u64,
    pub jpeg_quality: u8,
    pub store_timeout: Duration,
    pub debug_output: bool,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "On-demand thumbnail service")]
pub struct Args {
    /// Host to bind to (overrides THUMBD_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides THUMBD_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Media bucket holding originals and thumbnails (overrides MEDIA_BUCKET)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Object store backend (overrides THUMBD_BACKEND)
    #[arg(long, value_enum)]
    pub backend: Option<Backend>,

    /// S3 region (overrides AWS_REGION)
    #[arg(long)]
    pub region: Option<String>,

    /// S3-compatible endpoint URL (overrides THUMBD_S3_ENDPOINT)
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Directory for the local backend's payloads (overrides THUMBD_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// SQLite URL for the local backend's metadata (overrides THUMBD_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Smallest accepted thumbnail height (overrides THUMBD_MIN_SIZE)
    #[arg(long)]
    pub min_size: Option<u32>,

    /// Largest accepted thumbnail height (overrides THUMBD_MAX_SIZE)
    #[arg(long)]
    pub max_size: Option<u32>,

    /// Largest origin object in bytes (overrides THUMBD_MAX_ORIGIN_BYTES)
    #[arg(long)]
    pub max_origin_bytes: Option<u64>,

    /// JPEG quality 1-100 (overrides THUMBD_JPEG_QUALITY)
    #[arg(long)]
    pub jpeg_quality: Option<u8>,

    /// Per-call object store timeout in seconds (overrides THUMBD_STORE_TIMEOUT_SECS)
    #[arg(long)]
    pub store_timeout_secs: Option<u64>,

    /// Return diagnostics (status 222) instead of payloads (overrides DEBUG_OUTPUT)
    #[arg(long)]
    pub debug_output: bool,

    /// Run local backend migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool), ConfigError> {
        let args = Args::parse();
        let migrate = args.migrate;
        let cfg = Self::from_parts(args, |name| env::var(name).ok())?;
        Ok((cfg, migrate))
    }

    /// Merge CLI args over values looked up through `var`, then over defaults.
    pub fn from_parts<F>(args: Args, var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| var(name).filter(|v| !v.trim().is_empty());

        let bucket = args
            .bucket
            .or_else(|| var("MEDIA_BUCKET"))
            .ok_or(ConfigError::Missing("MEDIA_BUCKET"))?;

        let backend = match args.backend {
            Some(backend) => backend,
            None => var("THUMBD_BACKEND")
                .map(|v| v.parse())
                .transpose()?
                .unwrap_or(Backend::S3),
        };

        let sizes = SizeBounds {
            min: pick(args.min_size, &var, "THUMBD_MIN_SIZE", DEFAULT_MIN_SIZE)?,
            max: pick(args.max_size, &var, "THUMBD_MAX_SIZE", DEFAULT_MAX_SIZE)?,
        };
        if sizes.min == 0 || sizes.min > sizes.max {
            return Err(ConfigError::Invalid {
                name: "THUMBD_MIN_SIZE",
                value: sizes.min.to_string(),
                reason: format!("must be between 1 and the maximum size {}", sizes.max),
            });
        }

        let jpeg_quality = pick(
            args.jpeg_quality,
            &var,
            "THUMBD_JPEG_QUALITY",
            DEFAULT_JPEG_QUALITY,
        )?;
        if !(1..=100).contains(&jpeg_quality) {
            return Err(ConfigError::Invalid {
                name: "THUMBD_JPEG_QUALITY",
                value: jpeg_quality.to_string(),
                reason: "must be between 1 and 100".into(),
            });
        }

        let store_timeout_secs = pick(
            args.store_timeout_secs,
            &var,
            "THUMBD_STORE_TIMEOUT_SECS",
            DEFAULT_STORE_TIMEOUT_SECS,
        )?;

        Ok(Self {
            host: args
                .host
                .or_else(|| var("THUMBD_HOST"))
                .unwrap_or_else(|| "0.0.0.0".into()),
            port: pick(args.port, &var, "THUMBD_PORT", 3000)?,
            bucket,
            backend,
            region: args.region.or_else(|| var("AWS_REGION")),
            endpoint: args.endpoint.or_else(|| var("THUMBD_S3_ENDPOINT")),
            storage_dir: args
                .storage_dir
                .or_else(|| var("THUMBD_STORAGE_DIR"))
                .unwrap_or_else(|| "./data/objects".into()),
            database_url: args
                .database_url
                .or_else(|| var("THUMBD_DATABASE_URL"))
                .unwrap_or_else(|| "sqlite://./data/meta/thumbd.db".into()),
            sizes,
            max_origin_bytes: pick(
                args.max_origin_bytes,
                &var,
                "THUMBD_MAX_ORIGIN_BYTES",
                DEFAULT_MAX_ORIGIN_BYTES,
            )?,
            jpeg_quality,
            store_timeout: Duration::from_secs(store_timeout_secs),
            debug_output: args.debug_output
                || var("DEBUG_OUTPUT").is_some_and(|v| is_truthy(&v)),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// CLI value first, then the environment, then the default.
fn pick<T, F>(cli: Option<T>, var: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = cli {
        return Ok(value);
    }
    match var(name) {
        Some(raw) => raw.trim().parse::<T>().map_err(|err| ConfigError::Invalid {
            name,
            value: raw,
            reason: err.to_string(),
        }),
        None => Ok(default),
    }
}

/// Any value other than `false` or `0` (case-insensitive) switches a flag on.
fn is_truthy(value: &str) -> bool {
    let value = value.trim().to_ascii_lowercase();
    !value.is_empty() && value != "false" && value != "0"
}
