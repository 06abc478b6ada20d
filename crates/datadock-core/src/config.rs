//! Configuration module
//!
//! Configuration is read once from the environment (and an optional `.env`
//! file) and then handed out as typed sub-configs: [`CacheSettings`] for the
//! columnar cache and [`IngestSettings`] for the inbox watcher.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

// Common constants
const MAX_CONNECTIONS: u32 = 10;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const FILE_STABILITY_SECS: u64 = 3;
const INGEST_INTERVAL_SECS: u64 = 10;
const ZSTD_LEVEL: i32 = 7;

/// Compression codec used for cached columnar artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheCompression {
    Zstd,
    Snappy,
    Gzip,
    Uncompressed,
}

impl FromStr for CacheCompression {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "zstd" => Ok(CacheCompression::Zstd),
            "snappy" => Ok(CacheCompression::Snappy),
            "gzip" => Ok(CacheCompression::Gzip),
            "none" | "uncompressed" => Ok(CacheCompression::Uncompressed),
            other => Err(anyhow::anyhow!(
                "PARQUET_COMPRESSION must be one of zstd, snappy, gzip, none (got '{}')",
                other
            )),
        }
    }
}

/// Settings for the columnar cache manager
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Root directory; artifacts live under `user_{owner}/{record}/`.
    pub root: PathBuf,
    pub compression: CacheCompression,
    pub compression_level: i32,
    pub use_dictionary: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./media/cache"),
            compression: CacheCompression::Zstd,
            compression_level: ZSTD_LEVEL,
            use_dictionary: true,
        }
    }
}

impl CacheSettings {
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }
}

/// Settings for the inbox watcher
#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub inbox_dir: PathBuf,
    pub processed_dir: PathBuf,
    pub error_dir: PathBuf,
    /// Minimum age of a file's mtime before it is considered complete.
    pub stability_window: Duration,
    pub poll_interval: Duration,
    pub dry_run: bool,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            inbox_dir: PathBuf::from("./inbox"),
            processed_dir: PathBuf::from("./processed"),
            error_dir: PathBuf::from("./error"),
            stability_window: Duration::from_secs(FILE_STABILITY_SECS),
            poll_interval: Duration::from_secs(INGEST_INTERVAL_SECS),
            dry_run: false,
        }
    }
}

/// Raw configuration as loaded from the environment
#[derive(Clone, Debug)]
pub struct DatadockConfig {
    pub server_port: u16,
    pub environment: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    /// Durable storage root for original uploads.
    pub media_root: PathBuf,
    pub cache: CacheSettings,
    pub ingest: IngestSettings,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<DatadockConfig>);

impl Config {
    fn inner(&self) -> &DatadockConfig {
        &self.0
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.inner().environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = DatadockConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.inner().validate()
    }

    pub fn server_port(&self) -> u16 {
        self.inner().server_port
    }

    pub fn environment(&self) -> &str {
        &self.inner().environment
    }

    pub fn database_url(&self) -> &str {
        &self.inner().database_url
    }

    pub fn db_max_connections(&self) -> u32 {
        self.inner().db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.inner().db_timeout_seconds
    }

    pub fn media_root(&self) -> &std::path::Path {
        &self.inner().media_root
    }

    pub fn cache_settings(&self) -> &CacheSettings {
        &self.inner().cache
    }

    pub fn ingest_settings(&self) -> &IngestSettings {
        &self.inner().ingest
    }
}

fn env_path(key: &str, default: impl Into<PathBuf>) -> PathBuf {
    env::var(key)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| default.into())
}

impl DatadockConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let media_root = env_path("MEDIA_ROOT", "./media");
        let cache_root = env_path("DATA_CACHE_DIR", media_root.join("cache"));

        let cache = CacheSettings {
            root: cache_root,
            compression: env::var("PARQUET_COMPRESSION")
                .unwrap_or_else(|_| "zstd".to_string())
                .parse()?,
            compression_level: env::var("PARQUET_COMPRESSION_LEVEL")
                .unwrap_or_else(|_| ZSTD_LEVEL.to_string())
                .parse()
                .unwrap_or(ZSTD_LEVEL),
            use_dictionary: env::var("PARQUET_USE_DICTIONARY")
                .unwrap_or_else(|_| "true".to_string())
                .to_lowercase()
                .parse()
                .unwrap_or(true),
        };

        let ingest = IngestSettings {
            inbox_dir: env_path("INBOX_DIR", "./inbox"),
            processed_dir: env_path("PROCESSED_DIR", "./processed"),
            error_dir: env_path("ERROR_DIR", "./error"),
            stability_window: Duration::from_secs(
                env::var("FILE_STABILITY_SECONDS")
                    .unwrap_or_else(|_| FILE_STABILITY_SECS.to_string())
                    .parse()
                    .unwrap_or(FILE_STABILITY_SECS),
            ),
            poll_interval: Duration::from_secs(
                env::var("INGEST_INTERVAL_SECONDS")
                    .unwrap_or_else(|_| INGEST_INTERVAL_SECS.to_string())
                    .parse()
                    .unwrap_or(INGEST_INTERVAL_SECS),
            ),
            dry_run: false,
        };

        let config = DatadockConfig {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| "4000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            environment,
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: env::var("DB_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| CONNECTION_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            media_root,
            cache,
            ingest,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !(self.database_url.starts_with("postgres://")
            || self.database_url.starts_with("postgresql://"))
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        if self.cache.compression == CacheCompression::Zstd
            && !(1..=22).contains(&self.cache.compression_level)
        {
            return Err(anyhow::anyhow!(
                "PARQUET_COMPRESSION_LEVEL must be between 1 and 22 for zstd"
            ));
        }

        let ingest = &self.ingest;
        if ingest.inbox_dir == ingest.processed_dir || ingest.inbox_dir == ingest.error_dir {
            return Err(anyhow::anyhow!(
                "INBOX_DIR must differ from PROCESSED_DIR and ERROR_DIR"
            ));
        }

        if ingest.poll_interval.is_zero() {
            return Err(anyhow::anyhow!(
                "INGEST_INTERVAL_SECONDS must be greater than zero"
            ));
        }

        Ok(())
    }
}
