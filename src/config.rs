use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub node: NodeConfig,
    pub storage: StorageConfig,
    pub media: MediaConfig,
    pub reaper: ReaperConfig,
    pub cache: CacheConfig,
    /// Enables dangerous operations like purge. Must never be true in production.
    pub test_mode: bool,
    /// Maximum upload size in bytes
    pub max_upload_size: u64,
    /// How many identifier candidates intake tries before giving up
    pub identifier_attempts: u32,
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub bind_address: String,
    pub data_dir: String,
    /// Scratch directory shared by all transcode jobs
    pub temp_dir: String,
}

#[derive(Debug, Clone)]
pub enum StorageBackend {
    Gcs,
    Local,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Directory for local storage backend
    pub local_storage_path: String,
    /// GCS bucket name (required when backend is gcs)
    pub gcs_bucket: Option<String>,
    /// Path to GCS service account JSON (optional, defaults to ADC)
    pub gcs_credentials_file: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MediaConfig {
    pub ffmpeg_path: String,
    /// Number of transcode jobs allowed to run at once
    pub worker_concurrency: usize,
}

#[derive(Debug, Clone)]
pub struct ReaperConfig {
    pub threshold_hours: u32,
    pub batch_size: usize,
    pub interval_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub max_entries: usize,
    pub ttl_seconds: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            data_dir: "./data".to_string(),
            temp_dir: "./tmp".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            local_storage_path: "./objects".to_string(),
            gcs_bucket: None,
            gcs_credentials_file: None,
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            worker_concurrency: 2,
        }
    }
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            threshold_hours: 2,
            batch_size: 50,
            interval_seconds: 600,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 256,
            ttl_seconds: 3600,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let node_defaults = NodeConfig::default();
        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or(node_defaults.bind_address);
        let data_dir = std::env::var("DATA_DIR").unwrap_or(node_defaults.data_dir);
        let temp_dir = std::env::var("TEMP_DIR").unwrap_or(node_defaults.temp_dir);

        let test_mode = std::env::var("TEST_MODE")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let max_upload_size = env_parse("MAX_UPLOAD_SIZE", 500 * 1024 * 1024); // 500MB
        let identifier_attempts = env_parse("IDENTIFIER_ATTEMPTS", 100);

        let storage_backend = match std::env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "local".to_string())
            .to_lowercase()
            .as_str()
        {
            "gcs" => StorageBackend::Gcs,
            _ => StorageBackend::Local,
        };

        let local_storage_path = std::env::var("LOCAL_STORAGE_PATH")
            .unwrap_or_else(|_| StorageConfig::default().local_storage_path);

        let media_defaults = MediaConfig::default();
        let reaper_defaults = ReaperConfig::default();
        let cache_defaults = CacheConfig::default();

        let config = Config {
            node: NodeConfig {
                bind_address,
                data_dir,
                temp_dir,
            },
            storage: StorageConfig {
                backend: storage_backend,
                local_storage_path,
                gcs_bucket: std::env::var("GCS_BUCKET").ok(),
                gcs_credentials_file: std::env::var("GCS_CREDENTIALS_FILE").ok(),
            },
            media: MediaConfig {
                ffmpeg_path: std::env::var("FFMPEG_PATH").unwrap_or(media_defaults.ffmpeg_path),
                worker_concurrency: env_parse(
                    "WORKER_CONCURRENCY",
                    media_defaults.worker_concurrency,
                ),
            },
            reaper: ReaperConfig {
                threshold_hours: env_parse(
                    "REAPER_THRESHOLD_HOURS",
                    reaper_defaults.threshold_hours,
                ),
                batch_size: env_parse("REAPER_BATCH_SIZE", reaper_defaults.batch_size),
                interval_seconds: env_parse(
                    "REAPER_INTERVAL_SECONDS",
                    reaper_defaults.interval_seconds,
                ),
            },
            cache: CacheConfig {
                max_entries: env_parse("CACHE_MAX_ENTRIES", cache_defaults.max_entries),
                ttl_seconds: env_parse("CACHE_TTL_SECONDS", cache_defaults.ttl_seconds),
            },
            test_mode,
            max_upload_size,
            identifier_attempts,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if matches!(self.storage.backend, StorageBackend::Gcs) && self.storage.gcs_bucket.is_none()
        {
            return Err(ConfigError::ValidationError(
                "GCS_BUCKET is required when STORAGE_BACKEND=gcs".to_string(),
            ));
        }

        if self.media.worker_concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "WORKER_CONCURRENCY must be at least 1".to_string(),
            ));
        }

        if self.identifier_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "IDENTIFIER_ATTEMPTS must be at least 1".to_string(),
            ));
        }

        if self.reaper.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "REAPER_BATCH_SIZE must be at least 1".to_string(),
            ));
        }

        if self.reaper.interval_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "REAPER_INTERVAL_SECONDS must be at least 1".to_string(),
            ));
        }

        if self.reaper.threshold_hours == 0 {
            tracing::warn!(
                "REAPER_THRESHOLD_HOURS is 0; uploads still transcoding will be reaped on the next sweep"
            );
        }

        Ok(())
    }
}
