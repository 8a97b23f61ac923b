//! Service Configuration Module
//!
//! Configuration is loaded from environment variables with defaults suited to
//! a single-node development deployment (in-memory cache and store).

use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use mysthaven_storage::{CacheConfig, InMemoryCacheBackend};
use thiserror::Error;

use crate::error::ApiError;

/// Errors raised while reading configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },

    #[error("Unknown {kind} backend: {value}")]
    UnknownBackend { kind: &'static str, value: String },
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        ApiError::invalid_input(err.to_string())
    }
}

// ============================================================================
// BACKENDS
// ============================================================================

/// Which cache adapter to run against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheBackendKind {
    /// In-process LRU cache bounded to `max_entries`.
    Memory { max_entries: NonZeroUsize },
    Lmdb { path: PathBuf, max_size_mb: usize },
}

/// Which durable store adapter to run against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackendKind {
    Memory,
    Mongo { uri: String, database: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

// ============================================================================
// SERVICE CONFIGURATION
// ============================================================================

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub cache_backend: CacheBackendKind,
    pub store_backend: StoreBackendKind,
    /// TTL policy handed to the access layer.
    pub cache: CacheConfig,
    pub log_format: LogFormat,
    /// Allowed CORS origins. Empty means allow all.
    pub cors_origins: Vec<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            cache_backend: CacheBackendKind::Memory {
                max_entries: InMemoryCacheBackend::default_capacity(),
            },
            store_backend: StoreBackendKind::Memory,
            cache: CacheConfig::default(),
            log_format: LogFormat::Json,
            cors_origins: Vec::new(),
        }
    }
}

impl ServiceConfig {
    /// Create ServiceConfig from environment variables.
    ///
    /// Environment variables:
    /// - `MYSTHAVEN_BIND`: bind host (default: 0.0.0.0)
    /// - `PORT` or `MYSTHAVEN_PORT`: bind port (default: 3001)
    /// - `MYSTHAVEN_CACHE_BACKEND`: `memory` or `lmdb` (default: memory)
    /// - `MYSTHAVEN_CACHE_MAX_ENTRIES`: in-memory entry bound (default: 100000)
    /// - `MYSTHAVEN_LMDB_PATH`: LMDB directory (default: ./data/cache)
    /// - `MYSTHAVEN_LMDB_MAP_SIZE_MB`: LMDB map size (default: 256)
    /// - `MYSTHAVEN_STORE_BACKEND`: `memory` or `mongo` (default: memory)
    /// - `MYSTHAVEN_MONGO_URI`: MongoDB connection string
    /// - `MYSTHAVEN_MONGO_DATABASE`: database name (default: Mysthaven)
    /// - `MYSTHAVEN_DEFAULT_TTL_SECS`: record TTL (default: 600)
    /// - `MYSTHAVEN_CHANNEL_TTL_SECS`: channel TTL (default: 3600)
    /// - `MYSTHAVEN_COOLDOWN_WINDOW_SECS`: cooldown length (default: 3600)
    /// - `MYSTHAVEN_ACTIVE_GIVEAWAYS_TTL_SECS`: aggregate TTL (default: 600)
    /// - `MYSTHAVEN_LOG_FORMAT`: `json` or `pretty` (default: json)
    /// - `MYSTHAVEN_CORS_ORIGINS`: comma-separated allowed origins
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let host = lookup("MYSTHAVEN_BIND").unwrap_or(defaults.host);
        let port = match lookup("PORT").or_else(|| lookup("MYSTHAVEN_PORT")) {
            Some(value) => value
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidValue { var: "PORT", value })?,
            None => defaults.port,
        };

        let cache_backend = match lookup("MYSTHAVEN_CACHE_BACKEND").as_deref() {
            None | Some("memory") => CacheBackendKind::Memory {
                max_entries: parse_or(
                    &lookup,
                    "MYSTHAVEN_CACHE_MAX_ENTRIES",
                    InMemoryCacheBackend::default_capacity(),
                )?,
            },
            Some("lmdb") => CacheBackendKind::Lmdb {
                path: lookup("MYSTHAVEN_LMDB_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("./data/cache")),
                max_size_mb: parse_or(&lookup, "MYSTHAVEN_LMDB_MAP_SIZE_MB", 256)?,
            },
            Some(other) => {
                return Err(ConfigError::UnknownBackend {
                    kind: "cache",
                    value: other.to_string(),
                })
            }
        };

        let store_backend = match lookup("MYSTHAVEN_STORE_BACKEND").as_deref() {
            None | Some("memory") => StoreBackendKind::Memory,
            Some("mongo") => StoreBackendKind::Mongo {
                uri: lookup("MYSTHAVEN_MONGO_URI")
                    .unwrap_or_else(|| "mongodb://localhost:27017".to_string()),
                database: lookup("MYSTHAVEN_MONGO_DATABASE")
                    .unwrap_or_else(|| "Mysthaven".to_string()),
            },
            Some(other) => {
                return Err(ConfigError::UnknownBackend {
                    kind: "store",
                    value: other.to_string(),
                })
            }
        };

        let cache = CacheConfig::new()
            .with_default_ttl(secs(&lookup, "MYSTHAVEN_DEFAULT_TTL_SECS", 600)?)
            .with_channel_ttl(secs(&lookup, "MYSTHAVEN_CHANNEL_TTL_SECS", 3600)?)
            .with_cooldown_window(secs(&lookup, "MYSTHAVEN_COOLDOWN_WINDOW_SECS", 3600)?)
            .with_active_giveaways_ttl(secs(&lookup, "MYSTHAVEN_ACTIVE_GIVEAWAYS_TTL_SECS", 600)?);

        let log_format = match lookup("MYSTHAVEN_LOG_FORMAT").map(|s| s.to_lowercase()) {
            None => LogFormat::Json,
            Some(s) if s == "json" => LogFormat::Json,
            Some(s) if s == "pretty" => LogFormat::Pretty,
            Some(value) => {
                return Err(ConfigError::InvalidValue {
                    var: "MYSTHAVEN_LOG_FORMAT",
                    value,
                })
            }
        };

        let cors_origins = lookup("MYSTHAVEN_CORS_ORIGINS")
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            host,
            port,
            cache_backend,
            store_backend,
            cache,
            log_format,
            cors_origins,
        })
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidValue {
                var: "MYSTHAVEN_BIND",
                value: addr,
            })
    }
}

fn parse_or<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(var) {
        Some(value) => value
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue { var, value }),
        None => Ok(default),
    }
}

fn secs<F>(lookup: &F, var: &'static str, default: u64) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    parse_or(lookup, var, default).map(Duration::from_secs)
}
