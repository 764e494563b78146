use serde::{Deserialize, Serialize};
use std::{collections::HashMap, net::SocketAddr, time::Duration};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Redis configuration
    #[serde(default)]
    pub redis: RedisConfig,
    /// Entity cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
}

// Default derived via field defaults

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Server validations
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.server.body_limit_bytes == 0 {
            return Err("server.body_limit_bytes must be > 0".into());
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        // Redis validation
        if self.redis.enabled {
            if !self.redis.url.starts_with("redis://") && !self.redis.url.starts_with("rediss://")
            {
                return Err("redis.url must start with redis:// or rediss://".into());
            }
            if self.redis.pool_size == 0 {
                return Err("redis.pool_size must be > 0".into());
            }
            if self.redis.timeout_ms == 0 {
                return Err("redis.timeout_ms must be > 0".into());
            }
        }
        // Cache validation
        if self.cache.scan_page_size == 0 {
            return Err("cache.scan_page_size must be > 0".into());
        }
        if self.cache.op_timeout_ms == 0 {
            return Err("cache.op_timeout_ms must be > 0".into());
        }
        if self.cache.default_ttl_secs == Some(0) {
            return Err("cache.default_ttl_secs must be > 0 when set".into());
        }
        for (namespace, ttl) in &self.cache.ttl_overrides {
            if !crate::cache::NAMESPACES
                .iter()
                .any(|known| known.eq_ignore_ascii_case(namespace))
            {
                return Err(format!(
                    "cache.ttl_overrides: unknown namespace '{namespace}', expected one of {:?}",
                    crate::cache::NAMESPACES
                ));
            }
            if *ttl == 0 {
                return Err(format!("cache.ttl_overrides.{namespace} must be > 0"));
            }
        }
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8080
}
fn default_body_limit() -> usize {
    1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

/// Entity store configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// Populate a small demo catalog on startup
    #[serde(default)]
    pub seed_demo_data: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Redis configuration for the shared entity cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Enable Redis (gracefully degrades to the local cache without it)
    /// Default: false
    #[serde(default = "default_redis_enabled")]
    pub enabled: bool,

    /// Redis connection URL (e.g., "redis://localhost:6379")
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Connection pool size
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    /// Connection timeout in milliseconds
    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_redis_enabled() -> bool {
    false
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_redis_pool_size() -> usize {
    10
}

fn default_redis_timeout_ms() -> u64 {
    5000
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: default_redis_enabled(),
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
            timeout_ms: default_redis_timeout_ms(),
        }
    }
}

/// Entity cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Expiry applied to cached entries, in seconds. Unset means entries
    /// persist until invalidated.
    #[serde(default)]
    pub default_ttl_secs: Option<u64>,

    /// Per-namespace expiry overrides, e.g. `mediaItem = 300`
    #[serde(default)]
    pub ttl_overrides: HashMap<String, u64>,

    /// COUNT hint passed to every SCAN page
    #[serde(default = "default_scan_page_size")]
    pub scan_page_size: usize,

    /// Upper bound for a single cache operation, in milliseconds
    #[serde(default = "default_op_timeout_ms")]
    pub op_timeout_ms: u64,
}

fn default_scan_page_size() -> usize {
    100
}

fn default_op_timeout_ms() -> u64 {
    250
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: None,
            ttl_overrides: HashMap::new(),
            scan_page_size: default_scan_page_size(),
            op_timeout_ms: default_op_timeout_ms(),
        }
    }
}

impl CacheConfig {
    /// Expiry for entries of the given namespace. Override keys match
    /// case-insensitively since environment sources lowercase them.
    pub fn ttl_for(&self, namespace: &str) -> Option<Duration> {
        self.ttl_overrides
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(namespace))
            .map(|(_, ttl)| *ttl)
            .or(self.default_ttl_secs)
            .map(Duration::from_secs)
    }

    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms)
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or("storefront.toml"));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., STOREFRONT__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("STOREFRONT")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}
