pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod handlers;
pub mod invalidation;
pub mod metrics;
pub mod middleware;
pub mod observability;
pub mod server;

pub use cache::{
    CacheError, CacheStore, DynCacheStore, EntityCache, EntityCaches, LocalCacheStore,
    RedisCacheStore,
};
pub use catalog::Catalog;
pub use config::{AppConfig, CacheConfig, RedisConfig, ServerConfig};
pub use error::ApiError;
pub use invalidation::{Invalidation, InvalidationCoordinator, InvalidationPlan};
pub use observability::{init_tracing, shutdown_tracing};
pub use server::{
    AppState, ServerBuilder, StorefrontServer, build_app, build_state, build_state_with_cache, router,
};

use std::sync::Arc;

/// Create the cache store based on configuration.
///
/// ## Cache Modes
///
/// - **Redis disabled**: local in-process store (DashMap)
/// - **Redis enabled**: connects to Redis, falls back to local on failure
///
/// ## Graceful Degradation
///
/// If the Redis connection fails at startup, the server runs on the local
/// store. Later Redis outages surface as soft cache errors per operation.
pub async fn create_cache_store(redis: &RedisConfig, cache: &CacheConfig) -> DynCacheStore {
    use std::time::Duration;

    let local = || -> DynCacheStore { Arc::new(LocalCacheStore::new(cache.scan_page_size)) };

    if !redis.enabled {
        tracing::info!("Redis disabled, using local cache only");
        return local();
    }

    tracing::info!(url = %redis.url, "Connecting to Redis");

    let mut redis_config = deadpool_redis::Config::from_url(&redis.url);
    let mut pool_config = deadpool_redis::PoolConfig::new(redis.pool_size);
    pool_config.timeouts.wait = Some(Duration::from_millis(redis.timeout_ms));
    pool_config.timeouts.create = Some(Duration::from_millis(redis.timeout_ms));
    pool_config.timeouts.recycle = Some(Duration::from_millis(redis.timeout_ms));
    redis_config.pool = Some(pool_config);

    let pool = match redis_config.create_pool(Some(deadpool_redis::Runtime::Tokio1)) {
        Ok(pool) => pool,
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Failed to create Redis pool. Falling back to local cache."
            );
            return local();
        }
    };

    let store = RedisCacheStore::new(pool, cache.scan_page_size, cache.op_timeout());
    if store.is_available().await {
        tracing::info!("Connected to Redis");
        Arc::new(store)
    } else {
        tracing::warn!(url = %redis.url, "Redis unreachable. Falling back to local cache.");
        store.close().await;
        local()
    }
}
