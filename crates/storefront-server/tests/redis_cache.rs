//! Integration tests for the Redis-backed entity cache.
//!
//! Tests use testcontainers to spin up a real Redis instance. Raw-key tests
//! use their own key prefixes so they can share one container.

use std::sync::Arc;
use std::time::Duration;

use storefront_server::cache::{CacheStore, EntityCache, Namespace};
use storefront_server::{CacheConfig, DynCacheStore, RedisConfig, create_cache_store};
use storefront_storage::{Category, SubcategorySummary};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::redis::Redis;
use time::OffsetDateTime;
use tokio::sync::OnceCell;
use uuid::Uuid;

// Shared Redis container for all tests
static SHARED_REDIS: OnceCell<(ContainerAsync<Redis>, String)> = OnceCell::const_new();

async fn get_redis_url() -> String {
    let (_, url) = SHARED_REDIS
        .get_or_init(|| async {
            let container = Redis::default()
                .start()
                .await
                .expect("start redis container");

            let host_port = container.get_host_port_ipv4(6379).await.expect("get port");
            let url = format!("redis://127.0.0.1:{}", host_port);

            (container, url)
        })
        .await;

    url.clone()
}

fn redis_config(url: String) -> RedisConfig {
    RedisConfig {
        enabled: true,
        url,
        pool_size: 5,
        timeout_ms: 5000,
    }
}

async fn redis_store(scan_page_size: usize) -> DynCacheStore {
    let cache = CacheConfig {
        scan_page_size,
        op_timeout_ms: 2000,
        ..CacheConfig::default()
    };
    let store = create_cache_store(&redis_config(get_redis_url().await), &cache).await;
    assert_eq!(store.backend_name(), "redis");
    store
}

fn category(slug: &str) -> Category {
    Category {
        id: Uuid::new_v4(),
        slug: slug.to_string(),
        name: slug.to_uppercase(),
        description: None,
        subcategories: vec![SubcategorySummary {
            id: Uuid::new_v4(),
            slug: format!("{slug}-sub"),
            name: "Sub".into(),
        }],
        created_at: OffsetDateTime::now_utc(),
    }
}

#[tokio::test]
async fn test_redis_cache_connection() {
    let store = redis_store(100).await;
    assert!(store.is_available().await);
}

#[tokio::test]
async fn test_unreachable_redis_falls_back_to_local() {
    let cache = CacheConfig {
        op_timeout_ms: 500,
        ..CacheConfig::default()
    };
    let config = RedisConfig {
        timeout_ms: 500,
        ..redis_config("redis://127.0.0.1:1".into())
    };

    let store = create_cache_store(&config, &cache).await;
    assert_eq!(store.backend_name(), "local");
    assert!(store.is_available().await);
}

#[tokio::test]
async fn test_redis_disabled_uses_local() {
    let store = create_cache_store(&RedisConfig::default(), &CacheConfig::default()).await;
    assert_eq!(store.backend_name(), "local");
}

#[tokio::test]
async fn test_redis_set_get_without_ttl() {
    let store = redis_store(100).await;

    store
        .set("persist:one", b"value".to_vec(), None)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(1100)).await;

    assert_eq!(
        store.get("persist:one").await.unwrap(),
        Some(b"value".to_vec())
    );
}

#[tokio::test]
async fn test_redis_ttl_expiry() {
    let store = redis_store(100).await;

    store
        .set("expiring:one", b"value".to_vec(), Some(Duration::from_secs(1)))
        .await
        .unwrap();
    assert!(store.get("expiring:one").await.unwrap().is_some());

    tokio::time::sleep(Duration::from_millis(2100)).await;
    assert!(store.get("expiring:one").await.unwrap().is_none());
}

#[tokio::test]
async fn test_redis_scan_collects_every_page() {
    // COUNT 10 over 250 keys forces many cursor round trips
    let store = redis_store(10).await;
    for i in 0..250 {
        store
            .set(&format!("scanbig:{i}"), vec![1], None)
            .await
            .unwrap();
    }
    store.set("scanbig", vec![0], None).await.unwrap();

    let mut keys = store.scan_keys("scanbig:*").await.unwrap();
    keys.sort();
    keys.dedup();
    assert_eq!(keys.len(), 250);
    assert!(!keys.contains(&"scanbig".to_string()));
}

#[tokio::test]
async fn test_redis_get_many_is_positional() {
    let store = redis_store(100).await;
    store.set("many:a", b"a".to_vec(), None).await.unwrap();
    store.set("many:c", b"c".to_vec(), None).await.unwrap();

    let values = store
        .get_many(&["many:a".into(), "many:b".into(), "many:c".into()])
        .await
        .unwrap();
    assert_eq!(
        values,
        vec![Some(b"a".to_vec()), None, Some(b"c".to_vec())]
    );

    // Single-key batches go through MGET as well
    let single = store.get_many(&["many:a".into()]).await.unwrap();
    assert_eq!(single, vec![Some(b"a".to_vec())]);
}

#[tokio::test]
async fn test_redis_delete_pattern_is_idempotent() {
    let store = redis_store(10).await;
    for i in 0..30 {
        store
            .set(&format!("dropme:{i}"), vec![1], None)
            .await
            .unwrap();
    }
    store.set("keepme:1", vec![1], None).await.unwrap();

    assert_eq!(store.delete_pattern("dropme:*").await.unwrap(), 30);
    assert_eq!(store.delete_pattern("dropme:*").await.unwrap(), 0);
    assert!(store.get("keepme:1").await.unwrap().is_some());
}

#[tokio::test]
async fn test_entity_cache_over_redis() {
    let store = redis_store(2).await;
    let categories: EntityCache<Category> = EntityCache::new(store.clone(), None);
    assert_eq!(categories.namespace(), Namespace::Category);
    categories.drop_all().await.unwrap();

    // Nothing primed yet
    assert!(categories.scan().await.unwrap().is_empty());

    let primed = vec![category("shoes"), category("bags"), category("hats")];
    categories.set_all(&primed).await.unwrap();

    // Order follows the primed collection, across several SCAN pages
    let scanned = categories.scan().await.unwrap();
    assert_eq!(scanned, primed);
    assert_eq!(categories.get("bags").await.unwrap(), Some(primed[1].clone()));

    // Removing one entry invalidates the collection too
    assert!(categories.remove("bags").await.unwrap() >= 1);
    assert!(categories.get("bags").await.unwrap().is_none());
    assert!(categories.scan().await.unwrap().is_empty());

    assert!(categories.drop_all().await.unwrap() >= 2);
    assert!(categories.get("shoes").await.unwrap().is_none());
}

#[tokio::test]
async fn test_closed_redis_store_reports_unavailable() {
    let store = redis_store(100).await;
    let probe: Arc<dyn CacheStore> = store.clone();
    probe.close().await;

    assert!(!probe.is_available().await);
    let err = probe.get("anything").await.unwrap_err();
    assert!(err.is_unavailable());
}
