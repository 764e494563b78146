//! Redis-backed cache store shared across server instances.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Connection, Pool};
use redis::AsyncCommands;

use super::store::{CacheError, CacheResult, CacheStore};

/// Cache store over a deadpool Redis pool.
///
/// Every operation, connection checkout included, is bounded by
/// `op_timeout`; exceeding it yields [`CacheError::Unavailable`].
#[derive(Clone)]
pub struct RedisCacheStore {
    pool: Pool,
    page_size: usize,
    op_timeout: Duration,
}

impl RedisCacheStore {
    pub fn new(pool: Pool, page_size: usize, op_timeout: Duration) -> Self {
        Self {
            pool,
            page_size: page_size.max(1),
            op_timeout,
        }
    }

    async fn conn(&self) -> CacheResult<Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| CacheError::unavailable(format!("redis pool: {e}")))
    }

    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> CacheResult<T>
    where
        F: Future<Output = CacheResult<T>> + Send,
    {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                tracing::debug!(operation, error = %e, "Redis operation failed");
                Err(e)
            }
            Err(_) => Err(CacheError::unavailable(format!(
                "redis {operation} timed out after {}ms",
                self.op_timeout.as_millis()
            ))),
        }
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.bounded("get", async {
            let mut conn = self.conn().await?;
            let value: Option<Vec<u8>> = conn.get(key).await?;
            Ok(value)
        })
        .await
    }

    async fn get_many(&self, keys: &[String]) -> CacheResult<Vec<Option<Vec<u8>>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        self.bounded("mget", async {
            let mut conn = self.conn().await?;
            // Explicit MGET: the AsyncCommands helper sends GET for a single key.
            let values: Vec<Option<Vec<u8>>> = redis::cmd("MGET")
                .arg(keys.to_vec())
                .query_async(&mut conn)
                .await?;
            Ok(values)
        })
        .await
    }

    async fn scan_page(&self, pattern: &str, cursor: u64) -> CacheResult<(u64, Vec<String>)> {
        self.bounded("scan", async {
            let mut conn = self.conn().await?;
            let page: (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(self.page_size)
                .query_async(&mut conn)
                .await?;
            Ok(page)
        })
        .await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<()> {
        self.bounded("set", async {
            let mut conn = self.conn().await?;
            match ttl {
                // SETEX rejects 0; round sub-second expiries up
                Some(ttl) => {
                    conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1))
                        .await?
                }
                None => conn.set::<_, _, ()>(key, value).await?,
            }
            Ok(())
        })
        .await
    }

    async fn delete(&self, keys: &[String]) -> CacheResult<usize> {
        if keys.is_empty() {
            return Ok(0);
        }
        self.bounded("del", async {
            let mut conn = self.conn().await?;
            let removed: usize = redis::cmd("DEL")
                .arg(keys.to_vec())
                .query_async(&mut conn)
                .await?;
            Ok(removed)
        })
        .await
    }

    async fn is_available(&self) -> bool {
        self.bounded("ping", async {
            let mut conn = self.conn().await?;
            let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
            Ok(pong)
        })
        .await
        .is_ok()
    }

    async fn close(&self) {
        self.pool.close();
        tracing::info!("Redis pool closed");
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
