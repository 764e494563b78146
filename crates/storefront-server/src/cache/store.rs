//! Entity-agnostic key/value store abstraction.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

/// Errors raised by the cache layer. Both variants are soft: callers fall
/// back to the entity store.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Backend unreachable, failed, or timed out
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    /// A value could not be encoded or decoded
    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CacheError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl From<redis::RedisError> for CacheError {
    fn from(e: redis::RedisError) -> Self {
        Self::Unavailable(e.to_string())
    }
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Shareable cache store handle.
pub type DynCacheStore = Arc<dyn CacheStore>;

/// Key/value operations over the shared backing store.
///
/// Absent keys are `Ok(None)`, never an error. No operation retries.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Values for `keys`, positionally aligned.
    async fn get_many(&self, keys: &[String]) -> CacheResult<Vec<Option<Vec<u8>>>>;

    /// One cursor step of a pattern scan. Cursor `0` starts a scan; a
    /// returned cursor of `0` ends it. A page may be empty while the
    /// cursor is not yet terminal.
    async fn scan_page(&self, pattern: &str, cursor: u64) -> CacheResult<(u64, Vec<String>)>;

    /// All keys matching `pattern`, deduplicated. A failing page aborts
    /// the whole scan.
    async fn scan_keys(&self, pattern: &str) -> CacheResult<Vec<String>> {
        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        let mut cursor = 0;
        loop {
            let (next, page) = self.scan_page(pattern, cursor).await?;
            for key in page {
                if seen.insert(key.clone()) {
                    keys.push(key);
                }
            }
            if next == 0 {
                break;
            }
            cursor = next;
        }
        Ok(keys)
    }

    /// Unconditional overwrite. `None` means no expiry.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<()>;

    /// Deletes `keys`, returning how many existed.
    async fn delete(&self, keys: &[String]) -> CacheResult<usize>;

    /// Deletes every key matching `pattern`.
    async fn delete_pattern(&self, pattern: &str) -> CacheResult<usize> {
        let keys = self.scan_keys(pattern).await?;
        if keys.is_empty() {
            return Ok(0);
        }
        self.delete(&keys).await
    }

    /// Health probe used by readiness checks.
    async fn is_available(&self) -> bool;

    /// Releases backend connections. Later calls fail as unavailable.
    async fn close(&self);

    fn backend_name(&self) -> &'static str;
}

/// Glob match supporting `*` (any run) and `?` (any single char), the subset
/// of Redis MATCH syntax used for namespace patterns.
pub fn glob_match(pattern: &str, key: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let k: Vec<char> = key.chars().collect();
    let (mut pi, mut ki) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while ki < k.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == k[ki]) {
            pi += 1;
            ki += 1;
        } else if pi < p.len() && p[pi] == '*' {
            backtrack = Some((pi, ki));
            pi += 1;
        } else if let Some((star, matched)) = backtrack {
            pi = star + 1;
            ki = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|c| *c == '*')
}
