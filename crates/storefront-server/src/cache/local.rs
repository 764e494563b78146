//! In-process cache store used when Redis is disabled or unreachable.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use super::store::{CacheError, CacheResult, CacheStore, glob_match};

/// A cached value with optional expiry.
///
/// The data is wrapped in `Arc` so reads clone a pointer, not the bytes.
#[derive(Clone, Debug)]
struct LocalEntry {
    data: Arc<Vec<u8>>,
    expires_at: Option<Instant>,
    /// Write sequence number; scan cursors are expressed in these.
    seq: u64,
}

impl LocalEntry {
    fn new(data: Vec<u8>, ttl: Option<Duration>, seq: u64) -> Self {
        Self {
            data: Arc::new(data),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
            seq,
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// Single-instance cache store over a `DashMap`.
///
/// Scans walk the keyspace in write order. The cursor is the sequence
/// number of the next entry to visit, so deleting other keys mid-scan never
/// shifts it: a key present for the whole scan is always returned. A key
/// rewritten mid-scan may be returned twice. Expired entries are dropped
/// lazily on access.
pub struct LocalCacheStore {
    entries: DashMap<String, LocalEntry>,
    page_size: usize,
    next_seq: AtomicU64,
    closed: AtomicBool,
}

impl Default for LocalCacheStore {
    fn default() -> Self {
        Self::new(100)
    }
}

impl LocalCacheStore {
    pub fn new(page_size: usize) -> Self {
        Self {
            entries: DashMap::new(),
            page_size: page_size.max(1),
            // 0 is the start/terminal cursor
            next_seq: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> CacheResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(CacheError::unavailable("local cache store is closed"));
        }
        Ok(())
    }

    fn live(&self, key: &str) -> Option<Arc<Vec<u8>>> {
        let entry = self.entries.get(key)?;
        if entry.is_expired() {
            drop(entry);
            self.entries.remove_if(key, |_, e| e.is_expired());
            return None;
        }
        Some(Arc::clone(&entry.data))
    }
}

#[async_trait]
impl CacheStore for LocalCacheStore {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.ensure_open()?;
        Ok(self.live(key).map(|data| data.as_ref().clone()))
    }

    async fn get_many(&self, keys: &[String]) -> CacheResult<Vec<Option<Vec<u8>>>> {
        self.ensure_open()?;
        Ok(keys
            .iter()
            .map(|key| self.live(key).map(|data| data.as_ref().clone()))
            .collect())
    }

    async fn scan_page(&self, pattern: &str, cursor: u64) -> CacheResult<(u64, Vec<String>)> {
        self.ensure_open()?;
        let mut remaining: Vec<(u64, String)> = self
            .entries
            .iter()
            .filter(|e| e.seq >= cursor && !e.is_expired())
            .map(|e| (e.seq, e.key().clone()))
            .collect();
        remaining.sort_unstable_by_key(|(seq, _)| *seq);

        let next = remaining
            .get(self.page_size)
            .map_or(0, |(seq, _)| *seq);
        let page = remaining
            .into_iter()
            .take(self.page_size)
            .map(|(_, key)| key)
            .filter(|key| glob_match(pattern, key))
            .collect();
        Ok((next, page))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<()> {
        self.ensure_open()?;
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.entries
            .insert(key.to_string(), LocalEntry::new(value, ttl, seq));
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> CacheResult<usize> {
        self.ensure_open()?;
        Ok(keys
            .iter()
            .filter_map(|key| self.entries.remove(key))
            .filter(|(_, entry)| !entry.is_expired())
            .count())
    }

    async fn is_available(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.entries.clear();
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scan_is_complete_across_pages() {
        let store = LocalCacheStore::new(7);
        for i in 0..50 {
            store
                .set(&format!("category:c{i:02}"), b"{}".to_vec(), None)
                .await
                .unwrap();
        }
        for i in 0..13 {
            store
                .set(&format!("productType:p{i}"), b"{}".to_vec(), None)
                .await
                .unwrap();
        }
        store.set("category", b"[]".to_vec(), None).await.unwrap();

        let mut keys = store.scan_keys("category:*").await.unwrap();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), 50);
        assert!(keys.iter().all(|k| k.starts_with("category:")));
    }

    #[tokio::test]
    async fn scan_page_can_be_empty_before_terminal_cursor() {
        let store = LocalCacheStore::new(2);
        for key in ["a:1", "a:2", "b:1", "b:2", "b:3"] {
            store.set(key, b"1".to_vec(), None).await.unwrap();
        }
        let (next, page) = store.scan_page("b:*", 0).await.unwrap();
        assert!(page.is_empty());
        assert_ne!(next, 0);
        assert_eq!(store.scan_keys("b:*").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn scan_survives_deletes_of_visited_keys() {
        let store = LocalCacheStore::new(2);
        for key in ["category:a", "category:b", "subcategory:x", "subcategory:y"] {
            store.set(key, b"{}".to_vec(), None).await.unwrap();
        }

        let mut found = Vec::new();
        let (mut cursor, page) = store.scan_page("subcategory:*", 0).await.unwrap();
        found.extend(page);
        // Another namespace is invalidated between pages
        store.delete(&["category:a".into()]).await.unwrap();
        while cursor != 0 {
            let (next, page) = store.scan_page("subcategory:*", cursor).await.unwrap();
            found.extend(page);
            cursor = next;
        }

        found.sort();
        assert_eq!(found, vec!["subcategory:x", "subcategory:y"]);
    }

    #[tokio::test]
    async fn rewritten_key_is_still_returned() {
        let store = LocalCacheStore::new(1);
        for key in ["user:1", "user:2", "user:3"] {
            store.set(key, b"{}".to_vec(), None).await.unwrap();
        }

        let (cursor, first) = store.scan_page("user:*", 0).await.unwrap();
        assert_eq!(first, vec!["user:1"]);
        store.set("user:2", b"{}".to_vec(), None).await.unwrap();

        let mut rest = Vec::new();
        let mut cursor = cursor;
        while cursor != 0 {
            let (next, page) = store.scan_page("user:*", cursor).await.unwrap();
            rest.extend(page);
            cursor = next;
        }
        rest.sort();
        assert_eq!(rest, vec!["user:2", "user:3"]);
    }

    #[tokio::test]
    async fn entries_without_ttl_persist() {
        let store = LocalCacheStore::default();
        store.set("user:1", b"ada".to_vec(), None).await.unwrap();
        for _ in 0..5 {
            tokio::time::sleep(Duration::from_millis(5)).await;
            assert_eq!(store.get("user:1").await.unwrap(), Some(b"ada".to_vec()));
        }
    }

    #[tokio::test]
    async fn entries_with_ttl_expire() {
        let store = LocalCacheStore::default();
        store
            .set("user:1", b"ada".to_vec(), Some(Duration::from_millis(30)))
            .await
            .unwrap();
        assert!(store.get("user:1").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(store.get("user:1").await.unwrap().is_none());
        assert!(store.scan_keys("user:*").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_pattern_reports_count_and_is_idempotent() {
        let store = LocalCacheStore::new(3);
        for i in 0..10 {
            store
                .set(&format!("mediaItem:{i}"), b"{}".to_vec(), None)
                .await
                .unwrap();
        }
        store.set("mediaItemX:1", b"{}".to_vec(), None).await.unwrap();

        assert_eq!(store.delete_pattern("mediaItem:*").await.unwrap(), 10);
        assert_eq!(store.delete_pattern("mediaItem:*").await.unwrap(), 0);
        assert!(store.get("mediaItemX:1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn get_many_is_positional() {
        let store = LocalCacheStore::default();
        store.set("k:1", b"one".to_vec(), None).await.unwrap();
        store.set("k:3", b"three".to_vec(), None).await.unwrap();
        let values = store
            .get_many(&["k:1".into(), "k:2".into(), "k:3".into()])
            .await
            .unwrap();
        assert_eq!(
            values,
            vec![Some(b"one".to_vec()), None, Some(b"three".to_vec())]
        );
    }

    #[tokio::test]
    async fn closed_store_is_unavailable() {
        let store = LocalCacheStore::default();
        store.set("k:1", b"one".to_vec(), None).await.unwrap();
        store.close().await;

        assert!(!store.is_available().await);
        assert!(store.get("k:1").await.unwrap_err().is_unavailable());
        assert!(store.scan_keys("k:*").await.unwrap_err().is_unavailable());
    }
}
