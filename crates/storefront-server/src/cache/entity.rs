//! Generic per-namespace cache adapter.

use std::collections::HashSet;
use std::marker::PhantomData;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::key::{CacheKey, Namespace};
use super::store::{CacheResult, DynCacheStore};
use crate::invalidation::Invalidation;

/// Configuration of one cached entity type.
pub trait CacheEntity: Serialize + DeserializeOwned + Send + Sync + 'static {
    const NAMESPACE: Namespace;

    /// Identifier segment of the entity key.
    fn cache_id(&self) -> String;

    /// Entries of other namespaces that embed this record and must be
    /// invalidated alongside it.
    fn related(&self) -> Vec<Invalidation> {
        Vec::new()
    }
}

/// Read-through cache adapter for one entity namespace.
///
/// `get` and `scan` never populate; the caller that owns the entity store
/// fetch primes the cache with `set`/`set_all`. Undecodable values are
/// deleted and reported as misses.
pub struct EntityCache<E> {
    store: DynCacheStore,
    ttl: Option<Duration>,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for EntityCache<E> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            ttl: self.ttl,
            _entity: PhantomData,
        }
    }
}

impl<E: CacheEntity> EntityCache<E> {
    pub fn new(store: DynCacheStore, ttl: Option<Duration>) -> Self {
        Self {
            store,
            ttl,
            _entity: PhantomData,
        }
    }

    pub fn namespace(&self) -> Namespace {
        E::NAMESPACE
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    fn key(id: &str) -> String {
        CacheKey::entity(E::NAMESPACE, id).to_string()
    }

    fn marker() -> String {
        CacheKey::marker(E::NAMESPACE).to_string()
    }

    fn report_undecodable(keys: &[String], error: &serde_json::Error) {
        tracing::warn!(
            namespace = %E::NAMESPACE,
            keys = ?keys,
            error = %error,
            "Discarding undecodable cache entry"
        );
    }

    /// Deletes an undecodable key, logging instead of failing.
    async fn discard(&self, keys: &[String], error: &serde_json::Error) {
        Self::report_undecodable(keys, error);
        if let Err(e) = self.store.delete(keys).await {
            tracing::warn!(namespace = %E::NAMESPACE, error = %e, "Failed to discard cache entry");
        }
    }

    /// Cached snapshot of one record.
    pub async fn get(&self, id: &str) -> CacheResult<Option<E>> {
        let key = Self::key(id);
        let Some(data) = self.store.get(&key).await? else {
            tracing::debug!(key = %key, "cache miss");
            crate::metrics::record_cache_miss(E::NAMESPACE.as_str());
            return Ok(None);
        };
        match serde_json::from_slice::<E>(&data) {
            Ok(entity) => {
                tracing::debug!(key = %key, "cache hit");
                crate::metrics::record_cache_hit(E::NAMESPACE.as_str());
                Ok(Some(entity))
            }
            Err(e) => {
                self.discard(&[key], &e).await;
                crate::metrics::record_cache_miss(E::NAMESPACE.as_str());
                Ok(None)
            }
        }
    }

    /// The whole cached collection in the order it was primed, or empty when
    /// the collection is not completely cached.
    ///
    /// Complete means the marker written by `set_all` is present and the keys
    /// enumerated under the namespace are exactly its members.
    pub async fn scan(&self) -> CacheResult<Vec<E>> {
        let found = self.scan_members().await?;
        let label = E::NAMESPACE.as_str();
        if found.is_empty() {
            crate::metrics::record_cache_miss(label);
        } else {
            crate::metrics::record_cache_hit(label);
        }
        Ok(found)
    }

    async fn scan_members(&self) -> CacheResult<Vec<E>> {
        let marker = Self::marker();
        let Some(raw_marker) = self.store.get(&marker).await? else {
            return Ok(Vec::new());
        };
        let members: Vec<String> = match serde_json::from_slice(&raw_marker) {
            Ok(members) => members,
            Err(e) => {
                self.discard(&[marker], &e).await;
                return Ok(Vec::new());
            }
        };

        let present: HashSet<String> = self
            .store
            .scan_keys(&E::NAMESPACE.pattern())
            .await?
            .into_iter()
            .collect();
        let keys: Vec<String> = members.iter().map(|id| Self::key(id)).collect();
        if present.len() != keys.len() || !keys.iter().all(|k| present.contains(k)) {
            tracing::debug!(
                namespace = %E::NAMESPACE,
                cached = present.len(),
                members = keys.len(),
                "cached collection incomplete"
            );
            return Ok(Vec::new());
        }

        let values = self.store.get_many(&keys).await?;
        let mut entities = Vec::with_capacity(values.len());
        for (key, value) in keys.iter().zip(values) {
            // Expired or deleted between the scan and the read
            let Some(data) = value else {
                return Ok(Vec::new());
            };
            match serde_json::from_slice::<E>(&data) {
                Ok(entity) => entities.push(entity),
                Err(e) => {
                    self.discard(&[key.clone(), marker], &e).await;
                    return Ok(Vec::new());
                }
            }
        }
        Ok(entities)
    }

    /// (Re)primes one record.
    pub async fn set(&self, entity: &E) -> CacheResult<()> {
        let data = serde_json::to_vec(entity)?;
        self.store
            .set(&Self::key(&entity.cache_id()), data, self.ttl)
            .await
    }

    /// Replaces the cached collection with `entities`, preserving order.
    pub async fn set_all(&self, entities: &[E]) -> CacheResult<()> {
        let encoded = entities
            .iter()
            .map(|entity| -> CacheResult<(String, Vec<u8>)> {
                Ok((entity.cache_id(), serde_json::to_vec(entity)?))
            })
            .collect::<CacheResult<Vec<_>>>()?;

        self.drop_all().await?;
        for (id, data) in &encoded {
            self.store.set(&Self::key(id), data.clone(), self.ttl).await?;
        }
        let members: Vec<&String> = encoded.iter().map(|(id, _)| id).collect();
        self.store
            .set(&Self::marker(), serde_json::to_vec(&members)?, self.ttl)
            .await
    }

    /// Deletes one record, the collection marker, and the related entries
    /// referenced by the cached snapshot. Returns the number of keys removed.
    pub async fn remove(&self, id: &str) -> CacheResult<usize> {
        let key = Self::key(id);
        // Without a decodable snapshot the related entries are unknown; they
        // age out by TTL or the next write that touches them.
        let related = match self.store.get(&key).await? {
            Some(data) => match serde_json::from_slice::<E>(&data) {
                Ok(snapshot) => snapshot.related(),
                Err(e) => {
                    Self::report_undecodable(std::slice::from_ref(&key), &e);
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let mut removed = self.store.delete(&[key, Self::marker()]).await?;
        for invalidation in &related {
            removed += invalidation.execute(self.store.as_ref()).await?;
        }
        Ok(removed)
    }

    /// Deletes every key of the namespace, marker included. Idempotent.
    pub async fn drop_all(&self) -> CacheResult<usize> {
        let entries = self.store.delete_pattern(&E::NAMESPACE.pattern()).await?;
        let marker = self.store.delete(&[Self::marker()]).await?;
        Ok(entries + marker)
    }

    /// Deletes only the related entries of `entity`, for records that were
    /// never cached themselves.
    pub async fn invalidate_related(&self, entity: &E) -> CacheResult<usize> {
        let mut removed = 0;
        for invalidation in entity.related() {
            removed += invalidation.execute(self.store.as_ref()).await?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use storefront_storage::{Category, MediaItem, Subcategory};
    use time::OffsetDateTime;
    use uuid::Uuid;

    use super::*;
    use crate::cache::{CacheStore, LocalCacheStore};

    fn category(slug: &str) -> Category {
        Category {
            id: Uuid::new_v4(),
            slug: slug.into(),
            name: slug.into(),
            description: None,
            subcategories: Vec::new(),
            created_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    fn subcategory(slug: &str, parent: &str) -> Subcategory {
        Subcategory {
            id: Uuid::new_v4(),
            slug: slug.into(),
            name: slug.into(),
            category_id: Uuid::new_v4(),
            category_slug: parent.into(),
            created_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    fn media(n: usize) -> MediaItem {
        MediaItem {
            id: Uuid::new_v4(),
            url: format!("https://cdn.example.com/{n}.png"),
            alt: None,
            content_type: None,
            created_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    fn store() -> Arc<LocalCacheStore> {
        Arc::new(LocalCacheStore::new(2))
    }

    #[tokio::test]
    async fn drop_all_twice_is_a_no_op_the_second_time() {
        let store = store();
        let cache: EntityCache<MediaItem> = EntityCache::new(store.clone(), None);
        cache.set_all(&[media(1), media(2)]).await.unwrap();

        assert_eq!(cache.drop_all().await.unwrap(), 3);
        assert_eq!(cache.drop_all().await.unwrap(), 0);
        assert!(cache.scan().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn remove_evicts_related_parent_and_its_collection() {
        let store = store();
        let categories: EntityCache<Category> = EntityCache::new(store.clone(), None);
        let subcategories: EntityCache<Subcategory> = EntityCache::new(store.clone(), None);
        categories
            .set_all(&[category("footwear"), category("bags")])
            .await
            .unwrap();
        subcategories
            .set(&subcategory("sneakers", "footwear"))
            .await
            .unwrap();

        // entry + parent entry + parent collection marker
        assert_eq!(subcategories.remove("sneakers").await.unwrap(), 3);
        assert!(subcategories.get("sneakers").await.unwrap().is_none());
        assert!(store.get("category:footwear").await.unwrap().is_none());
        assert!(store.get("category").await.unwrap().is_none());
        assert!(categories.get("bags").await.unwrap().is_some());
        assert!(categories.scan().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn remove_with_undecodable_snapshot_still_deletes() {
        let store = store();
        let subcategories: EntityCache<Subcategory> = EntityCache::new(store.clone(), None);
        store
            .set("subcategory:sneakers", b"{broken".to_vec(), None)
            .await
            .unwrap();

        assert_eq!(subcategories.remove("sneakers").await.unwrap(), 1);
        assert!(store.get("subcategory:sneakers").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_all_replaces_previous_collection() {
        let store = store();
        let cache: EntityCache<Category> = EntityCache::new(store.clone(), None);
        cache
            .set_all(&[category("a"), category("b"), category("c")])
            .await
            .unwrap();

        let replacement = vec![category("b")];
        cache.set_all(&replacement).await.unwrap();

        assert_eq!(cache.scan().await.unwrap(), replacement);
        assert!(cache.get("a").await.unwrap().is_none());
        assert!(cache.get("c").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn scan_misses_when_an_extra_record_is_cached() {
        let store = store();
        let cache: EntityCache<Category> = EntityCache::new(store.clone(), None);
        let primed = vec![category("a"), category("b")];
        cache.set_all(&primed).await.unwrap();
        assert_eq!(cache.scan().await.unwrap(), primed);

        cache.set(&category("c")).await.unwrap();

        assert!(cache.scan().await.unwrap().is_empty());
        assert!(cache.get("c").await.unwrap().is_some());
    }
}
