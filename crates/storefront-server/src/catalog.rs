//! Cache-first read paths over the entity store.
//!
//! Reads consult the entity cache, fall back to the entity store on a miss
//! or a cache failure, and repopulate the cache with what the store
//! returned. Writes do not go through here: they go straight to the
//! (evented) storage, which invalidates through the coordinator.

use std::future::Future;

use storefront_storage::{
    Category, DynStorage, MediaItem, Page, PageParams, ProductType, StorageResult, Subcategory,
    User,
};

use crate::cache::{CacheEntity, CacheError, EntityCache, EntityCaches};

fn soft_failure<E: CacheEntity>(operation: &'static str, error: &CacheError) {
    tracing::warn!(
        operation,
        namespace = %E::NAMESPACE,
        error = %error,
        "Cache unavailable, falling back to entity store"
    );
    crate::metrics::record_cache_error(operation);
}

/// Read-through access to cached entities.
#[derive(Clone)]
pub struct Catalog {
    storage: DynStorage,
    caches: EntityCaches,
}

impl Catalog {
    pub fn new(storage: DynStorage, caches: EntityCaches) -> Self {
        Self { storage, caches }
    }

    pub fn storage(&self) -> &DynStorage {
        &self.storage
    }

    pub fn caches(&self) -> &EntityCaches {
        &self.caches
    }

    async fn read_one<E, F, Fut>(
        cache: &EntityCache<E>,
        id: &str,
        fetch: F,
    ) -> StorageResult<Option<E>>
    where
        E: CacheEntity,
        F: FnOnce() -> Fut,
        Fut: Future<Output = StorageResult<Option<E>>>,
    {
        let cache_ok = match cache.get(id).await {
            Ok(Some(hit)) => return Ok(Some(hit)),
            Ok(None) => true,
            Err(e) => {
                soft_failure::<E>("get", &e);
                false
            }
        };

        let fresh = fetch().await?;
        if let (true, Some(entity)) = (cache_ok, fresh.as_ref()) {
            if let Err(e) = cache.set(entity).await {
                soft_failure::<E>("set", &e);
            }
        }
        Ok(fresh)
    }

    async fn read_all<E, F, Fut>(cache: &EntityCache<E>, fetch: F) -> StorageResult<Vec<E>>
    where
        E: CacheEntity,
        F: FnOnce() -> Fut,
        Fut: Future<Output = StorageResult<Vec<E>>>,
    {
        let cache_ok = match cache.scan().await {
            Ok(hit) if !hit.is_empty() => return Ok(hit),
            Ok(_) => true,
            Err(e) => {
                soft_failure::<E>("scan", &e);
                false
            }
        };

        let fresh = fetch().await?;
        if cache_ok && !fresh.is_empty() {
            if let Err(e) = cache.set_all(&fresh).await {
                soft_failure::<E>("set_all", &e);
            }
        }
        Ok(fresh)
    }

    // ==================== Users ====================

    /// User by identity-provider id.
    pub async fn user(&self, auth_id: &str) -> StorageResult<Option<User>> {
        Self::read_one(&self.caches.users, auth_id, || self.storage.get_user(auth_id)).await
    }

    // ==================== Categories ====================

    pub async fn categories(&self) -> StorageResult<Vec<Category>> {
        Self::read_all(&self.caches.categories, || self.storage.list_categories()).await
    }

    pub async fn category(&self, slug: &str) -> StorageResult<Option<Category>> {
        Self::read_one(&self.caches.categories, slug, || {
            self.storage.get_category(slug)
        })
        .await
    }

    // ==================== Subcategories ====================

    pub async fn subcategories(&self) -> StorageResult<Vec<Subcategory>> {
        Self::read_all(&self.caches.subcategories, || {
            self.storage.list_subcategories()
        })
        .await
    }

    pub async fn subcategory(&self, slug: &str) -> StorageResult<Option<Subcategory>> {
        Self::read_one(&self.caches.subcategories, slug, || {
            self.storage.get_subcategory(slug)
        })
        .await
    }

    // ==================== Product types ====================

    pub async fn product_types(&self) -> StorageResult<Vec<ProductType>> {
        Self::read_all(&self.caches.product_types, || {
            self.storage.list_product_types()
        })
        .await
    }

    pub async fn product_type(&self, slug: &str) -> StorageResult<Option<ProductType>> {
        Self::read_one(&self.caches.product_types, slug, || {
            self.storage.get_product_type(slug)
        })
        .await
    }

    // ==================== Media ====================

    /// One page of media, newest first.
    ///
    /// The whole collection is cached; pages are cut from it. When the cache
    /// is unavailable the entity store paginates directly.
    pub async fn media(&self, params: &PageParams) -> StorageResult<Page<MediaItem>> {
        let all = match self.caches.media.scan().await {
            Ok(hit) if !hit.is_empty() => hit,
            Ok(_) => {
                let fresh = self.storage.list_media().await?;
                if !fresh.is_empty() {
                    if let Err(e) = self.caches.media.set_all(&fresh).await {
                        soft_failure::<MediaItem>("set_all", &e);
                    }
                }
                fresh
            }
            Err(e) => {
                soft_failure::<MediaItem>("scan", &e);
                return self.storage.paginate_media(params).await;
            }
        };
        let matching = all.into_iter().filter(|item| item.matches(params)).collect();
        Ok(Page::from_filtered(matching, params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheStore, LocalCacheStore};
    use crate::config::CacheConfig;
    use crate::invalidation::InvalidationCoordinator;
    use std::sync::Arc;
    use storefront_db_memory::InMemoryStorage;
    use storefront_storage::{
        EventedStorage, MarketStorage, NewCategory, NewMediaItem, NewSubcategory, NewUser, Role,
    };

    async fn role_of(catalog: &Catalog, auth_id: &str) -> Option<Role> {
        catalog.user(auth_id).await.unwrap().map(|user| user.role)
    }

    struct Fixture {
        store: Arc<LocalCacheStore>,
        storage: DynStorage,
        catalog: Catalog,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(LocalCacheStore::new(3));
        let caches = EntityCaches::new(store.clone(), &CacheConfig::default());
        let coordinator = Arc::new(InvalidationCoordinator::new(caches.clone()));
        let storage: DynStorage = Arc::new(EventedStorage::new(InMemoryStorage::new(), coordinator));
        let catalog = Catalog::new(storage.clone(), caches);
        Fixture {
            store,
            storage,
            catalog,
        }
    }

    fn new_category(name: &str) -> NewCategory {
        NewCategory {
            name: name.into(),
            slug: None,
            description: None,
        }
    }

    fn new_media(n: usize) -> Vec<NewMediaItem> {
        (0..n)
            .map(|i| NewMediaItem {
                url: format!("https://cdn.example.com/{i}.png"),
                alt: Some(format!("image {i}")),
                content_type: None,
            })
            .collect()
    }

    #[tokio::test]
    async fn read_through_populates_and_then_hits() {
        let f = fixture();
        let created = f.storage.create_category(&new_category("Footwear")).await.unwrap();
        assert!(f.catalog.caches().categories.get("footwear").await.unwrap().is_none());

        let first = f.catalog.category("footwear").await.unwrap();
        assert_eq!(first.as_ref(), Some(&created));
        let cached = f.catalog.caches().categories.get("footwear").await.unwrap();
        assert_eq!(cached, Some(created));
    }

    #[tokio::test]
    async fn collection_read_through_and_subcategory_fan_out() {
        let f = fixture();
        f.storage.create_category(&new_category("Footwear")).await.unwrap();
        f.storage.create_category(&new_category("Accessories")).await.unwrap();

        let listed = f.catalog.categories().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(f.catalog.caches().categories.scan().await.unwrap(), listed);

        f.storage
            .create_subcategory(&NewSubcategory {
                name: "Sneakers".into(),
                slug: None,
                category_slug: "footwear".into(),
            })
            .await
            .unwrap();
        assert!(f.catalog.caches().categories.scan().await.unwrap().is_empty());

        let refreshed = f.catalog.category("footwear").await.unwrap().unwrap();
        assert_eq!(refreshed.subcategories.len(), 1);
        assert_eq!(refreshed.subcategories[0].slug, "sneakers");
    }

    #[tokio::test]
    async fn created_category_stays_out_of_cached_collection() {
        let f = fixture();
        f.storage.create_category(&new_category("Footwear")).await.unwrap();
        assert_eq!(f.catalog.categories().await.unwrap().len(), 1);

        // Creating a category does not invalidate; the collection is stale
        f.storage.create_category(&new_category("Hats")).await.unwrap();
        assert_eq!(f.catalog.categories().await.unwrap().len(), 1);

        // Reading the new record individually makes the collection incomplete
        f.catalog.category("hats").await.unwrap();
        assert_eq!(f.catalog.categories().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn media_create_drops_cached_pages() {
        let f = fixture();
        f.storage.create_media(&new_media(12)).await.unwrap();

        let page = f.catalog.media(&PageParams::new(5, 1)).await.unwrap();
        assert_eq!((page.items, page.pages, page.data.len()), (12, 3, 5));
        assert_eq!(f.catalog.caches().media.scan().await.unwrap().len(), 12);

        f.storage.create_media(&new_media(1)).await.unwrap();
        assert!(f.catalog.caches().media.scan().await.unwrap().is_empty());
        let page = f.catalog.media(&PageParams::new(5, 1)).await.unwrap();
        assert_eq!(page.items, 13);
    }

    #[tokio::test]
    async fn cached_media_pages_match_store_pages() {
        let f = fixture();
        f.storage.create_media(&new_media(9)).await.unwrap();
        let params = PageParams::new(4, 2).with_search("IMAGE");

        let from_store = f.storage.paginate_media(&params).await.unwrap();
        let miss = f.catalog.media(&params).await.unwrap();
        let hit = f.catalog.media(&params).await.unwrap();
        assert_eq!(miss, from_store);
        assert_eq!(hit, from_store);
    }

    #[tokio::test]
    async fn reads_fall_back_when_cache_is_unavailable() {
        let f = fixture();
        f.storage.create_category(&new_category("Footwear")).await.unwrap();
        f.storage.create_media(&new_media(3)).await.unwrap();
        f.store.close().await;

        assert!(f.catalog.category("footwear").await.unwrap().is_some());
        assert_eq!(f.catalog.categories().await.unwrap().len(), 1);
        assert_eq!(f.catalog.media(&PageParams::default()).await.unwrap().items, 3);

        // Writes still succeed; invalidation failures are soft
        f.storage.create_media(&new_media(1)).await.unwrap();
        assert_eq!(f.catalog.media(&PageParams::default()).await.unwrap().items, 4);
    }

    #[tokio::test]
    async fn role_check_reads_through_without_invalidating() {
        let f = fixture();
        f.storage
            .create_user(&NewUser {
                auth_id: "idp|1".into(),
                email: "admin@example.com".into(),
                name: None,
                role: Role::Admin,
            })
            .await
            .unwrap();

        assert_eq!(role_of(&f.catalog, "idp|1").await, Some(Role::Admin));
        assert!(f.store.get("user:idp|1").await.unwrap().is_some());
        assert_eq!(role_of(&f.catalog, "idp|1").await, Some(Role::Admin));
        assert_eq!(role_of(&f.catalog, "idp|2").await, None);

        f.storage
            .update_user_role("idp|1", Role::Customer)
            .await
            .unwrap();
        assert!(f.store.get("user:idp|1").await.unwrap().is_none());
        assert_eq!(role_of(&f.catalog, "idp|1").await, Some(Role::Customer));
    }

    #[tokio::test]
    async fn undecodable_entry_is_a_soft_miss() {
        let f = fixture();
        f.storage.create_category(&new_category("Footwear")).await.unwrap();
        f.store
            .set("category:footwear", b"{not json".to_vec(), None)
            .await
            .unwrap();

        assert!(f.catalog.caches().categories.get("footwear").await.unwrap().is_none());
        assert!(f.store.get("category:footwear").await.unwrap().is_none());
        assert!(f.catalog.category("footwear").await.unwrap().is_some());
    }
}
