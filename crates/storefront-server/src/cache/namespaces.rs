//! Cache configuration of each entity type and the bundle of adapters.

use storefront_storage::{Category, MediaItem, ProductType, Subcategory, User};

use super::entity::{CacheEntity, EntityCache};
use super::key::Namespace;
use super::store::{CacheResult, DynCacheStore};
use crate::config::CacheConfig;
use crate::invalidation::Invalidation;

impl CacheEntity for User {
    const NAMESPACE: Namespace = Namespace::User;

    fn cache_id(&self) -> String {
        self.auth_id.clone()
    }
}

impl CacheEntity for Category {
    const NAMESPACE: Namespace = Namespace::Category;

    fn cache_id(&self) -> String {
        self.slug.clone()
    }
}

impl CacheEntity for Subcategory {
    const NAMESPACE: Namespace = Namespace::Subcategory;

    fn cache_id(&self) -> String {
        self.slug.clone()
    }

    /// The parent category snapshot embeds this subcategory's summary.
    fn related(&self) -> Vec<Invalidation> {
        vec![Invalidation::remove(
            Namespace::Category,
            self.category_slug.clone(),
        )]
    }
}

impl CacheEntity for ProductType {
    const NAMESPACE: Namespace = Namespace::ProductType;

    fn cache_id(&self) -> String {
        self.slug.clone()
    }
}

impl CacheEntity for MediaItem {
    const NAMESPACE: Namespace = Namespace::MediaItem;

    fn cache_id(&self) -> String {
        self.id.to_string()
    }
}

/// One adapter per cached namespace over a shared store.
#[derive(Clone)]
pub struct EntityCaches {
    pub users: EntityCache<User>,
    pub categories: EntityCache<Category>,
    pub subcategories: EntityCache<Subcategory>,
    pub product_types: EntityCache<ProductType>,
    pub media: EntityCache<MediaItem>,
    store: DynCacheStore,
}

impl EntityCaches {
    pub fn new(store: DynCacheStore, config: &CacheConfig) -> Self {
        let ttl = |ns: Namespace| config.ttl_for(ns.as_str());
        Self {
            users: EntityCache::new(store.clone(), ttl(Namespace::User)),
            categories: EntityCache::new(store.clone(), ttl(Namespace::Category)),
            subcategories: EntityCache::new(store.clone(), ttl(Namespace::Subcategory)),
            product_types: EntityCache::new(store.clone(), ttl(Namespace::ProductType)),
            media: EntityCache::new(store.clone(), ttl(Namespace::MediaItem)),
            store,
        }
    }

    pub fn store(&self) -> &DynCacheStore {
        &self.store
    }

    /// Removes one record through its namespace adapter.
    pub async fn remove(&self, namespace: Namespace, id: &str) -> CacheResult<usize> {
        match namespace {
            Namespace::User => self.users.remove(id).await,
            Namespace::Category => self.categories.remove(id).await,
            Namespace::Subcategory => self.subcategories.remove(id).await,
            Namespace::ProductType => self.product_types.remove(id).await,
            Namespace::MediaItem => self.media.remove(id).await,
        }
    }

    /// Drops a whole namespace through its adapter.
    pub async fn drop_all(&self, namespace: Namespace) -> CacheResult<usize> {
        match namespace {
            Namespace::User => self.users.drop_all().await,
            Namespace::Category => self.categories.drop_all().await,
            Namespace::Subcategory => self.subcategories.drop_all().await,
            Namespace::ProductType => self.product_types.drop_all().await,
            Namespace::MediaItem => self.media.drop_all().await,
        }
    }

    pub async fn execute(&self, invalidation: &Invalidation) -> CacheResult<usize> {
        match invalidation {
            Invalidation::Remove { namespace, id } => self.remove(*namespace, id).await,
            Invalidation::Drop(namespace) => self.drop_all(*namespace).await,
        }
    }
}
