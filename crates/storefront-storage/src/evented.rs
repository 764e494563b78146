//! EventedStorage - a storage wrapper that notifies a listener after writes.
//!
//! This wrapper delegates all operations to an inner storage implementation
//! and, once a write has succeeded, hands a [`WriteEvent`] to a
//! [`WriteListener`]. The listener is awaited before the write returns, so a
//! caller that sees `Ok` knows every follow-up (cache invalidation, for one)
//! has already run.
//!
//! # Example
//!
//! ```ignore
//! use storefront_storage::EventedStorage;
//!
//! let storage = EventedStorage::new(InMemoryStorage::new(), coordinator);
//!
//! // The coordinator sees WriteEvent::SubcategoryCreated before this returns
//! storage.create_subcategory(&new_subcategory).await?;
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::error::StorageError;
use crate::traits::MarketStorage;
use crate::types::{
    Address, Category, CategoryUpdate, MediaItem, NewAddress, NewCategory, NewMediaItem,
    NewProduct, NewProductType, NewSubcategory, NewUser, Page, PageParams, Product, ProductType,
    Role, Subcategory, User,
};

/// A successful write against the entity store.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteEvent {
    UserCreated(User),
    UserRoleUpdated(User),
    UserRemoved(User),
    CategoryCreated(Category),
    CategoryUpdated(Category),
    /// Carries the category as it was before removal, subcategories included.
    CategoryRemoved(Category),
    SubcategoryCreated(Subcategory),
    SubcategoryRemoved(Subcategory),
    ProductTypeCreated(ProductType),
    ProductTypeRemoved(ProductType),
    MediaCreated(Vec<MediaItem>),
    MediaRemoved(MediaItem),
    ProductCreated(Product),
    ProductRemoved(Product),
    AddressCreated(Address),
    AddressRemoved(Address),
}

impl WriteEvent {
    /// Short, stable name used in logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::UserCreated(_) => "user_created",
            Self::UserRoleUpdated(_) => "user_role_updated",
            Self::UserRemoved(_) => "user_removed",
            Self::CategoryCreated(_) => "category_created",
            Self::CategoryUpdated(_) => "category_updated",
            Self::CategoryRemoved(_) => "category_removed",
            Self::SubcategoryCreated(_) => "subcategory_created",
            Self::SubcategoryRemoved(_) => "subcategory_removed",
            Self::ProductTypeCreated(_) => "product_type_created",
            Self::ProductTypeRemoved(_) => "product_type_removed",
            Self::MediaCreated(_) => "media_created",
            Self::MediaRemoved(_) => "media_removed",
            Self::ProductCreated(_) => "product_created",
            Self::ProductRemoved(_) => "product_removed",
            Self::AddressCreated(_) => "address_created",
            Self::AddressRemoved(_) => "address_removed",
        }
    }
}

/// Receives write events after the entity store has committed them.
///
/// Listeners cannot fail the write: by the time they run the change is
/// durable, so any error must be handled (or logged) inside the listener.
#[async_trait]
pub trait WriteListener: Send + Sync {
    async fn on_write(&self, event: &WriteEvent);
}

/// A storage wrapper that notifies a listener after successful writes.
///
/// Reads are delegated untouched.
pub struct EventedStorage<S: MarketStorage> {
    /// The inner storage implementation.
    inner: S,
    /// The write listener.
    listener: Arc<dyn WriteListener>,
}

impl<S: MarketStorage> EventedStorage<S> {
    /// Create a new evented storage wrapper.
    pub fn new(inner: S, listener: Arc<dyn WriteListener>) -> Self {
        Self { inner, listener }
    }

    /// Get a reference to the inner storage.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn emit(&self, event: WriteEvent) {
        debug!(event = event.name(), "Dispatching write event");
        self.listener.on_write(&event).await;
    }
}

#[async_trait]
impl<S: MarketStorage> MarketStorage for EventedStorage<S> {
    async fn get_user(&self, auth_id: &str) -> Result<Option<User>, StorageError> {
        self.inner.get_user(auth_id).await
    }

    async fn create_user(&self, user: &NewUser) -> Result<User, StorageError> {
        let created = self.inner.create_user(user).await?;
        self.emit(WriteEvent::UserCreated(created.clone())).await;
        Ok(created)
    }

    async fn update_user_role(&self, auth_id: &str, role: Role) -> Result<User, StorageError> {
        let updated = self.inner.update_user_role(auth_id, role).await?;
        self.emit(WriteEvent::UserRoleUpdated(updated.clone())).await;
        Ok(updated)
    }

    async fn remove_user(&self, auth_id: &str) -> Result<User, StorageError> {
        let removed = self.inner.remove_user(auth_id).await?;
        self.emit(WriteEvent::UserRemoved(removed.clone())).await;
        Ok(removed)
    }

    async fn get_category(&self, slug: &str) -> Result<Option<Category>, StorageError> {
        self.inner.get_category(slug).await
    }

    async fn list_categories(&self) -> Result<Vec<Category>, StorageError> {
        self.inner.list_categories().await
    }

    async fn create_category(&self, category: &NewCategory) -> Result<Category, StorageError> {
        let created = self.inner.create_category(category).await?;
        self.emit(WriteEvent::CategoryCreated(created.clone())).await;
        Ok(created)
    }

    async fn update_category(
        &self,
        slug: &str,
        update: &CategoryUpdate,
    ) -> Result<Category, StorageError> {
        let updated = self.inner.update_category(slug, update).await?;
        self.emit(WriteEvent::CategoryUpdated(updated.clone())).await;
        Ok(updated)
    }

    async fn remove_category(&self, slug: &str) -> Result<Category, StorageError> {
        let removed = self.inner.remove_category(slug).await?;
        self.emit(WriteEvent::CategoryRemoved(removed.clone())).await;
        Ok(removed)
    }

    async fn get_subcategory(&self, slug: &str) -> Result<Option<Subcategory>, StorageError> {
        self.inner.get_subcategory(slug).await
    }

    async fn list_subcategories(&self) -> Result<Vec<Subcategory>, StorageError> {
        self.inner.list_subcategories().await
    }

    async fn create_subcategory(
        &self,
        subcategory: &NewSubcategory,
    ) -> Result<Subcategory, StorageError> {
        let created = self.inner.create_subcategory(subcategory).await?;
        self.emit(WriteEvent::SubcategoryCreated(created.clone()))
            .await;
        Ok(created)
    }

    async fn remove_subcategory(&self, slug: &str) -> Result<Subcategory, StorageError> {
        let removed = self.inner.remove_subcategory(slug).await?;
        self.emit(WriteEvent::SubcategoryRemoved(removed.clone()))
            .await;
        Ok(removed)
    }

    async fn get_product_type(&self, slug: &str) -> Result<Option<ProductType>, StorageError> {
        self.inner.get_product_type(slug).await
    }

    async fn list_product_types(&self) -> Result<Vec<ProductType>, StorageError> {
        self.inner.list_product_types().await
    }

    async fn create_product_type(
        &self,
        product_type: &NewProductType,
    ) -> Result<ProductType, StorageError> {
        let created = self.inner.create_product_type(product_type).await?;
        self.emit(WriteEvent::ProductTypeCreated(created.clone()))
            .await;
        Ok(created)
    }

    async fn remove_product_type(&self, slug: &str) -> Result<ProductType, StorageError> {
        let removed = self.inner.remove_product_type(slug).await?;
        self.emit(WriteEvent::ProductTypeRemoved(removed.clone()))
            .await;
        Ok(removed)
    }

    async fn get_media_item(&self, id: Uuid) -> Result<Option<MediaItem>, StorageError> {
        self.inner.get_media_item(id).await
    }

    async fn list_media(&self) -> Result<Vec<MediaItem>, StorageError> {
        self.inner.list_media().await
    }

    async fn paginate_media(&self, params: &PageParams) -> Result<Page<MediaItem>, StorageError> {
        self.inner.paginate_media(params).await
    }

    async fn create_media(&self, items: &[NewMediaItem]) -> Result<Vec<MediaItem>, StorageError> {
        let created = self.inner.create_media(items).await?;
        self.emit(WriteEvent::MediaCreated(created.clone())).await;
        Ok(created)
    }

    async fn remove_media_item(&self, id: Uuid) -> Result<MediaItem, StorageError> {
        let removed = self.inner.remove_media_item(id).await?;
        self.emit(WriteEvent::MediaRemoved(removed.clone())).await;
        Ok(removed)
    }

    async fn get_product(&self, slug: &str) -> Result<Option<Product>, StorageError> {
        self.inner.get_product(slug).await
    }

    async fn paginate_products(&self, params: &PageParams) -> Result<Page<Product>, StorageError> {
        self.inner.paginate_products(params).await
    }

    async fn create_product(&self, product: &NewProduct) -> Result<Product, StorageError> {
        let created = self.inner.create_product(product).await?;
        self.emit(WriteEvent::ProductCreated(created.clone())).await;
        Ok(created)
    }

    async fn remove_product(&self, slug: &str) -> Result<Product, StorageError> {
        let removed = self.inner.remove_product(slug).await?;
        self.emit(WriteEvent::ProductRemoved(removed.clone())).await;
        Ok(removed)
    }

    async fn list_addresses(&self, auth_id: &str) -> Result<Vec<Address>, StorageError> {
        self.inner.list_addresses(auth_id).await
    }

    async fn create_address(
        &self,
        auth_id: &str,
        address: &NewAddress,
    ) -> Result<Address, StorageError> {
        let created = self.inner.create_address(auth_id, address).await?;
        self.emit(WriteEvent::AddressCreated(created.clone())).await;
        Ok(created)
    }

    async fn remove_address(&self, id: Uuid) -> Result<Address, StorageError> {
        let removed = self.inner.remove_address(id).await?;
        self.emit(WriteEvent::AddressRemoved(removed.clone())).await;
        Ok(removed)
    }

    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }
}
