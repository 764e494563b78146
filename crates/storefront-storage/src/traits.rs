//! Storage traits for the marketplace entity store.
//!
//! This module defines the contract every entity store backend implements.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StorageError;
use crate::types::{
    Address, Category, CategoryUpdate, MediaItem, NewAddress, NewCategory, NewMediaItem,
    NewProduct, NewProductType, NewSubcategory, NewUser, Page, PageParams, Product, ProductType,
    Role, Subcategory, User,
};

/// The entity store: source of truth for every marketplace entity.
///
/// Lookups return `Ok(None)` for missing entities; errors are reserved for
/// infrastructure issues. Removals return the removed record so that write
/// listeners can compute what depends on it. Implementations must be
/// thread-safe (`Send + Sync`).
///
/// # Example
///
/// ```ignore
/// use storefront_storage::{MarketStorage, StorageError};
///
/// async fn category(storage: &dyn MarketStorage, slug: &str) -> Result<Category, StorageError> {
///     storage
///         .get_category(slug)
///         .await?
///         .ok_or_else(|| StorageError::not_found("Category", slug))
/// }
/// ```
#[async_trait]
pub trait MarketStorage: Send + Sync {
    // ==================== Users ====================

    /// Reads a user by identity-provider id.
    async fn get_user(&self, auth_id: &str) -> Result<Option<User>, StorageError>;

    /// Provisions a user.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::AlreadyExists` if the identity-provider id is taken.
    async fn create_user(&self, user: &NewUser) -> Result<User, StorageError>;

    /// Changes the role of an existing user.
    async fn update_user_role(&self, auth_id: &str, role: Role) -> Result<User, StorageError>;

    /// Removes a user and the addresses they own.
    async fn remove_user(&self, auth_id: &str) -> Result<User, StorageError>;

    // ==================== Categories ====================

    /// Reads a category, with its subcategories, by slug.
    async fn get_category(&self, slug: &str) -> Result<Option<Category>, StorageError>;

    /// Lists all categories ordered by name.
    async fn list_categories(&self) -> Result<Vec<Category>, StorageError>;

    async fn create_category(&self, category: &NewCategory) -> Result<Category, StorageError>;

    async fn update_category(
        &self,
        slug: &str,
        update: &CategoryUpdate,
    ) -> Result<Category, StorageError>;

    /// Removes a category and its subcategories.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if products still reference one of its
    /// subcategories.
    async fn remove_category(&self, slug: &str) -> Result<Category, StorageError>;

    // ==================== Subcategories ====================

    async fn get_subcategory(&self, slug: &str) -> Result<Option<Subcategory>, StorageError>;

    async fn list_subcategories(&self) -> Result<Vec<Subcategory>, StorageError>;

    /// Creates a subcategory under an existing category.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the parent category does not exist.
    async fn create_subcategory(
        &self,
        subcategory: &NewSubcategory,
    ) -> Result<Subcategory, StorageError>;

    async fn remove_subcategory(&self, slug: &str) -> Result<Subcategory, StorageError>;

    // ==================== Product types ====================

    async fn get_product_type(&self, slug: &str) -> Result<Option<ProductType>, StorageError>;

    async fn list_product_types(&self) -> Result<Vec<ProductType>, StorageError>;

    async fn create_product_type(
        &self,
        product_type: &NewProductType,
    ) -> Result<ProductType, StorageError>;

    async fn remove_product_type(&self, slug: &str) -> Result<ProductType, StorageError>;

    // ==================== Media ====================

    async fn get_media_item(&self, id: Uuid) -> Result<Option<MediaItem>, StorageError>;

    /// Lists all media items, newest first.
    async fn list_media(&self) -> Result<Vec<MediaItem>, StorageError>;

    /// Pages through media items, newest first, filtering on url and alt text.
    async fn paginate_media(&self, params: &PageParams) -> Result<Page<MediaItem>, StorageError>;

    /// Registers a batch of uploaded files.
    async fn create_media(&self, items: &[NewMediaItem]) -> Result<Vec<MediaItem>, StorageError>;

    async fn remove_media_item(&self, id: Uuid) -> Result<MediaItem, StorageError>;

    // ==================== Products ====================

    async fn get_product(&self, slug: &str) -> Result<Option<Product>, StorageError>;

    async fn paginate_products(&self, params: &PageParams) -> Result<Page<Product>, StorageError>;

    /// Creates a product.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the referenced subcategory or
    /// product type does not exist.
    async fn create_product(&self, product: &NewProduct) -> Result<Product, StorageError>;

    async fn remove_product(&self, slug: &str) -> Result<Product, StorageError>;

    // ==================== Addresses ====================

    async fn list_addresses(&self, auth_id: &str) -> Result<Vec<Address>, StorageError>;

    async fn create_address(
        &self,
        auth_id: &str,
        address: &NewAddress,
    ) -> Result<Address, StorageError>;

    async fn remove_address(&self, id: Uuid) -> Result<Address, StorageError>;

    // ==================== Metadata ====================

    /// Returns the name of this storage backend for logging/debugging.
    fn backend_name(&self) -> &'static str;
}
