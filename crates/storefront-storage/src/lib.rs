//! # storefront-storage
//!
//! Entity store abstraction layer for the Storefront marketplace.
//!
//! This crate defines the traits and types that every entity store backend
//! implements. It contains no backend itself; see `storefront-db-memory`.
//!
//! ## Overview
//!
//! The main trait is [`MarketStorage`], the source of truth for users,
//! categories, subcategories, product types, media items, products and
//! addresses. It offers get-by-key, create, update, remove and paginate
//! operations per entity type.
//!
//! [`EventedStorage`] wraps any backend and reports every successful write to
//! a [`WriteListener`], which is how the server keeps its read cache fresh.
//!
//! ## Example
//!
//! ```ignore
//! use storefront_storage::{MarketStorage, PageParams, StorageError};
//!
//! async fn first_media_page(storage: &dyn MarketStorage) -> Result<usize, StorageError> {
//!     let page = storage.paginate_media(&PageParams::new(20, 1)).await?;
//!     Ok(page.items)
//! }
//! ```

mod error;
pub mod evented;
mod traits;
mod types;

pub use error::{ErrorCategory, StorageError};
pub use evented::{EventedStorage, WriteEvent, WriteListener};
pub use traits::MarketStorage;
pub use types::{
    Address, Category, CategoryUpdate, MediaItem, NewAddress, NewCategory, NewMediaItem,
    NewProduct, NewProductType, NewSubcategory, NewUser, Page, PageParams, Product, ProductType,
    Role, Subcategory, SubcategorySummary, User, resolve_slug,
};

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Type alias for a shareable storage trait object.
pub type DynStorage = std::sync::Arc<dyn MarketStorage>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use storefront_storage::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{ErrorCategory, StorageError};
    pub use crate::evented::{EventedStorage, WriteEvent, WriteListener};
    pub use crate::traits::MarketStorage;
    pub use crate::types::{
        Address, Category, CategoryUpdate, MediaItem, NewAddress, NewCategory, NewMediaItem,
        NewProduct, NewProductType, NewSubcategory, NewUser, Page, PageParams, Product,
        ProductType, Role, Subcategory, SubcategorySummary, User,
    };
    pub use crate::{DynStorage, StorageResult};
}
