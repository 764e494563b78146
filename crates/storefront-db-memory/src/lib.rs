//! In-memory entity store backend for the Storefront marketplace.
//!
//! This crate provides an in-memory implementation of the `MarketStorage`
//! trait from `storefront-storage`, using `DashMap` for concurrent access.
//!
//! # Example
//!
//! ```ignore
//! use storefront_db_memory::InMemoryStorage;
//! use storefront_storage::{MarketStorage, NewCategory};
//!
//! let storage = InMemoryStorage::new();
//! let category = storage
//!     .create_category(&NewCategory { name: "Footwear".into(), slug: None, description: None })
//!     .await?;
//! assert_eq!(category.slug, "footwear");
//! ```

pub mod factory;
mod market_impl;
pub mod storage;

// Re-export the MarketStorage trait for convenience
pub use storefront_storage::{MarketStorage, StorageError};

pub use factory::{StorageBackend, StorageConfig, StorageOptions, create_storage, seed_demo_data};
pub use storage::InMemoryStorage;

/// Type alias for a shareable MarketStorage instance.
pub type DynMarketStorage = std::sync::Arc<dyn MarketStorage>;

/// Creates a new, empty in-memory MarketStorage instance.
pub fn create_market_storage() -> DynMarketStorage {
    std::sync::Arc::new(InMemoryStorage::new())
}
