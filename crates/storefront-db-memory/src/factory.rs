use storefront_storage::{
    MarketStorage, NewCategory, NewMediaItem, NewProductType, NewSubcategory, StorageError,
};

use crate::InMemoryStorage;

/// Supported storage backend types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// In-memory storage implemented on top of DashMap
    InMemory,
}

/// Storage-specific configuration options.
#[derive(Debug, Clone, Default)]
pub struct StorageOptions {
    /// Populate a small demo catalog on startup.
    pub seed_demo_data: bool,
}

/// Factory configuration to construct a storage instance.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub options: StorageOptions,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::InMemory,
            options: StorageOptions::default(),
        }
    }
}

/// Create a storage instance based on the provided configuration.
///
/// For now, only the in-memory backend is supported.
pub async fn create_storage(config: &StorageConfig) -> Result<InMemoryStorage, StorageError> {
    match config.backend {
        StorageBackend::InMemory => {
            let storage = InMemoryStorage::with_options(config.options.clone());
            if config.options.seed_demo_data {
                seed_demo_data(&storage).await?;
            }
            Ok(storage)
        }
    }
}

/// Inserts a small demo catalog: two categories with subcategories, two
/// product types and a handful of media items.
pub async fn seed_demo_data(storage: &InMemoryStorage) -> Result<(), StorageError> {
    let catalog = [
        ("Footwear", &["Sneakers", "Boots"][..]),
        ("Accessories", &["Bags", "Watches", "Sunglasses"][..]),
    ];
    for (category, children) in catalog {
        let created = storage
            .create_category(&NewCategory {
                name: category.to_string(),
                slug: None,
                description: None,
            })
            .await?;
        for child in children {
            storage
                .create_subcategory(&NewSubcategory {
                    name: child.to_string(),
                    slug: None,
                    category_slug: created.slug.clone(),
                })
                .await?;
        }
    }

    for product_type in ["Physical", "Digital"] {
        storage
            .create_product_type(&NewProductType {
                name: product_type.to_string(),
                slug: None,
            })
            .await?;
    }

    let media: Vec<NewMediaItem> = (1..=6)
        .map(|i| NewMediaItem {
            url: format!("https://cdn.storefront.local/demo/{i}.jpg"),
            alt: Some(format!("Demo image {i}")),
            content_type: Some("image/jpeg".to_string()),
        })
        .collect();
    storage.create_media(&media).await?;

    tracing::info!(entities = storage.count(), "demo catalog seeded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_storage_with_seed() {
        let config = StorageConfig {
            backend: StorageBackend::InMemory,
            options: StorageOptions {
                seed_demo_data: true,
            },
        };
        let storage = create_storage(&config).await.unwrap();

        let categories = storage.list_categories().await.unwrap();
        assert_eq!(categories.len(), 2);
        assert_eq!(categories[0].slug, "accessories");
        assert_eq!(categories[0].subcategories.len(), 3);
        assert_eq!(storage.list_product_types().await.unwrap().len(), 2);
        assert_eq!(storage.list_media().await.unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_create_storage_empty_by_default() {
        let storage = create_storage(&StorageConfig::default()).await.unwrap();
        assert_eq!(storage.count(), 0);
        assert_eq!(storage.backend_name(), "in-memory");
    }
}
