use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use storefront_storage::{
    Address, Category, MediaItem, Product, ProductType, Subcategory, SubcategorySummary, User,
};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::factory::StorageOptions;

/// Category row without the joined subcategory list.
#[derive(Debug, Clone)]
pub(crate) struct CategoryRow {
    pub(crate) category: Category,
}

/// In-memory entity store backed by `DashMap`s.
///
/// This storage implementation provides:
/// - Lock-free concurrent reads via `DashMap`
/// - Serialized writes, so uniqueness and referential checks are atomic
/// - Category/subcategory joins computed at read time
/// - Pagination with case-insensitive search
#[derive(Debug)]
pub struct InMemoryStorage {
    /// Users keyed by identity-provider id
    pub(crate) users: DashMap<String, User>,
    /// Categories keyed by slug
    pub(crate) categories: DashMap<String, CategoryRow>,
    /// Subcategories keyed by slug
    pub(crate) subcategories: DashMap<String, Subcategory>,
    /// Product types keyed by slug
    pub(crate) product_types: DashMap<String, ProductType>,
    /// Media items keyed by id, with their insertion sequence
    pub(crate) media: DashMap<Uuid, (u64, MediaItem)>,
    /// Products keyed by slug
    pub(crate) products: DashMap<String, Product>,
    /// Addresses keyed by id
    pub(crate) addresses: DashMap<Uuid, Address>,
    /// Monotonic sequence used to order media newest-first
    sequence: AtomicU64,
    /// Held for the duration of every write
    pub(crate) write_lock: Mutex<()>,
    /// Storage configuration options
    options: StorageOptions,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStorage {
    /// Creates a new, empty in-memory storage with default options.
    pub fn new() -> Self {
        Self::with_options(StorageOptions::default())
    }

    /// Creates a new, empty in-memory storage with the given options.
    pub fn with_options(options: StorageOptions) -> Self {
        Self {
            users: DashMap::new(),
            categories: DashMap::new(),
            subcategories: DashMap::new(),
            product_types: DashMap::new(),
            media: DashMap::new(),
            products: DashMap::new(),
            addresses: DashMap::new(),
            sequence: AtomicU64::new(1),
            write_lock: Mutex::new(()),
            options,
        }
    }

    pub fn options(&self) -> &StorageOptions {
        &self.options
    }

    pub(crate) fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst)
    }

    /// Subcategory summaries of a category, ordered by name.
    pub(crate) fn subcategories_of(&self, category_id: Uuid) -> Vec<SubcategorySummary> {
        let mut summaries: Vec<SubcategorySummary> = self
            .subcategories
            .iter()
            .filter(|entry| entry.category_id == category_id)
            .map(|entry| entry.summary())
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.slug.cmp(&b.slug)));
        summaries
    }

    /// Joins a category row with its subcategories.
    pub(crate) fn assemble_category(&self, row: &CategoryRow) -> Category {
        let mut category = row.category.clone();
        category.subcategories = self.subcategories_of(category.id);
        category
    }

    pub(crate) fn find_category_by_slug(&self, slug: &str) -> Option<Category> {
        let row = self.categories.get(slug).map(|entry| entry.value().clone())?;
        Some(self.assemble_category(&row))
    }

    /// Media items ordered newest first.
    pub(crate) fn media_newest_first(&self) -> Vec<MediaItem> {
        let mut items: Vec<(u64, MediaItem)> =
            self.media.iter().map(|entry| entry.value().clone()).collect();
        items.sort_by(|a, b| b.0.cmp(&a.0));
        items.into_iter().map(|(_, item)| item).collect()
    }

    /// Number of products referencing any of the given subcategory slugs.
    pub(crate) fn products_in_subcategories(&self, slugs: &[String]) -> usize {
        self.products
            .iter()
            .filter(|entry| slugs.contains(&entry.subcategory_slug))
            .count()
    }

    /// Total number of stored entities across all types.
    pub fn count(&self) -> usize {
        self.users.len()
            + self.categories.len()
            + self.subcategories.len()
            + self.product_types.len()
            + self.media.len()
            + self.products.len()
            + self.addresses.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_storage::{
        CategoryUpdate, MarketStorage, NewAddress, NewCategory, NewMediaItem, NewProduct,
        NewProductType, NewSubcategory, NewUser, PageParams, Role, StorageError,
    };

    fn new_category(name: &str) -> NewCategory {
        NewCategory {
            name: name.to_string(),
            slug: None,
            description: None,
        }
    }

    fn new_subcategory(name: &str, category_slug: &str) -> NewSubcategory {
        NewSubcategory {
            name: name.to_string(),
            slug: None,
            category_slug: category_slug.to_string(),
        }
    }

    fn new_media(n: usize) -> Vec<NewMediaItem> {
        (0..n)
            .map(|i| NewMediaItem {
                url: format!("https://cdn.example.com/{i}.png"),
                alt: Some(format!("image {i}")),
                content_type: Some("image/png".into()),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_category_roundtrip_with_subcategories() {
        let storage = InMemoryStorage::new();
        let created = storage
            .create_category(&new_category("Footwear"))
            .await
            .unwrap();
        assert_eq!(created.slug, "footwear");
        assert!(created.subcategories.is_empty());

        storage
            .create_subcategory(&new_subcategory("Sneakers", "footwear"))
            .await
            .unwrap();
        storage
            .create_subcategory(&new_subcategory("Boots", "footwear"))
            .await
            .unwrap();

        let category = storage.get_category("footwear").await.unwrap().unwrap();
        let names: Vec<_> = category
            .subcategories
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(names, vec!["Boots", "Sneakers"]);
        assert_eq!(storage.count(), 3);
    }

    #[tokio::test]
    async fn test_conflicts_and_not_found() {
        let storage = InMemoryStorage::new();
        storage
            .create_category(&new_category("Footwear"))
            .await
            .unwrap();

        let duplicate = storage.create_category(&new_category("Footwear")).await;
        assert!(matches!(
            duplicate.unwrap_err(),
            StorageError::AlreadyExists { .. }
        ));

        let orphan = storage
            .create_subcategory(&new_subcategory("Hats", "headwear"))
            .await;
        assert!(orphan.unwrap_err().is_not_found());

        let missing = storage.remove_category("headwear").await;
        assert!(missing.unwrap_err().is_not_found());

        assert!(storage.get_category("headwear").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_category_keeps_slug() {
        let storage = InMemoryStorage::new();
        storage
            .create_category(&new_category("Footwear"))
            .await
            .unwrap();

        let updated = storage
            .update_category(
                "footwear",
                &CategoryUpdate {
                    name: Some("Shoes & Boots".into()),
                    description: Some("Everything for feet".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.slug, "footwear");
        assert_eq!(updated.name, "Shoes & Boots");
        assert_eq!(updated.description.as_deref(), Some("Everything for feet"));
    }

    #[tokio::test]
    async fn test_remove_category_cascades_and_guards_products() {
        let storage = InMemoryStorage::new();
        storage
            .create_category(&new_category("Footwear"))
            .await
            .unwrap();
        storage
            .create_subcategory(&new_subcategory("Sneakers", "footwear"))
            .await
            .unwrap();
        storage
            .create_product_type(&NewProductType {
                name: "Physical".into(),
                slug: None,
            })
            .await
            .unwrap();
        storage
            .create_product(&NewProduct {
                name: "Runner 2000".into(),
                slug: None,
                description: None,
                price_cents: 8999,
                currency: "USD".into(),
                subcategory_slug: "sneakers".into(),
                product_type_slug: "physical".into(),
                media_ids: vec![],
            })
            .await
            .unwrap();

        let blocked = storage.remove_category("footwear").await;
        assert!(matches!(blocked.unwrap_err(), StorageError::Conflict { .. }));

        storage.remove_product("runner-2000").await.unwrap();
        let removed = storage.remove_category("footwear").await.unwrap();
        assert_eq!(removed.subcategories.len(), 1);
        assert!(storage.get_subcategory("sneakers").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_media_pagination_newest_first() {
        let storage = InMemoryStorage::new();
        let created = storage.create_media(&new_media(25)).await.unwrap();
        assert_eq!(created.len(), 25);

        let page = storage
            .paginate_media(&PageParams::new(10, 1))
            .await
            .unwrap();
        assert_eq!(page.items, 25);
        assert_eq!(page.pages, 3);
        assert_eq!(page.data.len(), 10);
        assert_eq!(page.data[0].id, created[24].id);

        let searched = storage
            .paginate_media(&PageParams::new(10, 1).with_search("IMAGE 7"))
            .await
            .unwrap();
        assert_eq!(searched.items, 1);
        assert_eq!(searched.data[0].id, created[7].id);
    }

    #[tokio::test]
    async fn test_media_batch_is_validated_before_insert() {
        let storage = InMemoryStorage::new();
        let mut batch = new_media(2);
        batch.push(NewMediaItem {
            url: "not-a-url".into(),
            alt: None,
            content_type: None,
        });

        assert!(storage.create_media(&batch).await.is_err());
        assert!(storage.list_media().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_users_and_addresses() {
        let storage = InMemoryStorage::new();
        let user = storage
            .create_user(&NewUser {
                auth_id: "idp|42".into(),
                email: "ada@example.com".into(),
                name: Some("Ada".into()),
                role: Role::Customer,
            })
            .await
            .unwrap();
        assert_eq!(user.role, Role::Customer);

        let promoted = storage.update_user_role("idp|42", Role::Admin).await.unwrap();
        assert_eq!(promoted.role, Role::Admin);
        assert_eq!(promoted.id, user.id);

        storage
            .create_address(
                "idp|42",
                &NewAddress {
                    line1: "1 Main St".into(),
                    line2: None,
                    city: "Springfield".into(),
                    postal_code: "12345".into(),
                    country: "US".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(storage.list_addresses("idp|42").await.unwrap().len(), 1);

        storage.remove_user("idp|42").await.unwrap();
        assert!(storage.get_user("idp|42").await.unwrap().is_none());
        assert!(storage.list_addresses("idp|42").await.unwrap().is_empty());
    }
}
