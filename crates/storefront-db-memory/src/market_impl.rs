//! Implementation of the MarketStorage trait for InMemoryStorage.

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use storefront_storage::{
    Address, Category, CategoryUpdate, MarketStorage, MediaItem, NewAddress, NewCategory,
    NewMediaItem, NewProduct, NewProductType, NewSubcategory, NewUser, Page, PageParams, Product,
    ProductType, Role, StorageError, Subcategory, User,
};

use crate::storage::{CategoryRow, InMemoryStorage};

fn sorted_by_name<T>(mut items: Vec<T>, name: impl Fn(&T) -> &str) -> Vec<T> {
    items.sort_by(|a, b| name(a).cmp(name(b)));
    items
}

#[async_trait]
impl MarketStorage for InMemoryStorage {
    // ==================== Users ====================

    async fn get_user(&self, auth_id: &str) -> Result<Option<User>, StorageError> {
        Ok(self.users.get(auth_id).map(|entry| entry.value().clone()))
    }

    async fn create_user(&self, user: &NewUser) -> Result<User, StorageError> {
        user.validate()?;
        let _guard = self.write_lock.lock().await;

        if self.users.contains_key(&user.auth_id) {
            return Err(StorageError::already_exists("User", &user.auth_id));
        }

        let created = User {
            id: Uuid::new_v4(),
            auth_id: user.auth_id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            created_at: OffsetDateTime::now_utc(),
        };
        self.users.insert(created.auth_id.clone(), created.clone());
        Ok(created)
    }

    async fn update_user_role(&self, auth_id: &str, role: Role) -> Result<User, StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut entry = self
            .users
            .get_mut(auth_id)
            .ok_or_else(|| StorageError::not_found("User", auth_id))?;
        entry.role = role;
        Ok(entry.value().clone())
    }

    async fn remove_user(&self, auth_id: &str) -> Result<User, StorageError> {
        let _guard = self.write_lock.lock().await;
        let (_, removed) = self
            .users
            .remove(auth_id)
            .ok_or_else(|| StorageError::not_found("User", auth_id))?;
        self.addresses
            .retain(|_, address| address.user_auth_id != auth_id);
        Ok(removed)
    }

    // ==================== Categories ====================

    async fn get_category(&self, slug: &str) -> Result<Option<Category>, StorageError> {
        Ok(self.find_category_by_slug(slug))
    }

    async fn list_categories(&self) -> Result<Vec<Category>, StorageError> {
        let rows: Vec<CategoryRow> = self
            .categories
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        let categories: Vec<Category> = rows
            .iter()
            .map(|row| self.assemble_category(row))
            .collect();
        Ok(sorted_by_name(categories, |c: &Category| c.name.as_str()))
    }

    async fn create_category(&self, category: &NewCategory) -> Result<Category, StorageError> {
        category.validate()?;
        let slug = category.resolved_slug()?;
        let _guard = self.write_lock.lock().await;

        if self.categories.contains_key(&slug) {
            return Err(StorageError::already_exists("Category", slug));
        }

        let created = Category {
            id: Uuid::new_v4(),
            slug: slug.clone(),
            name: category.name.trim().to_string(),
            description: category.description.clone(),
            subcategories: Vec::new(),
            created_at: OffsetDateTime::now_utc(),
        };
        self.categories.insert(
            slug,
            CategoryRow {
                category: created.clone(),
            },
        );
        Ok(created)
    }

    async fn update_category(
        &self,
        slug: &str,
        update: &CategoryUpdate,
    ) -> Result<Category, StorageError> {
        update.validate()?;
        let _guard = self.write_lock.lock().await;

        let row = {
            let mut entry = self
                .categories
                .get_mut(slug)
                .ok_or_else(|| StorageError::not_found("Category", slug))?;
            if let Some(name) = &update.name {
                entry.category.name = name.trim().to_string();
            }
            if let Some(description) = &update.description {
                entry.category.description = Some(description.clone());
            }
            entry.value().clone()
        };
        Ok(self.assemble_category(&row))
    }

    async fn remove_category(&self, slug: &str) -> Result<Category, StorageError> {
        let _guard = self.write_lock.lock().await;

        let category = self
            .find_category_by_slug(slug)
            .ok_or_else(|| StorageError::not_found("Category", slug))?;
        let child_slugs: Vec<String> = category
            .subcategories
            .iter()
            .map(|s| s.slug.clone())
            .collect();
        let products = self.products_in_subcategories(&child_slugs);
        if products > 0 {
            return Err(StorageError::conflict(format!(
                "category '{slug}' still has {products} product(s)"
            )));
        }

        for child in &child_slugs {
            self.subcategories.remove(child);
        }
        self.categories.remove(slug);
        tracing::debug!(slug = %slug, subcategories = child_slugs.len(), "category removed");
        Ok(category)
    }

    // ==================== Subcategories ====================

    async fn get_subcategory(&self, slug: &str) -> Result<Option<Subcategory>, StorageError> {
        Ok(self
            .subcategories
            .get(slug)
            .map(|entry| entry.value().clone()))
    }

    async fn list_subcategories(&self) -> Result<Vec<Subcategory>, StorageError> {
        let all: Vec<Subcategory> = self
            .subcategories
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        Ok(sorted_by_name(all, |s: &Subcategory| s.name.as_str()))
    }

    async fn create_subcategory(
        &self,
        subcategory: &NewSubcategory,
    ) -> Result<Subcategory, StorageError> {
        subcategory.validate()?;
        let slug = subcategory.resolved_slug()?;
        let _guard = self.write_lock.lock().await;

        let category_id = self
            .categories
            .get(&subcategory.category_slug)
            .map(|entry| entry.category.id)
            .ok_or_else(|| StorageError::not_found("Category", &subcategory.category_slug))?;
        if self.subcategories.contains_key(&slug) {
            return Err(StorageError::already_exists("Subcategory", slug));
        }

        let created = Subcategory {
            id: Uuid::new_v4(),
            slug: slug.clone(),
            name: subcategory.name.trim().to_string(),
            category_id,
            category_slug: subcategory.category_slug.clone(),
            created_at: OffsetDateTime::now_utc(),
        };
        self.subcategories.insert(slug, created.clone());
        Ok(created)
    }

    async fn remove_subcategory(&self, slug: &str) -> Result<Subcategory, StorageError> {
        let _guard = self.write_lock.lock().await;

        if !self.subcategories.contains_key(slug) {
            return Err(StorageError::not_found("Subcategory", slug));
        }
        let products = self.products_in_subcategories(&[slug.to_string()]);
        if products > 0 {
            return Err(StorageError::conflict(format!(
                "subcategory '{slug}' still has {products} product(s)"
            )));
        }
        let (_, removed) = self
            .subcategories
            .remove(slug)
            .ok_or_else(|| StorageError::not_found("Subcategory", slug))?;
        Ok(removed)
    }

    // ==================== Product types ====================

    async fn get_product_type(&self, slug: &str) -> Result<Option<ProductType>, StorageError> {
        Ok(self
            .product_types
            .get(slug)
            .map(|entry| entry.value().clone()))
    }

    async fn list_product_types(&self) -> Result<Vec<ProductType>, StorageError> {
        let all: Vec<ProductType> = self
            .product_types
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        Ok(sorted_by_name(all, |t: &ProductType| t.name.as_str()))
    }

    async fn create_product_type(
        &self,
        product_type: &NewProductType,
    ) -> Result<ProductType, StorageError> {
        product_type.validate()?;
        let slug = product_type.resolved_slug()?;
        let _guard = self.write_lock.lock().await;

        if self.product_types.contains_key(&slug) {
            return Err(StorageError::already_exists("ProductType", slug));
        }

        let created = ProductType {
            id: Uuid::new_v4(),
            slug: slug.clone(),
            name: product_type.name.trim().to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        self.product_types.insert(slug, created.clone());
        Ok(created)
    }

    async fn remove_product_type(&self, slug: &str) -> Result<ProductType, StorageError> {
        let _guard = self.write_lock.lock().await;

        let in_use = self
            .products
            .iter()
            .filter(|entry| entry.product_type_slug == slug)
            .count();
        if in_use > 0 {
            return Err(StorageError::conflict(format!(
                "product type '{slug}' is used by {in_use} product(s)"
            )));
        }
        let (_, removed) = self
            .product_types
            .remove(slug)
            .ok_or_else(|| StorageError::not_found("ProductType", slug))?;
        Ok(removed)
    }

    // ==================== Media ====================

    async fn get_media_item(&self, id: Uuid) -> Result<Option<MediaItem>, StorageError> {
        Ok(self.media.get(&id).map(|entry| entry.value().1.clone()))
    }

    async fn list_media(&self) -> Result<Vec<MediaItem>, StorageError> {
        Ok(self.media_newest_first())
    }

    async fn paginate_media(&self, params: &PageParams) -> Result<Page<MediaItem>, StorageError> {
        let matching: Vec<MediaItem> = self
            .media_newest_first()
            .into_iter()
            .filter(|item| item.matches(params))
            .collect();
        Ok(Page::from_filtered(matching, params))
    }

    async fn create_media(&self, items: &[NewMediaItem]) -> Result<Vec<MediaItem>, StorageError> {
        if items.is_empty() {
            return Err(StorageError::invalid_input("media batch is empty"));
        }
        // Validate the whole batch first so a bad item inserts nothing
        for item in items {
            item.validate()?;
        }
        let _guard = self.write_lock.lock().await;

        let now = OffsetDateTime::now_utc();
        let created: Vec<MediaItem> = items
            .iter()
            .map(|item| MediaItem {
                id: Uuid::new_v4(),
                url: item.url.clone(),
                alt: item.alt.clone(),
                content_type: item.content_type.clone(),
                created_at: now,
            })
            .collect();
        for item in &created {
            self.media
                .insert(item.id, (self.next_sequence(), item.clone()));
        }
        Ok(created)
    }

    async fn remove_media_item(&self, id: Uuid) -> Result<MediaItem, StorageError> {
        let _guard = self.write_lock.lock().await;
        let (_, (_, removed)) = self
            .media
            .remove(&id)
            .ok_or_else(|| StorageError::not_found("MediaItem", id.to_string()))?;
        for mut product in self.products.iter_mut() {
            product.media_ids.retain(|media_id| *media_id != id);
        }
        Ok(removed)
    }

    // ==================== Products ====================

    async fn get_product(&self, slug: &str) -> Result<Option<Product>, StorageError> {
        Ok(self.products.get(slug).map(|entry| entry.value().clone()))
    }

    async fn paginate_products(&self, params: &PageParams) -> Result<Page<Product>, StorageError> {
        let all: Vec<Product> = self
            .products
            .iter()
            .filter(|entry| params.matches(&entry.name))
            .map(|entry| entry.value().clone())
            .collect();
        let sorted = sorted_by_name(all, |p: &Product| p.name.as_str());
        Ok(Page::from_filtered(sorted, params))
    }

    async fn create_product(&self, product: &NewProduct) -> Result<Product, StorageError> {
        product.validate()?;
        let slug = product.resolved_slug()?;
        let _guard = self.write_lock.lock().await;

        if !self.subcategories.contains_key(&product.subcategory_slug) {
            return Err(StorageError::not_found(
                "Subcategory",
                &product.subcategory_slug,
            ));
        }
        if !self.product_types.contains_key(&product.product_type_slug) {
            return Err(StorageError::not_found(
                "ProductType",
                &product.product_type_slug,
            ));
        }
        if let Some(missing) = product
            .media_ids
            .iter()
            .find(|id| !self.media.contains_key(*id))
        {
            return Err(StorageError::not_found("MediaItem", missing.to_string()));
        }
        if self.products.contains_key(&slug) {
            return Err(StorageError::already_exists("Product", slug));
        }

        let created = Product {
            id: Uuid::new_v4(),
            slug: slug.clone(),
            name: product.name.trim().to_string(),
            description: product.description.clone(),
            price_cents: product.price_cents,
            currency: product.currency.to_uppercase(),
            subcategory_slug: product.subcategory_slug.clone(),
            product_type_slug: product.product_type_slug.clone(),
            media_ids: product.media_ids.clone(),
            created_at: OffsetDateTime::now_utc(),
        };
        self.products.insert(slug, created.clone());
        Ok(created)
    }

    async fn remove_product(&self, slug: &str) -> Result<Product, StorageError> {
        let _guard = self.write_lock.lock().await;
        let (_, removed) = self
            .products
            .remove(slug)
            .ok_or_else(|| StorageError::not_found("Product", slug))?;
        Ok(removed)
    }

    // ==================== Addresses ====================

    async fn list_addresses(&self, auth_id: &str) -> Result<Vec<Address>, StorageError> {
        let mut addresses: Vec<Address> = self
            .addresses
            .iter()
            .filter(|entry| entry.user_auth_id == auth_id)
            .map(|entry| entry.value().clone())
            .collect();
        addresses.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(addresses)
    }

    async fn create_address(
        &self,
        auth_id: &str,
        address: &NewAddress,
    ) -> Result<Address, StorageError> {
        address.validate()?;
        let _guard = self.write_lock.lock().await;

        if !self.users.contains_key(auth_id) {
            return Err(StorageError::not_found("User", auth_id));
        }

        let created = Address {
            id: Uuid::new_v4(),
            user_auth_id: auth_id.to_string(),
            line1: address.line1.clone(),
            line2: address.line2.clone(),
            city: address.city.clone(),
            postal_code: address.postal_code.clone(),
            country: address.country.to_uppercase(),
            created_at: OffsetDateTime::now_utc(),
        };
        self.addresses.insert(created.id, created.clone());
        Ok(created)
    }

    async fn remove_address(&self, id: Uuid) -> Result<Address, StorageError> {
        let _guard = self.write_lock.lock().await;
        let (_, removed) = self
            .addresses
            .remove(&id)
            .ok_or_else(|| StorageError::not_found("Address", id.to_string()))?;
        Ok(removed)
    }

    fn backend_name(&self) -> &'static str {
        "in-memory"
    }
}
