//! Entity types for the storage abstraction layer.
//!
//! These are the records the entity store hands out. The cache layer stores
//! them verbatim as JSON snapshots, so their serialized shape is also the
//! cached shape.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::StorageError;

// ==================== Users ====================

/// Marketplace role attached to a user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Customer,
    Seller,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Seller => "seller",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A marketplace user, keyed by the identity provider's user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    /// User id issued by the external identity provider.
    pub auth_id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub role: Role,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Payload for provisioning a user (sent by the identity provider webhook).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub auth_id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Role,
}

impl NewUser {
    pub fn validate(&self) -> Result<(), StorageError> {
        if self.auth_id.trim().is_empty() {
            return Err(StorageError::invalid_input("authId is required"));
        }
        if !self.email.contains('@') {
            return Err(StorageError::invalid_input("email must be a valid address"));
        }
        Ok(())
    }
}

// ==================== Catalog ====================

/// Subcategory as embedded in its parent category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubcategorySummary {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
}

/// A top-level catalog category together with its subcategories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub subcategories: Vec<SubcategorySummary>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCategory {
    pub name: String,
    /// Derived from `name` when absent.
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl NewCategory {
    pub fn validate(&self) -> Result<(), StorageError> {
        validate_name(&self.name)
    }

    pub fn resolved_slug(&self) -> Result<String, StorageError> {
        resolve_slug(self.slug.as_deref(), &self.name)
    }
}

/// Partial update of a category. The slug is immutable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl CategoryUpdate {
    pub fn validate(&self) -> Result<(), StorageError> {
        match &self.name {
            Some(name) => validate_name(name),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subcategory {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub category_id: Uuid,
    /// Slug of the owning category; also its cache identifier.
    pub category_slug: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Subcategory {
    pub fn summary(&self) -> SubcategorySummary {
        SubcategorySummary {
            id: self.id,
            slug: self.slug.clone(),
            name: self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSubcategory {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    pub category_slug: String,
}

impl NewSubcategory {
    pub fn validate(&self) -> Result<(), StorageError> {
        validate_name(&self.name)?;
        if self.category_slug.trim().is_empty() {
            return Err(StorageError::invalid_input("categorySlug is required"));
        }
        Ok(())
    }

    pub fn resolved_slug(&self) -> Result<String, StorageError> {
        resolve_slug(self.slug.as_deref(), &self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductType {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProductType {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
}

impl NewProductType {
    pub fn validate(&self) -> Result<(), StorageError> {
        validate_name(&self.name)
    }

    pub fn resolved_slug(&self) -> Result<String, StorageError> {
        resolve_slug(self.slug.as_deref(), &self.name)
    }
}

// ==================== Media ====================

/// Metadata of a file held by the external upload provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub id: Uuid,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl MediaItem {
    /// Whether the url or alt text matches the search term of `params`.
    pub fn matches(&self, params: &PageParams) -> bool {
        params.matches(&self.url) || self.alt.as_deref().is_some_and(|alt| params.matches(alt))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMediaItem {
    pub url: String,
    #[serde(default)]
    pub alt: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
}

impl NewMediaItem {
    pub fn validate(&self) -> Result<(), StorageError> {
        if !(self.url.starts_with("https://") || self.url.starts_with("http://")) {
            return Err(StorageError::invalid_input(format!(
                "media url must be absolute: {}",
                self.url
            )));
        }
        Ok(())
    }
}

// ==================== Products & addresses ====================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Price in minor currency units.
    pub price_cents: i64,
    pub currency: String,
    pub subcategory_slug: String,
    pub product_type_slug: String,
    #[serde(default)]
    pub media_ids: Vec<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub price_cents: i64,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub subcategory_slug: String,
    pub product_type_slug: String,
    #[serde(default)]
    pub media_ids: Vec<Uuid>,
}

fn default_currency() -> String {
    "USD".into()
}

impl NewProduct {
    pub fn validate(&self) -> Result<(), StorageError> {
        validate_name(&self.name)?;
        if self.price_cents < 0 {
            return Err(StorageError::invalid_input("priceCents must be >= 0"));
        }
        if self.currency.len() != 3 {
            return Err(StorageError::invalid_input(
                "currency must be a 3-letter ISO code",
            ));
        }
        Ok(())
    }

    pub fn resolved_slug(&self) -> Result<String, StorageError> {
        resolve_slug(self.slug.as_deref(), &self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub id: Uuid,
    pub user_auth_id: String,
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub city: String,
    pub postal_code: String,
    pub country: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAddress {
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

impl NewAddress {
    pub fn validate(&self) -> Result<(), StorageError> {
        for (field, value) in [
            ("line1", &self.line1),
            ("city", &self.city),
            ("postalCode", &self.postal_code),
            ("country", &self.country),
        ] {
            if value.trim().is_empty() {
                return Err(StorageError::invalid_input(format!("{field} is required")));
            }
        }
        Ok(())
    }
}

// ==================== Pagination ====================

/// Pagination and search parameters.
///
/// `page` is 1-based. `search` is a case-insensitive substring filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageParams {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default)]
    pub search: Option<String>,
}

fn default_limit() -> usize {
    20
}

fn default_page() -> usize {
    1
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            page: default_page(),
            search: None,
        }
    }
}

impl PageParams {
    /// Upper bound applied to `limit` by every backend.
    pub const MAX_LIMIT: usize = 100;

    #[must_use]
    pub fn new(limit: usize, page: usize) -> Self {
        Self {
            limit,
            page,
            search: None,
        }
    }

    #[must_use]
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    /// Limit clamped to `1..=MAX_LIMIT`.
    pub fn effective_limit(&self) -> usize {
        self.limit.clamp(1, Self::MAX_LIMIT)
    }

    /// Zero-based offset of the first item on the requested page.
    pub fn offset(&self) -> usize {
        self.page.max(1).saturating_sub(1) * self.effective_limit()
    }

    /// Returns true if `haystack` matches the search term (or there is none).
    pub fn matches(&self, haystack: &str) -> bool {
        match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(term) => haystack.to_lowercase().contains(&term.to_lowercase()),
        }
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    /// The entities on this page.
    pub data: Vec<T>,
    /// Total number of matching entities.
    pub items: usize,
    /// Total number of pages.
    pub pages: usize,
}

impl<T> Page<T> {
    /// Slices an already filtered, ordered list into the requested page.
    pub fn from_filtered(all: Vec<T>, params: &PageParams) -> Self {
        let items = all.len();
        let limit = params.effective_limit();
        let pages = items.div_ceil(limit);
        let data = all
            .into_iter()
            .skip(params.offset())
            .take(limit)
            .collect();
        Self { data, items, pages }
    }
}

// ==================== Helpers ====================

fn validate_name(name: &str) -> Result<(), StorageError> {
    if name.trim().is_empty() {
        return Err(StorageError::invalid_input("name is required"));
    }
    if name.len() > 200 {
        return Err(StorageError::invalid_input(
            "name must be 200 characters or less",
        ));
    }
    Ok(())
}

/// Returns the explicit slug if given, otherwise one derived from `name`.
pub fn resolve_slug(explicit: Option<&str>, name: &str) -> Result<String, StorageError> {
    let slug = match explicit.map(str::trim) {
        Some(s) if !s.is_empty() => slug::slugify(s),
        _ => slug::slugify(name),
    };
    if slug.is_empty() {
        return Err(StorageError::invalid_input(format!(
            "cannot derive a slug from '{name}'"
        )));
    }
    Ok(slug)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_is_derived_from_name() {
        assert_eq!(resolve_slug(None, "Running Shoes").unwrap(), "running-shoes");
        assert_eq!(
            resolve_slug(Some("Trail Runners"), "ignored").unwrap(),
            "trail-runners"
        );
        assert!(resolve_slug(None, "!!!").is_err());
    }

    #[test]
    fn page_params_offsets() {
        let params = PageParams::new(10, 3);
        assert_eq!(params.offset(), 20);

        let params = PageParams::new(0, 0);
        assert_eq!(params.effective_limit(), 1);
        assert_eq!(params.offset(), 0);

        let params = PageParams::new(1000, 1);
        assert_eq!(params.effective_limit(), PageParams::MAX_LIMIT);
    }

    #[test]
    fn page_slicing() {
        let all: Vec<u32> = (0..25).collect();
        let page = Page::from_filtered(all, &PageParams::new(10, 3));
        assert_eq!(page.data, vec![20, 21, 22, 23, 24]);
        assert_eq!(page.items, 25);
        assert_eq!(page.pages, 3);
    }

    #[test]
    fn search_is_case_insensitive() {
        let params = PageParams::default().with_search("SHOE");
        assert!(params.matches("Running shoes"));
        assert!(!params.matches("Hats"));
        assert!(PageParams::default().matches("anything"));
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        let role: Role = serde_json::from_str("\"seller\"").unwrap();
        assert_eq!(role, Role::Seller);
    }

    #[test]
    fn new_product_validation() {
        let mut product = NewProduct {
            name: "Boot".into(),
            slug: None,
            description: None,
            price_cents: 1999,
            currency: "EUR".into(),
            subcategory_slug: "boots".into(),
            product_type_slug: "physical".into(),
            media_ids: vec![],
        };
        assert!(product.validate().is_ok());
        product.price_cents = -1;
        assert!(product.validate().is_err());
    }
}
