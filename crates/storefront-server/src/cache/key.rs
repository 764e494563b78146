//! Cache key scheme.
//!
//! `{namespace}:{id}` holds one entity snapshot; the bare `{namespace}` key
//! is the collection marker. Patterns always carry the `:` separator so
//! that one namespace never matches another that shares its prefix.

use std::fmt;

/// Cached entity namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    User,
    Category,
    Subcategory,
    ProductType,
    MediaItem,
}

/// Wire names of every namespace.
pub const NAMESPACES: [&str; 5] = ["user", "category", "subcategory", "productType", "mediaItem"];

impl Namespace {
    pub const ALL: [Namespace; 5] = [
        Namespace::User,
        Namespace::Category,
        Namespace::Subcategory,
        Namespace::ProductType,
        Namespace::MediaItem,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Namespace::User => "user",
            Namespace::Category => "category",
            Namespace::Subcategory => "subcategory",
            Namespace::ProductType => "productType",
            Namespace::MediaItem => "mediaItem",
        }
    }

    /// Pattern matching every entity key of the namespace (not the marker).
    pub fn pattern(self) -> String {
        format!("{}:*", self.as_str())
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub namespace: Namespace,
    pub id: Option<String>,
}

impl CacheKey {
    pub fn entity(namespace: Namespace, id: impl Into<String>) -> Self {
        Self {
            namespace,
            id: Some(id.into()),
        }
    }

    pub fn marker(namespace: Namespace) -> Self {
        Self {
            namespace,
            id: None,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "{}:{id}", self.namespace),
            None => f.write_str(self.namespace.as_str()),
        }
    }
}
