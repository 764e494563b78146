//! Read-through entity cache.
//!
//! ## Architecture
//!
//! - **Cache store**: entity-agnostic key/value operations. Redis when
//!   enabled and reachable, otherwise an in-process DashMap
//! - **Entity caches**: one [`EntityCache`] per namespace (`user`,
//!   `category`, `subcategory`, `productType`, `mediaItem`)
//! - **Invalidation**: see [`crate::invalidation`]
//!
//! ## Read path
//!
//! ```text
//! GET request → EntityCache.get/scan ─hit→ snapshot
//!                      │ miss / unavailable
//!                      └→ entity store → EntityCache.set/set_all → response
//! ```
//!
//! The cache is never authoritative. Every failure is soft and falls back to
//! the entity store.

pub mod entity;
pub mod key;
pub mod local;
pub mod namespaces;
pub mod redis_store;
pub mod store;

pub use entity::{CacheEntity, EntityCache};
pub use key::{CacheKey, NAMESPACES, Namespace};
pub use local::LocalCacheStore;
pub use namespaces::EntityCaches;
pub use redis_store::RedisCacheStore;
pub use store::{CacheError, CacheResult, CacheStore, DynCacheStore};
