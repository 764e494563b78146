//! Write-driven cache invalidation.
//!
//! Every successful entity store write is turned into an [`InvalidationPlan`]
//! and applied to the entity caches before the write returns. Planning is
//! pure; applying is best-effort: a failed step is logged and counted, and
//! the write it belongs to stays successful. Stale entries left behind are
//! bounded by the configured TTL or the next invalidation of the namespace.

use async_trait::async_trait;
use storefront_storage::{WriteEvent, WriteListener};

use crate::cache::{CacheKey, CacheResult, CacheStore, EntityCaches, Namespace};

/// One cache invalidation step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invalidation {
    /// Delete one record and the collection marker of its namespace.
    Remove { namespace: Namespace, id: String },
    /// Delete every key of a namespace.
    Drop(Namespace),
}

impl Invalidation {
    pub fn remove(namespace: Namespace, id: impl Into<String>) -> Self {
        Self::Remove {
            namespace,
            id: id.into(),
        }
    }

    pub fn namespace(&self) -> Namespace {
        match self {
            Self::Remove { namespace, .. } => *namespace,
            Self::Drop(namespace) => *namespace,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Remove { .. } => "remove",
            Self::Drop(_) => "drop",
        }
    }

    /// Runs the step directly against a store, without reading snapshots.
    pub async fn execute(&self, store: &dyn CacheStore) -> CacheResult<usize> {
        match self {
            Self::Remove { namespace, id } => {
                store
                    .delete(&[
                        CacheKey::entity(*namespace, id.as_str()).to_string(),
                        CacheKey::marker(*namespace).to_string(),
                    ])
                    .await
            }
            Self::Drop(namespace) => {
                let entries = store.delete_pattern(&namespace.pattern()).await?;
                let marker = store
                    .delete(&[CacheKey::marker(*namespace).to_string()])
                    .await?;
                Ok(entries + marker)
            }
        }
    }
}

/// Ordered, duplicate-free list of invalidation steps for one write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidationPlan {
    steps: Vec<Invalidation>,
}

impl InvalidationPlan {
    pub fn push(&mut self, step: Invalidation) {
        if !self.steps.contains(&step) {
            self.steps.push(step);
        }
    }

    pub fn extend(&mut self, steps: impl IntoIterator<Item = Invalidation>) {
        for step in steps {
            self.push(step);
        }
    }

    pub fn steps(&self) -> &[Invalidation] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Applies invalidation plans to the entity caches.
#[derive(Clone)]
pub struct InvalidationCoordinator {
    caches: EntityCaches,
}

impl InvalidationCoordinator {
    pub fn new(caches: EntityCaches) -> Self {
        Self { caches }
    }

    /// Cache keys affected by `event`.
    ///
    /// | Write                     | Invalidation                                  |
    /// |---------------------------|-----------------------------------------------|
    /// | create category           | none                                          |
    /// | update category           | category entry + collection                   |
    /// | remove category           | category entry + collection, drop subcategory |
    /// | create subcategory        | parent category entry + collection            |
    /// | remove subcategory        | own entry + collection, parent category       |
    /// | create product type       | none                                          |
    /// | remove product type       | product type entry + collection               |
    /// | create/remove media       | drop media namespace                          |
    /// | update role / remove user | user entry                                    |
    pub fn plan(event: &WriteEvent) -> InvalidationPlan {
        use crate::cache::CacheEntity;

        let mut plan = InvalidationPlan::default();
        match event {
            WriteEvent::UserRoleUpdated(user) | WriteEvent::UserRemoved(user) => {
                plan.push(Invalidation::remove(Namespace::User, user.cache_id()));
            }
            WriteEvent::CategoryUpdated(category) => {
                plan.push(Invalidation::remove(Namespace::Category, category.cache_id()));
            }
            WriteEvent::CategoryRemoved(category) => {
                plan.push(Invalidation::remove(Namespace::Category, category.cache_id()));
                // Subcategories are deleted with their category
                plan.push(Invalidation::Drop(Namespace::Subcategory));
            }
            WriteEvent::SubcategoryCreated(subcategory) => {
                plan.extend(subcategory.related());
            }
            WriteEvent::SubcategoryRemoved(subcategory) => {
                plan.push(Invalidation::remove(
                    Namespace::Subcategory,
                    subcategory.cache_id(),
                ));
                plan.extend(subcategory.related());
            }
            WriteEvent::ProductTypeRemoved(product_type) => {
                plan.push(Invalidation::remove(
                    Namespace::ProductType,
                    product_type.cache_id(),
                ));
            }
            WriteEvent::MediaCreated(_) | WriteEvent::MediaRemoved(_) => {
                plan.push(Invalidation::Drop(Namespace::MediaItem));
            }
            WriteEvent::UserCreated(_)
            | WriteEvent::CategoryCreated(_)
            | WriteEvent::ProductTypeCreated(_)
            | WriteEvent::ProductCreated(_)
            | WriteEvent::ProductRemoved(_)
            | WriteEvent::AddressCreated(_)
            | WriteEvent::AddressRemoved(_) => {}
        }
        plan
    }

    /// Applies the plan for `event`. Never fails; returns the number of keys
    /// removed.
    pub async fn apply(&self, event: &WriteEvent) -> usize {
        let plan = Self::plan(event);
        let mut removed = 0;
        for step in plan.steps() {
            match self.caches.execute(step).await {
                Ok(count) => {
                    removed += count;
                    crate::metrics::record_cache_invalidation(step.namespace().as_str(), step.kind());
                }
                Err(e) => {
                    tracing::warn!(
                        event = event.name(),
                        namespace = %step.namespace(),
                        kind = step.kind(),
                        error = %e,
                        "Cache invalidation failed; entry stays stale until TTL or next invalidation"
                    );
                    crate::metrics::record_cache_error("invalidate");
                }
            }
        }
        if !plan.is_empty() {
            tracing::debug!(event = event.name(), removed, "cache invalidated");
        }
        removed
    }
}

#[async_trait]
impl WriteListener for InvalidationCoordinator {
    async fn on_write(&self, event: &WriteEvent) {
        self.apply(event).await;
    }
}
