//! Budgeting service: preview, commit, reporting and hierarchy maintenance.
//!
//! The service resolves everything the pure engines need from the store and
//! the feeds, then hands it to them. Commits for the same parent are
//! serialized by a per-parent async lock and re-checked by the store.

mod planning;
mod structure;
mod tracking;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use dashmap::DashMap;
use enerbudget_shared::types::BudgetId;
use tokio::sync::Mutex;

use crate::budget::EngineConfig;
use crate::feed::{BillingFeed, FeedPolicy, PriceFeed, ResilientFeed};
use crate::store::BudgetStore;

/// Orchestrates the budgeting engines over a store and external feeds.
pub struct BudgetingService<S, P, B> {
    store: Arc<S>,
    prices: ResilientFeed<P>,
    billing: ResilientFeed<B>,
    config: EngineConfig,
    parent_locks: DashMap<BudgetId, Arc<Mutex<()>>>,
}

impl<S, P, B> BudgetingService<S, P, B>
where
    S: BudgetStore,
    P: PriceFeed,
    B: BillingFeed,
{
    /// Creates a service.
    #[must_use]
    pub fn new(
        store: Arc<S>,
        prices: P,
        billing: B,
        config: EngineConfig,
        feed_policy: FeedPolicy,
    ) -> Self {
        Self {
            store,
            prices: ResilientFeed::new(prices, feed_policy),
            billing: ResilientFeed::new(billing, feed_policy),
            config,
            parent_locks: DashMap::new(),
        }
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the engine configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Lock serializing writes that consume a parent's funds.
    fn parent_lock(&self, parent_id: BudgetId) -> Arc<Mutex<()>> {
        self.parent_locks.entry(parent_id).or_default().clone()
    }
}
