//! Chooses and drives the listing strategy for the current criteria.
//!
//! Every criteria change invalidates the active strategy: its cursor is
//! reset, the strategy is dropped, and the next [`SourceSelector::next_page`]
//! builds a fresh one from the criteria. Consumers watch
//! [`SourceSelector::invalidations`] to know when to reload.
//!
//! Two things suppress the automatic reset. Inside [`SourceSelector::batch`]
//! changes are collected and cause at most one invalidation when the batch
//! ends. An established random sample survives unrelated changes until
//! [`SourceSelector::force_reset`] or a new sample size.

use tokio::sync::watch;
use tracing::{debug, instrument};

use super::criteria::{ListingCriteria, StrategyKind};
use super::strategy::{ArchivePage, ListingBackend, ListingStrategy, ResetOutcome};
use crate::api::{DEFAULT_PAGE_SIZE, SortDirection, SortMethod};
use crate::categories::{CategorySubscription, CategoryUpdate};

/// Signal sent on every invalidation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Invalidation {
    /// Increases by one per invalidation.
    pub generation: u64,
    /// The dropped strategy had no cursor to restart (empty or random), so
    /// whatever was built on top of it must be rebuilt.
    pub rebuild: bool,
}

#[derive(Debug)]
pub struct SourceSelector {
    criteria: ListingCriteria,
    backend: ListingBackend,
    strategy: Option<ListingStrategy>,
    page_size: usize,
    batch_depth: u32,
    batch_dirty: bool,
    batch_force: bool,
    generation: u64,
    signal: watch::Sender<Invalidation>,
    categories: Option<CategorySubscription>,
}

impl SourceSelector {
    #[must_use]
    pub fn new(backend: ListingBackend) -> Self {
        let (signal, _) = watch::channel(Invalidation::default());
        Self {
            criteria: ListingCriteria::default(),
            backend,
            strategy: None,
            page_size: DEFAULT_PAGE_SIZE,
            batch_depth: 0,
            batch_dirty: false,
            batch_force: false,
            generation: 0,
            signal,
            categories: None,
        }
    }

    /// Follows category updates from `subscription` (see
    /// [`apply_category_update`](Self::apply_category_update)).
    #[must_use]
    pub fn with_categories(mut self, subscription: CategorySubscription) -> Self {
        self.categories = Some(subscription);
        self
    }

    /// Stops following category updates.
    pub fn detach_categories(&mut self) {
        self.categories = None;
    }

    #[must_use]
    pub fn criteria(&self) -> &ListingCriteria {
        &self.criteria
    }

    /// The strategy the current criteria select.
    #[must_use]
    pub fn active_kind(&self) -> StrategyKind {
        self.strategy
            .as_ref()
            .map_or_else(|| self.criteria.strategy_kind(), ListingStrategy::kind)
    }

    #[must_use]
    pub fn invalidations(&self) -> watch::Receiver<Invalidation> {
        self.signal.subscribe()
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Page size for local strategies; zero falls back to the default.
    pub fn set_page_size(&mut self, page_size: usize) {
        self.page_size = if page_size == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            page_size
        };
    }

    /// Marks startup configuration as done; until then nothing is listed.
    pub fn mark_initialized(&mut self) {
        let changed = self.criteria.set_initialized(true);
        self.changed(changed);
    }

    pub fn set_filter(&mut self, filter: impl Into<String>) {
        let changed = self.criteria.set_filter(filter);
        self.changed(changed);
    }

    pub fn set_category_id(&mut self, id: impl Into<String>) {
        let changed = self.criteria.set_category_id(id);
        self.changed(changed);
    }

    /// A new sample size always replaces the current sample.
    pub fn set_random_count(&mut self, count: u32) {
        if !self.criteria.set_random_count(count) {
            return;
        }
        if self.batch_depth > 0 {
            self.batch_dirty = true;
            self.batch_force = true;
            return;
        }
        self.invalidate(true);
    }

    pub fn set_search_mode(&mut self, enabled: bool) {
        let changed = self.criteria.set_search_mode(enabled);
        self.changed(changed);
    }

    pub fn set_new_only(&mut self, enabled: bool) {
        let changed = self.criteria.set_new_only(enabled);
        self.changed(changed);
    }

    pub fn set_sort(&mut self, sort: SortMethod) {
        let changed = self.criteria.set_sort(sort);
        self.changed(changed);
    }

    pub fn set_direction(&mut self, direction: SortDirection) {
        let changed = self.criteria.set_direction(direction);
        self.changed(changed);
    }

    pub fn set_local_mode(&mut self, enabled: bool) {
        let changed = self.criteria.set_local_mode(enabled);
        self.changed(changed);
    }

    /// Applies several changes with at most one invalidation at the end.
    pub fn batch<R>(&mut self, apply: impl FnOnce(&mut Self) -> R) -> R {
        self.batch_depth += 1;
        let result = apply(self);
        self.batch_depth -= 1;
        if self.batch_depth == 0 && std::mem::take(&mut self.batch_dirty) {
            let force = std::mem::take(&mut self.batch_force);
            self.invalidate(force);
        }
        result
    }

    /// Invalidates unconditionally, replacing a random sample too.
    pub fn force_reset(&mut self) {
        self.invalidate(true);
    }

    /// Reacts to a category list broadcast.
    ///
    /// If the selected category is gone from a list that is not the first
    /// one received, the selection is cleared and the listing falls through
    /// to the next rule.
    pub fn apply_category_update(&mut self, update: &CategoryUpdate) {
        let selected = self.criteria.category_id();
        if update.first_update || selected.is_empty() || update.contains(selected) {
            return;
        }
        debug!(category = %selected, "selected category was deleted");
        self.set_category_id("");
    }

    /// Applies every category update received since the last call.
    pub fn poll_categories(&mut self) {
        let mut updates = Vec::new();
        if let Some(subscription) = self.categories.as_mut() {
            while let Some(update) = subscription.try_next() {
                updates.push(update);
            }
        }
        for update in &updates {
            self.apply_category_update(update);
        }
    }

    /// Fetches the next page from the strategy the criteria select.
    ///
    /// `None` means the listing is exhausted, produces nothing, or the page
    /// could not be loaded.
    #[instrument(level = "debug", skip(self), fields(generation = self.generation))]
    pub async fn next_page(&mut self) -> Option<ArchivePage> {
        self.poll_categories();
        let strategy = self
            .strategy
            .get_or_insert_with(|| ListingStrategy::for_criteria(&self.criteria));
        strategy.next_page(&self.backend, self.page_size).await
    }

    fn changed(&mut self, changed: bool) {
        if !changed {
            return;
        }
        if self.batch_depth > 0 {
            self.batch_dirty = true;
            return;
        }
        self.invalidate(false);
    }

    fn invalidate(&mut self, force: bool) {
        if !force && matches!(self.strategy, Some(ListingStrategy::Random(_))) {
            debug!("keeping established random sample");
            return;
        }
        let rebuild = self
            .strategy
            .take()
            .is_some_and(|mut strategy| strategy.reset() == ResetOutcome::Rebuild);
        self.generation += 1;
        debug!(
            generation = self.generation,
            rebuild,
            next = ?self.criteria.strategy_kind(),
            "listing invalidated"
        );
        self.signal.send_replace(Invalidation {
            generation: self.generation,
            rebuild,
        });
    }
}
