//! Listing criteria and the rule that maps them to a strategy.

use crate::api::{SortDirection, SortMethod};

/// Everything that decides which archives a listing shows.
///
/// Setters return `true` when the value actually changed; the selector uses
/// that to decide whether to invalidate the current result stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingCriteria {
    filter: String,
    category_id: String,
    random_count: u32,
    search_mode: bool,
    new_only: bool,
    sort: SortMethod,
    direction: SortDirection,
    local_mode: bool,
    initialized: bool,
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}

impl ListingCriteria {
    #[must_use]
    pub fn filter(&self) -> &str {
        &self.filter
    }

    #[must_use]
    pub fn category_id(&self) -> &str {
        &self.category_id
    }

    #[must_use]
    pub fn random_count(&self) -> u32 {
        self.random_count
    }

    #[must_use]
    pub fn search_mode(&self) -> bool {
        self.search_mode
    }

    #[must_use]
    pub fn new_only(&self) -> bool {
        self.new_only
    }

    #[must_use]
    pub fn sort(&self) -> SortMethod {
        self.sort
    }

    #[must_use]
    pub fn direction(&self) -> SortDirection {
        self.direction
    }

    #[must_use]
    pub fn local_mode(&self) -> bool {
        self.local_mode
    }

    #[must_use]
    pub fn initialized(&self) -> bool {
        self.initialized
    }

    pub fn set_filter(&mut self, filter: impl Into<String>) -> bool {
        replace(&mut self.filter, filter.into())
    }

    pub fn set_category_id(&mut self, id: impl Into<String>) -> bool {
        replace(&mut self.category_id, id.into())
    }

    pub fn set_random_count(&mut self, count: u32) -> bool {
        replace(&mut self.random_count, count)
    }

    pub fn set_search_mode(&mut self, enabled: bool) -> bool {
        replace(&mut self.search_mode, enabled)
    }

    pub fn set_new_only(&mut self, enabled: bool) -> bool {
        replace(&mut self.new_only, enabled)
    }

    pub fn set_sort(&mut self, sort: SortMethod) -> bool {
        replace(&mut self.sort, sort)
    }

    pub fn set_direction(&mut self, direction: SortDirection) -> bool {
        replace(&mut self.direction, direction)
    }

    pub fn set_local_mode(&mut self, enabled: bool) -> bool {
        replace(&mut self.local_mode, enabled)
    }

    pub fn set_initialized(&mut self, initialized: bool) -> bool {
        replace(&mut self.initialized, initialized)
    }

    /// Picks the strategy for these criteria. First matching rule wins:
    ///
    /// 1. not initialized: nothing
    /// 2. random count above zero: random sample
    /// 3. category selected: category
    /// 4. local mode with a filter: local filter
    /// 5. filter: server filter
    /// 6. search mode without a filter: nothing
    /// 7. everything else: default listing
    #[must_use]
    pub fn strategy_kind(&self) -> StrategyKind {
        if !self.initialized {
            StrategyKind::Empty
        } else if self.random_count > 0 {
            StrategyKind::Random
        } else if !self.category_id.is_empty() {
            StrategyKind::Category
        } else if self.local_mode && !self.filter.is_empty() {
            StrategyKind::LocalFiltered
        } else if !self.filter.is_empty() {
            StrategyKind::ServerFiltered
        } else if self.search_mode {
            StrategyKind::Empty
        } else {
            StrategyKind::Default
        }
    }
}

/// Which listing strategy a set of criteria selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    Empty,
    Random,
    Category,
    LocalFiltered,
    ServerFiltered,
    Default,
}
