//! Listing strategies: one paging source per selection rule.

use std::sync::Arc;

use tracing::debug;

use super::catalog::{ArchiveCatalog, query_archives};
use super::criteria::{ListingCriteria, StrategyKind};
use crate::api::{ArchiveSummary, SearchQuery, ServerClient, SortDirection, SortMethod};

/// One page of a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchivePage {
    pub archives: Vec<ArchiveSummary>,
    /// Size of the whole result set, not just this page.
    pub total: u64,
}

/// What a reset did to a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetOutcome {
    /// The strategy restarted from its first page.
    CursorCleared,
    /// The strategy has nothing to restart; its consumer must rebuild.
    Rebuild,
}

/// Where the archives of a listing come from.
#[derive(Debug, Clone)]
pub struct ListingBackend {
    pub client: ServerClient,
    pub catalog: Arc<ArchiveCatalog>,
}

/// Paging over `GET /api/search`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerCursor {
    query: SearchQuery,
    exhausted: bool,
}

impl ServerCursor {
    fn new(query: SearchQuery) -> Self {
        Self {
            query,
            exhausted: false,
        }
    }

    #[must_use]
    pub fn query(&self) -> &SearchQuery {
        &self.query
    }

    async fn next_page(&mut self, client: &ServerClient) -> Option<ArchivePage> {
        if self.exhausted {
            return None;
        }
        // A failed page leaves the cursor in place so it can be retried.
        let result = client.search(&self.query).await?;
        self.query.start += result.data.len();
        let total = result.records_filtered;
        if result.data.is_empty() || self.query.start as u64 >= total {
            self.exhausted = true;
        }
        Some(ArchivePage {
            archives: result.data,
            total,
        })
    }

    fn reset(&mut self) {
        self.query.start = 0;
        self.exhausted = false;
    }
}

/// Paging over the local catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalCursor {
    filter: String,
    new_only: bool,
    sort: SortMethod,
    direction: SortDirection,
    offset: usize,
    exhausted: bool,
}

impl LocalCursor {
    async fn next_page(
        &mut self,
        catalog: &ArchiveCatalog,
        page_size: usize,
    ) -> Option<ArchivePage> {
        if self.exhausted {
            return None;
        }
        let archives = catalog.archives().await?;
        let selected = query_archives(
            &archives,
            &self.filter,
            self.new_only,
            self.sort,
            self.direction,
        );
        let start = self.offset.min(selected.len());
        let end = (start + page_size.max(1)).min(selected.len());
        let page = selected[start..end].to_vec();
        self.offset = end;
        self.exhausted = end >= selected.len();
        Some(ArchivePage {
            archives: page,
            total: selected.len() as u64,
        })
    }
}

/// One random sample, fetched once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RandomSample {
    filter: String,
    category: String,
    count: u32,
    fetched: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingStrategy {
    Empty,
    Random(RandomSample),
    Category(ServerCursor),
    LocalFiltered(LocalCursor),
    ServerFiltered(ServerCursor),
    DefaultServer(ServerCursor),
    DefaultLocal(LocalCursor),
}

impl ListingStrategy {
    /// Builds the strategy `criteria` selects.
    #[must_use]
    pub fn for_criteria(criteria: &ListingCriteria) -> Self {
        let search = |filter: &str, category: &str| SearchQuery {
            filter: filter.to_string(),
            category: category.to_string(),
            new_only: criteria.new_only(),
            sort: criteria.sort(),
            direction: criteria.direction(),
            start: 0,
        };
        let local = |filter: &str| LocalCursor {
            filter: filter.to_string(),
            new_only: criteria.new_only(),
            sort: criteria.sort(),
            direction: criteria.direction(),
            offset: 0,
            exhausted: false,
        };

        match criteria.strategy_kind() {
            StrategyKind::Empty => Self::Empty,
            StrategyKind::Random => Self::Random(RandomSample {
                filter: criteria.filter().to_string(),
                category: criteria.category_id().to_string(),
                count: criteria.random_count(),
                fetched: false,
            }),
            StrategyKind::Category => {
                Self::Category(ServerCursor::new(search("", criteria.category_id())))
            }
            StrategyKind::LocalFiltered => Self::LocalFiltered(local(criteria.filter())),
            StrategyKind::ServerFiltered => {
                Self::ServerFiltered(ServerCursor::new(search(criteria.filter(), "")))
            }
            StrategyKind::Default if criteria.local_mode() => Self::DefaultLocal(local("")),
            StrategyKind::Default => Self::DefaultServer(ServerCursor::new(search("", ""))),
        }
    }

    #[must_use]
    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::Empty => StrategyKind::Empty,
            Self::Random(_) => StrategyKind::Random,
            Self::Category(_) => StrategyKind::Category,
            Self::LocalFiltered(_) => StrategyKind::LocalFiltered,
            Self::ServerFiltered(_) => StrategyKind::ServerFiltered,
            Self::DefaultServer(_) | Self::DefaultLocal(_) => StrategyKind::Default,
        }
    }

    /// Produces the next page, or `None` once exhausted or on failure.
    pub async fn next_page(
        &mut self,
        backend: &ListingBackend,
        page_size: usize,
    ) -> Option<ArchivePage> {
        match self {
            Self::Empty => None,
            Self::Random(sample) => {
                if sample.fetched {
                    return None;
                }
                let archives = backend
                    .client
                    .random(&sample.filter, &sample.category, sample.count)
                    .await?;
                sample.fetched = true;
                debug!(count = archives.len(), "random sample fetched");
                Some(ArchivePage {
                    total: archives.len() as u64,
                    archives,
                })
            }
            Self::Category(cursor) | Self::ServerFiltered(cursor) | Self::DefaultServer(cursor) => {
                cursor.next_page(&backend.client).await
            }
            Self::LocalFiltered(cursor) | Self::DefaultLocal(cursor) => {
                cursor.next_page(&backend.catalog, page_size).await
            }
        }
    }

    /// Restarts paging where the strategy has a cursor.
    pub fn reset(&mut self) -> ResetOutcome {
        match self {
            Self::Empty | Self::Random(_) => ResetOutcome::Rebuild,
            Self::Category(cursor) | Self::ServerFiltered(cursor) | Self::DefaultServer(cursor) => {
                cursor.reset();
                ResetOutcome::CursorCleared
            }
            Self::LocalFiltered(cursor) | Self::DefaultLocal(cursor) => {
                cursor.offset = 0;
                cursor.exhausted = false;
                ResetOutcome::CursorCleared
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn criteria() -> ListingCriteria {
        let mut criteria = ListingCriteria::default();
        criteria.set_initialized(true);
        criteria
    }

    #[test]
    fn test_category_strategy_carries_sort_and_new_only() {
        let mut criteria = criteria();
        criteria.set_category_id("SET_1");
        criteria.set_filter("ignored");
        criteria.set_new_only(true);
        criteria.set_sort(SortMethod::DateAdded);

        let ListingStrategy::Category(cursor) = ListingStrategy::for_criteria(&criteria) else {
            panic!("expected category strategy");
        };
        assert_eq!(cursor.query().category, "SET_1");
        assert_eq!(cursor.query().filter, "");
        assert!(cursor.query().new_only);
        assert_eq!(cursor.query().sort, SortMethod::DateAdded);
    }

    #[test]
    fn test_default_follows_local_mode() {
        let mut criteria = criteria();
        assert_eq!(
            ListingStrategy::for_criteria(&criteria).kind(),
            StrategyKind::Default
        );
        criteria.set_local_mode(true);
        assert!(matches!(
            ListingStrategy::for_criteria(&criteria),
            ListingStrategy::DefaultLocal(_)
        ));
    }

    #[test]
    fn test_reset_distinguishes_terminal_strategies() {
        let mut criteria = criteria();
        criteria.set_filter("x");
        assert_eq!(
            ListingStrategy::for_criteria(&criteria).reset(),
            ResetOutcome::CursorCleared
        );
        criteria.set_random_count(4);
        assert_eq!(
            ListingStrategy::for_criteria(&criteria).reset(),
            ResetOutcome::Rebuild
        );
        assert_eq!(ListingStrategy::Empty.reset(), ResetOutcome::Rebuild);
    }

    #[tokio::test]
    async fn test_local_cursor_pages_through_catalog() {
        let client = ServerClient::for_tests("");
        let catalog = Arc::new(ArchiveCatalog::new(client.clone()));
        let archives = (0..5)
            .map(|i| ArchiveSummary {
                id: i.to_string(),
                title: format!("title {i}"),
                tags: String::new(),
                isnew: false,
                pagecount: 0,
                progress: 0,
            })
            .collect();
        catalog.replace(archives).await;
        let backend = ListingBackend { client, catalog };

        let mut criteria = criteria();
        criteria.set_local_mode(true);
        let mut strategy = ListingStrategy::for_criteria(&criteria);

        let first = strategy.next_page(&backend, 2).await;
        let second = strategy.next_page(&backend, 2).await;
        let third = strategy.next_page(&backend, 2).await;
        let fourth = strategy.next_page(&backend, 2).await;

        let sizes: Vec<usize> = [&first, &second, &third]
            .iter()
            .map(|page| page.as_ref().map_or(0, |p| p.archives.len()))
            .collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(first.map(|p| p.total), Some(5));
        assert!(fourth.is_none());

        assert_eq!(strategy.reset(), ResetOutcome::CursorCleared);
        assert!(strategy.next_page(&backend, 2).await.is_some());
    }
}
