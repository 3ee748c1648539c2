//! Archive listings driven by user criteria.
//!
//! [`ListingCriteria`] maps to exactly one [`StrategyKind`]; the
//! [`SourceSelector`] builds the matching [`ListingStrategy`], pages through
//! it, and invalidates it whenever the criteria change.

mod catalog;
mod criteria;
mod selector;
mod strategy;

pub use catalog::{ArchiveCatalog, matches_filter, query_archives};
pub use criteria::{ListingCriteria, StrategyKind};
pub use selector::{Invalidation, SourceSelector};
pub use strategy::{
    ArchivePage, ListingBackend, ListingStrategy, LocalCursor, RandomSample, ResetOutcome,
    ServerCursor,
};
