//! Archive Client Core Library
//!
//! Client for a single archive content server: it talks to the server's JSON
//! API, polls its background jobs, downloads archives for offline reading and
//! picks the right source for archive listings.
//!
//! # Architecture
//!
//! - [`api`] - Connectivity gate, request building, transport and job polling
//! - [`categories`] - Shared category list with change notifications
//! - [`download`] - Bounded download scheduler and on-disk layout
//! - [`listing`] - Listing criteria and source strategies
//! - [`config`] - Layered client configuration
//! - [`context`] - Start-up and teardown wiring

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod categories;
pub mod config;
pub mod context;
pub mod download;
pub mod listing;
mod user_agent;

// Re-export commonly used types
pub use api::{ApiError, ConnectivityGate, JobPoller, ServerClient};
pub use categories::{CategoryHub, CategorySubscription, CategoryUpdate};
pub use config::{ClientConfig, ConfigError};
pub use context::{ClientContext, ClientContextBuilder, ContextError};
pub use download::{DownloadListener, DownloadScheduler, DownloadStorage};
pub use listing::{ArchivePage, ListingCriteria, SourceSelector, StrategyKind};
