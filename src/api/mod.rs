//! Networking layer for the archive server.
//!
//! This module turns the server's request/response/job vocabulary into
//! cancellable async operations:
//!
//! - [`ConnectivityGate`] decides whether any call may run at all
//! - [`RequestFactory`] attaches the bearer credential and custom headers
//! - [`Transport`] bridges one HTTP round trip into a cancellable future
//! - [`JobPoller`] waits for deferred server jobs
//! - [`ServerClient`] exposes one method per endpoint
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use archive_client_core::api::{
//!     ConnectivityGate, JobPoller, Notifications, NetworkObserver, RequestFactory, ServerClient,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let notifications = Arc::new(Notifications::default());
//! let gate = Arc::new(ConnectivityGate::new(Arc::clone(&notifications)));
//! gate.set_server_address("http://lrr.local:3000");
//! gate.on_available();
//! let requests = Arc::new(RequestFactory::new(Duration::from_secs(10), Duration::from_secs(30))?);
//! let client = ServerClient::new(gate, requests, notifications, JobPoller::default(), CancellationToken::new());
//! if let Some(info) = client.server_info().await {
//!     println!("{} {}", info.name, info.version);
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod connectivity;
pub mod endpoint;
mod error;
mod headers;
mod job;
mod models;
mod notify;
mod request;
mod transport;

pub use client::ServerClient;
pub use connectivity::{AlwaysOnline, ConnectivityGate, NetworkMonitor, NetworkObserver};
pub use error::ApiError;
pub use headers::{CustomHeader, HeaderStore};
pub use job::{DEFAULT_POLL_INTERVAL, JobPoller, JobStatusSource};
pub use models::{
    ArchiveSummary, Category, DEFAULT_PAGE_SIZE, JobState, SearchQuery, SearchResult, ServerInfo,
    SortDirection, SortMethod, TagStat,
};
pub use notify::{
    ConnectivityListener, LogListener, NETWORK_RESTORED_MESSAGE, NO_CONNECTION_MESSAGE,
    Notifications, PAGE_FAILED_MESSAGE,
};
pub use request::{Credential, PreparedRequest, RequestFactory, join_url};
pub use transport::{Transport, application_error, check_status, read_bytes, read_json, read_text};
