//! Whole-archive downloads to local storage.
//!
//! [`DownloadScheduler`] runs at most a fixed number of archive downloads at
//! once (three by default), resumes partial downloads, cancels them, and
//! reports progress to registered [`DownloadListener`]s. [`DownloadStorage`]
//! owns the on-disk layout.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use archive_client_core::api::ServerClient;
//! use archive_client_core::download::{
//!     DEFAULT_MAX_CONCURRENT_DOWNLOADS, DownloadListener, DownloadScheduler, DownloadStorage,
//! };
//!
//! struct Printer;
//!
//! impl DownloadListener for Printer {
//!     fn on_progress(&self, id: &str, pages: usize) {
//!         println!("{id}: {pages} pages");
//!     }
//! }
//!
//! # async fn example(client: ServerClient) {
//! let scheduler = DownloadScheduler::new(
//!     client,
//!     DownloadStorage::new("./downloads"),
//!     DEFAULT_MAX_CONCURRENT_DOWNLOADS,
//! );
//! scheduler.add_listener(Arc::new(Printer));
//! scheduler.download("28c1ab0f", false);
//! # }
//! ```

mod listener;
mod scheduler;
mod storage;

pub use listener::{DownloadListener, ListenerId};
pub use scheduler::{DEFAULT_MAX_CONCURRENT_DOWNLOADS, DownloadScheduler};
pub use storage::DownloadStorage;
