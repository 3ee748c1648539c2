//! User-visible notifications for network failures and state changes.
//!
//! A single listener receives every notification. Without one registered,
//! messages go to the log.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{info, warn};

use super::ApiError;

/// Message shown when the device has no network.
pub const NO_CONNECTION_MESSAGE: &str = "No network connection";

/// Message shown when the network comes back after a loss.
pub const NETWORK_RESTORED_MESSAGE: &str = "Network connection restored";

/// Message shown when a page image cannot be fetched.
pub const PAGE_FAILED_MESSAGE: &str = "Page download failed";

/// Receiver of connectivity and error notifications (the UI layer).
pub trait ConnectivityListener: Send + Sync {
    fn on_error(&self, message: &str);
    fn on_info(&self, message: &str);
    /// A background refresh started (`true`) or finished (`false`).
    fn on_refresh_state(&self, _refreshing: bool) {}
}

/// Fallback listener writing to the log.
#[derive(Debug, Default)]
pub struct LogListener;

impl ConnectivityListener for LogListener {
    fn on_error(&self, message: &str) {
        warn!(%message, "server error");
    }

    fn on_info(&self, message: &str) {
        info!(%message, "server info");
    }
}

/// Routes notifications to the registered listener.
pub struct Notifications {
    listener: RwLock<Arc<dyn ConnectivityListener>>,
    verbose: AtomicBool,
}

impl std::fmt::Debug for Notifications {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifications")
            .field("verbose", &self.verbose())
            .finish_non_exhaustive()
    }
}

impl Default for Notifications {
    fn default() -> Self {
        Self::new(false)
    }
}

impl Notifications {
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self {
            listener: RwLock::new(Arc::new(LogListener)),
            verbose: AtomicBool::new(verbose),
        }
    }

    /// Replaces the registered listener.
    pub fn set_listener(&self, listener: Arc<dyn ConnectivityListener>) {
        *self
            .listener
            .write()
            .unwrap_or_else(PoisonError::into_inner) = listener;
    }

    /// Restores the log fallback.
    pub fn clear_listener(&self) {
        self.set_listener(Arc::new(LogListener));
    }

    pub fn set_verbose(&self, verbose: bool) {
        self.verbose.store(verbose, Ordering::Relaxed);
    }

    #[must_use]
    pub fn verbose(&self) -> bool {
        self.verbose.load(Ordering::Relaxed)
    }

    fn listener(&self) -> Arc<dyn ConnectivityListener> {
        Arc::clone(&self.listener.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Reports `error` under the caller's canned `message`.
    ///
    /// Silent errors (skipped calls, cancellation, undecided jobs) are dropped.
    /// Verbose mode appends the raw cause.
    pub fn report(&self, message: &str, error: &ApiError) {
        if error.is_silent() {
            return;
        }
        let text = if self.verbose() {
            format!("{message}: {error}")
        } else {
            message.to_string()
        };
        self.listener().on_error(&text);
    }

    pub fn error(&self, message: &str) {
        self.listener().on_error(message);
    }

    pub fn info(&self, message: &str) {
        self.listener().on_info(message);
    }

    pub fn refresh_state(&self, refreshing: bool) {
        self.listener().on_refresh_state(refreshing);
    }
}

/// Test listener recording every message.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingListener {
    pub(crate) errors: std::sync::Mutex<Vec<String>>,
    pub(crate) infos: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
impl RecordingListener {
    pub(crate) fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }

    pub(crate) fn infos(&self) -> Vec<String> {
        self.infos.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
impl ConnectivityListener for RecordingListener {
    fn on_error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }

    fn on_info(&self, message: &str) {
        self.infos.lock().unwrap().push(message.to_string());
    }
}
