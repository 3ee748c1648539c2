//! Connectivity gate consulted before every network call.
//!
//! The gate holds two pieces of process-wide state: whether the OS reports a
//! usable network, and the configured server address. Callers that get
//! `false` from [`ConnectivityGate::can_connect`] must skip the request
//! entirely.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info};

use super::notify::{NETWORK_RESTORED_MESSAGE, NO_CONNECTION_MESSAGE, Notifications};

/// Receiver of OS network-availability callbacks.
pub trait NetworkObserver: Send + Sync {
    fn on_available(&self);
    fn on_lost(&self);
}

/// Source of OS network-availability callbacks.
pub trait NetworkMonitor: Send + Sync {
    /// Starts delivering callbacks to `observer`.
    fn register(&self, observer: Arc<dyn NetworkObserver>);
    /// Stops delivering callbacks.
    fn unregister(&self);
}

/// Monitor for hosts without availability callbacks; reports the network
/// as available once, at registration.
#[derive(Debug, Default)]
pub struct AlwaysOnline;

impl NetworkMonitor for AlwaysOnline {
    fn register(&self, observer: Arc<dyn NetworkObserver>) {
        observer.on_available();
    }

    fn unregister(&self) {}
}

#[derive(Debug)]
pub struct ConnectivityGate {
    has_network: AtomicBool,
    /// Set by a loss; the next availability callback announces the return.
    lost: AtomicBool,
    server_address: RwLock<String>,
    notifications: Arc<Notifications>,
}

impl ConnectivityGate {
    /// Creates a gate with no network and no server configured.
    #[must_use]
    pub fn new(notifications: Arc<Notifications>) -> Self {
        Self {
            has_network: AtomicBool::new(false),
            lost: AtomicBool::new(false),
            server_address: RwLock::new(String::new()),
            notifications,
        }
    }

    pub fn set_server_address(&self, address: &str) {
        let address = address.trim().to_string();
        info!(server = %address, "server address configured");
        *self
            .server_address
            .write()
            .unwrap_or_else(PoisonError::into_inner) = address;
    }

    #[must_use]
    pub fn server_address(&self) -> String {
        self.server_address
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn has_network(&self) -> bool {
        self.has_network.load(Ordering::SeqCst)
    }

    /// Decides whether a network call may proceed.
    ///
    /// - No server address: `false`, always silently.
    /// - No network: `false`; unless `silent`, a "no connection" error is emitted.
    /// - Otherwise the current network state.
    pub fn can_connect(&self, silent: bool) -> bool {
        if self.server_address().is_empty() {
            debug!("no server address configured; skipping request");
            return false;
        }
        let has_network = self.has_network();
        if !has_network && !silent {
            self.notifications.error(NO_CONNECTION_MESSAGE);
        }
        has_network
    }
}

impl NetworkObserver for ConnectivityGate {
    fn on_available(&self) {
        debug!("network available");
        self.has_network.store(true, Ordering::SeqCst);
        if self.lost.swap(false, Ordering::SeqCst) {
            info!("network restored");
            self.notifications.info(NETWORK_RESTORED_MESSAGE);
        }
    }

    fn on_lost(&self) {
        debug!("network lost");
        self.has_network.store(false, Ordering::SeqCst);
        self.lost.store(true, Ordering::SeqCst);
    }
}
