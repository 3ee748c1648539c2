//! Wiring of the whole client with a defined start-up and teardown order.
//!
//! Start-up: configure the server (address, credential, custom headers),
//! register the connectivity observer, then hand out the ready context.
//! Teardown ([`ClientContext::shutdown`]) cancels every scope, stops
//! downloads and unregisters the observer.

use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::api::{
    AlwaysOnline, ApiError, ConnectivityGate, ConnectivityListener, CustomHeader, HeaderStore,
    JobPoller, NetworkMonitor, NetworkObserver, Notifications, RequestFactory, ServerClient,
};
use crate::categories::CategoryHub;
use crate::config::ClientConfig;
use crate::download::{DownloadScheduler, DownloadStorage};
use crate::listing::{ArchiveCatalog, ListingBackend, SourceSelector};

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("failed to load custom headers: {0}")]
    Headers(#[from] ApiError),
}

pub struct ClientContextBuilder {
    config: ClientConfig,
    monitor: Option<Arc<dyn NetworkMonitor>>,
    listener: Option<Arc<dyn ConnectivityListener>>,
}

impl std::fmt::Debug for ClientContextBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientContextBuilder")
            .field("config", &self.config)
            .field("monitor", &self.monitor.is_some())
            .field("listener", &self.listener.is_some())
            .finish()
    }
}

impl ClientContextBuilder {
    /// Overrides the server address and API key from the config.
    #[must_use]
    pub fn configure_server(
        mut self,
        address: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        self.config.server_address = address.into();
        self.config.api_key = api_key.into();
        self
    }

    /// Source of network availability. Without one the network is assumed up.
    #[must_use]
    pub fn with_network_monitor(mut self, monitor: Arc<dyn NetworkMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Receiver of user-facing notifications. Without one they are logged.
    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn ConnectivityListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Builds the context. Must run inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError`] if the HTTP client cannot be built or the
    /// custom header file exists but is unreadable.
    pub async fn build(self) -> Result<ClientContext, ContextError> {
        let config = self.config;

        let notifications = Arc::new(Notifications::new(config.verbose_errors));
        if let Some(listener) = self.listener {
            notifications.set_listener(listener);
        }

        let gate = Arc::new(ConnectivityGate::new(Arc::clone(&notifications)));
        gate.set_server_address(&config.server_address);

        let requests = Arc::new(RequestFactory::new(
            config.connect_timeout(),
            config.read_timeout(),
        )?);
        requests.set_api_key(&config.api_key);
        let headers = HeaderStore::new(&config.headers_file);
        let custom = headers.load().await?;
        debug!(count = custom.len(), "custom headers loaded");
        requests.set_custom_headers(custom);

        let monitor = self.monitor.unwrap_or_else(|| Arc::new(AlwaysOnline));
        monitor.register(Arc::clone(&gate) as Arc<dyn NetworkObserver>);

        let root = CancellationToken::new();
        let client = ServerClient::new(
            Arc::clone(&gate),
            requests,
            notifications,
            JobPoller::new(config.job_poll_interval()),
            root.clone(),
        );
        let downloads = DownloadScheduler::new(
            client.scoped(),
            DownloadStorage::new(&config.downloads_dir),
            config.max_concurrent_downloads,
        );
        let categories = Arc::new(CategoryHub::new(client.clone()));
        let catalog = Arc::new(ArchiveCatalog::new(client.clone()));

        info!(
            server = %config.server_address,
            downloads = %config.downloads_dir.display(),
            "client ready"
        );
        Ok(ClientContext {
            config,
            root,
            client,
            headers,
            monitor,
            downloads,
            categories,
            catalog,
        })
    }
}

/// Everything a client needs, constructed once and passed around.
pub struct ClientContext {
    config: ClientConfig,
    root: CancellationToken,
    client: ServerClient,
    headers: HeaderStore,
    monitor: Arc<dyn NetworkMonitor>,
    downloads: DownloadScheduler,
    categories: Arc<CategoryHub>,
    catalog: Arc<ArchiveCatalog>,
}

impl std::fmt::Debug for ClientContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientContext")
            .field("config", &self.config)
            .field("client", &self.client)
            .field("downloads", &self.downloads)
            .finish_non_exhaustive()
    }
}

impl ClientContext {
    #[must_use]
    pub fn builder(config: ClientConfig) -> ClientContextBuilder {
        ClientContextBuilder {
            config,
            monitor: None,
            listener: None,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Client bound to the context's lifetime.
    #[must_use]
    pub fn client(&self) -> &ServerClient {
        &self.client
    }

    /// Client for one screen: cancelling the returned token (or dropping
    /// the screen and cancelling) stops every request made through it.
    #[must_use]
    pub fn screen_scope(&self) -> (CancellationToken, ServerClient) {
        let client = self.client.scoped();
        (client.scope().clone(), client)
    }

    #[must_use]
    pub fn downloads(&self) -> &DownloadScheduler {
        &self.downloads
    }

    #[must_use]
    pub fn categories(&self) -> &Arc<CategoryHub> {
        &self.categories
    }

    #[must_use]
    pub fn catalog(&self) -> &Arc<ArchiveCatalog> {
        &self.catalog
    }

    #[must_use]
    pub fn notifications(&self) -> &Arc<Notifications> {
        self.client.notifications()
    }

    /// Listing selector for a screen, following category updates and
    /// using the configured local mode.
    #[must_use]
    pub fn listing(&self, client: ServerClient) -> SourceSelector {
        let mut selector = SourceSelector::new(ListingBackend {
            client,
            catalog: Arc::clone(&self.catalog),
        })
        .with_categories(self.categories.subscribe());
        selector.set_local_mode(self.config.local_mode);
        selector
    }

    /// Points the client at another server.
    pub fn set_server(&mut self, address: &str, api_key: &str) {
        self.config.server_address = address.to_string();
        self.config.api_key = api_key.to_string();
        self.client.gate().set_server_address(address);
        self.client.requests().set_api_key(api_key);
    }

    #[must_use]
    pub fn custom_headers(&self) -> Vec<CustomHeader> {
        self.client.requests().custom_headers()
    }

    /// Persists `headers` and applies them to later requests.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Io`] if the header file cannot be written; the
    /// headers in use are left unchanged then.
    pub async fn set_custom_headers(&self, headers: Vec<CustomHeader>) -> Result<(), ApiError> {
        self.headers.save(&headers).await?;
        self.client.requests().set_custom_headers(headers);
        Ok(())
    }

    /// Cancels all work and unregisters the connectivity observer.
    pub async fn shutdown(&self) {
        self.root.cancel();
        self.downloads.shutdown().await;
        self.monitor.unregister();
        self.client.gate().on_lost();
        info!("client shut down");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    struct FakeMonitor {
        registered: AtomicUsize,
        unregistered: AtomicBool,
    }

    impl NetworkMonitor for FakeMonitor {
        fn register(&self, observer: Arc<dyn NetworkObserver>) {
            self.registered.fetch_add(1, Ordering::SeqCst);
            observer.on_available();
        }

        fn unregister(&self) {
            self.unregistered.store(true, Ordering::SeqCst);
        }
    }

    fn config(dir: &std::path::Path) -> ClientConfig {
        ClientConfig {
            downloads_dir: dir.join("downloads"),
            headers_file: dir.join("headers.json"),
            ..ClientConfig::default()
        }
    }

    #[tokio::test]
    async fn test_build_registers_and_shutdown_unregisters() {
        let dir = tempfile::TempDir::new().unwrap();
        let monitor = Arc::new(FakeMonitor::default());

        let context = ClientContext::builder(config(dir.path()))
            .configure_server("http://lrr.local:3000", "key")
            .with_network_monitor(Arc::clone(&monitor) as Arc<dyn NetworkMonitor>)
            .build()
            .await
            .unwrap();

        assert_eq!(monitor.registered.load(Ordering::SeqCst), 1);
        assert!(context.client().gate().has_network());
        assert!(!context.client().requests().credential().is_empty());

        let (screen, _client) = context.screen_scope();
        context.shutdown().await;

        assert!(screen.is_cancelled());
        assert!(monitor.unregistered.load(Ordering::SeqCst));
        assert!(!context.client().gate().has_network());
        assert!(!context.downloads().download("abc", false));
    }

    #[tokio::test]
    async fn test_custom_headers_persist_and_apply() {
        let dir = tempfile::TempDir::new().unwrap();
        let context = ClientContext::builder(config(dir.path()))
            .build()
            .await
            .unwrap();

        context
            .set_custom_headers(vec![CustomHeader::new("X-Tunnel", "1")])
            .await
            .unwrap();
        assert_eq!(context.custom_headers().len(), 1);

        let reloaded = ClientContext::builder(config(dir.path()))
            .build()
            .await
            .unwrap();
        assert_eq!(
            reloaded.custom_headers(),
            vec![CustomHeader::new("X-Tunnel", "1")]
        );
    }

    #[tokio::test]
    async fn test_screen_scope_cancels_independently() {
        let dir = tempfile::TempDir::new().unwrap();
        let context = ClientContext::builder(config(dir.path()))
            .build()
            .await
            .unwrap();

        let (first, _) = context.screen_scope();
        let (second, _) = context.screen_scope();
        first.cancel();

        assert!(!second.is_cancelled());
        assert!(!context.client().scope().is_cancelled());
    }
}
