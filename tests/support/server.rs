use std::sync::{Arc, Mutex};
use std::time::Duration;

use archive_client_core::api::ConnectivityListener;
use archive_client_core::download::DownloadListener;
use archive_client_core::{ClientConfig, ClientContext};
use tempfile::TempDir;
use wiremock::MockServer;

/// Connectivity listener keeping every message.
#[derive(Debug, Default)]
pub struct RecordedNotices {
    errors: Mutex<Vec<String>>,
    infos: Mutex<Vec<String>>,
}

impl RecordedNotices {
    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().expect("errors lock").clone()
    }
}

impl ConnectivityListener for RecordedNotices {
    fn on_error(&self, message: &str) {
        self.errors
            .lock()
            .expect("errors lock")
            .push(message.to_string());
    }

    fn on_info(&self, message: &str) {
        self.infos
            .lock()
            .expect("infos lock")
            .push(message.to_string());
    }
}

/// Download listener keeping every event as `kind:id[:pages]`.
#[derive(Debug, Default)]
pub struct RecordedDownloads {
    events: Mutex<Vec<String>>,
}

impl RecordedDownloads {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().expect("events lock").clone()
    }

    pub fn contains(&self, event: &str) -> bool {
        self.events().iter().any(|e| e == event)
    }

    /// Waits up to five seconds for `event`.
    pub async fn wait_for(&self, event: &str) -> bool {
        eventually(|| self.contains(event)).await
    }

    fn push(&self, event: String) {
        self.events.lock().expect("events lock").push(event);
    }
}

impl DownloadListener for RecordedDownloads {
    fn on_progress(&self, id: &str, pages: usize) {
        self.push(format!("progress:{id}:{pages}"));
    }

    fn on_complete(&self, id: &str) {
        self.push(format!("complete:{id}"));
    }

    fn on_cancelled(&self, id: &str) {
        self.push(format!("cancelled:{id}"));
    }

    fn on_removed(&self, id: &str) {
        self.push(format!("removed:{id}"));
    }
}

/// A client context on a temp directory, with notices recorded.
pub struct Harness {
    pub context: ClientContext,
    pub notices: Arc<RecordedNotices>,
    pub dir: TempDir,
}

pub async fn harness(address: &str, api_key: &str) -> Harness {
    harness_with(address, api_key, |_| {}).await
}

pub async fn harness_with(
    address: &str,
    api_key: &str,
    adjust: impl FnOnce(&mut ClientConfig),
) -> Harness {
    let dir = TempDir::new().expect("failed to create temp dir");
    let mut config = ClientConfig {
        server_address: address.to_string(),
        api_key: api_key.to_string(),
        downloads_dir: dir.path().join("downloads"),
        headers_file: dir.path().join("headers.json"),
        connect_timeout_secs: 5,
        read_timeout_secs: 10,
        job_poll_interval_ms: 10,
        ..ClientConfig::default()
    };
    adjust(&mut config);

    let notices = Arc::new(RecordedNotices::default());
    let context = ClientContext::builder(config)
        .with_listener(notices.clone())
        .build()
        .await
        .expect("context should build");
    Harness {
        context,
        notices,
        dir,
    }
}

/// Polls `condition` every 10ms for up to five seconds.
pub async fn eventually(condition: impl Fn() -> bool) -> bool {
    for _ in 0..500 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Requests received by `server` with `method` whose path starts with `prefix`.
pub async fn requests_to(server: &MockServer, method: &str, prefix: &str) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.method.as_str() == method && r.url.path().starts_with(prefix))
        .map(|r| r.url.to_string())
        .collect()
}
