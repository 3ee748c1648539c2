//! Bounded scheduler for whole-archive downloads.
//!
//! Each archive download is one spawned task. A task deletes (on overwrite)
//! and creates its directories, then waits for one of the scheduler's
//! permits, so at most `capacity` archives transfer at the same time. Holding
//! the permit, it asks the server for the page list and walks it in index
//! order, fetching each page and its thumbnail concurrently and writing both
//! before moving on.
//!
//! Cancelling a task aborts it wherever it is: waiting for a permit, inside a
//! request, or halfway through a file. Files already on disk stay there for a
//! later [`DownloadScheduler::resume_download`].

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::StreamExt;
use reqwest::Response;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::{Semaphore, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::listener::{DownloadListener, Event, ListenerId, spawn_dispatcher};
use super::storage::DownloadStorage;
use crate::api::{ApiError, PAGE_FAILED_MESSAGE, ServerClient};

/// Number of archives downloaded at the same time by default.
pub const DEFAULT_MAX_CONCURRENT_DOWNLOADS: usize = 3;

#[derive(Debug)]
struct ActiveDownload {
    token: CancellationToken,
    handle: JoinHandle<()>,
    pages: Arc<AtomicUsize>,
    generation: u64,
}

#[derive(Debug, Clone, Copy)]
enum Start {
    Fresh { overwrite: bool },
    Resume { from: usize },
}

enum Outcome {
    Completed(usize),
    Aborted,
    Failed(ApiError),
}

#[derive(Debug)]
struct Inner {
    client: ServerClient,
    storage: DownloadStorage,
    permits: Arc<Semaphore>,
    capacity: usize,
    active: Mutex<HashMap<String, ActiveDownload>>,
    events: mpsc::UnboundedSender<Event>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    next_generation: AtomicU64,
    next_listener: AtomicU64,
}

impl Inner {
    fn active(&self) -> MutexGuard<'_, HashMap<String, ActiveDownload>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: Event) {
        // Fails only after shutdown.
        let _ = self.events.send(event);
    }

    /// Stores the counter and emits under the map lock so listener replay
    /// and live progress cannot interleave.
    fn record_progress(&self, id: &str, counter: &AtomicUsize, pages: usize) {
        let _active = self.active();
        counter.store(pages, Ordering::SeqCst);
        self.emit(Event::Progress {
            archive: id.to_string(),
            pages,
        });
    }

    /// Drops the map entry unless a newer task for the same id replaced it.
    fn finish(&self, id: &str, generation: u64) {
        let mut active = self.active();
        if active.get(id).is_some_and(|a| a.generation == generation) {
            active.remove(id);
        }
    }
}

/// Runs archive downloads under a global concurrency limit.
///
/// Must be created inside a tokio runtime: it spawns its listener
/// dispatcher immediately.
#[derive(Debug, Clone)]
pub struct DownloadScheduler {
    inner: Arc<Inner>,
}

impl DownloadScheduler {
    /// Creates a scheduler running at most `capacity` downloads at once
    /// (at least one). Download requests use child scopes of `client`'s scope.
    #[must_use]
    pub fn new(client: ServerClient, storage: DownloadStorage, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (events, dispatcher) = spawn_dispatcher();
        Self {
            inner: Arc::new(Inner {
                client,
                storage,
                permits: Arc::new(Semaphore::new(capacity)),
                capacity,
                active: Mutex::new(HashMap::new()),
                events,
                dispatcher: Mutex::new(Some(dispatcher)),
                next_generation: AtomicU64::new(0),
                next_listener: AtomicU64::new(0),
            }),
        }
    }

    #[must_use]
    pub fn storage(&self) -> &DownloadStorage {
        &self.inner.storage
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Permits not held by a running download.
    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.inner.permits.available_permits()
    }

    /// Starts downloading every page of `id` from the first one.
    ///
    /// Returns `false` (and does nothing) when `id` is already downloading.
    /// With `overwrite`, anything already on disk for `id` is deleted first.
    #[instrument(skip(self))]
    pub fn download(&self, id: &str, overwrite: bool) -> bool {
        self.start(id, Start::Fresh { overwrite })
    }

    /// Continues a download at page index `from` into the existing directory.
    ///
    /// Returns `false` when `id` is already downloading or has no directory.
    #[instrument(skip(self))]
    pub fn resume_download(&self, id: &str, from: usize) -> bool {
        if !self.inner.storage.is_downloaded(id) {
            debug!("nothing on disk to resume");
            return false;
        }
        self.start(id, Start::Resume { from })
    }

    fn start(&self, id: &str, start: Start) -> bool {
        if !DownloadStorage::is_valid_id(id) {
            warn!(archive = %id, "refusing unsafe archive id");
            return false;
        }
        if self.inner.permits.is_closed() {
            debug!("scheduler shut down");
            return false;
        }

        // Held across the spawn so the id is registered before the task runs;
        // the task only takes this lock in `finish` and `record_progress`.
        let mut active = self.inner.active();
        if active.contains_key(id) {
            debug!(archive = %id, "already downloading");
            return false;
        }

        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let token = self.inner.client.scope().child_token();
        let initial = match start {
            Start::Fresh { .. } => 0,
            Start::Resume { from } => from,
        };
        let pages = Arc::new(AtomicUsize::new(initial));
        let handle = tokio::spawn(run(
            Arc::clone(&self.inner),
            id.to_string(),
            start,
            token.clone(),
            Arc::clone(&pages),
            generation,
        ));
        active.insert(
            id.to_string(),
            ActiveDownload {
                token,
                handle,
                pages,
                generation,
            },
        );
        true
    }

    /// Stops the download of `id` at once and notifies listeners.
    ///
    /// Partial files are left on disk. Returns `false` if `id` was not
    /// downloading.
    #[instrument(skip(self))]
    pub fn cancel_download(&self, id: &str) -> bool {
        let Some(download) = self.inner.active().remove(id) else {
            return false;
        };
        download.token.cancel();
        download.handle.abort();
        info!(archive = %id, "download cancelled");
        self.inner.emit(Event::Cancelled(id.to_string()));
        true
    }

    /// Deletes everything on disk for `id`, whether or not it is downloading,
    /// and notifies listeners.
    #[instrument(skip(self))]
    pub async fn delete_archive(&self, id: &str) -> bool {
        if !DownloadStorage::is_valid_id(id) {
            warn!(archive = %id, "refusing unsafe archive id");
            return false;
        }
        match self.inner.storage.remove(id).await {
            Ok(()) => {
                self.inner.emit(Event::Removed(id.to_string()));
                true
            }
            Err(e) => {
                warn!(error = %e, "could not delete downloaded archive");
                self.inner
                    .client
                    .notifications()
                    .report("Could not delete downloaded archive", &e);
                false
            }
        }
    }

    /// Registers `listener` and replays the progress of every running
    /// download to it before any later event.
    pub fn add_listener(&self, listener: Arc<dyn DownloadListener>) -> ListenerId {
        let id = ListenerId(self.inner.next_listener.fetch_add(1, Ordering::Relaxed));
        let active = self.inner.active();
        let mut replay: Vec<(String, usize)> = active
            .iter()
            .map(|(archive, download)| (archive.clone(), download.pages.load(Ordering::SeqCst)))
            .collect();
        replay.sort();
        self.inner.emit(Event::Attach {
            id,
            listener,
            replay,
        });
        id
    }

    pub fn remove_listener(&self, id: ListenerId) {
        self.inner.emit(Event::Detach(id));
    }

    /// Resolves once every event emitted so far reached the listeners.
    pub async fn flush_events(&self) {
        let (done, wait) = oneshot::channel();
        self.inner.emit(Event::Flush(done));
        let _ = wait.await;
    }

    #[must_use]
    pub fn is_downloading(&self, id: &str) -> bool {
        self.inner.active().contains_key(id)
    }

    /// `(archive id, pages downloaded)` for every running download, by id.
    #[must_use]
    pub fn active_downloads(&self) -> Vec<(String, usize)> {
        let mut downloads: Vec<(String, usize)> = self
            .inner
            .active()
            .iter()
            .map(|(archive, download)| (archive.clone(), download.pages.load(Ordering::SeqCst)))
            .collect();
        downloads.sort();
        downloads
    }

    #[must_use]
    pub fn is_downloaded(&self, id: &str) -> bool {
        self.inner.storage.is_downloaded(id)
    }

    #[must_use]
    pub fn downloaded_page_count(&self, id: &str) -> usize {
        self.inner.storage.downloaded_page_count(id)
    }

    #[must_use]
    pub fn downloaded_page(&self, id: &str, index: usize) -> Option<std::path::PathBuf> {
        self.inner.storage.downloaded_page(id, index)
    }

    #[must_use]
    pub fn downloaded_thumb(&self, id: &str, index: usize) -> Option<std::path::PathBuf> {
        self.inner.storage.downloaded_thumb(id, index)
    }

    /// Aborts every download, refuses new ones, and stops the dispatcher
    /// after it delivered pending events.
    pub async fn shutdown(&self) {
        self.inner.permits.close();
        let drained: Vec<ActiveDownload> = self
            .inner
            .active()
            .drain()
            .map(|(_, download)| download)
            .collect();
        for download in drained {
            download.token.cancel();
            download.handle.abort();
        }
        self.inner.emit(Event::Shutdown);

        let dispatcher = self
            .inner
            .dispatcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(dispatcher) = dispatcher
            && let Err(e) = dispatcher.await
        {
            warn!(error = %e, "download dispatcher panicked");
        }
    }
}

async fn run(
    inner: Arc<Inner>,
    id: String,
    start: Start,
    token: CancellationToken,
    pages: Arc<AtomicUsize>,
    generation: u64,
) {
    let client = inner.client.with_scope(token.clone());
    let outcome = tokio::select! {
        biased;
        () = token.cancelled() => Outcome::Aborted,
        outcome = transfer(&inner, &client, &id, start, &pages) => outcome,
    };
    inner.finish(&id, generation);

    match outcome {
        Outcome::Completed(count) => {
            info!(archive = %id, pages = count, "download complete");
            inner.emit(Event::Complete(id));
        }
        Outcome::Aborted => debug!(archive = %id, "download stopped"),
        Outcome::Failed(error) => {
            warn!(archive = %id, error = %error, "download failed");
            // Transport failures were reported where the page fetch failed.
            if !matches!(error, ApiError::Transport { .. }) {
                client.notifications().report("Download failed", &error);
            }
        }
    }
}

async fn transfer(
    inner: &Inner,
    client: &ServerClient,
    id: &str,
    start: Start,
    pages: &AtomicUsize,
) -> Outcome {
    let from = match start {
        Start::Fresh { overwrite } => {
            if overwrite && let Err(e) = inner.storage.remove(id).await {
                return Outcome::Failed(e);
            }
            0
        }
        Start::Resume { from } => from,
    };
    if let Err(e) = inner.storage.prepare(id).await {
        debug!(error = %e, "could not create download directories");
        return Outcome::Aborted;
    }

    let Ok(_permit) = Arc::clone(&inner.permits).acquire_owned().await else {
        return Outcome::Aborted;
    };
    debug!(archive = %id, from, "download permit acquired");

    let urls = match client.try_extract_archive(id, false).await {
        Ok(urls) => urls,
        Err(e) => return Outcome::Failed(e),
    };

    for (index, url) in urls.iter().enumerate().skip(from) {
        let page_path = inner.storage.page_path(id, index);
        let thumb_path = inner.storage.thumb_path(id, index);
        let (page, thumb) = tokio::join!(
            save_page(client, url, &page_path),
            save_thumbnail(client, id, index, &thumb_path),
        );
        if let Err(e) = page {
            return Outcome::Failed(e);
        }
        if let Err(e) = thumb {
            debug!(archive = %id, index, error = %e, "thumbnail skipped");
        }
        inner.record_progress(id, pages, index + 1);
    }
    Outcome::Completed(urls.len())
}

/// Pages are written under a `.part` name and renamed once complete, so a
/// cut-off body never counts as a downloaded page.
async fn save_page(client: &ServerClient, url: &str, path: &Path) -> Result<u64, ApiError> {
    let response = client.open_page(url).await?;
    let partial = path.with_extension("part");
    let file = File::create(&partial)
        .await
        .map_err(|e| ApiError::io(&partial, e))?;
    let written = match stream_to_file(file, response, &partial).await {
        Ok(written) => written,
        Err(e) => {
            if let Err(remove) = tokio::fs::remove_file(&partial).await {
                debug!(error = %remove, "could not remove partial page");
            }
            if matches!(e, ApiError::Transport { .. }) {
                client.notifications().report(PAGE_FAILED_MESSAGE, &e);
            }
            return Err(e);
        }
    };
    tokio::fs::rename(&partial, path)
        .await
        .map_err(|e| ApiError::io(path, e))?;
    Ok(written)
}

async fn stream_to_file(file: File, response: Response, path: &Path) -> Result<u64, ApiError> {
    let url = response.url().to_string();
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| ApiError::transport(&url, e))?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| ApiError::io(path, e))?;
        bytes_written += chunk.len() as u64;
    }

    writer.flush().await.map_err(|e| ApiError::io(path, e))?;
    Ok(bytes_written)
}

/// Thumbnails are requested by 1-based page number.
async fn save_thumbnail(
    client: &ServerClient,
    id: &str,
    index: usize,
    path: &Path,
) -> Result<(), ApiError> {
    let bytes = client.fetch_thumbnail(id, index as u64 + 1).await?;
    tokio::fs::write(path, &bytes)
        .await
        .map_err(|e| ApiError::io(path, e))
}
