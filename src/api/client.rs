//! Server client: one method per server operation.
//!
//! Every method consults the [`ConnectivityGate`] first and skips the request
//! when it says no. Requests are built by the [`RequestFactory`] and awaited
//! through the [`Transport`] on this client's cancellation scope. Expected
//! failures are reported to the notifier and collapse to `None`/`false`.
//!
//! A client handle is cheap to clone. [`ServerClient::scoped`] derives a
//! handle whose requests are cancelled together (a screen's lifetime).

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};
use url::Url;

use super::ApiError;
use super::connectivity::ConnectivityGate;
use super::endpoint::{self, Endpoint, HttpMethod};
use super::job::{JobPoller, JobStatusSource};
use super::models::{
    ArchiveSummary, Category, CreatedCategory, ExtractReply, JobReply, JobState, JobStatusReply,
    RandomResult, SearchQuery, SearchResult, ServerInfo, TagStat,
};
use super::notify::{Notifications, PAGE_FAILED_MESSAGE};
use super::request::{PreparedRequest, RequestFactory, join_url};
use super::transport::{Transport, check_status, read_bytes, read_json, read_text};

/// Whether a denied gate should tell the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gate {
    Loud,
    Silent,
}

#[derive(Debug)]
struct Shared {
    gate: Arc<ConnectivityGate>,
    requests: Arc<RequestFactory>,
    transport: Transport,
    poller: JobPoller,
}

#[derive(Debug, Clone)]
pub struct ServerClient {
    shared: Arc<Shared>,
    scope: CancellationToken,
}

impl ServerClient {
    #[must_use]
    pub fn new(
        gate: Arc<ConnectivityGate>,
        requests: Arc<RequestFactory>,
        notifications: Arc<Notifications>,
        poller: JobPoller,
        scope: CancellationToken,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                gate,
                requests,
                transport: Transport::new(notifications),
                poller,
            }),
            scope,
        }
    }

    /// Returns a handle whose requests are cancelled with a new child scope.
    #[must_use]
    pub fn scoped(&self) -> Self {
        self.with_scope(self.scope.child_token())
    }

    /// Returns a handle bound to `scope`.
    #[must_use]
    pub fn with_scope(&self, scope: CancellationToken) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            scope,
        }
    }

    #[must_use]
    pub fn scope(&self) -> &CancellationToken {
        &self.scope
    }

    /// Cancels every in-flight request of this scope (and its children).
    pub fn cancel_scope(&self) {
        self.scope.cancel();
    }

    #[must_use]
    pub fn gate(&self) -> &Arc<ConnectivityGate> {
        &self.shared.gate
    }

    #[must_use]
    pub fn requests(&self) -> &Arc<RequestFactory> {
        &self.shared.requests
    }

    #[must_use]
    pub fn notifications(&self) -> &Arc<Notifications> {
        self.shared.transport.notifications()
    }

    #[must_use]
    pub fn poller(&self) -> JobPoller {
        self.shared.poller
    }

    // ==================== Plumbing ====================

    fn base(&self, endpoint: &str, gate: Gate) -> Result<String, ApiError> {
        if self.shared.gate.can_connect(gate == Gate::Silent) {
            Ok(self.shared.gate.server_address())
        } else {
            Err(ApiError::connectivity_denied(endpoint))
        }
    }

    fn prepare(
        &self,
        endpoint: Endpoint,
        args: &[&str],
        query: &[(&str, String)],
        gate: Gate,
    ) -> Result<PreparedRequest, ApiError> {
        let path = endpoint.path(args);
        let base = self.base(&path, gate)?;
        let mut request = self.shared.requests.prepare(&base, endpoint.method(), &path);
        if !query.is_empty() {
            request.builder = request.builder.query(query);
        }
        Ok(request)
    }

    async fn send(
        &self,
        endpoint: Endpoint,
        args: &[&str],
        query: &[(&str, String)],
        gate: Gate,
    ) -> Result<Response, ApiError> {
        let request = self.prepare(endpoint, args, query, gate)?;
        self.shared
            .transport
            .await_or_fail(request, None, &self.scope)
            .await
    }

    async fn call<T: DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        args: &[&str],
        query: &[(&str, String)],
        gate: Gate,
    ) -> Result<T, ApiError> {
        let response = self.send(endpoint, args, query, gate).await?;
        read_json(response, &self.scope).await
    }

    /// For mutations whose reply body only matters for error detection.
    async fn call_ok(
        &self,
        endpoint: Endpoint,
        args: &[&str],
        query: &[(&str, String)],
    ) -> Result<(), ApiError> {
        let response = self.send(endpoint, args, query, Gate::Loud).await?;
        read_text(response, &self.scope).await.map(|_| ())
    }

    fn settle<T>(&self, message: &str, result: Result<T, ApiError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(error) => {
                debug!(error = %error, "{message}");
                self.notifications().report(message, &error);
                None
            }
        }
    }

    // ==================== Server ====================

    #[instrument(skip(self))]
    pub async fn server_info(&self) -> Option<ServerInfo> {
        let result = self
            .call(endpoint::SERVER_INFO, &[], &[], Gate::Loud)
            .await;
        self.settle("Could not read server information", result)
    }

    #[instrument(skip(self))]
    pub async fn clear_temp_folder(&self) -> bool {
        let result = self.call_ok(endpoint::TEMP_FOLDER_CLEAR, &[], &[]).await;
        self.settle("Could not clear the server temp folder", result)
            .is_some()
    }

    #[instrument(skip(self))]
    pub async fn database_stats(&self, min_weight: u64) -> Option<Vec<TagStat>> {
        let query = [("minweight", min_weight.to_string())];
        let result = self
            .call(endpoint::DATABASE_STATS, &[], &query, Gate::Loud)
            .await;
        self.settle("Could not load tag statistics", result)
    }

    // ==================== Archives ====================

    /// Full archive set; used to build the local catalog.
    #[instrument(skip(self))]
    pub async fn archive_list(&self) -> Option<Vec<ArchiveSummary>> {
        let result = self
            .call(endpoint::ARCHIVE_LIST, &[], &[], Gate::Loud)
            .await;
        self.settle("Could not load archives", result)
    }

    #[instrument(skip(self))]
    pub async fn archive(&self, id: &str) -> Option<ArchiveSummary> {
        let result = self
            .call(endpoint::ARCHIVE_METADATA, &[id], &[], Gate::Loud)
            .await;
        self.settle("Could not load archive", result)
    }

    #[instrument(skip(self))]
    pub async fn delete_archive(&self, id: &str) -> bool {
        let result = self.call_ok(endpoint::ARCHIVE_DELETE, &[id], &[]).await;
        self.settle("Could not delete archive", result).is_some()
    }

    #[instrument(skip(self))]
    pub async fn clear_new_flag(&self, id: &str) -> bool {
        let result = self.call_ok(endpoint::ARCHIVE_CLEAR_NEW, &[id], &[]).await;
        self.settle("Could not clear the new flag", result).is_some()
    }

    /// Records the reading position. Silent when offline.
    #[instrument(skip(self))]
    pub async fn update_progress(&self, id: &str, page: u64) -> bool {
        let page = page.to_string();
        let result = async {
            let response = self
                .send(endpoint::ARCHIVE_PROGRESS, &[id, page.as_str()], &[], Gate::Silent)
                .await?;
            read_text(response, &self.scope).await.map(|_| ())
        }
        .await;
        self.settle("Could not update reading progress", result)
            .is_some()
    }

    #[instrument(skip(self))]
    pub async fn set_thumbnail(&self, id: &str, page: u64) -> bool {
        let query = [("page", page.to_string())];
        let result = self
            .call_ok(endpoint::ARCHIVE_SET_THUMBNAIL, &[id], &query)
            .await;
        self.settle("Could not set thumbnail", result).is_some()
    }

    /// Extracts an archive and returns its page URLs.
    ///
    /// With `force_full` the server may queue a job instead of answering
    /// directly; the job is polled and, once finished, the page list is
    /// requested again without `force`.
    #[instrument(skip(self))]
    pub async fn extract_archive(&self, id: &str, force_full: bool) -> Option<Vec<String>> {
        let result = self.try_extract_archive(id, force_full).await;
        self.settle("Could not extract archive", result)
    }

    /// Like [`extract_archive`](Self::extract_archive) but returns the
    /// failure instead of reporting it.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`] from the request or the extraction job.
    pub async fn try_extract_archive(
        &self,
        id: &str,
        force_full: bool,
    ) -> Result<Vec<String>, ApiError> {
        let query: Vec<(&str, String)> = if force_full {
            vec![("force", "true".to_string())]
        } else {
            Vec::new()
        };
        let reply: ExtractReply = self
            .call(endpoint::ARCHIVE_EXTRACT, &[id], &query, Gate::Loud)
            .await?;
        if let Some(pages) = reply.pages {
            return Ok(pages);
        }
        let Some(job) = reply.job else {
            return Err(ApiError::application(
                endpoint::ARCHIVE_EXTRACT.path(&[id]),
                "reply carried neither pages nor a job",
            ));
        };

        info!(job, "extraction queued; waiting for job");
        self.shared.poller.wait(self, job, &self.scope).await?;

        let reply: ExtractReply = self
            .call(endpoint::ARCHIVE_EXTRACT, &[id], &[], Gate::Loud)
            .await?;
        reply.pages.ok_or_else(|| {
            ApiError::application(
                endpoint::ARCHIVE_EXTRACT.path(&[id]),
                "no pages after extraction job",
            )
        })
    }

    /// Fetches the thumbnail of a 1-based `page`.
    ///
    /// A `202 Accepted` reply carries a job generating the thumbnail; it is
    /// polled and the thumbnail requested once more.
    #[instrument(skip(self))]
    pub async fn thumbnail(&self, id: &str, page: u64) -> Option<Bytes> {
        let result = self.fetch_thumbnail(id, page).await;
        self.settle("Could not load thumbnail", result)
    }

    /// Like [`thumbnail`](Self::thumbnail) but returns the failure instead of
    /// reporting it.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`] from the request or the generation job.
    pub async fn fetch_thumbnail(&self, id: &str, page: u64) -> Result<Bytes, ApiError> {
        let query = [
            ("page", page.to_string()),
            ("no_fallback", "true".to_string()),
        ];
        let mut polled = false;
        loop {
            let response = self
                .send(endpoint::ARCHIVE_THUMBNAIL, &[id], &query, Gate::Silent)
                .await?;
            if response.status() != StatusCode::ACCEPTED {
                return read_bytes(response, &self.scope).await;
            }
            let url = response.url().to_string();
            if polled {
                return Err(ApiError::application(url, "thumbnail still pending"));
            }
            let reply: JobReply = read_json(response, &self.scope).await?;
            let job = reply
                .job
                .ok_or_else(|| ApiError::application(url, "accepted without a job id"))?;
            self.shared.poller.wait(self, job, &self.scope).await?;
            polled = true;
        }
    }

    // ==================== Search ====================

    #[instrument(skip(self), fields(filter = %query.filter, start = query.start))]
    pub async fn search(&self, query: &SearchQuery) -> Option<SearchResult> {
        let params = query.to_params();
        let result = self
            .call(endpoint::SEARCH, &[], &params, Gate::Loud)
            .await;
        self.settle("Search failed", result)
    }

    #[instrument(skip(self))]
    pub async fn random(
        &self,
        filter: &str,
        category: &str,
        count: u32,
    ) -> Option<Vec<ArchiveSummary>> {
        let mut params = vec![
            ("filter", filter.to_string()),
            ("count", count.to_string()),
        ];
        if !category.is_empty() {
            params.push(("category", category.to_string()));
        }
        let result: Result<RandomResult, ApiError> = self
            .call(endpoint::SEARCH_RANDOM, &[], &params, Gate::Loud)
            .await;
        self.settle("Could not load random archives", result)
            .map(|r| r.data)
    }

    // ==================== Categories ====================

    #[instrument(skip(self))]
    pub async fn categories(&self) -> Option<Vec<Category>> {
        let result = self
            .call(endpoint::CATEGORY_LIST, &[], &[], Gate::Loud)
            .await;
        self.settle("Could not load categories", result)
    }

    /// Creates a static category and returns its id.
    #[instrument(skip(self))]
    pub async fn create_category(&self, name: &str) -> Option<String> {
        let query = [("name", name.to_string())];
        let result: Result<CreatedCategory, ApiError> = self
            .call(endpoint::CATEGORY_CREATE, &[], &query, Gate::Loud)
            .await;
        self.settle("Could not create category", result)
            .and_then(|c| c.category_id)
    }

    #[instrument(skip(self))]
    pub async fn delete_category(&self, id: &str) -> bool {
        let result = self.call_ok(endpoint::CATEGORY_DELETE, &[id], &[]).await;
        self.settle("Could not delete category", result).is_some()
    }

    #[instrument(skip(self))]
    pub async fn add_to_category(&self, category: &str, archive: &str) -> bool {
        let result = self
            .call_ok(endpoint::CATEGORY_ADD_ARCHIVE, &[category, archive], &[])
            .await;
        self.settle("Could not add archive to category", result)
            .is_some()
    }

    #[instrument(skip(self))]
    pub async fn remove_from_category(&self, category: &str, archive: &str) -> bool {
        let result = self
            .call_ok(endpoint::CATEGORY_REMOVE_ARCHIVE, &[category, archive], &[])
            .await;
        self.settle("Could not remove archive from category", result)
            .is_some()
    }

    // ==================== Pages ====================

    /// Resolves a page path returned by extraction against the server
    /// address. Paths are relative to the base (`./api/...`), so a server
    /// mounted under a sub-path keeps it; absolute URLs pass through.
    #[must_use]
    pub fn page_url(&self, page: &str) -> String {
        let base = join_url(&self.shared.gate.server_address(), "/");
        let relative = page.trim_start_matches("./").trim_start_matches('/');
        match Url::parse(&base).and_then(|base| base.join(relative)) {
            Ok(url) => url.to_string(),
            Err(e) => {
                debug!(error = %e, page, "page path is not a valid URL");
                join_url(&base, relative)
            }
        }
    }

    /// Opens a page image for streaming (await-or-fail).
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::ConnectivityDenied`] without sending when the gate
    /// refuses, otherwise any transport or status failure (transport failures
    /// are also reported).
    pub async fn open_page(&self, page: &str) -> Result<Response, ApiError> {
        let url = self.page_url(page);
        self.base(&url, Gate::Silent)?;
        let request = self.shared.requests.prepare_url(HttpMethod::Get, url);
        let response = self
            .shared
            .transport
            .await_or_fail(request, Some(PAGE_FAILED_MESSAGE), &self.scope)
            .await?;
        check_status(response)
    }
}

#[cfg(test)]
impl ServerClient {
    /// Client with network available and `address` configured (empty for none).
    #[allow(clippy::unwrap_used)]
    pub(crate) fn for_tests(address: &str) -> Self {
        use std::time::Duration;

        use super::connectivity::NetworkObserver;

        let notifications = Arc::new(Notifications::default());
        let gate = Arc::new(ConnectivityGate::new(Arc::clone(&notifications)));
        gate.set_server_address(address);
        gate.on_available();
        let requests = Arc::new(
            RequestFactory::new(Duration::from_secs(2), Duration::from_secs(5)).unwrap(),
        );
        Self::new(
            gate,
            requests,
            notifications,
            JobPoller::new(Duration::from_millis(5)),
            CancellationToken::new(),
        )
    }
}

#[async_trait]
impl JobStatusSource for ServerClient {
    async fn job_state(&self, job: u64, cancel: &CancellationToken) -> Result<JobState, ApiError> {
        let client = self.with_scope(cancel.clone());
        let job = job.to_string();
        let reply: JobStatusReply = client
            .call(endpoint::JOB_STATUS, &[job.as_str()], &[], Gate::Silent)
            .await?;
        Ok(reply.job_state())
    }
}
