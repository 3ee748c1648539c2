//! Authenticated request construction.
//!
//! [`RequestFactory`] owns the shared HTTP client, the bearer credential and
//! the custom header list. Every request gets the `Authorization` header
//! first (when a key is configured), then each custom header in stored
//! order. Headers are appended, never de-duplicated, so a later custom
//! header with the same name sits alongside the earlier one.

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, RequestBuilder};
use tracing::debug;

use super::endpoint::HttpMethod;
use super::headers::CustomHeader;
use crate::user_agent;

/// Bearer credential derived from the raw API key.
///
/// Encoded once on assignment; an empty key means "no auth".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credential {
    encoded: Option<String>,
}

impl Credential {
    #[must_use]
    pub fn new(raw_key: &str) -> Self {
        if raw_key.is_empty() {
            return Self::default();
        }
        Self {
            encoded: Some(STANDARD.encode(raw_key.as_bytes())),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.encoded.is_none()
    }

    /// Returns the `Authorization` header value, if a key is set.
    #[must_use]
    pub fn header_value(&self) -> Option<String> {
        self.encoded.as_ref().map(|key| format!("Bearer {key}"))
    }
}

/// A request ready to send, with the URL kept for error context.
#[derive(Debug)]
pub struct PreparedRequest {
    pub url: String,
    pub builder: RequestBuilder,
}

/// Builds authenticated requests against the configured server.
#[derive(Debug)]
pub struct RequestFactory {
    http: Client,
    credential: RwLock<Credential>,
    headers: RwLock<Vec<CustomHeader>>,
}

impl RequestFactory {
    /// Creates a factory with the given connect and read timeouts.
    ///
    /// # Errors
    ///
    /// Returns the reqwest error if the client cannot be built.
    pub fn new(connect_timeout: Duration, read_timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(read_timeout)
            .gzip(true)
            .user_agent(user_agent::default_user_agent())
            .build()?;
        Ok(Self::with_client(http))
    }

    #[must_use]
    pub fn with_client(http: Client) -> Self {
        Self {
            http,
            credential: RwLock::new(Credential::default()),
            headers: RwLock::new(Vec::new()),
        }
    }

    /// Re-encodes and stores the API key.
    pub fn set_api_key(&self, raw_key: &str) {
        let credential = Credential::new(raw_key);
        debug!(has_key = !credential.is_empty(), "api key updated");
        *self
            .credential
            .write()
            .unwrap_or_else(PoisonError::into_inner) = credential;
    }

    #[must_use]
    pub fn credential(&self) -> Credential {
        self.credential
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the custom header list wholesale.
    pub fn set_custom_headers(&self, headers: Vec<CustomHeader>) {
        debug!(count = headers.len(), "custom headers updated");
        *self.headers.write().unwrap_or_else(PoisonError::into_inner) = headers;
    }

    #[must_use]
    pub fn custom_headers(&self) -> Vec<CustomHeader> {
        self.headers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Builds a request for `path` (placeholders already substituted) on `base`.
    #[must_use]
    pub fn prepare(&self, base: &str, method: HttpMethod, path: &str) -> PreparedRequest {
        let url = join_url(base, path);
        self.prepare_url(method, url)
    }

    /// Builds a request for an absolute URL (page images).
    #[must_use]
    pub fn prepare_url(&self, method: HttpMethod, url: String) -> PreparedRequest {
        let mut builder = self.http.request(method.into(), &url);
        if let Some(auth) = self.credential().header_value() {
            builder = builder.header(AUTHORIZATION, auth);
        }
        for header in self
            .headers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
        {
            builder = builder.header(header.name.as_str(), header.value.as_str());
        }
        PreparedRequest { url, builder }
    }
}

/// Joins a server base address and an absolute API path.
///
/// A base without a scheme is treated as plain `http://`.
#[must_use]
pub fn join_url(base: &str, path: &str) -> String {
    let base = base.trim().trim_end_matches('/');
    let base = if base.contains("://") {
        base.to_string()
    } else {
        format!("http://{base}")
    };
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}
