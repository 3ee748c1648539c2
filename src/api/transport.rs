//! Transport bridge: one HTTP round trip as one cancellable async operation.
//!
//! Dropping or cancelling the awaiting future drops the in-flight reqwest
//! call, which aborts the connection. Cancellation resolves to
//! [`ApiError::Cancelled`] and is never reported to the user. Transport
//! failures are reported under the caller's message (when one is given).
//!
//! Two variants exist:
//! - [`Transport::await_or_fail`] hands the error back after reporting it.
//! - [`Transport::await_response`] / [`Transport::await_status`] swallow it
//!   into `None`; the status variant closes the body immediately.

use std::sync::Arc;

use bytes::Bytes;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use super::ApiError;
use super::notify::Notifications;
use super::request::PreparedRequest;

#[derive(Debug, Clone)]
pub struct Transport {
    notifications: Arc<Notifications>,
}

impl Transport {
    #[must_use]
    pub fn new(notifications: Arc<Notifications>) -> Self {
        Self { notifications }
    }

    #[must_use]
    pub fn notifications(&self) -> &Arc<Notifications> {
        &self.notifications
    }

    /// Sends the request and waits for the response head.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Cancelled`] if `cancel` fires first (not reported),
    /// or [`ApiError::Transport`] on connection failure (reported under
    /// `message` when given).
    #[instrument(level = "debug", skip(self, request, cancel), fields(url = %request.url))]
    pub async fn await_or_fail(
        &self,
        request: PreparedRequest,
        message: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Response, ApiError> {
        let PreparedRequest { url, builder } = request;
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!("request cancelled");
                Err(ApiError::Cancelled)
            }
            result = builder.send() => result.map_err(|e| {
                let error = ApiError::transport(url, e);
                if let Some(message) = message {
                    self.notifications.report(message, &error);
                }
                error
            }),
        }
    }

    /// Like [`await_or_fail`](Self::await_or_fail) but resolves to `None` on
    /// any failure.
    pub async fn await_response(
        &self,
        request: PreparedRequest,
        message: Option<&str>,
        cancel: &CancellationToken,
    ) -> Option<Response> {
        self.await_or_fail(request, message, cancel).await.ok()
    }

    /// Sends the request, closes the body and returns only the status.
    pub async fn await_status(
        &self,
        request: PreparedRequest,
        message: Option<&str>,
        cancel: &CancellationToken,
    ) -> Option<StatusCode> {
        let response = self.await_response(request, message, cancel).await?;
        let status = response.status();
        drop(response);
        Some(status)
    }
}

/// Fails with [`ApiError::Server`] on a non-2xx response.
///
/// # Errors
///
/// Returns [`ApiError::Server`] carrying the status code.
pub fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(ApiError::server(response.url().as_str(), status.as_u16()))
    }
}

/// Reads the whole body as text, honoring cancellation.
///
/// The body is fully decoded before the response (and its connection) is
/// released.
///
/// # Errors
///
/// Returns [`ApiError::Server`] on non-2xx, [`ApiError::Transport`] if the
/// body read fails, [`ApiError::Cancelled`] on cancellation, and
/// [`ApiError::Application`] when the body carries an explicit error.
pub async fn read_text(response: Response, cancel: &CancellationToken) -> Result<String, ApiError> {
    let response = check_status(response)?;
    let url = response.url().to_string();
    let body = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(ApiError::Cancelled),
        body = response.text() => body.map_err(|e| ApiError::transport(&url, e))?,
    };
    if let Some(message) = application_error(&body) {
        return Err(ApiError::application(url, message));
    }
    Ok(body)
}

/// Reads and decodes a JSON body.
///
/// # Errors
///
/// Same as [`read_text`], plus [`ApiError::Decode`] for malformed JSON.
pub async fn read_json<T: DeserializeOwned>(
    response: Response,
    cancel: &CancellationToken,
) -> Result<T, ApiError> {
    let url = response.url().to_string();
    let body = read_text(response, cancel).await?;
    serde_json::from_str(&body).map_err(|e| ApiError::decode(url, e))
}

/// Reads the whole body as bytes.
///
/// # Errors
///
/// Same as [`read_text`], without the application-error check.
pub async fn read_bytes(response: Response, cancel: &CancellationToken) -> Result<Bytes, ApiError> {
    let response = check_status(response)?;
    let url = response.url().to_string();
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(ApiError::Cancelled),
        body = response.bytes() => body.map_err(|e| ApiError::transport(url, e)),
    }
}

/// Extracts an explicit error from a 2xx JSON body.
///
/// The server signals failure with a non-empty `error` string or `success: 0`.
#[must_use]
pub fn application_error(body: &str) -> Option<String> {
    if !body.trim_start().starts_with('{') {
        return None;
    }
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let error = value
        .get("error")
        .and_then(serde_json::Value::as_str)
        .filter(|e| !e.is_empty())
        .map(ToString::to_string);
    let failed = value
        .get("success")
        .and_then(serde_json::Value::as_i64)
        .is_some_and(|s| s == 0);
    match (error, failed) {
        (Some(error), _) => Some(error),
        (None, true) => Some("operation failed".to_string()),
        (None, false) => None,
    }
}
