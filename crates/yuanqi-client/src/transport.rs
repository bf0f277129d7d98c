//! Single-shot HTTP exchange with the agent endpoint.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::{Error, ErrorResponse, Result};

/// Agent chat completions endpoint.
pub const DEFAULT_ENDPOINT: &str =
    "https://open.hunyuan.tencent.com/openapi/v1/agent/chat/completions";

/// Header identifying the calling channel.
pub const HEADER_X_SOURCE: &str = "X-Source";

/// Value of [`HEADER_X_SOURCE`] for API callers.
pub const X_SOURCE_OPENAPI: &str = "openapi";

/// Everything one request needs. Cloned per call so concurrent calls never
/// share mutable state.
#[derive(Clone)]
pub(crate) struct Transport {
    pub(crate) http: reqwest::Client,
    pub(crate) endpoint: String,
    pub(crate) token: String,
    pub(crate) timeout: Option<Duration>,
}

impl Transport {
    /// Encode a request body.
    pub(crate) fn encode<B: Serialize + ?Sized>(body: &B) -> Result<Vec<u8>> {
        serde_json::to_vec(body).map_err(Error::Serialize)
    }

    /// POST `body` and return the response once a 2xx status line arrived.
    ///
    /// Non-2xx responses are read in full and turned into
    /// [`Error::Status`]. Nothing is retried.
    pub(crate) async fn post(
        &self,
        body: Vec<u8>,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response> {
        let url = Url::parse(&self.endpoint)
            .map_err(|e| Error::Config(format!("invalid endpoint '{}': {}", self.endpoint, e)))?;
        let auth = HeaderValue::from_str(&format!("Bearer {}", self.token))
            .map_err(|_| Error::Config("token is not a valid header value".to_string()))?;

        let mut request = self
            .http
            .post(url)
            .header(HEADER_X_SOURCE, X_SOURCE_OPENAPI)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .header(AUTHORIZATION, auth)
            .body(body);

        // Zero means "not set": the client keeps no timeout of its own.
        if let Some(timeout) = self.timeout.filter(|t| !t.is_zero()) {
            request = request.timeout(timeout);
        }

        let response = cancellable(cancel, request.send()).await?;

        if !response.status().is_success() {
            return Err(error_from_response(response, cancel).await);
        }

        Ok(response)
    }
}

/// Read a non-2xx response to the end and wrap it.
pub(crate) async fn error_from_response(
    response: reqwest::Response,
    cancel: &CancellationToken,
) -> Error {
    let status = response.status();
    let body = match cancellable(cancel, response.bytes()).await {
        Ok(body) => body,
        Err(e) => {
            tracing::debug!(error = %e, "Failed to read error response body");
            Bytes::new()
        }
    };

    tracing::warn!(
        status = %status,
        body = %String::from_utf8_lossy(&body),
        "Agent API returned an error status"
    );

    ErrorResponse::new(status, body).into()
}

/// Run an HTTP future unless `cancel` fires first.
pub(crate) async fn cancellable<F, T>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = reqwest::Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = fut => result.map_err(Error::from),
    }
}
