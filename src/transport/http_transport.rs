use std::time::Duration;

use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use http::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;

use crate::config::{CustomBackendConfig, HttpConfig};
use crate::error::AdapterError;

fn build_reqwest_client(
    timeout: Duration,
    connect_timeout: Duration,
) -> Result<reqwest::Client, AdapterError> {
    reqwest::Client::builder()
        .tcp_nodelay(true)
        .connect_timeout(connect_timeout)
        .timeout(timeout)
        .build()
        .map_err(|err| AdapterError::Transport(format!("Failed to build HTTP client: {err}")))
}

fn default_user_agent() -> String {
    format!(
        "genbridge/{} ({}; {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

/// Headers for one call to the backend.
///
/// Caller default headers first, then a `User-Agent` unless the caller set
/// one, then `Content-Type`, `Authorization` (only with an API key) and, for
/// streaming, `Accept: text/event-stream`.
///
/// # Errors
///
/// Returns [`AdapterError::Config`] when a header name or value is invalid.
pub fn build_request_headers(
    backend: &CustomBackendConfig,
    http: &HttpConfig,
    stream: bool,
) -> Result<HeaderMap, AdapterError> {
    let mut headers = HeaderMap::with_capacity(http.default_headers.len() + 4);

    for (name, value) in &http.default_headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|err| AdapterError::Config(format!("invalid header name '{name}': {err}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|err| AdapterError::Config(format!("invalid value for header '{name}': {err}")))?;
        headers.insert(name, value);
    }

    if !headers.contains_key(USER_AGENT) {
        let agent = HeaderValue::from_str(&default_user_agent())
            .map_err(|err| AdapterError::Config(format!("invalid user agent: {err}")))?;
        headers.insert(USER_AGENT, agent);
    }

    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    if let Some(api_key) = backend.api_key.as_deref() {
        let mut bearer = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|err| AdapterError::Config(format!("invalid API key: {err}")))?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);
    }

    if stream {
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
    }

    Ok(headers)
}

/// HTTP transport client for sending requests to the backend.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a new transport with the timeouts from the given config.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Transport`] when the client cannot be built.
    pub fn new(http: &HttpConfig) -> Result<Self, AdapterError> {
        let client = build_reqwest_client(
            Duration::from_secs(http.timeout_secs),
            Duration::from_secs(http.connect_timeout_secs),
        )?;
        Ok(Self { client })
    }

    /// `POST` a JSON body and return the response once its status is 2xx.
    ///
    /// # Errors
    ///
    /// - [`AdapterError::Translation`] when the body cannot be serialized
    /// - [`AdapterError::Transport`] when no response was received
    /// - [`AdapterError::Upstream`] for a non-2xx status, with the body text
    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: &url::Url,
        headers: HeaderMap,
        body: &T,
    ) -> Result<reqwest::Response, AdapterError> {
        let payload = serde_json::to_vec(body)
            .map_err(|err| AdapterError::Translation(format!("request serialization failed: {err}")))?;

        let response = self
            .client
            .post(url.clone())
            .headers(headers)
            .body(payload)
            .send()
            .await
            .map_err(|err| AdapterError::Transport(format!("request to {url} failed: {err}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = match response.text().await {
            Ok(text) => text,
            Err(err) => {
                tracing::debug!(error = %err, "failed to read upstream error body");
                String::new()
            }
        };
        Err(AdapterError::Upstream {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            body,
        })
    }
}
