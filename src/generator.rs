//! Native content-generation contract and its custom-backend implementation.

use std::pin::Pin;
use std::time::Instant;

use async_trait::async_trait;
use futures_util::Stream;

use crate::config::validation::validate_endpoint;
use crate::config::{AppConfig, CustomBackendConfig, FeaturesConfig, HttpConfig};
use crate::error::AdapterError;
use crate::fc::{summarize_tool_responses, FallbackPolicy, ToolSupport};
use crate::observability::log_request_complete;
use crate::observability::token_counter::estimate_request_tokens;
use crate::protocol::gemini::{
    CountTokensRequest, CountTokensResponse, EmbedContentRequest, EmbedContentResponse,
    GenerateContentRequest, GenerateContentResponse,
};
use crate::protocol::openai_chat::encoder::encode_chat_request;
use crate::protocol::openai_chat::response_decoder::decode_chat_response;
use crate::protocol::openai_chat::OpenAiChatResponse;
use crate::stream::{native_response_stream, wire_chunk_stream};
use crate::transport::{build_request_headers, HttpTransport};

/// Lazy, single-pass sequence of streamed native responses.
pub type ResponseStream =
    Pin<Box<dyn Stream<Item = Result<GenerateContentResponse, AdapterError>> + Send>>;

#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate_content(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, AdapterError>;

    async fn generate_content_stream(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<ResponseStream, AdapterError>;

    /// Estimated, not exact.
    async fn count_tokens(
        &self,
        request: &CountTokensRequest,
    ) -> Result<CountTokensResponse, AdapterError>;

    async fn embed_content(
        &self,
        request: &EmbedContentRequest,
    ) -> Result<EmbedContentResponse, AdapterError>;
}

/// [`ContentGenerator`] backed by an OpenAI-compatible chat completions
/// endpoint.
///
/// The backend config is fixed at construction. Every call opens its own
/// HTTP request; a call that fails because the backend rejects the tool
/// payload is re-issued with tools described in text instead.
#[derive(Debug, Clone)]
pub struct CustomApiGenerator {
    backend: CustomBackendConfig,
    http: HttpConfig,
    endpoint: url::Url,
    transport: HttpTransport,
    fallback: FallbackPolicy,
}

impl CustomApiGenerator {
    /// # Errors
    ///
    /// - [`AdapterError::InvalidEndpoint`] when the endpoint is not an
    ///   absolute `http`/`https` URL
    /// - [`AdapterError::Transport`] when the HTTP client cannot be built
    pub fn new(
        backend: CustomBackendConfig,
        http: HttpConfig,
        features: &FeaturesConfig,
    ) -> Result<Self, AdapterError> {
        let backend = backend.normalized();
        let endpoint = validate_endpoint(&backend.endpoint)
            .map_err(|err| AdapterError::InvalidEndpoint(err.to_string()))?;
        let transport = HttpTransport::new(&http)?;
        Ok(Self {
            backend,
            http,
            endpoint,
            transport,
            fallback: FallbackPolicy::from_features(features),
        })
    }

    /// # Errors
    ///
    /// See [`CustomApiGenerator::new`].
    pub fn from_config(config: &AppConfig) -> Result<Self, AdapterError> {
        Self::new(
            config.custom_api.clone(),
            config.http.clone(),
            &config.features,
        )
    }

    #[must_use]
    pub fn backend(&self) -> &CustomBackendConfig {
        &self.backend
    }

    /// Send the translated request, retrying once with tools disabled when
    /// the first failure is tool-related.
    async fn send_with_fallback(
        &self,
        request: &GenerateContentRequest,
        stream: bool,
    ) -> Result<reqwest::Response, AdapterError> {
        let model = self.backend.wire_model();
        let mut support = ToolSupport::from_config(&self.backend);
        let mut retries_used = 0;

        loop {
            let wire = encode_chat_request(request, model, support, stream)?;
            let headers = build_request_headers(&self.backend, &self.http, stream)?;
            tracing::debug!(
                model,
                stream,
                messages = wire.messages.len(),
                native_tools = wire.tools.as_ref().map_or(0, Vec::len),
                tool_action = ?support.tool_action(),
                "sending chat completion request"
            );

            match self.transport.post_json(&self.endpoint, headers, &wire).await {
                Ok(response) => return Ok(response),
                Err(err) => {
                    let cause = err.failure_cause();
                    if !self.fallback.allows_retry(cause, support, retries_used) {
                        tracing::debug!(?cause, retries_used, "chat completion request failed");
                        return Err(err);
                    }
                    tracing::warn!(
                        ?cause,
                        error = %err,
                        "backend rejected tool payload, retrying with tools disabled"
                    );
                    support = support.with_tools_disabled();
                    retries_used += 1;
                }
            }
        }
    }
}

#[async_trait]
impl ContentGenerator for CustomApiGenerator {
    async fn generate_content(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, AdapterError> {
        if let Some(summary) = summarize_tool_responses(request) {
            tracing::debug!("answering tool results locally");
            return Ok(summary);
        }

        let start = Instant::now();
        let response = self.send_with_fallback(request, false).await?;
        let body = response
            .bytes()
            .await
            .map_err(|err| AdapterError::Transport(format!("failed to read response body: {err}")))?;
        let wire: OpenAiChatResponse = serde_json::from_slice(&body).map_err(|err| {
            AdapterError::Translation(format!("invalid chat completion response: {err}"))
        })?;

        let native = decode_chat_response(&wire);
        log_request_complete(
            self.backend.wire_model(),
            native.usage_metadata.as_ref(),
            start,
        );
        Ok(native)
    }

    async fn generate_content_stream(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<ResponseStream, AdapterError> {
        if let Some(summary) = summarize_tool_responses(request) {
            tracing::debug!("answering tool results locally");
            return Ok(Box::pin(futures_util::stream::iter([Ok::<_, AdapterError>(summary)])));
        }

        let response = self.send_with_fallback(request, true).await?;
        let chunks = wire_chunk_stream(response.bytes_stream());
        Ok(Box::pin(native_response_stream(
            chunks,
            self.backend.wire_model().to_string(),
        )))
    }

    async fn count_tokens(
        &self,
        request: &CountTokensRequest,
    ) -> Result<CountTokensResponse, AdapterError> {
        let total_tokens = estimate_request_tokens(request).map_err(|err| {
            AdapterError::Translation(format!("request serialization failed: {err}"))
        })?;
        Ok(CountTokensResponse { total_tokens })
    }

    async fn embed_content(
        &self,
        _request: &EmbedContentRequest,
    ) -> Result<EmbedContentResponse, AdapterError> {
        Err(AdapterError::Unsupported(
            "Embedding not supported for custom APIs".to_string(),
        ))
    }
}
