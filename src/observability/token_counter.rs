use crate::protocol::gemini::UsageMetadata;
use serde::Serialize;
use std::time::Duration;
use tracing::info;

/// Estimate the number of tokens in `text`.
///
/// Uses a lightweight heuristic (`chars / 4`, rounded up) instead of a
/// model tokenizer.
#[must_use]
pub fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(4)
}

/// Estimate the tokens of a request from its JSON serialization.
///
/// # Errors
///
/// Returns the serialization error if the request cannot be encoded.
pub fn estimate_request_tokens<T: Serialize>(request: &T) -> Result<u64, serde_json::Error> {
    let serialized = serde_json::to_string(request)?;
    Ok(estimate_tokens(&serialized))
}

/// Log token usage for a completed request at INFO level.
///
/// Counters the backend did not report are logged as absent, never as zero.
pub fn log_request_usage(model: &str, usage: Option<&UsageMetadata>, duration: Duration) {
    let usage = usage.copied().unwrap_or_default();
    info!(
        model = model,
        prompt_tokens = usage.prompt_token_count,
        candidates_tokens = usage.candidates_token_count,
        total_tokens = usage.total_token_count,
        duration_seconds = duration.as_secs_f64(),
        "request completed"
    );
}
