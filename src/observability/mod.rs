pub mod token_counter;

use crate::protocol::gemini::UsageMetadata;
use tracing_subscriber::EnvFilter;

/// Map a configured log level to a tracing filter directive.
///
/// Returns `None` for `DISABLED`.
#[must_use]
pub fn tracing_directive(log_level: &str) -> Option<&'static str> {
    match log_level.trim().to_uppercase().as_str() {
        "DISABLED" => None,
        "DEBUG" => Some("DEBUG"),
        "WARNING" | "WARN" => Some("WARN"),
        "ERROR" | "CRITICAL" => Some("ERROR"),
        _ => Some("INFO"),
    }
}

/// Initialize the tracing subscriber with the configured log level.
///
/// `DISABLED` installs nothing; `WARNING` maps to WARN and `CRITICAL` to
/// ERROR. A subscriber that is already installed is left in place.
pub fn init_tracing(log_level: &str) {
    let Some(directive) = tracing_directive(log_level) else {
        return;
    };

    let filter = EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("INFO"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Log backend-reported usage for a completed call, computing duration from
/// start time.
pub fn log_request_complete(
    model: &str,
    usage: Option<&UsageMetadata>,
    start_time: std::time::Instant,
) {
    token_counter::log_request_usage(model, usage, start_time.elapsed());
}
