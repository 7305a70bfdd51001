use super::{AppConfig, ConfigError, CustomBackendConfig};

/// Validate the full application config, returning an error if any rule is violated.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] when any configuration invariant is violated.
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    validate_custom_api(&config.custom_api)?;
    validate_default_headers(config)?;
    validate_log_level(config)?;
    Ok(())
}

fn validation_err(msg: impl Into<String>) -> ConfigError {
    ConfigError::Validation(msg.into())
}

/// Check that `endpoint` is an absolute `http`/`https` URL.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] describing what is wrong with the URL.
pub fn validate_endpoint(endpoint: &str) -> Result<url::Url, ConfigError> {
    let endpoint = endpoint.trim();
    if endpoint.is_empty() {
        return Err(validation_err("custom_api.endpoint is required"));
    }
    let parsed = url::Url::parse(endpoint).map_err(|err| {
        validation_err(format!("custom_api.endpoint is not a valid URL: {err}"))
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(validation_err(
            "custom_api.endpoint must use http:// or https://",
        ));
    }
    if parsed.host_str().is_none() {
        return Err(validation_err("custom_api.endpoint must include a host"));
    }
    Ok(parsed)
}

fn validate_custom_api(custom_api: &CustomBackendConfig) -> Result<(), ConfigError> {
    validate_endpoint(&custom_api.endpoint)?;
    if custom_api
        .api_key
        .as_deref()
        .is_some_and(|key| key.trim().is_empty())
    {
        return Err(validation_err("custom_api.api_key cannot be blank when set"));
    }
    if custom_api
        .model
        .as_deref()
        .is_some_and(|model| model.trim().is_empty())
    {
        return Err(validation_err("custom_api.model cannot be blank when set"));
    }
    Ok(())
}

fn validate_default_headers(config: &AppConfig) -> Result<(), ConfigError> {
    for (name, value) in &config.http.default_headers {
        if http::HeaderName::from_bytes(name.as_bytes()).is_err() {
            return Err(validation_err(format!(
                "http.default_headers: '{name}' is not a valid header name"
            )));
        }
        if http::HeaderValue::from_str(value).is_err() {
            return Err(validation_err(format!(
                "http.default_headers: value for '{name}' is not a valid header value"
            )));
        }
    }
    Ok(())
}

fn validate_log_level(config: &AppConfig) -> Result<(), ConfigError> {
    let valid_levels = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL", "DISABLED"];
    if !valid_levels.contains(&config.features.log_level.to_uppercase().as_str()) {
        return Err(validation_err(format!(
            "log_level must be one of {valid_levels:?}"
        )));
    }
    Ok(())
}
