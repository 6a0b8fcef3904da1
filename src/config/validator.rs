use std::collections::HashSet;

use reqwest::Url;

use crate::error::{AppError, Result};

use super::{AppConfig, RequestConfig, ResponseFormat};

/// Placeholder replaced with the joined symbol list of a batch.
pub const SYMBOLS_PLACEHOLDER: &str = "{symbols}";

/// Validate a configuration and surface every problem in one descriptive error.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    let mut issues = Vec::new();

    if config.batch.size == 0 {
        issues.push("batch.size must be at least 1".to_string());
    }
    if config.batch.concurrency == 0 {
        issues.push("batch.concurrency must be at least 1".to_string());
    }
    if config.timeouts.request.is_zero() {
        issues.push("timeouts.request_secs must be greater than zero".to_string());
    }
    if matches!(config.timeouts.overall, Some(overall) if overall.is_zero()) {
        issues.push("timeouts.overall_secs must be greater than zero when set".to_string());
    }
    if config.report.path.as_os_str().is_empty() {
        issues.push("report.path must not be empty".to_string());
    }

    validate_request(&config.provider.request, &mut issues);
    validate_response(&config.provider.response, &mut issues);

    if issues.is_empty() {
        Ok(())
    } else {
        Err(AppError::message(format!(
            "configuration invalid:\n  - {}",
            issues.join("\n  - ")
        )))
    }
}

fn validate_request(request: &RequestConfig, issues: &mut Vec<String>) {
    if request.endpoint.trim().is_empty() {
        issues.push("provider.request.endpoint must not be empty".to_string());
    } else if !request.endpoint.contains("${") {
        // Endpoints with env placeholders are only parseable once expanded.
        if let Err(err) = Url::parse(&request.endpoint) {
            issues.push(format!(
                "provider.request.endpoint `{}` is not a valid URL: {err}",
                request.endpoint
            ));
        }
    }

    let mentions_symbols = request.endpoint.contains(SYMBOLS_PLACEHOLDER)
        || request
            .query
            .iter()
            .any(|param| param.value.contains(SYMBOLS_PLACEHOLDER));
    if !mentions_symbols {
        issues.push(format!(
            "provider.request must reference `{SYMBOLS_PLACEHOLDER}` in the endpoint or a query value"
        ));
    }

    let mut seen = HashSet::new();
    for param in &request.query {
        if param.name.trim().is_empty() {
            issues.push("provider.request.query contains an unnamed parameter".to_string());
        } else if !seen.insert(param.name.as_str()) {
            issues.push(format!(
                "provider.request.query parameter `{}` is defined twice",
                param.name
            ));
        }
    }

    if request.symbol_separator.is_empty() {
        issues.push("provider.request.symbol_separator must not be empty".to_string());
    }
}

fn validate_response(response: &ResponseFormat, issues: &mut Vec<String>) {
    if response.data_path.iter().any(|segment| segment.is_empty()) {
        issues.push("provider.response.path must not contain empty segments".to_string());
    }

    for (label, field) in [
        ("symbol_field", &response.symbol_field),
        ("open_field", &response.open_field),
        ("last_field", &response.last_field),
    ] {
        if field.trim().is_empty() {
            issues.push(format!("provider.response.{label} must not be empty"));
        }
    }
}
