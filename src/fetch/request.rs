use std::collections::HashMap;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Url;

use crate::config::RequestConfig;
use crate::error::{AppError, Context, Result};

/// Fully rendered request for one batch.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub url: Url,
    pub headers: HeaderMap,
}

pub struct RequestContext<'a> {
    pub group_index: usize,
    pub symbols: &'a [String],
}

/// Render the endpoint, query parameters and headers for one batch of symbols.
pub fn prepare_request(
    request: &RequestConfig,
    context: RequestContext<'_>,
) -> Result<PreparedRequest> {
    let joined = join_symbols(
        context.symbols,
        &request.symbol_separator,
        request.symbol_quote.as_deref(),
    );

    let mut replacements: HashMap<&str, String> = HashMap::new();
    replacements.insert("symbols", joined);
    replacements.insert("count", context.symbols.len().to_string());
    replacements.insert("group", context.group_index.to_string());

    let endpoint = expand_env_vars(&render_template(&request.endpoint, &replacements)?)?;
    let mut url = Url::parse(&endpoint).map_err(|err| {
        AppError::message(format!("Invalid request endpoint `{endpoint}`: {err}"))
    })?;

    if !request.query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for param in &request.query {
            let value = expand_env_vars(&render_template(&param.value, &replacements)?)?;
            pairs.append_pair(&param.name, &value);
        }
    }

    let headers = build_headers(&request.headers)?;

    Ok(PreparedRequest { url, headers })
}

fn join_symbols(symbols: &[String], separator: &str, quote: Option<&str>) -> String {
    match quote {
        Some(quote) => symbols
            .iter()
            .map(|symbol| format!("{quote}{symbol}{quote}"))
            .collect::<Vec<_>>()
            .join(separator),
        None => symbols.join(separator),
    }
}

pub fn expand_env_vars(value: &str) -> Result<String> {
    let mut result = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut name = String::new();
            let mut closed = false;
            while let Some(&next) = chars.peek() {
                chars.next();
                if next == '}' {
                    closed = true;
                    break;
                }
                name.push(next);
            }

            if name.is_empty() {
                return Err(AppError::message(
                    "Encountered empty environment placeholder in request config",
                ));
            }

            if !closed {
                return Err(AppError::message(
                    "Unterminated environment placeholder in request config",
                ));
            }

            let value = std::env::var(&name).with_context(|| {
                format!(
                    "Environment variable {} required by request config is not set",
                    name
                )
            })?;
            result.push_str(&value);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}

/// Substitute `{name}` placeholders. `${VAR}` sequences pass through untouched.
fn render_template(template: &str, replacements: &HashMap<&str, String>) -> Result<String> {
    let mut result = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            result.push(ch);
            for next in chars.by_ref() {
                result.push(next);
                if next == '}' {
                    break;
                }
            }
        } else if ch == '{' {
            let mut key = String::new();
            let mut closed = false;
            while let Some(&next) = chars.peek() {
                chars.next();
                if next == '}' {
                    closed = true;
                    break;
                }
                key.push(next);
            }

            if !closed {
                return Err(AppError::message(format!(
                    "Unterminated placeholder in template: {{{key}"
                )));
            }

            if key.is_empty() {
                return Err(AppError::message(
                    "Encountered empty placeholder `{}` in template",
                ));
            }

            let value = replacements.get(key.as_str()).ok_or_else(|| {
                AppError::message(format!(
                    "No replacement provided for placeholder `{}` in template",
                    key
                ))
            })?;
            result.push_str(value);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}

fn build_headers(headers: &HashMap<String, String>) -> Result<HeaderMap> {
    let mut map = HeaderMap::new();
    for (key, value) in headers {
        let name = HeaderName::from_bytes(key.as_bytes())
            .with_context(|| format!("Invalid header name: {}", key))?;
        let expanded = expand_env_vars(value)?;
        let header_value = HeaderValue::from_str(&expanded)
            .with_context(|| format!("Invalid header value for {}", key))?;
        map.insert(name, header_value);
    }
    Ok(map)
}
