use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

use crate::error::{Context, Result};

use super::{
    validator, AppConfig, BatchConfig, MissingPolicy, ProviderConfig, QueryParam, ReportConfig,
    RequestConfig, ResponseFormat, TimeoutConfig, DEFAULT_BATCH_SIZE, DEFAULT_CONCURRENCY_LIMIT,
    DEFAULT_REPORT_PATH, DEFAULT_REQUEST_TIMEOUT_SECS,
};

/// Load and validate a JSON configuration file. Omitted sections fall back to the builtin values.
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read config JSON at {}", path.display()))?;

    load_config_str(&json)
        .with_context(|| format!("invalid config at {}", path.display()))
        .map_err(Into::into)
}

pub fn load_config_str(json: &str) -> Result<AppConfig> {
    let raw: RawConfig = serde_json::from_str(json).context("failed to parse config JSON")?;
    let config = raw.into_config();
    validator::validate_config(&config)?;
    Ok(config)
}

#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    #[serde(default)]
    batch: RawBatchConfig,
    #[serde(default)]
    timeouts: RawTimeoutConfig,
    #[serde(default)]
    provider: Option<RawProviderConfig>,
    #[serde(default)]
    report: RawReportConfig,
}

impl RawConfig {
    fn into_config(self) -> AppConfig {
        let builtin = AppConfig::builtin();
        let provider = match self.provider {
            Some(provider) => provider.into_provider_config(),
            None => builtin.provider,
        };

        AppConfig {
            batch: BatchConfig {
                size: self.batch.size,
                concurrency: self.batch.concurrency,
            },
            timeouts: TimeoutConfig {
                request: Duration::from_secs(self.timeouts.request_secs),
                overall: self.timeouts.overall_secs.map(Duration::from_secs),
            },
            provider,
            report: ReportConfig {
                path: self.report.path,
                missing: self.report.missing,
                append: self.report.append,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawBatchConfig {
    #[serde(default = "default_batch_size")]
    size: usize,
    #[serde(default = "default_concurrency")]
    concurrency: usize,
}

impl Default for RawBatchConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_BATCH_SIZE,
            concurrency: DEFAULT_CONCURRENCY_LIMIT,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawTimeoutConfig {
    #[serde(default = "default_request_secs")]
    request_secs: u64,
    #[serde(default)]
    overall_secs: Option<u64>,
}

impl Default for RawTimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            overall_secs: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawProviderConfig {
    request: RawRequestConfig,
    #[serde(default)]
    response: RawResponseConfig,
}

impl RawProviderConfig {
    fn into_provider_config(self) -> ProviderConfig {
        ProviderConfig {
            request: RequestConfig {
                endpoint: self.request.endpoint,
                query: self.request.query,
                headers: self.request.headers,
                symbol_separator: self.request.symbol_separator,
                symbol_quote: self.request.symbol_quote.filter(|quote| !quote.is_empty()),
            },
            response: ResponseFormat {
                data_path: self.response.path,
                symbol_field: self.response.symbol_field,
                open_field: self.response.open_field,
                last_field: self.response.last_field,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawRequestConfig {
    endpoint: String,
    #[serde(default)]
    query: Vec<QueryParam>,
    #[serde(default)]
    headers: HashMap<String, String>,
    #[serde(default = "default_separator")]
    symbol_separator: String,
    #[serde(default)]
    symbol_quote: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawResponseConfig {
    #[serde(default)]
    path: Vec<String>,
    #[serde(default = "default_symbol_field")]
    symbol_field: String,
    #[serde(default = "default_open_field")]
    open_field: String,
    #[serde(default = "default_last_field")]
    last_field: String,
}

impl Default for RawResponseConfig {
    fn default() -> Self {
        let format = ResponseFormat::default();
        Self {
            path: format.data_path,
            symbol_field: format.symbol_field,
            open_field: format.open_field,
            last_field: format.last_field,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawReportConfig {
    #[serde(default = "default_report_path")]
    path: PathBuf,
    #[serde(default)]
    missing: MissingPolicy,
    #[serde(default)]
    append: bool,
}

impl Default for RawReportConfig {
    fn default() -> Self {
        Self {
            path: default_report_path(),
            missing: MissingPolicy::default(),
            append: false,
        }
    }
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY_LIMIT
}

fn default_request_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_separator() -> String {
    ",".to_string()
}

fn default_symbol_field() -> String {
    ResponseFormat::default().symbol_field
}

fn default_open_field() -> String {
    ResponseFormat::default().open_field
}

fn default_last_field() -> String {
    ResponseFormat::default().last_field
}

fn default_report_path() -> PathBuf {
    PathBuf::from(DEFAULT_REPORT_PATH)
}
