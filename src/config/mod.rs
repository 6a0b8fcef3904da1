use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub mod loader;
pub mod validator;

pub use loader::{load_config, load_config_str};
pub use validator::validate_config;

/// Number of symbols carried by one remote request.
pub const DEFAULT_BATCH_SIZE: usize = 200;
/// Default cap on batch requests in flight at once.
pub const DEFAULT_CONCURRENCY_LIMIT: usize = 5;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_REPORT_PATH: &str = "ranking_stock_returns.txt";

const DEFAULT_ENDPOINT: &str = "https://api.worldtradingdata.com/api/v1/stock";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub batch: BatchConfig,
    pub timeouts: TimeoutConfig,
    pub provider: ProviderConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    pub size: usize,
    pub concurrency: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutConfig {
    pub request: Duration,
    /// When set, the run stops waiting for outstanding batches after this long.
    pub overall: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub request: RequestConfig,
    pub response: ResponseFormat,
}

/// How one batch of symbols is turned into an outbound request.
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub endpoint: String,
    pub query: Vec<QueryParam>,
    pub headers: HashMap<String, String>,
    pub symbol_separator: String,
    pub symbol_quote: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParam {
    pub name: String,
    pub value: String,
}

impl QueryParam {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Where quote rows live in the response body and which keys carry the prices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFormat {
    pub data_path: Vec<String>,
    pub symbol_field: String,
    pub open_field: String,
    pub last_field: String,
}

impl Default for ResponseFormat {
    fn default() -> Self {
        Self {
            data_path: vec!["data".to_string()],
            symbol_field: "symbol".to_string(),
            open_field: "price_open".to_string(),
            last_field: "price".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportConfig {
    pub path: PathBuf,
    pub missing: MissingPolicy,
    pub append: bool,
}

/// Treatment of quotes whose return could not be computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingPolicy {
    /// Keep them at the bottom of the report with `Return: N/A`.
    #[default]
    Flag,
    Omit,
}

/// Values supplied on the command line, applied over the file configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub batch_size: Option<usize>,
    pub concurrency: Option<usize>,
    pub overall_timeout_secs: Option<u64>,
    pub report_path: Option<PathBuf>,
}

impl AppConfig {
    pub fn builtin() -> Self {
        let headers = HashMap::from([(
            "Accept".to_string(),
            "application/json".to_string(),
        )]);

        AppConfig {
            batch: BatchConfig {
                size: DEFAULT_BATCH_SIZE,
                concurrency: DEFAULT_CONCURRENCY_LIMIT,
            },
            timeouts: TimeoutConfig {
                request: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
                overall: None,
            },
            provider: ProviderConfig {
                request: RequestConfig {
                    endpoint: DEFAULT_ENDPOINT.to_string(),
                    query: vec![
                        QueryParam::new("symbol", "{symbols}"),
                        QueryParam::new("api_token", "${WTD_API_TOKEN}"),
                    ],
                    headers,
                    symbol_separator: ",".to_string(),
                    symbol_quote: None,
                },
                response: ResponseFormat::default(),
            },
            report: ReportConfig {
                path: PathBuf::from(DEFAULT_REPORT_PATH),
                missing: MissingPolicy::Flag,
                append: false,
            },
        }
    }

    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(size) = overrides.batch_size {
            self.batch.size = size;
        }
        if let Some(concurrency) = overrides.concurrency {
            self.batch.concurrency = concurrency;
        }
        if let Some(secs) = overrides.overall_timeout_secs {
            self.timeouts.overall = Some(Duration::from_secs(secs));
        }
        if let Some(path) = &overrides.report_path {
            self.report.path = path.clone();
        }
    }
}
