use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::Client;

use crate::config::ResponseFormat;
use crate::error::{Context, FetchError, Result};

use super::{decode_records, BatchDescriptor, FetchResult, QuoteSource, RawQuoteRecord};

const USER_AGENT: &str = concat!("stock-ranking/", env!("CARGO_PKG_VERSION"));

/// Fetches one batch with a single GET and decodes the body.
pub struct HttpQuoteSource {
    client: Client,
    format: ResponseFormat,
}

impl HttpQuoteSource {
    pub fn new(format: ResponseFormat, request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to construct quote HTTP client")?;
        Ok(Self::with_client(client, format))
    }

    pub fn with_client(client: Client, format: ResponseFormat) -> Self {
        Self { client, format }
    }
}

#[async_trait]
impl QuoteSource for HttpQuoteSource {
    async fn fetch(&self, batch: &BatchDescriptor) -> FetchResult<Vec<RawQuoteRecord>> {
        debug!(
            "Requesting group {} ({} symbols)",
            batch.group_index,
            batch.len()
        );

        let response = self
            .client
            .get(batch.request.url.clone())
            .headers(batch.request.headers.clone())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { status });
        }

        let body = response.text().await?;
        decode_records(&body, &self.format)
    }
}
