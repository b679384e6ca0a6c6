use crate::error::FetchError;
use crate::http_client::build_http_client;
use crate::models::PageSnapshot;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use url::Url;

/// Scrapes a single page.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<PageSnapshot, FetchError>;
}

pub struct HttpPageFetcher {
    client: reqwest::Client,
}

impl HttpPageFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        Ok(Self {
            client: build_http_client(timeout)?,
        })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &Url) -> Result<PageSnapshot, FetchError> {
        let started = Instant::now();
        let response = self.client.get(url.as_str()).send().await?;
        let status_code = response.status().as_u16();
        let final_url = response.url().to_string();

        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();

        // Validate content type before the body is handed to the HTML analyzers
        if let Some(ct) = headers.get("content-type") {
            let ct_lower = ct.to_lowercase();
            if !ct_lower.contains("text/html") && !ct_lower.contains("application/xhtml") {
                tracing::warn!(
                    url = %url,
                    content_type = %ct,
                    "Non-HTML content type detected, analysis may be inaccurate"
                );
            }
        }

        let html = response.text().await?;
        let load_time_ms = started.elapsed().as_millis() as u64;

        tracing::debug!(url = %url, status = status_code, load_time_ms, "Fetched page");

        Ok(PageSnapshot {
            url: url.to_string(),
            final_url,
            status_code,
            headers,
            html,
            load_time_ms,
        })
    }
}
