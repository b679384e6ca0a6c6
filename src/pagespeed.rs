use crate::error::FetchError;
use crate::http_client::build_api_client;
use crate::models::{CoreWebVitals, PageSpeedReport};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

pub const DEFAULT_PAGESPEED_ENDPOINT: &str =
    "https://www.googleapis.com/pagespeedonline/v5/runPagespeed";

/// Lighthouse emulates a mid-range phone
const STRATEGY: &str = "mobile";

/// Lab performance metrics for a URL.
#[async_trait]
pub trait PageSpeedFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<PageSpeedReport, FetchError>;
}

/// Client for the PageSpeed Insights v5 API.
pub struct PageSpeedClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl PageSpeedClient {
    pub fn new(timeout: Duration, api_key: Option<String>) -> Result<Self, FetchError> {
        Ok(Self {
            client: build_api_client(timeout)?,
            endpoint: DEFAULT_PAGESPEED_ENDPOINT.to_string(),
            api_key,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PsiResponse {
    lighthouse_result: Option<LighthouseResult>,
}

#[derive(Deserialize)]
struct LighthouseResult {
    #[serde(default)]
    categories: HashMap<String, Category>,
    #[serde(default)]
    audits: HashMap<String, Audit>,
}

#[derive(Deserialize)]
struct Category {
    score: Option<f64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Audit {
    numeric_value: Option<f64>,
}

/// Converts a 0..1 Lighthouse category score to 0..100
fn category_score(result: &LighthouseResult, name: &str) -> u8 {
    result
        .categories
        .get(name)
        .and_then(|c| c.score)
        .map(|s| (s.clamp(0.0, 1.0) * 100.0).round() as u8)
        .unwrap_or(0)
}

fn audit_value(result: &LighthouseResult, name: &str) -> Option<f64> {
    result.audits.get(name).and_then(|a| a.numeric_value)
}

/// Parses a PageSpeed Insights v5 response body
pub fn parse_pagespeed(body: &str) -> Result<PageSpeedReport, FetchError> {
    let response: PsiResponse = serde_json::from_str(body)?;
    let result = response
        .lighthouse_result
        .ok_or_else(|| FetchError::InvalidResponse("missing lighthouseResult".to_string()))?;

    if !result.categories.contains_key("performance") {
        return Err(FetchError::InvalidResponse(
            "missing performance category".to_string(),
        ));
    }

    Ok(PageSpeedReport {
        performance: category_score(&result, "performance"),
        accessibility: category_score(&result, "accessibility"),
        best_practices: category_score(&result, "best-practices"),
        seo: category_score(&result, "seo"),
        core_web_vitals: CoreWebVitals {
            largest_contentful_paint_ms: audit_value(&result, "largest-contentful-paint"),
            first_contentful_paint_ms: audit_value(&result, "first-contentful-paint"),
            cumulative_layout_shift: audit_value(&result, "cumulative-layout-shift"),
            total_blocking_time_ms: audit_value(&result, "total-blocking-time"),
            speed_index_ms: audit_value(&result, "speed-index"),
        },
    })
}

#[async_trait]
impl PageSpeedFetcher for PageSpeedClient {
    async fn fetch(&self, url: &Url) -> Result<PageSpeedReport, FetchError> {
        let mut query: Vec<(&str, &str)> = vec![
            ("url", url.as_str()),
            ("strategy", STRATEGY),
            ("category", "performance"),
            ("category", "accessibility"),
            ("category", "best-practices"),
            ("category", "seo"),
        ];
        if let Some(key) = self.api_key.as_deref() {
            query.push(("key", key));
        }

        let response = self.client.get(&self.endpoint).query(&query).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::InvalidResponse(format!(
                "PageSpeed API responded with HTTP {}",
                status.as_u16()
            )));
        }
        let body = response.text().await?;
        let report = parse_pagespeed(&body)?;
        tracing::debug!(url = %url, performance = report.performance, "PageSpeed report received");
        Ok(report)
    }
}
