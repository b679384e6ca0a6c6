use reqwest::header::{self, HeaderValue};
use reqwest::{Client, ClientBuilder, redirect};
use std::time::Duration;

/// Common HTTP headers used for all page requests
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.3 Safari/605.1.15";
const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9,nb;q=0.8";

/// Creates a reqwest client with browser-like headers that follows redirects
pub fn build_http_client(timeout: Duration) -> reqwest::Result<Client> {
    base_builder(timeout)
        .redirect(redirect::Policy::limited(10))
        .build()
}

/// Same as [`build_http_client`] but never follows redirects
pub fn build_no_redirect_client(timeout: Duration) -> reqwest::Result<Client> {
    base_builder(timeout).redirect(redirect::Policy::none()).build()
}

/// Client for JSON APIs (PageSpeed, OpenAI)
pub fn build_api_client(timeout: Duration) -> reqwest::Result<Client> {
    ClientBuilder::new()
        .user_agent(concat!("sitelens/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
}

fn base_builder(timeout: Duration) -> ClientBuilder {
    let mut headers = header::HeaderMap::new();
    headers.insert(header::ACCEPT, HeaderValue::from_static(ACCEPT));
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static(ACCEPT_LANGUAGE),
    );

    ClientBuilder::new()
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .timeout(timeout)
        .gzip(true)
        .brotli(true)
        .deflate(true)
}
