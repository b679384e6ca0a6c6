use crate::error::FetchError;
use crate::http_client::{build_http_client, build_no_redirect_client};
use crate::models::{ScanMode, SecurityFinding, SecurityReport};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Grades a domain's transport and header security.
#[async_trait]
pub trait SecurityScanner: Send + Sync {
    /// `domain` is a host, optionally with an explicit port
    async fn scan(&self, domain: &str, mode: ScanMode) -> Result<SecurityReport, FetchError>;
}

/// Types of security findings that can be detected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecurityCheck {
    NoHttps,
    MissingHsts,
    MissingCsp,
    MissingContentTypeOptions,
    MissingFrameOptions,
    MissingReferrerPolicy,
    MissingPermissionsPolicy,
    NoHttpsRedirect,
}

impl SecurityCheck {
    pub fn description(&self) -> &'static str {
        match self {
            SecurityCheck::NoHttps => "Site is served over HTTP instead of HTTPS",
            SecurityCheck::MissingHsts => "Missing Strict-Transport-Security (HSTS) header",
            SecurityCheck::MissingCsp => "Missing Content-Security-Policy header",
            SecurityCheck::MissingContentTypeOptions => "Missing X-Content-Type-Options header",
            SecurityCheck::MissingFrameOptions => {
                "Missing X-Frame-Options header (or CSP frame-ancestors)"
            }
            SecurityCheck::MissingReferrerPolicy => "Missing Referrer-Policy header",
            SecurityCheck::MissingPermissionsPolicy => "Missing Permissions-Policy header",
            SecurityCheck::NoHttpsRedirect => "Plain HTTP does not redirect to HTTPS",
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            SecurityCheck::NoHttps => "no_https",
            SecurityCheck::MissingHsts => "missing_hsts",
            SecurityCheck::MissingCsp => "missing_csp",
            SecurityCheck::MissingContentTypeOptions => "missing_content_type_options",
            SecurityCheck::MissingFrameOptions => "missing_frame_options",
            SecurityCheck::MissingReferrerPolicy => "missing_referrer_policy",
            SecurityCheck::MissingPermissionsPolicy => "missing_permissions_policy",
            SecurityCheck::NoHttpsRedirect => "no_https_redirect",
        }
    }

    pub fn deduction(&self) -> u8 {
        match self {
            SecurityCheck::NoHttps => 40,
            SecurityCheck::MissingHsts | SecurityCheck::MissingCsp => 15,
            SecurityCheck::MissingContentTypeOptions
            | SecurityCheck::MissingFrameOptions
            | SecurityCheck::NoHttpsRedirect => 10,
            SecurityCheck::MissingReferrerPolicy | SecurityCheck::MissingPermissionsPolicy => 5,
        }
    }

    fn finding(&self) -> SecurityFinding {
        SecurityFinding {
            code: self.code().to_string(),
            description: self.description().to_string(),
            deduction: self.deduction(),
        }
    }
}

/// Headers reported back in [`SecurityReport::headers`]
const SECURITY_HEADERS: &[&str] = &[
    "strict-transport-security",
    "content-security-policy",
    "x-content-type-options",
    "x-frame-options",
    "referrer-policy",
    "permissions-policy",
    "cross-origin-opener-policy",
];

pub fn grade_for(score: u8) -> &'static str {
    match score {
        95..=u8::MAX => "A+",
        85..=94 => "A",
        70..=84 => "B",
        55..=69 => "C",
        40..=54 => "D",
        _ => "F",
    }
}

/// Grades a response's headers.
///
/// `headers` must use lowercased names. `redirects_to_https` is only checked
/// for full scans; `None` means the probe was not run.
pub fn grade_security(
    domain: &str,
    https: bool,
    headers: &HashMap<String, String>,
    redirects_to_https: Option<bool>,
    mode: ScanMode,
    scanned_at: DateTime<Utc>,
) -> SecurityReport {
    let mut checks = Vec::new();
    let has = |name: &str| headers.contains_key(name);

    if !https {
        checks.push(SecurityCheck::NoHttps);
    } else if !has("strict-transport-security") {
        // HSTS is ignored by browsers on plain HTTP, so only flag it over TLS
        checks.push(SecurityCheck::MissingHsts);
    }

    let csp = headers.get("content-security-policy");
    if csp.is_none() {
        checks.push(SecurityCheck::MissingCsp);
    }
    if !has("x-content-type-options") {
        checks.push(SecurityCheck::MissingContentTypeOptions);
    }
    let frame_ancestors = csp.is_some_and(|v| v.to_lowercase().contains("frame-ancestors"));
    if !has("x-frame-options") && !frame_ancestors {
        checks.push(SecurityCheck::MissingFrameOptions);
    }
    if !has("referrer-policy") {
        checks.push(SecurityCheck::MissingReferrerPolicy);
    }
    if !has("permissions-policy") {
        checks.push(SecurityCheck::MissingPermissionsPolicy);
    }
    if mode == ScanMode::Full && redirects_to_https == Some(false) {
        checks.push(SecurityCheck::NoHttpsRedirect);
    }

    let score = checks
        .iter()
        .fold(100u8, |acc, check| acc.saturating_sub(check.deduction()));

    let present: BTreeMap<String, String> = SECURITY_HEADERS
        .iter()
        .filter_map(|name| headers.get(*name).map(|v| (name.to_string(), v.clone())))
        .collect();

    SecurityReport {
        domain: domain.to_string(),
        grade: grade_for(score).to_string(),
        score,
        https,
        mode,
        headers: present,
        findings: checks.iter().map(SecurityCheck::finding).collect(),
        scanned_at,
    }
}

/// Scanner that grades the live response headers of a domain's home page.
pub struct HeaderSecurityScanner {
    client: reqwest::Client,
    no_redirect: reqwest::Client,
}

impl HeaderSecurityScanner {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        Ok(Self {
            client: build_http_client(timeout)?,
            no_redirect: build_no_redirect_client(timeout)?,
        })
    }

    async fn fetch_headers(&self, url: &str) -> Result<(String, HashMap<String, String>), FetchError> {
        let response = self.client.get(url).send().await?;
        let final_url = response.url().to_string();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        Ok((final_url, headers))
    }

    async fn probe_http_redirect(&self, domain: &str) -> Option<bool> {
        match self.no_redirect.get(format!("http://{}/", domain)).send().await {
            Ok(response) => {
                let to_https = response.status().is_redirection()
                    && response
                        .headers()
                        .get(reqwest::header::LOCATION)
                        .and_then(|v| v.to_str().ok())
                        .is_some_and(|loc| loc.starts_with("https://"));
                Some(to_https)
            }
            Err(e) => {
                tracing::debug!(domain = %domain, error = %e, "HTTP redirect probe failed");
                None
            }
        }
    }
}

#[async_trait]
impl SecurityScanner for HeaderSecurityScanner {
    async fn scan(&self, domain: &str, mode: ScanMode) -> Result<SecurityReport, FetchError> {
        let (final_url, headers) = match self.fetch_headers(&format!("https://{}/", domain)).await {
            Ok(found) => found,
            Err(e) => {
                tracing::info!(domain = %domain, error = %e, "HTTPS unavailable, retrying over HTTP");
                self.fetch_headers(&format!("http://{}/", domain)).await?
            }
        };
        let https = final_url.starts_with("https://");

        let redirects_to_https = match mode {
            ScanMode::Full if https => self.probe_http_redirect(domain).await,
            ScanMode::Full => Some(false),
            ScanMode::Quick => None,
        };

        Ok(grade_security(
            domain,
            https,
            &headers,
            redirects_to_https,
            mode,
            Utc::now(),
        ))
    }
}
