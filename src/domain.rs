use url::Url;

/// Maximum accepted URL length
const MAX_URL_LENGTH: usize = 2048;

/// Normalizes user input into an absolute http(s) URL.
///
/// Bare domains get `https://` prepended before parsing.
pub fn normalize_url(input: &str) -> Result<Url, String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err("URL is empty".to_string());
    }
    if trimmed.len() > MAX_URL_LENGTH {
        return Err(format!("URL exceeds {} characters", MAX_URL_LENGTH));
    }

    let lower = trimmed.to_ascii_lowercase();
    let normalized = if lower.starts_with("http://") || lower.starts_with("https://") {
        trimmed.to_string()
    } else if lower.contains("://") {
        return Err("only http and https are supported".to_string());
    } else {
        format!("https://{}", trimmed)
    };

    let url = Url::parse(&normalized).map_err(|e| e.to_string())?;
    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(format!("unsupported scheme '{}'", scheme)),
    }
    if url.host_str().is_none_or(|h| h.is_empty()) {
        return Err("URL has no host".to_string());
    }

    Ok(url)
}

/// Cache key for a URL: lowercased host without a leading `www.`
pub fn domain_of(url: &Url) -> Option<String> {
    url.host_str().map(normalize_domain)
}

pub fn normalize_domain(host: &str) -> String {
    let host = host.trim().trim_end_matches('.').to_ascii_lowercase();
    match host.strip_prefix("www.") {
        Some(rest) => rest.to_string(),
        None => host,
    }
}

/// Cache key for a security scan: the domain key plus any explicit port
pub fn scan_key_of(url: &Url) -> Option<String> {
    let domain = domain_of(url)?;
    Some(match url.port() {
        Some(port) => format!("{}:{}", domain, port),
        None => domain,
    })
}

/// Host plus explicit port, used as the target of a security scan
pub fn authority_of(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}
