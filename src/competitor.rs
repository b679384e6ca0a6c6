use crate::analyzer::{Fetchers, analyze_snapshot};
use crate::cache::FacetCache;
use crate::domain::{authority_of, domain_of, normalize_url};
use crate::error::FetchError;
use crate::models::{AiUsage, CompetitorFacets, CompetitorResult, ScanMode};
use crate::scoring::{ScoreInputs, overall_score};
use std::collections::HashSet;
use url::Url;

/// Normalizes competitor URLs, dropping invalid ones and duplicates, then
/// truncates to `cap`.
pub fn prepare_competitors(urls: &[String], cap: usize) -> Vec<Url> {
    let mut seen = HashSet::new();
    let mut prepared = Vec::new();
    for raw in urls {
        match normalize_url(raw) {
            Ok(url) => {
                if seen.insert(url.to_string()) {
                    prepared.push(url);
                }
            }
            Err(reason) => {
                tracing::warn!(url = %raw, reason = %reason, "Dropping invalid competitor URL");
            }
        }
    }
    if prepared.len() > cap {
        tracing::info!(
            submitted = prepared.len(),
            cap,
            "Competitor list truncated to tier cap"
        );
        prepared.truncate(cap);
    }
    prepared
}

/// Scrapes and scores one competitor.
///
/// Only the scrape is required; a failed security scan or visibility probe
/// leaves that facet empty.
pub async fn analyze_competitor(
    fetchers: &Fetchers,
    url: &Url,
    keywords: &[String],
    cache: &FacetCache,
    include_ai: bool,
) -> Result<(CompetitorResult, AiUsage), FetchError> {
    let domain = domain_of(url).unwrap_or_default();
    let authority = authority_of(url).unwrap_or_else(|| domain.clone());

    let security = async {
        match fetchers.security.scan(&authority, ScanMode::Quick).await {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Competitor security scan failed");
                None
            }
        }
    };

    let visibility = async {
        if !include_ai {
            return (None, AiUsage::default());
        }
        if let Some(cached) = cache.visibility_for(&domain) {
            tracing::debug!(domain = %domain, "Reusing cached AI visibility for competitor");
            return (Some(cached.value.clone()), AiUsage::default());
        }
        match fetchers.visibility.probe(&domain, keywords).await {
            Ok(outcome) => (Some(outcome.value), outcome.usage),
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Competitor AI visibility probe failed");
                (None, AiUsage::default())
            }
        }
    };

    let (snapshot, security, (ai_visibility, usage)) =
        tokio::join!(fetchers.pages.fetch(url), security, visibility);
    let snapshot = snapshot?;
    let (seo, content) = analyze_snapshot(&snapshot, url, keywords);

    let overall_score = overall_score(ScoreInputs {
        seo: seo.score,
        content: content.score,
        security: security.as_ref().map_or(0, |s| s.score),
        performance: None,
    });

    Ok((
        CompetitorResult {
            url: url.to_string(),
            results: CompetitorFacets {
                overall_score,
                seo,
                content,
                security,
                ai_visibility,
            },
        },
        usage,
    ))
}
