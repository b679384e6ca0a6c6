use crate::domain::{domain_of, normalize_domain, scan_key_of};
use crate::models::{AiVisibility, CompositeReport, SecurityReport};
use crate::store::AnalysisStore;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use url::Url;

pub const CACHE_WINDOW_HOURS: i64 = 24;
pub const CACHE_SCAN_LIMIT: usize = 20;

/// A facet value reused from an earlier analysis
#[derive(Debug, Clone, PartialEq)]
pub struct CachedFacet<T> {
    pub domain: String,
    pub observed_at: DateTime<Utc>,
    pub value: T,
}

/// Domain-level facets found in the requester's recent analyses.
///
/// Built fresh for every request and never shared between requests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FacetCache {
    pub security: Option<CachedFacet<SecurityReport>>,
    pub ai_visibility: HashMap<String, CachedFacet<AiVisibility>>,
}

impl FacetCache {
    pub fn cutoff(now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::hours(CACHE_WINDOW_HOURS)
    }

    /// Scans `records` for reusable facets of the target.
    ///
    /// `target_key` is the target's [`scan_key_of`]: security scans are only
    /// reused for the same host and port. Only the most recent
    /// [`CACHE_SCAN_LIMIT`] records inside the window are considered; the
    /// first match wins. A record with any unparseable URL is skipped entirely.
    pub fn build(
        mut records: Vec<CompositeReport>,
        target_key: &str,
        now: DateTime<Utc>,
    ) -> Self {
        let cutoff = Self::cutoff(now);
        let target = normalize_domain(target_key);
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let mut cache = FacetCache::default();
        for record in records
            .into_iter()
            .filter(|r| r.created_at >= cutoff)
            .take(CACHE_SCAN_LIMIT)
        {
            let Some((primary, primary_key)) = Url::parse(&record.target_url)
                .ok()
                .and_then(|url| Some((domain_of(&url)?, scan_key_of(&url)?)))
            else {
                tracing::debug!(id = %record.id, url = %record.target_url, "Skipping cached record with unparseable URL");
                continue;
            };
            let competitor_domains: Option<Vec<String>> = record
                .competitors
                .iter()
                .map(|c| parse_domain(&c.url))
                .collect();
            let Some(competitor_domains) = competitor_domains else {
                tracing::debug!(id = %record.id, "Skipping cached record with unparseable competitor URL");
                continue;
            };

            if cache.security.is_none() && primary_key == target {
                cache.security = Some(CachedFacet {
                    domain: primary_key,
                    observed_at: record.created_at,
                    value: record.security.clone(),
                });
            }

            if let Some(visibility) = &record.ai_visibility {
                cache.offer_visibility(&primary, record.created_at, visibility);
            }
            for (domain, competitor) in competitor_domains.iter().zip(&record.competitors) {
                if let Some(visibility) = &competitor.results.ai_visibility {
                    cache.offer_visibility(domain, record.created_at, visibility);
                }
            }
        }
        cache
    }

    fn offer_visibility(
        &mut self,
        domain: &str,
        observed_at: DateTime<Utc>,
        value: &AiVisibility,
    ) {
        self.ai_visibility
            .entry(domain.to_string())
            .or_insert_with(|| CachedFacet {
                domain: domain.to_string(),
                observed_at,
                value: value.clone(),
            });
    }

    pub fn visibility_for(&self, domain: &str) -> Option<&CachedFacet<AiVisibility>> {
        self.ai_visibility.get(&normalize_domain(domain))
    }

    /// Reads the requester's recent analyses and builds the cache.
    ///
    /// A failed read yields an empty cache.
    pub async fn lookup(
        store: &dyn AnalysisStore,
        user_id: &str,
        target_key: &str,
        now: DateTime<Utc>,
    ) -> Self {
        match store
            .recent_analyses(user_id, Self::cutoff(now), CACHE_SCAN_LIMIT)
            .await
        {
            Ok(records) => {
                let cache = Self::build(records, target_key, now);
                tracing::debug!(
                    user_id = %user_id,
                    target = %target_key,
                    security_hit = cache.security.is_some(),
                    visibility_entries = cache.ai_visibility.len(),
                    "Cache lookup finished"
                );
                cache
            }
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Cache lookup failed, continuing without cache");
                FacetCache::default()
            }
        }
    }
}

fn parse_domain(url: &str) -> Option<String> {
    Url::parse(url).ok().as_ref().and_then(domain_of)
}
