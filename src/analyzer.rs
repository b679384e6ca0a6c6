use crate::ai::{
    AiModelTier, AiOutcome, AiSummarizer, AiVisibilityProbe, KeywordResearcher, SummaryFacts,
};
use crate::cache::FacetCache;
use crate::competitor::{analyze_competitor, prepare_competitors};
use crate::content_analyzer::ContentAnalyzer;
use crate::domain::{authority_of, domain_of, normalize_url, scan_key_of};
use crate::error::{AnalysisError, FetchError, StoreError};
use crate::models::{
    AiUsage, AnalysisRequest, CompositeReport, ContentReport, Facet, FacetResult, FacetStatus,
    KeywordInsight, KeywordPresence, PageSnapshot, ScanMode, SeoReport,
};
use crate::page_fetcher::PageFetcher;
use crate::pagespeed::PageSpeedFetcher;
use crate::policy::TierPolicy;
use crate::retry::RetryPolicy;
use crate::scoring::{ScoreInputs, overall_score};
use crate::security::SecurityScanner;
use crate::seo_analyzer::SeoAnalyzer;
use crate::store::{AnalysisStore, UsageDelta, month_key};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use scraper::Html;
use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, timeout_at};
use url::Url;

pub const MAX_KEYWORDS: usize = 50;

/// The external data sources an analysis fans out to
#[derive(Clone)]
pub struct Fetchers {
    pub pages: Arc<dyn PageFetcher>,
    pub security: Arc<dyn SecurityScanner>,
    pub page_speed: Arc<dyn PageSpeedFetcher>,
    pub summarizer: Arc<dyn AiSummarizer>,
    pub visibility: Arc<dyn AiVisibilityProbe>,
    pub keywords: Arc<dyn KeywordResearcher>,
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalyzerSettings {
    /// Wall-clock limit the caller gives the whole request
    pub deadline: Duration,
    /// Reserved out of `deadline` for serializing and persisting the report
    pub persistence_margin: Duration,
    /// Applied to the PageSpeed follow-up patch
    pub retry: RetryPolicy,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            deadline: Duration::from_secs(60),
            persistence_margin: Duration::from_secs(5),
            retry: RetryPolicy::default(),
        }
    }
}

/// Runs analyses against a deadline and persists the composite report.
pub struct Analyzer {
    fetchers: Fetchers,
    store: Arc<dyn AnalysisStore>,
    policy: TierPolicy,
    retry: RetryPolicy,
    budget: Duration,
    clock: Arc<dyn Clock>,
}

impl Analyzer {
    pub fn new(
        fetchers: Fetchers,
        store: Arc<dyn AnalysisStore>,
        policy: TierPolicy,
        settings: AnalyzerSettings,
    ) -> Result<Self, AnalysisError> {
        if settings.deadline <= settings.persistence_margin {
            return Err(AnalysisError::Config(format!(
                "deadline ({} ms) must exceed the persistence margin ({} ms)",
                settings.deadline.as_millis(),
                settings.persistence_margin.as_millis()
            )));
        }

        Ok(Self {
            fetchers,
            store,
            policy,
            retry: settings.retry,
            budget: settings.deadline - settings.persistence_margin,
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    async fn before_deadline<T>(
        &self,
        deadline: Instant,
        read: impl Future<Output = T>,
    ) -> Result<T, AnalysisError> {
        timeout_at(deadline, read)
            .await
            .map_err(|_| AnalysisError::DeadlineExceeded {
                budget_ms: self.budget.as_millis() as u64,
            })
    }

    pub async fn analyze(
        &self,
        user_id: &str,
        request: AnalysisRequest,
    ) -> Result<CompositeReport, AnalysisError> {
        let deadline = Instant::now() + self.budget;
        let now = self.clock.now();

        let invalid = |reason: String| AnalysisError::InvalidUrl {
            url: request.target_url.clone(),
            reason,
        };
        let target = normalize_url(&request.target_url).map_err(invalid)?;
        let domain = domain_of(&target).ok_or_else(|| invalid("URL has no host".to_string()))?;
        let authority =
            authority_of(&target).ok_or_else(|| invalid("URL has no host".to_string()))?;
        let scan_key = scan_key_of(&target).unwrap_or_else(|| domain.clone());

        let keywords = normalize_keywords(&request.keywords);
        if keywords.is_empty() {
            return Err(AnalysisError::NoKeywords);
        }

        let subscription = self
            .before_deadline(deadline, self.store.subscription(user_id))
            .await??;
        let tier = self.policy.tier(user_id, subscription.as_ref(), now);
        let limits = self.policy.limits(tier);
        let usage = self
            .before_deadline(deadline, self.store.monthly_usage(user_id, &month_key(now)))
            .await??;
        if usage.analyses >= limits.monthly_analyses {
            return Err(AnalysisError::QuotaExceeded {
                used: usage.analyses,
                limit: limits.monthly_analyses,
            });
        }

        let options = request.options;
        let model_tier = match (options.use_premium_ai, limits.premium_ai) {
            (true, true) => AiModelTier::Premium,
            (true, false) => {
                tracing::warn!(user_id = %user_id, "Premium AI requested on a free account, using the standard model");
                AiModelTier::Standard
            }
            _ => AiModelTier::Standard,
        };
        let competitors = prepare_competitors(&request.competitor_urls, limits.max_competitors);

        tracing::info!(
            user_id = %user_id,
            url = %target,
            tier = ?tier,
            competitors = competitors.len(),
            keywords = keywords.len(),
            budget_ms = self.budget.as_millis() as u64,
            "Starting analysis"
        );

        let cache = match timeout_at(
            deadline,
            FacetCache::lookup(self.store.as_ref(), user_id, &scan_key, now),
        )
        .await
        {
            Ok(cache) => cache,
            Err(_) => {
                tracing::warn!(user_id = %user_id, domain = %domain, "Cache lookup missed the deadline, fetching live");
                FacetCache::default()
            }
        };

        let fetchers = &self.fetchers;
        let (target, domain, keywords, cache) = (&target, &domain, &keywords, &cache);

        let mandatory = async {
            let scrape = async {
                let snapshot = fetchers.pages.fetch(target).await.map_err(|source| {
                    AnalysisError::ScrapeFailed {
                        url: target.to_string(),
                        source,
                    }
                })?;
                Ok::<_, AnalysisError>(analyze_snapshot(&snapshot, target, keywords))
            };

            let security = async {
                if let Some(cached) = &cache.security {
                    tracing::info!(domain = %domain, observed_at = %cached.observed_at, "Reusing cached security scan");
                    return Ok(cached.value.clone());
                }
                let mode = if options.quick_security_scan {
                    ScanMode::Quick
                } else {
                    ScanMode::Full
                };
                fetchers
                    .security
                    .scan(&authority, mode)
                    .await
                    .map_err(|source| AnalysisError::SecurityScanFailed {
                        domain: authority.clone(),
                        source,
                    })
            };

            let ((seo, content), security) =
                match timeout_at(deadline, async { tokio::try_join!(scrape, security) }).await {
                    Ok(result) => result?,
                    Err(_) => {
                        tracing::warn!(url = %target, "Mandatory facets missed the deadline");
                        return Err(AnalysisError::DeadlineExceeded {
                            budget_ms: self.budget.as_millis() as u64,
                        });
                    }
                };

            let summary = if options.include_ai {
                let facts =
                    SummaryFacts::new(target.as_str(), domain, &seo, &content, &security, keywords);
                optional_facet(
                    Facet::AiSummary,
                    deadline,
                    fetchers.summarizer.summarize(&facts, model_tier),
                )
                .await
            } else {
                FacetResult::skipped()
            };

            Ok((seo, content, security, summary))
        };

        let optional = async {
            let page_speed = async {
                if options.skip_page_speed {
                    return FacetResult::skipped();
                }
                optional_facet(Facet::PageSpeed, deadline, fetchers.page_speed.fetch(target)).await
            };

            let visibility = async {
                if !options.include_ai {
                    return FacetResult::skipped();
                }
                if let Some(cached) = cache.visibility_for(domain) {
                    tracing::info!(domain = %domain, "Reusing cached AI visibility");
                    return FacetResult::success(AiOutcome {
                        value: cached.value.clone(),
                        usage: AiUsage::default(),
                    });
                }
                optional_facet(
                    Facet::AiVisibility,
                    deadline,
                    fetchers.visibility.probe(domain, keywords),
                )
                .await
            };

            let research = async {
                if !options.include_ai {
                    return FacetResult::skipped();
                }
                optional_facet(
                    Facet::KeywordResearch,
                    deadline,
                    fetchers.keywords.research(domain, keywords, model_tier),
                )
                .await
            };

            let competitor_runs = async {
                if competitors.is_empty() {
                    return FacetResult::skipped();
                }
                let runs = competitors.iter().map(|url| async move {
                    let run = analyze_competitor(fetchers, url, keywords, cache, options.include_ai);
                    match timeout_at(deadline, run).await {
                        Ok(Ok(result)) => Some(result),
                        Ok(Err(e)) => {
                            tracing::warn!(url = %url, error = %e, "Competitor analysis failed");
                            None
                        }
                        Err(_) => {
                            tracing::warn!(url = %url, "Competitor analysis missed the deadline");
                            None
                        }
                    }
                });
                let finished: Vec<_> = join_all(runs).await.into_iter().flatten().collect();
                if finished.is_empty() {
                    FacetResult::failed()
                } else {
                    FacetResult::success(finished)
                }
            };

            let results = tokio::join!(page_speed, visibility, research, competitor_runs);
            Ok::<_, AnalysisError>(results)
        };

        let (
            (seo, content, security, summary),
            (page_speed, visibility, research, competitor_runs),
        ) = tokio::try_join!(mandatory, optional)?;

        let mut ai_usage = AiUsage::default();
        let facets = BTreeMap::from([
            (Facet::Seo, FacetStatus::Success),
            (Facet::Content, FacetStatus::Success),
            (Facet::Security, FacetStatus::Success),
            (Facet::PageSpeed, page_speed.status),
            (Facet::Competitors, competitor_runs.status),
            (Facet::AiSummary, summary.status),
            (Facet::AiVisibility, visibility.status),
            (Facet::KeywordResearch, research.status),
        ]);

        let ai_summary = summary.value.map(|o| {
            ai_usage.add(o.usage);
            o.value
        });
        let ai_visibility = visibility.value.map(|o| {
            ai_usage.add(o.usage);
            o.value
        });
        let keyword_research = research.value.map(|o| {
            ai_usage.add(o.usage);
            finalize_research(o.value, keywords, &content.keyword_coverage)
        });
        let competitors = competitor_runs
            .value
            .unwrap_or_default()
            .into_iter()
            .map(|(result, usage)| {
                ai_usage.add(usage);
                result
            })
            .collect();

        let page_speed = page_speed.value;
        let overall_score = overall_score(ScoreInputs {
            seo: seo.score,
            content: content.score,
            security: security.score,
            performance: page_speed.as_ref().map(|p| p.performance),
        });

        let report = CompositeReport {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            target_url: target.to_string(),
            domain: domain.clone(),
            keywords: keywords.clone(),
            created_at: now,
            overall_score,
            seo,
            content,
            security,
            page_speed,
            competitors,
            ai_summary,
            ai_visibility,
            keyword_research,
            tokens_used: ai_usage.tokens,
            cost_usd: ai_usage.cost_usd,
            facets,
        };

        self.store
            .persist_analysis(
                &report,
                UsageDelta {
                    analyses: 1,
                    tokens: ai_usage.tokens,
                    cost_usd: ai_usage.cost_usd,
                },
            )
            .await?;

        tracing::info!(
            id = %report.id,
            url = %report.target_url,
            overall_score = report.overall_score,
            tokens = report.tokens_used,
            "Analysis complete"
        );
        Ok(report)
    }

    /// Fetches PageSpeed for a stored analysis and patches the stored report.
    ///
    /// A failed fetch is not returned as an error. It is recorded in the
    /// report's facets unless the report already holds a measurement, which is
    /// then kept as is. The patch is retried per the configured [`RetryPolicy`].
    pub async fn refresh_page_speed(
        &self,
        user_id: &str,
        analysis_id: &str,
    ) -> Result<CompositeReport, AnalysisError> {
        let deadline = Instant::now() + self.budget;

        let mut report = match self.store.load_analysis(analysis_id).await? {
            Some(report) if report.user_id == user_id => report,
            _ => return Err(AnalysisError::NotFound(analysis_id.to_string())),
        };
        let target = Url::parse(&report.target_url).map_err(|e| AnalysisError::InvalidUrl {
            url: report.target_url.clone(),
            reason: e.to_string(),
        })?;

        let result =
            optional_facet(Facet::PageSpeed, deadline, self.fetchers.page_speed.fetch(&target))
                .await;
        match result.value {
            Some(page_speed) => {
                report.facets.insert(Facet::PageSpeed, result.status);
                report.page_speed = Some(page_speed);
                report.overall_score = overall_score(ScoreInputs {
                    seo: report.seo.score,
                    content: report.content.score,
                    security: report.security.score,
                    performance: report.page_speed.as_ref().map(|p| p.performance),
                });
            }
            // A failed re-measure leaves an earlier measurement in place
            None if report.page_speed.is_some() => {
                tracing::warn!(
                    id = %report.id,
                    status = ?result.status,
                    "PageSpeed follow-up failed, keeping the stored result"
                );
                return Ok(report);
            }
            None => {
                report.facets.insert(Facet::PageSpeed, result.status);
            }
        }

        let store = &self.store;
        let patched = &report;
        self.retry
            .run(move || async move {
                match store.update_analysis(patched).await {
                    Ok(true) => Ok(()),
                    Ok(false) => {
                        tracing::debug!(id = %patched.id, "Stored analysis not visible yet");
                        Err(StoreError::NotVisible(patched.id.clone()))
                    }
                    Err(e) => Err(e),
                }
            })
            .await?;

        tracing::info!(
            id = %report.id,
            status = ?result.status,
            overall_score = report.overall_score,
            "PageSpeed follow-up stored"
        );
        Ok(report)
    }
}

/// Runs an optional fetcher against the shared deadline
async fn optional_facet<T, F>(facet: Facet, deadline: Instant, fetch: F) -> FacetResult<T>
where
    F: Future<Output = Result<T, FetchError>>,
{
    match timeout_at(deadline, fetch).await {
        Ok(Ok(value)) => FacetResult::success(value),
        Ok(Err(e)) => {
            tracing::warn!(facet = %facet, error = %e, "Optional facet failed");
            FacetResult::failed()
        }
        Err(_) => {
            tracing::warn!(facet = %facet, "Optional facet missed the deadline");
            FacetResult::timed_out()
        }
    }
}

/// Local SEO and content analysis of a scraped page
pub fn analyze_snapshot(
    snapshot: &PageSnapshot,
    page_url: &Url,
    keywords: &[String],
) -> (SeoReport, ContentReport) {
    let document = Html::parse_document(&snapshot.html);
    let base = Url::parse(&snapshot.final_url).unwrap_or_else(|_| page_url.clone());
    (
        SeoAnalyzer::analyze(snapshot, &document),
        ContentAnalyzer::analyze(&document, &base, keywords),
    )
}

/// Trims, drops blanks and case-insensitive duplicates, then caps the list
pub fn normalize_keywords(raw: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .filter(|k| seen.insert(k.to_lowercase()))
        .take(MAX_KEYWORDS)
        .map(str::to_string)
        .collect()
}

/// Keeps only rows for requested keywords and marks which appear on the page
fn finalize_research(
    rows: Vec<KeywordInsight>,
    keywords: &[String],
    coverage: &[KeywordPresence],
) -> Vec<KeywordInsight> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter_map(|mut row| {
            let key = row.keyword.trim().to_lowercase();
            let requested = keywords.iter().find(|k| k.to_lowercase() == key)?;
            if !seen.insert(key) {
                return None;
            }
            row.present_on_page = coverage
                .iter()
                .any(|c| c.keyword == *requested && c.occurrences > 0);
            row.keyword = requested.clone();
            Some(row)
        })
        .collect()
}
