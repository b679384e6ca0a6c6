#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sitelens::ai::{
    AiModelTier, AiOutcome, AiSummarizer, AiVisibilityProbe, KeywordResearcher, SummaryFacts,
};
use sitelens::analyzer::{Analyzer, AnalyzerSettings, Clock, Fetchers};
use sitelens::error::{FetchError, StoreError};
use sitelens::models::{
    AiSummary, AiUsage, AiVisibility, AnalysisOptions, AnalysisRequest, CompositeReport,
    KeywordInsight, PageSnapshot, PageSpeedReport, ScanMode, SecurityReport,
};
use sitelens::page_fetcher::PageFetcher;
use sitelens::pagespeed::PageSpeedFetcher;
use sitelens::policy::{SubscriptionRecord, TierPolicy};
use sitelens::retry::RetryPolicy;
use sitelens::security::{SecurityScanner, grade_for};
use sitelens::store::{AnalysisStore, MemoryStore, MonthlyUsage, UsageDelta};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

pub const PREMIUM_USER: &str = "premium-user";
pub const FREE_USER: &str = "free-user";

pub const CAR_WASH_PAGE: &str = r#"<!doctype html>
<html lang="nb">
<head>
  <title>Bilvask og bilpleie i Oslo sentrum | Example</title>
  <meta name="description" content="Profesjonell bilvask og bilpleie i Oslo. Vi tilbyr håndvask, innvendig rens og lakkforsegling med miljøvennlige produkter. Bestill time på nett i dag.">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <link rel="canonical" href="https://example.no/">
</head>
<body>
  <h1>Bilvask i Oslo</h1>
  <h2>Våre tjenester</h2>
  <p>Vi tilbyr bilvask og bilpleie oslo for privatbiler og firmabiler.</p>
  <img src="/vask.jpg" alt="Bil som vaskes">
  <a href="/kontakt">Kontakt oss</a>
  <a href="https://maps.example.com/">Kart</a>
</body>
</html>"#;

fn not_found(what: &str) -> FetchError {
    FetchError::InvalidResponse(format!("{} unavailable", what))
}

pub struct FakePages {
    pub html: String,
    pub status_code: u16,
    pub fail: bool,
    /// Hosts that fail even when `fail` is unset
    pub fail_hosts: Vec<String>,
    pub delay: Duration,
    pub calls: AtomicUsize,
}

impl Default for FakePages {
    fn default() -> Self {
        Self {
            html: CAR_WASH_PAGE.to_string(),
            status_code: 200,
            fail: false,
            fail_hosts: Vec::new(),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PageFetcher for FakePages {
    async fn fetch(&self, url: &Url) -> Result<PageSnapshot, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        let host = url.host_str().unwrap_or_default();
        if self.fail || self.fail_hosts.iter().any(|h| h == host) {
            return Err(not_found("page"));
        }
        Ok(PageSnapshot {
            url: url.to_string(),
            final_url: url.to_string(),
            status_code: self.status_code,
            headers: HashMap::new(),
            html: self.html.clone(),
            load_time_ms: 42,
        })
    }
}

pub fn security_report(domain: &str, score: u8, mode: ScanMode) -> SecurityReport {
    SecurityReport {
        domain: domain.to_string(),
        grade: grade_for(score).to_string(),
        score,
        https: true,
        mode,
        headers: BTreeMap::from([(
            "strict-transport-security".to_string(),
            "max-age=31536000".to_string(),
        )]),
        findings: vec![],
        scanned_at: Utc::now(),
    }
}

pub struct FakeSecurity {
    pub score: u8,
    pub fail: bool,
    pub delay: Duration,
    pub calls: AtomicUsize,
    pub modes: Mutex<Vec<(String, ScanMode)>>,
}

impl Default for FakeSecurity {
    fn default() -> Self {
        Self {
            score: 90,
            fail: false,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            modes: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl SecurityScanner for FakeSecurity {
    async fn scan(&self, domain: &str, mode: ScanMode) -> Result<SecurityReport, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.modes
            .lock()
            .unwrap()
            .push((domain.to_string(), mode));
        tokio::time::sleep(self.delay).await;
        if self.fail {
            return Err(not_found("security scan"));
        }
        Ok(security_report(domain, self.score, mode))
    }
}

pub struct FakePageSpeed {
    pub performance: u8,
    pub fail: bool,
    pub delay: Duration,
    pub calls: AtomicUsize,
}

impl Default for FakePageSpeed {
    fn default() -> Self {
        Self {
            performance: 60,
            fail: false,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PageSpeedFetcher for FakePageSpeed {
    async fn fetch(&self, _url: &Url) -> Result<PageSpeedReport, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if self.fail {
            return Err(not_found("PageSpeed"));
        }
        Ok(PageSpeedReport {
            performance: self.performance,
            accessibility: 95,
            best_practices: 100,
            seo: 92,
            ..Default::default()
        })
    }
}

pub fn usage(tokens: u64) -> AiUsage {
    AiUsage {
        tokens,
        cost_usd: tokens as f64 * 0.000001,
    }
}

#[derive(Default)]
pub struct FakeSummarizer {
    pub fail: bool,
    pub calls: AtomicUsize,
    pub tiers: Mutex<Vec<AiModelTier>>,
}

#[async_trait]
impl AiSummarizer for FakeSummarizer {
    async fn summarize(
        &self,
        facts: &SummaryFacts,
        tier: AiModelTier,
    ) -> Result<AiOutcome<AiSummary>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.tiers.lock().unwrap().push(tier);
        if self.fail {
            return Err(not_found("summarizer"));
        }
        Ok(AiOutcome {
            value: AiSummary {
                summary: format!("{} scores {} on SEO", facts.domain, facts.seo_score),
                strengths: vec!["Fast".to_string()],
                improvements: vec![],
                priority_actions: vec!["Add a CSP header".to_string()],
            },
            usage: usage(1_000),
        })
    }
}

pub struct FakeVisibility {
    pub score: u8,
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl Default for FakeVisibility {
    fn default() -> Self {
        Self {
            score: 40,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl AiVisibilityProbe for FakeVisibility {
    async fn probe(
        &self,
        domain: &str,
        keywords: &[String],
    ) -> Result<AiOutcome<AiVisibility>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(not_found("visibility probe"));
        }
        Ok(AiOutcome {
            value: AiVisibility {
                domain: domain.to_string(),
                score: self.score,
                mentioned_in: 1,
                queries_tested: keywords.len().max(1),
                checked_at: Utc::now(),
            },
            usage: usage(200),
        })
    }
}

#[derive(Default)]
pub struct FakeKeywords {
    pub fail: bool,
    pub calls: AtomicUsize,
}

#[async_trait]
impl KeywordResearcher for FakeKeywords {
    async fn research(
        &self,
        _domain: &str,
        keywords: &[String],
        _tier: AiModelTier,
    ) -> Result<AiOutcome<Vec<KeywordInsight>>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(not_found("keyword research"));
        }
        // The model also suggests a keyword nobody asked for
        let mut rows: Vec<KeywordInsight> = keywords
            .iter()
            .map(|k| KeywordInsight {
                keyword: k.to_uppercase(),
                search_volume: Some(1_200),
                difficulty: Some(35),
                intent: Some("commercial".to_string()),
                present_on_page: false,
            })
            .collect();
        rows.push(KeywordInsight {
            keyword: "dekkhotell".to_string(),
            search_volume: Some(900),
            difficulty: Some(20),
            intent: None,
            present_on_page: false,
        });
        Ok(AiOutcome {
            value: rows,
            usage: usage(300),
        })
    }
}

#[derive(Default, Clone)]
pub struct Fakes {
    pub pages: Arc<FakePages>,
    pub security: Arc<FakeSecurity>,
    pub page_speed: Arc<FakePageSpeed>,
    pub summarizer: Arc<FakeSummarizer>,
    pub visibility: Arc<FakeVisibility>,
    pub keywords: Arc<FakeKeywords>,
}

impl Fakes {
    pub fn fetchers(&self) -> Fetchers {
        Fetchers {
            pages: self.pages.clone(),
            security: self.security.clone(),
            page_speed: self.page_speed.clone(),
            summarizer: self.summarizer.clone(),
            visibility: self.visibility.clone(),
            keywords: self.keywords.clone(),
        }
    }
}

pub fn calls(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}

pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 4,
        base_delay_ms: 1,
        max_delay_ms: 10,
    }
}

pub fn settings(deadline_ms: u64, margin_ms: u64) -> AnalyzerSettings {
    AnalyzerSettings {
        deadline: Duration::from_millis(deadline_ms),
        persistence_margin: Duration::from_millis(margin_ms),
        retry: fast_retry(),
    }
}

pub fn policy() -> TierPolicy {
    TierPolicy::new(
        [PREMIUM_USER.to_string()],
        ["premium".to_string(), "pro".to_string()],
    )
}

pub fn analyzer(fakes: &Fakes, store: Arc<dyn AnalysisStore>) -> Analyzer {
    Analyzer::new(fakes.fetchers(), store, policy(), settings(2_000, 200))
        .expect("valid analyzer settings")
}

pub fn request(url: &str, keywords: &[&str]) -> AnalysisRequest {
    AnalysisRequest {
        target_url: url.to_string(),
        competitor_urls: vec![],
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
        options: AnalysisOptions::default(),
    }
}

/// Store whose updates report "no row" a fixed number of times before landing
pub struct LaggyStore {
    pub inner: MemoryStore,
    pub lagging_updates: AtomicUsize,
    pub update_attempts: AtomicUsize,
}

impl LaggyStore {
    pub fn new(lag: usize) -> Self {
        Self {
            inner: MemoryStore::new(),
            lagging_updates: AtomicUsize::new(lag),
            update_attempts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl AnalysisStore for LaggyStore {
    async fn recent_analyses(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<CompositeReport>, StoreError> {
        self.inner.recent_analyses(user_id, since, limit).await
    }

    async fn subscription(&self, user_id: &str) -> Result<Option<SubscriptionRecord>, StoreError> {
        self.inner.subscription(user_id).await
    }

    async fn monthly_usage(&self, user_id: &str, month: &str) -> Result<MonthlyUsage, StoreError> {
        self.inner.monthly_usage(user_id, month).await
    }

    async fn persist_analysis(
        &self,
        report: &CompositeReport,
        usage: UsageDelta,
    ) -> Result<(), StoreError> {
        self.inner.persist_analysis(report, usage).await
    }

    async fn load_analysis(&self, id: &str) -> Result<Option<CompositeReport>, StoreError> {
        self.inner.load_analysis(id).await
    }

    async fn update_analysis(&self, report: &CompositeReport) -> Result<bool, StoreError> {
        self.update_attempts.fetch_add(1, Ordering::SeqCst);
        let lagging = self
            .lagging_updates
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if lagging {
            return Ok(false);
        }
        self.inner.update_analysis(report).await
    }
}

/// Store whose reads always fail
#[derive(Default)]
pub struct BrokenCacheStore {
    pub inner: MemoryStore,
    /// When set, recent reads hang this long instead of failing
    pub stall: Option<Duration>,
}

#[async_trait]
impl AnalysisStore for BrokenCacheStore {
    async fn recent_analyses(
        &self,
        _user_id: &str,
        _since: DateTime<Utc>,
        _limit: usize,
    ) -> Result<Vec<CompositeReport>, StoreError> {
        if let Some(stall) = self.stall {
            tokio::time::sleep(stall).await;
            return Ok(Vec::new());
        }
        Err(StoreError::NotVisible("recent analyses".to_string()))
    }

    async fn subscription(&self, user_id: &str) -> Result<Option<SubscriptionRecord>, StoreError> {
        self.inner.subscription(user_id).await
    }

    async fn monthly_usage(&self, user_id: &str, month: &str) -> Result<MonthlyUsage, StoreError> {
        self.inner.monthly_usage(user_id, month).await
    }

    async fn persist_analysis(
        &self,
        report: &CompositeReport,
        usage: UsageDelta,
    ) -> Result<(), StoreError> {
        self.inner.persist_analysis(report, usage).await
    }

    async fn load_analysis(&self, id: &str) -> Result<Option<CompositeReport>, StoreError> {
        self.inner.load_analysis(id).await
    }

    async fn update_analysis(&self, report: &CompositeReport) -> Result<bool, StoreError> {
        self.inner.update_analysis(report).await
    }
}
