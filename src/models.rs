use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub target_url: String,
    #[serde(default)]
    pub competitor_urls: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub options: AnalysisOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisOptions {
    pub include_ai: bool,
    pub use_premium_ai: bool,
    pub skip_page_speed: bool,
    pub quick_security_scan: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            include_ai: true,
            use_premium_ai: false,
            skip_page_speed: false,
            quick_security_scan: false,
        }
    }
}

/// One independent dimension of an analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Facet {
    Seo,
    Content,
    Security,
    PageSpeed,
    Competitors,
    AiSummary,
    AiVisibility,
    KeywordResearch,
}

impl Facet {
    pub fn as_str(&self) -> &'static str {
        match self {
            Facet::Seo => "seo",
            Facet::Content => "content",
            Facet::Security => "security",
            Facet::PageSpeed => "pageSpeed",
            Facet::Competitors => "competitors",
            Facet::AiSummary => "aiSummary",
            Facet::AiVisibility => "aiVisibility",
            Facet::KeywordResearch => "keywordResearch",
        }
    }
}

impl fmt::Display for Facet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FacetStatus {
    Success,
    Failed,
    Skipped,
    TimedOut,
}

/// Outcome of a single fetcher. Failed and timed-out facets carry no value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetResult<T> {
    pub status: FacetStatus,
    pub value: Option<T>,
}

impl<T> FacetResult<T> {
    pub fn success(value: T) -> Self {
        Self {
            status: FacetStatus::Success,
            value: Some(value),
        }
    }

    pub fn failed() -> Self {
        Self {
            status: FacetStatus::Failed,
            value: None,
        }
    }

    pub fn skipped() -> Self {
        Self {
            status: FacetStatus::Skipped,
            value: None,
        }
    }

    pub fn timed_out() -> Self {
        Self {
            status: FacetStatus::TimedOut,
            value: None,
        }
    }
}

/// Raw result of scraping a single page
#[derive(Debug, Clone)]
pub struct PageSnapshot {
    pub url: String,
    pub final_url: String,
    pub status_code: u16,
    /// Header names are lowercased
    pub headers: HashMap<String, String>,
    pub html: String,
    pub load_time_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub severity: IssueSeverity,
    pub issue_type: IssueType,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueSeverity {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueType {
    MissingTitle,
    TitleTooShort,
    TitleTooLong,
    MissingMetaDescription,
    MetaDescriptionTooShort,
    MetaDescriptionTooLong,
    MissingH1,
    MultipleH1,
    MissingImageAlt,
    MissingCanonical,
    MissingViewport,
    MissingLang,
    BadStatus,
    MissingOpenGraph,
    ThinContent,
    ShortContent,
    MissingSubheadings,
    MissingParagraphs,
    NoImages,
    NoInternalLinks,
    MissingKeywords,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenGraphTags {
    pub og_title: Option<String>,
    pub og_description: Option<String>,
    pub og_image: Option<String>,
    pub og_url: Option<String>,
    pub og_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeoReport {
    pub score: u8,
    pub status_code: u16,
    pub load_time_ms: u64,
    pub title: Option<String>,
    pub meta_description: Option<String>,
    pub h1_tags: Vec<String>,
    pub canonical: Option<String>,
    pub has_viewport: bool,
    pub lang: Option<String>,
    pub open_graph: OpenGraphTags,
    pub issues: Vec<Issue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordPresence {
    pub keyword: String,
    pub occurrences: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentReport {
    pub score: u8,
    pub word_count: usize,
    pub heading_count: usize,
    pub paragraph_count: usize,
    pub image_count: usize,
    pub images_missing_alt: usize,
    pub internal_links: usize,
    pub external_links: usize,
    pub keyword_coverage: Vec<KeywordPresence>,
    pub issues: Vec<Issue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    Quick,
    Full,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityFinding {
    pub code: String,
    pub description: String,
    pub deduction: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityReport {
    pub domain: String,
    pub grade: String,
    pub score: u8,
    pub https: bool,
    pub mode: ScanMode,
    /// Security headers present on the response, keyed by lowercased name
    pub headers: BTreeMap<String, String>,
    pub findings: Vec<SecurityFinding>,
    pub scanned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreWebVitals {
    pub largest_contentful_paint_ms: Option<f64>,
    pub first_contentful_paint_ms: Option<f64>,
    pub cumulative_layout_shift: Option<f64>,
    pub total_blocking_time_ms: Option<f64>,
    pub speed_index_ms: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSpeedReport {
    pub performance: u8,
    pub accessibility: u8,
    pub best_practices: u8,
    pub seo: u8,
    pub core_web_vitals: CoreWebVitals,
}

/// Token and cost usage of one or more AI calls
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiUsage {
    pub tokens: u64,
    pub cost_usd: f64,
}

impl AiUsage {
    pub fn add(&mut self, other: AiUsage) {
        self.tokens += other.tokens;
        self.cost_usd += other.cost_usd;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AiSummary {
    pub summary: String,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub priority_actions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiVisibility {
    pub domain: String,
    pub score: u8,
    pub mentioned_in: usize,
    pub queries_tested: usize,
    pub checked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordInsight {
    pub keyword: String,
    #[serde(default)]
    pub search_volume: Option<u32>,
    #[serde(default)]
    pub difficulty: Option<u8>,
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default)]
    pub present_on_page: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompetitorFacets {
    pub overall_score: u8,
    pub seo: SeoReport,
    pub content: ContentReport,
    pub security: Option<SecurityReport>,
    pub ai_visibility: Option<AiVisibility>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompetitorResult {
    pub url: String,
    pub results: CompetitorFacets,
}

/// The merged, scored result of one analysis request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeReport {
    pub id: String,
    pub user_id: String,
    pub target_url: String,
    pub domain: String,
    pub keywords: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub overall_score: u8,
    pub seo: SeoReport,
    pub content: ContentReport,
    pub security: SecurityReport,
    #[serde(rename = "pageSpeedResults", alias = "pageSpeed")]
    pub page_speed: Option<PageSpeedReport>,
    pub competitors: Vec<CompetitorResult>,
    pub ai_summary: Option<AiSummary>,
    pub ai_visibility: Option<AiVisibility>,
    pub keyword_research: Option<Vec<KeywordInsight>>,
    pub tokens_used: u64,
    pub cost_usd: f64,
    pub facets: BTreeMap<Facet, FacetStatus>,
}
