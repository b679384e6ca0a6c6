use crate::error::FetchError;
use crate::http_client::build_api_client;
use crate::models::{
    AiSummary, AiUsage, AiVisibility, ContentReport, KeywordInsight, SecurityReport, SeoReport,
};
use async_trait::async_trait;
use chrono::Utc;
use governor::{
    Quota, RateLimiter, clock::DefaultClock, state::InMemoryState, state::direct::NotKeyed,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::num::NonZeroU32;
use std::time::Duration;

/// Queries sent to the model per visibility probe
const MAX_VISIBILITY_QUERIES: usize = 5;

/// A fetched AI value together with what it cost
#[derive(Debug, Clone, PartialEq)]
pub struct AiOutcome<T> {
    pub value: T,
    pub usage: AiUsage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiModelTier {
    Standard,
    Premium,
}

/// Facts handed to the summarizer, built from the mandatory facets
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryFacts {
    pub url: String,
    pub domain: String,
    pub seo_score: u8,
    pub content_score: u8,
    pub security_score: u8,
    pub security_grade: String,
    pub word_count: usize,
    pub keywords: Vec<String>,
    pub seo_issues: Vec<String>,
    pub content_issues: Vec<String>,
    pub security_findings: Vec<String>,
}

impl SummaryFacts {
    pub fn new(
        url: &str,
        domain: &str,
        seo: &SeoReport,
        content: &ContentReport,
        security: &SecurityReport,
        keywords: &[String],
    ) -> Self {
        Self {
            url: url.to_string(),
            domain: domain.to_string(),
            seo_score: seo.score,
            content_score: content.score,
            security_score: security.score,
            security_grade: security.grade.clone(),
            word_count: content.word_count,
            keywords: keywords.to_vec(),
            seo_issues: seo.issues.iter().map(|i| i.message.clone()).collect(),
            content_issues: content.issues.iter().map(|i| i.message.clone()).collect(),
            security_findings: security
                .findings
                .iter()
                .map(|f| f.description.clone())
                .collect(),
        }
    }
}

#[async_trait]
pub trait AiSummarizer: Send + Sync {
    async fn summarize(
        &self,
        facts: &SummaryFacts,
        tier: AiModelTier,
    ) -> Result<AiOutcome<AiSummary>, FetchError>;
}

/// Measures how often a domain shows up in LLM answers for its keywords.
#[async_trait]
pub trait AiVisibilityProbe: Send + Sync {
    async fn probe(
        &self,
        domain: &str,
        keywords: &[String],
    ) -> Result<AiOutcome<AiVisibility>, FetchError>;
}

#[async_trait]
pub trait KeywordResearcher: Send + Sync {
    async fn research(
        &self,
        domain: &str,
        keywords: &[String],
        tier: AiModelTier,
    ) -> Result<AiOutcome<Vec<KeywordInsight>>, FetchError>;
}

/// USD per 1000 tokens
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenAiSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub standard_model: String,
    pub premium_model: String,
    pub standard_pricing: ModelPricing,
    pub premium_pricing: ModelPricing,
    pub requests_per_second: Option<u32>,
    pub timeout: Duration,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            standard_model: "gpt-4o-mini".to_string(),
            premium_model: "gpt-4o".to_string(),
            standard_pricing: ModelPricing {
                input_per_1k: 0.00015,
                output_per_1k: 0.0006,
            },
            premium_pricing: ModelPricing {
                input_per_1k: 0.0025,
                output_per_1k: 0.01,
            },
            requests_per_second: Some(3),
            timeout: Duration::from_secs(60),
        }
    }
}

/// OpenAI chat-completions client backing all three AI traits.
pub struct OpenAiClient {
    client: reqwest::Client,
    settings: OpenAiSettings,
    rate_limiter: Option<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TokenUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VisibilityAnswers {
    #[serde(default)]
    answers: Vec<VisibilityAnswer>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VisibilityAnswer {
    #[serde(default)]
    answer: String,
    #[serde(default)]
    recommended_sites: Vec<String>,
}

#[derive(Deserialize)]
struct KeywordRows {
    #[serde(default)]
    keywords: Vec<serde_json::Value>,
}

/// Model estimates arrive as arbitrary JSON numbers
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeywordRow {
    keyword: String,
    #[serde(default)]
    search_volume: Option<f64>,
    #[serde(default)]
    difficulty: Option<f64>,
    #[serde(default)]
    intent: Option<String>,
}

impl From<KeywordRow> for KeywordInsight {
    fn from(row: KeywordRow) -> Self {
        let usable = |n: f64| n.is_finite() && n >= 0.0;
        KeywordInsight {
            keyword: row.keyword,
            search_volume: row
                .search_volume
                .filter(|n| usable(*n))
                .map(|n| n.round().min(u32::MAX as f64) as u32),
            difficulty: row
                .difficulty
                .filter(|n| usable(*n))
                .map(|n| n.round().min(100.0) as u8),
            intent: row.intent,
            present_on_page: false,
        }
    }
}

/// Decodes keyword rows one at a time, dropping rows that do not fit
pub fn keyword_insights(rows: Vec<serde_json::Value>) -> Vec<KeywordInsight> {
    rows.into_iter()
        .filter_map(|row| match serde_json::from_value::<KeywordRow>(row) {
            Ok(row) => Some(row.into()),
            Err(e) => {
                tracing::debug!(error = %e, "Skipping malformed keyword row");
                None
            }
        })
        .collect()
}

impl OpenAiClient {
    pub fn new(settings: OpenAiSettings) -> Result<Self, FetchError> {
        let rate_limiter = settings
            .requests_per_second
            .and_then(NonZeroU32::new)
            .map(|rps| RateLimiter::direct(Quota::per_second(rps)));

        Ok(Self {
            client: build_api_client(settings.timeout)?,
            settings,
            rate_limiter,
        })
    }

    fn model(&self, tier: AiModelTier) -> (&str, ModelPricing) {
        match tier {
            AiModelTier::Standard => (
                self.settings.standard_model.as_str(),
                self.settings.standard_pricing,
            ),
            AiModelTier::Premium => (
                self.settings.premium_model.as_str(),
                self.settings.premium_pricing,
            ),
        }
    }

    /// Runs one JSON-mode chat completion and decodes the message content as `T`
    async fn complete_json<T: DeserializeOwned>(
        &self,
        tier: AiModelTier,
        system: &str,
        user: String,
    ) -> Result<AiOutcome<T>, FetchError> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .ok_or(FetchError::NotConfigured("OpenAI API key"))?;
        let (model, pricing) = self.model(tier);

        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }

        let body = json!({
            "model": model,
            "temperature": 0.2,
            "response_format": {"type": "json_object"},
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
        });

        let url = format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::InvalidResponse(format!(
                "OpenAI responded with HTTP {}",
                status.as_u16()
            )));
        }

        let chat: ChatResponse = response.json().await?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| FetchError::InvalidResponse("empty completion".to_string()))?;
        let value: T = serde_json::from_str(&content)?;

        let tokens = chat.usage.unwrap_or_default();
        let usage = AiUsage {
            tokens: tokens.prompt_tokens + tokens.completion_tokens,
            cost_usd: tokens.prompt_tokens as f64 / 1000.0 * pricing.input_per_1k
                + tokens.completion_tokens as f64 / 1000.0 * pricing.output_per_1k,
        };
        tracing::debug!(model, tokens = usage.tokens, cost_usd = usage.cost_usd, "OpenAI call finished");

        Ok(AiOutcome { value, usage })
    }
}

const SUMMARY_PROMPT: &str = "You are a website auditor. Given JSON facts about a page's SEO, \
content and security, reply with a JSON object with keys \"summary\" (string), \"strengths\", \
\"improvements\" and \"priorityActions\" (arrays of short strings). Be concrete.";

const VISIBILITY_PROMPT: &str = "Answer each user query the way a helpful assistant would. \
Reply with a JSON object {\"answers\": [{\"query\": string, \"answer\": string, \
\"recommendedSites\": [domain, ...]}]} with one entry per query.";

const KEYWORD_PROMPT: &str = "You are an SEO keyword researcher. For each keyword, estimate \
monthly search volume, difficulty (0-100) and search intent (informational, navigational, \
commercial or transactional). Reply with a JSON object {\"keywords\": [{\"keyword\": string, \
\"searchVolume\": number, \"difficulty\": number, \"intent\": string}]}.";

#[async_trait]
impl AiSummarizer for OpenAiClient {
    async fn summarize(
        &self,
        facts: &SummaryFacts,
        tier: AiModelTier,
    ) -> Result<AiOutcome<AiSummary>, FetchError> {
        let user = serde_json::to_string(facts)?;
        self.complete_json(tier, SUMMARY_PROMPT, user).await
    }
}

#[async_trait]
impl AiVisibilityProbe for OpenAiClient {
    async fn probe(
        &self,
        domain: &str,
        keywords: &[String],
    ) -> Result<AiOutcome<AiVisibility>, FetchError> {
        let queries = visibility_queries(domain, keywords);
        let user = serde_json::to_string(&json!({ "queries": queries }))?;
        let outcome: AiOutcome<VisibilityAnswers> = self
            .complete_json(AiModelTier::Standard, VISIBILITY_PROMPT, user)
            .await?;

        let mentioned_in = outcome
            .value
            .answers
            .iter()
            .filter(|a| mentions_domain(domain, &a.answer, &a.recommended_sites))
            .count();
        Ok(AiOutcome {
            value: visibility_from_counts(domain, mentioned_in, queries.len()),
            usage: outcome.usage,
        })
    }
}

#[async_trait]
impl KeywordResearcher for OpenAiClient {
    async fn research(
        &self,
        domain: &str,
        keywords: &[String],
        tier: AiModelTier,
    ) -> Result<AiOutcome<Vec<KeywordInsight>>, FetchError> {
        let user = serde_json::to_string(&json!({ "domain": domain, "keywords": keywords }))?;
        let outcome: AiOutcome<KeywordRows> =
            self.complete_json(tier, KEYWORD_PROMPT, user).await?;
        Ok(AiOutcome {
            value: keyword_insights(outcome.value.keywords),
            usage: outcome.usage,
        })
    }
}

/// Questions a user might ask an assistant where the domain should come up
pub fn visibility_queries(domain: &str, keywords: &[String]) -> Vec<String> {
    if keywords.is_empty() {
        return vec![format!("What is {} and what do they offer?", domain)];
    }
    keywords
        .iter()
        .take(MAX_VISIBILITY_QUERIES)
        .map(|k| format!("Which websites would you recommend for {}?", k))
        .collect()
}

/// True when the answer text or site list names the domain or its brand label
pub fn mentions_domain(domain: &str, answer: &str, sites: &[String]) -> bool {
    let domain = domain.to_lowercase();
    let brand = domain.split('.').next().unwrap_or(domain.as_str());
    let answer = answer.to_lowercase();
    let in_sites = sites.iter().any(|s| s.to_lowercase().contains(&domain));
    in_sites || answer.contains(&domain) || (brand.len() >= 4 && answer.contains(brand))
}

pub fn visibility_from_counts(domain: &str, mentioned_in: usize, queries: usize) -> AiVisibility {
    let score = if queries == 0 {
        0
    } else {
        ((mentioned_in * 100 + queries / 2) / queries).min(100) as u8
    };
    AiVisibility {
        domain: domain.to_string(),
        score,
        mentioned_in,
        queries_tested: queries,
        checked_at: Utc::now(),
    }
}
