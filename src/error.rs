use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced to the caller of an analysis.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("At least one keyword is required")]
    NoKeywords,

    #[error("Monthly analysis quota reached ({used}/{limit})")]
    QuotaExceeded { used: u32, limit: u32 },

    #[error("Failed to fetch {url}: {source}")]
    ScrapeFailed {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("Security scan of {domain} failed: {source}")]
    SecurityScanFailed {
        domain: String,
        #[source]
        source: FetchError,
    },

    #[error(
        "Analysis did not finish within {budget_ms} ms; try again with fewer competitors or keywords"
    )]
    DeadlineExceeded { budget_ms: u64 },

    #[error("Analysis {0} not found")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AnalysisError {
    /// Stable machine-readable code for the error
    pub fn code(&self) -> &'static str {
        match self {
            AnalysisError::InvalidUrl { .. } => "INVALID_URL",
            AnalysisError::NoKeywords => "NO_KEYWORDS",
            AnalysisError::QuotaExceeded { .. } => "QUOTA_EXCEEDED",
            AnalysisError::ScrapeFailed { .. } => "SCRAPE_FAILED",
            AnalysisError::SecurityScanFailed { .. } => "SECURITY_SCAN_FAILED",
            AnalysisError::DeadlineExceeded { .. } => "DEADLINE_EXCEEDED",
            AnalysisError::NotFound(_) => "NOT_FOUND",
            AnalysisError::Store(_) => "STORE_ERROR",
            AnalysisError::Config(_) => "CONFIG_ERROR",
        }
    }

    /// True for errors raised before any fetcher ran
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AnalysisError::InvalidUrl { .. }
                | AnalysisError::NoKeywords
                | AnalysisError::QuotaExceeded { .. }
        )
    }

    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            error: self.to_string(),
            code: Some(self.code().to_string()),
        }
    }
}

/// Serialized error shape returned at the aggregator boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Failure of a single fetcher call.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("{0} is not configured")]
    NotConfigured(&'static str),
}

/// Failure of the persistence store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database file creation error: {0}")]
    FileCreation(String),

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Analysis {0} is not visible yet")]
    NotVisible(String),
}
