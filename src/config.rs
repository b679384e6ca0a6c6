use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ai::{ModelPricing, OpenAiSettings};
use crate::analyzer::AnalyzerSettings;
use crate::cli::Cli;
use crate::pagespeed::DEFAULT_PAGESPEED_ENDPOINT;
use crate::policy::{DEFAULT_PREMIUM_PLANS, TierLimits, TierPolicy};
use crate::retry::RetryPolicy;

pub const DEFAULT_USER: &str = "local";

/// Configuration file structure
/// All fields are optional to allow partial configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Output format: text or json
    pub output: Option<String>,

    /// Save report to file
    pub save: Option<String>,

    /// SQLite database path
    pub db: Option<String>,

    /// Default user id
    pub user: Option<String>,

    /// Verbose output
    pub verbose: Option<bool>,

    /// Wall-clock limit for one analysis, in milliseconds
    pub deadline_ms: Option<u64>,

    /// Part of the deadline reserved for persisting the report
    pub persistence_margin_ms: Option<u64>,

    /// Timeout for a single outbound HTTP request, in seconds
    pub http_timeout_secs: Option<u64>,

    /// Users treated as premium regardless of subscription
    pub premium_user_ids: Option<Vec<String>>,

    /// Subscription plans that grant premium
    pub premium_plans: Option<Vec<String>>,

    pub free_max_competitors: Option<usize>,
    pub premium_max_competitors: Option<usize>,
    pub free_monthly_analyses: Option<u32>,
    pub premium_monthly_analyses: Option<u32>,

    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub openai_model: Option<String>,
    pub openai_premium_model: Option<String>,
    pub openai_pricing: Option<ModelPricing>,
    pub openai_premium_pricing: Option<ModelPricing>,

    /// Outbound AI requests per second, 0 disables the limiter
    pub ai_requests_per_second: Option<u32>,

    pub pagespeed_api_key: Option<String>,
    pub pagespeed_endpoint: Option<String>,

    /// Retry policy for the PageSpeed follow-up patch
    pub retry: Option<RetryPolicy>,
}

/// Fully resolved runtime settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub output: String,
    pub save: Option<String>,
    pub db_path: PathBuf,
    pub user_id: String,
    pub verbose: bool,
    pub http_timeout: Duration,
    pub analyzer: AnalyzerSettings,
    pub policy: TierPolicy,
    pub openai: OpenAiSettings,
    pub pagespeed_api_key: Option<String>,
    pub pagespeed_endpoint: String,
}

/// Configuration file format based on file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
    Yaml,
}

impl ConfigFormat {
    /// Detect format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_lowercase().as_str() {
                "json" => Some(ConfigFormat::Json),
                "toml" => Some(ConfigFormat::Toml),
                "yaml" | "yml" => Some(ConfigFormat::Yaml),
                _ => None,
            })
    }

    /// Get file extensions for this format
    pub fn extensions(&self) -> &[&str] {
        match self {
            ConfigFormat::Json => &["json"],
            ConfigFormat::Toml => &["toml"],
            ConfigFormat::Yaml => &["yaml", "yml"],
        }
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let format = ConfigFormat::from_path(path)
            .with_context(|| format!("Unsupported config file format: {}", path.display()))?;

        let config = match format {
            ConfigFormat::Json => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?,
            ConfigFormat::Toml => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display()))?,
            ConfigFormat::Yaml => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?,
        };

        Ok(config)
    }

    /// Get the default configuration file paths to check (in order of priority)
    /// Returns paths in order: current directory, user config directory
    pub fn default_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        for format in &[ConfigFormat::Json, ConfigFormat::Toml, ConfigFormat::Yaml] {
            for ext in format.extensions() {
                paths.push(PathBuf::from(format!("sitelens.{}", ext)));
            }
        }

        // Use XDG_CONFIG_HOME if set, otherwise fall back to ~/.config
        let config_home = std::env::var("XDG_CONFIG_HOME")
            .ok()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")));

        if let Some(config_home) = config_home {
            let config_dir = config_home.join("sitelens");
            for format in &[ConfigFormat::Json, ConfigFormat::Toml, ConfigFormat::Yaml] {
                for ext in format.extensions() {
                    paths.push(config_dir.join(format!("config.{}", ext)));
                }
            }
        }

        paths
    }

    /// Try to load configuration from default paths
    /// Returns the first configuration file found, or None if no config exists
    pub fn from_default_paths() -> Result<Option<Self>> {
        for path in Self::default_paths() {
            if path.exists() {
                tracing::debug!(path = %path.display(), "Loading config file");
                return Ok(Some(Self::from_file(&path)?));
            }
        }
        Ok(None)
    }

    /// Loads the file named by `--config`, or the first default path found
    pub fn load(cli: &Cli) -> Result<Self> {
        match &cli.config {
            Some(path) => Self::from_file(Path::new(path)),
            None => Ok(Self::from_default_paths()?.unwrap_or_default()),
        }
    }

    /// Merge this configuration with CLI arguments
    /// CLI arguments take precedence over config file values; API keys fall
    /// back to `OPENAI_API_KEY` and `PAGESPEED_API_KEY`
    pub fn merge_with_cli(&self, cli: &Cli) -> Settings {
        let analyzer_defaults = AnalyzerSettings::default();
        let openai_defaults = OpenAiSettings::default();
        let free_defaults = TierLimits::free();
        let premium_defaults = TierLimits::premium();

        let http_timeout = Duration::from_secs(self.http_timeout_secs.unwrap_or(30));

        let analyzer = AnalyzerSettings {
            deadline: self
                .deadline_ms
                .map(Duration::from_millis)
                .unwrap_or(analyzer_defaults.deadline),
            persistence_margin: self
                .persistence_margin_ms
                .map(Duration::from_millis)
                .unwrap_or(analyzer_defaults.persistence_margin),
            retry: self.retry.unwrap_or(analyzer_defaults.retry),
        };

        let free = TierLimits {
            max_competitors: self
                .free_max_competitors
                .unwrap_or(free_defaults.max_competitors),
            monthly_analyses: self
                .free_monthly_analyses
                .unwrap_or(free_defaults.monthly_analyses),
            ..free_defaults
        };
        let premium = TierLimits {
            max_competitors: self
                .premium_max_competitors
                .unwrap_or(premium_defaults.max_competitors),
            monthly_analyses: self
                .premium_monthly_analyses
                .unwrap_or(premium_defaults.monthly_analyses),
            ..premium_defaults
        };
        let policy = TierPolicy::new(
            self.premium_user_ids.clone().unwrap_or_default(),
            self.premium_plans.clone().unwrap_or_else(|| {
                DEFAULT_PREMIUM_PLANS.iter().map(|p| p.to_string()).collect()
            }),
        )
        .with_limits(free, premium);

        let openai = OpenAiSettings {
            api_key: self
                .openai_api_key
                .clone()
                .or_else(|| env_non_empty("OPENAI_API_KEY")),
            base_url: self
                .openai_base_url
                .clone()
                .unwrap_or(openai_defaults.base_url),
            standard_model: self
                .openai_model
                .clone()
                .unwrap_or(openai_defaults.standard_model),
            premium_model: self
                .openai_premium_model
                .clone()
                .unwrap_or(openai_defaults.premium_model),
            standard_pricing: self
                .openai_pricing
                .unwrap_or(openai_defaults.standard_pricing),
            premium_pricing: self
                .openai_premium_pricing
                .unwrap_or(openai_defaults.premium_pricing),
            requests_per_second: self
                .ai_requests_per_second
                .or(openai_defaults.requests_per_second),
            timeout: openai_defaults.timeout.max(http_timeout),
        };

        let db_path = cli
            .db
            .clone()
            .or_else(|| self.db.clone())
            .map(PathBuf::from)
            .unwrap_or_else(default_db_path);

        Settings {
            output: if cli.output != "text" {
                cli.output.clone()
            } else {
                self.output.clone().unwrap_or_else(|| cli.output.clone())
            },
            save: cli.save.clone().or_else(|| self.save.clone()),
            db_path,
            user_id: cli
                .user
                .clone()
                .or_else(|| self.user.clone())
                .unwrap_or_else(|| DEFAULT_USER.to_string()),
            verbose: cli.verbose || self.verbose.unwrap_or(false),
            http_timeout,
            analyzer,
            policy,
            openai,
            pagespeed_api_key: self
                .pagespeed_api_key
                .clone()
                .or_else(|| env_non_empty("PAGESPEED_API_KEY")),
            pagespeed_endpoint: self
                .pagespeed_endpoint
                .clone()
                .unwrap_or_else(|| DEFAULT_PAGESPEED_ENDPOINT.to_string()),
        }
    }
}

/// `$XDG_DATA_HOME/sitelens/sitelens.db`, or `sitelens.db` in the working directory
pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("sitelens").join("sitelens.db"))
        .unwrap_or_else(|| PathBuf::from("sitelens.db"))
}
