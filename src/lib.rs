pub mod ai;
pub mod analyzer;
pub mod cache;
pub mod cli;
pub mod competitor;
pub mod config;
pub mod content_analyzer;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod models;
pub mod page_fetcher;
pub mod pagespeed;
pub mod policy;
pub mod reporter;
pub mod retry;
pub mod scoring;
pub mod security;
pub mod seo_analyzer;
pub mod sqlite_store;
pub mod store;

use ai::{OpenAiClient, OpenAiSettings};
use analyzer::{Analyzer, Fetchers};
use anyhow::{Context, Result};
use cli::{Cli, Commands};
use colored::*;
use config::{Config, Settings};
use error::AnalysisError;
use indicatif::{ProgressBar, ProgressStyle};
use models::{AnalysisOptions, AnalysisRequest, CompositeReport};
use page_fetcher::HttpPageFetcher;
use pagespeed::PageSpeedClient;
use reporter::Reporter;
use security::HeaderSecurityScanner;
use sqlite_store::SqliteStore;
use std::sync::Arc;
use std::time::Duration;

/// Builds the live reqwest-backed fetchers
pub fn live_fetchers(
    http_timeout: Duration,
    openai: OpenAiSettings,
    pagespeed_api_key: Option<String>,
    pagespeed_endpoint: &str,
) -> Result<Fetchers> {
    let ai = Arc::new(OpenAiClient::new(openai).context("Failed to build OpenAI client")?);
    Ok(Fetchers {
        pages: Arc::new(
            HttpPageFetcher::new(http_timeout).context("Failed to build HTTP client")?,
        ),
        security: Arc::new(
            HeaderSecurityScanner::new(http_timeout).context("Failed to build HTTP client")?,
        ),
        page_speed: Arc::new(
            PageSpeedClient::new(http_timeout.max(Duration::from_secs(60)), pagespeed_api_key)
                .context("Failed to build PageSpeed client")?
                .with_endpoint(pagespeed_endpoint),
        ),
        summarizer: ai.clone(),
        visibility: ai.clone(),
        keywords: ai,
    })
}

async fn build_analyzer(settings: &Settings) -> Result<Analyzer> {
    if let Some(parent) = settings.db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let store = SqliteStore::open(&settings.db_path)
        .await
        .with_context(|| format!("Failed to open database: {}", settings.db_path.display()))?;

    let fetchers = live_fetchers(
        settings.http_timeout,
        settings.openai.clone(),
        settings.pagespeed_api_key.clone(),
        &settings.pagespeed_endpoint,
    )?;

    Ok(Analyzer::new(
        fetchers,
        Arc::new(store),
        settings.policy.clone(),
        settings.analyzer,
    )?)
}

fn spinner(enabled: bool, message: String) -> Option<ProgressBar> {
    if !enabled {
        return None;
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    Some(pb)
}

/// Resolves settings from the config file layered under the CLI flags
pub fn load_settings(args: &Cli) -> Result<Settings> {
    Ok(Config::load(args)?.merge_with_cli(args))
}

pub async fn run(args: Cli, settings: Settings) -> Result<()> {
    let text_output = settings.output != "json";

    if text_output {
        println!(
            "{}",
            "Sitelens - Website Analyzer".bright_cyan().bold()
        );
        println!("{}", "=".repeat(50).bright_blue());
        println!();
    }

    let analyzer = build_analyzer(&settings).await?;

    let (progress, outcome) = match args.command {
        Commands::Analyze {
            url,
            competitors,
            keywords,
            no_ai,
            premium_ai,
            skip_pagespeed,
            quick_security,
        } => {
            if text_output {
                println!("{} {}", "Analyzing:".bright_white().bold(), url);
                println!("{} {}", "Keywords:".bright_white().bold(), keywords.join(", "));
                if !competitors.is_empty() {
                    println!(
                        "{} {}",
                        "Competitors:".bright_white().bold(),
                        competitors.join(", ")
                    );
                }
                println!();
            }
            let request = AnalysisRequest {
                target_url: url,
                competitor_urls: competitors,
                keywords,
                options: AnalysisOptions {
                    include_ai: !no_ai,
                    use_premium_ai: premium_ai,
                    skip_page_speed: skip_pagespeed,
                    quick_security_scan: quick_security,
                },
            };
            let progress = spinner(text_output, "Running analysis...".to_string());
            let outcome = analyzer.analyze(&settings.user_id, request).await;
            (progress, outcome)
        }
        Commands::Pagespeed { id } => {
            let progress = spinner(text_output, format!("Fetching PageSpeed for {}...", id));
            let outcome = analyzer.refresh_page_speed(&settings.user_id, &id).await;
            (progress, outcome)
        }
    };

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    let report = match outcome {
        Ok(report) => report,
        Err(e) => return Err(report_error(e, text_output)),
    };

    output_report(&report, &settings)
}

fn report_error(error: AnalysisError, text_output: bool) -> anyhow::Error {
    if !text_output
        && let Ok(body) = serde_json::to_string_pretty(&error.to_body())
    {
        println!("{}", body);
    }
    tracing::debug!(code = error.code(), "Analysis failed");
    anyhow::Error::new(error)
}

fn output_report(report: &CompositeReport, settings: &Settings) -> Result<()> {
    match settings.output.as_str() {
        "json" => {
            let json = serde_json::to_string_pretty(report)?;
            println!("{}", json);
        }
        _ => {
            Reporter::print_text_report(report);
        }
    }

    if let Some(filename) = &settings.save {
        Reporter::save_json_report(report, filename)?;
    }

    Ok(())
}
