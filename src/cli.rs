use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "sitelens")]
#[command(version, about = "Website SEO, content, security and performance analyzer", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format: text or json
    #[arg(short, long, global = true, default_value = "text")]
    pub output: String,

    /// Save the JSON report to a file
    #[arg(short, long, global = true)]
    pub save: Option<String>,

    /// Path to configuration file (JSON, TOML, or YAML)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Path to the SQLite database holding past analyses
    #[arg(long, global = true)]
    pub db: Option<String>,

    /// User the analysis is run for
    #[arg(short, long, global = true)]
    pub user: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze a website and its competitors
    Analyze {
        /// The URL to analyze (https:// is added when missing)
        #[arg(value_name = "URL")]
        url: String,

        /// Competitor URL (repeatable)
        #[arg(short, long = "competitor", value_name = "URL")]
        competitors: Vec<String>,

        /// Target keyword (repeatable, at least one required)
        #[arg(short, long = "keyword", value_name = "KEYWORD")]
        keywords: Vec<String>,

        /// Skip the AI summary, visibility probe and keyword research
        #[arg(long)]
        no_ai: bool,

        /// Use the premium AI model (premium accounts only)
        #[arg(long)]
        premium_ai: bool,

        /// Skip PageSpeed; run `sitelens pagespeed <ID>` later instead
        #[arg(long)]
        skip_pagespeed: bool,

        /// Skip the HTTP to HTTPS redirect check
        #[arg(long)]
        quick_security: bool,
    },

    /// Fetch PageSpeed for a stored analysis and update it
    Pagespeed {
        /// Id of a stored analysis
        #[arg(value_name = "ANALYSIS_ID")]
        id: String,
    },
}
