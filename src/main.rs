use anyhow::Result;
use clap::Parser;
use colored::*;
use sitelens::cli::Cli;
use sitelens::{load_settings, run};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let settings = match load_settings(&args) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".bright_red().bold(), e);
            std::process::exit(1);
        }
    };
    init_logging(settings.verbose);

    if let Err(e) = run(args, settings).await {
        eprintln!("{} {:#}", "Error:".bright_red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("sitelens=debug")
        } else {
            EnvFilter::new("sitelens=info")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
