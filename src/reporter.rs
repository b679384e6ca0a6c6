use crate::models::{CompositeReport, FacetStatus, Issue, IssueSeverity};
use anyhow::{Context, Result};
use colored::*;
use serde::Serialize;
use std::fs::File;
use std::io::Write;

/// Issue counts across the SEO and content facets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub errors: usize,
    pub warnings: usize,
    pub info_count: usize,
    pub security_findings: usize,
    pub competitors: usize,
}

pub struct Reporter;

impl Reporter {
    pub fn summarize(report: &CompositeReport) -> ReportSummary {
        let mut summary = ReportSummary {
            security_findings: report.security.findings.len(),
            competitors: report.competitors.len(),
            ..Default::default()
        };
        for issue in report.seo.issues.iter().chain(&report.content.issues) {
            match issue.severity {
                IssueSeverity::Error => summary.errors += 1,
                IssueSeverity::Warning => summary.warnings += 1,
                IssueSeverity::Info => summary.info_count += 1,
            }
        }
        summary
    }

    fn score(score: u8) -> ColoredString {
        let text = score.to_string();
        match score {
            80..=100 => text.bright_green(),
            50..=79 => text.yellow(),
            _ => text.bright_red(),
        }
    }

    fn status(status: FacetStatus) -> ColoredString {
        match status {
            FacetStatus::Success => "ok".bright_green(),
            FacetStatus::Skipped => "skipped".dimmed(),
            FacetStatus::Failed => "failed".bright_red(),
            FacetStatus::TimedOut => "timed out".yellow(),
        }
    }

    fn print_issues(issues: &[Issue]) {
        for issue in issues {
            let severity_str = match issue.severity {
                IssueSeverity::Error => "ERROR".bright_red(),
                IssueSeverity::Warning => "WARN ".yellow(),
                IssueSeverity::Info => "INFO ".bright_cyan(),
            };
            println!("      [{}] {}", severity_str, issue.message);
        }
    }

    pub fn print_text_report(report: &CompositeReport) {
        let summary = Self::summarize(report);

        println!("\n{}", "=".repeat(80).bright_blue());
        println!("{}", "Sitelens - Analysis Report".bright_cyan().bold());
        println!("{}", "=".repeat(80).bright_blue());
        println!();

        println!("{}: {}", "URL".bright_white().bold(), report.target_url);
        println!("{}: {}", "Analysis ID".bright_white().bold(), report.id);
        println!(
            "{}: {}",
            "Created".bright_white().bold(),
            report.created_at.to_rfc3339()
        );
        println!();

        println!("{}", "Scores".bright_yellow().bold().underline());
        println!("  Overall:     {}", Self::score(report.overall_score).bold());
        println!("  SEO:         {}", Self::score(report.seo.score));
        println!("  Content:     {}", Self::score(report.content.score));
        println!(
            "  Security:    {} ({})",
            Self::score(report.security.score),
            report.security.grade.bright_white().bold()
        );
        match &report.page_speed {
            Some(ps) => println!("  Performance: {}", Self::score(ps.performance)),
            None => println!("  Performance: {}", "n/a".dimmed()),
        }
        println!();

        println!("{}", "Facets".bright_yellow().bold().underline());
        for (facet, status) in &report.facets {
            println!("  {:<16} {}", facet.as_str(), Self::status(*status));
        }
        println!();

        println!("{}", "Summary".bright_yellow().bold().underline());
        println!(
            "  Errors:            {}",
            if summary.errors > 0 {
                summary.errors.to_string().bright_red()
            } else {
                summary.errors.to_string().bright_green()
            }
        );
        println!(
            "  Warnings:          {}",
            if summary.warnings > 0 {
                summary.warnings.to_string().yellow()
            } else {
                summary.warnings.to_string().bright_green()
            }
        );
        println!(
            "  Info:              {}",
            summary.info_count.to_string().bright_cyan()
        );
        println!(
            "  Word count:        {}",
            report.content.word_count.to_string().bright_white()
        );
        println!();

        if !report.seo.issues.is_empty() || !report.content.issues.is_empty() {
            println!("{}", "Issues".bright_yellow().bold().underline());
            println!("    SEO:");
            Self::print_issues(&report.seo.issues);
            println!("    Content:");
            Self::print_issues(&report.content.issues);
            println!();
        }

        if !report.security.findings.is_empty() {
            println!("{}", "Security Findings".bright_yellow().bold().underline());
            for finding in &report.security.findings {
                println!(
                    "      [{}] {}",
                    format!("-{:>2}", finding.deduction).bright_red(),
                    finding.description
                );
            }
            println!();
        }

        if !report.competitors.is_empty() {
            println!("{}", "Competitors".bright_yellow().bold().underline());
            for competitor in &report.competitors {
                println!(
                    "  {} overall {} (SEO {}, content {})",
                    competitor.url.bright_white(),
                    Self::score(competitor.results.overall_score),
                    competitor.results.seo.score,
                    competitor.results.content.score
                );
            }
            println!();
        }

        if let Some(visibility) = &report.ai_visibility {
            println!("{}", "AI Visibility".bright_yellow().bold().underline());
            println!(
                "  Score {} (mentioned in {} of {} queries)",
                Self::score(visibility.score),
                visibility.mentioned_in,
                visibility.queries_tested
            );
            println!();
        }

        if let Some(rows) = &report.keyword_research {
            println!("{}", "Keywords".bright_yellow().bold().underline());
            for row in rows {
                println!(
                    "  {:<30} volume {:>8}  difficulty {:>3}  {}",
                    row.keyword,
                    row.search_volume
                        .map(|v| v.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    row.difficulty
                        .map(|d| d.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    if row.present_on_page {
                        "on page".bright_green()
                    } else {
                        "missing".bright_red()
                    }
                );
            }
            println!();
        }

        if let Some(ai) = &report.ai_summary {
            println!("{}", "AI Summary".bright_yellow().bold().underline());
            println!("  {}", ai.summary);
            for action in &ai.priority_actions {
                println!("    - {}", action);
            }
            println!();
        }

        if report.tokens_used > 0 {
            println!(
                "{} {} tokens (${:.4})",
                "AI usage:".bright_white().bold(),
                report.tokens_used,
                report.cost_usd
            );
        }

        println!("{}", "=".repeat(80).bright_blue());
    }

    pub fn save_json_report(report: &CompositeReport, filename: &str) -> Result<()> {
        let json = serde_json::to_string_pretty(report)?;
        let mut file = File::create(filename)
            .with_context(|| format!("Failed to create report file: {}", filename))?;
        file.write_all(json.as_bytes())?;
        println!("Report saved to: {}", filename.bright_green());
        Ok(())
    }
}
