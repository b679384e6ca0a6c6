use crate::models::{ContentReport, Issue, IssueSeverity, IssueType, KeywordPresence};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use url::Url;

static HEADING_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("h2, h3, h4").expect("heading selector should be valid")
});
static PARAGRAPH_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("p").expect("p selector should be valid"));
static IMG_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("img").expect("img selector should be valid"));
static ANCHOR_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("a[href] selector should be valid"));

const THIN_CONTENT_WORDS: usize = 300;
const SHORT_CONTENT_WORDS: usize = 600;
const KEYWORD_WEIGHT: usize = 30;

/// Elements whose text is never shown to a reader
const HIDDEN_ELEMENTS: &[&str] = &["head", "script", "style", "noscript", "template"];

pub struct ContentAnalyzer;

impl ContentAnalyzer {
    pub fn analyze(document: &Html, page_url: &Url, keywords: &[String]) -> ContentReport {
        let text = Self::visible_text(document);
        let word_count = text
            .split_whitespace()
            .filter(|w| w.chars().any(char::is_alphanumeric))
            .count();
        let heading_count = document.select(&HEADING_SELECTOR).count();
        let paragraph_count = document.select(&PARAGRAPH_SELECTOR).count();
        let image_count = document.select(&IMG_SELECTOR).count();
        let images_missing_alt = document
            .select(&IMG_SELECTOR)
            .filter(|img| img.value().attr("alt").is_none_or(|alt| alt.trim().is_empty()))
            .count();
        let (internal_links, external_links) = Self::count_links(document, page_url);
        let keyword_coverage = Self::keyword_coverage(&text, keywords);

        let mut score: u8 = 100;
        let mut issues = Vec::new();
        let mut flag = |severity, issue_type, message: String, deduction: u8| {
            score = score.saturating_sub(deduction);
            issues.push(Issue {
                severity,
                issue_type,
                message,
            });
        };

        if word_count < THIN_CONTENT_WORDS {
            flag(
                IssueSeverity::Warning,
                IssueType::ThinContent,
                format!(
                    "Page has thin content ({} words, recommended: {}+)",
                    word_count, SHORT_CONTENT_WORDS
                ),
                25,
            );
        } else if word_count < SHORT_CONTENT_WORDS {
            flag(
                IssueSeverity::Info,
                IssueType::ShortContent,
                format!(
                    "Page content is short ({} words, recommended: {}+)",
                    word_count, SHORT_CONTENT_WORDS
                ),
                10,
            );
        }

        if heading_count == 0 {
            flag(
                IssueSeverity::Warning,
                IssueType::MissingSubheadings,
                "Page has no subheadings (h2-h4)".to_string(),
                10,
            );
        }

        if paragraph_count == 0 {
            flag(
                IssueSeverity::Warning,
                IssueType::MissingParagraphs,
                "Page has no paragraphs".to_string(),
                10,
            );
        }

        if image_count == 0 {
            flag(
                IssueSeverity::Info,
                IssueType::NoImages,
                "Page has no images".to_string(),
                5,
            );
        }

        if internal_links == 0 {
            flag(
                IssueSeverity::Warning,
                IssueType::NoInternalLinks,
                "Page has no internal links".to_string(),
                10,
            );
        }

        let missing: Vec<&str> = keyword_coverage
            .iter()
            .filter(|k| k.occurrences == 0)
            .map(|k| k.keyword.as_str())
            .collect();
        if !missing.is_empty() {
            let total = keyword_coverage.len();
            let deduction = (missing.len() * KEYWORD_WEIGHT + total / 2) / total;
            flag(
                IssueSeverity::Warning,
                IssueType::MissingKeywords,
                format!("Keywords not found on page: {}", missing.join(", ")),
                deduction as u8,
            );
        }

        ContentReport {
            score,
            word_count,
            heading_count,
            paragraph_count,
            image_count,
            images_missing_alt,
            internal_links,
            external_links,
            keyword_coverage,
            issues,
        }
    }

    /// Text of the document outside head/script/style, whitespace collapsed
    pub fn visible_text(document: &Html) -> String {
        let mut parts = Vec::new();
        for node in document.tree.root().descendants() {
            let Some(text) = node.value().as_text() else {
                continue;
            };
            let hidden = node.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .is_some_and(|el| HIDDEN_ELEMENTS.contains(&el.name()))
            });
            if !hidden {
                parts.extend(text.split_whitespace());
            }
        }
        parts.join(" ")
    }

    fn count_links(document: &Html, page_url: &Url) -> (usize, usize) {
        let mut internal = 0;
        let mut external = 0;
        for element in document.select(&ANCHOR_SELECTOR) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            let Ok(absolute) = page_url.join(href) else {
                continue;
            };
            if !matches!(absolute.scheme(), "http" | "https") {
                continue;
            }
            if absolute.host_str() == page_url.host_str() {
                internal += 1;
            } else {
                external += 1;
            }
        }
        (internal, external)
    }

    fn keyword_coverage(text: &str, keywords: &[String]) -> Vec<KeywordPresence> {
        let haystack = text.to_lowercase();
        keywords
            .iter()
            .map(|keyword| {
                let needle = keyword
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" ")
                    .to_lowercase();
                let occurrences = if needle.is_empty() {
                    0
                } else {
                    haystack.matches(needle.as_str()).count()
                };
                KeywordPresence {
                    keyword: keyword.clone(),
                    occurrences,
                }
            })
            .collect()
    }
}
