use crate::models::{Issue, IssueSeverity, IssueType, OpenGraphTags, PageSnapshot, SeoReport};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};

// Selectors parsed once
static TITLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("title").expect("title selector should be valid"));
static META_DESC_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("meta[name='description']").expect("meta description selector should be valid")
});
static H1_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h1").expect("h1 selector should be valid"));
static IMG_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("img").expect("img selector should be valid"));
static CANONICAL_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("link[rel='canonical']").expect("canonical selector should be valid")
});
static VIEWPORT_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("meta[name='viewport']").expect("viewport selector should be valid")
});
static HTML_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("html").expect("html selector should be valid"));
static OG_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("meta[property^='og:']").expect("og selector should be valid")
});

const TITLE_MIN: usize = 30;
const TITLE_MAX: usize = 60;
const META_DESC_MIN: usize = 120;
const META_DESC_MAX: usize = 160;

pub struct SeoAnalyzer;

impl SeoAnalyzer {
    pub fn analyze(snapshot: &PageSnapshot, document: &Html) -> SeoReport {
        let title = Self::extract_title(document);
        let meta_description = Self::extract_meta_description(document);
        let h1_tags = Self::extract_h1_tags(document);
        let canonical = document
            .select(&CANONICAL_SELECTOR)
            .next()
            .and_then(|el| el.value().attr("href"))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let has_viewport = document.select(&VIEWPORT_SELECTOR).next().is_some();
        let lang = document
            .select(&HTML_SELECTOR)
            .next()
            .and_then(|el| el.value().attr("lang"))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let open_graph = Self::extract_open_graph(document);
        let missing_alt = document
            .select(&IMG_SELECTOR)
            .filter(|img| img.value().attr("alt").is_none())
            .count();

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

        // Check for missing or badly sized title
        match title.as_deref() {
            None | Some("") => flag(
                IssueSeverity::Error,
                IssueType::MissingTitle,
                "Page is missing a title tag".to_string(),
                20,
            ),
            Some(t) => {
                let len = t.chars().count();
                if len < TITLE_MIN {
                    flag(
                        IssueSeverity::Warning,
                        IssueType::TitleTooShort,
                        format!(
                            "Title is too short ({} chars, recommended: {}-{})",
                            len, TITLE_MIN, TITLE_MAX
                        ),
                        5,
                    );
                } else if len > TITLE_MAX {
                    flag(
                        IssueSeverity::Warning,
                        IssueType::TitleTooLong,
                        format!(
                            "Title is too long ({} chars, recommended: {}-{})",
                            len, TITLE_MIN, TITLE_MAX
                        ),
                        5,
                    );
                }
            }
        }

        // Check for missing or badly sized meta description
        match meta_description.as_deref() {
            None | Some("") => flag(
                IssueSeverity::Error,
                IssueType::MissingMetaDescription,
                "Page is missing a meta description".to_string(),
                15,
            ),
            Some(desc) => {
                let len = desc.chars().count();
                if len < META_DESC_MIN {
                    flag(
                        IssueSeverity::Warning,
                        IssueType::MetaDescriptionTooShort,
                        format!(
                            "Meta description is too short ({} chars, recommended: {}-{})",
                            len, META_DESC_MIN, META_DESC_MAX
                        ),
                        5,
                    );
                } else if len > META_DESC_MAX {
                    flag(
                        IssueSeverity::Warning,
                        IssueType::MetaDescriptionTooLong,
                        format!(
                            "Meta description is too long ({} chars, recommended: {}-{})",
                            len, META_DESC_MIN, META_DESC_MAX
                        ),
                        5,
                    );
                }
            }
        }

        // Check H1 tags
        if h1_tags.is_empty() {
            flag(
                IssueSeverity::Warning,
                IssueType::MissingH1,
                "Page is missing an H1 tag".to_string(),
                10,
            );
        } else if h1_tags.len() > 1 {
            flag(
                IssueSeverity::Warning,
                IssueType::MultipleH1,
                format!("Page has multiple H1 tags ({})", h1_tags.len()),
                5,
            );
        }

        if missing_alt > 0 {
            flag(
                IssueSeverity::Warning,
                IssueType::MissingImageAlt,
                format!("{} image(s) missing alt text", missing_alt),
                5,
            );
        }

        if canonical.is_none() {
            flag(
                IssueSeverity::Warning,
                IssueType::MissingCanonical,
                "Page has no canonical link".to_string(),
                5,
            );
        }

        if !has_viewport {
            flag(
                IssueSeverity::Warning,
                IssueType::MissingViewport,
                "Page has no viewport meta tag".to_string(),
                5,
            );
        }

        if lang.is_none() {
            flag(
                IssueSeverity::Info,
                IssueType::MissingLang,
                "The <html> element has no lang attribute".to_string(),
                3,
            );
        }

        if !(200..300).contains(&snapshot.status_code) {
            flag(
                IssueSeverity::Error,
                IssueType::BadStatus,
                format!("Page responded with HTTP {}", snapshot.status_code),
                20,
            );
        }

        if open_graph.og_title.is_none() || open_graph.og_description.is_none() {
            flag(
                IssueSeverity::Info,
                IssueType::MissingOpenGraph,
                "Open Graph title or description is missing".to_string(),
                0,
            );
        }

        SeoReport {
            score,
            status_code: snapshot.status_code,
            load_time_ms: snapshot.load_time_ms,
            title,
            meta_description,
            h1_tags,
            canonical,
            has_viewport,
            lang,
            open_graph,
            issues,
        }
    }

    fn extract_title(document: &Html) -> Option<String> {
        document
            .select(&TITLE_SELECTOR)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
    }

    fn extract_meta_description(document: &Html) -> Option<String> {
        document
            .select(&META_DESC_SELECTOR)
            .next()
            .and_then(|el| el.value().attr("content"))
            .map(|s| s.trim().to_string())
    }

    fn extract_h1_tags(document: &Html) -> Vec<String> {
        document
            .select(&H1_SELECTOR)
            .map(|el| el.text().collect::<String>().trim().to_string())
            .collect()
    }

    fn extract_open_graph(document: &Html) -> OpenGraphTags {
        let mut tags = OpenGraphTags::default();
        for element in document.select(&OG_SELECTOR) {
            let (Some(property), Some(content)) =
                (element.value().attr("property"), element.value().attr("content"))
            else {
                continue;
            };
            let content = Some(content.trim().to_string());
            match property {
                "og:title" => tags.og_title = content,
                "og:description" => tags.og_description = content,
                "og:image" => tags.og_image = content,
                "og:url" => tags.og_url = content,
                "og:type" => tags.og_type = content,
                _ => {}
            }
        }
        tags
    }
}
