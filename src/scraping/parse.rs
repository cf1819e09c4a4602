//! Static HTML pipeline: outbound link extraction and indexable-content
//! extraction over a parsed document.

use std::collections::HashSet;

use ego_tree::NodeRef;
use scraper::node::Node;
use scraper::{Html, Selector};
use url::Url;
use whatlang::{detect, Lang};

use crate::core::types::StaticExtract;
use crate::core::urls::{is_valid, normalize};

/// Elements whose text is never user-visible content.
const STRIP_TAGS: &[&str] = &[
    "script", "style", "noscript", "meta", "link", "header", "footer", "nav",
];

/// Language detection looks at the first 500 characters, and only when the
/// page has more than 100 characters of text.
const LANG_SAMPLE_CHARS: usize = 500;
const LANG_MIN_TEXT_CHARS: usize = 100;

/// Collect every anchor href, resolve it against `base`, filter and
/// canonicalize, and return the deduplicated set.
pub fn extract_links(html: &str, base: &str) -> Vec<String> {
    let Ok(base_url) = Url::parse(base) else {
        return Vec::new();
    };
    let document = Html::parse_document(html);
    let selector = Selector::parse("a[href]").expect("anchor selector is valid");

    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        if href.is_empty()
            || href.starts_with('#')
            || href.starts_with("javascript:")
            || href.starts_with("mailto:")
            || href.starts_with("tel:")
        {
            continue;
        }

        let Ok(absolute) = base_url.join(href) else {
            continue;
        };
        let absolute = absolute.to_string();
        if !is_valid(&absolute) {
            continue;
        }

        let normalized = normalize(&absolute);
        if seen.insert(normalized.clone()) {
            links.push(normalized);
        }
    }

    links
}

/// Extract `(title, text, language, script_count)` from a document, or `None`
/// when the page should not be indexed: noindex robots meta, no title, or a
/// title that reads like an error page.
pub fn extract_content(html: &str) -> Option<StaticExtract> {
    let document = Html::parse_document(html);

    let robots_selector =
        Selector::parse(r#"meta[name="robots"]"#).expect("robots meta selector is valid");
    for meta in document.select(&robots_selector) {
        if let Some(content) = meta.value().attr("content") {
            if content.to_lowercase().contains("noindex") {
                return None;
            }
        }
    }

    let title = page_title(&document)?;
    let title_lower = title.to_lowercase();
    if title_lower.contains("404") || title_lower.contains("not found") {
        return None;
    }

    let script_selector = Selector::parse("script").expect("script selector is valid");
    let script_count = document.select(&script_selector).count();

    let text = visible_text(&document);
    let language = detect_language(&text);

    Some(StaticExtract {
        title,
        text,
        language,
        script_count,
    })
}

/// Title and visible text of a rendered document. The render fallback does
/// not re-apply the noindex/error-title gates; a page only reaches the
/// renderer after passing them statically.
pub fn extract_rendered(html: &str) -> (String, String, String) {
    let document = Html::parse_document(html);
    let title = page_title(&document).unwrap_or_else(|| "No Title".to_string());
    let text = visible_text(&document);
    let language = detect_language(&text);
    (title, text, language)
}

fn page_title(document: &Html) -> Option<String> {
    let selector = Selector::parse("title").expect("title selector is valid");
    let element = document.select(&selector).next()?;
    let title = element.text().collect::<String>().trim().to_string();
    if title.is_empty() {
        None
    } else {
        Some(title)
    }
}

/// All user-visible text, stripped of chrome and boilerplate elements,
/// joined by single spaces.
fn visible_text(document: &Html) -> String {
    let mut parts = Vec::new();
    collect_text(document.tree.root(), &mut parts);
    parts.join(" ")
}

fn collect_text(node: NodeRef<'_, Node>, parts: &mut Vec<String>) {
    for child in node.children() {
        match child.value() {
            Node::Text(text) => {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    parts.push(trimmed.to_string());
                }
            }
            Node::Element(element) => {
                if !STRIP_TAGS.contains(&element.name()) {
                    collect_text(child, parts);
                }
            }
            _ => {}
        }
    }
}

/// ISO-639-1 label for the page text, `"unknown"` when the page is too short
/// to classify. whatlang's trigram classifier is deterministic, so identical
/// text always produces the identical label.
fn detect_language(text: &str) -> String {
    if text.chars().count() <= LANG_MIN_TEXT_CHARS {
        return "unknown".to_string();
    }
    let sample: String = text.chars().take(LANG_SAMPLE_CHARS).collect();
    match detect(&sample) {
        Some(info) => match info.lang() {
            Lang::Eng => "en".to_string(),
            Lang::Tur => "tr".to_string(),
            Lang::Spa => "es".to_string(),
            Lang::Fra => "fr".to_string(),
            Lang::Deu => "de".to_string(),
            Lang::Ita => "it".to_string(),
            Lang::Por => "pt".to_string(),
            Lang::Rus => "ru".to_string(),
            Lang::Jpn => "ja".to_string(),
            Lang::Kor => "ko".to_string(),
            Lang::Cmn => "zh".to_string(),
            other => format!("{other:?}").to_lowercase(),
        },
        None => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r##"
        <html><head><title>Sample</title></head>
        <body>
            <nav><a href="/nav-link">Menu</a></nav>
            <p>Visible paragraph.</p>
            <a href="/a">A</a>
            <a href="/b/">B</a>
            <a href="/a">A again</a>
            <a href="#section">anchor</a>
            <a href="javascript:void(0)">js</a>
            <a href="mailto:x@y.z">mail</a>
            <a href="/image.png">img</a>
            <script>var x = 1;</script>
        </body></html>
    "##;

    #[test]
    fn extract_links_resolves_filters_and_dedupes() {
        let links = extract_links(PAGE, "https://www.example.com/");
        assert_eq!(
            links,
            vec![
                "https://example.com/nav-link".to_string(),
                "https://example.com/a".to_string(),
                "https://example.com/b".to_string(),
            ]
        );
    }

    #[test]
    fn extract_content_counts_scripts_and_strips_chrome() {
        let html = r#"
            <html><head><title>Story</title><script>a</script></head>
            <body>
                <header>Site header</header>
                <p>First part.</p>
                <p>Second part.</p>
                <footer>footer text</footer>
                <script>b</script>
            </body></html>
        "#;
        let extract = extract_content(html).expect("indexable page");
        assert_eq!(extract.title, "Story");
        assert_eq!(extract.script_count, 2);
        // The title text node is visible content; chrome elements are not.
        assert_eq!(extract.text, "Story First part. Second part.");
    }

    #[test]
    fn noindex_pages_are_skipped() {
        let html = r#"
            <html><head><title>T</title>
            <meta name="robots" content="NOINDEX, nofollow"></head>
            <body><p>text</p></body></html>
        "#;
        assert!(extract_content(html).is_none());
    }

    #[test]
    fn untitled_and_error_pages_are_skipped() {
        assert!(extract_content("<html><body><p>no title here</p></body></html>").is_none());
        assert!(
            extract_content("<html><head><title>404</title></head><body>x</body></html>").is_none()
        );
        assert!(extract_content(
            "<html><head><title>Page Not Found</title></head><body>x</body></html>"
        )
        .is_none());
    }

    #[test]
    fn short_text_has_unknown_language() {
        let html = "<html><head><title>T</title></head><body><p>short</p></body></html>";
        let extract = extract_content(html).unwrap();
        assert_eq!(extract.language, "unknown");
    }

    #[test]
    fn long_english_text_is_detected() {
        let body = "The quick brown fox jumps over the lazy dog. ".repeat(10);
        let html =
            format!("<html><head><title>T</title></head><body><p>{body}</p></body></html>");
        let extract = extract_content(&html).unwrap();
        assert_eq!(extract.language, "en");
    }

    #[test]
    fn rendered_extraction_defaults_missing_title() {
        let (title, text, _) = extract_rendered("<html><body><p>rendered body</p></body></html>");
        assert_eq!(title, "No Title");
        assert_eq!(text, "rendered body");
    }
}
