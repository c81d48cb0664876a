//! HTML parser for extracting links and text
//!
//! This module handles parsing HTML content to extract:
//! - Outbound links to follow (from `<a href>` tags), optionally filtered
//! - Links keyed by their accessible label (used for legal version navigation)
//! - The document text that gate detection and fingerprinting work on
//!
//! `scraper::Html` is not `Send`, so every function here is synchronous and
//! callers must drop the parsed document before the next `.await`.

use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;
use url::Url;

/// Links of a subtree keyed by their accessible label
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabeledLinks {
    /// Label → href; a later anchor with the same label replaces an earlier one
    pub links: BTreeMap<String, String>,

    /// Markup of anchors lacking a label or an href, kept for diagnostics
    pub unlabeled: Vec<String>,
}

impl LabeledLinks {
    /// Returns the href recorded for a label
    pub fn get(&self, label: &str) -> Option<&str> {
        self.links.get(label).map(String::as_str)
    }
}

/// Parses an HTML document
pub fn parse_document(html: &str) -> Html {
    Html::parse_document(html)
}

/// Extracts outbound links from a parsed document
///
/// # Link Extraction Rules
///
/// **Include:**
/// - every `<a href="...">`, resolved against `base_url`
///
/// **Exclude:**
/// - `javascript:`, `mailto:`, `tel:` links
/// - Data URIs
/// - Fragment-only links
/// - Links rejected by `predicate`, which sees the absolute URL
///
/// Links are returned in document order. Duplicates are kept; deduplication
/// happens when the links reach the frontier.
///
/// # Example
///
/// ```
/// use admin_crawler::crawler::{extract_links, parse_document};
/// use url::Url;
///
/// let html = r#"<a href="/astra/de/a.html">A</a><a href="https://other.org/">B</a>"#;
/// let base = Url::parse("https://www.astra.admin.ch/astra/de/home.html").unwrap();
/// let document = parse_document(html);
///
/// let internal = |link: &str| link.contains("astra/de");
/// let links = extract_links(&document, &base, Some(&internal));
/// assert_eq!(links, vec!["https://www.astra.admin.ch/astra/de/a.html"]);
/// ```
pub fn extract_links(
    document: &Html,
    base_url: &Url,
    predicate: Option<&dyn Fn(&str) -> bool>,
) -> Vec<String> {
    let mut links = Vec::new();

    let Ok(a_selector) = Selector::parse("a[href]") else {
        return links;
    };

    for element in document.select(&a_selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };

        let Some(absolute_url) = resolve_link(href, base_url) else {
            continue;
        };

        if predicate.map_or(true, |accept| accept(&absolute_url)) {
            links.push(absolute_url);
        }
    }

    links
}

/// Extracts the anchors of a subtree that carry an accessible label
///
/// Anchors without a label or without an href end up in
/// [`LabeledLinks::unlabeled`]. Hrefs are returned as written in the markup.
pub fn extract_labeled_links(scope: ElementRef<'_>) -> LabeledLinks {
    let mut labeled = LabeledLinks::default();

    let Ok(a_selector) = Selector::parse("a") else {
        return labeled;
    };

    for element in scope.select(&a_selector) {
        match (accessible_name(element), element.value().attr("href")) {
            (Some(label), Some(href)) => {
                labeled.links.insert(label, href.trim().to_string());
            }
            _ => labeled.unlabeled.push(element.html()),
        }
    }

    labeled
}

/// Returns the accessible name of an element
///
/// The `aria-label` attribute wins; otherwise the element's text with
/// whitespace collapsed. Empty names count as missing.
pub fn accessible_name(element: ElementRef<'_>) -> Option<String> {
    if let Some(label) = element.value().attr("aria-label") {
        let label = label.trim();
        if !label.is_empty() {
            return Some(label.to_string());
        }
    }

    let text = element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ");

    (!text.is_empty()).then_some(text)
}

/// Concatenated text content of the whole document
pub fn document_text(document: &Html) -> String {
    document.root_element().text().collect()
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
pub fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if lowered.starts_with("javascript:")
        || lowered.starts_with("mailto:")
        || lowered.starts_with("tel:")
        || lowered.starts_with("data:")
    {
        return None;
    }

    // Same page anchors
    if href.starts_with('#') {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute_url) => {
            if absolute_url.scheme() == "http" || absolute_url.scheme() == "https" {
                Some(absolute_url.to_string())
            } else {
                None
            }
        }
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_url() -> Url {
        Url::parse("https://www.astra.admin.ch/astra/de/home.html").unwrap()
    }

    fn links_of(html: &str) -> Vec<String> {
        extract_links(&parse_document(html), &base_url(), None)
    }

    #[test]
    fn test_extract_absolute_link() {
        let links = links_of(r#"<html><body><a href="https://other.com/page">Link</a></body></html>"#);
        assert_eq!(links, vec!["https://other.com/page"]);
    }

    #[test]
    fn test_extract_relative_link() {
        let links = links_of(r#"<a href="/astra/de/themen.html">Link</a>"#);
        assert_eq!(links, vec!["https://www.astra.admin.ch/astra/de/themen.html"]);
    }

    #[test]
    fn test_extract_relative_path_link() {
        let links = links_of(r#"<a href="themen.html">Link</a>"#);
        assert_eq!(links, vec!["https://www.astra.admin.ch/astra/de/themen.html"]);
    }

    #[test]
    fn test_skip_special_schemes() {
        let links = links_of(
            r#"
            <a href="javascript:void(0)">JS</a>
            <a href="mailto:info@astra.admin.ch">Mail</a>
            <a href="tel:+41584644711">Call</a>
            <a href="data:text/html,<h1>x</h1>">Data</a>
            <a href="JavaScript:alert(1)">Upper</a>
            "#,
        );
        assert!(links.is_empty());
    }

    #[test]
    fn test_skip_fragment_only() {
        let links = links_of(r##"<a href="#main">Jump</a>"##);
        assert!(links.is_empty());
    }

    #[test]
    fn test_download_links_are_followed() {
        let links = links_of(r#"<a href="/dam/bericht.pdf" download>PDF</a>"#);
        assert_eq!(links, vec!["https://www.astra.admin.ch/dam/bericht.pdf"]);
    }

    #[test]
    fn test_document_order_and_duplicates_preserved() {
        let links = links_of(
            r#"
            <a href="/b.html">B</a>
            <a href="/a.html">A</a>
            <a href="/b.html">B again</a>
            "#,
        );
        assert_eq!(
            links,
            vec![
                "https://www.astra.admin.ch/b.html",
                "https://www.astra.admin.ch/a.html",
                "https://www.astra.admin.ch/b.html",
            ]
        );
    }

    #[test]
    fn test_predicate_sees_absolute_url() {
        let html = r#"
            <a href="/astra/de/a.html">internal</a>
            <a href="https://www.bav.admin.ch/bav/de/home.html">external</a>
        "#;
        let only_astra = |link: &str| link.contains("astra.admin.ch/astra/de");
        let links = extract_links(&parse_document(html), &base_url(), Some(&only_astra));
        assert_eq!(links, vec!["https://www.astra.admin.ch/astra/de/a.html"]);
    }

    #[test]
    fn test_labeled_links_prefer_aria_label() {
        let html = r#"
            <div id="versions">
                <a href="/eli/cc/1962/1364_1409_1420/de/xml" aria-label="XML">download</a>
                <a href="/eli/cc/1962/1364_1409_1420/de/pdf"> PDF </a>
                <a aria-label="HTML">no href</a>
                <a href="/empty"></a>
            </div>
        "#;
        let document = parse_document(html);
        let labeled = extract_labeled_links(document.root_element());

        assert_eq!(labeled.get("XML"), Some("/eli/cc/1962/1364_1409_1420/de/xml"));
        assert_eq!(labeled.get("PDF"), Some("/eli/cc/1962/1364_1409_1420/de/pdf"));
        assert_eq!(labeled.links.len(), 2);
        assert_eq!(labeled.unlabeled.len(), 2);
    }

    #[test]
    fn test_later_label_replaces_earlier() {
        let html = r#"<a href="/first" aria-label="XML"></a><a href="/second" aria-label="XML"></a>"#;
        let document = parse_document(html);
        let labeled = extract_labeled_links(document.root_element());
        assert_eq!(labeled.get("XML"), Some("/second"));
    }

    #[test]
    fn test_document_text_concatenates_nodes() {
        let document = parse_document("<html><body><p>Nationalstrassen</p><p>Unterhalt</p></body></html>");
        assert_eq!(document_text(&document), "NationalstrassenUnterhalt");
    }

    #[test]
    fn test_empty_document_has_no_links_or_text() {
        let document = parse_document("");
        assert!(extract_links(&document, &base_url(), None).is_empty());
        assert!(document_text(&document).trim().is_empty());
    }
}
