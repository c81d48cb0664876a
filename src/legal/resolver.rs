//! Interpretation of rendered legal pages
//!
//! After rendering, a legal page shows an in-force banner and a sidebar
//! listing every version of the act. The active version is marked with a
//! green badge; its row holds the download links per format.

use crate::crawler::{accessible_name, extract_labeled_links};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use url::Url;

/// Element carrying the in-force banner
pub const STATUS_ELEMENT: &str = "app-in-force-status";

const NOT_IN_FORCE_TEXT: &str = "Dieser Text ist nicht in Kraft";
const IN_FORCE_TEXT: &str = "Dieser Text ist in Kraft";
const VERSIONS_HEADING: &str = "Alle Fassungen";
const XML_LABEL: &str = "XML";

static RE_TWO_DIGITS: OnceLock<Regex> = OnceLock::new();

/// Availability of a legal text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegalStatus {
    InForce,
    NotInForce,
    Unknown,
}

impl LegalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InForce => "in_force",
            Self::NotInForce => "not_in_force",
            Self::Unknown => "unknown",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "in_force" => Some(Self::InForce),
            "not_in_force" => Some(Self::NotInForce),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for LegalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Download target of the active version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveVersion {
    /// Absolute URL of the XML rendition
    pub xml_link: String,

    /// Publication date shown in the version row, if any
    pub publication_date: Option<String>,
}

/// Reads the in-force banner of a rendered page
///
/// A page without the banner is `Unknown`.
pub fn detect_status(document: &Html) -> LegalStatus {
    let Ok(selector) = Selector::parse(STATUS_ELEMENT) else {
        return LegalStatus::Unknown;
    };

    let Some(banner) = document.select(&selector).next() else {
        return LegalStatus::Unknown;
    };

    let text = collapse_whitespace(banner);
    if text.contains(NOT_IN_FORCE_TEXT) {
        LegalStatus::NotInForce
    } else if text.contains(IN_FORCE_TEXT) {
        LegalStatus::InForce
    } else {
        LegalStatus::Unknown
    }
}

/// Returns true once a rendered page shows a recognizable status banner
pub fn shows_status(html: &str) -> bool {
    detect_status(&Html::parse_document(html)) != LegalStatus::Unknown
}

/// Locates the XML download of the active version
///
/// Looks for the `well well-white` sidebar headed "Alle Fassungen", takes the
/// table row holding the `soft-green` marker and returns the anchor labelled
/// "XML" in that row, resolved against `base`.
pub fn active_version(document: &Html, base: &Url) -> Option<ActiveVersion> {
    let sidebar_selector = Selector::parse(r#"div[class*="well well-white"]"#).ok()?;
    let heading_selector = Selector::parse("h4").ok()?;
    let marker_selector = Selector::parse(r#"span[class*="soft-green"]"#).ok()?;

    let mut found = None;

    for sidebar in document.select(&sidebar_selector) {
        let is_versions = sidebar
            .select(&heading_selector)
            .any(|heading| collapse_whitespace(heading) == VERSIONS_HEADING);
        if !is_versions {
            continue;
        }

        let Some(marker) = sidebar.select(&marker_selector).next() else {
            tracing::debug!("Versions sidebar without an active marker");
            continue;
        };

        let Some(row) = ancestor(marker, 2) else {
            continue;
        };

        if let Some(version) = version_row_links(row, base) {
            found = Some(version);
        }
    }

    found
}

/// Scans the cells of a version row for the XML link and the publication date
fn version_row_links(row: ElementRef<'_>, base: &Url) -> Option<ActiveVersion> {
    let cell_selector = Selector::parse("td").ok()?;

    let mut xml_link = None;
    let mut publication_date = None;

    for cell in row.select(&cell_selector) {
        if let Some(name) = accessible_name(cell) {
            if has_two_digits(&name) {
                publication_date = Some(name);
            }
        }

        if let Some(href) = extract_labeled_links(cell).get(XML_LABEL) {
            xml_link = Some(
                base.join(href)
                    .map(|url| url.to_string())
                    .unwrap_or_else(|_| href.to_string()),
            );
        }
    }

    xml_link.map(|xml_link| ActiveVersion {
        xml_link,
        publication_date,
    })
}

fn ancestor(element: ElementRef<'_>, levels: usize) -> Option<ElementRef<'_>> {
    let mut current = element;
    for _ in 0..levels {
        current = current.parent().and_then(ElementRef::wrap)?;
    }
    Some(current)
}

fn collapse_whitespace(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn has_two_digits(text: &str) -> bool {
    RE_TWO_DIGITS
        .get_or_init(|| Regex::new(r"\d{2}").expect("literal pattern"))
        .is_match(text)
}
