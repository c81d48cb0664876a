//! Detection of script-gated pages
//!
//! Some legal pages only ship a notice telling the visitor that a
//! JavaScript-capable browser is required. Those pages carry no usable content
//! and must be escalated to the renderer.

use crate::crawler::document_text;
use regex::Regex;
use scraper::Html;
use std::sync::OnceLock;

static RE_NEWLINES: OnceLock<Regex> = OnceLock::new();

/// Visible text of a document with every run of newlines collapsed to one space
pub fn visible_text(document: &Html) -> String {
    let newlines = RE_NEWLINES.get_or_init(|| Regex::new(r"\n+").expect("literal pattern"));
    newlines
        .replace_all(document_text(document).trim(), " ")
        .into_owned()
}

/// Returns true if the document's visible text contains the gate marker
///
/// A document without any text is never gated.
pub fn is_gated(document: &Html, marker: &str) -> bool {
    let text = visible_text(document);
    !text.is_empty() && text.contains(marker)
}
