//! URL-based resource classification
//!
//! The kind of a resource is decided from the extension of the last path
//! segment, before anything is fetched. Extensions are matched exactly first,
//! then as substrings so that query strings or version suffixes trailing the
//! real extension (`report.xlsx?v=2`) still land in the right bucket.

use crate::resource::ResourceKind;
use std::borrow::Cow;

/// Known extensions and the kind they map to, in matching priority order
pub const KIND_TABLE: &[(&str, ResourceKind)] = &[
    ("pdf", ResourceKind::Pdf),
    ("html", ResourceKind::Html),
    ("legal_xml", ResourceKind::Legal),
    ("xml", ResourceKind::Other),
    ("zip", ResourceKind::Zip),
    ("xlsx", ResourceKind::Excel),
    ("xls", ResourceKind::Excel),
    ("docx", ResourceKind::Word),
    ("doc", ResourceKind::Word),
    ("dotx", ResourceKind::Word),
    ("pptx", ResourceKind::Powerpoint),
    ("ppt", ResourceKind::Powerpoint),
    ("jpg", ResourceKind::Image),
    ("png", ResourceKind::Image),
    ("dxf", ResourceKind::Cad),
    ("dwg", ResourceKind::Cad),
    ("mpg", ResourceKind::Other),
];

/// Result of classifying a URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Storage bucket the resource belongs to
    pub kind: ResourceKind,

    /// Last path segment of the percent-decoded URL
    pub file_name: String,
}

/// Classifies a URL into a resource kind and file name
///
/// # Algorithm
///
/// 1. Percent-decode the URL and take everything after the last `/` as the file name
/// 2. Take everything after the last `.` of the file name, lower-cased, as the raw extension
/// 3. Return the kind of an exactly matching table key
/// 4. Otherwise return the kind of the first table key contained in the raw extension
/// 5. Otherwise return [`ResourceKind::Other`]
///
/// # Examples
///
/// ```
/// use admin_crawler::resource::{classify, ResourceKind};
///
/// assert_eq!(classify("https://x/doc.PDF").kind, ResourceKind::Pdf);
/// assert_eq!(classify("https://x/report.xlsx?v=2").kind, ResourceKind::Excel);
/// assert_eq!(classify("https://x/file.unknownext").kind, ResourceKind::Other);
/// ```
pub fn classify(url: &str) -> Classification {
    let decoded = percent_decode(url);
    let file_name = decoded
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string();

    let kind = kind_for_extension(&raw_extension(&file_name));

    Classification { kind, file_name }
}

/// Lower-cased text after the last `.`, or the whole name if it has none
fn raw_extension(file_name: &str) -> String {
    file_name
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

fn kind_for_extension(extension: &str) -> ResourceKind {
    if extension.is_empty() {
        return ResourceKind::Other;
    }

    if let Some((_, kind)) = KIND_TABLE.iter().find(|(key, _)| *key == extension) {
        return *kind;
    }

    KIND_TABLE
        .iter()
        .find(|(key, _)| extension.contains(key))
        .map(|(_, kind)| *kind)
        .unwrap_or(ResourceKind::Other)
}

/// Percent-decodes a URL, replacing invalid UTF-8 sequences
fn percent_decode(url: &str) -> Cow<'_, str> {
    match urlencoding::decode(url) {
        Ok(decoded) => decoded,
        Err(_) => {
            let bytes = urlencoding::decode_binary(url.as_bytes());
            Cow::Owned(String::from_utf8_lossy(&bytes).into_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_extension_match() {
        let classified = classify("https://www.astra.admin.ch/astra/de/home.html");
        assert_eq!(classified.kind, ResourceKind::Html);
        assert_eq!(classified.file_name, "home.html");
    }

    #[test]
    fn test_extension_is_case_insensitive() {
        let classified = classify("https://x/doc.PDF");
        assert_eq!(classified.kind, ResourceKind::Pdf);
        // The file name keeps its original case
        assert_eq!(classified.file_name, "doc.PDF");
    }

    #[test]
    fn test_unknown_extension_falls_back_to_other() {
        assert_eq!(classify("https://x/file.unknownext").kind, ResourceKind::Other);
    }

    #[test]
    fn test_query_suffix_substring_match() {
        let classified = classify("https://x/report.xlsx?v=2");
        assert_eq!(classified.kind, ResourceKind::Excel);
        assert_eq!(classified.file_name, "report.xlsx?v=2");
    }

    #[test]
    fn test_longer_keys_win_over_shorter_prefixes() {
        assert_eq!(classify("https://x/a.docx").kind, ResourceKind::Word);
        assert_eq!(classify("https://x/a.pptx?download").kind, ResourceKind::Powerpoint);
        assert_eq!(classify("https://x/a.xls").kind, ResourceKind::Excel);
    }

    #[test]
    fn test_percent_decoded_file_name() {
        let classified = classify("https://x/dokumente/Jahresbericht%202023.pdf");
        assert_eq!(classified.kind, ResourceKind::Pdf);
        assert_eq!(classified.file_name, "Jahresbericht 2023.pdf");
    }

    #[test]
    fn test_plain_xml_goes_to_other_bucket() {
        assert_eq!(classify("https://x/feed.xml").kind, ResourceKind::Other);
    }

    #[test]
    fn test_trailing_slash_and_extensionless_paths() {
        let classified = classify("https://x/astra/de/");
        assert_eq!(classified.kind, ResourceKind::Other);
        assert_eq!(classified.file_name, "");

        assert_eq!(classify("https://x/astra/de/themen").kind, ResourceKind::Other);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let url = "https://x/plan.DWG?rev=4";
        assert_eq!(classify(url), classify(url));
        assert_eq!(classify(url).kind, ResourceKind::Cad);
    }

    #[test]
    fn test_invalid_utf8_escape_does_not_panic() {
        let classified = classify("https://x/bad%FF.png");
        assert_eq!(classified.kind, ResourceKind::Image);
    }
}
