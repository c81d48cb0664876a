//! Resource handling: classification into storage buckets and content fingerprints
//!
//! Both operations are pure and total. An unrecognized URL always classifies as
//! [`ResourceKind::Other`], and a missing payload always fingerprints to
//! [`ERROR_DIGEST`], so neither can stop a crawl.

mod classifier;
mod fingerprint;

pub use classifier::{classify, Classification, KIND_TABLE};
pub use fingerprint::{fingerprint, Payload, ERROR_DIGEST};

use std::fmt;

/// Storage bucket a resource is sorted into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Pdf,
    /// Markup; the only kind whose links are followed
    Html,
    /// Legal document resolved from a gated page
    Legal,
    Zip,
    Excel,
    Word,
    Powerpoint,
    Image,
    Cad,
    /// Fallback for anything unrecognized or degraded
    Other,
}

impl ResourceKind {
    /// Directory name of the bucket under the write directory
    pub fn bucket(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Html => "html",
            Self::Legal => "legal",
            Self::Zip => "zip",
            Self::Excel => "excel",
            Self::Word => "word",
            Self::Powerpoint => "powerpoint",
            Self::Image => "images",
            Self::Cad => "cad",
            Self::Other => "else",
        }
    }

    /// Parses a kind from its bucket name
    pub fn from_bucket(s: &str) -> Option<Self> {
        Self::all().into_iter().find(|kind| kind.bucket() == s)
    }

    /// Returns true if links should be extracted from this kind
    pub fn is_markup(&self) -> bool {
        matches!(self, Self::Html)
    }

    /// Returns all kinds
    pub fn all() -> Vec<Self> {
        vec![
            Self::Pdf,
            Self::Html,
            Self::Legal,
            Self::Zip,
            Self::Excel,
            Self::Word,
            Self::Powerpoint,
            Self::Image,
            Self::Cad,
            Self::Other,
        ]
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bucket())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_roundtrip() {
        for kind in ResourceKind::all() {
            assert_eq!(ResourceKind::from_bucket(kind.bucket()), Some(kind));
        }
    }

    #[test]
    fn test_unknown_bucket() {
        assert_eq!(ResourceKind::from_bucket("spreadsheets"), None);
    }

    #[test]
    fn test_only_html_is_markup() {
        for kind in ResourceKind::all() {
            assert_eq!(kind.is_markup(), kind == ResourceKind::Html);
        }
    }
}
