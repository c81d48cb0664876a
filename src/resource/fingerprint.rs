//! Content fingerprints
//!
//! A fingerprint is the hex SHA-256 digest of a resource's content: the raw
//! bytes for binary resources, the UTF-8 encoding of the extracted text for
//! parsed documents.

use sha2::{Digest, Sha256};

/// Digest recorded when there is no content to fingerprint
pub const ERROR_DIGEST: &str = "__error__";

/// Content handed to [`fingerprint`]
#[derive(Debug, Clone, Copy)]
pub enum Payload<'a> {
    /// Raw body of a binary resource
    Bytes(&'a [u8]),

    /// Text extracted from a parsed document
    Text(&'a str),

    /// Nothing usable was retrieved
    Absent,
}

/// Computes the stable digest of a payload
///
/// Never fails: [`Payload::Absent`] yields [`ERROR_DIGEST`] so the crawl keeps going.
///
/// # Examples
///
/// ```
/// use admin_crawler::resource::{fingerprint, Payload, ERROR_DIGEST};
///
/// let a = fingerprint(Payload::Bytes(b"%PDF-1.7"));
/// assert_eq!(a, fingerprint(Payload::Bytes(b"%PDF-1.7")));
/// assert_eq!(fingerprint(Payload::Absent), ERROR_DIGEST);
/// ```
pub fn fingerprint(payload: Payload<'_>) -> String {
    match payload {
        Payload::Bytes(bytes) => digest(bytes),
        Payload::Text(text) => digest(text.as_bytes()),
        Payload::Absent => {
            tracing::debug!("No content to fingerprint, recording error digest");
            ERROR_DIGEST.to_string()
        }
    }
}

fn digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
