//! Resolution of gated pages into their machine-readable documents

use crate::crawler::parse_document;
use crate::legal::render::{RenderedPage, Renderer};
use crate::legal::resolver::{active_version, detect_status, LegalStatus};
use crate::CrawlError;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Outcome of escalating a gated page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscalationResult {
    /// XML document of the active version, or the original URL if the text is not in force
    pub resolved_url: String,

    /// Availability reported by the page
    pub status: LegalStatus,

    /// URL the browser ended up on
    pub final_uri: String,

    /// Publication date of the active version, when shown
    pub publication_date: Option<String>,
}

/// Escalates gated pages through a renderer
#[derive(Clone)]
pub struct Escalator {
    renderer: Arc<dyn Renderer>,
    timeout: Duration,
}

impl Escalator {
    /// Creates an escalator; every render is cancelled after `timeout`
    pub fn new(renderer: Arc<dyn Renderer>, timeout: Duration) -> Self {
        Self { renderer, timeout }
    }

    /// Renders `url` and resolves it
    ///
    /// # Returns
    ///
    /// * `Ok(EscalationResult)` - The page was rendered and interpreted
    /// * `Err(CrawlError::Escalation)` - Rendering failed, timed out, or an
    ///   in-force page had no XML link
    pub async fn escalate(&self, url: &str) -> Result<EscalationResult, CrawlError> {
        let page = match tokio::time::timeout(self.timeout, self.renderer.render(url)).await {
            Ok(Ok(page)) => page,
            Ok(Err(e)) => {
                return Err(CrawlError::Escalation {
                    url: url.to_string(),
                    message: e.to_string(),
                })
            }
            Err(_) => {
                return Err(CrawlError::Escalation {
                    url: url.to_string(),
                    message: format!("rendering timed out after {:?}", self.timeout),
                })
            }
        };

        interpret_rendered(url, &page)
    }
}

/// Derives the escalation result from rendered markup
///
/// Only an in-force text is resolved to its XML document; any other status
/// keeps the original URL.
pub fn interpret_rendered(url: &str, page: &RenderedPage) -> Result<EscalationResult, CrawlError> {
    let document = parse_document(&page.html);
    let status = detect_status(&document);

    if status != LegalStatus::InForce {
        return Ok(EscalationResult {
            resolved_url: url.to_string(),
            status,
            final_uri: page.final_url.clone(),
            publication_date: None,
        });
    }

    let base = Url::parse(&page.final_url)
        .or_else(|_| Url::parse(url))
        .map_err(|e| CrawlError::Escalation {
            url: url.to_string(),
            message: format!("unusable page URL: {}", e),
        })?;

    let version = active_version(&document, &base).ok_or_else(|| CrawlError::Escalation {
        url: url.to_string(),
        message: "text is in force but the active version has no XML link".to_string(),
    })?;

    Ok(EscalationResult {
        resolved_url: version.xml_link,
        status,
        final_uri: page.final_url.clone(),
        publication_date: version.publication_date,
    })
}
